//! JSON file I/O with atomic replacement
//!
//! A write goes to `<file>.tmp` in the destination's directory, is fsynced,
//! and is then renamed over the destination. A crash before the rename leaves
//! the previous file untouched; the stale temp file is overwritten by the
//! next write.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Path of the temp file used while replacing `path`
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let content = fs::read(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_slice(&content).map_err(|e| StoreError::json(path, e))
}

pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<()> {
    let tmp = stage(path, value)?;
    commit(&tmp, path)
}

/// Write the serialized value to the temp file and force it to disk
pub(crate) fn stage<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<PathBuf> {
    let tmp = temp_path(path);
    let mut content = serde_json::to_vec_pretty(value).map_err(|e| StoreError::json(path, e))?;
    content.push(b'\n');

    let mut file = fs::File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
    file.write_all(&content).map_err(|e| StoreError::io(&tmp, e))?;
    file.flush().map_err(|e| StoreError::io(&tmp, e))?;
    file.sync_all().map_err(|e| StoreError::io(&tmp, e))?;

    debug!(tmp = %tmp.display(), bytes = content.len(), "stage: temp file synced");
    Ok(tmp)
}

/// Swap a staged temp file into place
pub(crate) fn commit(tmp: &Path, path: &Path) -> StoreResult<()> {
    if let Err(e) = fs::rename(tmp, path) {
        let _ = fs::remove_file(tmp);
        return Err(StoreError::io(path, e));
    }
    sync_parent_dir(path);
    Ok(())
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    let Some(parent) = path.parent() else {
        return;
    };
    let dir = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    if let Err(e) = fs::File::open(dir).and_then(|d| d.sync_all()) {
        debug!(error = %e, dir = %dir.display(), "sync_parent_dir: fsync failed");
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}
