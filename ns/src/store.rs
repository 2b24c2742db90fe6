//! Core StateStore implementation

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info};

use crate::error::{StoreError, StoreResult};
use crate::model::{Node, NodeStatus, Outcome, User};
use crate::persist;

/// File holding the node array
pub const NODES_FILE: &str = "nodes.json";

/// File holding the user array
pub const USERS_FILE: &str = "users.json";

/// Single source of truth for node and user state
///
/// Nothing is cached: every operation loads both files fresh, and mutating
/// operations write back atomically before returning. All operations hold
/// one store-wide lock for their full duration, so they are serialized
/// relative to each other within this process.
#[derive(Debug)]
pub struct StateStore {
    nodes_path: PathBuf,
    users_path: PathBuf,
    lock: Mutex<()>,
}

impl StateStore {
    /// Open a store backed by `nodes.json` and `users.json` in `data_dir`
    ///
    /// Fails if either file is missing. No default data is ever created.
    pub fn open(data_dir: impl AsRef<Path>) -> StoreResult<Self> {
        let data_dir = data_dir.as_ref();
        debug!(data_dir = %data_dir.display(), "StateStore::open: called");

        let users_path = data_dir.join(USERS_FILE);
        if !users_path.is_file() {
            return Err(StoreError::MissingFile {
                kind: "Users",
                path: users_path,
            });
        }

        let nodes_path = data_dir.join(NODES_FILE);
        if !nodes_path.is_file() {
            return Err(StoreError::MissingFile {
                kind: "Nodes",
                path: nodes_path,
            });
        }

        info!(data_dir = %data_dir.display(), "Opened state store");
        Ok(Self {
            nodes_path,
            users_path,
            lock: Mutex::new(()),
        })
    }

    pub fn nodes_path(&self) -> &Path {
        &self.nodes_path
    }

    pub fn users_path(&self) -> &Path {
        &self.users_path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The guarded value is (), so a poisoned lock carries no broken state
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // === Load/save ===

    fn load_nodes(&self) -> StoreResult<Vec<Node>> {
        let nodes: Vec<Node> =
            persist::read_json(&self.nodes_path).inspect_err(|e| error!(error = %e, "Error loading nodes"))?;

        let mut seen = HashSet::with_capacity(nodes.len());
        if let Some(dup) = nodes.iter().find(|n| !seen.insert(n.id.as_str())) {
            let err = StoreError::Invalid {
                path: self.nodes_path.clone(),
                reason: format!("duplicate node id '{}'", dup.id),
            };
            error!(error = %err, "Error loading nodes");
            return Err(err);
        }

        debug!(count = nodes.len(), path = %self.nodes_path.display(), "load_nodes: loaded");
        Ok(nodes)
    }

    fn load_users(&self) -> StoreResult<Vec<User>> {
        let users: Vec<User> =
            persist::read_json(&self.users_path).inspect_err(|e| error!(error = %e, "Error loading users"))?;

        let mut seen = HashSet::with_capacity(users.len());
        if let Some(dup) = users.iter().find(|u| !seen.insert(u.username.as_str())) {
            let err = StoreError::Invalid {
                path: self.users_path.clone(),
                reason: format!("duplicate username '{}'", dup.username),
            };
            error!(error = %err, "Error loading users");
            return Err(err);
        }

        debug!(count = users.len(), path = %self.users_path.display(), "load_users: loaded");
        Ok(users)
    }

    fn save_nodes(&self, nodes: &[Node]) -> StoreResult<()> {
        persist::write_json_atomic(&self.nodes_path, nodes)
            .inspect_err(|e| error!(error = %e, "Error saving nodes"))?;
        debug!(count = nodes.len(), path = %self.nodes_path.display(), "save_nodes: saved");
        Ok(())
    }

    // === Node operations ===

    /// Snapshot of all nodes, in file order
    pub fn list_nodes(&self) -> StoreResult<Vec<Node>> {
        debug!("list_nodes: called");
        let _guard = self.guard();
        self.load_nodes()
    }

    pub fn get_node(&self, id: &str) -> StoreResult<Option<Node>> {
        debug!(%id, "get_node: called");
        let _guard = self.guard();
        Ok(self.load_nodes()?.into_iter().find(|n| n.id == id))
    }

    pub fn get_node_by_name(&self, name: &str) -> StoreResult<Option<Node>> {
        debug!(%name, "get_node_by_name: called");
        let _guard = self.guard();
        Ok(self.load_nodes()?.into_iter().find(|n| n.name == name))
    }

    /// Nodes whose status is ON
    pub fn list_active_nodes(&self) -> StoreResult<Vec<Node>> {
        debug!("list_active_nodes: called");
        let _guard = self.guard();
        Ok(self.load_nodes()?.into_iter().filter(Node::is_active).collect())
    }

    /// Set a node's destination URL; `None` if the node does not exist
    pub fn update_endpoint(&self, id: &str, url: &str) -> StoreResult<Option<Node>> {
        debug!(%id, %url, "update_endpoint: called");
        let _guard = self.guard();
        let mut nodes = self.load_nodes()?;

        let Some(index) = nodes.iter().position(|n| n.id == id) else {
            debug!(%id, "update_endpoint: node not found");
            return Ok(None);
        };

        nodes[index].endpoint_url = url.to_string();
        self.save_nodes(&nodes)?;

        info!(%id, %url, "Updated node endpoint");
        Ok(Some(nodes.swap_remove(index)))
    }

    /// Turn a node on, optionally assigning a user
    ///
    /// Starting a node that is already on succeeds without touching it, so an
    /// existing user assignment is kept.
    pub fn start_node(&self, id: &str, username: Option<&str>) -> StoreResult<Outcome> {
        debug!(%id, ?username, "start_node: called");
        let _guard = self.guard();
        let mut nodes = self.load_nodes()?;

        let Some(node) = nodes.iter_mut().find(|n| n.id == id) else {
            return Ok(Outcome::failed(format!("Node '{}' not found", id)));
        };

        if node.status == NodeStatus::On {
            debug!(%id, "start_node: already running");
            return Ok(Outcome::ok(format!("Node '{}' is already running", id)));
        }

        if let Some(username) = username.filter(|u| !u.is_empty()) {
            let users = self.load_users()?;
            if !users.iter().any(|u| u.username == username) {
                return Ok(Outcome::failed(format!("User '{}' not found", username)));
            }
            node.assigned_user = Some(username.to_string());
        }

        node.status = NodeStatus::On;
        self.save_nodes(&nodes)?;

        info!(%id, ?username, "Started node");
        Ok(Outcome::ok(format!("Node '{}' started successfully", id)))
    }

    /// Turn a node off and clear its user assignment
    pub fn stop_node(&self, id: &str) -> StoreResult<Outcome> {
        debug!(%id, "stop_node: called");
        let _guard = self.guard();
        let mut nodes = self.load_nodes()?;

        let Some(node) = nodes.iter_mut().find(|n| n.id == id) else {
            return Ok(Outcome::failed(format!("Node '{}' not found", id)));
        };

        if node.status == NodeStatus::Off {
            debug!(%id, "stop_node: already stopped");
            return Ok(Outcome::ok(format!("Node '{}' is already stopped", id)));
        }

        node.status = NodeStatus::Off;
        node.assigned_user = None;
        self.save_nodes(&nodes)?;

        info!(%id, "Stopped node");
        Ok(Outcome::ok(format!("Node '{}' stopped successfully", id)))
    }

    // === User operations ===

    pub fn list_users(&self) -> StoreResult<Vec<User>> {
        debug!("list_users: called");
        let _guard = self.guard();
        self.load_users()
    }

    pub fn get_user(&self, username: &str) -> StoreResult<Option<User>> {
        debug!(%username, "get_user: called");
        let _guard = self.guard();
        Ok(self.load_users()?.into_iter().find(|u| u.username == username))
    }
}
