//! A single scheduler tick

use eyre::{Context, Result};
use nodestore::StateStore;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::dispatcher::Dispatcher;

/// What happened during one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Nodes that were ON
    pub active: usize,
    /// Deliveries attempted
    pub dispatched: usize,
    /// Deliveries confirmed with HTTP 200
    pub succeeded: usize,
    /// Deliveries that failed for any reason
    pub failed: usize,
    /// Active nodes without a destination
    pub skipped: usize,
}

/// Run one tick: look up active nodes and deliver one report per destination
///
/// All deliveries run concurrently and are awaited before this returns.
/// Dropping the returned future aborts any deliveries still in flight.
/// Errors come only from the store lookup; delivery failures are counted.
pub async fn run_tick(store: &Arc<StateStore>, dispatcher: &Arc<dyn Dispatcher>) -> Result<TickReport> {
    debug!("run_tick: called");
    let lookup = Arc::clone(store);
    let active = tokio::task::spawn_blocking(move || lookup.list_active_nodes())
        .await
        .context("Active node lookup panicked")?
        .context("Failed to load active nodes")?;

    let mut report = TickReport {
        active: active.len(),
        ..Default::default()
    };

    if active.is_empty() {
        info!("No active nodes to process");
        return Ok(report);
    }

    info!(count = active.len(), "Processing active nodes");

    let mut deliveries = JoinSet::new();
    for node in active {
        if !node.has_endpoint() {
            info!(node = %node.name, "Node is active but has no endpoint URL");
            report.skipped += 1;
            continue;
        }
        let dispatcher = Arc::clone(dispatcher);
        deliveries.spawn(async move { dispatcher.dispatch(&node).await });
    }
    report.dispatched = deliveries.len();

    while let Some(result) = deliveries.join_next().await {
        match result {
            Ok(true) => report.succeeded += 1,
            Ok(false) => report.failed += 1,
            Err(e) => {
                error!(error = %e, "Delivery task failed");
                report.failed += 1;
            }
        }
    }

    if report.succeeded > 0 {
        info!(count = report.succeeded, "Successfully sent node requests");
    }
    if report.failed > 0 {
        warn!(count = report.failed, "Failed to send node requests");
    }

    Ok(report)
}
