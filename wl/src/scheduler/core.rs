//! Scheduler implementation

use nodestore::StateStore;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::config::SchedulerConfig;
use super::tick::{TickReport, run_tick};
use crate::dispatcher::{Dispatcher, HttpDispatcher};

/// Errors from scheduler lifecycle operations
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Scheduler is already running")]
    AlreadyRunning,

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Cumulative counters across ticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Ticks that completed
    pub ticks: u64,
    /// Ticks that failed before dispatching
    pub tick_errors: u64,
    /// Successful deliveries
    pub delivered: u64,
    /// Failed deliveries
    pub failed: u64,
    /// Active nodes skipped for lack of a destination
    pub skipped: u64,
    /// Report of the most recent completed tick
    pub last_tick: Option<TickReport>,
}

impl SchedulerStats {
    fn record(&mut self, report: TickReport) {
        self.ticks += 1;
        self.delivered += report.succeeded as u64;
        self.failed += report.failed as u64;
        self.skipped += report.skipped as u64;
        self.last_tick = Some(report);
    }
}

type SharedStats = Arc<Mutex<SchedulerStats>>;

/// Handle to a running loop
struct RunningLoop {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Drives periodic delivery for active nodes
///
/// `Stopped --start--> Running --stop--> Stopped`. The dispatcher (and with it
/// the HTTP connection pool) lives only while the loop is running.
pub struct Scheduler {
    config: SchedulerConfig,
    store: Arc<StateStore>,
    stats: SharedStats,
    running: Option<RunningLoop>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, store: Arc<StateStore>) -> Self {
        debug!(?config, "Scheduler::new: called");
        Self {
            config,
            store,
            stats: Arc::default(),
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn stats(&self) -> SchedulerStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the loop with an HTTP dispatcher built from the config
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        debug!("Scheduler::start: called");
        if self.running.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }
        let dispatcher = HttpDispatcher::new(self.config.request_timeout())?;
        self.start_with(Arc::new(dispatcher))
    }

    /// Start the loop with the given dispatcher
    pub fn start_with(&mut self, dispatcher: Arc<dyn Dispatcher>) -> Result<(), SchedulerError> {
        debug!("Scheduler::start_with: called");
        if self.running.is_some() {
            debug!("Scheduler::start_with: already running, rejecting");
            return Err(SchedulerError::AlreadyRunning);
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(run_loop(
            self.config.clone(),
            Arc::clone(&self.store),
            dispatcher,
            Arc::clone(&self.stats),
            shutdown_rx,
        ));

        self.running = Some(RunningLoop { shutdown_tx, handle });
        info!(interval_ms = self.config.interval_ms, "Simulation loop started");
        Ok(())
    }

    /// Stop the loop and wait for it to exit; no-op when already stopped
    pub async fn stop(&mut self) {
        debug!("Scheduler::stop: called");
        let Some(running) = self.running.take() else {
            debug!("Scheduler::stop: not running");
            return;
        };

        // A send error means the loop is already gone
        let _ = running.shutdown_tx.send(()).await;

        match running.handle.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => debug!("Scheduler::stop: loop task cancelled"),
            Err(e) => error!(error = %e, "Simulation loop panicked"),
        }

        info!("Simulation loop stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.handle.abort();
        }
    }
}

async fn run_loop(
    config: SchedulerConfig,
    store: Arc<StateStore>,
    dispatcher: Arc<dyn Dispatcher>,
    stats: SharedStats,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    debug!("run_loop: called");
    loop {
        let pause = tokio::select! {
            result = run_tick(&store, &dispatcher) => match result {
                Ok(report) => {
                    debug!(?report, "run_loop: tick complete");
                    stats.lock().unwrap_or_else(PoisonError::into_inner).record(report);
                    config.interval()
                }
                Err(e) => {
                    error!("Error in simulation loop: {:#}", e);
                    stats.lock().unwrap_or_else(PoisonError::into_inner).tick_errors += 1;
                    config.error_pause()
                }
            },
            _ = shutdown_rx.recv() => {
                info!("Simulation loop cancelled during tick");
                break;
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = shutdown_rx.recv() => {
                info!("Simulation loop cancelled");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::mock::MockDispatcher;
    use nodestore::{NODES_FILE, USERS_FILE};
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Arc<StateStore>) {
        let temp = TempDir::new().unwrap();
        let nodes = json!([
            {"id": "a", "name": "A", "node_type": "water", "status": "on", "provision_rate": 1.0,
             "endpoint_url": "http://127.0.0.1:1/a"},
            {"id": "b", "name": "B", "node_type": "gas", "status": "on", "provision_rate": 2.0,
             "endpoint_url": "http://127.0.0.1:1/b"},
            {"id": "c", "name": "C", "node_type": "electricity", "status": "on", "provision_rate": 3.0,
             "endpoint_url": null},
        ]);
        std::fs::write(temp.path().join(NODES_FILE), nodes.to_string()).unwrap();
        std::fs::write(temp.path().join(USERS_FILE), "[]").unwrap();
        let store = Arc::new(StateStore::open(temp.path()).unwrap());
        (temp, store)
    }

    fn fast_config() -> SchedulerConfig {
        SchedulerConfig {
            interval_ms: 50,
            error_pause_ms: 20,
            request_timeout_ms: 1_000,
        }
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let (_temp, store) = fixture();
        let mut scheduler = Scheduler::new(fast_config(), store);

        scheduler
            .start_with(Arc::new(MockDispatcher::new(Duration::ZERO)))
            .unwrap();
        assert!(scheduler.is_running());

        let err = scheduler
            .start_with(Arc::new(MockDispatcher::new(Duration::ZERO)))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::AlreadyRunning));
        assert!(matches!(scheduler.start(), Err(SchedulerError::AlreadyRunning)));

        scheduler.stop().await;
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_noop() {
        let (_temp, store) = fixture();
        let mut scheduler = Scheduler::new(fast_config(), store);
        scheduler.stop().await;
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_loop_keeps_ticking_through_failures() {
        let (_temp, store) = fixture();
        let mock = Arc::new(MockDispatcher::new(Duration::from_millis(5)).failing_for(&["b"]));
        let mut scheduler = Scheduler::new(fast_config(), store);

        scheduler.start_with(mock.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        scheduler.stop().await;

        let stats = scheduler.stats();
        assert!(stats.ticks >= 2, "expected several ticks, got {:?}", stats);
        assert_eq!(stats.delivered, stats.ticks);
        assert_eq!(stats.failed, stats.ticks);
        assert_eq!(stats.skipped, stats.ticks);
        assert_eq!(
            stats.last_tick,
            Some(TickReport {
                active: 3,
                dispatched: 2,
                succeeded: 1,
                failed: 1,
                skipped: 1,
            })
        );
        assert!(mock.calls().len() as u64 >= stats.ticks * 2);
    }

    #[tokio::test]
    async fn test_store_errors_pause_and_retry() {
        let (_temp, store) = fixture();
        std::fs::write(store.nodes_path(), "{broken").unwrap();
        let mut scheduler = Scheduler::new(fast_config(), Arc::clone(&store));

        scheduler
            .start_with(Arc::new(MockDispatcher::new(Duration::ZERO)))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(scheduler.stats().tick_errors >= 2);
        assert_eq!(scheduler.stats().ticks, 0);

        // Repairing the file lets the loop recover on its own
        std::fs::write(store.nodes_path(), "[]").unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        scheduler.stop().await;

        assert!(scheduler.stats().ticks >= 1);
    }

    #[tokio::test]
    async fn test_stop_interrupts_sleep_promptly() {
        let (_temp, store) = fixture();
        let config = SchedulerConfig {
            interval_ms: 60_000,
            ..fast_config()
        };
        let mut scheduler = Scheduler::new(config, store);

        scheduler
            .start_with(Arc::new(MockDispatcher::new(Duration::ZERO)))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let stopped = tokio::time::timeout(Duration::from_secs(2), scheduler.stop()).await;
        assert!(stopped.is_ok(), "stop should not wait for the next tick");
        assert_eq!(scheduler.stats().ticks, 1);
    }

    #[tokio::test]
    async fn test_stop_abandons_in_flight_deliveries() {
        let (_temp, store) = fixture();
        let mut scheduler = Scheduler::new(fast_config(), store);

        scheduler
            .start_with(Arc::new(MockDispatcher::new(Duration::from_secs(60))))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let stopped = tokio::time::timeout(Duration::from_secs(2), scheduler.stop()).await;
        assert!(stopped.is_ok());
        assert_eq!(scheduler.stats().ticks, 0);
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let (_temp, store) = fixture();
        let mut scheduler = Scheduler::new(fast_config(), store);

        scheduler
            .start_with(Arc::new(MockDispatcher::new(Duration::ZERO)))
            .unwrap();
        scheduler.stop().await;
        scheduler
            .start_with(Arc::new(MockDispatcher::new(Duration::ZERO)))
            .unwrap();
        assert!(scheduler.is_running());
        scheduler.stop().await;
    }
}
