//! WavesLab - household simulation environment
//!
//! Simulated household nodes (lights, faucets, boilers) are switched on and
//! off through the CLI or the management API. While a node is on, the
//! [`scheduler::Scheduler`] POSTs its consumption to the node's endpoint on
//! every tick.
//!
//! ```text
//! wl start/stop ──► StateStore (nodes.json, users.json)
//!                        ▲
//! HTTP API ──────────────┤
//!                        │ active nodes
//! Scheduler ── tick ─────┘──► Dispatcher ──POST──► endpoint (e.g. `wl listen`)
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod ingress;
pub mod scheduler;

pub use cli::{Cli, Command};
pub use config::Config;
pub use dispatcher::{DeliveryPayload, DispatchError, Dispatcher, HttpDispatcher};
pub use ingress::Ingress;
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerError, SchedulerStats, TickReport};
