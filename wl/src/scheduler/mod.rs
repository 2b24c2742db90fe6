//! Periodic delivery of active-node reports
//!
//! The Scheduler runs one background loop. Every tick it asks the store for
//! active nodes, fans out one dispatch per node that has a destination, waits
//! for all of them to settle, then sleeps until the next tick.

mod config;
mod core;
mod tick;

pub use config::SchedulerConfig;
pub use self::core::{Scheduler, SchedulerError, SchedulerStats};
pub use tick::{TickReport, run_tick};
