//! Outbound delivery of node reports
//!
//! A [`Dispatcher`] makes exactly one delivery attempt per call and folds every
//! failure mode into `false`, so the scheduler's fan-out never has to handle
//! errors itself.

mod error;
mod http;
mod payload;

use async_trait::async_trait;
use nodestore::Node;

pub use error::DispatchError;
pub use http::HttpDispatcher;
pub use payload::DeliveryPayload;

/// One delivery attempt for one node
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Deliver the node's current report; `true` only on confirmed success
    async fn dispatch(&self, node: &Node) -> bool;
}
