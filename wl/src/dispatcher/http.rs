//! HTTP dispatcher backed by a shared reqwest client

use async_trait::async_trait;
use nodestore::Node;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, error, info};

use super::{DeliveryPayload, DispatchError, Dispatcher};

/// POSTs node reports as JSON
///
/// The underlying client (and its connection pool) is shared by every call
/// and released when the dispatcher is dropped.
pub struct HttpDispatcher {
    http: Client,
    timeout: Duration,
}

impl HttpDispatcher {
    /// Create a dispatcher whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        debug!(?timeout, "HttpDispatcher::new: called");
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, timeout })
    }

    /// Send one report, classifying the failure if there is one
    pub async fn send(&self, node: &Node) -> Result<(), DispatchError> {
        debug!(node = %node.id, endpoint = %node.endpoint_url, "send: called");
        let payload = DeliveryPayload::from(node);

        let response = self
            .http
            .post(&node.endpoint_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DispatchError::from_reqwest(e, self.timeout))?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(DispatchError::Status(status.as_u16())),
        }
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn dispatch(&self, node: &Node) -> bool {
        match self.send(node).await {
            Ok(()) => {
                info!(node = %node.name, endpoint = %node.endpoint_url, "Request sent successfully");
                true
            }
            Err(DispatchError::Status(code)) => {
                info!(node = %node.name, code, "Request failed: HTTP {}", code);
                false
            }
            Err(DispatchError::Timeout(after)) => {
                info!(node = %node.name, endpoint = %node.endpoint_url, ?after, "Request timeout");
                false
            }
            Err(e @ DispatchError::Network(_)) => {
                info!(node = %node.name, error = %e, "Network error");
                false
            }
            Err(e @ DispatchError::Unexpected(_)) => {
                error!(node = %node.name, error = %e, "Unexpected error sending request");
                false
            }
        }
    }
}
