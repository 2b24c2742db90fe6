//! Ingress listener for delivered node reports
//!
//! Stands in for a real monitoring backend: accepts `POST /monitoring`, logs
//! each report and publishes it to any subscribers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use std::future::Future;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::dispatcher::DeliveryPayload;

const CHANNEL_CAPACITY: usize = 256;

/// Receives reports and fans them out to subscribers
#[derive(Clone)]
pub struct Ingress {
    tx: broadcast::Sender<DeliveryPayload>,
}

impl Default for Ingress {
    fn default() -> Self {
        Self::new()
    }
}

impl Ingress {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Receive every report accepted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<DeliveryPayload> {
        self.tx.subscribe()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/monitoring", post(monitoring))
            .with_state(self.clone())
    }

    /// Serve on `listener` until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = listener.local_addr() {
            info!("Ingress listening on http://{}/monitoring", addr);
        }
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
    }
}

/// One-line summary of a report: `<node> consumes: <rate>[ by <user>]`
pub fn describe(payload: &DeliveryPayload) -> String {
    match &payload.username {
        Some(user) => format!("{} consumes: {} by {}", payload.node_name, payload.provision_rate, user),
        None => format!("{} consumes: {}", payload.node_name, payload.provision_rate),
    }
}

async fn monitoring(State(ingress): State<Ingress>, Json(payload): Json<DeliveryPayload>) -> StatusCode {
    info!("{}", describe(&payload));
    // No subscribers is fine
    if ingress.tx.send(payload).is_err() {
        debug!("monitoring: no subscribers");
    }
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn spawn_ingress() -> (String, Ingress) {
        let ingress = Ingress::new();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = ingress.clone();
        tokio::spawn(async move { server.serve(listener, std::future::pending()).await });
        (format!("http://{}/monitoring", addr), ingress)
    }

    #[test]
    fn test_describe() {
        let mut payload = DeliveryPayload {
            node_name: "Kitchen Faucet".to_string(),
            provision_rate: 1.5,
            username: Some("alice".to_string()),
        };
        assert_eq!(describe(&payload), "Kitchen Faucet consumes: 1.5 by alice");

        payload.username = None;
        assert_eq!(describe(&payload), "Kitchen Faucet consumes: 1.5");
    }

    #[tokio::test]
    async fn test_accepts_and_publishes_report() {
        let (url, ingress) = spawn_ingress().await;
        let mut rx = ingress.subscribe();

        let response = reqwest::Client::new()
            .post(&url)
            .json(&json!({"node_name": "Boiler", "provision_rate": 2.0, "username": null}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.node_name, "Boiler");
        assert_eq!(received.username, None);
    }

    #[tokio::test]
    async fn test_rejects_malformed_report() {
        let (url, _ingress) = spawn_ingress().await;

        let response = reqwest::Client::new()
            .post(&url)
            .json(&json!({"provision_rate": "lots"}))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
