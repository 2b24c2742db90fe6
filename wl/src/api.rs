//! HTTP management API
//!
//! Routes:
//! - `GET /` and `GET /health`
//! - `GET /api/wave-nodes`, `GET|PATCH /api/wave-nodes/{id}`
//! - `GET /api/nodes/active`
//!
//! Every error responds with a `{"detail": "..."}` body.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use nodestore::{Node, StateStore, StoreError, StoreResult};
use serde::Deserialize;
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

const SERVICE_NAME: &str = "waveslab-api";

/// Shared state for handlers
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<StateStore>,
}

/// Body of `PATCH /api/wave-nodes/{id}`
#[derive(Debug, Deserialize)]
pub struct NodeUpdate {
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

/// Error rendered as `{"detail": ...}`
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        error!(error = %e, "Store failure while serving request");
        Self::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
            Self::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            Self::Internal(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn build_router(store: Arc<StateStore>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/wave-nodes", get(list_nodes))
        .route("/api/wave-nodes/{id}", get(get_node).patch(update_node))
        .route("/api/nodes/active", get(list_active_nodes))
        .with_state(ApiState { store })
}

/// Serve the API on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, store: Arc<StateStore>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Management API listening on http://{}", addr);
    }
    axum::serve(listener, build_router(store))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Run a store operation off the async runtime
async fn with_store<T, F>(state: &ApiState, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&StateStore) -> StoreResult<T> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    let result = tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|e| ApiError::Internal(format!("store task failed: {}", e)))?;
    Ok(result?)
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "WavesLab Simulation Environment API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "nodes": "/api/wave-nodes",
            "specific_node": "/api/wave-nodes/{id}",
            "active_nodes": "/api/nodes/active",
        }
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": SERVICE_NAME }))
}

async fn list_nodes(State(state): State<ApiState>) -> ApiResult<Vec<Node>> {
    let nodes = with_store(&state, |store| store.list_nodes()).await?;
    info!("Retrieved {} wave nodes", nodes.len());
    Ok(Json(nodes))
}

async fn get_node(State(state): State<ApiState>, Path(id): Path<String>) -> ApiResult<Node> {
    debug!(%id, "get_node: called");
    let lookup = id.clone();
    match with_store(&state, move |store| store.get_node(&lookup)).await? {
        Some(node) => Ok(Json(node)),
        None => {
            warn!("Node with ID '{}' not found", id);
            Err(not_found(&id))
        }
    }
}

async fn update_node(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Result<Json<NodeUpdate>, JsonRejection>,
) -> ApiResult<Node> {
    debug!(%id, "update_node: called");
    let Json(update) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let url = match update.endpoint_url {
        Some(url) if !url.trim().is_empty() => url,
        _ => {
            warn!(%id, "Endpoint URL is required for update");
            return Err(ApiError::BadRequest("endpoint_url is required".to_string()));
        }
    };

    let lookup = id.clone();
    let new_url = url.clone();
    match with_store(&state, move |store| store.update_endpoint(&lookup, &new_url)).await? {
        Some(node) => {
            info!("Updated node '{}' endpoint to '{}'", id, url);
            Ok(Json(node))
        }
        None => {
            warn!("Node with ID '{}' not found for update", id);
            Err(not_found(&id))
        }
    }
}

async fn list_active_nodes(State(state): State<ApiState>) -> ApiResult<Vec<Node>> {
    let nodes = with_store(&state, |store| store.list_active_nodes()).await?;
    info!("Retrieved {} active nodes", nodes.len());
    Ok(Json(nodes))
}

fn not_found(id: &str) -> ApiError {
    ApiError::NotFound(format!("WaveNode with ID '{}' not found", id))
}
