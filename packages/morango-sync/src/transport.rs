//! Wire transport: the `NetworkSyncConnection` contract, an HTTP client
//! implementation over `reqwest`, and the `axum` handlers that serve the
//! other side of the same contract.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use morango_core::wire::{intersect_capabilities, BufferWireRecord, RmcbWireEntry, CAPABILITIES};
use morango_core::{BufferRecord, RecordMaxCounterBuffer};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::NetworkConfig;
use crate::storage::SessionStore;
use morango_core::SyncRepository;

/// One side of a transfer's wire exchange: push a chunk of buffer rows to
/// the peer, or pull the peer's chunk for this transfer.
#[async_trait]
pub trait NetworkSyncConnection: Send + Sync {
    /// # Errors
    /// Returns an error if the peer is unreachable or rejects the chunk.
    async fn push_buffer_chunk(&self, transfer_session_id: &str, chunk: Vec<BufferWireRecord>) -> anyhow::Result<()>;

    /// # Errors
    /// Returns an error if the peer is unreachable or the transfer is unknown to it.
    async fn pull_buffer_chunk(&self, transfer_session_id: &str) -> anyhow::Result<Vec<BufferWireRecord>>;

    /// # Errors
    /// Returns an error if the peer is unreachable.
    async fn negotiate_capabilities(&self) -> anyhow::Result<Vec<String>>;
}

/// HTTP implementation of [`NetworkSyncConnection`] over `reqwest`.
pub struct HttpSyncConnection {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSyncConnection {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }
}

#[async_trait]
impl NetworkSyncConnection for HttpSyncConnection {
    async fn push_buffer_chunk(&self, transfer_session_id: &str, chunk: Vec<BufferWireRecord>) -> anyhow::Result<()> {
        let url = format!("{}/sync/transfers/{transfer_session_id}/buffer", self.base_url);
        self.client.post(url).json(&chunk).send().await?.error_for_status()?;
        Ok(())
    }

    async fn pull_buffer_chunk(&self, transfer_session_id: &str) -> anyhow::Result<Vec<BufferWireRecord>> {
        let url = format!("{}/sync/transfers/{transfer_session_id}/buffer", self.base_url);
        let chunk = self.client.get(url).send().await?.error_for_status()?.json().await?;
        Ok(chunk)
    }

    async fn negotiate_capabilities(&self) -> anyhow::Result<Vec<String>> {
        let url = format!("{}/sync/capabilities", self.base_url);
        let response: CapabilitiesResponse = self.client.get(url).send().await?.error_for_status()?.json().await?;
        Ok(intersect_capabilities(&response.capabilities))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CapabilitiesResponse {
    capabilities: Vec<String>,
}

/// Shared state for the axum server side of the transport.
pub struct ServerState {
    pub repository: Arc<dyn SyncRepository>,
    pub session_store: Arc<dyn SessionStore>,
}

/// Encodes one stored buffer row plus its RMCBuffer rows for the wire.
#[must_use]
pub fn to_buffer_wire(record: &BufferRecord, rmcb: &[RecordMaxCounterBuffer]) -> BufferWireRecord {
    BufferWireRecord {
        model_uuid: record.model_uuid.clone(),
        serialized: record.serialized.clone(),
        deleted: record.deleted,
        hard_deleted: record.hard_deleted,
        last_saved_instance: record.last_saved_instance.clone(),
        last_saved_counter: record.last_saved_counter,
        model_name: String::new(),
        profile: record.profile.clone(),
        partition: record.partition.clone(),
        source_id: record.model_uuid.clone(),
        conflicting_serialized_data: record.conflicting_serialized_data.clone(),
        rmcb_list: rmcb.iter().map(|r| RmcbWireEntry { instance_id: r.instance_id.clone(), counter: r.counter }).collect(),
    }
}

/// Decodes a wire buffer record back into a [`BufferRecord`] plus its
/// [`RecordMaxCounterBuffer`] rows, stamped with `transfer_session_id`.
#[must_use]
pub fn from_buffer_wire(transfer_session_id: &str, wire: BufferWireRecord) -> (BufferRecord, Vec<RecordMaxCounterBuffer>) {
    let record = BufferRecord {
        transfer_session_id: transfer_session_id.to_string(),
        model_uuid: wire.model_uuid.clone(),
        serialized: wire.serialized,
        deleted: wire.deleted,
        hard_deleted: wire.hard_deleted,
        last_saved_instance: wire.last_saved_instance,
        last_saved_counter: wire.last_saved_counter,
        profile: wire.profile,
        partition: wire.partition,
        conflicting_serialized_data: wire.conflicting_serialized_data,
    };
    let rmcb = wire
        .rmcb_list
        .into_iter()
        .map(|entry| RecordMaxCounterBuffer {
            transfer_session_id: transfer_session_id.to_string(),
            model_uuid: wire.model_uuid.clone(),
            instance_id: entry.instance_id,
            counter: entry.counter,
        })
        .collect();
    (record, rmcb)
}

async fn get_capabilities() -> Json<CapabilitiesResponse> {
    Json(CapabilitiesResponse { capabilities: CAPABILITIES.iter().map(ToString::to_string).collect() })
}

async fn get_buffer(State(state): State<Arc<ServerState>>, Path(transfer_session_id): Path<String>) -> Json<Vec<BufferWireRecord>> {
    let rows = state.repository.buffer_rows(&transfer_session_id);
    let wire = rows
        .into_iter()
        .map(|row| {
            let rmcb = state.repository.rmcb_rows_for_model(&transfer_session_id, &row.model_uuid);
            to_buffer_wire(&row, &rmcb)
        })
        .collect();
    Json(wire)
}

async fn post_buffer(
    State(state): State<Arc<ServerState>>,
    Path(transfer_session_id): Path<String>,
    Json(chunk): Json<Vec<BufferWireRecord>>,
) -> Json<serde_json::Value> {
    for wire in chunk {
        let (record, rmcb_rows) = from_buffer_wire(&transfer_session_id, wire);
        state.repository.put_buffer_row(record);
        for rmcb in rmcb_rows {
            state.repository.put_rmcb_row(rmcb);
        }
    }
    Json(serde_json::json!({ "accepted": true }))
}

/// Builds the router a `morango-sync` server mounts for peers to push/pull
/// against, wrapped in the standard HTTP middleware stack from
/// [`build_http_layers`].
#[must_use]
pub fn build_router(state: Arc<ServerState>, network_config: &NetworkConfig) -> Router {
    Router::new()
        .route("/sync/capabilities", get(get_capabilities))
        .route("/sync/transfers/{transfer_session_id}/buffer", get(get_buffer).post(post_buffer))
        .with_state(state)
        .layer(build_http_layers(network_config))
}

/// The composed Tower layer type produced by [`build_http_layers`]: each
/// layer wraps the next, from outermost (first applied) to innermost.
type HttpLayers = tower::layer::util::Stack<
    TimeoutLayer,
    tower::layer::util::Stack<CorsLayer, tower::layer::util::Stack<TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>>, tower::layer::util::Identity>>,
>;

/// Transport-level Tower middleware applied to every incoming request:
/// tracing spans, CORS, and a request timeout, in that order
/// (outermost-to-innermost).
///
/// Compression and request-id propagation are left out since this service
/// exchanges small JSON chunks rather than bulk payloads and has no
/// multi-hop proxy in front of it to correlate request ids across.
fn build_http_layers(config: &NetworkConfig) -> HttpLayers {
    ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&config.cors_origins))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, config.request_timeout))
        .into_inner()
}

/// Builds the CORS layer from the configured list of allowed origins. A
/// wildcard `"*"` allows any origin; otherwise each origin is parsed into
/// an explicit allowlist.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| o.parse().ok()).collect::<Vec<_>>())
    };

    CorsLayer::new().allow_origin(allow_origin).allow_methods([Method::GET, Method::POST]).allow_headers(Any)
}
