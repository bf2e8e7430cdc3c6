//! Routes of the holder read API.

use alloy_primitives::Address;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use flowsnap_core::{
    config::ServerConfig,
    snapshot::{SnapshotStore, StoreError},
    types::HolderPage,
};
use serde::Deserialize;
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer};
use tracing::debug;

use crate::middleware::{correlation_span, create_request_id_layers};

pub const DEFAULT_LIMIT: usize = 100;
pub const MAX_LIMIT: usize = 1000;

/// Query string of `GET /v1/chains/{chain_id}/tokens/{token}/holders`.
///
/// Fields are kept as strings so that malformed values produce the API's own
/// JSON error body rather than the extractor's plain-text rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldersParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub min_balance_wei: Option<String>,
}

/// Errors returned by the read API, rendered as `{"error": {"code", "message"}}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = match self {
            Self::BadRequest(message) | Self::NotFound(message) => message,
        };

        (status, Json(json!({ "error": { "code": code, "message": message } }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidMinBalance(raw) => {
                Self::BadRequest(format!("minBalanceWei must be a base-10 integer, got {raw:?}"))
            }
            other => Self::BadRequest(other.to_string()),
        }
    }
}

fn parse_usize(name: &str, raw: Option<&str>, default: usize) -> Result<usize, ApiError> {
    match raw {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| {
            ApiError::BadRequest(format!("{name} must be a non-negative integer, got {raw:?}"))
        }),
    }
}

/// Serves a page of the latest published snapshot of `token` on `chain_id`.
///
/// # Errors
///
/// `400` for an unparsable chain id, token address, `limit` outside
/// `1..=1000`, `offset` or `minBalanceWei`; `404` when no snapshot has been
/// published for the pair yet.
pub async fn handle_holders(
    State(store): State<Arc<SnapshotStore>>,
    Path((chain_id, token)): Path<(String, String)>,
    Query(params): Query<HoldersParams>,
) -> Result<Json<HolderPage>, ApiError> {
    let chain_id: u64 = chain_id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid chain id {chain_id:?}")))?;
    let token: Address = token
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid token address {token:?}")))?;

    let limit = parse_usize("limit", params.limit.as_deref(), DEFAULT_LIMIT)?;
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::BadRequest(format!("limit must be between 1 and {MAX_LIMIT}")));
    }
    let offset = parse_usize("offset", params.offset.as_deref(), 0)?;

    let page = store
        .list_holders(chain_id, token, limit, offset, params.min_balance_wei.as_deref())?
        .ok_or_else(|| {
            ApiError::NotFound(format!("no snapshot for token {token} on chain {chain_id}"))
        })?;

    debug!(
        chain_id,
        %token,
        block_number = page.block_number,
        total = page.total,
        returned = page.holders.len(),
        "served holder page"
    );

    Ok(Json(page))
}

/// Liveness plus a summary of what is currently being served.
pub async fn handle_health(State(store): State<Arc<SnapshotStore>>) -> impl IntoResponse {
    let snapshots: Vec<_> = store
        .keys()
        .into_iter()
        .filter_map(|key| store.get(&key))
        .map(|snapshot| {
            json!({
                "chainId": snapshot.chain_id,
                "token": snapshot.token,
                "blockNumber": snapshot.block_number,
                "generatedAt": snapshot.generated_at.to_rfc3339(),
                "holders": snapshot.holders.len(),
            })
        })
        .collect();

    Json(json!({
        "status": "ok",
        "snapshots": snapshots,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Builds the application router with its middleware stack.
///
/// Layers are applied in reverse order: the request ID is set first, then
/// propagated, then attached to the tracing span of the request.
pub fn create_app(store: Arc<SnapshotStore>, server: &ServerConfig) -> Router {
    let (set_request_id, propagate_request_id) = create_request_id_layers();

    Router::new()
        .route("/health", get(handle_health))
        .route("/v1/chains/{chain_id}/tokens/{token}/holders", get(handle_holders))
        .with_state(store)
        .layer(TimeoutLayer::new(Duration::from_secs(server.request_timeout_seconds)))
        .layer(ConcurrencyLimitLayer::new(server.max_concurrent_requests.max(1)))
        .layer(CompressionLayer::new())
        .layer(from_fn(correlation_span))
        .layer(propagate_request_id)
        .layer(set_request_id)
}
