use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use optislip_core::models::QueueStats;
use optislip_core::services::{DatabaseService, SyncService};
use optislip_core::sync::DispatchSummary;
use optislip_core::util::fingerprint;
use optislip_core::{Clock, IdentityResolver, OwnerContext, SyncItem, SyncRequest};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{extract_bearer_token, JwtVerifier};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::rate_limit::{EndpointRateLimiter, ProtectedEndpoint, RateLimitMetricsSnapshot};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sync: SyncService,
    identity: IdentityResolver,
    jwt_verifier: Arc<JwtVerifier>,
    endpoint_rate_limiter: Arc<EndpointRateLimiter>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, db: DatabaseService, clock: Arc<dyn Clock>) -> Self {
        Self {
            sync: SyncService::new(db.clone(), clock, config.sync_options()),
            identity: IdentityResolver::new(db),
            jwt_verifier: Arc::new(JwtVerifier::from_config(&config)),
            endpoint_rate_limiter: Arc::new(EndpointRateLimiter::from_config(config.as_ref())),
            config,
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let sync_routes = Router::new()
        .route("/add", post(add_sync_item))
        .route("/bulk", post(add_bulk_sync_items))
        .route("/pending", get(pending_syncs))
        .route("/process", post(process_sync_queue))
        .route("/clear", delete(clear_sync_queue))
        .route("/stats", get(queue_stats))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/health", get(healthz))
        .nest("/api/sync", sync_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    rate_limit: RateLimitMetricsSnapshot,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        rate_limit: state.endpoint_rate_limiter.metrics_snapshot(),
    })
}

/// Verify the bearer token and attach the caller's [`OwnerContext`].
async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;
    let principal = state.jwt_verifier.verify_access_token(token)?;
    let owner = state.identity.resolve(&principal).await?;
    request.extensions_mut().insert(owner);
    Ok(next.run(request).await)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddResponse {
    message: &'static str,
    sync_item: SyncItem,
}

async fn add_sync_item(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<AddResponse>), AppError> {
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::Enqueue, &owner.owner_id)
        .await?;
    let Json(body) = body?;

    let request: SyncRequest = serde_json::from_value(body)
        .map_err(|error| AppError::bad_request(format!("Malformed sync item: {error}")))?;
    let sync_item = state.sync.enqueue(&owner.owner_id, request).await?;
    tracing::info!(
        endpoint = "sync_add",
        owner = fingerprint(&owner.owner_id),
        sub_identity = owner.is_sub_identity,
        item = %sync_item.id,
        "Queued sync item"
    );
    Ok((
        StatusCode::CREATED,
        Json(AddResponse {
            message: "Sync item added successfully",
            sync_item,
        }),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BulkResponse {
    message: &'static str,
    count: usize,
    rejected: usize,
}

async fn add_bulk_sync_items(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<BulkResponse>), AppError> {
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::Enqueue, &owner.owner_id)
        .await?;
    let Json(body) = body?;

    let Some(Value::Array(items)) = body.get("items").cloned() else {
        return Err(AppError::bad_request("Items must be an array"));
    };
    let receipt = state.sync.enqueue_batch(&owner.owner_id, items).await?;
    Ok((
        StatusCode::CREATED,
        Json(BulkResponse {
            message: "Bulk sync items added successfully",
            count: receipt.count,
            rejected: receipt.rejected,
        }),
    ))
}

#[derive(Debug, Serialize)]
struct PendingResponse {
    message: &'static str,
    count: usize,
    syncs: Vec<SyncItem>,
}

async fn pending_syncs(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
) -> Result<Json<PendingResponse>, AppError> {
    let syncs = state.sync.list_pending(&owner.owner_id).await?;
    Ok(Json(PendingResponse {
        message: "Pending syncs retrieved successfully",
        count: syncs.len(),
        syncs,
    }))
}

#[derive(Debug, Serialize)]
struct ProcessResponse {
    message: &'static str,
    #[serde(flatten)]
    summary: DispatchSummary,
}

async fn process_sync_queue(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
) -> Result<Json<ProcessResponse>, AppError> {
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::Dispatch, &owner.owner_id)
        .await?;

    let summary = state.sync.dispatch(&owner.owner_id).await?;
    let message = if summary.processed == 0 && summary.skipped == 0 {
        "No pending syncs"
    } else {
        "Sync queue processed"
    };
    Ok(Json(ProcessResponse { message, summary }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClearResponse {
    message: &'static str,
    deleted_count: u64,
}

async fn clear_sync_queue(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
) -> Result<Json<ClearResponse>, AppError> {
    let deleted_count = state.sync.clear_queue(&owner.owner_id).await?;
    Ok(Json(ClearResponse {
        message: "Sync queue cleared",
        deleted_count,
    }))
}

async fn queue_stats(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
) -> Result<Json<QueueStats>, AppError> {
    Ok(Json(state.sync.queue_stats(&owner.owner_id).await?))
}
