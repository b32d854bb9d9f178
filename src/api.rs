use axum::{
    async_trait,
    extract::{rejection::QueryRejection, FromRef, FromRequestParts, Query, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::error::StoreError;
use crate::models::{BacktestFilters, NewPrediction};
use crate::service::{BacktestService, ServiceError};

/// Header the upstream auth gateway sets once a session is verified.
pub const USER_HEADER: &str = "x-user-id";

/// Header carrying the shared secret on pipeline and scheduler routes.
pub const INGEST_TOKEN_HEADER: &str = "x-ingest-token";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BacktestService>,
    pub ingest_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(service: Arc<BacktestService>, ingest_token: Option<String>) -> Self {
        if ingest_token.is_none() {
            warn!("INGEST_TOKEN not set; prediction and check routes will refuse all callers");
        }
        Self {
            service,
            ingest_token: ingest_token.map(Arc::from),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/predictions", post(save_prediction))
        .route("/api/backtest/check", post(check_pending))
        .route("/api/backtest/stats", get(backtest_stats))
        .route("/api/backtest/summary", get(backtest_summary))
        .route("/api/backtest/symbols", get(backtest_symbols))
        .route("/api/backtest/export", get(export_backtest))
        .with_state(state)
}

/// The caller's user id, as established by the auth collaborator.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| AuthUser(v.to_string()))
            .ok_or(ApiError::Unauthorized)
    }
}

/// A trusted internal caller (analysis pipeline or scheduler) that
/// presented the configured ingest token.
#[derive(Debug, Clone, Copy)]
pub struct InternalCaller;

#[async_trait]
impl<S> FromRequestParts<S> for InternalCaller
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);
        let Some(expected) = app.ingest_token else {
            return Err(ApiError::Unauthorized);
        };
        let presented = parts
            .headers
            .get(INGEST_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim);
        match presented {
            Some(token) if token == &*expected => Ok(InternalCaller),
            _ => {
                warn!("Rejected internal route call without a valid ingest token");
                Err(ApiError::Unauthorized)
            }
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    BadRequest(String),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Store(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "unauthorized" })),
            )
                .into_response(),
            ApiError::BadRequest(msg) => {
                warn!("Rejected request: {}", msg);
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

/// Query strings that fail to decode get a fixed message; the raw value is
/// only logged.
fn filters(query: Result<Query<BacktestFilters>, QueryRejection>) -> Result<BacktestFilters, ApiError> {
    query.map(|Query(f)| f).map_err(|e| {
        debug!("Bad filter query: {}", e);
        ApiError::BadRequest("invalid filter parameters".to_string())
    })
}

async fn save_prediction(
    State(state): State<AppState>,
    _caller: InternalCaller,
    Json(input): Json<NewPrediction>,
) -> Result<Response, ApiError> {
    let id = state.service.save(input).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))).into_response())
}

async fn check_pending(
    State(state): State<AppState>,
    _caller: InternalCaller,
) -> Result<Response, ApiError> {
    let report = state.service.check_pending_predictions().await?;
    Ok(Json(report).into_response())
}

async fn backtest_stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    query: Result<Query<BacktestFilters>, QueryRejection>,
) -> Result<Response, ApiError> {
    let stats = state.service.get_backtest_stats(&user, &filters(query)?).await?;
    Ok(Json(stats).into_response())
}

async fn backtest_summary(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    query: Result<Query<BacktestFilters>, QueryRejection>,
) -> Result<Response, ApiError> {
    let summary = state.service.get_backtest_summary(&user, &filters(query)?).await?;
    Ok(Json(summary).into_response())
}

async fn backtest_symbols(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Response, ApiError> {
    let symbols = state.service.get_backtest_symbols(&user).await?;
    Ok(Json(json!({ "symbols": symbols })).into_response())
}

async fn export_backtest(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    query: Result<Query<BacktestFilters>, QueryRejection>,
) -> Result<Response, ApiError> {
    let csv = state
        .service
        .export_backtest_data(&user, &filters(query)?)
        .await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        state.service.export_filename()
    );
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}
