use crate::analysis::{SignificanceScorer, WindowAggregator};
use crate::pipeline::{ArchiveStats, Diagnosis, Trigger};
use crate::storage::RecordStore;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, warn};

/// Shared state for the HTTP API
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub aggregator: Arc<WindowAggregator>,
    pub scorer: SignificanceScorer,
    /// Sender into the scheduler loop; `None` when no scheduler is running
    pub triggers: Option<mpsc::Sender<Trigger>>,
    pub admin_token: Option<String>,
    pub window_hours: u64,
    pub min_patterns: u64,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        triggers: Option<mpsc::Sender<Trigger>>,
        admin_token: Option<String>,
        window_hours: u64,
        min_patterns: u64,
    ) -> Self {
        Self {
            aggregator: Arc::new(WindowAggregator::new(store.clone())),
            scorer: SignificanceScorer::new(),
            store,
            triggers,
            admin_token,
            window_hours,
            min_patterns,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct PatternsQuery {
    #[serde(default)]
    pub hours: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub message: String,
    pub action: Trigger,
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<ArchiveStats>, ApiError> {
    let stats = ArchiveStats::collect(state.store.as_ref(), state.min_patterns)
        .await
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(Json(stats))
}

/// GET /api/patterns?hours=N
/// Read-only: scores the window without claiming or posting anything
pub async fn get_patterns(
    State(state): State<AppState>,
    Query(query): Query<PatternsQuery>,
) -> Result<Json<Diagnosis>, ApiError> {
    let hours = query.hours.unwrap_or(state.window_hours);
    if hours == 0 {
        return Err(ApiError::BadRequest("hours must be at least 1".to_string()));
    }

    let diagnosis = Diagnosis::collect(&state.aggregator, &state.scorer, hours)
        .await
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(Json(diagnosis))
}

/// POST /api/trigger
pub async fn trigger(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<(StatusCode, Json<TriggerResponse>), ApiError> {
    authorize(&headers, state.admin_token.as_deref())?;

    let request: TriggerRequest = serde_json::from_str(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid request body: {}", e)))?;
    let action: Trigger = request.action.parse().map_err(ApiError::BadRequest)?;

    let sender = state
        .triggers
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("scheduler is not running".to_string()))?;

    sender.try_send(action).map_err(|e| match e {
        TrySendError::Full(_) => ApiError::Unavailable("a run is already queued".to_string()),
        TrySendError::Closed(_) => ApiError::Unavailable("scheduler has stopped".to_string()),
    })?;

    info!(?action, "Run triggered over HTTP");

    let message = match action {
        Trigger::Archive => "Archive triggered",
        Trigger::Post => "Post triggered",
    };
    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            message: message.to_string(),
            action,
        }),
    ))
}

fn authorize(headers: &HeaderMap, admin_token: Option<&str>) -> Result<(), ApiError> {
    let Some(token) = admin_token else {
        warn!("Trigger refused, no admin token configured");
        return Err(ApiError::Unauthorized);
    };

    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match provided {
        Some(candidate) if candidate == token => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

// Error handling
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    Unavailable(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
