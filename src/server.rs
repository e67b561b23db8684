use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::NutritionError;
use crate::handlers::FoodEntryHandler;
use crate::services::ModelBridge;

const USER_HEADER: &str = "x-user-id";
const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

pub struct AppState {
    pub handler: Arc<FoodEntryHandler>,
    pub bridge: Arc<dyn ModelBridge>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data: Some(data),
        })
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "invalid_input",
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let (status, kind) = classify(&err);
        if status.is_server_error() {
            log::error!("❌ Request failed: {:#}", err);
        }
        Self {
            status,
            kind,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "success": false,
            "error": self.kind,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

/// Status code and label for a handler error. Pipeline failures are
/// upstream problems, anything else is ours.
pub fn classify(err: &anyhow::Error) -> (StatusCode, &'static str) {
    match err.downcast_ref::<NutritionError>() {
        Some(e @ NutritionError::InvalidInput(_)) => (StatusCode::BAD_REQUEST, e.kind()),
        Some(e) => (StatusCode::BAD_GATEWAY, e.kind()),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    }
}

pub fn user_id(headers: &HeaderMap) -> Result<i64, ApiError> {
    let value = headers
        .get(USER_HEADER)
        .ok_or_else(|| ApiError::bad_request("X-User-Id header is required"))?;

    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::bad_request("X-User-Id must be a positive integer"))
}

#[derive(Debug, Deserialize)]
pub struct TextEntryRequest {
    pub food_name: Option<String>,
    #[serde(alias = "namesom")]
    pub localized_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl RangeQuery {
    /// Both bounds or neither.
    pub fn range(&self) -> Result<Option<(NaiveDate, NaiveDate)>, ApiError> {
        match (self.start_date, self.end_date) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) if start <= end => Ok(Some((start, end))),
            (Some(_), Some(_)) => Err(ApiError::bad_request("start_date must not be after end_date")),
            _ => Err(ApiError::bad_request("start_date and end_date must be given together")),
        }
    }
}

pub fn create_router(handler: Arc<FoodEntryHandler>, bridge: Arc<dyn ModelBridge>) -> Router {
    let state = Arc::new(AppState { handler, bridge });

    Router::new()
        .route("/food-entries", post(add_text_entry).get(list_entries))
        .route("/food-entries/image", post(add_image_entry))
        .route("/food-entries/:id", delete(delete_entry))
        .route("/ml/status", get(model_status))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES))
        .with_state(state)
}

async fn add_text_entry(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<TextEntryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user_id(&headers)?;
    let stored = state
        .handler
        .add_text_entry(user_id, request.food_name.as_deref(), request.localized_name.as_deref())
        .await?;

    Ok((StatusCode::CREATED, ApiResponse::ok("Food entry added successfully", stored)))
}

async fn add_image_entry(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user_id(&headers)?;
    let stored = state.handler.add_image_entry(user_id, body.to_vec()).await?;

    Ok((StatusCode::CREATED, ApiResponse::ok("Food entries added from image", stored)))
}

async fn list_entries(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<RangeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user_id(&headers)?;
    let report = state.handler.list_entries(user_id, query.range()?).await?;

    Ok(ApiResponse::ok("Food entries retrieved successfully", report))
}

async fn delete_entry(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let user_id = user_id(&headers)?;
    if !state.handler.delete_entry(user_id, id).await? {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"success": false, "message": "Food entry not found"})),
        )
            .into_response());
    }

    Ok(ApiResponse::ok("Food entry deleted successfully", id).into_response())
}

async fn model_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.bridge.check_availability().await;
    ApiResponse::ok(if status.available { "Models available" } else { "Models unavailable" }, status)
}

async fn health_check() -> &'static str {
    "OK"
}
