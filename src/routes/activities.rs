use crate::{
    error::Result,
    models::activity::*,
    state::AppState,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", post(create_activity_log))
}

/// 记录活动
/// POST /api/activity
pub async fn create_activity_log(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<CreateActivityLogRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let log = app_state.activity_service.create_activity_log(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": ActivityLogCreated { id: log.id }
        })),
    ))
}
