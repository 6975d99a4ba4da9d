use crate::{
    error::{AppError, Result},
    models::response::ApiResponse,
    routes::extract::ApiPath,
    slack::{handle_event, EventOutcome, EventPayload, SlackResponse},
    state::AppState,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/:slack_id", get(get_slack_user))
        .route("/events", post(slack_events))
}

/// GET /api/slack/users/:slack_id
pub async fn get_slack_user(
    State(app_state): State<Arc<AppState>>,
    ApiPath(slack_id): ApiPath<String>,
) -> Result<Json<ApiResponse<SlackResponse>>> {
    let user = app_state.notification_service.get_slack_user(&slack_id).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// Slack Events API callback
/// POST /api/slack/events
///
/// 200 with the challenge for `url_verification`, 202 for a handled message,
/// 204 for everything else.
pub async fn slack_events(Json(payload): Json<EventPayload>) -> Result<Response> {
    let outcome = handle_event(&payload).map_err(|e| AppError::BadRequest(e.to_string()))?;

    Ok(match outcome {
        EventOutcome::Challenge(challenge) => Json(json!({ "challenge": challenge })).into_response(),
        EventOutcome::Processed => StatusCode::ACCEPTED.into_response(),
        EventOutcome::Ignored => StatusCode::NO_CONTENT.into_response(),
    })
}
