use crate::{
    error::Result,
    models::{notification::*, response::ApiResponse},
    state::AppState,
};
use axum::{extract::State, response::Json, routing::post, Router};
use std::sync::Arc;
use tracing::info;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/progress", post(run_progress_notification))
        .route("/kpi", post(send_kpi_notification))
}

/// 进度检查并发送通知
/// POST /api/notification/progress
pub async fn run_progress_notification(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<ProgressNotificationRequest>,
) -> Result<Json<ApiResponse<ProgressNotificationResponse>>> {
    info!(target_date = %request.target_date, "Progress notification requested");

    let response = app_state
        .notification_service
        .run_progress_check(request.target_date)
        .await?;

    Ok(Json(ApiResponse::success(response)))
}

/// POST /api/notification/kpi
pub async fn send_kpi_notification(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<KpiNotificationRequest>,
) -> Result<Json<ApiResponse<KpiNotificationResponse>>> {
    let response = app_state.notification_service.send_kpi_notification(&request).await?;

    let message = if response.success {
        "KPI notification sent"
    } else {
        "KPI notification could not be delivered"
    };
    Ok(Json(ApiResponse::success_with_message(response, message)))
}
