use crate::{
    error::Result,
    models::opportunity::*,
    routes::extract::{ApiPath, ApiQuery},
    state::AppState,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_opportunity))
        .route("/search", get(search_opportunities))
        .route("/search/", get(search_opportunities))
        .route(
            "/:id",
            get(get_opportunity)
                .put(update_opportunity)
                .delete(delete_opportunity),
        )
}

/// 获取案件详情
/// GET /api/opportunity/:id
pub async fn get_opportunity(
    State(app_state): State<Arc<AppState>>,
    ApiPath(opportunity_id): ApiPath<Uuid>,
) -> Result<Json<Value>> {
    let detail = app_state.opportunity_service.get_opportunity(opportunity_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": detail
    })))
}

/// 创建案件
/// POST /api/opportunity
pub async fn create_opportunity(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<CreateOpportunityRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let id = app_state.opportunity_service.create_opportunity(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": OpportunityCreated { id }
        })),
    ))
}

/// 更新案件
/// PUT /api/opportunity/:id
pub async fn update_opportunity(
    State(app_state): State<Arc<AppState>>,
    ApiPath(opportunity_id): ApiPath<Uuid>,
    Json(request): Json<UpdateOpportunityRequest>,
) -> Result<Json<Value>> {
    app_state
        .opportunity_service
        .update_opportunity(opportunity_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": { "status": "updated" }
    })))
}

/// 删除案件
/// DELETE /api/opportunity/:id
pub async fn delete_opportunity(
    State(app_state): State<Arc<AppState>>,
    ApiPath(opportunity_id): ApiPath<Uuid>,
) -> Result<StatusCode> {
    app_state.opportunity_service.delete_opportunity(opportunity_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 搜索案件
/// GET /api/opportunity/search/
pub async fn search_opportunities(
    State(app_state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<OpportunitySearchQuery>,
) -> Result<Json<Value>> {
    debug!("Searching opportunities with query: {:?}", query);

    let results = app_state.opportunity_service.search_opportunities(&query).await?;

    Ok(Json(json!({
        "success": true,
        "data": results
    })))
}
