use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    errors::ServiceError,
    handlers::acting_user,
    services::adjustment::{AdjustmentFilter, NewAdjustment},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_adjustments).post(create_adjustment))
        .route("/catalog-search", get(search_catalog))
        .route("/:id", get(get_adjustment).delete(reverse_adjustment))
}

async fn create_adjustment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(dto): Json<NewAdjustment>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = acting_user(&headers)?;
    let created = state.services.adjustment.create_adjustment(dto, user).await?;
    let detail = state
        .services
        .adjustment
        .get_adjustment(created.adjustment_id)
        .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn list_adjustments(
    State(state): State<AppState>,
    Query(filter): Query<AdjustmentFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let (data, total) = state.services.adjustment.list_adjustments(&filter).await?;
    Ok(Json(json!({ "data": data, "total": total })))
}

async fn get_adjustment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let detail = state.services.adjustment.get_adjustment(id).await?;
    Ok(Json(detail))
}

async fn reverse_adjustment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let user = acting_user(&headers)?;
    state.services.adjustment.reverse_adjustment(id, user).await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
struct CatalogSearchQuery {
    term: String,
}

async fn search_catalog(
    State(state): State<AppState>,
    Query(query): Query<CatalogSearchQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let user = acting_user(&headers)?;
    let items = state
        .services
        .adjustment
        .search_catalog(&query.term, user)
        .await?;
    Ok(Json(items))
}
