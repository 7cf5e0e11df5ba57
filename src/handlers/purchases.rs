use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    errors::ServiceError,
    handlers::acting_user,
    services::receiving::{NewPurchase, PurchaseFilter, UpdatePurchase},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_purchases).post(create_purchase))
        .route("/:id", get(get_purchase).put(update_purchase))
        .route("/:id/cancel", post(cancel_purchase))
}

async fn create_purchase(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(dto): Json<NewPurchase>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = acting_user(&headers)?;
    let created = state.services.receiving.create_purchase(dto, user).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_purchases(
    State(state): State<AppState>,
    Query(filter): Query<PurchaseFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let (data, total) = state.services.receiving.list_purchases(&filter).await?;
    Ok(Json(json!({ "data": data, "total": total })))
}

async fn get_purchase(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let detail = state.services.receiving.get_purchase(id).await?;
    Ok(Json(detail))
}

async fn update_purchase(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<UpdatePurchase>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state.services.receiving.update_purchase(id, patch).await?;
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
struct CancelRequest {
    reason: String,
}

async fn cancel_purchase(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<CancelRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = acting_user(&headers)?;
    state
        .services
        .receiving
        .cancel_purchase(id, user, body.reason)
        .await?;
    Ok(Json(json!({ "ok": true })))
}
