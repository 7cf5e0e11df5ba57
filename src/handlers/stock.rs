use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::{
    errors::ServiceError,
    services::ledger::{LotFilter, MovementFilter},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_lots))
        .route("/movements", get(movement_history))
        .route("/summary", get(stock_summary))
        .route("/:id", get(get_lot))
}

async fn list_lots(
    State(state): State<AppState>,
    Query(filter): Query<LotFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let lots = state.services.ledger.list_lots(&filter).await?;
    let total = lots.len();
    Ok(Json(json!({ "data": lots, "total": total })))
}

async fn get_lot(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let lot = state.services.ledger.get_lot(id).await?;
    Ok(Json(lot))
}

async fn movement_history(
    State(state): State<AppState>,
    Query(filter): Query<MovementFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let (data, total) = state.services.ledger.movement_history(&filter).await?;
    Ok(Json(json!({ "data": data, "total": total })))
}

async fn stock_summary(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let summary = state.services.ledger.stock_summary().await?;
    Ok(Json(summary))
}
