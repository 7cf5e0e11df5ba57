use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::{
    errors::ServiceError,
    handlers::acting_user,
    services::allocation::{AvailabilityFilter, DispatchFilter, NewDispatch},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_dispatches).post(create_dispatch))
        .route("/availability", get(query_availability))
        .route("/:id", get(get_dispatch))
}

async fn query_availability(
    State(state): State<AppState>,
    Query(filter): Query<AvailabilityFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let products = state.services.allocation.query_availability(&filter).await?;
    Ok(Json(products))
}

async fn create_dispatch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(dto): Json<NewDispatch>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = acting_user(&headers)?;
    let dispatch = state.services.allocation.create_dispatch(dto, user).await?;
    Ok((StatusCode::CREATED, Json(dispatch)))
}

async fn list_dispatches(
    State(state): State<AppState>,
    Query(filter): Query<DispatchFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let (data, total) = state.services.allocation.list_dispatches(&filter).await?;
    Ok(Json(json!({ "data": data, "total": total })))
}

async fn get_dispatch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let dispatch = state.services.allocation.get_dispatch(id).await?;
    Ok(Json(dispatch))
}
