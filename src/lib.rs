//! bodega-api
//!
//! Warehouse stock ledger and lot allocation backend. Purchases create
//! stock lots, dispatches consume them earliest-expiration-first, manual
//! adjustments correct them, and every mutation lands in an immutable
//! movement ledger tied back to its originating transaction.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: services::AppServices,
}

/// Assembles the versioned API router.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1/purchases", handlers::purchases::router())
        .nest("/api/v1/dispatches", handlers::dispatches::router())
        .nest("/api/v1/adjustments", handlers::adjustments::router())
        .nest("/api/v1/stock", handlers::stock::router())
        .nest("/health", handlers::health::router())
        .with_state(state)
}
