//! Database entities for the stock ledger.
//!
//! Every table is addressed by an opaque integer id; cross-references
//! between lots, transactions and movements are plain foreign-key columns,
//! never owning pointers. The ledger tables (`stock_lots`,
//! `stock_movements`) are the single source of truth for on-hand state.

pub mod adjustment;
pub mod adjustment_line;
pub mod catalog_item;
pub mod dispatch;
pub mod dispatch_line;
pub mod movement;
pub mod purchase;
pub mod purchase_line;
pub mod purchase_lot;
pub mod service_unit;
pub mod stock_lot;
pub mod user;
pub mod user_budget_line;
