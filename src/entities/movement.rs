use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One immutable ledger entry. Quantity is stored as an unsigned magnitude;
/// the sign is carried by `kind`. Rows are never updated — they are only
/// deleted as part of a fully validated reversal or cancellation of the
/// transaction that created them.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub lot_id: i64,
    pub catalog_item_id: Option<i64>,
    pub purchase_id: Option<i64>,
    pub dispatch_id: Option<i64>,
    pub adjustment_id: Option<i64>,
    pub quantity: i32,
    pub kind: String,
    pub module: String,
    pub user_id: i64,
    pub batch: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    pub moved_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_lot::Entity",
        from = "Column::LotId",
        to = "super::stock_lot::Column::Id"
    )]
    StockLot,
}

impl Related<super::stock_lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockLot.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Movement kinds, signed by direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementKind {
    StockIn,
    DispatchOut,
    AdjustmentIn,
    AdjustmentOut,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::StockIn => "STOCK_IN",
            MovementKind::DispatchOut => "DISPATCH_OUT",
            MovementKind::AdjustmentIn => "ADJUSTMENT_IN",
            MovementKind::AdjustmentOut => "ADJUSTMENT_OUT",
        }
    }

    /// +1 for kinds that add stock, -1 for kinds that remove it.
    pub fn sign(&self) -> i32 {
        match self {
            MovementKind::StockIn | MovementKind::AdjustmentIn => 1,
            MovementKind::DispatchOut | MovementKind::AdjustmentOut => -1,
        }
    }
}

/// Module that originated a movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementModule {
    Receiving,
    Dispatch,
    Adjustment,
}

impl MovementModule {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementModule::Receiving => "RECEIVING",
            MovementModule::Dispatch => "DISPATCH",
            MovementModule::Adjustment => "ADJUSTMENT",
        }
    }
}
