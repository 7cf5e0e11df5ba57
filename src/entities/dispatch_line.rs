use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One consumed lot fragment of a dispatch, denormalized at dispatch time
/// so the record survives later lot mutations.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dispatch_lines")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub dispatch_id: i64,
    pub lot_id: i64,
    pub catalog_item_id: Option<i64>,
    pub purchase_id: Option<i64>,
    pub product_code: i32,
    pub product_name: String,
    pub characteristics: String,
    pub presentation_code: Option<i32>,
    pub presentation: Option<String>,
    pub unit_of_measure: Option<String>,
    pub batch: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    pub quantity: i32,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub unit_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub line_total: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::dispatch::Entity",
        from = "Column::DispatchId",
        to = "super::dispatch::Column::Id"
    )]
    Dispatch,
    #[sea_orm(
        belongs_to = "super::stock_lot::Entity",
        from = "Column::LotId",
        to = "super::stock_lot::Column::Id"
    )]
    StockLot,
}

impl Related<super::dispatch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Dispatch.def()
    }
}

impl Related<super::stock_lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockLot.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
