use chrono::NaiveDate;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One adjusted lot of an adjustment, denormalized at adjustment time.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "adjustment_lines")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub adjustment_id: i64,
    pub lot_id: i64,
    pub catalog_item_id: Option<i64>,
    pub product_code: i32,
    pub product_name: String,
    pub characteristics: String,
    pub quantity: i32,
    pub presentation_code: Option<i32>,
    pub presentation: Option<String>,
    pub unit_of_measure: Option<String>,
    pub batch: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::adjustment::Entity",
        from = "Column::AdjustmentId",
        to = "super::adjustment::Column::Id"
    )]
    Adjustment,
    #[sea_orm(
        belongs_to = "super::stock_lot::Entity",
        from = "Column::LotId",
        to = "super::stock_lot::Column::Id"
    )]
    StockLot,
}

impl Related<super::adjustment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Adjustment.def()
    }
}

impl Related<super::stock_lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockLot.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
