use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A physical stock lot: one batch of a product/presentation combination.
///
/// `remaining_quantity` never goes negative and `total_price` is always
/// `unit_price * remaining_quantity`, recomputed on every mutation.
/// `purchase_id`/`purchase_lot_id` are null only for lots created directly
/// by an entry adjustment; those carry a mandatory `kardex_number` instead.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_lots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub purchase_id: Option<i64>,
    pub purchase_lot_id: Option<i64>,
    pub budget_line: i32,
    pub product_code: i32,
    pub product_name: String,
    pub characteristics: String,
    pub presentation_code: i32,
    pub presentation: String,
    pub unit_of_measure: String,
    pub batch: String,
    pub expiration_date: Option<NaiveDate>,
    pub commitment_letter: bool,
    pub return_months: Option<i32>,
    pub return_notes: Option<String>,
    pub remaining_quantity: i32,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub unit_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_price: Decimal,
    pub kardex_number: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::purchase::Entity",
        from = "Column::PurchaseId",
        to = "super::purchase::Column::Id"
    )]
    Purchase,
    #[sea_orm(
        belongs_to = "super::purchase_lot::Entity",
        from = "Column::PurchaseLotId",
        to = "super::purchase_lot::Column::Id"
    )]
    PurchaseLot,
    #[sea_orm(has_many = "super::movement::Entity")]
    Movements,
    #[sea_orm(has_many = "super::dispatch_line::Entity")]
    DispatchLines,
}

impl Related<super::purchase::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Purchase.def()
    }
}

impl Related<super::movement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Movements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Lot has no purchase back-reference (created by an adjustment).
    pub fn is_orphan(&self) -> bool {
        self.purchase_id.is_none() && self.purchase_lot_id.is_none()
    }
}
