use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Supply catalog: one row per product/presentation combination.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "catalog_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub budget_line: i32,
    pub product_code: i32,
    pub product_name: String,
    pub characteristics: String,
    pub presentation_code: i32,
    pub presentation_name: String,
    pub unit_of_measure: String,
    pub active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::purchase_line::Entity")]
    PurchaseLines,
}

impl Related<super::purchase_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
