use chrono::NaiveDate;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Batch spec attached to a purchase line: quantity, batch label,
/// expiration and return-window terms as declared on the invoice.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_lots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub purchase_line_id: i64,
    pub quantity: i32,
    pub batch: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    pub commitment_letter: bool,
    pub return_months: Option<i32>,
    pub return_notes: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::purchase_line::Entity",
        from = "Column::PurchaseLineId",
        to = "super::purchase_line::Column::Id"
    )]
    PurchaseLine,
}

impl Related<super::purchase_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseLine.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
