use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Dispatch header. `code` is generated at commit (`DESP-{id:06}`);
/// totals are the sums over the consumed lot fragments.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dispatches")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub code: Option<String>,
    pub service_unit_id: Option<i64>,
    pub user_id: i64,
    pub notes: Option<String>,
    pub total_quantity: i32,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_value: Decimal,
    pub dispatched_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::service_unit::Entity",
        from = "Column::ServiceUnitId",
        to = "super::service_unit::Column::Id"
    )]
    ServiceUnit,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(has_many = "super::dispatch_line::Entity")]
    Lines,
}

impl Related<super::service_unit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ServiceUnit.def()
    }
}

impl Related<super::dispatch_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn display_code(&self) -> String {
        self.code
            .clone()
            .unwrap_or_else(|| format!("DESP-{:06}", self.id))
    }
}
