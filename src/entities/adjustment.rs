use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Manual adjustment header. `kind` is ENTRY (stock increase) or EXIT
/// (stock decrease) and applies to every line of the adjustment.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "adjustments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub kind: String,
    pub reference_document: String,
    pub notes: Option<String>,
    pub user_id: i64,
    pub adjusted_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(has_many = "super::adjustment_line::Entity")]
    Lines,
}

impl Related<super::adjustment_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdjustmentKind {
    Entry,
    Exit,
}

impl AdjustmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentKind::Entry => "ENTRY",
            AdjustmentKind::Exit => "EXIT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ENTRY" => Some(AdjustmentKind::Entry),
            "EXIT" => Some(AdjustmentKind::Exit),
            _ => None,
        }
    }
}
