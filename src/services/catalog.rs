use crate::{
    entities::catalog_item::{self, Entity as CatalogItem},
    errors::ServiceError,
};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use std::sync::Arc;

const SEARCH_LIMIT: u64 = 15;

/// Supply catalog lookups: canonical names, characteristics and units of
/// measure for product/presentation codes.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn get(&self, id: i64) -> Result<catalog_item::Model, ServiceError> {
        CatalogItem::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Catalog item {} not found", id)))
    }

    pub async fn find_by_product_code(
        &self,
        product_code: i32,
    ) -> Result<Option<catalog_item::Model>, ServiceError> {
        CatalogItem::find()
            .filter(catalog_item::Column::ProductCode.eq(product_code))
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Term search over names, characteristics and numeric codes,
    /// optionally restricted to a set of budget lines. An empty restriction
    /// set short-circuits to no results.
    pub async fn search(
        &self,
        term: &str,
        budget_lines: Option<&[i32]>,
    ) -> Result<Vec<catalog_item::Model>, ServiceError> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(lines) = budget_lines {
            if lines.is_empty() {
                return Ok(Vec::new());
            }
        }

        let mut matching = Condition::any()
            .add(catalog_item::Column::ProductName.contains(term))
            .add(catalog_item::Column::Characteristics.contains(term));

        if let Ok(code) = term.parse::<i32>() {
            matching = matching
                .add(catalog_item::Column::ProductCode.eq(code))
                .add(catalog_item::Column::PresentationCode.eq(code))
                .add(catalog_item::Column::BudgetLine.eq(code));
        }

        let mut condition = Condition::all().add(matching);
        if let Some(lines) = budget_lines {
            condition = condition.add(catalog_item::Column::BudgetLine.is_in(lines.to_vec()));
        }

        CatalogItem::find()
            .filter(condition)
            .order_by_asc(catalog_item::Column::ProductName)
            .limit(SEARCH_LIMIT)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }
}
