use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::{
    entities::{
        movement::{self, Entity as Movement},
        purchase::{self, Entity as Purchase},
        stock_lot::{self, Entity as StockLot},
    },
    errors::ServiceError,
    services::page_and_limit,
};

const NEAR_EXPIRY_DAYS: u64 = 30;
const LOW_STOCK_THRESHOLD: i32 = 10;

/// Read-side queries over the Lot Store and Movement Ledger: lot listings,
/// movement history and dashboard aggregates. Never mutates.
#[derive(Clone)]
pub struct LedgerService {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LotFilter {
    /// Substring match over product name, characteristics and batch.
    pub search: Option<String>,
    pub product_code: Option<i32>,
    pub product_name: Option<String>,
    pub batch: Option<String>,
    pub presentation_code: Option<i32>,
    pub expiration_from: Option<NaiveDate>,
    pub expiration_to: Option<NaiveDate>,
    pub min_remaining: Option<i32>,
    /// Lots expiring within the next 30 days (future expirations only).
    #[serde(default)]
    pub near_expiry: bool,
    /// Lots holding fewer than 10 units.
    #[serde(default)]
    pub low_stock: bool,
}

impl LotFilter {
    fn to_condition(&self, today: NaiveDate) -> Condition {
        let mut condition = Condition::all().add(stock_lot::Column::RemainingQuantity.gt(0));

        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            condition = condition.add(
                Condition::any()
                    .add(stock_lot::Column::ProductName.contains(search))
                    .add(stock_lot::Column::Characteristics.contains(search))
                    .add(stock_lot::Column::Batch.contains(search)),
            );
        }
        if let Some(code) = self.product_code {
            condition = condition.add(stock_lot::Column::ProductCode.eq(code));
        }
        if let Some(name) = self.product_name.as_deref().filter(|n| !n.is_empty()) {
            condition = condition.add(stock_lot::Column::ProductName.contains(name));
        }
        if let Some(batch) = self.batch.as_deref().filter(|b| !b.is_empty()) {
            condition = condition.add(stock_lot::Column::Batch.contains(batch));
        }
        if let Some(code) = self.presentation_code {
            condition = condition.add(stock_lot::Column::PresentationCode.eq(code));
        }
        if let Some(from) = self.expiration_from {
            condition = condition.add(stock_lot::Column::ExpirationDate.gte(from));
        }
        if let Some(to) = self.expiration_to {
            condition = condition.add(stock_lot::Column::ExpirationDate.lte(to));
        }
        if let Some(min) = self.min_remaining {
            condition = condition.add(stock_lot::Column::RemainingQuantity.gte(min));
        }
        if self.near_expiry {
            let horizon = today + Days::new(NEAR_EXPIRY_DAYS);
            condition = condition
                .add(stock_lot::Column::ExpirationDate.gte(today))
                .add(stock_lot::Column::ExpirationDate.lte(horizon));
        }
        if self.low_stock {
            condition = condition.add(stock_lot::Column::RemainingQuantity.lt(LOW_STOCK_THRESHOLD));
        }

        condition
    }
}

/// Lot row with its originating purchase, when one exists.
#[derive(Debug, Clone, Serialize)]
pub struct LotView {
    #[serde(flatten)]
    pub lot: stock_lot::Model,
    pub purchase: Option<PurchaseRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseRef {
    pub id: i64,
    pub invoice_number: String,
    pub invoice_series: String,
    pub entry_date: NaiveDate,
    pub supplier: String,
}

impl PurchaseRef {
    fn from(p: &purchase::Model) -> Self {
        Self {
            id: p.id,
            invoice_number: p.invoice_number.clone(),
            invoice_series: p.invoice_series.clone(),
            entry_date: p.entry_date,
            supplier: p.supplier.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovementFilter {
    pub lot_id: Option<i64>,
    pub purchase_id: Option<i64>,
    pub dispatch_id: Option<i64>,
    pub adjustment_id: Option<i64>,
    pub kind: Option<String>,
    pub module: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl MovementFilter {
    fn to_condition(&self) -> Condition {
        let mut condition = Condition::all();
        if let Some(lot_id) = self.lot_id {
            condition = condition.add(movement::Column::LotId.eq(lot_id));
        }
        if let Some(purchase_id) = self.purchase_id {
            condition = condition.add(movement::Column::PurchaseId.eq(purchase_id));
        }
        if let Some(dispatch_id) = self.dispatch_id {
            condition = condition.add(movement::Column::DispatchId.eq(dispatch_id));
        }
        if let Some(adjustment_id) = self.adjustment_id {
            condition = condition.add(movement::Column::AdjustmentId.eq(adjustment_id));
        }
        if let Some(kind) = self.kind.as_deref().filter(|k| !k.is_empty()) {
            condition = condition.add(movement::Column::Kind.eq(kind));
        }
        if let Some(module) = self.module.as_deref().filter(|m| !m.is_empty()) {
            condition = condition.add(movement::Column::Module.eq(module));
        }
        if let Some(from) = self.from {
            let start = from.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
            condition = condition.add(movement::Column::MovedAt.gte(start));
        }
        if let Some(to) = self.to {
            let end = to.and_hms_opt(23, 59, 59).unwrap_or_default().and_utc();
            condition = condition.add(movement::Column::MovedAt.lte(end));
        }
        condition
    }
}

/// Dashboard aggregates computed from the Lot Store.
#[derive(Debug, Clone, Serialize)]
pub struct StockSummary {
    pub distinct_products: usize,
    pub total_units: i64,
    pub total_valuation: Decimal,
    pub near_expiry_lots: usize,
    pub low_stock_lots: usize,
}

impl LedgerService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Lots with remaining stock matching the filter, expiration ascending
    /// then product code, each with its purchase back-reference.
    pub async fn list_lots(&self, filter: &LotFilter) -> Result<Vec<LotView>, ServiceError> {
        let today = Utc::now().date_naive();

        let lots = StockLot::find()
            .filter(filter.to_condition(today))
            .order_by_asc(stock_lot::Column::ExpirationDate)
            .order_by_asc(stock_lot::Column::ProductCode)
            .order_by_asc(stock_lot::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let purchase_ids: HashSet<i64> = lots.iter().filter_map(|l| l.purchase_id).collect();
        let purchases = if purchase_ids.is_empty() {
            Vec::new()
        } else {
            Purchase::find()
                .filter(purchase::Column::Id.is_in(purchase_ids.into_iter().collect::<Vec<_>>()))
                .all(self.db.as_ref())
                .await
                .map_err(ServiceError::db_error)?
        };
        let by_id: HashMap<i64, purchase::Model> =
            purchases.into_iter().map(|p| (p.id, p)).collect();

        Ok(lots
            .into_iter()
            .map(|lot| LotView {
                purchase: lot
                    .purchase_id
                    .and_then(|id| by_id.get(&id))
                    .map(PurchaseRef::from),
                lot,
            })
            .collect())
    }

    pub async fn get_lot(&self, lot_id: i64) -> Result<LotView, ServiceError> {
        let lot = StockLot::find_by_id(lot_id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Stock lot {} not found", lot_id)))?;

        let purchase = match lot.purchase_id {
            Some(id) => Purchase::find_by_id(id)
                .one(self.db.as_ref())
                .await
                .map_err(ServiceError::db_error)?,
            None => None,
        };

        Ok(LotView {
            purchase: purchase.as_ref().map(PurchaseRef::from),
            lot,
        })
    }

    /// Ledger history, newest first.
    pub async fn movement_history(
        &self,
        filter: &MovementFilter,
    ) -> Result<(Vec<movement::Model>, u64), ServiceError> {
        let (page, limit) = page_and_limit(filter.page, filter.limit);
        let condition = filter.to_condition();

        let total = Movement::find()
            .filter(condition.clone())
            .count(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let movements = Movement::find()
            .filter(condition)
            .order_by_desc(movement::Column::MovedAt)
            .order_by_desc(movement::Column::Id)
            .limit(limit)
            .offset((page - 1) * limit)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        Ok((movements, total))
    }

    /// Aggregates over all lots with remaining stock.
    pub async fn stock_summary(&self) -> Result<StockSummary, ServiceError> {
        let lots = StockLot::find()
            .filter(stock_lot::Column::RemainingQuantity.gt(0))
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let today = Utc::now().date_naive();
        let horizon = today + Days::new(NEAR_EXPIRY_DAYS);

        let distinct_products: HashSet<i32> = lots.iter().map(|l| l.product_code).collect();
        let total_units: i64 = lots.iter().map(|l| l.remaining_quantity as i64).sum();
        let total_valuation: Decimal = lots.iter().map(|l| l.total_price).sum();
        let near_expiry_lots = lots
            .iter()
            .filter(|l| {
                l.expiration_date
                    .map(|d| d >= today && d <= horizon)
                    .unwrap_or(false)
            })
            .count();
        let low_stock_lots = lots
            .iter()
            .filter(|l| l.remaining_quantity < LOW_STOCK_THRESHOLD)
            .count();

        Ok(StockSummary {
            distinct_products: distinct_products.len(),
            total_units,
            total_valuation,
            near_expiry_lots,
            low_stock_lots,
        })
    }
}
