use chrono::{Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::{
    entities::{
        adjustment_line::{self, Entity as AdjustmentLine},
        catalog_item::Entity as CatalogItem,
        dispatch_line::{self, Entity as DispatchLine},
        movement::{self, Entity as Movement, MovementKind, MovementModule},
        purchase::{self, Entity as Purchase},
        purchase_line::{self, Entity as PurchaseLine},
        purchase_lot::{self, Entity as PurchaseLot},
        stock_lot::{self, Entity as StockLot},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::page_and_limit,
};

pub const NO_BATCH: &str = "NO-BATCH";

/// Turns committed purchase documents into stock lots and stock-in ledger
/// entries. Also owns the strict cancellation path.
#[derive(Clone)]
pub struct ReceivingService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<EventSender>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPurchase {
    pub invoice_number: String,
    pub invoice_series: String,
    pub purchase_type: String,
    pub entry_date: NaiveDate,
    pub supplier: String,
    pub purchase_order: Option<String>,
    pub program: Option<String>,
    pub form_1h_number: Option<i32>,
    pub kardex_number: Option<i32>,
    pub lines: Vec<NewPurchaseLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPurchaseLine {
    pub catalog_item_id: i64,
    pub total_quantity: i32,
    pub unit_price: Decimal,
    pub notes: Option<String>,
    pub lots: Vec<NewPurchaseLot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPurchaseLot {
    pub quantity: i32,
    pub batch: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub commitment_letter: bool,
    pub return_months: Option<i32>,
    pub return_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseCreated {
    pub purchase_id: i64,
    pub invoice_total: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PurchaseFilter {
    pub supplier: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl PurchaseFilter {
    fn to_condition(&self) -> Condition {
        let mut condition = Condition::all();
        if let Some(supplier) = self.supplier.as_deref().filter(|s| !s.is_empty()) {
            condition = condition.add(purchase::Column::Supplier.contains(supplier));
        }
        if let Some(from) = self.from {
            condition = condition.add(purchase::Column::EntryDate.gte(from));
        }
        if let Some(to) = self.to {
            condition = condition.add(purchase::Column::EntryDate.lte(to));
        }
        condition
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseSummary {
    pub id: i64,
    pub invoice_number: String,
    pub invoice_series: String,
    pub purchase_type: String,
    pub entry_date: NaiveDate,
    pub supplier: String,
    pub kardex_number: Option<i32>,
    pub total_items: usize,
    pub total_quantity: i64,
    pub invoice_total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseLotDetail {
    #[serde(flatten)]
    pub lot: purchase_lot::Model,
    pub has_expiration: bool,
    pub has_return_window: bool,
    /// Date the supplier should be notified for a return:
    /// expiration minus the return window.
    pub return_notification_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseLineDetail {
    #[serde(flatten)]
    pub line: purchase_line::Model,
    pub lots: Vec<PurchaseLotDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseDetail {
    #[serde(flatten)]
    pub purchase: purchase::Model,
    pub lines: Vec<PurchaseLineDetail>,
    pub total_items: usize,
    pub total_quantity: i64,
    pub invoice_total: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePurchase {
    pub invoice_number: Option<String>,
    pub invoice_series: Option<String>,
    pub purchase_type: Option<String>,
    pub entry_date: Option<NaiveDate>,
    pub supplier: Option<String>,
    pub purchase_order: Option<String>,
    pub program: Option<String>,
    pub form_1h_number: Option<i32>,
    pub kardex_number: Option<i32>,
}

impl ReceivingService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a purchase with its lines, batch specs, stock lots and
    /// stock-in movements. All-or-nothing: a batch-sum mismatch or an
    /// unknown catalog item aborts before anything is persisted.
    #[instrument(skip(self, dto))]
    pub async fn create_purchase(
        &self,
        dto: NewPurchase,
        acting_user: i64,
    ) -> Result<PurchaseCreated, ServiceError> {
        if dto.lines.is_empty() {
            return Err(ServiceError::Validation(
                "purchase must include at least one line".to_string(),
            ));
        }

        for (index, line) in dto.lines.iter().enumerate() {
            if line.total_quantity <= 0 {
                return Err(ServiceError::Validation(format!(
                    "total quantity must be greater than 0 (line #{})",
                    index + 1
                )));
            }
            if line.lots.is_empty() {
                return Err(ServiceError::Validation(format!(
                    "line #{} declares no batches",
                    index + 1
                )));
            }
            if line.lots.iter().any(|l| l.quantity <= 0) {
                return Err(ServiceError::Validation(format!(
                    "batch quantities must be greater than 0 (line #{})",
                    index + 1
                )));
            }
            let batch_sum: i64 = line.lots.iter().map(|l| l.quantity as i64).sum();
            if batch_sum != line.total_quantity as i64 {
                return Err(ServiceError::Validation(format!(
                    "batch quantities sum to {} but the line declares {} (line #{})",
                    batch_sum,
                    line.total_quantity,
                    index + 1
                )));
            }
        }

        let created = self
            .db
            .transaction::<_, PurchaseCreated, ServiceError>(move |txn| {
                Box::pin(async move {
                    let now = Utc::now();

                    let header = purchase::ActiveModel {
                        invoice_number: Set(dto.invoice_number.trim().to_string()),
                        invoice_series: Set(dto.invoice_series.trim().to_string()),
                        purchase_type: Set(dto.purchase_type.trim().to_string()),
                        entry_date: Set(dto.entry_date),
                        supplier: Set(dto.supplier.trim().to_string()),
                        purchase_order: Set(dto.purchase_order),
                        program: Set(dto.program),
                        form_1h_number: Set(dto.form_1h_number),
                        kardex_number: Set(dto.kardex_number),
                        created_at: Set(now),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                    let mut invoice_total = Decimal::ZERO;

                    for line_dto in dto.lines {
                        let item = CatalogItem::find_by_id(line_dto.catalog_item_id)
                            .one(txn)
                            .await
                            .map_err(ServiceError::db_error)?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "Catalog item {} not found",
                                    line_dto.catalog_item_id
                                ))
                            })?;

                        let line_total =
                            line_dto.unit_price * Decimal::from(line_dto.total_quantity);
                        invoice_total += line_total;

                        let line = purchase_line::ActiveModel {
                            purchase_id: Set(header.id),
                            catalog_item_id: Set(item.id),
                            budget_line: Set(item.budget_line),
                            product_code: Set(item.product_code),
                            product_name: Set(item.product_name.clone()),
                            characteristics: Set(item.characteristics.clone()),
                            presentation_code: Set(item.presentation_code),
                            presentation: Set(item.presentation_name.clone()),
                            total_quantity: Set(line_dto.total_quantity),
                            unit_price: Set(line_dto.unit_price),
                            line_total: Set(line_total),
                            notes: Set(line_dto.notes.clone()),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                        for lot_dto in line_dto.lots {
                            let batch = lot_dto
                                .batch
                                .as_deref()
                                .map(str::trim)
                                .filter(|b| !b.is_empty())
                                .map(str::to_string);

                            let purchase_lot = purchase_lot::ActiveModel {
                                purchase_line_id: Set(line.id),
                                quantity: Set(lot_dto.quantity),
                                batch: Set(batch.clone()),
                                expiration_date: Set(lot_dto.expiration_date),
                                commitment_letter: Set(lot_dto.commitment_letter),
                                return_months: Set(lot_dto.return_months),
                                return_notes: Set(lot_dto
                                    .return_notes
                                    .as_deref()
                                    .map(str::trim)
                                    .filter(|n| !n.is_empty())
                                    .map(str::to_string)),
                                ..Default::default()
                            }
                            .insert(txn)
                            .await
                            .map_err(ServiceError::db_error)?;

                            let stock_batch = batch.unwrap_or_else(|| NO_BATCH.to_string());
                            let total_price =
                                line_dto.unit_price * Decimal::from(lot_dto.quantity);

                            let lot = stock_lot::ActiveModel {
                                purchase_id: Set(Some(header.id)),
                                purchase_lot_id: Set(Some(purchase_lot.id)),
                                budget_line: Set(item.budget_line),
                                product_code: Set(item.product_code),
                                product_name: Set(item.product_name.clone()),
                                characteristics: Set(item.characteristics.clone()),
                                presentation_code: Set(item.presentation_code),
                                presentation: Set(item.presentation_name.clone()),
                                unit_of_measure: Set(item.unit_of_measure.clone()),
                                batch: Set(stock_batch.clone()),
                                expiration_date: Set(purchase_lot.expiration_date),
                                commitment_letter: Set(purchase_lot.commitment_letter),
                                return_months: Set(purchase_lot.return_months),
                                return_notes: Set(purchase_lot.return_notes.clone()),
                                remaining_quantity: Set(purchase_lot.quantity),
                                unit_price: Set(line_dto.unit_price),
                                total_price: Set(total_price),
                                kardex_number: Set(None),
                                created_at: Set(now),
                                updated_at: Set(now),
                                ..Default::default()
                            }
                            .insert(txn)
                            .await
                            .map_err(ServiceError::db_error)?;

                            movement::ActiveModel {
                                lot_id: Set(lot.id),
                                catalog_item_id: Set(Some(item.id)),
                                purchase_id: Set(Some(header.id)),
                                dispatch_id: Set(None),
                                adjustment_id: Set(None),
                                quantity: Set(purchase_lot.quantity),
                                kind: Set(MovementKind::StockIn.as_str().to_string()),
                                module: Set(MovementModule::Receiving.as_str().to_string()),
                                user_id: Set(acting_user),
                                batch: Set(Some(stock_batch)),
                                expiration_date: Set(purchase_lot.expiration_date),
                                moved_at: Set(now),
                                ..Default::default()
                            }
                            .insert(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                        }
                    }

                    Ok(PurchaseCreated {
                        purchase_id: header.id,
                        invoice_total,
                    })
                })
            })
            .await
            .map_err(ServiceError::from)?;

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::PurchaseReceived {
                    purchase_id: created.purchase_id,
                    invoice_total: created.invoice_total,
                })
                .await;
        }

        info!(
            "purchase {} received, invoice total {}",
            created.purchase_id, created.invoice_total
        );
        Ok(created)
    }

    /// Cancels a committed purchase. Refuses when any of its lots has been
    /// consumed by a dispatch or referenced by an adjustment; otherwise
    /// deletes movements, lots, batch specs, lines and the header in one
    /// transaction.
    #[instrument(skip(self))]
    pub async fn cancel_purchase(
        &self,
        purchase_id: i64,
        acting_user: i64,
        reason: String,
    ) -> Result<(), ServiceError> {
        self.db
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    Purchase::find_by_id(purchase_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Purchase {} not found", purchase_id))
                        })?;

                    let lot_ids: Vec<i64> = StockLot::find()
                        .filter(stock_lot::Column::PurchaseId.eq(purchase_id))
                        .all(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .into_iter()
                        .map(|l| l.id)
                        .collect();

                    if !lot_ids.is_empty() {
                        let dispatch_refs = DispatchLine::find()
                            .filter(dispatch_line::Column::LotId.is_in(lot_ids.clone()))
                            .count(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                        if dispatch_refs > 0 {
                            return Err(ServiceError::Conflict(format!(
                                "purchase {} cannot be cancelled: {} dispatch line(s) consume its lots",
                                purchase_id, dispatch_refs
                            )));
                        }

                        let adjustment_refs = AdjustmentLine::find()
                            .filter(adjustment_line::Column::LotId.is_in(lot_ids.clone()))
                            .count(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                        if adjustment_refs > 0 {
                            return Err(ServiceError::Conflict(format!(
                                "purchase {} cannot be cancelled: {} adjustment line(s) reference its lots",
                                purchase_id, adjustment_refs
                            )));
                        }

                        Movement::delete_many()
                            .filter(movement::Column::LotId.is_in(lot_ids.clone()))
                            .exec(txn)
                            .await
                            .map_err(ServiceError::db_error)?;

                        StockLot::delete_many()
                            .filter(stock_lot::Column::Id.is_in(lot_ids))
                            .exec(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                    }

                    let line_ids: Vec<i64> = PurchaseLine::find()
                        .filter(purchase_line::Column::PurchaseId.eq(purchase_id))
                        .all(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .into_iter()
                        .map(|l| l.id)
                        .collect();

                    if !line_ids.is_empty() {
                        PurchaseLot::delete_many()
                            .filter(purchase_lot::Column::PurchaseLineId.is_in(line_ids))
                            .exec(txn)
                            .await
                            .map_err(ServiceError::db_error)?;

                        PurchaseLine::delete_many()
                            .filter(purchase_line::Column::PurchaseId.eq(purchase_id))
                            .exec(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                    }

                    Purchase::delete_by_id(purchase_id)
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    Ok(())
                })
            })
            .await
            .map_err(ServiceError::from)?;

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::PurchaseCancelled { purchase_id })
                .await;
        }

        info!(
            "purchase {} cancelled by user {} ({})",
            purchase_id, acting_user, reason
        );
        Ok(())
    }

    /// Paginated purchase summaries, oldest entry date first.
    pub async fn list_purchases(
        &self,
        filter: &PurchaseFilter,
    ) -> Result<(Vec<PurchaseSummary>, u64), ServiceError> {
        let (page, limit) = page_and_limit(filter.page, filter.limit);
        let condition = filter.to_condition();

        let total = Purchase::find()
            .filter(condition.clone())
            .count(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let purchases = Purchase::find()
            .filter(condition)
            .order_by_asc(purchase::Column::EntryDate)
            .order_by_asc(purchase::Column::Id)
            .limit(limit)
            .offset((page - 1) * limit)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let ids: Vec<i64> = purchases.iter().map(|p| p.id).collect();
        let lines = if ids.is_empty() {
            Vec::new()
        } else {
            PurchaseLine::find()
                .filter(purchase_line::Column::PurchaseId.is_in(ids))
                .all(self.db.as_ref())
                .await
                .map_err(ServiceError::db_error)?
        };

        let mut by_purchase: HashMap<i64, Vec<&purchase_line::Model>> = HashMap::new();
        for line in &lines {
            by_purchase.entry(line.purchase_id).or_default().push(line);
        }

        let summaries = purchases
            .into_iter()
            .map(|p| {
                let lines = by_purchase.remove(&p.id).unwrap_or_default();
                PurchaseSummary {
                    total_items: lines.len(),
                    total_quantity: lines.iter().map(|l| l.total_quantity as i64).sum(),
                    invoice_total: lines.iter().map(|l| l.line_total).sum(),
                    id: p.id,
                    invoice_number: p.invoice_number,
                    invoice_series: p.invoice_series,
                    purchase_type: p.purchase_type,
                    entry_date: p.entry_date,
                    supplier: p.supplier,
                    kardex_number: p.kardex_number,
                }
            })
            .collect();

        Ok((summaries, total))
    }

    /// Full document view: header, lines and batch specs with the computed
    /// return-notification dates.
    pub async fn get_purchase(&self, purchase_id: i64) -> Result<PurchaseDetail, ServiceError> {
        let header = Purchase::find_by_id(purchase_id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Purchase {} not found", purchase_id)))?;

        let lines = PurchaseLine::find()
            .filter(purchase_line::Column::PurchaseId.eq(purchase_id))
            .order_by_asc(purchase_line::Column::BudgetLine)
            .order_by_asc(purchase_line::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let line_ids: Vec<i64> = lines.iter().map(|l| l.id).collect();
        let lots = if line_ids.is_empty() {
            Vec::new()
        } else {
            PurchaseLot::find()
                .filter(purchase_lot::Column::PurchaseLineId.is_in(line_ids))
                .order_by_asc(purchase_lot::Column::Id)
                .all(self.db.as_ref())
                .await
                .map_err(ServiceError::db_error)?
        };

        let mut lots_by_line: HashMap<i64, Vec<purchase_lot::Model>> = HashMap::new();
        for lot in lots {
            lots_by_line.entry(lot.purchase_line_id).or_default().push(lot);
        }

        let total_items = lines.len();
        let total_quantity: i64 = lines.iter().map(|l| l.total_quantity as i64).sum();
        let invoice_total: Decimal = lines.iter().map(|l| l.line_total).sum();

        let lines = lines
            .into_iter()
            .map(|line| {
                let lots = lots_by_line
                    .remove(&line.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|lot| PurchaseLotDetail {
                        has_expiration: lot.expiration_date.is_some(),
                        has_return_window: lot.return_months.is_some(),
                        return_notification_date: return_notification_date(
                            lot.expiration_date,
                            lot.return_months,
                        ),
                        lot,
                    })
                    .collect();
                PurchaseLineDetail { line, lots }
            })
            .collect();

        Ok(PurchaseDetail {
            purchase: header,
            lines,
            total_items,
            total_quantity,
            invoice_total,
        })
    }

    /// Patches descriptive header metadata. Lots and quantities are never
    /// touched here.
    pub async fn update_purchase(
        &self,
        purchase_id: i64,
        patch: UpdatePurchase,
    ) -> Result<purchase::Model, ServiceError> {
        let header = Purchase::find_by_id(purchase_id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Purchase {} not found", purchase_id)))?;

        let mut active: purchase::ActiveModel = header.into();
        if let Some(v) = patch.invoice_number {
            active.invoice_number = Set(v);
        }
        if let Some(v) = patch.invoice_series {
            active.invoice_series = Set(v);
        }
        if let Some(v) = patch.purchase_type {
            active.purchase_type = Set(v);
        }
        if let Some(v) = patch.entry_date {
            active.entry_date = Set(v);
        }
        if let Some(v) = patch.supplier {
            active.supplier = Set(v);
        }
        if let Some(v) = patch.purchase_order {
            active.purchase_order = Set(Some(v));
        }
        if let Some(v) = patch.program {
            active.program = Set(Some(v));
        }
        if let Some(v) = patch.form_1h_number {
            active.form_1h_number = Set(Some(v));
        }
        if let Some(v) = patch.kardex_number {
            active.kardex_number = Set(Some(v));
        }

        active
            .update(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }
}

fn return_notification_date(
    expiration: Option<NaiveDate>,
    return_months: Option<i32>,
) -> Option<NaiveDate> {
    match (expiration, return_months) {
        (Some(expiration), Some(months)) if months > 0 => {
            expiration.checked_sub_months(Months::new(months as u32))
        }
        _ => None,
    }
}
