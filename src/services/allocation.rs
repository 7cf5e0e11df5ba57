use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::{
    entities::{
        dispatch::{self, Entity as Dispatch},
        dispatch_line::{self, Entity as DispatchLine},
        movement::{self, MovementKind, MovementModule},
        service_unit::{self, Entity as ServiceUnit},
        stock_lot::{self, Entity as StockLot},
        user::{self, Entity as User},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{authorization::{ensure_budget_line_permitted, AuthorizationService}, page_and_limit},
};

/// Earliest-expiration-first ordering: expiration ascending, lots with no
/// expiration last (as if infinitely far in the future), creation order as
/// the tie-breaker.
pub fn fefo_order(a: &stock_lot::Model, b: &stock_lot::Model) -> Ordering {
    match (a.expiration_date, b.expiration_date) {
        (None, None) => a.id.cmp(&b.id),
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => x.cmp(&y).then(a.id.cmp(&b.id)),
    }
}

/// Consumes stock lots for dispatches, walking eligible lots in FEFO order
/// inside a single transaction.
#[derive(Clone)]
pub struct AllocationService {
    db: Arc<DatabaseConnection>,
    authorization: Arc<AuthorizationService>,
    event_sender: Option<EventSender>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchRequestLine {
    pub product_code: i32,
    pub presentation_code: Option<i32>,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDispatch {
    pub service_unit_id: Option<i64>,
    pub notes: Option<String>,
    pub lines: Vec<DispatchRequestLine>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvailabilityFilter {
    pub product_code: Option<i32>,
    pub batch: Option<String>,
    pub presentation_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LotAvailability {
    pub lot_id: i64,
    pub batch: String,
    pub expiration_date: Option<NaiveDate>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub commitment_letter: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductAvailability {
    pub product_code: i32,
    pub product_name: String,
    pub characteristics: String,
    pub presentation: String,
    pub unit_of_measure: String,
    pub total_on_hand: i64,
    pub lots: Vec<LotAvailability>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DispatchFilter {
    pub code: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub service_unit_id: Option<i64>,
    pub user_id: Option<i64>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl DispatchFilter {
    fn to_condition(&self) -> Condition {
        let mut condition = Condition::all();
        if let Some(code) = self.code.as_deref().filter(|c| !c.is_empty()) {
            condition = condition.add(dispatch::Column::Code.contains(code));
        }
        if let Some(from) = self.from {
            let start = from.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
            condition = condition.add(dispatch::Column::DispatchedAt.gte(start));
        }
        if let Some(to) = self.to {
            let end = to.and_hms_opt(23, 59, 59).unwrap_or_default().and_utc();
            condition = condition.add(dispatch::Column::DispatchedAt.lte(end));
        }
        if let Some(service_unit_id) = self.service_unit_id {
            condition = condition.add(dispatch::Column::ServiceUnitId.eq(service_unit_id));
        }
        if let Some(user_id) = self.user_id {
            condition = condition.add(dispatch::Column::UserId.eq(user_id));
        }
        condition
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchSummary {
    pub id: i64,
    pub code: String,
    pub dispatched_at: DateTime<Utc>,
    pub service_unit: Option<String>,
    pub user: String,
    pub total_quantity: i32,
    pub total_value: Decimal,
    pub total_items: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchResponse {
    pub id: i64,
    pub code: String,
    pub dispatched_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub service_unit: Option<service_unit::Model>,
    pub user_id: i64,
    pub user_name: Option<String>,
    pub total_quantity: i32,
    pub total_value: Decimal,
    /// Consumed lot fragments, in consumption order.
    pub lines: Vec<dispatch_line::Model>,
}

impl AllocationService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        authorization: Arc<AuthorizationService>,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            db,
            authorization,
            event_sender,
        }
    }

    /// Lots with remaining stock, grouped per product and FEFO-ordered
    /// within the group.
    #[instrument(skip(self))]
    pub async fn query_availability(
        &self,
        filter: &AvailabilityFilter,
    ) -> Result<Vec<ProductAvailability>, ServiceError> {
        let mut condition =
            Condition::all().add(stock_lot::Column::RemainingQuantity.gt(0));
        if let Some(code) = filter.product_code {
            condition = condition.add(stock_lot::Column::ProductCode.eq(code));
        }
        if let Some(batch) = filter.batch.as_deref().filter(|b| !b.is_empty()) {
            condition = condition.add(stock_lot::Column::Batch.contains(batch));
        }
        if let Some(presentation) = filter.presentation_code {
            condition = condition.add(stock_lot::Column::PresentationCode.eq(presentation));
        }

        let mut lots = StockLot::find()
            .filter(condition)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        lots.sort_by(|a, b| a.product_code.cmp(&b.product_code).then(fefo_order(a, b)));

        let mut products: Vec<ProductAvailability> = Vec::new();
        for lot in lots {
            let start_group = products
                .last()
                .map(|p| p.product_code != lot.product_code)
                .unwrap_or(true);
            if start_group {
                products.push(ProductAvailability {
                    product_code: lot.product_code,
                    product_name: lot.product_name.clone(),
                    characteristics: lot.characteristics.clone(),
                    presentation: lot.presentation.clone(),
                    unit_of_measure: lot.unit_of_measure.clone(),
                    total_on_hand: 0,
                    lots: Vec::new(),
                });
            }
            if let Some(product) = products.last_mut() {
                product.total_on_hand += lot.remaining_quantity as i64;
                product.lots.push(LotAvailability {
                    lot_id: lot.id,
                    batch: lot.batch,
                    expiration_date: lot.expiration_date,
                    quantity: lot.remaining_quantity,
                    unit_price: lot.unit_price,
                    commitment_letter: lot.commitment_letter,
                });
            }
        }

        Ok(products)
    }

    /// Creates a dispatch, consuming lots FEFO until every requested line
    /// is fully satisfied. Either all lot decrements, dispatch lines and
    /// movements commit together, or nothing is persisted.
    #[instrument(skip(self, dto))]
    pub async fn create_dispatch(
        &self,
        dto: NewDispatch,
        acting_user: i64,
    ) -> Result<DispatchResponse, ServiceError> {
        if dto.lines.is_empty() {
            return Err(ServiceError::Validation(
                "dispatch must include at least one line".to_string(),
            ));
        }
        for (index, line) in dto.lines.iter().enumerate() {
            if line.quantity <= 0 {
                return Err(ServiceError::Validation(format!(
                    "requested quantity must be greater than 0 (line #{})",
                    index + 1
                )));
            }
        }

        let permitted = self.authorization.permitted_budget_lines(acting_user).await?;
        if permitted.is_empty() {
            return Err(ServiceError::Forbidden(
                "user has no authorized budget lines for dispatching".to_string(),
            ));
        }

        let dispatch_id = self
            .db
            .transaction::<_, i64, ServiceError>(move |txn| {
                Box::pin(async move {
                    let now = Utc::now();

                    let header = dispatch::ActiveModel {
                        code: Set(None),
                        service_unit_id: Set(dto.service_unit_id),
                        user_id: Set(acting_user),
                        notes: Set(dto
                            .notes
                            .as_deref()
                            .map(str::trim)
                            .filter(|n| !n.is_empty())
                            .map(str::to_string)),
                        total_quantity: Set(0),
                        total_value: Set(Decimal::ZERO),
                        dispatched_at: Set(now),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                    let mut total_quantity: i32 = 0;
                    let mut total_value = Decimal::ZERO;

                    for (index, request) in dto.lines.iter().enumerate() {
                        let mut condition = Condition::all()
                            .add(stock_lot::Column::ProductCode.eq(request.product_code))
                            .add(stock_lot::Column::RemainingQuantity.gt(0));
                        if let Some(presentation) = request.presentation_code {
                            condition = condition
                                .add(stock_lot::Column::PresentationCode.eq(presentation));
                        }

                        // Freshly computed inside the same transaction that
                        // performs the decrements.
                        let mut lots = StockLot::find()
                            .filter(condition)
                            .all(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                        lots.sort_by(fefo_order);

                        if lots.is_empty() {
                            return Err(ServiceError::InsufficientStock(format!(
                                "no available lots for product {} (line #{})",
                                request.product_code,
                                index + 1
                            )));
                        }

                        let mut pending = request.quantity;

                        for lot in lots {
                            if pending <= 0 {
                                break;
                            }

                            ensure_budget_line_permitted(&permitted, lot.budget_line, index)?;

                            let consumed = lot.remaining_quantity.min(pending);
                            pending -= consumed;

                            let new_remaining = lot.remaining_quantity - consumed;
                            let line_total = lot.unit_price * Decimal::from(consumed);

                            let mut active: stock_lot::ActiveModel = lot.clone().into();
                            active.remaining_quantity = Set(new_remaining);
                            active.total_price =
                                Set(lot.unit_price * Decimal::from(new_remaining));
                            active.updated_at = Set(now);
                            active
                                .update(txn)
                                .await
                                .map_err(ServiceError::db_error)?;

                            dispatch_line::ActiveModel {
                                dispatch_id: Set(header.id),
                                lot_id: Set(lot.id),
                                catalog_item_id: Set(None),
                                purchase_id: Set(lot.purchase_id),
                                product_code: Set(lot.product_code),
                                product_name: Set(lot.product_name.clone()),
                                characteristics: Set(lot.characteristics.clone()),
                                presentation_code: Set(Some(lot.presentation_code)),
                                presentation: Set(Some(lot.presentation.clone())),
                                unit_of_measure: Set(Some(lot.unit_of_measure.clone())),
                                batch: Set(Some(lot.batch.clone())),
                                expiration_date: Set(lot.expiration_date),
                                quantity: Set(consumed),
                                unit_price: Set(lot.unit_price),
                                line_total: Set(line_total),
                                ..Default::default()
                            }
                            .insert(txn)
                            .await
                            .map_err(ServiceError::db_error)?;

                            movement::ActiveModel {
                                lot_id: Set(lot.id),
                                catalog_item_id: Set(None),
                                purchase_id: Set(lot.purchase_id),
                                dispatch_id: Set(Some(header.id)),
                                adjustment_id: Set(None),
                                quantity: Set(consumed),
                                kind: Set(MovementKind::DispatchOut.as_str().to_string()),
                                module: Set(MovementModule::Dispatch.as_str().to_string()),
                                user_id: Set(acting_user),
                                batch: Set(Some(lot.batch.clone())),
                                expiration_date: Set(lot.expiration_date),
                                moved_at: Set(now),
                                ..Default::default()
                            }
                            .insert(txn)
                            .await
                            .map_err(ServiceError::db_error)?;

                            total_quantity += consumed;
                            total_value += line_total;
                        }

                        if pending > 0 {
                            return Err(ServiceError::InsufficientStock(format!(
                                "insufficient stock for product {}: short by {} unit(s) (line #{})",
                                request.product_code,
                                pending,
                                index + 1
                            )));
                        }
                    }

                    if total_quantity == 0 {
                        return Err(ServiceError::Validation(
                            "dispatch consumed no stock: all quantities were zero".to_string(),
                        ));
                    }

                    let code = format!("DESP-{:06}", header.id);
                    let mut active: dispatch::ActiveModel = header.clone().into();
                    active.code = Set(Some(code));
                    active.total_quantity = Set(total_quantity);
                    active.total_value = Set(total_value);
                    active
                        .update(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    Ok(header.id)
                })
            })
            .await
            .map_err(ServiceError::from)?;

        let response = self.get_dispatch(dispatch_id).await?;

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::DispatchCreated {
                    dispatch_id: response.id,
                    code: response.code.clone(),
                    total_quantity: response.total_quantity,
                })
                .await;
        }

        info!(
            "dispatch {} created: {} unit(s) across {} lot fragment(s)",
            response.code,
            response.total_quantity,
            response.lines.len()
        );
        Ok(response)
    }

    /// Paginated dispatch summaries, newest first.
    pub async fn list_dispatches(
        &self,
        filter: &DispatchFilter,
    ) -> Result<(Vec<DispatchSummary>, u64), ServiceError> {
        let (page, limit) = page_and_limit(filter.page, filter.limit);
        let condition = filter.to_condition();

        let total = Dispatch::find()
            .filter(condition.clone())
            .count(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let dispatches = Dispatch::find()
            .filter(condition)
            .order_by_desc(dispatch::Column::DispatchedAt)
            .order_by_desc(dispatch::Column::Id)
            .limit(limit)
            .offset((page - 1) * limit)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let ids: Vec<i64> = dispatches.iter().map(|d| d.id).collect();
        let lines = if ids.is_empty() {
            Vec::new()
        } else {
            DispatchLine::find()
                .filter(dispatch_line::Column::DispatchId.is_in(ids))
                .all(self.db.as_ref())
                .await
                .map_err(ServiceError::db_error)?
        };
        let mut line_counts: HashMap<i64, usize> = HashMap::new();
        for line in &lines {
            *line_counts.entry(line.dispatch_id).or_default() += 1;
        }

        let unit_names = self
            .service_unit_names(dispatches.iter().filter_map(|d| d.service_unit_id))
            .await?;
        let user_names = self
            .user_names(dispatches.iter().map(|d| d.user_id))
            .await?;

        let summaries = dispatches
            .into_iter()
            .map(|d| DispatchSummary {
                code: d.display_code(),
                service_unit: d
                    .service_unit_id
                    .and_then(|id| unit_names.get(&id).cloned()),
                user: user_names.get(&d.user_id).cloned().unwrap_or_default(),
                total_items: line_counts.get(&d.id).copied().unwrap_or(0),
                id: d.id,
                dispatched_at: d.dispatched_at,
                total_quantity: d.total_quantity,
                total_value: d.total_value,
            })
            .collect();

        Ok((summaries, total))
    }

    pub async fn get_dispatch(&self, dispatch_id: i64) -> Result<DispatchResponse, ServiceError> {
        let header = Dispatch::find_by_id(dispatch_id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Dispatch {} not found", dispatch_id)))?;

        let lines = DispatchLine::find()
            .filter(dispatch_line::Column::DispatchId.eq(dispatch_id))
            .order_by_asc(dispatch_line::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let service_unit = match header.service_unit_id {
            Some(id) => ServiceUnit::find_by_id(id)
                .one(self.db.as_ref())
                .await
                .map_err(ServiceError::db_error)?,
            None => None,
        };

        let user_name = User::find_by_id(header.user_id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .map(|u| u.display_name());

        Ok(DispatchResponse {
            code: header.display_code(),
            id: header.id,
            dispatched_at: header.dispatched_at,
            notes: header.notes,
            service_unit,
            user_id: header.user_id,
            user_name,
            total_quantity: header.total_quantity,
            total_value: header.total_value,
            lines,
        })
    }

    async fn service_unit_names(
        &self,
        ids: impl Iterator<Item = i64>,
    ) -> Result<HashMap<i64, String>, ServiceError> {
        let ids: Vec<i64> = ids.collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let units = ServiceUnit::find()
            .filter(service_unit::Column::Id.is_in(ids))
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        Ok(units.into_iter().map(|u| (u.id, u.name)).collect())
    }

    async fn user_names(
        &self,
        ids: impl Iterator<Item = i64>,
    ) -> Result<HashMap<i64, String>, ServiceError> {
        let ids: Vec<i64> = ids.collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let users = User::find()
            .filter(user::Column::Id.is_in(ids))
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        Ok(users.into_iter().map(|u| (u.id, u.display_name())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn lot(id: i64, expiration: Option<NaiveDate>) -> stock_lot::Model {
        stock_lot::Model {
            id,
            purchase_id: None,
            purchase_lot_id: None,
            budget_line: 182,
            product_code: 1,
            product_name: "PARACETAMOL".into(),
            characteristics: "500MG TABLET".into(),
            presentation_code: 1,
            presentation: "BLISTER".into(),
            unit_of_measure: "UNIT".into(),
            batch: "B-1".into(),
            expiration_date: expiration,
            commitment_letter: false,
            return_months: None,
            return_notes: None,
            remaining_quantity: 10,
            unit_price: dec!(1.50),
            total_price: dec!(15.00),
            kardex_number: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn earlier_expiration_sorts_first() {
        let a = lot(2, Some(date(2025, 1, 1)));
        let b = lot(1, Some(date(2025, 6, 1)));
        assert_eq!(fefo_order(&a, &b), Ordering::Less);
    }

    #[test]
    fn missing_expiration_sorts_last() {
        let a = lot(1, None);
        let b = lot(2, Some(date(2099, 12, 31)));
        assert_eq!(fefo_order(&a, &b), Ordering::Greater);
    }

    #[test]
    fn creation_order_breaks_ties() {
        let a = lot(3, Some(date(2025, 1, 1)));
        let b = lot(7, Some(date(2025, 1, 1)));
        assert_eq!(fefo_order(&a, &b), Ordering::Less);
    }

    proptest! {
        #[test]
        fn fefo_is_a_total_order(
            ids in proptest::collection::vec(1i64..1000, 2..20),
            days in proptest::collection::vec(proptest::option::of(0u64..3650), 2..20),
        ) {
            let base = date(2024, 1, 1);
            let mut lots: Vec<_> = ids
                .iter()
                .zip(days.iter())
                .map(|(&id, day)| {
                    lot(id, day.map(|d| base + chrono::Days::new(d)))
                })
                .collect();
            lots.sort_by(fefo_order);

            for pair in lots.windows(2) {
                // Sorted output never places a dated lot after an undated
                // one, and dates never decrease.
                match (pair[0].expiration_date, pair[1].expiration_date) {
                    (Some(x), Some(y)) => prop_assert!(x <= y),
                    (None, Some(_)) => prop_assert!(false, "undated lot sorted before dated"),
                    _ => {}
                }
            }
        }
    }
}
