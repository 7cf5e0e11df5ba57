use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::{
    entities::{
        adjustment::{self, AdjustmentKind, Entity as Adjustment},
        adjustment_line::{self, Entity as AdjustmentLine},
        catalog_item::{self, Entity as CatalogItem},
        dispatch_line::{self, Entity as DispatchLine},
        movement::{self, Entity as Movement, MovementKind, MovementModule},
        stock_lot::{self, Entity as StockLot},
        user::{self, Entity as User},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        allocation::fefo_order,
        authorization::{ensure_budget_line_permitted, AuthorizationService},
        catalog::CatalogService,
        page_and_limit,
        receiving::NO_BATCH,
    },
};

/// Applies manual entry/exit corrections against the Lot Store and reverses
/// previously committed adjustments when no later movement blocks it.
#[derive(Clone)]
pub struct AdjustmentService {
    db: Arc<DatabaseConnection>,
    authorization: Arc<AuthorizationService>,
    catalog: Arc<CatalogService>,
    event_sender: Option<EventSender>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAdjustmentLine {
    pub catalog_item_id: Option<i64>,
    pub product_code: Option<i32>,
    pub quantity: i32,
    pub product_name: Option<String>,
    pub characteristics: Option<String>,
    pub budget_line: Option<i32>,
    pub presentation_code: Option<i32>,
    pub presentation: Option<String>,
    pub unit_of_measure: Option<String>,
    pub batch: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    pub commitment_letter: Option<bool>,
    pub return_months: Option<i32>,
    pub return_notes: Option<String>,
    pub unit_price: Option<Decimal>,
    pub kardex_number: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAdjustment {
    pub kind: AdjustmentKind,
    pub reference_document: String,
    pub notes: Option<String>,
    pub lines: Vec<NewAdjustmentLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdjustmentCreated {
    pub adjustment_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdjustmentFilter {
    pub kind: Option<String>,
    pub reference: Option<String>,
    pub user_id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl AdjustmentFilter {
    fn to_condition(&self) -> Condition {
        let mut condition = Condition::all();
        if let Some(kind) = self.kind.as_deref().filter(|k| !k.is_empty()) {
            condition = condition.add(adjustment::Column::Kind.eq(kind));
        }
        if let Some(reference) = self.reference.as_deref().filter(|r| !r.is_empty()) {
            condition = condition.add(adjustment::Column::ReferenceDocument.contains(reference));
        }
        if let Some(user_id) = self.user_id {
            condition = condition.add(adjustment::Column::UserId.eq(user_id));
        }
        if let Some(from) = self.from {
            let start = from.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
            condition = condition.add(adjustment::Column::AdjustedAt.gte(start));
        }
        if let Some(to) = self.to {
            let end = to.and_hms_opt(23, 59, 59).unwrap_or_default().and_utc();
            condition = condition.add(adjustment::Column::AdjustedAt.lte(end));
        }
        condition
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdjustmentSummary {
    pub id: i64,
    pub kind: String,
    pub reference_document: String,
    pub adjusted_at: DateTime<Utc>,
    pub user: String,
    pub total_lines: usize,
    pub total_quantity: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdjustmentLineDetail {
    #[serde(flatten)]
    pub line: adjustment_line::Model,
    /// Current lot state; None when the lot was garbage-collected later.
    pub lot: Option<stock_lot::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdjustmentDetail {
    #[serde(flatten)]
    pub adjustment: adjustment::Model,
    pub user_name: Option<String>,
    pub lines: Vec<AdjustmentLineDetail>,
}

/// Resolved per-line context: explicit DTO values fall back to the matched
/// lot, then to the catalog item.
struct LineContext {
    lot: Option<stock_lot::Model>,
    catalog_item_id: Option<i64>,
    budget_line: i32,
    product_code: i32,
    product_name: String,
    characteristics: String,
    presentation_code: i32,
    presentation: String,
    unit_of_measure: String,
    batch: Option<String>,
    expiration_date: Option<NaiveDate>,
    commitment_letter: bool,
    return_months: Option<i32>,
    return_notes: Option<String>,
    unit_price: Option<Decimal>,
    kardex_number: Option<i32>,
}

impl AdjustmentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        authorization: Arc<AuthorizationService>,
        catalog: Arc<CatalogService>,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            db,
            authorization,
            catalog,
            event_sender,
        }
    }

    /// Applies an adjustment. Entries increment a matching lot or create a
    /// new one (kardex number mandatory for new lots); exits decrement an
    /// existing lot with enough remaining stock. Every line writes one
    /// ledger movement; any failure rolls the whole adjustment back.
    #[instrument(skip(self, dto))]
    pub async fn create_adjustment(
        &self,
        dto: NewAdjustment,
        acting_user: i64,
    ) -> Result<AdjustmentCreated, ServiceError> {
        if acting_user <= 0 {
            return Err(ServiceError::Validation(
                "acting user is required".to_string(),
            ));
        }
        if dto.lines.is_empty() {
            return Err(ServiceError::Validation(
                "adjustment must contain at least one line".to_string(),
            ));
        }
        if dto.reference_document.trim().is_empty() {
            return Err(ServiceError::Validation(
                "reference document is required".to_string(),
            ));
        }

        let permitted = self.authorization.permitted_budget_lines(acting_user).await?;
        if permitted.is_empty() {
            return Err(ServiceError::Forbidden(
                "user has no authorized budget lines for adjustments".to_string(),
            ));
        }

        let kind_label = dto.kind.as_str().to_string();
        let adjustment_id = self
            .db
            .transaction::<_, i64, ServiceError>(move |txn| {
                Box::pin(async move {
                    let now = Utc::now();

                    let header = adjustment::ActiveModel {
                        kind: Set(dto.kind.as_str().to_string()),
                        reference_document: Set(dto.reference_document.trim().to_string()),
                        notes: Set(dto
                            .notes
                            .as_deref()
                            .map(str::trim)
                            .filter(|n| !n.is_empty())
                            .map(str::to_string)),
                        user_id: Set(acting_user),
                        adjusted_at: Set(now),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                    for (index, line_dto) in dto.lines.iter().enumerate() {
                        if line_dto.quantity <= 0 {
                            return Err(ServiceError::Validation(format!(
                                "quantity must be greater than 0 (line #{})",
                                index + 1
                            )));
                        }

                        let ctx = resolve_line_context(txn, line_dto, index).await?;
                        ensure_budget_line_permitted(&permitted, ctx.budget_line, index)?;

                        let lot = match dto.kind {
                            AdjustmentKind::Entry => {
                                apply_entry(txn, &ctx, line_dto.quantity, index, now).await?
                            }
                            AdjustmentKind::Exit => {
                                apply_exit(txn, &ctx, line_dto.quantity, index, now).await?
                            }
                        };

                        adjustment_line::ActiveModel {
                            adjustment_id: Set(header.id),
                            lot_id: Set(lot.id),
                            catalog_item_id: Set(ctx.catalog_item_id),
                            product_code: Set(ctx.product_code),
                            product_name: Set(ctx.product_name.clone()),
                            characteristics: Set(ctx.characteristics.clone()),
                            quantity: Set(line_dto.quantity),
                            presentation_code: Set(Some(ctx.presentation_code)),
                            presentation: Set(Some(ctx.presentation.clone())),
                            unit_of_measure: Set(Some(ctx.unit_of_measure.clone())),
                            batch: Set(Some(lot.batch.clone())),
                            expiration_date: Set(lot.expiration_date),
                            notes: Set(line_dto
                                .notes
                                .as_deref()
                                .map(str::trim)
                                .filter(|n| !n.is_empty())
                                .map(str::to_string)),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                        let kind = match dto.kind {
                            AdjustmentKind::Entry => MovementKind::AdjustmentIn,
                            AdjustmentKind::Exit => MovementKind::AdjustmentOut,
                        };

                        movement::ActiveModel {
                            lot_id: Set(lot.id),
                            catalog_item_id: Set(ctx.catalog_item_id),
                            purchase_id: Set(lot.purchase_id),
                            dispatch_id: Set(None),
                            adjustment_id: Set(Some(header.id)),
                            quantity: Set(line_dto.quantity),
                            kind: Set(kind.as_str().to_string()),
                            module: Set(MovementModule::Adjustment.as_str().to_string()),
                            user_id: Set(acting_user),
                            batch: Set(Some(lot.batch.clone())),
                            expiration_date: Set(lot.expiration_date),
                            moved_at: Set(now),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    }

                    Ok(header.id)
                })
            })
            .await
            .map_err(ServiceError::from)?;

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::AdjustmentApplied {
                    adjustment_id,
                    kind: kind_label,
                })
                .await;
        }

        info!("adjustment {} applied", adjustment_id);
        Ok(AdjustmentCreated { adjustment_id })
    }

    /// Reverses a committed adjustment, restoring each lot to its
    /// pre-adjustment state. Rejected with a conflict when any touched lot
    /// has a strictly later movement from another transaction. Lots that
    /// land on zero with no purchase origin and no remaining references are
    /// garbage-collected.
    #[instrument(skip(self))]
    pub async fn reverse_adjustment(
        &self,
        adjustment_id: i64,
        acting_user: i64,
    ) -> Result<(), ServiceError> {
        if acting_user <= 0 {
            return Err(ServiceError::Validation(
                "acting user is required".to_string(),
            ));
        }

        self.db
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    let header = Adjustment::find_by_id(adjustment_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Adjustment {} not found",
                                adjustment_id
                            ))
                        })?;

                    let kind = AdjustmentKind::parse(&header.kind).ok_or_else(|| {
                        ServiceError::Internal(format!(
                            "adjustment {} has unknown kind {}",
                            adjustment_id, header.kind
                        ))
                    })?;

                    let lines = AdjustmentLine::find()
                        .filter(adjustment_line::Column::AdjustmentId.eq(adjustment_id))
                        .order_by_asc(adjustment_line::Column::Id)
                        .all(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    let movements = Movement::find()
                        .filter(movement::Column::AdjustmentId.eq(adjustment_id))
                        .order_by_asc(movement::Column::Id)
                        .all(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    let mut movements_by_lot: HashMap<i64, Vec<&movement::Model>> = HashMap::new();
                    for m in &movements {
                        movements_by_lot.entry(m.lot_id).or_default().push(m);
                    }

                    let mut gc_candidates: Vec<i64> = Vec::new();

                    for (index, line) in lines.iter().enumerate() {
                        let lot = StockLot::find_by_id(line.lot_id)
                            .one(txn)
                            .await
                            .map_err(ServiceError::db_error)?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "lot {} for adjustment line #{} not found",
                                    line.lot_id,
                                    index + 1
                                ))
                            })?;

                        let line_movements =
                            movements_by_lot.get(&lot.id).cloned().unwrap_or_default();
                        if line_movements.is_empty() {
                            return Err(ServiceError::Conflict(format!(
                                "lot {} has no ledger entries for adjustment {} (line #{})",
                                lot.id,
                                adjustment_id,
                                index + 1
                            )));
                        }

                        let own_ids: Vec<i64> = line_movements.iter().map(|m| m.id).collect();
                        let latest = line_movements
                            .iter()
                            .map(|m| m.moved_at)
                            .max()
                            .unwrap_or(header.adjusted_at);

                        let later = Movement::find()
                            .filter(movement::Column::LotId.eq(lot.id))
                            .filter(movement::Column::Id.is_not_in(own_ids))
                            .filter(movement::Column::MovedAt.gt(latest))
                            .count(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                        if later > 0 {
                            return Err(ServiceError::Conflict(format!(
                                "adjustment {} cannot be reversed: lot {} has {} later movement(s) (line #{})",
                                adjustment_id,
                                lot.id,
                                later,
                                index + 1
                            )));
                        }

                        let new_remaining = match kind {
                            AdjustmentKind::Entry => {
                                let reverted = lot.remaining_quantity - line.quantity;
                                if reverted < 0 {
                                    return Err(ServiceError::Conflict(format!(
                                        "lot {} holds less than the adjusted quantity (line #{})",
                                        lot.id,
                                        index + 1
                                    )));
                                }
                                if reverted == 0 && lot.is_orphan() {
                                    gc_candidates.push(lot.id);
                                }
                                reverted
                            }
                            AdjustmentKind::Exit => lot.remaining_quantity + line.quantity,
                        };

                        let unit_price = lot.unit_price;
                        let mut active: stock_lot::ActiveModel = lot.into();
                        active.remaining_quantity = Set(new_remaining);
                        active.total_price = Set(unit_price * Decimal::from(new_remaining));
                        active.updated_at = Set(Utc::now());
                        active
                            .update(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                    }

                    AdjustmentLine::delete_many()
                        .filter(adjustment_line::Column::AdjustmentId.eq(adjustment_id))
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    Movement::delete_many()
                        .filter(movement::Column::AdjustmentId.eq(adjustment_id))
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    Adjustment::delete_by_id(adjustment_id)
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    // Drop zero-quantity lots that nothing references
                    // anymore and that never had a purchase origin.
                    for lot_id in gc_candidates {
                        let remaining_movements = Movement::find()
                            .filter(movement::Column::LotId.eq(lot_id))
                            .count(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                        let remaining_lines = AdjustmentLine::find()
                            .filter(adjustment_line::Column::LotId.eq(lot_id))
                            .count(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                        let remaining_dispatches = DispatchLine::find()
                            .filter(dispatch_line::Column::LotId.eq(lot_id))
                            .count(txn)
                            .await
                            .map_err(ServiceError::db_error)?;

                        if remaining_movements == 0
                            && remaining_lines == 0
                            && remaining_dispatches == 0
                        {
                            StockLot::delete_by_id(lot_id)
                                .exec(txn)
                                .await
                                .map_err(ServiceError::db_error)?;
                        }
                    }

                    Ok(())
                })
            })
            .await
            .map_err(ServiceError::from)?;

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::AdjustmentReversed { adjustment_id })
                .await;
        }

        info!(
            "adjustment {} reversed by user {}",
            adjustment_id, acting_user
        );
        Ok(())
    }

    /// Paginated adjustment summaries, newest first.
    pub async fn list_adjustments(
        &self,
        filter: &AdjustmentFilter,
    ) -> Result<(Vec<AdjustmentSummary>, u64), ServiceError> {
        let (page, limit) = page_and_limit(filter.page, filter.limit);
        let condition = filter.to_condition();

        let total = Adjustment::find()
            .filter(condition.clone())
            .count(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let adjustments = Adjustment::find()
            .filter(condition)
            .order_by_desc(adjustment::Column::AdjustedAt)
            .order_by_desc(adjustment::Column::Id)
            .limit(limit)
            .offset((page - 1) * limit)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let ids: Vec<i64> = adjustments.iter().map(|a| a.id).collect();
        let lines = if ids.is_empty() {
            Vec::new()
        } else {
            AdjustmentLine::find()
                .filter(adjustment_line::Column::AdjustmentId.is_in(ids))
                .all(self.db.as_ref())
                .await
                .map_err(ServiceError::db_error)?
        };

        let mut per_adjustment: HashMap<i64, (usize, i64)> = HashMap::new();
        for line in &lines {
            let entry = per_adjustment.entry(line.adjustment_id).or_default();
            entry.0 += 1;
            entry.1 += line.quantity as i64;
        }

        let user_ids: Vec<i64> = adjustments.iter().map(|a| a.user_id).collect();
        let users = if user_ids.is_empty() {
            Vec::new()
        } else {
            User::find()
                .filter(user::Column::Id.is_in(user_ids))
                .all(self.db.as_ref())
                .await
                .map_err(ServiceError::db_error)?
        };
        let user_names: HashMap<i64, String> =
            users.into_iter().map(|u| (u.id, u.display_name())).collect();

        let summaries = adjustments
            .into_iter()
            .map(|a| {
                let (total_lines, total_quantity) =
                    per_adjustment.get(&a.id).copied().unwrap_or((0, 0));
                AdjustmentSummary {
                    user: user_names.get(&a.user_id).cloned().unwrap_or_default(),
                    total_lines,
                    total_quantity,
                    id: a.id,
                    kind: a.kind,
                    reference_document: a.reference_document,
                    adjusted_at: a.adjusted_at,
                }
            })
            .collect();

        Ok((summaries, total))
    }

    pub async fn get_adjustment(
        &self,
        adjustment_id: i64,
    ) -> Result<AdjustmentDetail, ServiceError> {
        let header = Adjustment::find_by_id(adjustment_id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Adjustment {} not found", adjustment_id))
            })?;

        let lines = AdjustmentLine::find()
            .filter(adjustment_line::Column::AdjustmentId.eq(adjustment_id))
            .order_by_asc(adjustment_line::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let lot_ids: Vec<i64> = lines.iter().map(|l| l.lot_id).collect();
        let lots = if lot_ids.is_empty() {
            Vec::new()
        } else {
            StockLot::find()
                .filter(stock_lot::Column::Id.is_in(lot_ids))
                .all(self.db.as_ref())
                .await
                .map_err(ServiceError::db_error)?
        };
        let lots_by_id: HashMap<i64, stock_lot::Model> =
            lots.into_iter().map(|l| (l.id, l)).collect();

        let user_name = User::find_by_id(header.user_id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .map(|u| u.display_name());

        let lines = lines
            .into_iter()
            .map(|line| AdjustmentLineDetail {
                lot: lots_by_id.get(&line.lot_id).cloned(),
                line,
            })
            .collect();

        Ok(AdjustmentDetail {
            adjustment: header,
            user_name,
            lines,
        })
    }

    /// Catalog search for the adjustment form, restricted to the acting
    /// user's permitted budget lines.
    pub async fn search_catalog(
        &self,
        term: &str,
        acting_user: i64,
    ) -> Result<Vec<catalog_item::Model>, ServiceError> {
        let permitted = self.authorization.permitted_budget_lines(acting_user).await?;
        self.catalog.search(term, Some(&permitted)).await
    }
}

async fn resolve_line_context<C: ConnectionTrait>(
    conn: &C,
    dto: &NewAdjustmentLine,
    index: usize,
) -> Result<LineContext, ServiceError> {
    let catalog = match (dto.catalog_item_id, dto.product_code) {
        (Some(id), _) => Some(
            CatalogItem::find_by_id(id)
                .one(conn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Catalog item {} not found", id))
                })?,
        ),
        (None, Some(code)) => CatalogItem::find()
            .filter(catalog_item::Column::ProductCode.eq(code))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?,
        (None, None) => None,
    };

    let product_code = dto
        .product_code
        .or(catalog.as_ref().map(|c| c.product_code))
        .ok_or_else(|| {
            ServiceError::Validation(format!(
                "a product code or catalog item is required (line #{})",
                index + 1
            ))
        })?;

    let presentation_filter = dto
        .presentation_code
        .or(catalog.as_ref().map(|c| c.presentation_code));
    let batch = dto
        .batch
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string);

    let mut lot_condition = Condition::all().add(stock_lot::Column::ProductCode.eq(product_code));
    if let Some(presentation) = presentation_filter {
        lot_condition = lot_condition.add(stock_lot::Column::PresentationCode.eq(presentation));
    }
    if let Some(batch) = batch.as_deref() {
        lot_condition = lot_condition.add(stock_lot::Column::Batch.eq(batch));
    }

    let mut matches = StockLot::find()
        .filter(lot_condition)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;
    matches.sort_by(fefo_order);
    let lot = matches.into_iter().next();

    let product_name = dto
        .product_name
        .clone()
        .or(lot.as_ref().map(|l| l.product_name.clone()))
        .or(catalog.as_ref().map(|c| c.product_name.clone()));
    let characteristics = dto
        .characteristics
        .clone()
        .or(lot.as_ref().map(|l| l.characteristics.clone()))
        .or(catalog.as_ref().map(|c| c.characteristics.clone()));

    let (product_name, characteristics) = match (product_name, characteristics) {
        (Some(n), Some(c)) => (n, c),
        _ => {
            return Err(ServiceError::Validation(format!(
                "lines must resolve a product name and characteristics (line #{})",
                index + 1
            )))
        }
    };

    let budget_line = dto
        .budget_line
        .or(lot.as_ref().map(|l| l.budget_line))
        .or(catalog.as_ref().map(|c| c.budget_line))
        .unwrap_or(0);
    let presentation_code = dto
        .presentation_code
        .or(lot.as_ref().map(|l| l.presentation_code))
        .or(catalog.as_ref().map(|c| c.presentation_code))
        .unwrap_or(0);
    let presentation = dto
        .presentation
        .clone()
        .or(lot.as_ref().map(|l| l.presentation.clone()))
        .or(catalog.as_ref().map(|c| c.presentation_name.clone()))
        .unwrap_or_else(|| "NO PRESENTATION".to_string());
    let unit_of_measure = dto
        .unit_of_measure
        .clone()
        .or(lot.as_ref().map(|l| l.unit_of_measure.clone()))
        .or(catalog.as_ref().map(|c| c.unit_of_measure.clone()))
        .unwrap_or_else(|| "UNIT".to_string());

    let expiration_date = dto
        .expiration_date
        .or(lot.as_ref().and_then(|l| l.expiration_date));
    let commitment_letter = dto
        .commitment_letter
        .or(lot.as_ref().map(|l| l.commitment_letter))
        .unwrap_or(false);
    let return_months = dto.return_months.or(lot.as_ref().and_then(|l| l.return_months));
    let return_notes = dto
        .return_notes
        .clone()
        .or(lot.as_ref().and_then(|l| l.return_notes.clone()));

    let kardex_number = lot
        .as_ref()
        .and_then(|l| l.kardex_number)
        .or(dto.kardex_number);

    Ok(LineContext {
        catalog_item_id: catalog.as_ref().map(|c| c.id),
        lot,
        budget_line,
        product_code,
        product_name,
        characteristics,
        presentation_code,
        presentation,
        unit_of_measure,
        batch,
        expiration_date,
        commitment_letter,
        return_months,
        return_notes,
        unit_price: dto.unit_price,
        kardex_number,
    })
}

/// Entry: increment the matched lot (refreshing price and batch metadata)
/// or create a brand-new origin-less lot, which requires a kardex number.
async fn apply_entry<C: ConnectionTrait>(
    conn: &C,
    ctx: &LineContext,
    quantity: i32,
    index: usize,
    now: DateTime<Utc>,
) -> Result<stock_lot::Model, ServiceError> {
    match &ctx.lot {
        Some(lot) => {
            let unit_price = ctx.unit_price.unwrap_or(lot.unit_price);
            let new_remaining = lot.remaining_quantity + quantity;

            let mut active: stock_lot::ActiveModel = lot.clone().into();
            active.remaining_quantity = Set(new_remaining);
            active.unit_price = Set(unit_price);
            active.total_price = Set(unit_price * Decimal::from(new_remaining));
            if let Some(batch) = &ctx.batch {
                active.batch = Set(batch.clone());
            }
            if ctx.expiration_date.is_some() {
                active.expiration_date = Set(ctx.expiration_date);
            }
            active.commitment_letter = Set(ctx.commitment_letter);
            if ctx.return_months.is_some() {
                active.return_months = Set(ctx.return_months);
            }
            if ctx.return_notes.is_some() {
                active.return_notes = Set(ctx.return_notes.clone());
            }
            active.updated_at = Set(now);

            active.update(conn).await.map_err(ServiceError::db_error)
        }
        None => {
            // A lot with no purchase origin must stay traceable through its
            // kardex cross-reference.
            let kardex = ctx.kardex_number.ok_or_else(|| {
                ServiceError::Validation(format!(
                    "kardex_number is mandatory for entry adjustments that create a new lot (line #{})",
                    index + 1
                ))
            })?;

            let unit_price = ctx.unit_price.unwrap_or(Decimal::ZERO);
            stock_lot::ActiveModel {
                purchase_id: Set(None),
                purchase_lot_id: Set(None),
                budget_line: Set(ctx.budget_line),
                product_code: Set(ctx.product_code),
                product_name: Set(ctx.product_name.clone()),
                characteristics: Set(ctx.characteristics.clone()),
                presentation_code: Set(ctx.presentation_code),
                presentation: Set(ctx.presentation.clone()),
                unit_of_measure: Set(ctx.unit_of_measure.clone()),
                batch: Set(ctx.batch.clone().unwrap_or_else(|| NO_BATCH.to_string())),
                expiration_date: Set(ctx.expiration_date),
                commitment_letter: Set(ctx.commitment_letter),
                return_months: Set(ctx.return_months),
                return_notes: Set(ctx.return_notes.clone()),
                remaining_quantity: Set(quantity),
                unit_price: Set(unit_price),
                total_price: Set(unit_price * Decimal::from(quantity)),
                kardex_number: Set(Some(kardex)),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(conn)
            .await
            .map_err(ServiceError::db_error)
        }
    }
}

/// Exit: decrement an existing lot with enough remaining stock.
async fn apply_exit<C: ConnectionTrait>(
    conn: &C,
    ctx: &LineContext,
    quantity: i32,
    index: usize,
    now: DateTime<Utc>,
) -> Result<stock_lot::Model, ServiceError> {
    let lot = ctx.lot.as_ref().ok_or_else(|| {
        ServiceError::NotFound(format!(
            "no stock lot matches an exit adjustment (line #{})",
            index + 1
        ))
    })?;

    if lot.remaining_quantity < quantity {
        return Err(ServiceError::InsufficientStock(format!(
            "lot {} holds {} unit(s), cannot remove {} (line #{})",
            lot.id,
            lot.remaining_quantity,
            quantity,
            index + 1
        )));
    }

    let new_remaining = lot.remaining_quantity - quantity;
    let mut active: stock_lot::ActiveModel = lot.clone().into();
    active.remaining_quantity = Set(new_remaining);
    active.total_price = Set(lot.unit_price * Decimal::from(new_remaining));
    active.updated_at = Set(now);

    active.update(conn).await.map_err(ServiceError::db_error)
}
