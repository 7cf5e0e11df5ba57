//! Business services. Each write path (receiving, allocation, adjustment)
//! owns its transaction; the Lot Store and Movement Ledger are only mutated
//! from inside these services.

pub mod adjustment;
pub mod allocation;
pub mod authorization;
pub mod catalog;
pub mod ledger;
pub mod receiving;

use crate::events::EventSender;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Bundle of constructed services shared through the app state.
#[derive(Clone)]
pub struct AppServices {
    pub authorization: Arc<authorization::AuthorizationService>,
    pub catalog: Arc<catalog::CatalogService>,
    pub receiving: Arc<receiving::ReceivingService>,
    pub allocation: Arc<allocation::AllocationService>,
    pub adjustment: Arc<adjustment::AdjustmentService>,
    pub ledger: Arc<ledger::LedgerService>,
}

impl AppServices {
    pub fn build(db: Arc<DatabaseConnection>, event_sender: Option<EventSender>) -> Self {
        let authorization = Arc::new(authorization::AuthorizationService::new(db.clone()));
        let catalog = Arc::new(catalog::CatalogService::new(db.clone()));
        let receiving = Arc::new(receiving::ReceivingService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let allocation = Arc::new(allocation::AllocationService::new(
            db.clone(),
            authorization.clone(),
            event_sender.clone(),
        ));
        let adjustment = Arc::new(adjustment::AdjustmentService::new(
            db.clone(),
            authorization.clone(),
            catalog.clone(),
            event_sender,
        ));
        let ledger = Arc::new(ledger::LedgerService::new(db));

        Self {
            authorization,
            catalog,
            receiving,
            allocation,
            adjustment,
            ledger,
        }
    }
}

/// Normalizes user-supplied pagination, capping the page size.
pub(crate) fn page_and_limit(page: Option<u64>, limit: Option<u64>) -> (u64, u64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(20).clamp(1, 100);
    (page, limit)
}
