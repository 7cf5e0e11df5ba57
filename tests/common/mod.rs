#![allow(dead_code)]

use bodega_api::{
    entities::{catalog_item, service_unit, user, user_budget_line},
    migrator::Migrator,
    services::{
        receiving::{NewPurchase, NewPurchaseLine, NewPurchaseLot},
        AppServices,
    },
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;

pub struct TestContext {
    pub db: Arc<DatabaseConnection>,
    pub services: AppServices,
}

/// Fresh in-memory database with the full schema and a service stack
/// without an event channel. The pool is pinned to one connection so every
/// query sees the same in-memory database.
pub async fn setup() -> TestContext {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options.max_connections(1).min_connections(1);
    let db = Database::connect(options)
        .await
        .expect("failed to open in-memory sqlite");
    Migrator::up(&db, None).await.expect("migrations failed");

    let db = Arc::new(db);
    let services = AppServices::build(db.clone(), None);
    TestContext { db, services }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub async fn seed_catalog_item(
    db: &DatabaseConnection,
    budget_line: i32,
    product_code: i32,
    name: &str,
) -> catalog_item::Model {
    catalog_item::ActiveModel {
        budget_line: Set(budget_line),
        product_code: Set(product_code),
        product_name: Set(name.to_string()),
        characteristics: Set(format!("{} STANDARD GRADE", name)),
        presentation_code: Set(1),
        presentation_name: Set("BOX".to_string()),
        unit_of_measure: Set("UNIT".to_string()),
        active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("failed to seed catalog item")
}

pub async fn seed_user(db: &DatabaseConnection, first: &str, last: &str) -> user::Model {
    user::ActiveModel {
        first_names: Set(first.to_string()),
        last_names: Set(last.to_string()),
        active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("failed to seed user")
}

pub async fn grant_budget_line(db: &DatabaseConnection, user_id: i64, budget_line: i32) {
    user_budget_line::ActiveModel {
        user_id: Set(user_id),
        budget_line: Set(budget_line),
        active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("failed to grant budget line");
}

pub async fn seed_service_unit(db: &DatabaseConnection, name: &str) -> service_unit::Model {
    service_unit::ActiveModel {
        name: Set(name.to_string()),
        active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("failed to seed service unit")
}

/// Single-line purchase document with the given batch specs.
pub fn purchase_doc(
    catalog_item_id: i64,
    unit_price: Decimal,
    lots: Vec<(i32, Option<&str>, Option<NaiveDate>)>,
) -> NewPurchase {
    let total: i32 = lots.iter().map(|(qty, _, _)| qty).sum();
    NewPurchase {
        invoice_number: "A-1001".to_string(),
        invoice_series: "A".to_string(),
        purchase_type: "DIRECT".to_string(),
        entry_date: date(2024, 7, 1),
        supplier: "DISTRIBUIDORA CENTRAL".to_string(),
        purchase_order: None,
        program: None,
        form_1h_number: None,
        kardex_number: Some(77),
        lines: vec![NewPurchaseLine {
            catalog_item_id,
            total_quantity: total,
            unit_price,
            notes: None,
            lots: lots
                .into_iter()
                .map(|(quantity, batch, expiration_date)| NewPurchaseLot {
                    quantity,
                    batch: batch.map(str::to_string),
                    expiration_date,
                    commitment_letter: false,
                    return_months: None,
                    return_notes: None,
                })
                .collect(),
        }],
    }
}
