mod common;

use bodega_api::{
    entities::{
        adjustment::{AdjustmentKind, Entity as Adjustment},
        adjustment_line::Entity as AdjustmentLine,
        movement::{self, Entity as Movement},
        stock_lot::{self, Entity as StockLot},
    },
    errors::ServiceError,
    services::adjustment::{NewAdjustment, NewAdjustmentLine},
};
use common::{date, grant_budget_line, purchase_doc, seed_catalog_item, seed_user, setup};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

fn entry_line(product_code: i32, quantity: i32) -> NewAdjustmentLine {
    NewAdjustmentLine {
        catalog_item_id: None,
        product_code: Some(product_code),
        quantity,
        product_name: None,
        characteristics: None,
        budget_line: None,
        presentation_code: None,
        presentation: None,
        unit_of_measure: None,
        batch: None,
        expiration_date: None,
        commitment_letter: None,
        return_months: None,
        return_notes: None,
        unit_price: None,
        kardex_number: None,
        notes: None,
    }
}

fn adjustment(kind: AdjustmentKind, lines: Vec<NewAdjustmentLine>) -> NewAdjustment {
    NewAdjustment {
        kind,
        reference_document: "ACTA-2024-015".to_string(),
        notes: None,
        lines,
    }
}

#[tokio::test]
async fn entry_increments_existing_lot_and_refreshes_price() {
    let ctx = setup().await;
    let item = seed_catalog_item(ctx.db.as_ref(), 182, 8001, "OMEPRAZOLE 20MG").await;
    let user = seed_user(ctx.db.as_ref(), "RITA", "GOMEZ").await;
    grant_budget_line(ctx.db.as_ref(), user.id, 182).await;

    ctx.services
        .receiving
        .create_purchase(
            purchase_doc(item.id, dec!(1.00), vec![(20, Some("OM-1"), Some(date(2025, 5, 1)))]),
            user.id,
        )
        .await
        .unwrap();

    let mut line = entry_line(8001, 15);
    line.batch = Some("OM-1".to_string());
    line.unit_price = Some(dec!(1.20));

    let created = ctx
        .services
        .adjustment
        .create_adjustment(adjustment(AdjustmentKind::Entry, vec![line]), user.id)
        .await
        .unwrap();

    let lot = StockLot::find()
        .filter(stock_lot::Column::Batch.eq("OM-1"))
        .one(ctx.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lot.remaining_quantity, 35);
    assert_eq!(lot.unit_price, dec!(1.20));
    assert_eq!(lot.total_price, dec!(42.00));

    let movements = Movement::find()
        .filter(movement::Column::AdjustmentId.eq(created.adjustment_id))
        .all(ctx.db.as_ref())
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].kind, "ADJUSTMENT_IN");
    assert_eq!(movements[0].module, "ADJUSTMENT");
}

#[tokio::test]
async fn entry_creating_a_lot_requires_kardex_number() {
    let ctx = setup().await;
    let item = seed_catalog_item(ctx.db.as_ref(), 182, 8002, "DICLOFENAC GEL").await;
    let user = seed_user(ctx.db.as_ref(), "RITA", "GOMEZ").await;
    grant_budget_line(ctx.db.as_ref(), user.id, 182).await;
    let _ = item;

    // No lot exists yet, so this entry would create one.
    let err = ctx
        .services
        .adjustment
        .create_adjustment(
            adjustment(AdjustmentKind::Entry, vec![entry_line(8002, 10)]),
            user.id,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert!(err.to_string().contains("kardex_number"));
    assert_eq!(Adjustment::find().count(ctx.db.as_ref()).await.unwrap(), 0);

    let mut line = entry_line(8002, 10);
    line.kardex_number = Some(314);
    line.unit_price = Some(dec!(4.00));

    ctx.services
        .adjustment
        .create_adjustment(adjustment(AdjustmentKind::Entry, vec![line]), user.id)
        .await
        .unwrap();

    let lot = StockLot::find()
        .filter(stock_lot::Column::ProductCode.eq(8002))
        .one(ctx.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert!(lot.is_orphan());
    assert_eq!(lot.kardex_number, Some(314));
    assert_eq!(lot.remaining_quantity, 10);
    assert_eq!(lot.total_price, dec!(40.00));
}

#[tokio::test]
async fn exit_with_insufficient_stock_is_rejected_and_lot_unchanged() {
    let ctx = setup().await;
    let item = seed_catalog_item(ctx.db.as_ref(), 182, 8003, "RANITIDINE 150MG").await;
    let user = seed_user(ctx.db.as_ref(), "RITA", "GOMEZ").await;
    grant_budget_line(ctx.db.as_ref(), user.id, 182).await;

    ctx.services
        .receiving
        .create_purchase(
            purchase_doc(item.id, dec!(0.80), vec![(5, Some("RA-1"), None)]),
            user.id,
        )
        .await
        .unwrap();

    let err = ctx
        .services
        .adjustment
        .create_adjustment(
            adjustment(AdjustmentKind::Exit, vec![entry_line(8003, 10)]),
            user.id,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    let lot = StockLot::find()
        .filter(stock_lot::Column::Batch.eq("RA-1"))
        .one(ctx.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lot.remaining_quantity, 5);
    assert_eq!(Adjustment::find().count(ctx.db.as_ref()).await.unwrap(), 0);
}

#[tokio::test]
async fn exit_against_missing_lot_is_not_found() {
    let ctx = setup().await;
    let user = seed_user(ctx.db.as_ref(), "RITA", "GOMEZ").await;
    grant_budget_line(ctx.db.as_ref(), user.id, 0).await;

    let err = ctx
        .services
        .adjustment
        .create_adjustment(
            adjustment(AdjustmentKind::Exit, vec![{
                let mut l = entry_line(8999, 1);
                l.product_name = Some("GHOST PRODUCT".to_string());
                l.characteristics = Some("DOES NOT EXIST".to_string());
                l
            }]),
            user.id,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn forbidden_budget_line_aborts_whole_adjustment() {
    let ctx = setup().await;
    let allowed = seed_catalog_item(ctx.db.as_ref(), 182, 8004, "COTTON PACK").await;
    let restricted = seed_catalog_item(ctx.db.as_ref(), 268, 8005, "CONTROLLED SUBSTANCE").await;
    let user = seed_user(ctx.db.as_ref(), "RITA", "GOMEZ").await;
    grant_budget_line(ctx.db.as_ref(), user.id, 182).await;

    ctx.services
        .receiving
        .create_purchase(
            purchase_doc(allowed.id, dec!(1.00), vec![(10, Some("CP-1"), None)]),
            user.id,
        )
        .await
        .unwrap();
    ctx.services
        .receiving
        .create_purchase(
            purchase_doc(restricted.id, dec!(50.00), vec![(10, Some("CS-1"), None)]),
            user.id,
        )
        .await
        .unwrap();

    let err = ctx
        .services
        .adjustment
        .create_adjustment(
            adjustment(
                AdjustmentKind::Exit,
                vec![entry_line(8004, 2), entry_line(8005, 2)],
            ),
            user.id,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
    assert!(err.to_string().contains("line #2"));

    // The permitted first line must have been rolled back with the rest.
    let lot = StockLot::find()
        .filter(stock_lot::Column::Batch.eq("CP-1"))
        .one(ctx.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lot.remaining_quantity, 10);
    assert_eq!(Adjustment::find().count(ctx.db.as_ref()).await.unwrap(), 0);
    assert_eq!(
        AdjustmentLine::find().count(ctx.db.as_ref()).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn adjustment_detail_includes_lot_snapshot() {
    let ctx = setup().await;
    let item = seed_catalog_item(ctx.db.as_ref(), 182, 8006, "BANDAGE ELASTIC").await;
    let user = seed_user(ctx.db.as_ref(), "RITA", "GOMEZ").await;
    grant_budget_line(ctx.db.as_ref(), user.id, 182).await;

    ctx.services
        .receiving
        .create_purchase(
            purchase_doc(item.id, dec!(2.00), vec![(30, Some("BE-1"), None)]),
            user.id,
        )
        .await
        .unwrap();

    let created = ctx
        .services
        .adjustment
        .create_adjustment(
            adjustment(AdjustmentKind::Exit, vec![entry_line(8006, 12)]),
            user.id,
        )
        .await
        .unwrap();

    let detail = ctx
        .services
        .adjustment
        .get_adjustment(created.adjustment_id)
        .await
        .unwrap();
    assert_eq!(detail.adjustment.kind, "EXIT");
    assert_eq!(detail.user_name.as_deref(), Some("RITA GOMEZ"));
    assert_eq!(detail.lines.len(), 1);
    let lot = detail.lines[0].lot.as_ref().expect("lot snapshot");
    assert_eq!(lot.remaining_quantity, 18);
}
