mod common;

use bodega_api::{
    entities::{
        movement::{self, Entity as Movement},
        stock_lot::{self, Entity as StockLot},
    },
    errors::ServiceError,
    services::allocation::{AvailabilityFilter, DispatchRequestLine, NewDispatch},
};
use common::{date, grant_budget_line, purchase_doc, seed_catalog_item, seed_user, setup};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

fn request(product_code: i32, quantity: i32) -> NewDispatch {
    NewDispatch {
        service_unit_id: None,
        notes: None,
        lines: vec![DispatchRequestLine {
            product_code,
            presentation_code: None,
            quantity,
        }],
    }
}

async fn lot_remaining(ctx: &common::TestContext, batch: &str) -> i32 {
    StockLot::find()
        .filter(stock_lot::Column::Batch.eq(batch))
        .one(ctx.db.as_ref())
        .await
        .unwrap()
        .expect("lot missing")
        .remaining_quantity
}

#[tokio::test]
async fn fefo_consumes_earliest_expiration_first() {
    let ctx = setup().await;
    let item = seed_catalog_item(ctx.db.as_ref(), 182, 7001, "PARACETAMOL 500MG").await;
    let user = seed_user(ctx.db.as_ref(), "MARIO", "PEREZ").await;
    grant_budget_line(ctx.db.as_ref(), user.id, 182).await;

    // Lot A expires first and must be drained before lot B is touched.
    ctx.services
        .receiving
        .create_purchase(
            purchase_doc(
                item.id,
                dec!(2.00),
                vec![
                    (100, Some("LOT-A"), Some(date(2025, 1, 1))),
                    (50, Some("LOT-B"), Some(date(2025, 6, 1))),
                ],
            ),
            user.id,
        )
        .await
        .unwrap();

    let dispatch = ctx
        .services
        .allocation
        .create_dispatch(request(7001, 120), user.id)
        .await
        .unwrap();

    assert_eq!(dispatch.total_quantity, 120);
    assert_eq!(dispatch.total_value, dec!(240.00));
    assert_eq!(dispatch.lines.len(), 2);
    assert_eq!(dispatch.lines[0].batch.as_deref(), Some("LOT-A"));
    assert_eq!(dispatch.lines[0].quantity, 100);
    assert_eq!(dispatch.lines[1].batch.as_deref(), Some("LOT-B"));
    assert_eq!(dispatch.lines[1].quantity, 20);
    assert!(dispatch.code.starts_with("DESP-"));

    assert_eq!(lot_remaining(&ctx, "LOT-A").await, 0);
    assert_eq!(lot_remaining(&ctx, "LOT-B").await, 30);

    let movements = Movement::find()
        .filter(movement::Column::DispatchId.eq(dispatch.id))
        .all(ctx.db.as_ref())
        .await
        .unwrap();
    assert_eq!(movements.len(), 2);
    assert!(movements.iter().all(|m| m.kind == "DISPATCH_OUT"));
}

#[tokio::test]
async fn lots_without_expiration_are_consumed_last() {
    let ctx = setup().await;
    let item = seed_catalog_item(ctx.db.as_ref(), 182, 7002, "SALINE 0.9%").await;
    let user = seed_user(ctx.db.as_ref(), "MARIO", "PEREZ").await;
    grant_budget_line(ctx.db.as_ref(), user.id, 182).await;

    ctx.services
        .receiving
        .create_purchase(
            purchase_doc(
                item.id,
                dec!(1.00),
                vec![
                    (30, Some("UNDATED"), None),
                    (30, Some("DATED"), Some(date(2026, 12, 31))),
                ],
            ),
            user.id,
        )
        .await
        .unwrap();

    let dispatch = ctx
        .services
        .allocation
        .create_dispatch(request(7002, 40), user.id)
        .await
        .unwrap();

    // The dated lot is drained first even though it was created later.
    assert_eq!(dispatch.lines[0].batch.as_deref(), Some("DATED"));
    assert_eq!(dispatch.lines[0].quantity, 30);
    assert_eq!(dispatch.lines[1].batch.as_deref(), Some("UNDATED"));
    assert_eq!(dispatch.lines[1].quantity, 10);
}

#[tokio::test]
async fn shortfall_rejects_and_leaves_all_lots_untouched() {
    let ctx = setup().await;
    let item_a = seed_catalog_item(ctx.db.as_ref(), 182, 7003, "GLOVES NITRILE").await;
    let item_b = seed_catalog_item(ctx.db.as_ref(), 182, 7004, "MASKS N95").await;
    let user = seed_user(ctx.db.as_ref(), "MARIO", "PEREZ").await;
    grant_budget_line(ctx.db.as_ref(), user.id, 182).await;

    ctx.services
        .receiving
        .create_purchase(
            purchase_doc(item_a.id, dec!(0.50), vec![(100, Some("GL-1"), None)]),
            user.id,
        )
        .await
        .unwrap();
    ctx.services
        .receiving
        .create_purchase(
            purchase_doc(item_b.id, dec!(2.00), vec![(5, Some("MK-1"), None)]),
            user.id,
        )
        .await
        .unwrap();

    let dto = NewDispatch {
        service_unit_id: None,
        notes: None,
        lines: vec![
            DispatchRequestLine {
                product_code: 7003,
                presentation_code: None,
                quantity: 50,
            },
            DispatchRequestLine {
                product_code: 7004,
                presentation_code: None,
                quantity: 8, // only 5 on hand
            },
        ],
    };

    let err = ctx
        .services
        .allocation
        .create_dispatch(dto, user.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));
    assert!(err.to_string().contains("3 unit(s)"));
    assert!(err.to_string().contains("line #2"));

    // First line was satisfiable but nothing may persist.
    assert_eq!(lot_remaining(&ctx, "GL-1").await, 100);
    assert_eq!(lot_remaining(&ctx, "MK-1").await, 5);
    assert_eq!(
        Movement::find()
            .filter(movement::Column::Kind.eq("DISPATCH_OUT"))
            .all(ctx.db.as_ref())
            .await
            .unwrap()
            .len(),
        0
    );
}

#[tokio::test]
async fn dispatch_with_no_eligible_lots_names_the_product() {
    let ctx = setup().await;
    let user = seed_user(ctx.db.as_ref(), "MARIO", "PEREZ").await;
    grant_budget_line(ctx.db.as_ref(), user.id, 182).await;

    let err = ctx
        .services
        .allocation
        .create_dispatch(request(4040, 1), user.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));
    assert!(err.to_string().contains("4040"));
}

#[tokio::test]
async fn dispatch_requires_an_authorized_budget_line() {
    let ctx = setup().await;
    let item = seed_catalog_item(ctx.db.as_ref(), 268, 7005, "LAB REAGENT X").await;
    let receiver = seed_user(ctx.db.as_ref(), "ANA", "LOPEZ").await;
    let dispatcher = seed_user(ctx.db.as_ref(), "MARIO", "PEREZ").await;
    // Dispatcher is only authorized for budget line 182, the stock is 268.
    grant_budget_line(ctx.db.as_ref(), dispatcher.id, 182).await;

    ctx.services
        .receiving
        .create_purchase(
            purchase_doc(item.id, dec!(9.99), vec![(10, Some("RX-1"), None)]),
            receiver.id,
        )
        .await
        .unwrap();

    let err = ctx
        .services
        .allocation
        .create_dispatch(request(7005, 1), dispatcher.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
    assert_eq!(lot_remaining(&ctx, "RX-1").await, 10);

    let nobody = seed_user(ctx.db.as_ref(), "SIN", "PERMISOS").await;
    let err = ctx
        .services
        .allocation
        .create_dispatch(request(7005, 1), nobody.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn availability_groups_per_product_and_reads_are_idempotent() {
    let ctx = setup().await;
    let item = seed_catalog_item(ctx.db.as_ref(), 182, 7006, "VITAMIN C 1G").await;
    let user = seed_user(ctx.db.as_ref(), "MARIO", "PEREZ").await;
    grant_budget_line(ctx.db.as_ref(), user.id, 182).await;

    ctx.services
        .receiving
        .create_purchase(
            purchase_doc(
                item.id,
                dec!(0.25),
                vec![
                    (60, Some("VC-LATE"), Some(date(2026, 1, 1))),
                    (40, Some("VC-EARLY"), Some(date(2025, 3, 1))),
                ],
            ),
            user.id,
        )
        .await
        .unwrap();

    let filter = AvailabilityFilter {
        product_code: Some(7006),
        ..Default::default()
    };
    let first = ctx.services.allocation.query_availability(&filter).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].total_on_hand, 100);
    // FEFO order inside the group.
    assert_eq!(first[0].lots[0].batch, "VC-EARLY");
    assert_eq!(first[0].lots[1].batch, "VC-LATE");

    let second = ctx.services.allocation.query_availability(&filter).await.unwrap();
    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
}

#[tokio::test]
async fn valuation_is_conserved_across_receive_and_dispatch() {
    let ctx = setup().await;
    let item = seed_catalog_item(ctx.db.as_ref(), 182, 7007, "INSULIN PEN").await;
    let user = seed_user(ctx.db.as_ref(), "MARIO", "PEREZ").await;
    grant_budget_line(ctx.db.as_ref(), user.id, 182).await;

    let received = ctx
        .services
        .receiving
        .create_purchase(
            purchase_doc(
                item.id,
                dec!(12.50),
                vec![
                    (10, Some("IP-1"), Some(date(2025, 2, 1))),
                    (10, Some("IP-2"), Some(date(2025, 8, 1))),
                ],
            ),
            user.id,
        )
        .await
        .unwrap();

    let dispatch = ctx
        .services
        .allocation
        .create_dispatch(request(7007, 13), user.id)
        .await
        .unwrap();

    let lots = StockLot::find()
        .filter(stock_lot::Column::ProductCode.eq(7007))
        .all(ctx.db.as_ref())
        .await
        .unwrap();
    let on_hand_value: Decimal = lots
        .iter()
        .map(|l| l.unit_price * Decimal::from(l.remaining_quantity))
        .sum();

    // stock-in value minus dispatch-out value equals current valuation
    assert_eq!(on_hand_value, received.invoice_total - dispatch.total_value);
    assert!(lots.iter().all(|l| l.total_price
        == l.unit_price * Decimal::from(l.remaining_quantity)));
}
