mod common;

use bodega_api::{
    entities::{
        adjustment::AdjustmentKind,
        movement::Entity as Movement,
        purchase::Entity as Purchase,
        purchase_line::Entity as PurchaseLine,
        purchase_lot::Entity as PurchaseLot,
        stock_lot::Entity as StockLot,
    },
    errors::ServiceError,
    services::{
        adjustment::{NewAdjustment, NewAdjustmentLine},
        allocation::{DispatchRequestLine, NewDispatch},
    },
};
use common::{grant_budget_line, purchase_doc, seed_catalog_item, seed_user, setup};
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, PaginatorTrait};

#[tokio::test]
async fn cancellation_removes_every_row_of_an_unconsumed_purchase() {
    let ctx = setup().await;
    let item = seed_catalog_item(ctx.db.as_ref(), 182, 6001, "SYRINGE 5ML").await;
    let user = seed_user(ctx.db.as_ref(), "ANA", "LOPEZ").await;

    let created = ctx
        .services
        .receiving
        .create_purchase(
            purchase_doc(item.id, dec!(0.15), vec![(200, Some("SY-1"), None), (100, Some("SY-2"), None)]),
            user.id,
        )
        .await
        .unwrap();

    ctx.services
        .receiving
        .cancel_purchase(created.purchase_id, user.id, "duplicate entry".to_string())
        .await
        .unwrap();

    assert_eq!(Purchase::find().count(ctx.db.as_ref()).await.unwrap(), 0);
    assert_eq!(PurchaseLine::find().count(ctx.db.as_ref()).await.unwrap(), 0);
    assert_eq!(PurchaseLot::find().count(ctx.db.as_ref()).await.unwrap(), 0);
    assert_eq!(StockLot::find().count(ctx.db.as_ref()).await.unwrap(), 0);
    assert_eq!(Movement::find().count(ctx.db.as_ref()).await.unwrap(), 0);
}

#[tokio::test]
async fn cancellation_is_refused_when_a_dispatch_consumed_the_stock() {
    let ctx = setup().await;
    let item = seed_catalog_item(ctx.db.as_ref(), 182, 6002, "ALCOHOL 70%").await;
    let user = seed_user(ctx.db.as_ref(), "ANA", "LOPEZ").await;
    grant_budget_line(ctx.db.as_ref(), user.id, 182).await;

    let created = ctx
        .services
        .receiving
        .create_purchase(
            purchase_doc(item.id, dec!(1.10), vec![(50, Some("AL-1"), None)]),
            user.id,
        )
        .await
        .unwrap();

    ctx.services
        .allocation
        .create_dispatch(
            NewDispatch {
                service_unit_id: None,
                notes: None,
                lines: vec![DispatchRequestLine {
                    product_code: 6002,
                    presentation_code: None,
                    quantity: 5,
                }],
            },
            user.id,
        )
        .await
        .unwrap();

    let err = ctx
        .services
        .receiving
        .cancel_purchase(created.purchase_id, user.id, "mistake".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
    assert!(err.to_string().contains("dispatch"));

    // Nothing was deleted.
    assert_eq!(Purchase::find().count(ctx.db.as_ref()).await.unwrap(), 1);
    assert_eq!(StockLot::find().count(ctx.db.as_ref()).await.unwrap(), 1);
    assert!(Movement::find().count(ctx.db.as_ref()).await.unwrap() >= 2);
}

#[tokio::test]
async fn cancellation_is_refused_when_an_adjustment_references_the_stock() {
    let ctx = setup().await;
    let item = seed_catalog_item(ctx.db.as_ref(), 182, 6003, "IODINE SOLUTION").await;
    let user = seed_user(ctx.db.as_ref(), "ANA", "LOPEZ").await;
    grant_budget_line(ctx.db.as_ref(), user.id, 182).await;

    let created = ctx
        .services
        .receiving
        .create_purchase(
            purchase_doc(item.id, dec!(2.40), vec![(30, Some("IO-1"), None)]),
            user.id,
        )
        .await
        .unwrap();

    ctx.services
        .adjustment
        .create_adjustment(
            NewAdjustment {
                kind: AdjustmentKind::Exit,
                reference_document: "ACTA-2024-050".to_string(),
                notes: None,
                lines: vec![NewAdjustmentLine {
                    catalog_item_id: None,
                    product_code: Some(6003),
                    quantity: 3,
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
                }],
            },
            user.id,
        )
        .await
        .unwrap();

    let err = ctx
        .services
        .receiving
        .cancel_purchase(created.purchase_id, user.id, "mistake".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
    assert!(err.to_string().contains("adjustment"));

    assert_eq!(Purchase::find().count(ctx.db.as_ref()).await.unwrap(), 1);
}

#[tokio::test]
async fn cancelling_an_unknown_purchase_is_not_found() {
    let ctx = setup().await;
    let user = seed_user(ctx.db.as_ref(), "ANA", "LOPEZ").await;

    let err = ctx
        .services
        .receiving
        .cancel_purchase(777, user.id, "n/a".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}
