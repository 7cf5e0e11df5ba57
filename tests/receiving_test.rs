mod common;

use bodega_api::{
    entities::{
        movement::{self, Entity as Movement},
        purchase::Entity as Purchase,
        stock_lot::{self, Entity as StockLot},
    },
    errors::ServiceError,
    services::receiving::{NewPurchaseLine, NewPurchaseLot, PurchaseFilter, UpdatePurchase},
};
use common::{date, grant_budget_line, purchase_doc, seed_catalog_item, seed_user, setup};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

#[tokio::test]
async fn receiving_creates_lots_and_stock_in_movements() {
    let ctx = setup().await;
    let item = seed_catalog_item(ctx.db.as_ref(), 182, 5001, "PARACETAMOL 500MG").await;
    let user = seed_user(ctx.db.as_ref(), "ANA", "LOPEZ").await;
    grant_budget_line(ctx.db.as_ref(), user.id, 182).await;

    let doc = purchase_doc(
        item.id,
        dec!(2.50),
        vec![
            (100, Some("L-A"), Some(date(2025, 1, 1))),
            (50, Some("L-B"), Some(date(2025, 6, 1))),
        ],
    );

    let created = ctx
        .services
        .receiving
        .create_purchase(doc, user.id)
        .await
        .expect("receiving failed");

    // 150 units at 2.50
    assert_eq!(created.invoice_total, dec!(375.00));

    let lots = StockLot::find()
        .filter(stock_lot::Column::PurchaseId.eq(created.purchase_id))
        .all(ctx.db.as_ref())
        .await
        .unwrap();
    assert_eq!(lots.len(), 2);
    for lot in &lots {
        assert_eq!(
            lot.total_price,
            lot.unit_price * rust_decimal::Decimal::from(lot.remaining_quantity)
        );
        assert!(lot.purchase_lot_id.is_some());
    }

    let movements = Movement::find()
        .filter(movement::Column::PurchaseId.eq(created.purchase_id))
        .all(ctx.db.as_ref())
        .await
        .unwrap();
    assert_eq!(movements.len(), 2);
    for m in &movements {
        assert_eq!(m.kind, "STOCK_IN");
        assert_eq!(m.module, "RECEIVING");
        assert_eq!(m.user_id, user.id);
    }
}

#[tokio::test]
async fn batch_sum_mismatch_aborts_whole_document() {
    let ctx = setup().await;
    let item = seed_catalog_item(ctx.db.as_ref(), 182, 5002, "AMOXICILLIN 250MG").await;
    let user = seed_user(ctx.db.as_ref(), "ANA", "LOPEZ").await;

    let mut doc = purchase_doc(item.id, dec!(1.00), vec![(10, Some("L-1"), None)]);
    // Declared total no longer matches the batch quantities.
    doc.lines[0].total_quantity = 12;

    let err = ctx
        .services
        .receiving
        .create_purchase(doc, user.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert!(err.to_string().contains("line #1"));

    assert_eq!(Purchase::find().count(ctx.db.as_ref()).await.unwrap(), 0);
    assert_eq!(StockLot::find().count(ctx.db.as_ref()).await.unwrap(), 0);
    assert_eq!(Movement::find().count(ctx.db.as_ref()).await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_catalog_item_rolls_back_header() {
    let ctx = setup().await;
    let user = seed_user(ctx.db.as_ref(), "ANA", "LOPEZ").await;

    let doc = purchase_doc(9999, dec!(1.00), vec![(5, None, None)]);
    let err = ctx
        .services
        .receiving
        .create_purchase(doc, user.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    // The header insert ran inside the same transaction and must be gone.
    assert_eq!(Purchase::find().count(ctx.db.as_ref()).await.unwrap(), 0);
}

#[tokio::test]
async fn multi_line_document_is_atomic_across_lines() {
    let ctx = setup().await;
    let item = seed_catalog_item(ctx.db.as_ref(), 182, 5003, "IBUPROFEN 400MG").await;
    let user = seed_user(ctx.db.as_ref(), "ANA", "LOPEZ").await;

    let mut doc = purchase_doc(item.id, dec!(3.00), vec![(20, Some("OK"), None)]);
    doc.lines.push(NewPurchaseLine {
        catalog_item_id: 4242, // does not exist
        total_quantity: 5,
        unit_price: dec!(1.00),
        notes: None,
        lots: vec![NewPurchaseLot {
            quantity: 5,
            batch: None,
            expiration_date: None,
            commitment_letter: false,
            return_months: None,
            return_notes: None,
        }],
    });

    let err = ctx
        .services
        .receiving
        .create_purchase(doc, user.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    // The valid first line must not survive on its own.
    assert_eq!(StockLot::find().count(ctx.db.as_ref()).await.unwrap(), 0);
}

#[tokio::test]
async fn purchase_detail_computes_return_notification() {
    let ctx = setup().await;
    let item = seed_catalog_item(ctx.db.as_ref(), 182, 5004, "SALBUTAMOL INHALER").await;
    let user = seed_user(ctx.db.as_ref(), "ANA", "LOPEZ").await;

    let mut doc = purchase_doc(item.id, dec!(10.00), vec![(8, Some("INH-1"), Some(date(2025, 9, 30)))]);
    doc.lines[0].lots[0].return_months = Some(3);

    let created = ctx
        .services
        .receiving
        .create_purchase(doc, user.id)
        .await
        .unwrap();

    let detail = ctx
        .services
        .receiving
        .get_purchase(created.purchase_id)
        .await
        .unwrap();
    assert_eq!(detail.total_items, 1);
    assert_eq!(detail.total_quantity, 8);
    assert_eq!(detail.invoice_total, dec!(80.00));

    let lot = &detail.lines[0].lots[0];
    assert!(lot.has_expiration);
    assert!(lot.has_return_window);
    assert_eq!(lot.return_notification_date, Some(date(2025, 6, 30)));
}

#[tokio::test]
async fn list_and_update_purchases() {
    let ctx = setup().await;
    let item = seed_catalog_item(ctx.db.as_ref(), 182, 5005, "GAUZE ROLL").await;
    let user = seed_user(ctx.db.as_ref(), "ANA", "LOPEZ").await;

    let created = ctx
        .services
        .receiving
        .create_purchase(purchase_doc(item.id, dec!(0.75), vec![(40, None, None)]), user.id)
        .await
        .unwrap();

    let (rows, total) = ctx
        .services
        .receiving
        .list_purchases(&PurchaseFilter {
            supplier: Some("CENTRAL".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].total_items, 1);
    assert_eq!(rows[0].total_quantity, 40);
    assert_eq!(rows[0].invoice_total, dec!(30.00));

    let updated = ctx
        .services
        .receiving
        .update_purchase(
            created.purchase_id,
            UpdatePurchase {
                supplier: Some("FARMACIA DEL SUR".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.supplier, "FARMACIA DEL SUR");

    let (rows, _) = ctx
        .services
        .receiving
        .list_purchases(&PurchaseFilter {
            supplier: Some("CENTRAL".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(rows.is_empty());
}
