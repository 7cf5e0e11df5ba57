use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_catalog_tables::Migration),
            Box::new(m20240101_000002_create_purchase_tables::Migration),
            Box::new(m20240101_000003_create_stock_tables::Migration),
            Box::new(m20240101_000004_create_dispatch_tables::Migration),
            Box::new(m20240101_000005_create_adjustment_tables::Migration),
        ]
    }
}

mod m20240101_000001_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CatalogItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CatalogItems::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CatalogItems::BudgetLine)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CatalogItems::ProductCode)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CatalogItems::ProductName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CatalogItems::Characteristics)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CatalogItems::PresentationCode)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CatalogItems::PresentationName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CatalogItems::UnitOfMeasure)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CatalogItems::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_catalog_items_product_code")
                        .table(CatalogItems::Table)
                        .col(CatalogItems::ProductCode)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Users::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Users::FirstNames).string().not_null())
                        .col(ColumnDef::new(Users::LastNames).string().not_null())
                        .col(
                            ColumnDef::new(Users::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(UserBudgetLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(UserBudgetLines::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(UserBudgetLines::UserId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(UserBudgetLines::BudgetLine)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(UserBudgetLines::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_user_budget_lines_user_id")
                        .table(UserBudgetLines::Table)
                        .col(UserBudgetLines::UserId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ServiceUnits::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ServiceUnits::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ServiceUnits::Name).string().not_null())
                        .col(
                            ColumnDef::new(ServiceUnits::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ServiceUnits::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(UserBudgetLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(CatalogItems::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum CatalogItems {
        Table,
        Id,
        BudgetLine,
        ProductCode,
        ProductName,
        Characteristics,
        PresentationCode,
        PresentationName,
        UnitOfMeasure,
        Active,
    }

    #[derive(Iden)]
    pub enum Users {
        Table,
        Id,
        FirstNames,
        LastNames,
        Active,
    }

    #[derive(Iden)]
    pub enum UserBudgetLines {
        Table,
        Id,
        UserId,
        BudgetLine,
        Active,
    }

    #[derive(Iden)]
    pub enum ServiceUnits {
        Table,
        Id,
        Name,
        Active,
    }
}

mod m20240101_000002_create_purchase_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_purchase_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Purchases::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Purchases::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Purchases::InvoiceNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Purchases::InvoiceSeries)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Purchases::PurchaseType).string().not_null())
                        .col(ColumnDef::new(Purchases::EntryDate).date().not_null())
                        .col(ColumnDef::new(Purchases::Supplier).string().not_null())
                        .col(ColumnDef::new(Purchases::PurchaseOrder).string().null())
                        .col(ColumnDef::new(Purchases::Program).string().null())
                        .col(ColumnDef::new(Purchases::Form1hNumber).integer().null())
                        .col(ColumnDef::new(Purchases::KardexNumber).integer().null())
                        .col(
                            ColumnDef::new(Purchases::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchases_entry_date")
                        .table(Purchases::Table)
                        .col(Purchases::EntryDate)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseLines::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseLines::PurchaseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseLines::CatalogItemId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseLines::BudgetLine)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseLines::ProductCode)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseLines::ProductName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseLines::Characteristics)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseLines::PresentationCode)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseLines::Presentation)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseLines::TotalQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseLines::UnitPrice)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseLines::LineTotal)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseLines::Notes).string().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_lines_purchase_id")
                        .table(PurchaseLines::Table)
                        .col(PurchaseLines::PurchaseId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseLots::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseLots::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseLots::PurchaseLineId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseLots::Quantity).integer().not_null())
                        .col(ColumnDef::new(PurchaseLots::Batch).string().null())
                        .col(ColumnDef::new(PurchaseLots::ExpirationDate).date().null())
                        .col(
                            ColumnDef::new(PurchaseLots::CommitmentLetter)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(PurchaseLots::ReturnMonths).integer().null())
                        .col(ColumnDef::new(PurchaseLots::ReturnNotes).string().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_lots_purchase_line_id")
                        .table(PurchaseLots::Table)
                        .col(PurchaseLots::PurchaseLineId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseLots::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Purchases::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Purchases {
        Table,
        Id,
        InvoiceNumber,
        InvoiceSeries,
        PurchaseType,
        EntryDate,
        Supplier,
        PurchaseOrder,
        Program,
        Form1hNumber,
        KardexNumber,
        CreatedAt,
    }

    #[derive(Iden)]
    pub enum PurchaseLines {
        Table,
        Id,
        PurchaseId,
        CatalogItemId,
        BudgetLine,
        ProductCode,
        ProductName,
        Characteristics,
        PresentationCode,
        Presentation,
        TotalQuantity,
        UnitPrice,
        LineTotal,
        Notes,
    }

    #[derive(Iden)]
    pub enum PurchaseLots {
        Table,
        Id,
        PurchaseLineId,
        Quantity,
        Batch,
        ExpirationDate,
        CommitmentLetter,
        ReturnMonths,
        ReturnNotes,
    }
}

mod m20240101_000003_create_stock_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_stock_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockLots::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockLots::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockLots::PurchaseId).big_integer().null())
                        .col(
                            ColumnDef::new(StockLots::PurchaseLotId)
                                .big_integer()
                                .null(),
                        )
                        .col(ColumnDef::new(StockLots::BudgetLine).integer().not_null())
                        .col(ColumnDef::new(StockLots::ProductCode).integer().not_null())
                        .col(ColumnDef::new(StockLots::ProductName).string().not_null())
                        .col(
                            ColumnDef::new(StockLots::Characteristics)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLots::PresentationCode)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockLots::Presentation).string().not_null())
                        .col(
                            ColumnDef::new(StockLots::UnitOfMeasure)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockLots::Batch).string().not_null())
                        .col(ColumnDef::new(StockLots::ExpirationDate).date().null())
                        .col(
                            ColumnDef::new(StockLots::CommitmentLetter)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(StockLots::ReturnMonths).integer().null())
                        .col(ColumnDef::new(StockLots::ReturnNotes).string().null())
                        .col(
                            ColumnDef::new(StockLots::RemainingQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLots::UnitPrice)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLots::TotalPrice)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockLots::KardexNumber).integer().null())
                        .col(
                            ColumnDef::new(StockLots::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLots::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // FEFO scans filter by product and order by expiration.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_lots_product_code")
                        .table(StockLots::Table)
                        .col(StockLots::ProductCode)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_lots_expiration_date")
                        .table(StockLots::Table)
                        .col(StockLots::ExpirationDate)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMovements::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::LotId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::CatalogItemId)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::PurchaseId)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::DispatchId)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::AdjustmentId)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::Kind).string().not_null())
                        .col(ColumnDef::new(StockMovements::Module).string().not_null())
                        .col(
                            ColumnDef::new(StockMovements::UserId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::Batch).string().null())
                        .col(
                            ColumnDef::new(StockMovements::ExpirationDate)
                                .date()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::MovedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_lot_id")
                        .table(StockMovements::Table)
                        .col(StockMovements::LotId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_adjustment_id")
                        .table(StockMovements::Table)
                        .col(StockMovements::AdjustmentId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_purchase_id")
                        .table(StockMovements::Table)
                        .col(StockMovements::PurchaseId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockMovements::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockLots::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum StockLots {
        Table,
        Id,
        PurchaseId,
        PurchaseLotId,
        BudgetLine,
        ProductCode,
        ProductName,
        Characteristics,
        PresentationCode,
        Presentation,
        UnitOfMeasure,
        Batch,
        ExpirationDate,
        CommitmentLetter,
        ReturnMonths,
        ReturnNotes,
        RemainingQuantity,
        UnitPrice,
        TotalPrice,
        KardexNumber,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    pub enum StockMovements {
        Table,
        Id,
        LotId,
        CatalogItemId,
        PurchaseId,
        DispatchId,
        AdjustmentId,
        Quantity,
        Kind,
        Module,
        UserId,
        Batch,
        ExpirationDate,
        MovedAt,
    }
}

mod m20240101_000004_create_dispatch_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_dispatch_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Dispatches::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Dispatches::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Dispatches::Code).string().null())
                        .col(
                            ColumnDef::new(Dispatches::ServiceUnitId)
                                .big_integer()
                                .null(),
                        )
                        .col(ColumnDef::new(Dispatches::UserId).big_integer().not_null())
                        .col(ColumnDef::new(Dispatches::Notes).string().null())
                        .col(
                            ColumnDef::new(Dispatches::TotalQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Dispatches::TotalValue)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Dispatches::DispatchedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_dispatches_code")
                        .table(Dispatches::Table)
                        .col(Dispatches::Code)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(DispatchLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DispatchLines::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DispatchLines::DispatchId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DispatchLines::LotId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DispatchLines::CatalogItemId)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(DispatchLines::PurchaseId)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(DispatchLines::ProductCode)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DispatchLines::ProductName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DispatchLines::Characteristics)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DispatchLines::PresentationCode)
                                .integer()
                                .null(),
                        )
                        .col(ColumnDef::new(DispatchLines::Presentation).string().null())
                        .col(
                            ColumnDef::new(DispatchLines::UnitOfMeasure)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(DispatchLines::Batch).string().null())
                        .col(
                            ColumnDef::new(DispatchLines::ExpirationDate)
                                .date()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(DispatchLines::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DispatchLines::UnitPrice)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DispatchLines::LineTotal)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_dispatch_lines_dispatch_id")
                        .table(DispatchLines::Table)
                        .col(DispatchLines::DispatchId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_dispatch_lines_lot_id")
                        .table(DispatchLines::Table)
                        .col(DispatchLines::LotId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DispatchLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Dispatches::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Dispatches {
        Table,
        Id,
        Code,
        ServiceUnitId,
        UserId,
        Notes,
        TotalQuantity,
        TotalValue,
        DispatchedAt,
    }

    #[derive(Iden)]
    pub enum DispatchLines {
        Table,
        Id,
        DispatchId,
        LotId,
        CatalogItemId,
        PurchaseId,
        ProductCode,
        ProductName,
        Characteristics,
        PresentationCode,
        Presentation,
        UnitOfMeasure,
        Batch,
        ExpirationDate,
        Quantity,
        UnitPrice,
        LineTotal,
    }
}

mod m20240101_000005_create_adjustment_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_adjustment_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Adjustments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Adjustments::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Adjustments::Kind).string().not_null())
                        .col(
                            ColumnDef::new(Adjustments::ReferenceDocument)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Adjustments::Notes).string().null())
                        .col(
                            ColumnDef::new(Adjustments::UserId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Adjustments::AdjustedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(AdjustmentLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AdjustmentLines::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AdjustmentLines::AdjustmentId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AdjustmentLines::LotId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AdjustmentLines::CatalogItemId)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(AdjustmentLines::ProductCode)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AdjustmentLines::ProductName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AdjustmentLines::Characteristics)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AdjustmentLines::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AdjustmentLines::PresentationCode)
                                .integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(AdjustmentLines::Presentation)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(AdjustmentLines::UnitOfMeasure)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(AdjustmentLines::Batch).string().null())
                        .col(
                            ColumnDef::new(AdjustmentLines::ExpirationDate)
                                .date()
                                .null(),
                        )
                        .col(ColumnDef::new(AdjustmentLines::Notes).string().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_adjustment_lines_adjustment_id")
                        .table(AdjustmentLines::Table)
                        .col(AdjustmentLines::AdjustmentId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_adjustment_lines_lot_id")
                        .table(AdjustmentLines::Table)
                        .col(AdjustmentLines::LotId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AdjustmentLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Adjustments::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Adjustments {
        Table,
        Id,
        Kind,
        ReferenceDocument,
        Notes,
        UserId,
        AdjustedAt,
    }

    #[derive(Iden)]
    pub enum AdjustmentLines {
        Table,
        Id,
        AdjustmentId,
        LotId,
        CatalogItemId,
        ProductCode,
        ProductName,
        Characteristics,
        Quantity,
        PresentationCode,
        Presentation,
        UnitOfMeasure,
        Batch,
        ExpirationDate,
        Notes,
    }
}
