use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::migrator::Migrator;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::{info, warn};

/// Establishes the connection pool described by the application config.
pub async fn establish_connection(config: &AppConfig) -> Result<DatabaseConnection, ServiceError> {
    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .connect_timeout(Duration::from_secs(config.db_connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout_secs))
        .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_secs))
        .sqlx_logging(!config.is_production());

    let db = Database::connect(options)
        .await
        .map_err(ServiceError::db_error)?;

    info!("database connection established");
    Ok(db)
}

/// Runs all pending migrations.
pub async fn run_migrations(db: &DatabaseConnection) -> Result<(), ServiceError> {
    Migrator::up(db, None).await.map_err(|e| {
        warn!("migration failed: {}", e);
        ServiceError::db_error(e)
    })?;
    info!("database migrations applied");
    Ok(())
}

/// Cheap connectivity probe for health checks.
pub async fn ping_database(db: &DatabaseConnection) -> Result<(), ServiceError> {
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "SELECT 1".to_string(),
    ))
    .await
    .map_err(ServiceError::db_error)?;
    Ok(())
}
