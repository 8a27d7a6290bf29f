use deadpool_postgres::tokio_postgres::{Config as PgConfig, NoTls};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};

use crate::error::AppError;

const SCHEMA: &str = include_str!("../migrations/0001_init.sql");

fn max_connections() -> usize {
    std::env::var("DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(20)
}

pub async fn init_pool(database_url: &str) -> Result<Pool, AppError> {
    let pg_config: PgConfig = database_url
        .parse()
        .map_err(|e: tokio_postgres::Error| AppError::Config(format!("DATABASE_URL: {e}")))?;

    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
    let pool = Pool::builder(mgr)
        .max_size(max_connections())
        .build()
        .map_err(|e| AppError::StartServer(format!("build pool: {e}")))?;

    // Verify connectivity before the server starts accepting traffic.
    let client = pool.get().await?;
    client.simple_query("SELECT 1").await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &Pool) -> Result<(), AppError> {
    let client = pool.get().await?;
    client.batch_execute(SCHEMA).await?;
    tracing::info!("database schema applied");
    Ok(())
}
