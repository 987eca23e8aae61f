//! Job record storage for Orca.
//!
//! Provides the `JobStore` trait with PostgreSQL and in-memory implementations.

pub mod error;
pub mod store;

pub use error::{DbError, DbResult};
pub use store::{JobStore, MemoryJobStore, PgJobStore};

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Create a new database connection pool.
pub async fn create_pool(database_url: &str) -> DbResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> DbResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
