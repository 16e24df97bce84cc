//! # deckscope-db
//!
//! PostgreSQL backend layer for deckscope.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for taxonomy, cards and grades
//! - Schema migrations (feature `migrations`)
//! - An in-memory backend for tests (feature `mock`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use deckscope_db::{Database, TaxonomyKind, TaxonomyRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/deckscope").await?;
//!     let id = db.taxonomy.create(TaxonomyKind::Topic, "Sleep").await?;
//!     println!("Created topic: {}", id);
//!     Ok(())
//! }
//! ```

pub mod cards;
pub mod grades;
#[cfg(feature = "mock")]
pub mod mock;
pub mod pool;
pub mod taxonomy;

// Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use deckscope_core::*;

pub use cards::PgCardRepository;
pub use grades::PgGradeRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use taxonomy::PgTaxonomyRepository;

use std::sync::Arc;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub taxonomy: Arc<PgTaxonomyRepository>,
    pub cards: Arc<PgCardRepository>,
    pub grades: Arc<PgGradeRepository>,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            taxonomy: Arc::new(PgTaxonomyRepository::new(pool.clone())),
            cards: Arc::new(PgCardRepository::new(pool.clone())),
            grades: Arc::new(PgGradeRepository::new(pool.clone())),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Repository handles for the study layer.
    pub fn repositories(&self) -> Repositories {
        Repositories::new(
            self.taxonomy.clone(),
            self.cards.clone(),
            self.grades.clone(),
        )
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
