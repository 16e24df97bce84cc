//! Taxonomy repository implementation (chapters, topics, tags).

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use deckscope_core::{
    Chapter, Error, Result, Tag, Taxonomy, TaxonomyKind, TaxonomyRepository, Topic,
};

/// Table and display-name column for a taxonomy kind.
pub(crate) fn table_of(kind: TaxonomyKind) -> (&'static str, &'static str) {
    match kind {
        TaxonomyKind::Chapter => ("chapters", "title"),
        TaxonomyKind::Topic => ("topics", "title"),
        TaxonomyKind::Tag => ("tags", "name"),
    }
}

/// Map a unique-constraint violation to `Error::Conflict`, anything else to `Error::Database`.
pub(crate) fn map_unique_violation(e: sqlx::Error, what: impl FnOnce() -> String) -> Error {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => Error::Conflict(what()),
        _ => Error::Database(e),
    }
}

/// PostgreSQL implementation of TaxonomyRepository.
pub struct PgTaxonomyRepository {
    pool: Pool<Postgres>,
}

impl PgTaxonomyRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn fetch_named(&self, kind: TaxonomyKind) -> Result<Vec<(Uuid, String)>> {
        let (table, column) = table_of(kind);
        let sql = format!(
            "SELECT id, {column} AS name FROM {table} ORDER BY {column}",
            column = column,
            table = table
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get("id"), row.get("name")))
            .collect())
    }
}

#[async_trait]
impl TaxonomyRepository for PgTaxonomyRepository {
    async fn fetch_taxonomy(&self) -> Result<Taxonomy> {
        let chapters = self
            .fetch_named(TaxonomyKind::Chapter)
            .await?
            .into_iter()
            .map(|(id, title)| Chapter { id, title })
            .collect();
        let topics = self
            .fetch_named(TaxonomyKind::Topic)
            .await?
            .into_iter()
            .map(|(id, title)| Topic { id, title })
            .collect();
        let tags = self
            .fetch_named(TaxonomyKind::Tag)
            .await?
            .into_iter()
            .map(|(id, name)| Tag { id, name })
            .collect();
        Ok(Taxonomy {
            chapters,
            topics,
            tags,
        })
    }

    async fn find_by_name(&self, kind: TaxonomyKind, name: &str) -> Result<Option<Uuid>> {
        let (table, column) = table_of(kind);
        let sql = format!("SELECT id FROM {} WHERE {} = $1 LIMIT 1", table, column);
        let row = sqlx::query(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.map(|r| r.get("id")))
    }

    async fn create(&self, kind: TaxonomyKind, name: &str) -> Result<Uuid> {
        let (table, column) = table_of(kind);
        let id = Uuid::now_v7();
        let sql = format!("INSERT INTO {} (id, {}) VALUES ($1, $2)", table, column);
        sqlx::query(&sql)
            .bind(id)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, || format!("{} '{}' already exists", kind, name)))?;
        debug!(kind = kind.as_str(), %id, "Created taxonomy row");
        Ok(id)
    }

    async fn rename(&self, kind: TaxonomyKind, id: Uuid, name: &str) -> Result<()> {
        let (table, column) = table_of(kind);
        let sql = format!("UPDATE {} SET {} = $2 WHERE id = $1", table, column);
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, || format!("{} '{}' already exists", kind, name)))?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("{} {}", kind, id)));
        }
        Ok(())
    }

    async fn delete(&self, kind: TaxonomyKind, id: Uuid) -> Result<()> {
        let (table, _) = table_of(kind);
        let sql = format!("DELETE FROM {} WHERE id = $1", table);
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("{} {}", kind, id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_of() {
        assert_eq!(table_of(TaxonomyKind::Chapter), ("chapters", "title"));
        assert_eq!(table_of(TaxonomyKind::Topic), ("topics", "title"));
        assert_eq!(table_of(TaxonomyKind::Tag), ("tags", "name"));
    }

    #[test]
    fn test_non_database_error_is_not_conflict() {
        let err = map_unique_violation(sqlx::Error::RowNotFound, || "x".to_string());
        assert!(matches!(err, Error::Database(_)));
    }
}
