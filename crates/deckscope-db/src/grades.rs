//! Grade repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use deckscope_core::{Error, Grade, GradeRepository, Result};

/// PostgreSQL implementation of GradeRepository.
///
/// `card_grades` has primary key (user_id, card_id), so every write is an upsert.
pub struct PgGradeRepository {
    pool: Pool<Postgres>,
}

impl PgGradeRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GradeRepository for PgGradeRepository {
    async fn fetch_user_grades(&self, user_id: Uuid) -> Result<HashMap<Uuid, Grade>> {
        let rows = sqlx::query("SELECT card_id, grade FROM card_grades WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let mut grades = HashMap::with_capacity(rows.len());
        for row in rows {
            let card_id: Uuid = row.get("card_id");
            let raw: String = row.get("grade");
            match raw.parse::<Grade>() {
                Ok(grade) => {
                    grades.insert(card_id, grade);
                }
                Err(e) => warn!(%card_id, error = %e, "Skipping unreadable grade row"),
            }
        }
        debug!(%user_id, result_count = grades.len(), "Fetched user grades");
        Ok(grades)
    }

    async fn upsert_grade(&self, user_id: Uuid, card_id: Uuid, grade: Grade) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO card_grades (user_id, card_id, grade, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (user_id, card_id) DO UPDATE SET
                grade = EXCLUDED.grade,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(user_id)
        .bind(card_id)
        .bind(grade.as_str())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn delete_for_card(&self, card_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM card_grades WHERE card_id = $1")
            .bind(card_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}
