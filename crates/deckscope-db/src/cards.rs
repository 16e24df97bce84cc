//! Card repository implementation.
//!
//! Cards and their joins are fetched with three flat queries and stitched in
//! memory, rather than one query per card.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use deckscope_core::{
    Card, CardMeta, CardPatch, CardRepository, CardRow, Error, LinkKind, Result, TagLink,
    TopicLink,
};

/// Join table and target column for a link kind.
pub(crate) fn join_of(kind: LinkKind) -> (&'static str, &'static str) {
    match kind {
        LinkKind::Topic => ("card_topics", "topic_id"),
        LinkKind::Tag => ("card_tags", "tag_id"),
    }
}

/// PostgreSQL implementation of CardRepository.
pub struct PgCardRepository {
    pool: Pool<Postgres>,
}

impl PgCardRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn fetch_topic_links(&self) -> Result<HashMap<Uuid, Vec<TopicLink>>> {
        let rows = sqlx::query(
            r#"
            SELECT ct.card_id, ct.topic_id, t.title
            FROM card_topics ct
            LEFT JOIN topics t ON t.id = ct.topic_id
            ORDER BY t.title
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut out: HashMap<Uuid, Vec<TopicLink>> = HashMap::new();
        for row in rows {
            out.entry(row.get("card_id")).or_default().push(TopicLink {
                topic_id: row.get("topic_id"),
                title: row.get("title"),
            });
        }
        Ok(out)
    }

    async fn fetch_tag_links(&self) -> Result<HashMap<Uuid, Vec<TagLink>>> {
        let rows = sqlx::query(
            r#"
            SELECT ct.card_id, ct.tag_id, t.name
            FROM card_tags ct
            LEFT JOIN tags t ON t.id = ct.tag_id
            ORDER BY t.name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut out: HashMap<Uuid, Vec<TagLink>> = HashMap::new();
        for row in rows {
            out.entry(row.get("card_id")).or_default().push(TagLink {
                tag_id: row.get("tag_id"),
                name: row.get("name"),
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl CardRepository for PgCardRepository {
    async fn fetch_cards(&self) -> Result<Vec<Card>> {
        let start = Instant::now();
        let rows = sqlx::query(
            r#"
            SELECT id, front, back, chapter_id, status, visibility,
                   author_suspended, meta, created_at
            FROM cards
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut topics = self.fetch_topic_links().await?;
        let mut tags = self.fetch_tag_links().await?;

        let mut cards = Vec::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = row.get("id");
            let status: String = row.get("status");
            let visibility: String = row.get("visibility");
            let meta: JsonValue = row.get("meta");
            cards.push(Card {
                id,
                front: row.get("front"),
                back: row.get("back"),
                chapter_id: row.get("chapter_id"),
                topics: topics.remove(&id).unwrap_or_default(),
                tags: tags.remove(&id).unwrap_or_default(),
                status: status.parse()?,
                visibility: visibility.parse()?,
                author_suspended: row.get("author_suspended"),
                meta: CardMeta::from_json(meta),
                created_at: row.get("created_at"),
                user_grade: None,
                user_starred: false,
            });
        }

        info!(
            subsystem = "database",
            component = "cards",
            op = "fetch_cards",
            result_count = cards.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Fetched cards"
        );
        Ok(cards)
    }

    async fn insert_card(&self, row: CardRow) -> Result<Uuid> {
        let id = Uuid::now_v7();
        sqlx::query(
            r#"
            INSERT INTO cards (id, front, back, chapter_id, status, visibility, meta)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(&row.front)
        .bind(&row.back)
        .bind(row.chapter_id)
        .bind(row.status.as_str())
        .bind(row.visibility.as_str())
        .bind(row.meta.to_json())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        debug!(card_id = %id, "Inserted card");
        Ok(id)
    }

    async fn update_card(&self, card_id: Uuid, patch: CardPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let result = sqlx::query(
            r#"
            UPDATE cards SET
                front = COALESCE($2, front),
                back = COALESCE($3, back),
                chapter_id = CASE WHEN $4 THEN $5 ELSE chapter_id END,
                status = COALESCE($6, status),
                visibility = COALESCE($7, visibility),
                author_suspended = COALESCE($8, author_suspended),
                meta = COALESCE($9, meta),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(card_id)
        .bind(patch.front.as_deref())
        .bind(patch.back.as_deref())
        .bind(patch.chapter_id.is_some())
        .bind(patch.chapter_id.flatten())
        .bind(patch.status.map(|s| s.as_str()))
        .bind(patch.visibility.map(|v| v.as_str()))
        .bind(patch.author_suspended)
        .bind(patch.meta.as_ref().map(CardMeta::to_json))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::CardNotFound(card_id));
        }
        Ok(())
    }

    async fn delete_card(&self, card_id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM cards WHERE id = $1")
            .bind(card_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::CardNotFound(card_id));
        }
        Ok(())
    }

    async fn delete_links(&self, card_id: Uuid, kind: LinkKind) -> Result<u64> {
        let (table, _) = join_of(kind);
        let sql = format!("DELETE FROM {} WHERE card_id = $1", table);
        let result = sqlx::query(&sql)
            .bind(card_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn insert_links(
        &self,
        card_id: Uuid,
        kind: LinkKind,
        target_ids: &[Uuid],
    ) -> Result<()> {
        if target_ids.is_empty() {
            return Ok(());
        }
        let (table, column) = join_of(kind);
        let sql = format!(
            "INSERT INTO {} (card_id, {}) SELECT $1, unnest($2::uuid[]) ON CONFLICT DO NOTHING",
            table, column
        );
        sqlx::query(&sql)
            .bind(card_id)
            .bind(target_ids.to_vec())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn delete_links_to(&self, kind: LinkKind, target_id: Uuid) -> Result<u64> {
        let (table, column) = join_of(kind);
        let sql = format!("DELETE FROM {} WHERE {} = $1", table, column);
        let result = sqlx::query(&sql)
            .bind(target_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn detach_chapter(&self, chapter_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE cards SET chapter_id = NULL, updated_at = now() WHERE chapter_id = $1",
        )
        .bind(chapter_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_of() {
        assert_eq!(join_of(LinkKind::Topic), ("card_topics", "topic_id"));
        assert_eq!(join_of(LinkKind::Tag), ("card_tags", "tag_id"));
    }
}
