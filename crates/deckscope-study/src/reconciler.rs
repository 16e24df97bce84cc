//! Taxonomy reconciler: ensure-by-name, replace-links, and the editor's
//! multi-step backend sequences.
//!
//! The backend offers no transactions spanning calls, so each sequence runs
//! its steps in order and stops at the first failure that would make the next
//! step unsafe.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use deckscope_core::logging::KIND;
use deckscope_core::{
    CardPatch, CardRepository, CardRow, Error, GradeRepository, LinkKind, NewCard, Repositories,
    Result, TaxonomyKind, TaxonomyRepository,
};

/// Outcome of a replace-by-name call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaceReport {
    /// Ids now linked, in the order the names were given.
    pub linked: Vec<Uuid>,
    /// Names that could not be resolved, with the reason.
    pub skipped: Vec<(String, String)>,
}

/// What the card-deletion cascade removed before deleting the card row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub topic_links_removed: u64,
    pub tag_links_removed: u64,
    pub grades_removed: u64,
    /// Cleanup steps that failed and were skipped.
    pub cleanup_failures: Vec<String>,
}

#[derive(Clone)]
pub struct TaxonomyReconciler {
    taxonomy: Arc<dyn TaxonomyRepository>,
    cards: Arc<dyn CardRepository>,
    grades: Arc<dyn GradeRepository>,
}

fn clean_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("name cannot be empty".to_string()));
    }
    Ok(trimmed)
}

/// Remove duplicates, keeping first occurrences in order.
fn dedup_ordered<T: PartialEq + Clone>(items: &[T]) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

impl TaxonomyReconciler {
    pub fn new(repos: &Repositories) -> Self {
        Self {
            taxonomy: repos.taxonomy.clone(),
            cards: repos.cards.clone(),
            grades: repos.grades.clone(),
        }
    }

    /// Id of the row named `name` in `kind`, creating it if absent.
    ///
    /// An insert conflict means another client created the row after our
    /// lookup; the row is read back instead of failing.
    pub async fn ensure_by_name(&self, kind: TaxonomyKind, name: &str) -> Result<Uuid> {
        let name = clean_name(name)?;
        if let Some(id) = self.taxonomy.find_by_name(kind, name).await? {
            return Ok(id);
        }
        match self.taxonomy.create(kind, name).await {
            Ok(id) => {
                info!(
                    subsystem = "study",
                    component = "reconciler",
                    op = "ensure_by_name",
                    kind = kind.as_str(),
                    %id,
                    "Created taxonomy entry"
                );
                Ok(id)
            }
            Err(Error::Conflict(reason)) => {
                debug!(kind = kind.as_str(), entry = name, "Lost create race, re-reading");
                self.taxonomy
                    .find_by_name(kind, name)
                    .await?
                    .ok_or(Error::Conflict(reason))
            }
            Err(e) => Err(e),
        }
    }

    /// Replace every link of `kind` on a card with `target_ids` (deduplicated).
    ///
    /// If the delete step fails nothing else runs. If the insert step fails the
    /// card is left without links of this kind and `Error::LinksCleared` is returned.
    pub async fn replace_links(
        &self,
        card_id: Uuid,
        kind: LinkKind,
        target_ids: &[Uuid],
    ) -> Result<()> {
        let targets = dedup_ordered(target_ids);
        let removed = self.cards.delete_links(card_id, kind).await?;

        if !targets.is_empty() {
            if let Err(e) = self.cards.insert_links(card_id, kind, &targets).await {
                warn!(
                    subsystem = "study",
                    component = "reconciler",
                    op = "replace_links",
                    %card_id,
                    kind = kind.as_str(),
                    error = %e,
                    "Links removed but re-insert failed"
                );
                return Err(Error::LinksCleared {
                    card_id,
                    kind,
                    reason: e.to_string(),
                });
            }
        }

        debug!(
            %card_id,
            kind = kind.as_str(),
            removed,
            inserted = targets.len(),
            "Links replaced"
        );
        Ok(())
    }

    /// Resolve `names` through ensure-by-name, then replace the card's links of `kind`.
    ///
    /// Names that fail to resolve are skipped and reported; blank and repeated
    /// names are ignored.
    pub async fn replace_by_name(
        &self,
        card_id: Uuid,
        kind: LinkKind,
        names: &[String],
    ) -> Result<ReplaceReport> {
        let mut report = ReplaceReport::default();
        let cleaned: Vec<String> = names
            .iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();

        for name in dedup_ordered(&cleaned) {
            match self.ensure_by_name(kind.taxonomy(), &name).await {
                Ok(id) => report.linked.push(id),
                Err(e) => {
                    warn!(
                        subsystem = "study",
                        component = "reconciler",
                        op = "replace_by_name",
                        kind = kind.as_str(),
                        entry = %name,
                        error = %e,
                        "Skipping name that failed to resolve"
                    );
                    report.skipped.push((name, e.to_string()));
                }
            }
        }

        self.replace_links(card_id, kind, &report.linked).await?;
        Ok(report)
    }

    pub async fn replace_tags_by_name(
        &self,
        card_id: Uuid,
        names: &[String],
    ) -> Result<ReplaceReport> {
        self.replace_by_name(card_id, LinkKind::Tag, names).await
    }

    pub async fn replace_topics_by_name(
        &self,
        card_id: Uuid,
        names: &[String],
    ) -> Result<ReplaceReport> {
        self.replace_by_name(card_id, LinkKind::Topic, names).await
    }

    /// Remove a card's topic links, tag links and grades, then the card row.
    ///
    /// Cleanup failures are logged and reported but do not stop the card delete.
    pub async fn delete_card_cascade(&self, card_id: Uuid) -> Result<CascadeReport> {
        let start = Instant::now();
        let mut report = CascadeReport::default();

        match self.cards.delete_links(card_id, LinkKind::Topic).await {
            Ok(n) => report.topic_links_removed = n,
            Err(e) => {
                warn!(%card_id, error = %e, "Failed to remove topic links before delete");
                report.cleanup_failures.push(format!("topic links: {}", e));
            }
        }
        match self.cards.delete_links(card_id, LinkKind::Tag).await {
            Ok(n) => report.tag_links_removed = n,
            Err(e) => {
                warn!(%card_id, error = %e, "Failed to remove tag links before delete");
                report.cleanup_failures.push(format!("tag links: {}", e));
            }
        }
        match self.grades.delete_for_card(card_id).await {
            Ok(n) => report.grades_removed = n,
            Err(e) => {
                debug!(%card_id, error = %e, "Grade cleanup failed, ignoring");
                report.cleanup_failures.push(format!("grades: {}", e));
            }
        }

        self.cards.delete_card(card_id).await?;

        info!(
            subsystem = "study",
            component = "reconciler",
            op = "delete_card_cascade",
            %card_id,
            topic_links = report.topic_links_removed,
            tag_links = report.tag_links_removed,
            grades = report.grades_removed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Card deleted"
        );
        Ok(report)
    }

    pub async fn rename(&self, kind: TaxonomyKind, id: Uuid, name: &str) -> Result<()> {
        let name = clean_name(name)?;
        self.taxonomy.rename(kind, id, name).await
    }

    /// Delete a taxonomy row. Cards survive: a chapter's cards become
    /// uncategorised, a topic's or tag's join rows are removed.
    pub async fn delete(&self, kind: TaxonomyKind, id: Uuid) -> Result<u64> {
        let detached = match kind {
            TaxonomyKind::Chapter => self.cards.detach_chapter(id).await?,
            TaxonomyKind::Topic => self.cards.delete_links_to(LinkKind::Topic, id).await?,
            TaxonomyKind::Tag => self.cards.delete_links_to(LinkKind::Tag, id).await?,
        };
        self.taxonomy.delete(kind, id).await?;
        info!(
            subsystem = "study",
            component = "reconciler",
            op = "delete_taxonomy",
            { KIND } = kind.as_str(),
            %id,
            detached,
            "Taxonomy entry deleted"
        );
        Ok(detached)
    }

    /// Insert a card, resolving its chapter, topics and tags by name.
    pub async fn create_card(&self, new: NewCard) -> Result<Uuid> {
        if new.front.trim().is_empty() || new.back.trim().is_empty() {
            return Err(Error::InvalidInput(
                "card front and back are required".to_string(),
            ));
        }

        let chapter_id = match new.chapter.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => {
                Some(self.ensure_by_name(TaxonomyKind::Chapter, title).await?)
            }
            _ => None,
        };
        let topic_ids = self.resolve_all(TaxonomyKind::Topic, &new.topics).await;
        let tag_ids = self.resolve_all(TaxonomyKind::Tag, &new.tags).await;

        let card_id = self
            .cards
            .insert_card(CardRow {
                front: new.front,
                back: new.back,
                chapter_id,
                status: new.status,
                visibility: new.visibility,
                meta: new.meta,
            })
            .await?;

        self.cards
            .insert_links(card_id, LinkKind::Topic, &topic_ids)
            .await?;
        self.cards.insert_links(card_id, LinkKind::Tag, &tag_ids).await?;

        debug!(%card_id, topics = topic_ids.len(), tags = tag_ids.len(), "Card created");
        Ok(card_id)
    }

    pub async fn update_card(&self, card_id: Uuid, patch: CardPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        self.cards.update_card(card_id, patch).await
    }

    async fn resolve_all(&self, kind: TaxonomyKind, names: &[String]) -> Vec<Uuid> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            match self.ensure_by_name(kind, name).await {
                Ok(id) if !ids.contains(&id) => ids.push(id),
                Ok(_) => {}
                Err(e) => warn!(kind = kind.as_str(), entry = name, error = %e, "Skipping unresolved name"),
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name("  Sleep ").unwrap(), "Sleep");
        assert!(matches!(clean_name("   "), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_dedup_ordered() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(dedup_ordered(&[b, a, b, a]), vec![b, a]);
    }
}
