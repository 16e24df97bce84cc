//! Core traits for deckscope backend abstractions.
//!
//! The backend collaborator (persistence and auth) is reached only through
//! these traits, so the Postgres implementation and the in-memory mock are
//! interchangeable.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::catalog::Taxonomy;
use crate::error::Result;
use crate::events::IdentityEvent;
use crate::models::*;

// =============================================================================
// TAXONOMY REPOSITORY
// =============================================================================

/// Repository for chapters, topics and tags.
#[async_trait]
pub trait TaxonomyRepository: Send + Sync {
    /// Fetch all chapters and topics ordered by title, tags ordered by name.
    async fn fetch_taxonomy(&self) -> Result<Taxonomy>;

    /// Look up a row by exact name within `kind`.
    async fn find_by_name(&self, kind: TaxonomyKind, name: &str) -> Result<Option<Uuid>>;

    /// Insert a row. Returns `Error::Conflict` if the name already exists.
    async fn create(&self, kind: TaxonomyKind, name: &str) -> Result<Uuid>;

    /// Change the display name of a row.
    async fn rename(&self, kind: TaxonomyKind, id: Uuid, name: &str) -> Result<()>;

    /// Delete a row. Callers detach cards or remove join rows first.
    async fn delete(&self, kind: TaxonomyKind, id: Uuid) -> Result<()>;
}

// =============================================================================
// CARD REPOSITORY
// =============================================================================

/// Repository for cards and their topic/tag joins.
#[async_trait]
pub trait CardRepository: Send + Sync {
    /// Fetch all cards in insertion order with links resolved to id + display name.
    async fn fetch_cards(&self) -> Result<Vec<Card>>;

    /// Insert a card row and return its id.
    async fn insert_card(&self, row: CardRow) -> Result<Uuid>;

    /// Partially update a card row.
    async fn update_card(&self, card_id: Uuid, patch: CardPatch) -> Result<()>;

    /// Delete the card row only. Join and grade rows are handled by the caller.
    async fn delete_card(&self, card_id: Uuid) -> Result<()>;

    /// Delete every join row of `kind` for a card.
    async fn delete_links(&self, card_id: Uuid, kind: LinkKind) -> Result<u64>;

    /// Insert one join row per target id.
    async fn insert_links(&self, card_id: Uuid, kind: LinkKind, target_ids: &[Uuid])
        -> Result<()>;

    /// Delete every join row of `kind` pointing at `target_id`.
    async fn delete_links_to(&self, kind: LinkKind, target_id: Uuid) -> Result<u64>;

    /// Set `chapter_id = NULL` on every card of a chapter.
    async fn detach_chapter(&self, chapter_id: Uuid) -> Result<u64>;
}

// =============================================================================
// GRADE REPOSITORY
// =============================================================================

/// Remote grade store keyed by (user, card).
#[async_trait]
pub trait GradeRepository: Send + Sync {
    /// All grades recorded by a user.
    async fn fetch_user_grades(&self, user_id: Uuid) -> Result<HashMap<Uuid, Grade>>;

    /// Insert or overwrite the grade for (user, card). Last write wins.
    async fn upsert_grade(&self, user_id: Uuid, card_id: Uuid, grade: Grade) -> Result<()>;

    /// Delete every user's grade for a card.
    async fn delete_for_card(&self, card_id: Uuid) -> Result<u64>;
}

// =============================================================================
// IDENTITY
// =============================================================================

/// Source of the current viewer identity and its changes.
pub trait IdentityProvider: Send + Sync {
    /// The authenticated identity, or `None` when anonymous.
    fn current(&self) -> Option<Identity>;

    /// Subscribe to login/logout events.
    fn subscribe(&self) -> broadcast::Receiver<IdentityEvent>;
}

// =============================================================================
// BUNDLE
// =============================================================================

/// Handles to every repository the study layer needs.
#[derive(Clone)]
pub struct Repositories {
    pub taxonomy: Arc<dyn TaxonomyRepository>,
    pub cards: Arc<dyn CardRepository>,
    pub grades: Arc<dyn GradeRepository>,
}

impl Repositories {
    pub fn new(
        taxonomy: Arc<dyn TaxonomyRepository>,
        cards: Arc<dyn CardRepository>,
        grades: Arc<dyn GradeRepository>,
    ) -> Self {
        Self {
            taxonomy,
            cards,
            grades,
        }
    }

    /// Bundle a single backend that implements all three repositories.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: TaxonomyRepository + CardRepository + GradeRepository + 'static,
    {
        Self {
            taxonomy: backend.clone(),
            cards: backend.clone(),
            grades: backend,
        }
    }
}
