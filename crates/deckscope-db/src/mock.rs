//! In-memory backend for deterministic testing.
//!
//! [`MockBackend`] implements every repository trait against plain
//! collections and keeps the same rules the Postgres schema enforces: unique
//! names per taxonomy kind, one grade per (user, card), join rows as sets, and
//! no deleting a taxonomy row that is still referenced. Every call is logged
//! and any operation can be made to fail.
//!
//! ## Usage
//!
//! ```rust
//! use deckscope_db::mock::{MockBackend, MockOp};
//! use deckscope_db::{TaxonomyKind, TaxonomyRepository};
//!
//! # tokio_test_block_on(async {
//! let backend = MockBackend::new();
//! let id = backend.create(TaxonomyKind::Topic, "Sleep").await.unwrap();
//! assert_eq!(backend.find_by_name(TaxonomyKind::Topic, "Sleep").await.unwrap(), Some(id));
//! assert_eq!(backend.call_count(MockOp::CreateTaxonomy), 1);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use deckscope_core::{
    Card, CardPatch, CardRepository, CardRow, Chapter, Error, Grade, GradeRepository, LinkKind,
    Result, Tag, TagLink, Taxonomy, TaxonomyKind, TaxonomyRepository, Topic, TopicLink,
};

/// Backend operations, as recorded in the call log and targeted by failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    FetchTaxonomy,
    FindByName,
    CreateTaxonomy,
    RenameTaxonomy,
    DeleteTaxonomy,
    FetchCards,
    InsertCard,
    UpdateCard,
    DeleteCard,
    DeleteLinks,
    InsertLinks,
    DeleteLinksTo,
    DetachChapter,
    FetchUserGrades,
    UpsertGrade,
    DeleteGradesForCard,
}

#[derive(Debug, Clone)]
pub struct MockCall {
    pub op: MockOp,
    pub detail: String,
    pub timestamp: std::time::Instant,
}

#[derive(Debug, Default)]
struct MockState {
    chapters: Vec<Chapter>,
    topics: Vec<Topic>,
    tags: Vec<Tag>,
    cards: Vec<Card>,
    card_topics: BTreeSet<(Uuid, Uuid)>,
    card_tags: BTreeSet<(Uuid, Uuid)>,
    grades: HashMap<(Uuid, Uuid), Grade>,
}

impl MockState {
    fn named(&self, kind: TaxonomyKind) -> Vec<(Uuid, String)> {
        match kind {
            TaxonomyKind::Chapter => self.chapters.iter().map(|c| (c.id, c.title.clone())).collect(),
            TaxonomyKind::Topic => self.topics.iter().map(|t| (t.id, t.title.clone())).collect(),
            TaxonomyKind::Tag => self.tags.iter().map(|t| (t.id, t.name.clone())).collect(),
        }
    }

    fn find(&self, kind: TaxonomyKind, name: &str) -> Option<Uuid> {
        self.named(kind)
            .into_iter()
            .find(|(_, n)| n == name)
            .map(|(id, _)| id)
    }

    fn exists(&self, kind: TaxonomyKind, id: Uuid) -> bool {
        self.named(kind).iter().any(|(i, _)| *i == id)
    }

    fn push(&mut self, kind: TaxonomyKind, id: Uuid, name: &str) {
        let name = name.to_string();
        match kind {
            TaxonomyKind::Chapter => self.chapters.push(Chapter { id, title: name }),
            TaxonomyKind::Topic => self.topics.push(Topic { id, title: name }),
            TaxonomyKind::Tag => self.tags.push(Tag { id, name }),
        }
    }

    fn joins_mut(&mut self, kind: LinkKind) -> &mut BTreeSet<(Uuid, Uuid)> {
        match kind {
            LinkKind::Topic => &mut self.card_topics,
            LinkKind::Tag => &mut self.card_tags,
        }
    }

    fn joins(&self, kind: LinkKind) -> &BTreeSet<(Uuid, Uuid)> {
        match kind {
            LinkKind::Topic => &self.card_topics,
            LinkKind::Tag => &self.card_tags,
        }
    }

    fn is_referenced(&self, kind: TaxonomyKind, id: Uuid) -> bool {
        match kind {
            TaxonomyKind::Chapter => self.cards.iter().any(|c| c.chapter_id == Some(id)),
            TaxonomyKind::Topic => self.card_topics.iter().any(|(_, t)| *t == id),
            TaxonomyKind::Tag => self.card_tags.iter().any(|(_, t)| *t == id),
        }
    }

    fn resolved(&self, card: &Card) -> Card {
        let mut out = card.clone();
        out.topics = self
            .card_topics
            .iter()
            .filter(|(c, _)| *c == card.id)
            .map(|(_, topic_id)| TopicLink {
                topic_id: *topic_id,
                title: self
                    .topics
                    .iter()
                    .find(|t| t.id == *topic_id)
                    .map(|t| t.title.clone()),
            })
            .collect();
        out.tags = self
            .card_tags
            .iter()
            .filter(|(c, _)| *c == card.id)
            .map(|(_, tag_id)| TagLink {
                tag_id: *tag_id,
                name: self
                    .tags
                    .iter()
                    .find(|t| t.id == *tag_id)
                    .map(|t| t.name.clone()),
            })
            .collect();
        out.user_grade = None;
        out.user_starred = false;
        out
    }
}

/// In-memory backend implementing the taxonomy, card and grade repositories.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
    failures: Arc<Mutex<HashSet<MockOp>>>,
    failing_names: Arc<Mutex<HashSet<String>>>,
    racing_names: Arc<Mutex<HashSet<(TaxonomyKind, String)>>>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Failure injection
    // -------------------------------------------------------------------------

    /// Make every call to `op` fail with `Error::Remote` until cleared.
    pub fn fail_on(&self, op: MockOp) {
        lock(&self.failures).insert(op);
    }

    pub fn succeed_on(&self, op: MockOp) {
        lock(&self.failures).remove(&op);
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
        lock(&self.failing_names).clear();
    }

    /// Make `create` fail for this exact name (any kind).
    pub fn fail_create_named(&self, name: &str) {
        lock(&self.failing_names).insert(name.to_string());
    }

    /// Simulate another client creating `name` between this client's lookup
    /// and insert: the next lookup misses, then the row appears.
    pub fn race_create(&self, kind: TaxonomyKind, name: &str) {
        lock(&self.racing_names).insert((kind, name.to_string()));
    }

    // -------------------------------------------------------------------------
    // Call log
    // -------------------------------------------------------------------------

    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.call_log).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.call_log).clear()
    }

    pub fn call_count(&self, op: MockOp) -> usize {
        lock(&self.call_log).iter().filter(|c| c.op == op).count()
    }

    fn enter(&self, op: MockOp, detail: impl Into<String>) -> Result<()> {
        lock(&self.call_log).push(MockCall {
            op,
            detail: detail.into(),
            timestamp: std::time::Instant::now(),
        });
        if lock(&self.failures).contains(&op) {
            return Err(Error::Remote(format!("injected failure: {:?}", op)));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Seeding and inspection
    // -------------------------------------------------------------------------

    /// Insert a taxonomy row directly, bypassing the log. Returns the existing
    /// id if the name is taken.
    pub fn seed_taxonomy(&self, kind: TaxonomyKind, name: &str) -> Uuid {
        let mut state = lock(&self.state);
        if let Some(id) = state.find(kind, name) {
            return id;
        }
        let id = Uuid::new_v4();
        state.push(kind, id, name);
        id
    }

    /// Insert a card with its links directly. Link titles on `card` are
    /// ignored; the joins reference the ids given.
    pub fn seed_card(&self, card: Card) -> Uuid {
        let mut state = lock(&self.state);
        let id = card.id;
        for link in &card.topics {
            state.card_topics.insert((id, link.topic_id));
        }
        for link in &card.tags {
            state.card_tags.insert((id, link.tag_id));
        }
        state.cards.push(card);
        id
    }

    pub fn seed_grade(&self, user_id: Uuid, card_id: Uuid, grade: Grade) {
        lock(&self.state).grades.insert((user_id, card_id), grade);
    }

    /// Target ids linked to a card, sorted.
    pub fn links_of(&self, card_id: Uuid, kind: LinkKind) -> Vec<Uuid> {
        lock(&self.state)
            .joins(kind)
            .iter()
            .filter(|(c, _)| *c == card_id)
            .map(|(_, t)| *t)
            .collect()
    }

    /// Number of join rows (either kind) referencing a card.
    pub fn join_rows_for(&self, card_id: Uuid) -> usize {
        let state = lock(&self.state);
        state.card_topics.iter().filter(|(c, _)| *c == card_id).count()
            + state.card_tags.iter().filter(|(c, _)| *c == card_id).count()
    }

    /// Number of grade rows (any user) for a card.
    pub fn grade_rows_for(&self, card_id: Uuid) -> usize {
        lock(&self.state)
            .grades
            .keys()
            .filter(|(_, c)| *c == card_id)
            .count()
    }

    pub fn grade_of(&self, user_id: Uuid, card_id: Uuid) -> Option<Grade> {
        lock(&self.state).grades.get(&(user_id, card_id)).copied()
    }

    /// How many rows of `kind` carry exactly `name`.
    pub fn count_named(&self, kind: TaxonomyKind, name: &str) -> usize {
        lock(&self.state)
            .named(kind)
            .iter()
            .filter(|(_, n)| n == name)
            .count()
    }

    pub fn card(&self, card_id: Uuid) -> Option<Card> {
        let state = lock(&self.state);
        state
            .cards
            .iter()
            .find(|c| c.id == card_id)
            .map(|c| state.resolved(c))
    }
}

#[async_trait]
impl TaxonomyRepository for MockBackend {
    async fn fetch_taxonomy(&self) -> Result<Taxonomy> {
        self.enter(MockOp::FetchTaxonomy, "")?;
        let state = lock(&self.state);
        let mut chapters = state.chapters.clone();
        let mut topics = state.topics.clone();
        let mut tags = state.tags.clone();
        chapters.sort_by(|a, b| a.title.cmp(&b.title));
        topics.sort_by(|a, b| a.title.cmp(&b.title));
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Taxonomy {
            chapters,
            topics,
            tags,
        })
    }

    async fn find_by_name(&self, kind: TaxonomyKind, name: &str) -> Result<Option<Uuid>> {
        self.enter(MockOp::FindByName, format!("{}:{}", kind, name))?;
        let raced = lock(&self.racing_names).remove(&(kind, name.to_string()));
        let mut state = lock(&self.state);
        if raced && state.find(kind, name).is_none() {
            state.push(kind, Uuid::new_v4(), name);
            return Ok(None);
        }
        Ok(state.find(kind, name))
    }

    async fn create(&self, kind: TaxonomyKind, name: &str) -> Result<Uuid> {
        self.enter(MockOp::CreateTaxonomy, format!("{}:{}", kind, name))?;
        if lock(&self.failing_names).contains(name) {
            return Err(Error::Remote(format!("injected failure creating '{}'", name)));
        }
        let mut state = lock(&self.state);
        if state.find(kind, name).is_some() {
            return Err(Error::Conflict(format!("{} '{}' already exists", kind, name)));
        }
        let id = Uuid::new_v4();
        state.push(kind, id, name);
        Ok(id)
    }

    async fn rename(&self, kind: TaxonomyKind, id: Uuid, name: &str) -> Result<()> {
        self.enter(MockOp::RenameTaxonomy, format!("{}:{}:{}", kind, id, name))?;
        let mut state = lock(&self.state);
        if state.find(kind, name).is_some_and(|other| other != id) {
            return Err(Error::Conflict(format!("{} '{}' already exists", kind, name)));
        }
        let renamed = match kind {
            TaxonomyKind::Chapter => state.chapters.iter_mut().find(|c| c.id == id).map(|c| {
                c.title = name.to_string();
            }),
            TaxonomyKind::Topic => state.topics.iter_mut().find(|t| t.id == id).map(|t| {
                t.title = name.to_string();
            }),
            TaxonomyKind::Tag => state.tags.iter_mut().find(|t| t.id == id).map(|t| {
                t.name = name.to_string();
            }),
        };
        renamed.ok_or_else(|| Error::NotFound(format!("{} {}", kind, id)))
    }

    async fn delete(&self, kind: TaxonomyKind, id: Uuid) -> Result<()> {
        self.enter(MockOp::DeleteTaxonomy, format!("{}:{}", kind, id))?;
        let mut state = lock(&self.state);
        if !state.exists(kind, id) {
            return Err(Error::NotFound(format!("{} {}", kind, id)));
        }
        if state.is_referenced(kind, id) {
            return Err(Error::Remote(format!(
                "{} {} is still referenced by cards",
                kind, id
            )));
        }
        match kind {
            TaxonomyKind::Chapter => state.chapters.retain(|c| c.id != id),
            TaxonomyKind::Topic => state.topics.retain(|t| t.id != id),
            TaxonomyKind::Tag => state.tags.retain(|t| t.id != id),
        }
        Ok(())
    }
}

#[async_trait]
impl CardRepository for MockBackend {
    async fn fetch_cards(&self) -> Result<Vec<Card>> {
        self.enter(MockOp::FetchCards, "")?;
        let state = lock(&self.state);
        Ok(state.cards.iter().map(|c| state.resolved(c)).collect())
    }

    async fn insert_card(&self, row: CardRow) -> Result<Uuid> {
        self.enter(MockOp::InsertCard, row.front.clone())?;
        let mut state = lock(&self.state);
        if let Some(chapter_id) = row.chapter_id {
            if !state.exists(TaxonomyKind::Chapter, chapter_id) {
                return Err(Error::Remote(format!("unknown chapter {}", chapter_id)));
            }
        }
        let id = Uuid::new_v4();
        state.cards.push(Card {
            id,
            front: row.front,
            back: row.back,
            chapter_id: row.chapter_id,
            topics: Vec::new(),
            tags: Vec::new(),
            status: row.status,
            visibility: row.visibility,
            author_suspended: false,
            meta: row.meta,
            created_at: Utc::now(),
            user_grade: None,
            user_starred: false,
        });
        Ok(id)
    }

    async fn update_card(&self, card_id: Uuid, patch: CardPatch) -> Result<()> {
        self.enter(MockOp::UpdateCard, card_id.to_string())?;
        let mut state = lock(&self.state);
        let card = state
            .cards
            .iter_mut()
            .find(|c| c.id == card_id)
            .ok_or(Error::CardNotFound(card_id))?;
        patch.apply_to(card);
        Ok(())
    }

    async fn delete_card(&self, card_id: Uuid) -> Result<()> {
        self.enter(MockOp::DeleteCard, card_id.to_string())?;
        let mut state = lock(&self.state);
        let before = state.cards.len();
        state.cards.retain(|c| c.id != card_id);
        if state.cards.len() == before {
            return Err(Error::CardNotFound(card_id));
        }
        Ok(())
    }

    async fn delete_links(&self, card_id: Uuid, kind: LinkKind) -> Result<u64> {
        self.enter(MockOp::DeleteLinks, format!("{}:{}", card_id, kind))?;
        let mut state = lock(&self.state);
        let joins = state.joins_mut(kind);
        let before = joins.len();
        joins.retain(|(c, _)| *c != card_id);
        Ok((before - joins.len()) as u64)
    }

    async fn insert_links(
        &self,
        card_id: Uuid,
        kind: LinkKind,
        target_ids: &[Uuid],
    ) -> Result<()> {
        self.enter(
            MockOp::InsertLinks,
            format!("{}:{}:{}", card_id, kind, target_ids.len()),
        )?;
        let mut state = lock(&self.state);
        if let Some(missing) = target_ids
            .iter()
            .find(|id| !state.exists(kind.taxonomy(), **id))
        {
            return Err(Error::Remote(format!("unknown {} {}", kind, missing)));
        }
        let joins = state.joins_mut(kind);
        for target in target_ids {
            joins.insert((card_id, *target));
        }
        Ok(())
    }

    async fn delete_links_to(&self, kind: LinkKind, target_id: Uuid) -> Result<u64> {
        self.enter(MockOp::DeleteLinksTo, format!("{}:{}", kind, target_id))?;
        let mut state = lock(&self.state);
        let joins = state.joins_mut(kind);
        let before = joins.len();
        joins.retain(|(_, t)| *t != target_id);
        Ok((before - joins.len()) as u64)
    }

    async fn detach_chapter(&self, chapter_id: Uuid) -> Result<u64> {
        self.enter(MockOp::DetachChapter, chapter_id.to_string())?;
        let mut state = lock(&self.state);
        let mut detached = 0;
        for card in state.cards.iter_mut().filter(|c| c.chapter_id == Some(chapter_id)) {
            card.chapter_id = None;
            detached += 1;
        }
        Ok(detached)
    }
}

#[async_trait]
impl GradeRepository for MockBackend {
    async fn fetch_user_grades(&self, user_id: Uuid) -> Result<HashMap<Uuid, Grade>> {
        self.enter(MockOp::FetchUserGrades, user_id.to_string())?;
        Ok(lock(&self.state)
            .grades
            .iter()
            .filter(|((u, _), _)| *u == user_id)
            .map(|((_, c), g)| (*c, *g))
            .collect())
    }

    async fn upsert_grade(&self, user_id: Uuid, card_id: Uuid, grade: Grade) -> Result<()> {
        self.enter(
            MockOp::UpsertGrade,
            format!("{}:{}:{}", user_id, card_id, grade),
        )?;
        lock(&self.state).grades.insert((user_id, card_id), grade);
        Ok(())
    }

    async fn delete_for_card(&self, card_id: Uuid) -> Result<u64> {
        self.enter(MockOp::DeleteGradesForCard, card_id.to_string())?;
        let mut state = lock(&self.state);
        let before = state.grades.len();
        state.grades.retain(|(_, c), _| *c != card_id);
        Ok((before - state.grades.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckscope_core::test_fixtures::CardBuilder;

    #[tokio::test]
    async fn test_create_enforces_unique_names() {
        let backend = MockBackend::new();
        let id = backend.create(TaxonomyKind::Tag, "Definition").await.unwrap();
        let err = backend
            .create(TaxonomyKind::Tag, "Definition")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        // Same name in another kind is fine.
        let other = backend.create(TaxonomyKind::Topic, "Definition").await.unwrap();
        assert_ne!(id, other);
    }

    #[tokio::test]
    async fn test_failure_injection_and_call_log() {
        let backend = MockBackend::new();
        backend.fail_on(MockOp::FetchCards);
        assert!(matches!(
            backend.fetch_cards().await,
            Err(Error::Remote(_))
        ));
        backend.succeed_on(MockOp::FetchCards);
        assert!(backend.fetch_cards().await.unwrap().is_empty());
        assert_eq!(backend.call_count(MockOp::FetchCards), 2);
    }

    #[tokio::test]
    async fn test_grade_key_is_user_and_card() {
        let backend = MockBackend::new();
        let (user, card) = (Uuid::new_v4(), Uuid::new_v4());
        backend.upsert_grade(user, card, Grade::Again).await.unwrap();
        backend.upsert_grade(user, card, Grade::Easy).await.unwrap();
        backend.upsert_grade(Uuid::new_v4(), card, Grade::Hard).await.unwrap();

        assert_eq!(backend.grade_of(user, card), Some(Grade::Easy));
        assert_eq!(backend.grade_rows_for(card), 2);
        let mine = backend.fetch_user_grades(user).await.unwrap();
        assert_eq!(mine.len(), 1);
    }

    #[tokio::test]
    async fn test_referenced_taxonomy_cannot_be_deleted() {
        let backend = MockBackend::new();
        let chapter = backend.seed_taxonomy(TaxonomyKind::Chapter, "Anatomy");
        backend.seed_card(CardBuilder::public().chapter(chapter).build());

        assert!(backend.delete(TaxonomyKind::Chapter, chapter).await.is_err());
        assert_eq!(backend.detach_chapter(chapter).await.unwrap(), 1);
        backend.delete(TaxonomyKind::Chapter, chapter).await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_cards_resolves_link_names() {
        let backend = MockBackend::new();
        let tag = backend.seed_taxonomy(TaxonomyKind::Tag, "Mechanism");
        let id = backend.seed_card(CardBuilder::public().tag(tag, "stale name").build());

        let cards = backend.fetch_cards().await.unwrap();
        assert_eq!(cards[0].id, id);
        assert_eq!(cards[0].tag_names(), vec!["Mechanism"]);
    }

    #[tokio::test]
    async fn test_race_create_makes_insert_conflict() {
        let backend = MockBackend::new();
        backend.race_create(TaxonomyKind::Topic, "Sleep");

        assert_eq!(
            backend.find_by_name(TaxonomyKind::Topic, "Sleep").await.unwrap(),
            None
        );
        assert!(matches!(
            backend.create(TaxonomyKind::Topic, "Sleep").await,
            Err(Error::Conflict(_))
        ));
        assert!(backend
            .find_by_name(TaxonomyKind::Topic, "Sleep")
            .await
            .unwrap()
            .is_some());
    }
}
