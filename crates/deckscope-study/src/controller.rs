//! The study controller: the single owner of review state.
//!
//! Catalog, taxonomy, scope, session and ledger live here, and every mutation
//! goes through a named operation. Identity changes arrive on a broadcast
//! channel and are applied one at a time by [`StudyController::pump_identity_events`]
//! (or directly via [`StudyController::handle_identity_event`]).

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use deckscope_core::logging::{
    COMPONENT, DURATION_MS, OPERATION, POOL_SIZE, RESULT_COUNT, SUBSYSTEM,
};
use deckscope_core::{
    counts, search, Card, CardPatch, Catalog, ChapterScope, Error, Grade, GradeBucket, Identity,
    IdentityEvent, IdentityProvider, LinkKind, NewCard, PickerCounts, Repositories,
    Result, ReviewSession, ScopeCounts, ScopePatch, ScopeState, Taxonomy, TaxonomyKind,
    UsageCounts,
};

use crate::ledger::{DrainReport, GradeLedger, GradeOutcome, LocalStore};
use crate::reconciler::{CascadeReport, ReplaceReport, TaxonomyReconciler};

pub struct StudyController {
    repos: Repositories,
    identity: Arc<dyn IdentityProvider>,
    events: broadcast::Receiver<IdentityEvent>,
    /// Identity as of the last applied event.
    viewer: Option<Identity>,
    taxonomy: Taxonomy,
    catalog: Catalog,
    scope: ScopeState,
    session: ReviewSession,
    ledger: GradeLedger,
    reconciler: TaxonomyReconciler,
}

impl StudyController {
    /// Create a controller with empty state. Call [`reload`](Self::reload) to populate it.
    pub fn new(
        repos: Repositories,
        identity: Arc<dyn IdentityProvider>,
        local_store: Arc<dyn LocalStore>,
    ) -> Self {
        let events = identity.subscribe();
        let viewer = identity.current();
        Self {
            ledger: GradeLedger::new(repos.grades.clone(), local_store),
            reconciler: TaxonomyReconciler::new(&repos),
            repos,
            identity,
            events,
            viewer,
            taxonomy: Taxonomy::default(),
            catalog: Catalog::default(),
            scope: ScopeState::default(),
            session: ReviewSession::new(),
        }
    }

    // =========================================================================
    // Read access
    // =========================================================================

    pub fn viewer(&self) -> Option<&Identity> {
        self.viewer.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.viewer.is_some()
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn scope(&self) -> &ScopeState {
        &self.scope
    }

    pub fn session(&self) -> &ReviewSession {
        &self.session
    }

    pub fn ledger(&self) -> &GradeLedger {
        &self.ledger
    }

    pub fn reconciler(&self) -> &TaxonomyReconciler {
        &self.reconciler
    }

    /// The card under the cursor, `None` when the pool is empty.
    pub fn current(&self) -> Option<&Card> {
        self.session.current_id().and_then(|id| self.catalog.get(id))
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// First load of a session.
    ///
    /// A session that starts with a known identity (restored login) first
    /// drains grades cached while anonymous in earlier sessions, the same way
    /// a live login does.
    pub async fn start(&mut self) -> Result<Option<DrainReport>> {
        let pending = self.ledger.local_cache().len();
        let report = match self.viewer.as_ref().map(|who| who.user_id) {
            Some(user_id) if pending > 0 => {
                info!(
                    { SUBSYSTEM } = "study",
                    { COMPONENT } = "controller",
                    { OPERATION } = "start",
                    user_id = %user_id,
                    cached = pending,
                    "Restored session has local grades, draining"
                );
                Some(self.ledger.drain(user_id).await)
            }
            _ => None,
        };
        self.reload().await?;
        Ok(report)
    }

    /// Refetch taxonomy and cards, hydrate grades, rebuild the pool and
    /// return to the previously shown card if it is still in the pool.
    ///
    /// On a fetch failure the existing in-memory state is kept.
    pub async fn reload(&mut self) -> Result<()> {
        let start = Instant::now();
        let previous = self.session.current_id();
        let stars = self.catalog.starred_ids();

        let taxonomy = self.repos.taxonomy.fetch_taxonomy().await?;
        let cards = self.repos.cards.fetch_cards().await?;

        let grades = match self.ledger.hydrate(self.viewer.as_ref()).await {
            Ok(grades) => grades,
            Err(e) => {
                warn!(
                    subsystem = "study",
                    component = "controller",
                    op = "reload",
                    error = %e,
                    "Failed to load grades, showing cards ungraded"
                );
                Default::default()
            }
        };

        self.taxonomy = taxonomy;
        self.catalog.replace_all(cards);
        self.catalog.hydrate_grades(&grades);
        self.catalog.restore_stars(&stars);
        self.rebuild();
        if let Some(id) = previous {
            self.session.jump_to(id);
        }

        info!(
            { SUBSYSTEM } = "study",
            { COMPONENT } = "controller",
            { OPERATION } = "reload",
            { RESULT_COUNT } = self.catalog.len(),
            { POOL_SIZE } = self.session.len(),
            authenticated = self.is_authenticated(),
            { DURATION_MS } = start.elapsed().as_millis() as u64,
            "Catalog reloaded"
        );
        Ok(())
    }

    // =========================================================================
    // Scope and navigation
    // =========================================================================

    /// Rebuild the pool from the current scope; cursor back to the first card.
    pub fn rebuild(&mut self) {
        let auth = self.is_authenticated();
        self.session.rebuild(&self.catalog, &self.scope, auth);
    }

    pub fn set_scope(&mut self, patch: ScopePatch) {
        self.scope.apply(patch);
        debug!(scope = ?self.scope, "Scope updated");
        self.rebuild();
    }

    /// Select a difficulty bucket, or clear it when already selected.
    pub fn toggle_diff(&mut self, bucket: GradeBucket) {
        self.scope.toggle_diff(bucket);
        self.rebuild();
    }

    /// Clear every scope dimension and review everything visible.
    pub fn mix(&mut self) {
        self.scope = ScopeState::mix();
        self.rebuild();
    }

    pub fn next(&mut self) -> Option<&Card> {
        self.session.next();
        self.current()
    }

    pub fn prev(&mut self) -> Option<&Card> {
        self.session.prev();
        self.current()
    }

    pub fn jump_to(&mut self, card_id: Uuid) -> bool {
        self.session.jump_to(card_id)
    }

    /// Per-bucket counts for the difficulty chips under the current chapter/topic.
    pub fn counts(&self) -> ScopeCounts {
        counts(self.catalog.iter(), &self.scope, self.is_authenticated())
    }

    pub fn picker_counts(&self) -> PickerCounts {
        let selected = match self.scope.chapter {
            ChapterScope::Chapter(id) => Some(id),
            _ => None,
        };
        self.catalog
            .picker_counts(&self.taxonomy, selected, self.is_authenticated())
    }

    pub fn usage_counts(&self) -> UsageCounts {
        self.catalog.usage_counts()
    }

    pub fn search(&self, query: &str) -> Vec<Uuid> {
        search(&self.catalog, query, self.is_authenticated())
    }

    /// Review the results of `query` in result order. The scope is cleared.
    ///
    /// With no results nothing changes and 0 is returned.
    pub fn review_search(&mut self, query: &str) -> usize {
        let hits = self.search(query);
        if hits.is_empty() {
            debug!(query, "No search results, keeping current pool");
            return 0;
        }
        let auth = self.is_authenticated();
        self.scope = ScopeState::default();
        self.session.load_ordered(&hits, &self.catalog, auth);
        self.session.len()
    }

    // =========================================================================
    // Learner actions
    // =========================================================================

    /// Grade a card. The in-memory grade changes first and is never rolled
    /// back; the outcome reports where the grade was persisted.
    pub async fn grade(&mut self, card_id: Uuid, grade: Grade) -> Result<GradeOutcome> {
        if !self.catalog.set_grade(card_id, Some(grade)) {
            return Err(Error::CardNotFound(card_id));
        }
        let outcome = self
            .ledger
            .record(self.viewer.as_ref(), card_id, grade)
            .await;
        debug!(%card_id, grade = %grade, outcome = ?outcome, "Card graded");
        Ok(outcome)
    }

    /// Flip the local star on a card. Returns the new value.
    pub fn toggle_star(&mut self, card_id: Uuid) -> Result<bool> {
        self.catalog
            .toggle_star(card_id)
            .ok_or(Error::CardNotFound(card_id))
    }

    /// Flip a card's author-suspended flag on the backend, then in memory.
    pub async fn toggle_suspended(&mut self, card_id: Uuid) -> Result<bool> {
        if !self.is_authenticated() {
            return Err(Error::Unauthorized(
                "suspending cards requires login".to_string(),
            ));
        }
        let suspended = !self
            .catalog
            .get(card_id)
            .ok_or(Error::CardNotFound(card_id))?
            .author_suspended;

        self.repos
            .cards
            .update_card(
                card_id,
                CardPatch {
                    author_suspended: Some(suspended),
                    ..Default::default()
                },
            )
            .await?;

        if let Some(card) = self.catalog.get_mut(card_id) {
            card.author_suspended = suspended;
        }
        Ok(suspended)
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Apply one identity change. Login drains the local cache into the
    /// remote store; both directions reload so the right grade source is shown.
    pub async fn handle_identity_event(&mut self, event: IdentityEvent) -> Option<DrainReport> {
        let was_anonymous = self.viewer.is_none();
        self.viewer = event.identity;

        let report = match (&self.viewer, was_anonymous) {
            (Some(who), true) => {
                info!(
                    subsystem = "study",
                    component = "controller",
                    op = "login",
                    user_id = %who.user_id,
                    cached = self.ledger.local_cache().len(),
                    "Viewer logged in, draining local grades"
                );
                let user_id = who.user_id;
                Some(self.ledger.drain(user_id).await)
            }
            (None, false) => {
                info!(
                    subsystem = "study",
                    component = "controller",
                    op = "logout",
                    "Viewer logged out"
                );
                None
            }
            _ => None,
        };

        if let Err(e) = self.reload().await {
            warn!(error = %e, "Reload after identity change failed");
        }
        report
    }

    /// Apply every identity event queued since the last call.
    ///
    /// Returns the drain reports of any logins processed.
    pub async fn pump_identity_events(&mut self) -> Vec<DrainReport> {
        let mut reports = Vec::new();
        loop {
            let event = match self.events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Identity events dropped, resyncing from provider");
                    IdentityEvent {
                        identity: self.identity.current(),
                    }
                }
            };
            if event.identity == self.viewer {
                continue;
            }
            if let Some(report) = self.handle_identity_event(event).await {
                reports.push(report);
            }
        }
        reports
    }

    // =========================================================================
    // Editor actions (each reloads on success)
    // =========================================================================

    async fn reload_after(&mut self, op: &'static str) {
        if let Err(e) = self.reload().await {
            warn!(op, error = %e, "Editor change applied but reload failed");
        }
    }

    pub async fn ensure_by_name(&mut self, kind: TaxonomyKind, name: &str) -> Result<Uuid> {
        let id = self.reconciler.ensure_by_name(kind, name).await?;
        self.reload_after("ensure_by_name").await;
        Ok(id)
    }

    pub async fn replace_links(
        &mut self,
        card_id: Uuid,
        kind: LinkKind,
        target_ids: &[Uuid],
    ) -> Result<()> {
        let result = self.reconciler.replace_links(card_id, kind, target_ids).await;
        if matches!(result, Ok(()) | Err(Error::LinksCleared { .. })) {
            // The backend changed either way.
            self.reload_after("replace_links").await;
        }
        result
    }

    pub async fn replace_tags_by_name(
        &mut self,
        card_id: Uuid,
        names: &[String],
    ) -> Result<ReplaceReport> {
        let result = self.reconciler.replace_tags_by_name(card_id, names).await;
        self.reload_after("replace_tags_by_name").await;
        result
    }

    pub async fn replace_topics_by_name(
        &mut self,
        card_id: Uuid,
        names: &[String],
    ) -> Result<ReplaceReport> {
        let result = self.reconciler.replace_topics_by_name(card_id, names).await;
        self.reload_after("replace_topics_by_name").await;
        result
    }

    pub async fn delete_card(&mut self, card_id: Uuid) -> Result<CascadeReport> {
        let report = self.reconciler.delete_card_cascade(card_id).await?;
        self.reload_after("delete_card").await;
        Ok(report)
    }

    pub async fn rename(&mut self, kind: TaxonomyKind, id: Uuid, name: &str) -> Result<()> {
        self.reconciler.rename(kind, id, name).await?;
        self.reload_after("rename").await;
        Ok(())
    }

    pub async fn delete(&mut self, kind: TaxonomyKind, id: Uuid) -> Result<u64> {
        let detached = self.reconciler.delete(kind, id).await?;
        self.reload_after("delete").await;
        Ok(detached)
    }

    pub async fn create_card(&mut self, new: NewCard) -> Result<Uuid> {
        let id = self.reconciler.create_card(new).await?;
        self.reload_after("create_card").await;
        Ok(id)
    }

    pub async fn update_card(&mut self, card_id: Uuid, patch: CardPatch) -> Result<()> {
        self.reconciler.update_card(card_id, patch).await?;
        self.reload_after("update_card").await;
        Ok(())
    }
}
