//! Review session: the materialized pool and a cyclic cursor over it.
//!
//! The pool holds card ids, not card copies; callers resolve the current card
//! through the [`Catalog`] so grade and star changes are seen immediately.

use uuid::Uuid;

use crate::catalog::Catalog;
use crate::scope::{in_scope, ScopeState};
use crate::visibility::visible;

/// Where the current pool came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoolOrigin {
    /// Filtered catalog order.
    #[default]
    Scope,
    /// Search-result order.
    Search,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewSession {
    pool: Vec<Uuid>,
    cursor: usize,
    origin: PoolOrigin,
}

impl ReviewSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the pool as the catalog-order subsequence matching `scope`.
    /// The cursor resets to 0.
    pub fn rebuild(&mut self, catalog: &Catalog, scope: &ScopeState, is_authenticated: bool) {
        self.pool = catalog
            .iter()
            .filter(|c| in_scope(c, scope, is_authenticated))
            .map(|c| c.id)
            .collect();
        self.cursor = 0;
        self.origin = PoolOrigin::Scope;
        tracing::debug!(
            pool_size = self.pool.len(),
            catalog_size = catalog.len(),
            "Review pool rebuilt from scope"
        );
    }

    /// Load an explicit ordered list of ids (search results). Ids unknown to
    /// the catalog, hidden from the viewer, or repeated are dropped.
    pub fn load_ordered(&mut self, ids: &[Uuid], catalog: &Catalog, is_authenticated: bool) {
        let mut pool: Vec<Uuid> = Vec::with_capacity(ids.len());
        for id in ids {
            let keep = catalog
                .get(*id)
                .is_some_and(|c| visible(c, is_authenticated));
            if keep && !pool.contains(id) {
                pool.push(*id);
            }
        }
        self.pool = pool;
        self.cursor = 0;
        self.origin = PoolOrigin::Search;
        tracing::debug!(pool_size = self.pool.len(), "Review pool loaded from search");
    }

    pub fn next(&mut self) {
        if !self.pool.is_empty() {
            self.cursor = (self.cursor + 1) % self.pool.len();
        }
    }

    pub fn prev(&mut self) {
        if !self.pool.is_empty() {
            self.cursor = (self.cursor + self.pool.len() - 1) % self.pool.len();
        }
    }

    /// Move the cursor to `card_id` if it is in the pool. Returns whether it moved.
    pub fn jump_to(&mut self, card_id: Uuid) -> bool {
        match self.pool.iter().position(|id| *id == card_id) {
            Some(index) => {
                self.cursor = index;
                true
            }
            None => false,
        }
    }

    /// Id under the cursor, `None` when the pool is empty.
    pub fn current_id(&self) -> Option<Uuid> {
        self.pool.get(self.cursor).copied()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// 1-based position and pool length, for "3 / 10" style display.
    pub fn position(&self) -> Option<(usize, usize)> {
        if self.pool.is_empty() {
            None
        } else {
            Some((self.cursor + 1, self.pool.len()))
        }
    }

    pub fn pool(&self) -> &[Uuid] {
        &self.pool
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn origin(&self) -> PoolOrigin {
        self.origin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Grade;
    use crate::scope::ChapterScope;
    use crate::test_fixtures::{public_deck, CardBuilder};

    #[test]
    fn test_rebuild_is_idempotent_and_resets_cursor() {
        let catalog = Catalog::new(public_deck(6));
        let scope = ScopeState::default();
        let mut session = ReviewSession::new();

        session.rebuild(&catalog, &scope, false);
        let first = session.pool().to_vec();
        session.next();
        session.next();
        assert_eq!(session.cursor(), 2);

        session.rebuild(&catalog, &scope, false);
        assert_eq!(session.pool(), first.as_slice());
        assert_eq!(session.cursor(), 0);
    }

    #[test]
    fn test_pool_preserves_catalog_order() {
        let cards = public_deck(5);
        let expected: Vec<Uuid> = cards.iter().map(|c| c.id).collect();
        let catalog = Catalog::new(cards);
        let mut session = ReviewSession::new();
        session.rebuild(&catalog, &ScopeState::default(), false);
        assert_eq!(session.pool(), expected.as_slice());
        assert_eq!(session.origin(), PoolOrigin::Scope);
    }

    #[test]
    fn test_next_cycles_through_pool() {
        let catalog = Catalog::new(public_deck(4));
        let mut session = ReviewSession::new();
        session.rebuild(&catalog, &ScopeState::default(), false);

        session.next();
        let start = session.cursor();
        for _ in 0..session.len() {
            session.next();
        }
        assert_eq!(session.cursor(), start);
    }

    #[test]
    fn test_prev_after_next_returns_to_prior_card() {
        let catalog = Catalog::new(public_deck(3));
        let mut session = ReviewSession::new();
        session.rebuild(&catalog, &ScopeState::default(), false);

        let before = session.current_id();
        session.next();
        session.prev();
        assert_eq!(session.current_id(), before);

        // Wraps backwards from the first card.
        session.prev();
        assert_eq!(session.cursor(), 2);
    }

    #[test]
    fn test_empty_pool_navigation_is_noop() {
        let mut session = ReviewSession::new();
        session.next();
        session.prev();
        assert_eq!(session.current_id(), None);
        assert_eq!(session.position(), None);
        assert!(!session.jump_to(Uuid::new_v4()));
    }

    #[test]
    fn test_jump_to() {
        let cards = public_deck(5);
        let target = cards[3].id;
        let catalog = Catalog::new(cards);
        let mut session = ReviewSession::new();
        session.rebuild(&catalog, &ScopeState::default(), false);

        assert!(session.jump_to(target));
        assert_eq!(session.current_id(), Some(target));
        assert_eq!(session.position(), Some((4, 5)));

        assert!(!session.jump_to(Uuid::new_v4()));
        assert_eq!(session.current_id(), Some(target));
    }

    #[test]
    fn test_uncategorised_scope_selects_chapterless_cards() {
        let chapter = Uuid::new_v4();
        let mut cards = Vec::new();
        for i in 0..10 {
            let builder = CardBuilder::public();
            cards.push(if i % 3 == 0 && i > 0 {
                builder.build()
            } else {
                builder.chapter(chapter).build()
            });
        }
        // Hidden card without chapter must not count for anonymous viewers.
        cards.push(CardBuilder::new().build());
        let catalog = Catalog::new(cards);

        let scope = ScopeState {
            chapter: ChapterScope::Uncategorised,
            ..Default::default()
        };
        let mut session = ReviewSession::new();
        session.rebuild(&catalog, &scope, false);
        assert_eq!(session.len(), 3);

        session.rebuild(&catalog, &scope, true);
        assert_eq!(session.len(), 4);
    }

    #[test]
    fn test_load_ordered_keeps_search_order() {
        let cards = public_deck(4);
        let hidden = CardBuilder::new().grade(Grade::Good).build();
        let ids = vec![cards[2].id, hidden.id, cards[0].id, cards[2].id, Uuid::new_v4()];
        let mut all = cards.clone();
        all.push(hidden);
        let catalog = Catalog::new(all);

        let mut session = ReviewSession::new();
        session.load_ordered(&ids, &catalog, false);
        assert_eq!(session.pool(), &[cards[2].id, cards[0].id]);
        assert_eq!(session.origin(), PoolOrigin::Search);
        assert_eq!(session.cursor(), 0);
    }
}
