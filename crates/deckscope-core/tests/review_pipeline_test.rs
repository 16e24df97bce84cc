//! Visibility, scope, counts and session working together over a mixed deck.

use deckscope_core::test_fixtures::CardBuilder;
use deckscope_core::{
    counts, in_base_scope, in_scope, visible, Card, CardStatus, CardVisibility, Catalog,
    ChapterScope, Grade, GradeBucket, ReviewSession, ScopeState, TopicScope,
};
use uuid::Uuid;

struct Deck {
    catalog: Catalog,
    chapter: Uuid,
    topic: Uuid,
}

/// Twelve cards: public ones in and out of a chapter and topic, plus a draft,
/// a private card and a suspended card that only signed-in viewers see.
fn deck() -> Deck {
    let chapter = Uuid::new_v4();
    let topic = Uuid::new_v4();
    let mut cards: Vec<Card> = Vec::new();

    for i in 0..9 {
        let mut b = CardBuilder::public().front(&format!("public {}", i));
        if i % 3 != 0 {
            b = b.chapter(chapter);
        }
        if i % 2 == 0 {
            b = b.topic(topic, "Sleep");
        }
        if i % 4 == 1 {
            b = b.grade(Grade::Hard);
        }
        if i == 5 {
            b = b.starred();
        }
        cards.push(b.build());
    }
    cards.push(CardBuilder::new().chapter(chapter).front("draft").build());
    cards.push(
        CardBuilder::public()
            .visibility(CardVisibility::Private)
            .front("private")
            .build(),
    );
    cards.push(
        CardBuilder::public()
            .status(CardStatus::Published)
            .suspended()
            .chapter(chapter)
            .front("suspended")
            .build(),
    );

    Deck {
        catalog: Catalog::new(cards),
        chapter,
        topic,
    }
}

fn scopes(deck: &Deck) -> Vec<ScopeState> {
    let chapters = [
        ChapterScope::Any,
        ChapterScope::Uncategorised,
        ChapterScope::Chapter(deck.chapter),
    ];
    let topics = [
        TopicScope::Any,
        TopicScope::NoTopics,
        TopicScope::Topic(deck.topic),
    ];
    let diffs = [None, Some(GradeBucket::Hard), Some(GradeBucket::Ungraded)];

    let mut out = Vec::new();
    for chapter in chapters {
        for topic in topics {
            for diff in diffs {
                for starred in [false, true] {
                    out.push(ScopeState {
                        chapter,
                        topic,
                        diff,
                        starred,
                        mixed: false,
                    });
                }
            }
        }
    }
    out
}

#[test]
fn test_pool_is_catalog_order_subsequence_of_visible_cards() {
    let deck = deck();
    for auth in [false, true] {
        for scope in scopes(&deck) {
            let mut session = ReviewSession::new();
            session.rebuild(&deck.catalog, &scope, auth);

            let expected: Vec<Uuid> = deck
                .catalog
                .iter()
                .filter(|c| in_scope(c, &scope, auth))
                .map(|c| c.id)
                .collect();
            assert_eq!(session.pool(), expected.as_slice(), "scope {:?}", scope);
            assert!(session
                .pool()
                .iter()
                .all(|id| visible(deck.catalog.get(*id).unwrap(), auth)));
        }
    }
}

#[test]
fn test_counts_partition_the_base_set() {
    let deck = deck();
    for auth in [false, true] {
        for scope in scopes(&deck) {
            let c = counts(deck.catalog.iter(), &scope, auth);
            let base = deck
                .catalog
                .iter()
                .filter(|card| in_base_scope(card, &scope, auth))
                .count();
            assert_eq!(c.total(), base, "scope {:?}", scope);
            // The difficulty and star filters never change the counts.
            let unfiltered = ScopeState {
                diff: None,
                starred: false,
                ..scope
            };
            assert_eq!(c, counts(deck.catalog.iter(), &unfiltered, auth));
        }
    }
}

#[test]
fn test_signed_in_viewer_sees_hidden_cards() {
    let deck = deck();
    let all = ScopeState::default();

    let mut anon = ReviewSession::new();
    anon.rebuild(&deck.catalog, &all, false);
    let mut editor = ReviewSession::new();
    editor.rebuild(&deck.catalog, &all, true);

    assert_eq!(anon.len(), 9);
    assert_eq!(editor.len(), 12);
}

#[test]
fn test_navigation_cycles_over_any_pool() {
    let deck = deck();
    for scope in scopes(&deck) {
        let mut session = ReviewSession::new();
        session.rebuild(&deck.catalog, &scope, true);
        let len = session.len();
        if len == 0 {
            session.next();
            session.prev();
            assert_eq!(session.current_id(), None);
            continue;
        }
        let start = session.current_id();
        for _ in 0..len {
            session.next();
        }
        assert_eq!(session.current_id(), start);
        session.prev();
        session.next();
        assert_eq!(session.current_id(), start);
    }
}
