//! Publication gate deciding whether a viewer may see a card.

use crate::models::{Card, CardStatus, CardVisibility};

/// True if the card is published, public, and its author is not suspended.
pub fn is_public(card: &Card) -> bool {
    card.status == CardStatus::Published
        && card.visibility == CardVisibility::Public
        && !card.author_suspended
}

/// Whether a viewer sees `card`.
///
/// Anonymous viewers see only public cards. Any authenticated viewer sees
/// every card, including drafts, private and suspended ones: authentication
/// grants the editor view, there is no per-owner check.
pub fn visible(card: &Card, is_authenticated: bool) -> bool {
    is_authenticated || is_public(card)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CardMeta;
    use chrono::Utc;
    use uuid::Uuid;

    fn card(status: CardStatus, visibility: CardVisibility, suspended: bool) -> Card {
        Card {
            id: Uuid::new_v4(),
            front: "front".to_string(),
            back: "back".to_string(),
            chapter_id: None,
            topics: vec![],
            tags: vec![],
            status,
            visibility,
            author_suspended: suspended,
            meta: CardMeta::default(),
            created_at: Utc::now(),
            user_grade: None,
            user_starred: false,
        }
    }

    #[test]
    fn test_published_public_visible_to_anonymous() {
        let c = card(CardStatus::Published, CardVisibility::Public, false);
        assert!(visible(&c, false));
        assert!(visible(&c, true));
    }

    #[test]
    fn test_hidden_states_for_anonymous() {
        let cases = [
            card(CardStatus::Draft, CardVisibility::Public, false),
            card(CardStatus::Published, CardVisibility::Private, false),
            card(CardStatus::Published, CardVisibility::Public, true),
            card(CardStatus::Draft, CardVisibility::Private, true),
        ];
        for c in &cases {
            assert!(!visible(c, false), "{:?} should be hidden", c.status);
            assert!(visible(c, true), "authenticated viewers see everything");
        }
    }
}
