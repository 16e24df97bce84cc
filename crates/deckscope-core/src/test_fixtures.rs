//! Test data builders shared by unit and integration tests.
//!
//! Always compiled so tests in other crates (and `tests/` directories) can use them.
//!
//! ```
//! use deckscope_core::test_fixtures::CardBuilder;
//! use deckscope_core::Grade;
//!
//! let card = CardBuilder::public().front("Q").grade(Grade::Good).build();
//! assert_eq!(card.front, "Q");
//! ```

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::*;

/// Builder for [`Card`] values with sensible defaults.
#[derive(Debug, Clone)]
pub struct CardBuilder {
    card: Card,
}

impl CardBuilder {
    /// A draft, private card (hidden from anonymous viewers).
    pub fn new() -> Self {
        let id = Uuid::new_v4();
        Self {
            card: Card {
                id,
                front: format!("front {}", id),
                back: format!("back {}", id),
                chapter_id: None,
                topics: Vec::new(),
                tags: Vec::new(),
                status: CardStatus::Draft,
                visibility: CardVisibility::Private,
                author_suspended: false,
                meta: CardMeta::default(),
                created_at: Utc::now(),
                user_grade: None,
                user_starred: false,
            },
        }
    }

    /// A published, public card (visible to everyone).
    pub fn public() -> Self {
        Self::new()
            .status(CardStatus::Published)
            .visibility(CardVisibility::Public)
    }

    pub fn id(mut self, id: Uuid) -> Self {
        self.card.id = id;
        self
    }

    pub fn front(mut self, front: &str) -> Self {
        self.card.front = front.to_string();
        self
    }

    pub fn back(mut self, back: &str) -> Self {
        self.card.back = back.to_string();
        self
    }

    pub fn chapter(mut self, chapter_id: Uuid) -> Self {
        self.card.chapter_id = Some(chapter_id);
        self
    }

    pub fn topic(mut self, topic_id: Uuid, title: &str) -> Self {
        self.card.topics.push(TopicLink {
            topic_id,
            title: Some(title.to_string()),
        });
        self
    }

    pub fn tag(mut self, tag_id: Uuid, name: &str) -> Self {
        self.card.tags.push(TagLink {
            tag_id,
            name: Some(name.to_string()),
        });
        self
    }

    pub fn status(mut self, status: CardStatus) -> Self {
        self.card.status = status;
        self
    }

    pub fn visibility(mut self, visibility: CardVisibility) -> Self {
        self.card.visibility = visibility;
        self
    }

    pub fn suspended(mut self) -> Self {
        self.card.author_suspended = true;
        self
    }

    pub fn section(mut self, section: &str) -> Self {
        self.card.meta.section = Some(section.to_string());
        self
    }

    pub fn grade(mut self, grade: Grade) -> Self {
        self.card.user_grade = Some(grade);
        self
    }

    pub fn starred(mut self) -> Self {
        self.card.user_starred = true;
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.card.created_at = at;
        self
    }

    pub fn build(self) -> Card {
        self.card
    }
}

impl Default for CardBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `n` public cards with strictly increasing creation times.
pub fn public_deck(n: usize) -> Vec<Card> {
    let start = Utc::now() - Duration::hours(1);
    (0..n)
        .map(|i| {
            CardBuilder::public()
                .front(&format!("card {}", i))
                .created_at(start + Duration::seconds(i as i64))
                .build()
        })
        .collect()
}
