//! In-memory mirrors of the backend: the taxonomy store and the card catalog.
//!
//! Both are rebuilt wholesale on every reload. The catalog additionally
//! carries the learner's local fields (grade, star) so filtering and counts
//! see grading actions immediately.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::defaults::UNCATEGORISED_LABEL;
use crate::models::*;
use crate::visibility::visible;

// =============================================================================
// TAXONOMY STORE
// =============================================================================

/// Chapters, topics and tags as fetched from the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Taxonomy {
    pub chapters: Vec<Chapter>,
    pub topics: Vec<Topic>,
    pub tags: Vec<Tag>,
}

impl Taxonomy {
    /// Soft lookup: `None` if the chapter is unknown.
    pub fn chapter_title(&self, id: Uuid) -> Option<&str> {
        self.chapters
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.title.as_str())
    }

    pub fn topic_title(&self, id: Uuid) -> Option<&str> {
        self.topics
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.title.as_str())
    }

    pub fn tag_name(&self, id: Uuid) -> Option<&str> {
        self.tags.iter().find(|t| t.id == id).map(|t| t.name.as_str())
    }

    /// Chapter label for a card, `"(Uncategorised)"` when it has none or the
    /// chapter is unknown.
    pub fn chapter_label(&self, card: &Card) -> &str {
        card.chapter_id
            .and_then(|id| self.chapter_title(id))
            .unwrap_or(UNCATEGORISED_LABEL)
    }

    /// Exact-name lookup within a kind.
    pub fn id_by_name(&self, kind: TaxonomyKind, name: &str) -> Option<Uuid> {
        match kind {
            TaxonomyKind::Chapter => self.chapters.iter().find(|c| c.title == name).map(|c| c.id),
            TaxonomyKind::Topic => self.topics.iter().find(|t| t.title == name).map(|t| t.id),
            TaxonomyKind::Tag => self.tags.iter().find(|t| t.name == name).map(|t| t.id),
        }
    }
}

// =============================================================================
// CARD CATALOG
// =============================================================================

/// All cards in backend insertion order, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    cards: Vec<Card>,
    index: HashMap<Uuid, usize>,
}

impl Catalog {
    pub fn new(cards: Vec<Card>) -> Self {
        let mut catalog = Self::default();
        catalog.replace_all(cards);
        catalog
    }

    /// Replace every card. Local fields on the new cards are kept as given.
    pub fn replace_all(&mut self, cards: Vec<Card>) {
        self.index = cards
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id, i))
            .collect();
        self.cards = cards;
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn iter(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter()
    }

    pub fn get(&self, id: Uuid) -> Option<&Card> {
        self.index.get(&id).map(|&i| &self.cards[i])
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Card> {
        match self.index.get(&id) {
            Some(&i) => self.cards.get_mut(i),
            None => None,
        }
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.index.contains_key(&id)
    }

    /// Set a card's local grade. Returns false if the card is unknown.
    pub fn set_grade(&mut self, id: Uuid, grade: Option<Grade>) -> bool {
        match self.get_mut(id) {
            Some(card) => {
                card.user_grade = grade;
                true
            }
            None => false,
        }
    }

    /// Flip a card's star. Returns the new value, or `None` if the card is unknown.
    pub fn toggle_star(&mut self, id: Uuid) -> Option<bool> {
        self.get_mut(id).map(|card| {
            card.user_starred = !card.user_starred;
            card.user_starred
        })
    }

    /// Overwrite every card's grade from `grades`; cards absent from the map become ungraded.
    pub fn hydrate_grades(&mut self, grades: &HashMap<Uuid, Grade>) {
        for card in &mut self.cards {
            card.user_grade = grades.get(&card.id).copied();
        }
    }

    /// Ids of starred cards.
    pub fn starred_ids(&self) -> Vec<Uuid> {
        self.cards
            .iter()
            .filter(|c| c.user_starred)
            .map(|c| c.id)
            .collect()
    }

    /// Star the given cards (used to carry stars across a reload).
    pub fn restore_stars(&mut self, ids: &[Uuid]) {
        for id in ids {
            if let Some(card) = self.get_mut(*id) {
                card.user_starred = true;
            }
        }
    }

    /// Counts for the chapter and topic pickers, over cards visible to the viewer.
    pub fn picker_counts(
        &self,
        taxonomy: &Taxonomy,
        selected_chapter: Option<Uuid>,
        is_authenticated: bool,
    ) -> PickerCounts {
        let visible_cards: Vec<&Card> = self
            .cards
            .iter()
            .filter(|c| visible(c, is_authenticated))
            .collect();

        let mut out = PickerCounts {
            total: visible_cards.len(),
            ..Default::default()
        };

        for card in &visible_cards {
            match card.chapter_id {
                Some(id) => *out.by_chapter.entry(id).or_insert(0) += 1,
                None => out.uncategorised += 1,
            }
            if card.topics.is_empty() {
                out.no_topics += 1;
            }
            for link in &card.topics {
                *out.by_topic.entry(link.topic_id).or_insert(0) += 1;
            }
        }

        out.topic_options = match selected_chapter {
            Some(chapter_id) => {
                let in_chapter: Vec<&&Card> = visible_cards
                    .iter()
                    .filter(|c| c.chapter_id == Some(chapter_id))
                    .collect();
                out.no_topics = in_chapter.iter().filter(|c| c.topics.is_empty()).count();
                taxonomy
                    .topics
                    .iter()
                    .filter(|t| in_chapter.iter().any(|c| c.has_topic(t.id)))
                    .map(|t| t.id)
                    .collect()
            }
            None => taxonomy.topics.iter().map(|t| t.id).collect(),
        };

        out
    }

    /// Cards per chapter, topic and tag over the whole catalog (editor tables).
    pub fn usage_counts(&self) -> UsageCounts {
        let mut out = UsageCounts::default();
        for card in &self.cards {
            match card.chapter_id {
                Some(id) => *out.by_chapter.entry(id).or_insert(0) += 1,
                None => out.uncategorised += 1,
            }
            for link in &card.topics {
                *out.by_topic.entry(link.topic_id).or_insert(0) += 1;
            }
            for link in &card.tags {
                *out.by_tag.entry(link.tag_id).or_insert(0) += 1;
            }
        }
        out
    }
}

/// Chapter/topic picker counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PickerCounts {
    /// Visible cards overall ("All Chapters").
    pub total: usize,
    pub by_chapter: HashMap<Uuid, usize>,
    pub uncategorised: usize,
    /// Per topic over all visible cards.
    pub by_topic: HashMap<Uuid, usize>,
    /// Cards without topics; restricted to the selected chapter when one is set.
    pub no_topics: usize,
    /// Topics offered in the picker, in taxonomy order.
    pub topic_options: Vec<Uuid>,
}

impl PickerCounts {
    pub fn chapter(&self, id: Uuid) -> usize {
        self.by_chapter.get(&id).copied().unwrap_or(0)
    }

    pub fn topic(&self, id: Uuid) -> usize {
        self.by_topic.get(&id).copied().unwrap_or(0)
    }
}

/// How many cards reference each taxonomy row, regardless of visibility.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageCounts {
    pub by_chapter: HashMap<Uuid, usize>,
    pub uncategorised: usize,
    pub by_topic: HashMap<Uuid, usize>,
    pub by_tag: HashMap<Uuid, usize>,
}

impl UsageCounts {
    pub fn get(&self, kind: TaxonomyKind, id: Uuid) -> usize {
        let map = match kind {
            TaxonomyKind::Chapter => &self.by_chapter,
            TaxonomyKind::Topic => &self.by_topic,
            TaxonomyKind::Tag => &self.by_tag,
        };
        map.get(&id).copied().unwrap_or(0)
    }
}
