//! Review scope: the mutable filter over chapter, topic, difficulty and stars.
//!
//! [`in_scope`] is the single predicate used both to build the review pool
//! and, with dimensions dropped, to compute the per-bucket counts shown next
//! to each filter choice.
//!
//! # Example
//!
//! ```
//! use deckscope_core::{ChapterScope, GradeBucket, ScopePatch, ScopeState};
//!
//! let mut scope = ScopeState::default();
//! scope.apply(ScopePatch {
//!     chapter: Some(ChapterScope::Uncategorised),
//!     diff: Some(Some(GradeBucket::Hard)),
//!     ..Default::default()
//! });
//! assert!(scope.is_restricted());
//!
//! let scope = ScopeState::mix();
//! assert!(!scope.is_restricted());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::defaults::{NO_TOPICS, UNCATEGORISED, UNCATEGORISED_LEGACY};
use crate::error::Error;
use crate::models::{Card, GradeBucket};
use crate::visibility::visible;

// =============================================================================
// DIMENSIONS
// =============================================================================

/// Chapter dimension of the scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Option<String>", into = "Option<String>")]
pub enum ChapterScope {
    /// No restriction.
    #[default]
    Any,
    /// Only cards without a chapter.
    Uncategorised,
    Chapter(Uuid),
}

impl ChapterScope {
    pub fn matches(&self, card: &Card) -> bool {
        match self {
            ChapterScope::Any => true,
            ChapterScope::Uncategorised => card.chapter_id.is_none(),
            ChapterScope::Chapter(id) => card.chapter_id == Some(*id),
        }
    }
}

impl FromStr for ChapterScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Ok(ChapterScope::Any),
            UNCATEGORISED | UNCATEGORISED_LEGACY => Ok(ChapterScope::Uncategorised),
            other => Uuid::parse_str(other)
                .map(ChapterScope::Chapter)
                .map_err(|_| Error::InvalidInput(format!("invalid chapter scope '{}'", other))),
        }
    }
}

impl fmt::Display for ChapterScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChapterScope::Any => Ok(()),
            ChapterScope::Uncategorised => f.write_str(UNCATEGORISED),
            ChapterScope::Chapter(id) => write!(f, "{}", id),
        }
    }
}

impl TryFrom<Option<String>> for ChapterScope {
    type Error = Error;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        value.as_deref().map_or(Ok(ChapterScope::Any), str::parse)
    }
}

impl From<ChapterScope> for Option<String> {
    fn from(scope: ChapterScope) -> Self {
        match scope {
            ChapterScope::Any => None,
            other => Some(other.to_string()),
        }
    }
}

/// Topic dimension of the scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Option<String>", into = "Option<String>")]
pub enum TopicScope {
    /// No restriction.
    #[default]
    Any,
    /// Only cards with zero topic links.
    NoTopics,
    Topic(Uuid),
}

impl TopicScope {
    pub fn matches(&self, card: &Card) -> bool {
        match self {
            TopicScope::Any => true,
            TopicScope::NoTopics => card.topics.is_empty(),
            TopicScope::Topic(id) => card.has_topic(*id),
        }
    }
}

impl FromStr for TopicScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Ok(TopicScope::Any),
            NO_TOPICS => Ok(TopicScope::NoTopics),
            other => Uuid::parse_str(other)
                .map(TopicScope::Topic)
                .map_err(|_| Error::InvalidInput(format!("invalid topic scope '{}'", other))),
        }
    }
}

impl fmt::Display for TopicScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicScope::Any => Ok(()),
            TopicScope::NoTopics => f.write_str(NO_TOPICS),
            TopicScope::Topic(id) => write!(f, "{}", id),
        }
    }
}

impl TryFrom<Option<String>> for TopicScope {
    type Error = Error;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        value.as_deref().map_or(Ok(TopicScope::Any), str::parse)
    }
}

impl From<TopicScope> for Option<String> {
    fn from(scope: TopicScope) -> Self {
        match scope {
            TopicScope::Any => None,
            other => Some(other.to_string()),
        }
    }
}

// =============================================================================
// SCOPE STATE
// =============================================================================

/// The active review filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScopeState {
    pub chapter: ChapterScope,
    pub topic: TopicScope,
    /// `None` means any difficulty.
    pub diff: Option<GradeBucket>,
    /// Only starred cards when true.
    pub starred: bool,
    /// Set by [`ScopeState::mix`]; cleared as soon as a chapter or topic is chosen.
    #[serde(default)]
    pub mixed: bool,
}

/// Partial scope update. `None` leaves a dimension unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopePatch {
    pub chapter: Option<ChapterScope>,
    pub topic: Option<TopicScope>,
    /// `Some(None)` clears the difficulty filter.
    pub diff: Option<Option<GradeBucket>>,
    pub starred: Option<bool>,
}

impl ScopeState {
    /// The "mix" reset: every dimension cleared.
    pub fn mix() -> Self {
        Self {
            mixed: true,
            ..Self::default()
        }
    }

    pub fn apply(&mut self, patch: ScopePatch) {
        if let Some(chapter) = patch.chapter {
            self.chapter = chapter;
            self.mixed = false;
        }
        if let Some(topic) = patch.topic {
            self.topic = topic;
            self.mixed = false;
        }
        if let Some(diff) = patch.diff {
            self.diff = diff;
        }
        if let Some(starred) = patch.starred {
            self.starred = starred;
        }
    }

    /// Select a difficulty bucket, or clear it if it is already selected.
    pub fn toggle_diff(&mut self, bucket: GradeBucket) {
        self.diff = if self.diff == Some(bucket) {
            None
        } else {
            Some(bucket)
        };
    }

    /// True if any dimension restricts the pool.
    pub fn is_restricted(&self) -> bool {
        self.chapter != ChapterScope::Any
            || self.topic != TopicScope::Any
            || self.diff.is_some()
            || self.starred
    }

    fn diff_matches(&self, card: &Card) -> bool {
        self.diff.map_or(true, |d| card.grade_bucket() == d)
    }

    fn starred_matches(&self, card: &Card) -> bool {
        !self.starred || card.user_starred
    }
}

// =============================================================================
// PREDICATES
// =============================================================================

/// Visibility plus chapter and topic: the base set that counts are taken over.
pub fn in_base_scope(card: &Card, scope: &ScopeState, is_authenticated: bool) -> bool {
    visible(card, is_authenticated) && scope.chapter.matches(card) && scope.topic.matches(card)
}

/// Whether a card belongs to the review pool under `scope`.
pub fn in_scope(card: &Card, scope: &ScopeState, is_authenticated: bool) -> bool {
    in_base_scope(card, scope, is_authenticated)
        && scope.diff_matches(card)
        && scope.starred_matches(card)
}

// =============================================================================
// COUNTS
// =============================================================================

/// How many cards each difficulty chip (and the star chip) would select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScopeCounts {
    pub again: usize,
    pub hard: usize,
    pub good: usize,
    pub easy: usize,
    pub ungraded: usize,
    pub starred: usize,
}

impl ScopeCounts {
    pub fn get(&self, bucket: GradeBucket) -> usize {
        match bucket {
            GradeBucket::Again => self.again,
            GradeBucket::Hard => self.hard,
            GradeBucket::Good => self.good,
            GradeBucket::Easy => self.easy,
            GradeBucket::Ungraded => self.ungraded,
        }
    }

    fn bump(&mut self, bucket: GradeBucket) {
        match bucket {
            GradeBucket::Again => self.again += 1,
            GradeBucket::Hard => self.hard += 1,
            GradeBucket::Good => self.good += 1,
            GradeBucket::Easy => self.easy += 1,
            GradeBucket::Ungraded => self.ungraded += 1,
        }
    }

    /// Sum of the five grade buckets (each base-set card lands in exactly one).
    pub fn total(&self) -> usize {
        self.again + self.hard + self.good + self.easy + self.ungraded
    }
}

/// Histogram over the base set (visibility, chapter, topic), ignoring the
/// difficulty and starred dimensions, plus the starred tally over the same set.
pub fn counts<'a, I>(cards: I, scope: &ScopeState, is_authenticated: bool) -> ScopeCounts
where
    I: IntoIterator<Item = &'a Card>,
{
    let mut out = ScopeCounts::default();
    for card in cards
        .into_iter()
        .filter(|c| in_base_scope(c, scope, is_authenticated))
    {
        out.bump(card.grade_bucket());
        if card.user_starred {
            out.starred += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CardStatus, CardVisibility, Grade};
    use crate::test_fixtures::CardBuilder;

    #[test]
    fn test_chapter_scope_parse() {
        let id = Uuid::new_v4();
        assert_eq!("".parse::<ChapterScope>().unwrap(), ChapterScope::Any);
        assert_eq!(
            "__uncategorised__".parse::<ChapterScope>().unwrap(),
            ChapterScope::Uncategorised
        );
        assert_eq!(
            "__null__".parse::<ChapterScope>().unwrap(),
            ChapterScope::Uncategorised
        );
        assert_eq!(
            id.to_string().parse::<ChapterScope>().unwrap(),
            ChapterScope::Chapter(id)
        );
        assert!("chapter-one".parse::<ChapterScope>().is_err());
    }

    #[test]
    fn test_topic_scope_serde_roundtrip_values() {
        let json = serde_json::to_value(TopicScope::NoTopics).unwrap();
        assert_eq!(json, serde_json::json!("__none__"));
        let any: TopicScope = serde_json::from_value(serde_json::Value::Null).unwrap();
        assert_eq!(any, TopicScope::Any);
    }

    #[test]
    fn test_chapter_match() {
        let ch = Uuid::new_v4();
        let in_chapter = CardBuilder::public().chapter(ch).build();
        let uncategorised = CardBuilder::public().build();

        assert!(ChapterScope::Any.matches(&in_chapter));
        assert!(ChapterScope::Chapter(ch).matches(&in_chapter));
        assert!(!ChapterScope::Chapter(ch).matches(&uncategorised));
        assert!(ChapterScope::Uncategorised.matches(&uncategorised));
        assert!(!ChapterScope::Uncategorised.matches(&in_chapter));
    }

    #[test]
    fn test_topic_match() {
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();
        let linked = CardBuilder::public().topic(t1, "Sleep").topic(t2, "Memory").build();
        let bare = CardBuilder::public().build();

        assert!(TopicScope::Topic(t2).matches(&linked));
        assert!(!TopicScope::Topic(Uuid::new_v4()).matches(&linked));
        assert!(TopicScope::NoTopics.matches(&bare));
        assert!(!TopicScope::NoTopics.matches(&linked));
    }

    #[test]
    fn test_diff_match_treats_missing_grade_as_ungraded() {
        let mut scope = ScopeState::default();
        let graded = CardBuilder::public().grade(Grade::Hard).build();
        let ungraded = CardBuilder::public().build();

        scope.diff = Some(GradeBucket::Hard);
        assert!(in_scope(&graded, &scope, false));
        assert!(!in_scope(&ungraded, &scope, false));

        scope.diff = Some(GradeBucket::Ungraded);
        assert!(!in_scope(&graded, &scope, false));
        assert!(in_scope(&ungraded, &scope, false));
    }

    #[test]
    fn test_in_scope_implies_visible_and_starred() {
        let scope = ScopeState {
            starred: true,
            ..Default::default()
        };
        let cards = vec![
            CardBuilder::public().starred().build(),
            CardBuilder::public().build(),
            CardBuilder::new()
                .status(CardStatus::Draft)
                .visibility(CardVisibility::Public)
                .starred()
                .build(),
        ];
        for auth in [false, true] {
            for card in &cards {
                if in_scope(card, &scope, auth) {
                    assert!(visible(card, auth));
                    assert!(card.user_starred);
                }
            }
        }
        assert_eq!(cards.iter().filter(|c| in_scope(c, &scope, false)).count(), 1);
        assert_eq!(cards.iter().filter(|c| in_scope(c, &scope, true)).count(), 2);
    }

    #[test]
    fn test_apply_patch_and_mix() {
        let mut scope = ScopeState::mix();
        assert!(scope.mixed);

        scope.apply(ScopePatch {
            topic: Some(TopicScope::NoTopics),
            starred: Some(true),
            ..Default::default()
        });
        assert!(!scope.mixed);
        assert_eq!(scope.topic, TopicScope::NoTopics);
        assert!(scope.starred);

        scope.apply(ScopePatch {
            diff: Some(Some(GradeBucket::Easy)),
            ..Default::default()
        });
        assert_eq!(scope.diff, Some(GradeBucket::Easy));
        assert_eq!(scope.topic, TopicScope::NoTopics);

        scope = ScopeState::mix();
        assert_eq!(scope.topic, TopicScope::Any);
        assert_eq!(scope.diff, None);
        assert!(!scope.starred);
    }

    #[test]
    fn test_toggle_diff() {
        let mut scope = ScopeState::default();
        scope.toggle_diff(GradeBucket::Good);
        assert_eq!(scope.diff, Some(GradeBucket::Good));
        scope.toggle_diff(GradeBucket::Again);
        assert_eq!(scope.diff, Some(GradeBucket::Again));
        scope.toggle_diff(GradeBucket::Again);
        assert_eq!(scope.diff, None);
    }

    #[test]
    fn test_counts_ignore_diff_and_starred() {
        let ch = Uuid::new_v4();
        let cards = vec![
            CardBuilder::public().chapter(ch).grade(Grade::Again).build(),
            CardBuilder::public().chapter(ch).grade(Grade::Again).starred().build(),
            CardBuilder::public().chapter(ch).grade(Grade::Easy).build(),
            CardBuilder::public().chapter(ch).starred().build(),
            // Other chapter: excluded from the base set.
            CardBuilder::public().grade(Grade::Hard).build(),
            // Hidden from anonymous viewers.
            CardBuilder::new().chapter(ch).grade(Grade::Good).build(),
        ];
        let scope = ScopeState {
            chapter: ChapterScope::Chapter(ch),
            diff: Some(GradeBucket::Easy),
            starred: true,
            ..Default::default()
        };

        let c = counts(&cards, &scope, false);
        assert_eq!(c.again, 2);
        assert_eq!(c.hard, 0);
        assert_eq!(c.good, 0);
        assert_eq!(c.easy, 1);
        assert_eq!(c.ungraded, 1);
        assert_eq!(c.starred, 2);
        assert_eq!(c.total(), 4);
        assert_eq!(c.get(GradeBucket::Again), 2);

        let authed = counts(&cards, &scope, true);
        assert_eq!(authed.good, 1);
    }
}
