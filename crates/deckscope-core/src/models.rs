//! Core data models for deckscope.
//!
//! These types are shared across all deckscope crates and represent
//! the flashcard domain: cards, their taxonomy links, and learner grades.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::defaults::{NOTES_PREVIEW_LENGTH, NO_TOPICS_LABEL};
use crate::error::Error;

// =============================================================================
// GRADES
// =============================================================================

/// A learner's self-reported recall quality for a card.
///
/// Absence of a grade means "ungraded"; see [`GradeBucket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Again,
    Hard,
    Good,
    Easy,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Again => "again",
            Grade::Hard => "hard",
            Grade::Good => "good",
            Grade::Easy => "easy",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "again" => Ok(Grade::Again),
            "hard" => Ok(Grade::Hard),
            "good" => Ok(Grade::Good),
            "easy" => Ok(Grade::Easy),
            other => Err(Error::InvalidInput(format!("unknown grade '{}'", other))),
        }
    }
}

/// A difficulty bucket: one of the four grades, or "ungraded".
///
/// This is the value space of the difficulty filter and of the count histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeBucket {
    Again,
    Hard,
    Good,
    Easy,
    Ungraded,
}

impl GradeBucket {
    /// Bucket for an optional grade (`None` is ungraded).
    pub fn of(grade: Option<Grade>) -> Self {
        match grade {
            Some(Grade::Again) => GradeBucket::Again,
            Some(Grade::Hard) => GradeBucket::Hard,
            Some(Grade::Good) => GradeBucket::Good,
            Some(Grade::Easy) => GradeBucket::Easy,
            None => GradeBucket::Ungraded,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GradeBucket::Again => "again",
            GradeBucket::Hard => "hard",
            GradeBucket::Good => "good",
            GradeBucket::Easy => "easy",
            GradeBucket::Ungraded => "ungraded",
        }
    }
}

impl From<Grade> for GradeBucket {
    fn from(grade: Grade) -> Self {
        GradeBucket::of(Some(grade))
    }
}

impl fmt::Display for GradeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GradeBucket {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("ungraded") {
            return Ok(GradeBucket::Ungraded);
        }
        s.parse::<Grade>().map(GradeBucket::from)
    }
}

// =============================================================================
// CARD STATE
// =============================================================================

/// Publication state of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    #[default]
    Draft,
    Published,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::Draft => "draft",
            CardStatus::Published => "published",
        }
    }
}

impl FromStr for CardStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CardStatus::Draft),
            "published" => Ok(CardStatus::Published),
            other => Err(Error::InvalidInput(format!("unknown card status '{}'", other))),
        }
    }
}

/// Audience of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardVisibility {
    Public,
    #[default]
    Private,
}

impl CardVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardVisibility::Public => "public",
            CardVisibility::Private => "private",
        }
    }
}

impl FromStr for CardVisibility {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(CardVisibility::Public),
            "private" => Ok(CardVisibility::Private),
            other => Err(Error::InvalidInput(format!(
                "unknown card visibility '{}'",
                other
            ))),
        }
    }
}

// =============================================================================
// CARD META
// =============================================================================

/// Kind of an attached resource. Unknown kinds are read as plain links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Image,
    Pdf,
    #[default]
    #[serde(other)]
    Link,
}

/// A resource attached to a card (image, PDF, or link).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type", default)]
    pub kind: ResourceKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Resource {
    /// Title to show, falling back to a kind-specific label.
    pub fn display_title(&self) -> &str {
        match (&self.title, self.kind) {
            (Some(t), _) if !t.is_empty() => t.as_str(),
            (_, ResourceKind::Image) => "Image",
            (_, ResourceKind::Pdf) => "PDF",
            (_, ResourceKind::Link) => self.url.as_str(),
        }
    }
}

/// Typed card metadata.
///
/// Known entries are modelled explicitly; anything else is kept in `extra`
/// and written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Source section label carried over from imports.
    #[serde(rename = "Section", default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Resource>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl CardMeta {
    /// Parse a stored JSON bag. `null` and malformed bags yield an empty meta.
    pub fn from_json(value: JsonValue) -> Self {
        if value.is_null() {
            return Self::default();
        }
        serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Malformed card meta, using empty meta");
            Self::default()
        })
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Object(Map::new()))
    }

    /// First [`NOTES_PREVIEW_LENGTH`] characters of the notes, with `…` when cut.
    pub fn notes_preview(&self) -> Option<String> {
        let notes = self.notes.as_deref().map(str::trim).filter(|n| !n.is_empty())?;
        if notes.chars().count() <= NOTES_PREVIEW_LENGTH {
            return Some(notes.to_string());
        }
        let mut preview: String = notes.chars().take(NOTES_PREVIEW_LENGTH).collect();
        preview.push('…');
        Some(preview)
    }

    /// Number of attachments shown to the learner (resources plus notes).
    pub fn attachment_count(&self) -> usize {
        self.resources.len() + usize::from(self.notes.as_deref().is_some_and(|n| !n.is_empty()))
    }
}

// =============================================================================
// CARDS
// =============================================================================

/// Link from a card to a topic, with the topic title denormalized for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicLink {
    pub topic_id: Uuid,
    pub title: Option<String>,
}

/// Link from a card to a tag, with the tag name denormalized for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagLink {
    pub tag_id: Uuid,
    pub name: Option<String>,
}

/// A flashcard as mirrored from the backend.
///
/// `user_grade` and `user_starred` are local fields: they are never written
/// back through the card row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub front: String,
    pub back: String,
    /// `None` means uncategorised.
    pub chapter_id: Option<Uuid>,
    #[serde(default)]
    pub topics: Vec<TopicLink>,
    #[serde(default)]
    pub tags: Vec<TagLink>,
    pub status: CardStatus,
    pub visibility: CardVisibility,
    #[serde(default)]
    pub author_suspended: bool,
    #[serde(default)]
    pub meta: CardMeta,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub user_grade: Option<Grade>,
    #[serde(skip)]
    pub user_starred: bool,
}

impl Card {
    pub fn has_topic(&self, topic_id: Uuid) -> bool {
        self.topics.iter().any(|t| t.topic_id == topic_id)
    }

    /// Non-empty topic titles, in link order.
    pub fn topic_titles(&self) -> Vec<&str> {
        self.topics
            .iter()
            .filter_map(|t| t.title.as_deref())
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Topic titles for display; `"(No Topics)"` alone when there are none.
    pub fn topic_labels(&self) -> Vec<&str> {
        let titles = self.topic_titles();
        if titles.is_empty() {
            vec![NO_TOPICS_LABEL]
        } else {
            titles
        }
    }

    /// Non-empty tag names, in link order.
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags
            .iter()
            .filter_map(|t| t.name.as_deref())
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub fn grade_bucket(&self) -> GradeBucket {
        GradeBucket::of(self.user_grade)
    }
}

/// Request for inserting a new card (import or editor insert).
///
/// Taxonomy is given by name; the reconciler resolves names to ids.
#[derive(Debug, Clone, Default)]
pub struct NewCard {
    pub front: String,
    pub back: String,
    pub chapter: Option<String>,
    pub topics: Vec<String>,
    pub tags: Vec<String>,
    pub status: CardStatus,
    pub visibility: CardVisibility,
    pub meta: CardMeta,
}

/// Card row as handed to the backend for insertion (taxonomy already resolved).
#[derive(Debug, Clone)]
pub struct CardRow {
    pub front: String,
    pub back: String,
    pub chapter_id: Option<Uuid>,
    pub status: CardStatus,
    pub visibility: CardVisibility,
    pub meta: CardMeta,
}

/// Partial update of a card row. `None` fields are left unchanged.
///
/// `chapter_id: Some(None)` detaches the card (uncategorised).
#[derive(Debug, Clone, Default)]
pub struct CardPatch {
    pub front: Option<String>,
    pub back: Option<String>,
    pub chapter_id: Option<Option<Uuid>>,
    pub status: Option<CardStatus>,
    pub visibility: Option<CardVisibility>,
    pub author_suspended: Option<bool>,
    pub meta: Option<CardMeta>,
}

impl CardPatch {
    pub fn is_empty(&self) -> bool {
        self.front.is_none()
            && self.back.is_none()
            && self.chapter_id.is_none()
            && self.status.is_none()
            && self.visibility.is_none()
            && self.author_suspended.is_none()
            && self.meta.is_none()
    }

    /// Apply this patch to an in-memory card.
    pub fn apply_to(&self, card: &mut Card) {
        if let Some(front) = &self.front {
            card.front = front.clone();
        }
        if let Some(back) = &self.back {
            card.back = back.clone();
        }
        if let Some(chapter_id) = self.chapter_id {
            card.chapter_id = chapter_id;
        }
        if let Some(status) = self.status {
            card.status = status;
        }
        if let Some(visibility) = self.visibility {
            card.visibility = visibility;
        }
        if let Some(suspended) = self.author_suspended {
            card.author_suspended = suspended;
        }
        if let Some(meta) = &self.meta {
            card.meta = meta.clone();
        }
    }
}

// =============================================================================
// TAXONOMY
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

/// The three taxonomy kinds. Names are unique within a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxonomyKind {
    Chapter,
    Topic,
    Tag,
}

impl TaxonomyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxonomyKind::Chapter => "chapter",
            TaxonomyKind::Topic => "topic",
            TaxonomyKind::Tag => "tag",
        }
    }
}

impl fmt::Display for TaxonomyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaxonomyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chapter" | "chapters" => Ok(TaxonomyKind::Chapter),
            "topic" | "topics" => Ok(TaxonomyKind::Topic),
            "tag" | "tags" => Ok(TaxonomyKind::Tag),
            other => Err(Error::InvalidInput(format!(
                "unknown taxonomy kind '{}'",
                other
            ))),
        }
    }
}

/// The many-to-many joins a card participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Topic,
    Tag,
}

impl LinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkKind::Topic => "topic",
            LinkKind::Tag => "tag",
        }
    }

    pub fn taxonomy(&self) -> TaxonomyKind {
        match self {
            LinkKind::Topic => TaxonomyKind::Topic,
            LinkKind::Tag => TaxonomyKind::Tag,
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// IDENTITY
// =============================================================================

/// An authenticated viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Identity {
    pub fn new(user_id: Uuid, email: Option<String>) -> Self {
        Self { user_id, email }
    }
}
