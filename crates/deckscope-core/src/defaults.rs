//! Centralized default constants for deckscope.
//!
//! Shared values live here so crates do not define their own magic strings.

// =============================================================================
// SCOPE SENTINELS
// =============================================================================

/// Chapter scope value selecting cards with no chapter.
pub const UNCATEGORISED: &str = "__uncategorised__";

/// Older spelling of [`UNCATEGORISED`], still accepted when parsing.
pub const UNCATEGORISED_LEGACY: &str = "__null__";

/// Topic scope value selecting cards with no topic links.
pub const NO_TOPICS: &str = "__none__";

// =============================================================================
// DISPLAY
// =============================================================================

/// Label for cards without a chapter.
pub const UNCATEGORISED_LABEL: &str = "(Uncategorised)";

/// Label for cards without topics.
pub const NO_TOPICS_LABEL: &str = "(No Topics)";

/// Maximum characters of notes shown in a preview.
pub const NOTES_PREVIEW_LENGTH: usize = 180;

// =============================================================================
// LOCAL CACHE
// =============================================================================

/// Storage key of the anonymous grade cache.
pub const LOCAL_GRADES_KEY: &str = "deckscope.grades.v1";

/// Directory name used for the local cache when none is configured.
pub const LOCAL_CACHE_DIR: &str = ".deckscope";

// =============================================================================
// EVENTS
// =============================================================================

/// Identity event bus capacity. Login/logout are rare; a small buffer suffices.
pub const IDENTITY_BUS_CAPACITY: usize = 16;

// =============================================================================
// DATABASE
// =============================================================================

/// Default database URL when DATABASE_URL is not set.
pub const DATABASE_URL: &str = "postgres://localhost/deckscope";

/// Default maximum number of pooled connections.
pub const DB_MAX_CONNECTIONS: u32 = 5;
