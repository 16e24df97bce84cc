//! Structured logging field name constants for deckscope.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded state, requires operator attention |
//! | WARN  | Recoverable issue, fallback applied (failed grade upsert, cache write) |
//! | INFO  | Lifecycle events (reload, login drain), operation completions |
//! | DEBUG | Decision points, intermediate values |
//! | TRACE | Per-item iteration (cards, links) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "core", "db", "study", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "ledger", "reconciler", "controller", "pool", "local_cache"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "grade", "drain", "ensure_by_name", "replace_links"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Card UUID being operated on.
pub const CARD_ID: &str = "card_id";

/// Authenticated user UUID.
pub const USER_ID: &str = "user_id";

/// Taxonomy or link kind ("chapter", "topic", "tag").
pub const KIND: &str = "kind";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows/cards returned or affected.
pub const RESULT_COUNT: &str = "result_count";

/// Number of cards in the review pool.
pub const POOL_SIZE: &str = "pool_size";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
