//! Error types for deckscope.

use thiserror::Error;
use uuid::Uuid;

use crate::models::LinkKind;

/// Result type alias using deckscope's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for deckscope operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Card not found
    #[error("Card not found: {0}")]
    CardNotFound(Uuid),

    /// A uniqueness rule was violated (e.g. duplicate taxonomy name)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The backend rejected or failed a request
    #[error("Remote error: {0}")]
    Remote(String),

    /// Replace-links removed the old join rows but could not insert the new ones.
    /// The card is left with no links of this kind until the caller retries.
    #[error("Links cleared for card {card_id} ({kind}) but re-insert failed: {reason}")]
    LinksCleared {
        card_id: Uuid,
        kind: LinkKind,
        reason: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation requires an authenticated identity
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("chapter 'Sleep'".to_string());
        assert_eq!(err.to_string(), "Not found: chapter 'Sleep'");
    }

    #[test]
    fn test_error_display_card_not_found() {
        let id = Uuid::nil();
        let err = Error::CardNotFound(id);
        assert_eq!(err.to_string(), format!("Card not found: {}", id));
    }

    #[test]
    fn test_error_display_conflict() {
        let err = Error::Conflict("tag 'Definition' already exists".to_string());
        assert_eq!(err.to_string(), "Conflict: tag 'Definition' already exists");
    }

    #[test]
    fn test_error_display_links_cleared() {
        let id = Uuid::nil();
        let err = Error::LinksCleared {
            card_id: id,
            kind: LinkKind::Tag,
            reason: "connection reset".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains(&id.to_string()));
        assert!(msg.contains("tag"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_error_display_unauthorized() {
        let err = Error::Unauthorized("editor action".to_string());
        assert_eq!(err.to_string(), "Unauthorized: editor action");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
