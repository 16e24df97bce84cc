//! Environment-driven configuration.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `DATABASE_URL` | `postgres://localhost/deckscope` | Backend database |
//! | `DECKSCOPE_CACHE_DIR` | `.deckscope` | Directory of the anonymous grade cache |
//! | `DECKSCOPE_USER_ID` | unset (anonymous) | Authenticated learner id |
//! | `DECKSCOPE_USER_EMAIL` | unset | Email shown for the learner |
//! | `DECKSCOPE_DB_MAX_CONNECTIONS` | `5` | Pool size |

use std::path::PathBuf;
use uuid::Uuid;

use deckscope_core::defaults::{DATABASE_URL, DB_MAX_CONNECTIONS, LOCAL_CACHE_DIR};
use deckscope_core::{Error, Identity, Result};
use deckscope_db::PoolConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyConfig {
    pub database_url: String,
    pub cache_dir: PathBuf,
    /// `None` means anonymous.
    pub identity: Option<Identity>,
    pub max_connections: u32,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            database_url: DATABASE_URL.to_string(),
            cache_dir: PathBuf::from(LOCAL_CACHE_DIR),
            identity: None,
            max_connections: DB_MAX_CONNECTIONS,
        }
    }
}

impl StudyConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which returns a variable's value if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get("DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(dir) = get("DECKSCOPE_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Some(raw) = get("DECKSCOPE_DB_MAX_CONNECTIONS") {
            config.max_connections = raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    Error::Config(format!(
                        "DECKSCOPE_DB_MAX_CONNECTIONS must be a positive integer, got '{}'",
                        raw
                    ))
                })?;
        }
        if let Some(raw) = get("DECKSCOPE_USER_ID") {
            let user_id = Uuid::parse_str(raw.trim()).map_err(|e| {
                Error::Config(format!("DECKSCOPE_USER_ID is not a UUID: {}", e))
            })?;
            config.identity = Some(Identity::new(user_id, get("DECKSCOPE_USER_EMAIL")));
        }

        Ok(config)
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::new().max_connections(self.max_connections)
    }
}
