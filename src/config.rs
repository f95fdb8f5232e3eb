//! Configuration loaded from environment variables.
//!
//! | Variable | Default | Used by |
//! |----------|---------|---------|
//! | `NOTEBOX_DB_PATH` | platform data dir / `notebox.db` | server |
//! | `NOTEBOX_CORS_ORIGINS` | permissive | server |
//! | `NOTEBOX_URL` | `http://localhost:3000/api/v1` | client |
//! | `NOTEBOX_SESSION` | none | client |
//! | `NOTEBOX_OWNER` | none | client |
//! | `NOTEBOX_DEBOUNCE_MS` | `500` | client |

use std::path::PathBuf;
use std::time::Duration;

use crate::models::OwnerId;

/// Default URL for local development.
pub const DEFAULT_URL: &str = "http://localhost:3000/api/v1";

/// Quiet period before a burst of edits is written to the server.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Clone, Debug, Default)]
pub struct ServerConfig {
    /// SQLite file; `None` means the platform default location.
    pub db_path: Option<PathBuf>,
    /// Allowed CORS origins; `None` means permissive.
    pub cors_origins: Option<Vec<String>>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let db_path = std::env::var("NOTEBOX_DB_PATH").ok().map(PathBuf::from);

        let cors_origins = std::env::var("NOTEBOX_CORS_ORIGINS").ok().map(|s| {
            s.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        Self {
            db_path,
            cors_origins,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    /// Bearer session token issued by the identity provider.
    pub session: Option<String>,
    /// Owner the client acts as. Mutations are refused without one.
    pub owner: Option<OwnerId>,
    pub debounce: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_URL.to_string(),
            session: None,
            owner: None,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let base_url = std::env::var("NOTEBOX_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
        let session = std::env::var("NOTEBOX_SESSION").ok();
        let owner = std::env::var("NOTEBOX_OWNER").ok().map(OwnerId::from);

        let debounce = std::env::var("NOTEBOX_DEBOUNCE_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DEBOUNCE);

        Self {
            base_url,
            session,
            owner,
            debounce,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_URL);
        assert!(config.owner.is_none());
        assert_eq!(config.debounce, Duration::from_millis(500));
    }
}
