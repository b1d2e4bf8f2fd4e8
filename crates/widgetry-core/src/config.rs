//! Framework configuration.
//!
//! Loaded once at startup from a TOML file; the widget-class list feeds the
//! registry and can be re-applied through a registry reload.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{WidgetError, WidgetResult};
use crate::registry;
use crate::runtime::UserRecord;

/// Default feed fetch timeout in milliseconds.
const DEFAULT_FEED_TIMEOUT_MS: u64 = 5000;

/// Top-level configuration for the widget framework.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetryConfig {
    /// Path of the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Identifiers of the widget classes made available. Add a new class
    /// here to enable it.
    #[serde(default = "registry::default_identifiers")]
    pub widget_classes: Vec<String>,

    /// Bound on external feed fetches, in milliseconds.
    #[serde(default = "default_feed_timeout_ms")]
    pub feed_timeout_ms: u64,

    /// Optional JSON file with the known user identities. Identity storage
    /// itself belongs to the embedding application.
    #[serde(default)]
    pub users_file: Option<PathBuf>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("widgetry.db")
}

fn default_feed_timeout_ms() -> u64 {
    DEFAULT_FEED_TIMEOUT_MS
}

impl Default for WidgetryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            widget_classes: registry::default_identifiers(),
            feed_timeout_ms: DEFAULT_FEED_TIMEOUT_MS,
            users_file: None,
        }
    }
}

impl WidgetryConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> WidgetResult<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        toml::from_str(&text).map_err(|e| {
            WidgetError::configuration(format!(
                "failed to parse {}: {e}",
                path.as_ref().display()
            ))
        })
    }

    /// Load the user identities from `users_file`, or none when unset.
    pub fn load_users(&self) -> WidgetResult<Vec<UserRecord>> {
        let Some(path) = &self.users_file else {
            return Ok(Vec::new());
        };
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            WidgetError::configuration(format!("failed to parse {}: {e}", path.display()))
        })
    }
}
