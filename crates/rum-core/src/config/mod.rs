//! Sync engine configuration.
//!
//! `SyncSettings` is read from an optional JSON file where every field has
//! a default, then selected values may be overridden from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::Category;
use crate::util::{is_http_url, normalize_text_option};

pub const ENV_NODE_URL: &str = "RUM_NODE_URL";
pub const ENV_NODE_JWT: &str = "RUM_NODE_JWT";
pub const ENV_DB_PATH: &str = "RUM_DB_PATH";

const DEFAULT_PAGE_SIZE: usize = 20;
const DEFAULT_BACKGROUND_EVERY: u32 = 5;
const DEFAULT_RETRY_CEILING: u32 = 10;

/// Poll interval per category, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PollIntervals {
    pub content_ms: u64,
    pub pub_queue_ms: u64,
    pub producers_ms: u64,
    pub transfers_ms: u64,
    pub groups_ms: u64,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            content_ms: 1_000,
            pub_queue_ms: 5_000,
            producers_ms: 60_000,
            transfers_ms: 10_000,
            groups_ms: 10_000,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSettings {
    pub node_url: Option<String>,
    pub jwt: Option<String>,
    pub db_path: Option<PathBuf>,
    /// Items requested per content page
    pub page_size: usize,
    pub intervals: PollIntervals,
    /// Background groups are polled on every Nth tick
    pub background_every: u32,
    /// Pub queue failures above this retry count are dropped
    pub retry_ceiling: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            node_url: None,
            jwt: None,
            db_path: None,
            page_size: DEFAULT_PAGE_SIZE,
            intervals: PollIntervals::default(),
            background_every: DEFAULT_BACKGROUND_EVERY,
            retry_ceiling: DEFAULT_RETRY_CEILING,
        }
    }
}

impl std::fmt::Debug for SyncSettings {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncSettings")
            .field("node_url", &self.node_url)
            .field("jwt", &self.jwt.as_ref().map(|_| "[REDACTED]"))
            .field("db_path", &self.db_path)
            .field("page_size", &self.page_size)
            .field("intervals", &self.intervals)
            .field("background_every", &self.background_every)
            .field("retry_ceiling", &self.retry_ceiling)
            .finish()
    }
}

impl SyncSettings {
    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload)
            .map_err(|error| Error::Config(format!("invalid settings JSON: {error}")))
    }

    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let payload = std::fs::read_to_string(path)?;
        Self::from_json(&payload)
    }

    /// Apply `RUM_NODE_URL`, `RUM_NODE_JWT` and `RUM_DB_PATH` from the
    /// process environment
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = normalize_text_option(lookup(ENV_NODE_URL)) {
            self.node_url = Some(url);
        }
        if let Some(jwt) = normalize_text_option(lookup(ENV_NODE_JWT)) {
            self.jwt = Some(jwt);
        }
        if let Some(path) = normalize_text_option(lookup(ENV_DB_PATH)) {
            self.db_path = Some(PathBuf::from(path));
        }
        self
    }

    /// Check ranges and normalize the node URL
    pub fn validated(mut self) -> Result<Self> {
        self.node_url = match normalize_text_option(self.node_url.take()) {
            Some(url) if is_http_url(&url) => Some(url.trim_end_matches('/').to_string()),
            Some(_) => {
                return Err(Error::Config(
                    "node_url must include http:// or https://".to_string(),
                ))
            }
            None => None,
        };
        self.jwt = normalize_text_option(self.jwt.take());
        if self.page_size == 0 {
            return Err(Error::Config("page_size must be positive".to_string()));
        }
        if self.background_every == 0 {
            return Err(Error::Config("background_every must be positive".to_string()));
        }
        Ok(self)
    }

    /// Node URL, required to run the engine or submit content
    pub fn require_node_url(&self) -> Result<&str> {
        self.node_url.as_deref().ok_or_else(|| {
            Error::Config(format!("node url is not configured (set {ENV_NODE_URL})"))
        })
    }

    pub const fn interval(&self, category: Category) -> Duration {
        let millis = match category {
            Category::Content => self.intervals.content_ms,
            Category::PubQueue => self.intervals.pub_queue_ms,
            Category::Producers => self.intervals.producers_ms,
            Category::Transfers => self.intervals.transfers_ms,
            Category::Groups => self.intervals.groups_ms,
        };
        Duration::from_millis(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_json_uses_defaults() {
        let settings = SyncSettings::from_json("{}").unwrap();
        assert_eq!(settings, SyncSettings::default());
        assert_eq!(settings.page_size, 20);
        assert_eq!(settings.retry_ceiling, 10);
        assert_eq!(
            settings.interval(Category::Producers),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn partial_intervals_keep_other_defaults() {
        let settings =
            SyncSettings::from_json(r#"{"intervals":{"content_ms":250},"page_size":5}"#).unwrap();
        assert_eq!(settings.interval(Category::Content), Duration::from_millis(250));
        assert_eq!(settings.interval(Category::PubQueue), Duration::from_secs(5));
        assert_eq!(settings.page_size, 5);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let error = SyncSettings::from_json(r#"{"node":"x"}"#).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_NODE_URL, " http://127.0.0.1:8002/ "),
            (ENV_NODE_JWT, "   "),
            (ENV_DB_PATH, "/tmp/rum.db"),
        ]);
        let settings = SyncSettings {
            node_url: Some("http://old".to_string()),
            jwt: Some("file-token".to_string()),
            ..SyncSettings::default()
        }
        .with_overrides(|key| env.get(key).map(ToString::to_string))
        .validated()
        .unwrap();

        assert_eq!(settings.node_url.as_deref(), Some("http://127.0.0.1:8002"));
        assert_eq!(settings.jwt.as_deref(), Some("file-token"));
        assert_eq!(settings.db_path, Some(PathBuf::from("/tmp/rum.db")));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let bad_url = SyncSettings {
            node_url: Some("127.0.0.1:8002".to_string()),
            ..SyncSettings::default()
        };
        assert!(bad_url.validated().is_err());

        let zero_page = SyncSettings {
            page_size: 0,
            ..SyncSettings::default()
        };
        assert!(zero_page.validated().is_err());
        assert!(SyncSettings::default().require_node_url().is_err());
    }

    #[test]
    fn debug_redacts_jwt() {
        let settings = SyncSettings {
            jwt: Some("secret".to_string()),
            ..SyncSettings::default()
        };
        let debug = format!("{settings:?}");
        assert!(!debug.contains("secret"));
    }
}
