//! # Runtime Configuration
//!
//! Settings shared by an [`EntitySystem`](crate::lifecycle::EntitySystem).
//! Defaults work out of the box; `from_env` lets a deployment override them
//! without a config file.
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `ENTITY_ASK_TIMEOUT_MS` | [`ask_timeout_ms`](RuntimeConfig::ask_timeout_ms) | `5000` |
//! | `RUST_LOG` | [`log_filter`](RuntimeConfig::log_filter) | `info` |

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

pub const ASK_TIMEOUT_ENV: &str = "ENTITY_ASK_TIMEOUT_MS";
pub const LOG_FILTER_ENV: &str = "RUST_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound for requests made through the system's `ask` helper.
    pub ask_timeout_ms: u64,
    /// `tracing_subscriber::EnvFilter` directive.
    pub log_filter: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            ask_timeout_ms: 5_000,
            log_filter: "info".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by the environment.
    ///
    /// An unparsable timeout is logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(ASK_TIMEOUT_ENV) {
            match raw.trim().parse() {
                Ok(ms) => config.ask_timeout_ms = ms,
                Err(e) => warn!(variable = ASK_TIMEOUT_ENV, value = %raw, error = %e, "Ignoring invalid timeout"),
            }
        }
        if let Some(filter) = lookup(LOG_FILTER_ENV).filter(|f| !f.trim().is_empty()) {
            config.log_filter = filter;
        }
        config
    }

    pub fn ask_timeout(&self) -> Duration {
        Duration::from_millis(self.ask_timeout_ms)
    }
}
