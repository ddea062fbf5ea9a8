//! Lifecycle event configuration.
//!
//! The only recognized option selects the dispatcher kind channels are
//! created with when a model does not declare its own:
//!
//! ```
//! use orbit_model::config::EventsConfig;
//!
//! let config = EventsConfig::from_json_str(r#"{ "dispatcher": "traceable" }"#).unwrap();
//! assert_eq!(config.dispatcher, "traceable");
//!
//! let defaults = EventsConfig::from_json_str("{}").unwrap();
//! assert_eq!(defaults.dispatcher, "event_dispatcher");
//! ```

use orbit_events::EventDispatcher;
use serde::{Deserialize, Serialize};

/// Lifecycle event settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventsConfig {
    /// Kind of dispatcher built for models without a declared kind.
    pub dispatcher: String,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            dispatcher: EventDispatcher::KIND.to_owned(),
        }
    }
}

impl EventsConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default dispatcher kind.
    #[must_use]
    pub fn with_dispatcher(mut self, kind: impl Into<String>) -> Self {
        self.dispatcher = kind.into();
        self
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Errors raised while loading or applying configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configured dispatcher kind has no registered constructor.
    #[error("unknown dispatcher kind '{kind}' (registered: {})", .registered.join(", "))]
    UnknownDispatcher {
        /// The requested kind.
        kind: String,
        /// Kinds the factory knows about.
        registered: Vec<String>,
    },

    /// The configuration document could not be parsed.
    #[error("invalid events configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
