//! Layered gateway configuration
//!
//! Defaults, then an optional `venue.toml`, then environment overrides
//! with the `VENUE_` prefix (nested fields via `__`, e.g.
//! `VENUE_ENGINE__QCSM_DEADLINE_SECS=30`).

use config::{Config, Environment, File};
use serde::Deserialize;

use types::config::EngineConfig;

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_journal_path() -> String {
    "data/venue.journal".to_string()
}

fn default_jwt_secret() -> String {
    // Development fallback; override in any real deployment.
    "venue-dev-secret".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_journal_path")]
    pub journal_path: String,

    /// Messaging gateway endpoint; absent disables the sink.
    #[serde(default)]
    pub messaging_endpoint: Option<String>,

    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    #[serde(default)]
    pub engine: EngineConfig,
}

impl Settings {
    pub fn load() -> Result<Self, config::ConfigError> {
        Config::builder()
            .add_source(File::with_name("venue").required(false))
            .add_source(Environment::with_prefix("VENUE").separator("__"))
            .build()?
            .try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            journal_path: default_journal_path(),
            messaging_endpoint: None,
            jwt_secret: default_jwt_secret(),
            engine: EngineConfig::default(),
        }
    }
}
