//! Configuration for a leaderboard session.
//!
//! The init parameters are opaque to the tracker and passed through to
//! [`RemoteSession::create_client`](crate::remote::RemoteSession::create_client)
//! unchanged. They are usually read from a TOML file:
//!
//! ```toml
//! [game]
//! game_id = "4d2b7a"
//! game_secret = "..."
//! game_version = "1.0"
//! currency = "USD"
//! languages = "en"
//!
//! [loopback]
//! login = "player-one"
//! rivals = [5000, 4200, 900]
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::remote::LoopbackConfig;

/// Parameters for creating the remote client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitParams {
    pub game_id: String,
    pub game_secret: String,
    pub game_version: String,
    pub currency: String,
    pub languages: String,
}

impl Default for InitParams {
    fn default() -> Self {
        Self {
            game_id: String::new(),
            game_secret: String::new(),
            game_version: "1.0".to_string(),
            currency: "USD".to_string(),
            languages: "en".to_string(),
        }
    }
}

impl InitParams {
    pub fn new(
        game_id: impl Into<String>,
        game_secret: impl Into<String>,
        game_version: impl Into<String>,
        currency: impl Into<String>,
        languages: impl Into<String>,
    ) -> Self {
        Self {
            game_id: game_id.into(),
            game_secret: game_secret.into(),
            game_version: game_version.into(),
            currency: currency.into(),
            languages: languages.into(),
        }
    }

    /// Copy with the secret masked, safe to print or log
    pub fn redacted(&self) -> Self {
        let game_secret = if self.game_secret.is_empty() {
            String::new()
        } else {
            "*".repeat(8)
        };
        Self {
            game_secret,
            ..self.clone()
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub game: InitParams,
    pub loopback: LoopbackConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config = Self::parse(&content)?;
        debug!(
            "Loaded config from {}: game_id={}",
            path.as_ref().display(),
            config.game.game_id
        );
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
