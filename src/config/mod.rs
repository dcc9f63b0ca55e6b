mod basic;
mod oauth;

pub use basic::BasicConfig;
pub use oauth::OauthConfig;

use crate::error::KeeperError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Core server configuration (see `basic` table in config.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Google OAuth client settings (see `oauth` table in config.toml).
    #[serde(default)]
    pub oauth: OauthConfig,
}

const DEFAULT_CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "KEEPER_";

impl Config {
    /// Builds a Figment that merges defaults, an optional config TOML file and
    /// `KEEPER_`-prefixed environment variables (`__` separates nested keys).
    pub fn figment() -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Loads and validates the configuration.
    pub fn load() -> Result<Self, KeeperError> {
        let cfg: Self = Self::figment()
            .extract()
            .map_err(|e| KeeperError::Config(format!("failed to extract configuration: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects configurations that would run with insecure or unusable defaults.
    pub fn validate(&self) -> Result<(), KeeperError> {
        if self.basic.api_key.trim().is_empty() {
            return Err(KeeperError::Config(
                "basic.api_key must be set and non-empty".to_string(),
            ));
        }
        if self.oauth.client_id.trim().is_empty() {
            return Err(KeeperError::Config(
                "oauth.client_id must be set and non-empty".to_string(),
            ));
        }
        Ok(())
    }
}
