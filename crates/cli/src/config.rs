//! Configuration loading from tokenctl.toml.

use collectible::{CollectionDef, TransferPolicy};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Ledger storage configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Collections that can be published.
    #[serde(default, rename = "collection")]
    pub collections: Vec<CollectionDef>,
}

/// Where the ledger lives.
#[derive(Debug, Deserialize, Default)]
pub struct LedgerConfig {
    /// Directory holding `ledger.db`. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration with a single owner-only collection.
    pub fn default_config() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            collections: vec![
                CollectionDef::new("collectibles").with_transfer(TransferPolicy::OwnerOnly),
            ],
        }
    }

    /// Look up a collection definition by name.
    pub fn collection(&self, name: &str) -> Result<&CollectionDef, ConfigError> {
        self.collections
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ConfigError::UnknownCollection(name.to_string()))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (i, def) in self.collections.iter().enumerate() {
            if self.collections[..i].iter().any(|c| c.name == def.name) {
                return Err(ConfigError::DuplicateCollection(def.name.clone()));
            }
            def.validate().map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("collection '{0}' is defined more than once")]
    DuplicateCollection(String),

    #[error("collection '{0}' is not defined in the config")]
    UnknownCollection(String),
}
