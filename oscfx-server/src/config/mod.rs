//! Configuration module for oscfx-server.
//!
//! Handles loading configuration from the TOML file and applying CLI
//! overrides, then turns it into the validated runtime form.

pub mod file;

use crate::config::file::{FileConfig, RetentionKind};
use oscfx_core::config::HubConfig;
use oscfx_core::effects::EffectName;
use oscfx_core::event_log::Retention;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "./oscfx-config.toml";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Validated configuration the server runs with.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub listen: SocketAddr,
    pub osc_listen: SocketAddr,
    pub max_packet_size: usize,
    pub hub: HubConfig,
    pub default_effect: EffectName,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    /// The path came from the command line, so it must exist.
    explicit: bool,
    listen_override: Option<SocketAddr>,
    osc_listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    pub fn new(
        config_path: Option<&Path>,
        listen_override: Option<SocketAddr>,
        osc_listen_override: Option<SocketAddr>,
    ) -> Self {
        Self {
            config_path: config_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            explicit: config_path.is_some(),
            listen_override,
            osc_listen_override,
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file (falling back to defaults if the default path
    ///    does not exist)
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let mut file_config = match std::fs::read_to_string(&self.config_path) {
            Ok(content) => Self::parse(&content)?,
            Err(e) if e.kind() == ErrorKind::NotFound && !self.explicit => {
                tracing::info!(
                    "No config file at {:?}, using defaults",
                    self.config_path
                );
                FileConfig::default()
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }
        if let Some(listen) = self.osc_listen_override {
            file_config.osc.listen = listen;
        }

        validate(file_config)
    }

    fn parse(content: &str) -> Result<FileConfig, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

fn validate(config: FileConfig) -> Result<LoadedConfig, ConfigError> {
    let default_effect = EffectName::new(&config.modules.default_effect).map_err(|e| {
        ConfigError::ValidationError(format!("modules.default_effect: {e}"))
    })?;
    if config.hub.max_keys == 0 {
        return Err(ConfigError::ValidationError(
            "hub.max_keys must be at least 1".into(),
        ));
    }
    if config.hub.channel_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "hub.channel_buffer must be at least 1".into(),
        ));
    }
    if config.osc.max_packet_size == 0 {
        return Err(ConfigError::ValidationError(
            "osc.max_packet_size must be at least 1".into(),
        ));
    }

    let retention = match config.hub.retention {
        RetentionKind::LatestPerKey => Retention::LatestPerKey {
            max_keys: config.hub.max_keys,
        },
        RetentionKind::Unbounded => Retention::Unbounded,
    };

    Ok(LoadedConfig {
        listen: config.server.listen,
        osc_listen: config.osc.listen,
        max_packet_size: config.osc.max_packet_size,
        hub: HubConfig {
            retention,
            channel_buffer: config.hub.channel_buffer,
        },
        default_effect,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_str(content: &str) -> Result<LoadedConfig, ConfigError> {
        validate(ConfigLoader::parse(content)?)
    }

    #[test]
    fn test_defaults_validate() {
        let loaded = load_str("").unwrap();
        assert_eq!(loaded.hub, HubConfig::default());
        assert_eq!(loaded.default_effect.as_str(), "Burst");
        assert_eq!(loaded.listen.port(), 8081);
    }

    #[test]
    fn test_unbounded_retention_maps_through() {
        let loaded = load_str("[hub]\nretention = \"unbounded\"\n").unwrap();
        assert_eq!(loaded.hub.retention, Retention::Unbounded);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        for content in [
            "[modules]\ndefault_effect = \"\"\n",
            "[hub]\nmax_keys = 0\n",
            "[hub]\nchannel_buffer = 0\n",
        ] {
            assert!(
                matches!(load_str(content), Err(ConfigError::ValidationError(_))),
                "{content}"
            );
        }
    }

    #[test]
    fn test_missing_default_file_uses_defaults() {
        let mut loader = ConfigLoader::new(None, None, None);
        loader.config_path = PathBuf::from("./definitely-not-here/oscfx-config.toml");
        let loaded = loader.load().unwrap();
        assert_eq!(loaded.osc_listen.port(), 57121);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let path = PathBuf::from("./definitely-not-here/oscfx-config.toml");
        let loader = ConfigLoader::new(Some(&path), None, None);
        assert!(matches!(loader.load(), Err(ConfigError::IoError(_))));
    }

    #[test]
    fn test_cli_overrides_apply() {
        let listen: SocketAddr = "127.0.0.1:1234".parse().unwrap();
        let osc: SocketAddr = "127.0.0.1:5678".parse().unwrap();
        let mut loader = ConfigLoader::new(None, Some(listen), Some(osc));
        loader.config_path = PathBuf::from("./definitely-not-here/oscfx-config.toml");
        let loaded = loader.load().unwrap();
        assert_eq!(loaded.listen, listen);
        assert_eq!(loaded.osc_listen, osc);
    }
}
