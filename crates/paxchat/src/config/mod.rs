//! Layered configuration: TOML file → environment variable → CLI flag,
//! with `from_file`/`from_toml`/`validate`/`minimal` constructors. The
//! actual file → env → flag layering happens in `crate::cli`; this module
//! owns the TOML shape and its validation.

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use crate::util::logging::LogConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSettings {
    pub id: i64,
    pub target_host: String,
    pub target_port: u16,
    #[serde(default = "default_num_servers")]
    pub num_servers: usize,
    #[serde(default)]
    pub logging: LogConfig,
}

fn default_num_servers() -> usize {
    3
}

impl NodeSettings {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id < 0 {
            return Err(ConfigError::Validation("node id must be non-negative".into()));
        }
        if self.num_servers == 0 {
            return Err(ConfigError::Validation("num_servers must be at least 1".into()));
        }
        if self.id as usize >= self.num_servers {
            return Err(ConfigError::Validation(format!(
                "node id {} is out of range for {} servers",
                self.id, self.num_servers
            )));
        }
        Ok(())
    }

    pub fn minimal(id: i64, target_host: impl Into<String>, target_port: u16) -> Self {
        NodeSettings {
            id,
            target_host: target_host.into(),
            target_port,
            num_servers: default_num_servers(),
            logging: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySettings {
    pub base_port: u16,
    pub num_servers: usize,
    #[serde(default = "default_forward_delay_ms")]
    pub forward_delay_ms: u64,
}

fn default_forward_delay_ms() -> u64 {
    3000
}

impl RelaySettings {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_servers == 0 {
            return Err(ConfigError::Validation("num_servers must be at least 1".into()));
        }
        if self.forward_delay_ms < default_forward_delay_ms() {
            return Err(ConfigError::Validation(
                "forward_delay_ms may not be set below the 3000ms contract floor".into(),
            ));
        }
        Ok(())
    }

    pub fn minimal(base_port: u16, num_servers: usize) -> Self {
        RelaySettings {
            base_port,
            num_servers,
            forward_delay_ms: default_forward_delay_ms(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_node_settings_validate() {
        assert!(NodeSettings::minimal(0, "127.0.0.1", 7000).validate().is_ok());
    }

    #[test]
    fn node_id_out_of_range_fails_validation() {
        let mut settings = NodeSettings::minimal(5, "127.0.0.1", 7000);
        settings.num_servers = 3;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn parses_node_toml() {
        let toml = r#"
            id = 0
            target_host = "127.0.0.1"
            target_port = 7000
            num_servers = 3
        "#;
        let settings = NodeSettings::from_toml(toml).unwrap();
        assert_eq!(settings.target_port, 7000);
    }

    #[test]
    fn relay_forward_delay_below_floor_is_rejected() {
        let mut settings = RelaySettings::minimal(7000, 3);
        settings.forward_delay_ms = 100;
        assert!(settings.validate().is_err());
    }
}
