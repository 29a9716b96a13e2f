//! CLI configuration

use std::path::PathBuf;

use anyhow::Context;
use clap::ValueEnum;
use girder_engine::{Aggregation, EngineConfig};
use serde::{Deserialize, Serialize};

use crate::output::OutputFormat;

/// Overrides the config file location
pub const CONFIG_ENV: &str = "GIRDER_CONFIG";

const AGGREGATION_PREFIX: &str = "engine.aggregations.";

/// Get default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("girder")
}

/// Location of `config.toml`
pub fn config_file_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("girder")
        .join("config.toml")
}

/// Storage backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Redb,
    Sqlite,
    /// Nothing is persisted
    Memory,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redb => "redb",
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        }
    }

    /// Database file name inside the data directory
    pub fn file_name(&self) -> Option<&'static str> {
        match self {
            Self::Redb => Some("girder.redb"),
            Self::Sqlite => Some("girder.db"),
            Self::Memory => None,
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "redb" => Ok(Self::Redb),
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown backend: {}", other)),
        }
    }
}

/// Configuration for the CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    pub backend: Backend,
    pub format: OutputFormat,
    pub engine: EngineConfig,
}

impl Config {
    /// Load the config file, falling back to defaults when it does not exist
    pub fn load() -> anyhow::Result<Self> {
        let path = config_file_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = config_file_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, toml::to_string_pretty(self)?)?;
        tracing::debug!("Saved config to {}", path.display());
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    /// Scalar keys; aggregations are addressed as `engine.aggregations.<metric>`
    pub fn keys() -> &'static [&'static str] {
        &[
            "data_dir",
            "backend",
            "format",
            "engine.max_depth",
            "engine.default_depth",
            "engine.list_limit",
            "engine.search_limit",
        ]
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(metric) = key.strip_prefix(AGGREGATION_PREFIX) {
            return self
                .engine
                .aggregations
                .get(metric)
                .map(|agg| agg.to_string());
        }
        match key {
            "data_dir" => self.data_dir.as_ref().map(|p| p.display().to_string()),
            "backend" => Some(self.backend.as_str().to_string()),
            "format" => Some(self.format.as_str().to_string()),
            "engine.max_depth" => Some(self.engine.max_depth.to_string()),
            "engine.default_depth" => Some(self.engine.default_depth.to_string()),
            "engine.list_limit" => Some(self.engine.list_limit.to_string()),
            "engine.search_limit" => Some(self.engine.search_limit.to_string()),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        if let Some(metric) = key.strip_prefix(AGGREGATION_PREFIX) {
            if metric.is_empty() {
                anyhow::bail!("Missing metric name in '{}'", key);
            }
            let aggregation: Aggregation = value.parse().map_err(anyhow::Error::msg)?;
            self.engine
                .aggregations
                .insert(metric.to_string(), aggregation);
            return Ok(());
        }
        match key {
            "data_dir" => self.data_dir = Some(PathBuf::from(value)),
            "backend" => self.backend = value.parse().map_err(anyhow::Error::msg)?,
            "format" => self.format = value.parse().map_err(anyhow::Error::msg)?,
            "engine.max_depth" => self.engine.max_depth = value.parse()?,
            "engine.default_depth" => self.engine.default_depth = value.parse()?,
            "engine.list_limit" => self.engine.list_limit = value.parse()?,
            "engine.search_limit" => self.engine.search_limit = value.parse()?,
            _ => anyhow::bail!(
                "Unknown config key: {}. Available keys: {}",
                key,
                Self::keys().join(", ")
            ),
        }
        Ok(())
    }

    /// Put `key` back to its default; a metric aggregation is removed
    /// unless it is one of the built-in ones
    pub fn unset(&mut self, key: &str) -> anyhow::Result<()> {
        let defaults = Self::default();
        if let Some(metric) = key.strip_prefix(AGGREGATION_PREFIX) {
            match defaults.engine.aggregations.get(metric) {
                Some(agg) => {
                    self.engine.aggregations.insert(metric.to_string(), *agg);
                }
                None => {
                    self.engine.aggregations.remove(metric);
                }
            }
            return Ok(());
        }
        match key {
            "data_dir" => self.data_dir = None,
            "backend" => self.backend = defaults.backend,
            "format" => self.format = defaults.format,
            "engine.max_depth" => self.engine.max_depth = defaults.engine.max_depth,
            "engine.default_depth" => self.engine.default_depth = defaults.engine.default_depth,
            "engine.list_limit" => self.engine.list_limit = defaults.engine.list_limit,
            "engine.search_limit" => self.engine.search_limit = defaults.engine.search_limit,
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_and_set() {
        let mut config = Config::default();
        assert_eq!(config.get("backend").as_deref(), Some("redb"));
        assert_eq!(config.get("data_dir"), None);

        config.set("backend", "sqlite").unwrap();
        config.set("engine.max_depth", "12").unwrap();
        config.set("engine.aggregations.co2", "max").unwrap();

        assert_eq!(config.backend, Backend::Sqlite);
        assert_eq!(config.engine.max_depth, 12);
        assert_eq!(config.get("engine.aggregations.co2").as_deref(), Some("max"));
        assert_eq!(
            config.get("engine.aggregations.temperature").as_deref(),
            Some("average")
        );
    }

    #[test]
    fn test_set_rejects_bad_input() {
        let mut config = Config::default();
        assert!(config.set("nope", "1").is_err());
        assert!(config.set("backend", "postgres").is_err());
        assert!(config.set("engine.list_limit", "many").is_err());
        assert!(config.set("engine.aggregations.co2", "median").is_err());
    }

    #[test]
    fn test_unset_restores_defaults() {
        let mut config = Config::default();
        config.set("engine.list_limit", "7").unwrap();
        config.set("engine.aggregations.power", "max").unwrap();
        config.set("engine.aggregations.co2", "max").unwrap();

        config.unset("engine.list_limit").unwrap();
        config.unset("engine.aggregations.power").unwrap();
        config.unset("engine.aggregations.co2").unwrap();

        assert_eq!(config, Config::default());
        assert!(config.unset("bogus").is_err());
    }

    #[test]
    fn test_toml_roundtrip_keeps_engine_table() {
        let mut config = Config::default();
        config.set("format", "json").unwrap();
        config.set("engine.default_depth", "4").unwrap();

        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("[engine]"));
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: Config = toml::from_str("backend = \"memory\"\n").unwrap();
        assert_eq!(parsed.backend, Backend::Memory);
        assert_eq!(parsed.format, OutputFormat::Table);
        assert_eq!(parsed.engine, EngineConfig::default());
    }
}
