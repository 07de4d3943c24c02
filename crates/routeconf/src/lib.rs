//! Configuration loading for midiroute.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/midiroute/config.toml` (system)
//! 2. `~/.config/midiroute/config.toml` (user)
//! 3. `./midiroute.toml` (local override, or a path given on the command line)
//! 4. Environment variables (`MIDIROUTE_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! state_dir = "~/.local/share/midiroute"
//!
//! [routing]
//! min_score = 0.3
//! low_compatibility_threshold = 0.3
//!
//! [presets]
//! backend = "sqlite"
//! key = "midi-routing-presets"
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, expand_path, ConfigSources};
pub use sections::{PathsConfig, PresetBackend, PresetsConfig, RouteSettings, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Complete midiroute configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RouteConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub routing: RouteSettings,

    #[serde(default)]
    pub presets: PresetsConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl RouteConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, letting `config_path` replace `./midiroute.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and report where values came from.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in loader::discover_config_files_with_override(config_path) {
            let table = loader::load_table(&path)?;
            // Check each file alone so errors name the file that has them
            loader::parse_table(&table, &path)?;
            loader::merge_tables(&mut merged, table);
            sources.files.push(path);
        }

        let merged_from = sources
            .files
            .last()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("defaults"));
        let mut config = loader::parse_table(&merged, &merged_from)?;

        loader::apply_env_overrides(&mut config, &mut sources)?;
        config.validate()?;

        Ok((config, sources))
    }

    /// Reject thresholds outside 0.0-1.0.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("routing.min_score", self.routing.min_score),
            (
                "routing.low_compatibility_threshold",
                self.routing.low_compatibility_threshold,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("{} is outside 0.0-1.0", value),
                });
            }
        }
        Ok(())
    }

    /// Directory for the JSON preset backend.
    pub fn preset_dir(&self) -> PathBuf {
        self.paths.state_dir.join("presets")
    }

    /// Database file for the SQLite preset backend.
    pub fn database_path(&self) -> PathBuf {
        self.paths.state_dir.join("midiroute.db")
    }

    /// Serialize config to a TOML string.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# midiroute configuration\n\n");

        output.push_str("[paths]\n");
        output.push_str(&format!(
            "state_dir = \"{}\"\n",
            self.paths.state_dir.display()
        ));

        output.push_str("\n[routing]\n");
        output.push_str(&format!("min_score = {}\n", self.routing.min_score));
        output.push_str(&format!(
            "low_compatibility_threshold = {}\n",
            self.routing.low_compatibility_threshold
        ));

        output.push_str("\n[presets]\n");
        output.push_str(&format!("backend = \"{}\"\n", self.presets.backend));
        output.push_str(&format!("key = \"{}\"\n", self.presets.key));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RouteConfig::default();
        assert_eq!(config.routing.min_score, 0.3);
        assert_eq!(config.presets.backend, PresetBackend::Json);
        assert_eq!(config.presets.key, "midi-routing-presets");
        assert!(config.preset_dir().ends_with("midiroute/presets"));
    }

    #[test]
    fn test_to_toml_parses_back() {
        let mut config = RouteConfig::default();
        config.paths.state_dir = PathBuf::from("/srv/midiroute");
        config.routing.min_score = 0.45;
        config.presets.backend = PresetBackend::Sqlite;

        let toml = config.to_toml();
        assert!(toml.contains("[routing]"));
        assert!(toml.contains("backend = \"sqlite\""));

        let parsed: RouteConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = RouteConfig::default();
        config.routing.min_score = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_explicit_file_can_set_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("defaults.toml");
        std::fs::write(&path, "[routing]\nmin_score = 0.3\n[presets]\nbackend = \"json\"\n")
            .unwrap();

        let (config, sources) = RouteConfig::load_with_sources_from(Some(&path)).unwrap();
        assert_eq!(sources.files.last(), Some(&path));
        if !sources.env_overrides.iter().any(|v| v == "MIDIROUTE_MIN_SCORE") {
            assert_eq!(config.routing.min_score, 0.3);
        }
    }

    #[test]
    fn test_load_from_explicit_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[presets]\nbackend = \"memory\"\n").unwrap();

        let (config, sources) = RouteConfig::load_with_sources_from(Some(&path)).unwrap();
        assert!(sources.files.contains(&path));
        // RUST_LOG or MIDIROUTE_PRESET_BACKEND in the test environment would win
        if !sources.env_overrides.iter().any(|v| v == "MIDIROUTE_PRESET_BACKEND") {
            assert_eq!(config.presets.backend, PresetBackend::Memory);
        }
    }
}
