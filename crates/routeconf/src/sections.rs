//! Config sections and their defaults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Filesystem locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Where presets and other state live.
    /// Default: ~/.local/share/midiroute
    #[serde(default = "PathsConfig::default_state_dir")]
    pub state_dir: PathBuf,
}

impl PathsConfig {
    fn default_state_dir() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.data_dir().join("midiroute"))
            .unwrap_or_else(|| PathBuf::from(".local/share/midiroute"))
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_dir: Self::default_state_dir(),
        }
    }
}

/// Routing thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSettings {
    /// Floor below which auto-route leaves a channel unassigned.
    /// Default: 0.3
    #[serde(default = "RouteSettings::default_threshold")]
    pub min_score: f64,

    /// Assignments under this score are flagged as poor fits.
    /// Default: 0.3
    #[serde(default = "RouteSettings::default_threshold")]
    pub low_compatibility_threshold: f64,
}

impl RouteSettings {
    fn default_threshold() -> f64 {
        0.3
    }
}

impl Default for RouteSettings {
    fn default() -> Self {
        Self {
            min_score: Self::default_threshold(),
            low_compatibility_threshold: Self::default_threshold(),
        }
    }
}

/// Which persisted store holds presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetBackend {
    /// `{state_dir}/presets/<key>.json`
    #[default]
    Json,
    /// `{state_dir}/midiroute.db`
    Sqlite,
    /// Nothing survives the process.
    Memory,
}

impl PresetBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for PresetBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresetBackend {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            _ => Err(format!("Unknown preset backend: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetsConfig {
    #[serde(default)]
    pub backend: PresetBackend,

    /// Key the preset collection is stored under.
    /// Default: midi-routing-presets
    #[serde(default = "PresetsConfig::default_key")]
    pub key: String,
}

impl PresetsConfig {
    fn default_key() -> String {
        "midi-routing-presets".to_string()
    }
}

impl Default for PresetsConfig {
    fn default() -> Self {
        Self {
            backend: PresetBackend::default(),
            key: Self::default_key(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log filter (trace, debug, info, warn, error, or an EnvFilter directive).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
