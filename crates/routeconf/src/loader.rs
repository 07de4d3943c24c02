//! Config file discovery, loading, and environment variable overlay.

use crate::sections::PresetBackend;
use crate::{ConfigError, RouteConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/midiroute/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("midiroute/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("midiroute.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file as a raw table, keeping only the keys it sets.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Parse config from a TOML string.
#[cfg(test)]
fn parse_toml(contents: &str, path: &Path) -> Result<RouteConfig, ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_table(&table, path)
}

/// Build a config from a raw table; absent keys keep their defaults.
///
/// Unknown sections and keys are ignored.
pub fn parse_table(table: &toml::Table, path: &Path) -> Result<RouteConfig, ConfigError> {
    let parse_err = |field: &str, expected: &str| ConfigError::Parse {
        path: path.to_path_buf(),
        message: format!("{} must be {}", field, expected),
    };

    let mut config = RouteConfig::default();

    if let Some(paths) = table.get("paths").and_then(|v| v.as_table()) {
        if let Some(v) = paths.get("state_dir").and_then(|v| v.as_str()) {
            config.paths.state_dir = expand_path(v);
        }
    }

    if let Some(routing) = table.get("routing").and_then(|v| v.as_table()) {
        if let Some(v) = routing.get("min_score") {
            config.routing.min_score =
                as_float(v).ok_or_else(|| parse_err("routing.min_score", "a number"))?;
        }
        if let Some(v) = routing.get("low_compatibility_threshold") {
            config.routing.low_compatibility_threshold = as_float(v).ok_or_else(|| {
                parse_err("routing.low_compatibility_threshold", "a number")
            })?;
        }
    }

    if let Some(presets) = table.get("presets").and_then(|v| v.as_table()) {
        if let Some(v) = presets.get("backend").and_then(|v| v.as_str()) {
            config.presets.backend = v.parse().map_err(|message| ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            })?;
        }
        if let Some(v) = presets.get("key").and_then(|v| v.as_str()) {
            config.presets.key = v.to_string();
        }
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("log_level").and_then(|v| v.as_str()) {
            config.telemetry.log_level = v.to_string();
        }
    }

    Ok(config)
}

// `min_score = 1` is as valid as `min_score = 1.0`
fn as_float(value: &toml::Value) -> Option<f64> {
    value
        .as_float()
        .or_else(|| value.as_integer().map(|i| i as f64))
}

/// Merge `overlay` into `base`, key by key.
///
/// Every key present in `overlay` wins, including one set back to its
/// default. Nested tables merge recursively.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        let incoming = match value {
            toml::Value::Table(incoming) => incoming,
            other => {
                base.insert(key, other);
                continue;
            }
        };
        if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
            merge_tables(existing, incoming);
            continue;
        }
        base.insert(key, toml::Value::Table(incoming));
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(
    config: &mut RouteConfig,
    sources: &mut ConfigSources,
) -> Result<(), ConfigError> {
    if let Ok(v) = env::var("MIDIROUTE_STATE_DIR") {
        config.paths.state_dir = expand_path(&v);
        sources.env_overrides.push("MIDIROUTE_STATE_DIR".to_string());
    }

    if let Ok(v) = env::var("MIDIROUTE_MIN_SCORE") {
        config.routing.min_score = parse_env_float("MIDIROUTE_MIN_SCORE", &v)?;
        sources.env_overrides.push("MIDIROUTE_MIN_SCORE".to_string());
    }
    if let Ok(v) = env::var("MIDIROUTE_LOW_COMPATIBILITY") {
        config.routing.low_compatibility_threshold =
            parse_env_float("MIDIROUTE_LOW_COMPATIBILITY", &v)?;
        sources.env_overrides.push("MIDIROUTE_LOW_COMPATIBILITY".to_string());
    }

    if let Ok(v) = env::var("MIDIROUTE_PRESET_BACKEND") {
        config.presets.backend =
            v.parse::<PresetBackend>()
                .map_err(|message| ConfigError::InvalidValue {
                    field: "MIDIROUTE_PRESET_BACKEND".to_string(),
                    message,
                })?;
        sources.env_overrides.push("MIDIROUTE_PRESET_BACKEND".to_string());
    }

    if let Ok(v) = env::var("MIDIROUTE_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("MIDIROUTE_LOG_LEVEL".to_string());
    }
    // Also support RUST_LOG
    if let Ok(v) = env::var("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }

    Ok(())
}

fn parse_env_float(name: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: name.to_string(),
        message: format!("expected a number, got {:?}", value),
    })
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::RouteSettings;

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/test/path");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_absolute() {
        assert_eq!(expand_path("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_discover_config_files() {
        // Just verify it doesn't panic
        let _files = discover_config_files();
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
[paths]
state_dir = "/custom/state"
"#;
        let config = parse_toml(toml, Path::new("test.toml")).unwrap();
        assert_eq!(config.paths.state_dir, PathBuf::from("/custom/state"));
        assert_eq!(config.routing, RouteSettings::default());
        assert_eq!(config.presets.backend, PresetBackend::Json);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
[paths]
state_dir = "/data/midiroute"

[routing]
min_score = 0.5
low_compatibility_threshold = 1

[presets]
backend = "SQLite"
key = "studio-b"

[telemetry]
log_level = "debug"

[unrelated]
ignored = true
"#;
        let config = parse_toml(toml, Path::new("test.toml")).unwrap();

        assert_eq!(config.paths.state_dir, PathBuf::from("/data/midiroute"));
        assert_eq!(config.routing.min_score, 0.5);
        assert_eq!(config.routing.low_compatibility_threshold, 1.0);
        assert_eq!(config.presets.backend, PresetBackend::Sqlite);
        assert_eq!(config.presets.key, "studio-b");
        assert_eq!(config.telemetry.log_level, "debug");
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        let err = parse_toml("[routing]\nmin_score = \"high\"\n", Path::new("bad.toml"));
        assert!(matches!(err, Err(ConfigError::Parse { .. })));

        let err = parse_toml("[presets]\nbackend = \"redis\"\n", Path::new("bad.toml"));
        assert!(matches!(err, Err(ConfigError::Parse { .. })));

        let err = parse_toml("not = [valid", Path::new("bad.toml"));
        assert!(matches!(err, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_merge_keeps_keys_the_overlay_omits() {
        let mut merged: toml::Table = "[routing]\nmin_score = 0.6\n[presets]\nkey = \"house\"\n"
            .parse()
            .unwrap();
        let overlay: toml::Table = "[presets]\nbackend = \"memory\"\n".parse().unwrap();
        merge_tables(&mut merged, overlay);

        let config = parse_table(&merged, Path::new("merged")).unwrap();
        assert_eq!(config.routing.min_score, 0.6);
        assert_eq!(config.presets.key, "house");
        assert_eq!(config.presets.backend, PresetBackend::Memory);
    }

    #[test]
    fn test_later_file_can_restore_defaults() {
        let mut merged = toml::Table::new();
        let system: toml::Table = "[routing]\nmin_score = 0.5\n[presets]\nbackend = \"sqlite\"\n"
            .parse()
            .unwrap();
        let local: toml::Table = "[routing]\nmin_score = 0.3\n[presets]\nbackend = \"json\"\n"
            .parse()
            .unwrap();
        merge_tables(&mut merged, system);
        merge_tables(&mut merged, local);

        let config = parse_table(&merged, Path::new("merged")).unwrap();
        assert_eq!(config.routing.min_score, 0.3);
        assert_eq!(config.presets.backend, PresetBackend::Json);
    }
}
