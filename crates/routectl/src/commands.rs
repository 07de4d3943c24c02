//! CLI command implementations

use anyhow::{bail, Context, Result};
use midiroute::{
    extract_channels, load_instruments, score, timeline, JsonFileStore, LoggingObserver,
    MemoryStore, PersistedStore, PresetLibrary, RoutingConfig, RoutingSettings, RoutingStore,
    SqliteStore,
};
use routeconf::{ConfigSources, PresetBackend, RouteConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::render;
use crate::SessionArgs;

pub struct RouteOptions {
    pub min_score: Option<f64>,
    pub manual: bool,
    pub assignments: Vec<(u8, String)>,
    pub export: Option<PathBuf>,
    pub json: bool,
}

fn read_channels(midi: &Path) -> Result<Vec<midiroute::ChannelSummary>> {
    let bytes =
        std::fs::read(midi).with_context(|| format!("Failed to read {}", midi.display()))?;
    let events = timeline::from_smf(&bytes)
        .with_context(|| format!("Failed to parse {}", midi.display()))?;
    Ok(extract_channels(&events))
}

/// Load a MIDI file and an instrument snapshot into a fresh store.
fn open_session(config: &RouteConfig, session: &SessionArgs) -> Result<RoutingStore> {
    let channels = read_channels(&session.midi)?;

    let json = std::fs::read_to_string(&session.instruments)
        .with_context(|| format!("Failed to read {}", session.instruments.display()))?;
    let instruments = load_instruments(&json)
        .with_context(|| format!("Invalid instrument list in {}", session.instruments.display()))?;

    let settings = RoutingSettings {
        min_score: config.routing.min_score,
        low_compatibility_threshold: config.routing.low_compatibility_threshold,
    };
    let mut store = RoutingStore::with_settings(Arc::new(LoggingObserver), settings);
    store.load(channels, instruments);
    Ok(store)
}

/// Open the preset library on whichever backend the config names.
fn open_presets(config: &RouteConfig) -> Result<PresetLibrary<Box<dyn PersistedStore>>> {
    let store: Box<dyn PersistedStore> = match config.presets.backend {
        PresetBackend::Json => Box::new(JsonFileStore::at_path(config.preset_dir())?),
        PresetBackend::Sqlite => {
            std::fs::create_dir_all(&config.paths.state_dir).with_context(|| {
                format!("Failed to create {}", config.paths.state_dir.display())
            })?;
            Box::new(SqliteStore::open(config.database_path())?)
        }
        PresetBackend::Memory => Box::new(MemoryStore::new()),
    };
    Ok(PresetLibrary::with_key(store, config.presets.key.clone()))
}

fn print_routing(store: &RoutingStore, json: bool) -> Result<()> {
    if json {
        println!("{}", store.export().to_json()?);
    } else {
        print!(
            "{}",
            render::routing(store, store.settings().low_compatibility_threshold)
        );
    }
    Ok(())
}

/// Print the channels of a MIDI file
pub fn channels(midi: &Path, json: bool) -> Result<()> {
    let channels = read_channels(midi)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&channels)?);
    } else {
        print!("{}", render::channels(&channels));
    }
    Ok(())
}

/// Auto-route (unless told not to), apply manual pairs, then report
pub fn route(config: &RouteConfig, session: &SessionArgs, options: &RouteOptions) -> Result<()> {
    let mut store = open_session(config, session)?;

    if !options.manual {
        let min_score = options.min_score.unwrap_or(config.routing.min_score);
        if !(0.0..=1.0).contains(&min_score) {
            bail!("--min-score must be between 0.0 and 1.0, got {}", min_score);
        }
        store.auto_route(min_score);
    }

    for (channel, instrument) in &options.assignments {
        store
            .assign(*channel, instrument.as_str())
            .with_context(|| format!("Cannot assign channel {} to {}", channel, instrument))?;
    }

    if let Some(path) = &options.export {
        std::fs::write(path, store.export().to_json()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("exported routing to {}", path.display());
    }

    print_routing(&store, options.json)
}

/// Print the full channel × instrument compatibility matrix
pub fn score_matrix(config: &RouteConfig, session: &SessionArgs, json: bool) -> Result<()> {
    let store = open_session(config, session)?;

    if json {
        let mut rows = Vec::with_capacity(store.channels().len());
        for channel in store.channels() {
            let mut scores = serde_json::Map::new();
            for instrument in store.instruments() {
                let result = score(channel, instrument);
                scores.insert(instrument.id.to_string(), serde_json::to_value(result)?);
            }
            rows.push(serde_json::json!({ "channel": channel.number, "scores": scores }));
        }
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print!("{}", render::matrix(store.channels(), store.instruments()));
    }
    Ok(())
}

/// Restore an exported routing against the current file and rig
pub fn import(
    config: &RouteConfig,
    routing: &Path,
    session: &SessionArgs,
    json: bool,
) -> Result<()> {
    let mut store = open_session(config, session)?;
    let text = std::fs::read_to_string(routing)
        .with_context(|| format!("Failed to read {}", routing.display()))?;
    let restored = store
        .import_json(&text)
        .with_context(|| format!("Invalid routing in {}", routing.display()))?;
    info!("restored {} assignments from {}", restored, routing.display());
    print_routing(&store, json)
}

pub fn preset_list(config: &RouteConfig, json: bool) -> Result<()> {
    let presets = open_presets(config)?.list()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&presets)?);
    } else {
        print!("{}", render::presets(&presets));
    }
    Ok(())
}

pub fn preset_show(config: &RouteConfig, id: &str) -> Result<()> {
    let Some(preset) = open_presets(config)?.get(id)? else {
        bail!("Preset not found: {}", id);
    };
    println!("{}", serde_json::to_string_pretty(&preset)?);
    Ok(())
}

/// Save the auto-routed (or `--from` imported) table as a preset
pub fn preset_save(
    config: &RouteConfig,
    name: &str,
    session: &SessionArgs,
    from: Option<&Path>,
) -> Result<()> {
    let mut store = open_session(config, session)?;
    match from {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let routing = RoutingConfig::from_json(&text)
                .with_context(|| format!("Invalid routing in {}", path.display()))?;
            store.import(routing);
        }
        None => {
            store.auto_route(config.routing.min_score);
        }
    }

    let preset = open_presets(config)?.create_preset(name, &store)?;
    println!("{}", preset.id);
    Ok(())
}

pub fn preset_apply(config: &RouteConfig, id: &str, session: &SessionArgs, json: bool) -> Result<()> {
    let mut store = open_session(config, session)?;
    let report = open_presets(config)?.apply_preset(id, &mut store)?;

    if json {
        let output = serde_json::json!({ "report": report, "routing": store.export() });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }
    print!("{}", render::apply_report(&report));
    print_routing(&store, false)
}

pub fn preset_delete(config: &RouteConfig, id: &str) -> Result<()> {
    let removed = open_presets(config)?.delete_preset(id)?;
    println!("Deleted {} ({})", removed.name, removed.id);
    Ok(())
}

pub fn show_config(config: &RouteConfig, sources: &ConfigSources) {
    print!("{}", config.to_toml());
    println!();
    if sources.files.is_empty() {
        println!("# no config files found; using defaults");
    }
    for file in &sources.files {
        println!("# loaded {}", file.display());
    }
    for var in &sources.env_overrides {
        println!("# overridden by ${}", var);
    }
}
