//! routectl - route MIDI file channels to instruments
//!
//! Subcommands:
//! - `routectl channels <file.mid>` - Show what each channel plays
//! - `routectl route <file.mid> -i <rig.json>` - Auto-route and validate
//! - `routectl score <file.mid> -i <rig.json>` - Channel × instrument score matrix
//! - `routectl import <routing.json> <file.mid> -i <rig.json>` - Restore an exported routing
//! - `routectl preset ...` - Save, list, show, apply and delete presets
//! - `routectl config` - Print the effective configuration

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use routeconf::RouteConfig;
use std::path::PathBuf;

mod commands;
mod render;

#[derive(Parser)]
#[command(name = "routectl")]
#[command(about = "Route MIDI channels to instruments")]
#[command(version)]
struct Cli {
    /// Config file (replaces ./midiroute.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// A MIDI file plus the instruments it can be routed to.
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Standard MIDI file
    pub midi: PathBuf,

    /// JSON array of instrument descriptors
    #[arg(short, long)]
    pub instruments: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// List the channels found in a MIDI file
    Channels {
        /// Standard MIDI file
        midi: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Route channels to instruments and report conflicts
    Route {
        #[command(flatten)]
        session: SessionArgs,

        /// Auto-route score floor (defaults to routing.min_score)
        #[arg(long)]
        min_score: Option<f64>,

        /// Skip auto-routing; start from an empty table
        #[arg(long)]
        manual: bool,

        /// Manual assignment applied after auto-routing, as CHANNEL=INSTRUMENT (channel 0-15)
        #[arg(short, long = "assign", value_parser = parse_assignment)]
        assignments: Vec<(u8, String)>,

        /// Write the resulting routing to this file
        #[arg(short, long)]
        export: Option<PathBuf>,

        /// Print the routing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score every channel against every instrument
    Score {
        #[command(flatten)]
        session: SessionArgs,

        #[arg(long)]
        json: bool,
    },

    /// Restore a routing previously written with `route --export`
    Import {
        /// Exported routing JSON
        routing: PathBuf,

        #[command(flatten)]
        session: SessionArgs,

        #[arg(long)]
        json: bool,
    },

    /// Manage stored presets
    Preset {
        #[command(subcommand)]
        action: PresetAction,
    },

    /// Show the effective configuration and where it came from
    Config,
}

#[derive(Subcommand)]
enum PresetAction {
    /// List stored presets
    List {
        #[arg(long)]
        json: bool,
    },

    /// Show one preset's assignments
    Show {
        /// Preset ID
        id: String,
    },

    /// Save a routing as a new preset
    Save {
        /// Preset name
        name: String,

        #[command(flatten)]
        session: SessionArgs,

        /// Save this exported routing instead of auto-routing
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Apply a preset to a MIDI file and report what was skipped
    Apply {
        /// Preset ID
        id: String,

        #[command(flatten)]
        session: SessionArgs,

        #[arg(long)]
        json: bool,
    },

    /// Delete a preset
    Delete {
        /// Preset ID
        id: String,
    },
}

/// Parse `CHANNEL=INSTRUMENT`.
fn parse_assignment(s: &str) -> Result<(u8, String), String> {
    let (channel, instrument) = s
        .split_once('=')
        .ok_or_else(|| format!("expected CHANNEL=INSTRUMENT, got '{}'", s))?;
    let channel: u8 = channel
        .trim()
        .parse()
        .map_err(|_| format!("invalid channel '{}'", channel))?;
    if channel > 15 {
        return Err(format!("channel {} is outside 0-15", channel));
    }
    let instrument = instrument.trim();
    if instrument.is_empty() {
        return Err("instrument id is empty".to_string());
    }
    Ok((channel, instrument.to_string()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = RouteConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    // Logs go to stderr so --json output stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.telemetry.log_level)
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("info")
                }),
        )
        .init();

    tracing::debug!("config files: {:?}", sources.files);

    match cli.command {
        Commands::Channels { midi, json } => commands::channels(&midi, json)?,
        Commands::Route {
            session,
            min_score,
            manual,
            assignments,
            export,
            json,
        } => {
            let options = commands::RouteOptions {
                min_score,
                manual,
                assignments,
                export,
                json,
            };
            commands::route(&config, &session, &options)?;
        }
        Commands::Score { session, json } => commands::score_matrix(&config, &session, json)?,
        Commands::Import {
            routing,
            session,
            json,
        } => commands::import(&config, &routing, &session, json)?,
        Commands::Preset { action } => match action {
            PresetAction::List { json } => commands::preset_list(&config, json)?,
            PresetAction::Show { id } => commands::preset_show(&config, &id)?,
            PresetAction::Save {
                name,
                session,
                from,
            } => commands::preset_save(&config, &name, &session, from.as_deref())?,
            PresetAction::Apply { id, session, json } => {
                commands::preset_apply(&config, &id, &session, json)?
            }
            PresetAction::Delete { id } => commands::preset_delete(&config, &id)?,
        },
        Commands::Config => commands::show_config(&config, &sources),
    }

    Ok(())
}
