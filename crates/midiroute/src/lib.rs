//! MIDI channel-to-instrument routing.
//!
//! Takes the channels of a loaded MIDI file and a snapshot of connected
//! instruments, then decides which channel plays where: either one
//! assignment at a time or with a greedy auto-router. Every change is
//! validated for missing, duplicated and poor-fit assignments.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use midiroute::{extract_channels, timeline, LoggingObserver, RoutingStore};
//!
//! # fn run(bytes: &[u8], json: &str) -> midiroute::Result<()> {
//! let events = timeline::from_smf(bytes)?;
//! let channels = extract_channels(&events);
//! let instruments = midiroute::load_instruments(json)?;
//!
//! let mut store = RoutingStore::new(Arc::new(LoggingObserver));
//! store.load(channels, instruments);
//! store.auto_route(midiroute::DEFAULT_MIN_SCORE);
//!
//! for conflict in &store.validation().conflicts {
//!     println!("{}", conflict.message());
//! }
//! # Ok(())
//! # }
//! ```

pub mod auto_route;
pub mod compat;
pub mod extract;
pub mod gm;
pub mod notify;
pub mod persist;
pub mod preset;
pub mod store;
pub mod timeline;
pub mod types;
pub mod validate;

pub use auto_route::{auto_route, RouteMatch, DEFAULT_MIN_SCORE};
pub use compat::{score, InstrumentFamily};
pub use extract::extract_channels;
pub use notify::{LoggingObserver, NullObserver, RoutingEvent, RoutingObserver};
pub use persist::{JsonFileStore, MemoryStore, PersistedStore, SqliteStore};
pub use preset::{PresetApplyReport, PresetLibrary, SkippedPair, PRESETS_KEY};
pub use store::{RoutingSettings, RoutingStore};
pub use timeline::{MidiEvent, MidiEventKind};
pub use types::*;
pub use validate::{validate, DEFAULT_LOW_COMPATIBILITY};

/// Errors from routing operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown channel: {0}")]
    UnknownChannel(u8),

    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("Channel {0} is not assigned")]
    NotAssigned(u8),

    #[error("Preset not found: {0}")]
    PresetNotFound(String),

    #[error("MIDI parse error: {0}")]
    MidiParse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
