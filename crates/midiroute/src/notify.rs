//! Change notification for routing state.

use crate::types::InstrumentId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Something that changed in a `RoutingStore`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RoutingEvent {
    Initialized {
        channels: usize,
        instruments: usize,
    },
    Assigned {
        channel: u8,
        instrument_id: InstrumentId,
        score: f64,
    },
    Unassigned {
        channel: u8,
    },
    Cleared,
    AutoRouted {
        assigned: usize,
        skipped: usize,
    },
    PresetApplied {
        preset_id: String,
        applied: usize,
        skipped: usize,
    },
    Imported {
        assignments: usize,
    },
}

/// Receives routing events after each mutation is committed and validated.
///
/// Implement this to mirror routing state into a UI or a persisted copy.
pub trait RoutingObserver: Send + Sync {
    fn on_event(&self, event: &RoutingEvent);
}

/// Default observer: writes every event to the log.
pub struct LoggingObserver;

impl RoutingObserver for LoggingObserver {
    fn on_event(&self, event: &RoutingEvent) {
        match event {
            RoutingEvent::Initialized {
                channels,
                instruments,
            } => info!(
                "routing initialized: {} channels, {} instruments",
                channels, instruments
            ),
            RoutingEvent::Assigned {
                channel,
                instrument_id,
                score,
            } => debug!("channel {} → {} ({:.2})", channel, instrument_id, score),
            RoutingEvent::Unassigned { channel } => debug!("channel {} unassigned", channel),
            RoutingEvent::Cleared => debug!("routing cleared"),
            RoutingEvent::AutoRouted { assigned, skipped } => {
                info!("auto-routed {} channels, {} left unassigned", assigned, skipped)
            }
            RoutingEvent::PresetApplied {
                preset_id,
                applied,
                skipped,
            } => info!(
                "preset {} applied: {} assignments, {} skipped",
                preset_id, applied, skipped
            ),
            RoutingEvent::Imported { assignments } => {
                info!("routing imported with {} assignments", assignments)
            }
        }
    }
}

/// Observer that ignores everything.
pub struct NullObserver;

impl RoutingObserver for NullObserver {
    fn on_event(&self, _event: &RoutingEvent) {}
}
