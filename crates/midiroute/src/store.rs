//! RoutingStore: the single owner of the current assignment table.
//!
//! Every mutation runs to completion before observers hear about it:
//! the table is updated, validation and stats are recomputed, then each
//! observer is called synchronously. Mutations take `&mut self`, so a
//! multi-threaded host shares the store behind a `Mutex`.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use crate::auto_route::{self, RouteMatch, DEFAULT_MIN_SCORE};
use crate::compat;
use crate::notify::{RoutingEvent, RoutingObserver};
use crate::types::{
    Assignment, ChannelSummary, CompatibilityResult, InstrumentDescriptor, InstrumentId,
    RoutingConfig, RoutingMode, RoutingState, RoutingStats, ValidationResult,
};
use crate::validate::{validate, DEFAULT_LOW_COMPATIBILITY};
use crate::{Error, Result};

/// Tunable thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutingSettings {
    /// Default floor for `auto_route`.
    pub min_score: f64,
    /// Assignments scoring below this are reported as low compatibility.
    pub low_compatibility_threshold: f64,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            min_score: DEFAULT_MIN_SCORE,
            low_compatibility_threshold: DEFAULT_LOW_COMPATIBILITY,
        }
    }
}

pub struct RoutingStore {
    channels: Vec<ChannelSummary>,
    instruments: Vec<InstrumentDescriptor>,
    state: RoutingState,
    validation: ValidationResult,
    stats: RoutingStats,
    settings: RoutingSettings,
    observers: Vec<Arc<dyn RoutingObserver>>,
}

impl RoutingStore {
    pub fn new(observer: Arc<dyn RoutingObserver>) -> Self {
        Self::with_settings(observer, RoutingSettings::default())
    }

    pub fn with_settings(observer: Arc<dyn RoutingObserver>, settings: RoutingSettings) -> Self {
        Self {
            channels: Vec::new(),
            instruments: Vec::new(),
            state: RoutingState::default(),
            validation: ValidationResult::default(),
            stats: RoutingStats::default(),
            settings,
            observers: vec![observer],
        }
    }

    /// Add another observer.
    pub fn subscribe(&mut self, observer: Arc<dyn RoutingObserver>) {
        self.observers.push(observer);
    }

    pub fn settings(&self) -> &RoutingSettings {
        &self.settings
    }

    /// Start over with a freshly loaded file and instrument snapshot.
    pub fn load(&mut self, channels: Vec<ChannelSummary>, instruments: Vec<InstrumentDescriptor>) {
        self.channels = channels;
        self.instruments = instruments;
        self.state = RoutingState::default();
        self.refresh();
        self.notify(RoutingEvent::Initialized {
            channels: self.channels.len(),
            instruments: self.instruments.len(),
        });
    }

    /// Replace the instrument snapshot after a device change.
    ///
    /// Existing assignments are kept, even to instruments that disappeared.
    pub fn set_instruments(&mut self, instruments: Vec<InstrumentDescriptor>) {
        self.instruments = instruments;
        self.refresh();
    }

    /// Route `channel` to `instrument_id`, replacing any previous assignment.
    pub fn assign(&mut self, channel: u8, instrument_id: impl Into<InstrumentId>) -> Result<Assignment> {
        let instrument_id = instrument_id.into();
        let assignment = self.commit(channel, &instrument_id).inspect_err(|e| {
            warn!("cannot assign channel {} to {}: {}", channel, instrument_id, e);
        })?;
        self.state.mode = RoutingMode::Manual;
        self.state.current_preset_id = None;
        Ok(assignment)
    }

    pub fn unassign(&mut self, channel: u8) -> Result<Assignment> {
        let Some(removed) = self.state.assignments.remove(&channel) else {
            warn!("cannot unassign channel {}: not assigned", channel);
            return Err(Error::NotAssigned(channel));
        };
        self.refresh();
        self.notify(RoutingEvent::Unassigned { channel });
        Ok(removed)
    }

    pub fn clear_all(&mut self) {
        self.state.assignments.clear();
        self.refresh();
        self.notify(RoutingEvent::Cleared);
    }

    /// Replace the routing with `auto_route` over the loaded channels.
    ///
    /// Each match is committed (and announced) on its own.
    pub fn auto_route(&mut self, min_score: f64) -> Vec<RouteMatch> {
        let matches = auto_route::auto_route(&self.channels, &self.instruments, min_score);

        self.clear_all();
        for route in &matches {
            let compatibility = route.compatibility.clone();
            self.insert(route.channel, route.instrument_id.clone(), compatibility);
        }
        self.state.mode = RoutingMode::Auto;
        self.state.current_preset_id = None;

        self.notify(RoutingEvent::AutoRouted {
            assigned: matches.len(),
            skipped: self.channels.len().saturating_sub(matches.len()),
        });
        matches
    }

    /// `auto_route` with the configured minimum score.
    pub fn auto_route_default(&mut self) -> Vec<RouteMatch> {
        self.auto_route(self.settings.min_score)
    }

    pub fn assignment(&self, channel: u8) -> Option<&Assignment> {
        self.state.assignments.get(&channel)
    }

    pub fn assignments(&self) -> &BTreeMap<u8, Assignment> {
        &self.state.assignments
    }

    pub fn is_channel_assigned(&self, channel: u8) -> bool {
        self.state.assignments.contains_key(&channel)
    }

    pub fn channels(&self) -> &[ChannelSummary] {
        &self.channels
    }

    pub fn channel(&self, number: u8) -> Option<&ChannelSummary> {
        self.channels.iter().find(|c| c.number == number)
    }

    pub fn instruments(&self) -> &[InstrumentDescriptor] {
        &self.instruments
    }

    pub fn instrument(&self, id: &InstrumentId) -> Option<&InstrumentDescriptor> {
        self.instruments.iter().find(|i| &i.id == id)
    }

    pub fn validation(&self) -> &ValidationResult {
        &self.validation
    }

    pub fn stats(&self) -> &RoutingStats {
        &self.stats
    }

    pub fn state(&self) -> &RoutingState {
        &self.state
    }

    pub fn mode(&self) -> RoutingMode {
        self.state.mode
    }

    pub fn current_preset_id(&self) -> Option<&str> {
        self.state.current_preset_id.as_deref()
    }

    /// Snapshot the routing for transfer to another session.
    pub fn export(&self) -> RoutingConfig {
        RoutingConfig {
            mode: self.state.mode,
            current_preset_id: self.state.current_preset_id.clone(),
            assignments: self.state.assignments.values().cloned().collect(),
            stats: self.stats.clone(),
            timestamp: Utc::now(),
        }
    }

    /// Replace the routing with an exported snapshot.
    ///
    /// Assignments are restored as recorded, scores included. Those naming a
    /// channel the current file does not have are skipped. Returns how many
    /// were restored.
    pub fn import(&mut self, config: RoutingConfig) -> usize {
        let mut assignments = BTreeMap::new();
        for assignment in config.assignments {
            if self.channel(assignment.channel).is_none() {
                warn!(
                    "import: skipping channel {}, not present in the loaded file",
                    assignment.channel
                );
                continue;
            }
            assignments.insert(assignment.channel, assignment);
        }

        let restored = assignments.len();
        self.state = RoutingState {
            assignments,
            mode: config.mode,
            current_preset_id: config.current_preset_id,
        };
        self.refresh();
        self.notify(RoutingEvent::Imported {
            assignments: restored,
        });
        restored
    }

    pub fn import_json(&mut self, json: &str) -> Result<usize> {
        let config = RoutingConfig::from_json(json)?;
        Ok(self.import(config))
    }

    /// Score and store one assignment without touching the routing mode.
    ///
    /// Does not log a rejection; callers report it in their own terms.
    pub(crate) fn commit(&mut self, channel: u8, instrument_id: &InstrumentId) -> Result<Assignment> {
        let Some(summary) = self.channel(channel) else {
            return Err(Error::UnknownChannel(channel));
        };
        let Some(instrument) = self.instrument(instrument_id) else {
            return Err(Error::UnknownInstrument(instrument_id.to_string()));
        };

        let compatibility = compat::score(summary, instrument);
        Ok(self.insert(channel, instrument_id.clone(), compatibility))
    }

    fn insert(&mut self, channel: u8, instrument_id: InstrumentId, compatibility: CompatibilityResult) -> Assignment {
        let assignment = Assignment {
            channel,
            instrument_id,
            compatibility,
            timestamp: Utc::now(),
        };
        self.state.assignments.insert(channel, assignment.clone());
        self.refresh();
        self.notify(RoutingEvent::Assigned {
            channel,
            instrument_id: assignment.instrument_id.clone(),
            score: assignment.compatibility.score,
        });
        assignment
    }

    pub(crate) fn enter_preset_mode(&mut self, preset_id: &str) {
        self.state.mode = RoutingMode::Preset;
        self.state.current_preset_id = Some(preset_id.to_string());
    }

    pub(crate) fn notify(&self, event: RoutingEvent) {
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }

    fn refresh(&mut self) {
        self.validation = validate(
            &self.channels,
            &self.state.assignments,
            self.settings.low_compatibility_threshold,
        );
        self.stats = RoutingStats::compute(&self.channels, &self.state.assignments);
    }
}
