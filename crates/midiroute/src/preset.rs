//! Named routing presets.
//!
//! The whole collection lives as one JSON array under `PRESETS_KEY` (or a
//! caller-chosen key) in a `PersistedStore`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::notify::RoutingEvent;
use crate::persist::PersistedStore;
use crate::store::RoutingStore;
use crate::types::{InstrumentId, Preset, PresetAssignment, PresetMetadata};
use crate::{Error, Result};

pub const PRESETS_KEY: &str = "midi-routing-presets";

/// A stored pair that could not be re-applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedPair {
    pub channel: u8,
    pub instrument_id: InstrumentId,
    pub reason: String,
}

/// Outcome of `apply_preset`. Skips are not failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetApplyReport {
    pub preset_id: String,
    pub applied: usize,
    pub skipped: Vec<SkippedPair>,
}

pub struct PresetLibrary<S: PersistedStore> {
    store: S,
    key: String,
}

impl<S: PersistedStore> PresetLibrary<S> {
    pub fn new(store: S) -> Self {
        Self::with_key(store, PRESETS_KEY)
    }

    pub fn with_key(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// All presets, oldest first.
    pub fn list(&self) -> Result<Vec<Preset>> {
        match self.store.get(&self.key)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn get(&self, preset_id: &str) -> Result<Option<Preset>> {
        Ok(self.list()?.into_iter().find(|p| p.id == preset_id))
    }

    /// Snapshot the current assignment table under `name`.
    pub fn create_preset(&self, name: &str, routing: &RoutingStore) -> Result<Preset> {
        let assignments = routing
            .assignments()
            .values()
            .map(|a| PresetAssignment {
                channel: a.channel,
                instrument_id: a.instrument_id.clone(),
                instrument_name: routing
                    .instrument(&a.instrument_id)
                    .map(|i| i.name.clone())
                    .unwrap_or_else(|| a.instrument_id.to_string()),
            })
            .collect::<Vec<_>>();

        let preset = Preset {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            metadata: PresetMetadata {
                created: Utc::now(),
                channel_count: routing.channels().len(),
                assignment_count: assignments.len(),
            },
            assignments,
        };

        let mut presets = self.list()?;
        presets.push(preset.clone());
        self.save(&presets)?;

        info!("saved preset {:?} ({}) with {} assignments", preset.name, preset.id, preset.assignments.len());
        Ok(preset)
    }

    /// Replace the routing with a stored preset.
    ///
    /// Pairs whose instrument (or channel) is not present any more are
    /// skipped with a warning and listed in the report.
    pub fn apply_preset(&self, preset_id: &str, routing: &mut RoutingStore) -> Result<PresetApplyReport> {
        let Some(preset) = self.get(preset_id)? else {
            warn!("cannot apply preset {}: not found", preset_id);
            return Err(Error::PresetNotFound(preset_id.to_string()));
        };

        routing.clear_all();

        let mut applied = 0;
        let mut skipped = Vec::new();
        for pair in &preset.assignments {
            match routing.commit(pair.channel, &pair.instrument_id) {
                Ok(_) => applied += 1,
                Err(e) => {
                    warn!(
                        "preset {}: skipping channel {} → {}: {}",
                        preset.id, pair.channel, pair.instrument_id, e
                    );
                    skipped.push(SkippedPair {
                        channel: pair.channel,
                        instrument_id: pair.instrument_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        routing.enter_preset_mode(&preset.id);
        routing.notify(RoutingEvent::PresetApplied {
            preset_id: preset.id.clone(),
            applied,
            skipped: skipped.len(),
        });

        Ok(PresetApplyReport {
            preset_id: preset.id,
            applied,
            skipped,
        })
    }

    pub fn delete_preset(&self, preset_id: &str) -> Result<Preset> {
        let mut presets = self.list()?;
        let Some(index) = presets.iter().position(|p| p.id == preset_id) else {
            warn!("cannot delete preset {}: not found", preset_id);
            return Err(Error::PresetNotFound(preset_id.to_string()));
        };

        let removed = presets.remove(index);
        self.save(&presets)?;
        info!("deleted preset {:?} ({})", removed.name, removed.id);
        Ok(removed)
    }

    fn save(&self, presets: &[Preset]) -> Result<()> {
        let json = serde_json::to_string(presets)?;
        self.store.set(&self.key, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NullObserver;
    use crate::persist::MemoryStore;
    use crate::types::{ChannelSummary, InstrumentDescriptor, InstrumentState, NoteRange, RoutingMode};
    use std::sync::{Arc, Mutex};

    fn device(id: &str, name: &str, kind: &str) -> InstrumentDescriptor {
        InstrumentDescriptor {
            id: id.into(),
            name: name.to_string(),
            instrument_type: kind.to_string(),
            note_range: Some(NoteRange::new(0, 127)),
            supports_velocity: true,
            state: InstrumentState::Ready,
        }
    }

    fn routing() -> RoutingStore {
        let mut channels = Vec::new();
        for (number, hint) in [(0, "Piano"), (1, "Bass"), (9, "Drums")] {
            let mut ch = ChannelSummary::new(number);
            ch.instrument_hint = hint.to_string();
            ch.note_count = 10;
            ch.note_range = NoteRange::new(36, 72);
            channels.push(ch);
        }

        let mut store = RoutingStore::new(Arc::new(NullObserver));
        store.load(
            channels,
            vec![
                device("grand", "Grand Piano", "piano"),
                device("mono", "Mono Bass", "bass"),
                device("kit", "Drum Kit", "drums"),
            ],
        );
        store
    }

    #[test]
    fn create_snapshots_names_and_counts() {
        let library = PresetLibrary::new(MemoryStore::new());
        let mut store = routing();
        store.assign(0, "grand").unwrap();
        store.assign(9, "kit").unwrap();

        let preset = library.create_preset("Live set", &store).unwrap();
        assert_eq!(preset.metadata.channel_count, 3);
        assert_eq!(preset.metadata.assignment_count, 2);
        assert_eq!(preset.assignments[0].instrument_name, "Grand Piano");
        assert_eq!(preset.assignments[1].channel, 9);

        assert_eq!(library.list().unwrap(), vec![preset]);
    }

    #[test]
    fn apply_restores_and_sets_mode() {
        let library = PresetLibrary::new(MemoryStore::new());
        let mut store = routing();
        store.auto_route(0.3);
        let preset = library.create_preset("Auto", &store).unwrap();

        store.clear_all();
        let report = library.apply_preset(&preset.id, &mut store).unwrap();
        assert_eq!(report.applied, 3);
        assert!(report.skipped.is_empty());
        assert_eq!(store.mode(), RoutingMode::Preset);
        assert_eq!(store.current_preset_id(), Some(preset.id.as_str()));
        assert!(store.validation().is_valid);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn each_skipped_pair_warns_once() {
        let library = PresetLibrary::new(MemoryStore::new());
        let mut store = routing();
        store.auto_route(0.3);
        let preset = library.create_preset("Full rig", &store).unwrap();

        let channels = store.channels().to_vec();
        store.load(channels, vec![device("grand", "Grand Piano", "piano")]);

        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let report = tracing::subscriber::with_default(subscriber, || {
            library.apply_preset(&preset.id, &mut store).unwrap()
        });

        assert_eq!(report.applied, 1);
        assert_eq!(report.skipped.len(), 2);
        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.lines().filter(|l| l.contains("WARN")).count(), 2);
        assert!(output.contains("skipping channel 1"));
        assert!(output.contains("skipping channel 9"));
    }

    #[test]
    fn manual_assign_leaves_preset_mode() {
        let library = PresetLibrary::new(MemoryStore::new());
        let mut store = routing();
        store.assign(0, "grand").unwrap();
        let preset = library.create_preset("One", &store).unwrap();
        library.apply_preset(&preset.id, &mut store).unwrap();
        assert_eq!(store.current_preset_id(), Some(preset.id.as_str()));

        store.assign(1, "mono").unwrap();
        assert_eq!(store.mode(), RoutingMode::Manual);
        assert_eq!(store.current_preset_id(), None);
        assert_eq!(store.export().current_preset_id, None);
    }

    #[test]
    fn missing_preset_leaves_routing_alone() {
        let library = PresetLibrary::new(MemoryStore::new());
        let mut store = routing();
        store.assign(0, "grand").unwrap();

        let err = library.apply_preset("nope", &mut store).unwrap_err();
        assert!(matches!(err, Error::PresetNotFound(_)));
        assert!(store.is_channel_assigned(0));
        assert!(matches!(library.delete_preset("nope"), Err(Error::PresetNotFound(_))));
    }

    #[test]
    fn delete_removes_only_that_preset() {
        let library = PresetLibrary::new(MemoryStore::new());
        let store = routing();
        let first = library.create_preset("one", &store).unwrap();
        let second = library.create_preset("two", &store).unwrap();

        assert_eq!(library.delete_preset(&first.id).unwrap().name, "one");
        let remaining = library.list().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, second.id);
    }

    #[test]
    fn custom_key_is_isolated() {
        let library = PresetLibrary::with_key(MemoryStore::new(), "other");
        library.create_preset("x", &routing()).unwrap();
        assert!(library.store().get(PRESETS_KEY).unwrap().is_none());
        assert!(library.store().get("other").unwrap().is_some());
    }
}
