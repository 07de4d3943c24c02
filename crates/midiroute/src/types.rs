use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::compat::InstrumentFamily;

/// Inclusive MIDI pitch range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRange {
    pub min: u8,
    pub max: u8,
}

impl NoteRange {
    /// Degenerate range that any recorded pitch widens.
    pub const EMPTY: NoteRange = NoteRange { min: 127, max: 0 };

    pub fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    pub fn span(&self) -> u8 {
        self.max.saturating_sub(self.min)
    }

    pub fn widen(&mut self, pitch: u8) {
        self.min = self.min.min(pitch);
        self.max = self.max.max(pitch);
    }

    /// True if `other` lies entirely within this range.
    pub fn contains(&self, other: &NoteRange) -> bool {
        other.min >= self.min && other.max <= self.max
    }
}

impl Default for NoteRange {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VelocityStats {
    pub min: u8,
    pub max: u8,
    /// Midpoint of min and max, not the mean over all notes.
    pub avg: u8,
}

impl Default for VelocityStats {
    fn default() -> Self {
        Self {
            min: 127,
            max: 0,
            avg: 0,
        }
    }
}

/// One recorded note-on, kept for later analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSample {
    pub pitch: u8,
    pub velocity: u8,
    /// Ticks until the matching note-off (0 if unknown).
    pub duration: u64,
    /// Absolute tick of the note-on.
    pub time: u64,
}

/// Per-channel statistics derived from a MIDI timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSummary {
    /// Channel number, 0-15.
    pub number: u8,
    pub name: String,
    /// Program name from the file, used only as a scoring hint.
    pub instrument_hint: String,
    pub program: u8,
    pub note_count: usize,
    pub notes: Vec<NoteSample>,
    pub note_range: NoteRange,
    pub velocity: VelocityStats,
}

impl ChannelSummary {
    pub fn new(number: u8) -> Self {
        Self {
            number,
            name: format!("Channel {}", number as u16 + 1),
            instrument_hint: String::new(),
            program: 0,
            note_count: 0,
            notes: Vec::new(),
            note_range: NoteRange::EMPTY,
            velocity: VelocityStats::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrumentId(pub String);

impl InstrumentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for InstrumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for InstrumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentState {
    Ready,
    Busy,
    Offline,
    #[default]
    #[serde(other)]
    Unknown,
}

impl InstrumentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Busy => "busy",
            Self::Offline => "offline",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for InstrumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A physical or virtual device that can receive a routed channel.
///
/// Supplied by device discovery as a point-in-time snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentDescriptor {
    pub id: InstrumentId,
    pub name: String,
    /// Free-form category such as "piano" or "synth".
    #[serde(rename = "type", default)]
    pub instrument_type: String,
    #[serde(default)]
    pub note_range: Option<NoteRange>,
    #[serde(default)]
    pub supports_velocity: bool,
    #[serde(default)]
    pub state: InstrumentState,
}

/// Parse an instrument snapshot from a JSON array.
pub fn load_instruments(json: &str) -> crate::Result<Vec<InstrumentDescriptor>> {
    Ok(serde_json::from_str(json)?)
}

/// Weighted contribution of each scoring factor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompatibilityDetails {
    pub family: Option<InstrumentFamily>,
    pub type_match: f64,
    pub note_range: f64,
    pub velocity: f64,
    pub availability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityResult {
    /// Overall fit, 0.0-1.0.
    pub score: f64,
    pub reasons: Vec<String>,
    pub details: CompatibilityDetails,
}

/// A committed channel → instrument pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub channel: u8,
    pub instrument_id: InstrumentId,
    pub compatibility: CompatibilityResult,
    pub timestamp: DateTime<Utc>,
}

/// How the current routing was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    #[default]
    Manual,
    Auto,
    Preset,
}

impl RoutingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Auto => "auto",
            Self::Preset => "preset",
        }
    }
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoutingState {
    /// Keyed by channel number; iterates in ascending channel order.
    pub assignments: BTreeMap<u8, Assignment>,
    pub mode: RoutingMode,
    pub current_preset_id: Option<String>,
}

/// A problem found in the assignment table. Recomputed, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Conflict {
    Unassigned {
        channel: u8,
        message: String,
    },
    Duplicate {
        channel: u8,
        instrument_id: InstrumentId,
        /// First channel (ascending) routed to the same instrument.
        owner_channel: u8,
        message: String,
    },
    LowCompatibility {
        channel: u8,
        instrument_id: InstrumentId,
        score: f64,
        message: String,
    },
}

impl Conflict {
    pub fn channel(&self) -> u8 {
        match self {
            Self::Unassigned { channel, .. }
            | Self::Duplicate { channel, .. }
            | Self::LowCompatibility { channel, .. } => *channel,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Unassigned { message, .. }
            | Self::Duplicate { message, .. }
            | Self::LowCompatibility { message, .. } => message,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unassigned { .. } => "unassigned",
            Self::Duplicate { .. } => "duplicate",
            Self::LowCompatibility { .. } => "low-compatibility",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// True when every known channel has an assignment.
    pub is_valid: bool,
    pub conflicts: Vec<Conflict>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self {
            is_valid: true,
            conflicts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoutingStats {
    pub total_channels: usize,
    pub assigned_channels: usize,
    pub unassigned_channels: usize,
    /// Mean compatibility over all assignments, 0.0 when there are none.
    pub compatibility_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetAssignment {
    pub channel: u8,
    pub instrument_id: InstrumentId,
    pub instrument_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetMetadata {
    pub created: DateTime<Utc>,
    pub channel_count: usize,
    pub assignment_count: usize,
}

/// A named, persisted snapshot of an assignment table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub name: String,
    pub assignments: Vec<PresetAssignment>,
    pub metadata: PresetMetadata,
}

/// Serializable snapshot of a routing, for transfer between sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub mode: RoutingMode,
    pub current_preset_id: Option<String>,
    pub assignments: Vec<Assignment>,
    pub stats: RoutingStats,
    pub timestamp: DateTime<Utc>,
}

impl RoutingConfig {
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
