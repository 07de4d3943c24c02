//! Channel ↔ instrument compatibility scoring.
//!
//! Four independent factors, weighted to sum to 1.0:
//!
//! | factor       | weight | awarded when                                  |
//! |--------------|--------|-----------------------------------------------|
//! | type match   | 0.4    | instrument type is accepted by the hint family |
//! | note range   | 0.3    | scaled by overlap; 0.5x if the range is unknown |
//! | velocity     | 0.2    | instrument responds to velocity               |
//! | availability | 0.1    | instrument is ready                           |

use crate::gm;
use crate::types::{
    ChannelSummary, CompatibilityDetails, CompatibilityResult, InstrumentDescriptor,
    InstrumentState, NoteRange,
};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const TYPE_WEIGHT: f64 = 0.4;
pub const RANGE_WEIGHT: f64 = 0.3;
pub const VELOCITY_WEIGHT: f64 = 0.2;
pub const AVAILABILITY_WEIGHT: f64 = 0.1;

/// Range factor above which "note range compatible" is reported.
const RANGE_REASON_THRESHOLD: f64 = 0.8;

/// Broad instrument category a channel hint resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentFamily {
    Piano,
    Organ,
    Guitar,
    Bass,
    Strings,
    Ensemble,
    Brass,
    Reed,
    Pipe,
    Lead,
    Pad,
    Synth,
    Drum,
    Percussion,
}

impl InstrumentFamily {
    pub const ALL: [InstrumentFamily; 14] = [
        Self::Piano,
        Self::Organ,
        Self::Guitar,
        Self::Bass,
        Self::Strings,
        Self::Ensemble,
        Self::Brass,
        Self::Reed,
        Self::Pipe,
        Self::Lead,
        Self::Pad,
        Self::Synth,
        Self::Drum,
        Self::Percussion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Piano => "Piano",
            Self::Organ => "Organ",
            Self::Guitar => "Guitar",
            Self::Bass => "Bass",
            Self::Strings => "Strings",
            Self::Ensemble => "Ensemble",
            Self::Brass => "Brass",
            Self::Reed => "Reed",
            Self::Pipe => "Pipe",
            Self::Lead => "Lead",
            Self::Pad => "Pad",
            Self::Synth => "Synth",
            Self::Drum => "Drum",
            Self::Percussion => "Percussion",
        }
    }

    /// Instrument types (lowercase) this family can be routed to.
    pub fn accepted_types(&self) -> &'static [&'static str] {
        match self {
            Self::Piano => &["piano", "keyboard", "keys", "synth"],
            Self::Organ => &["organ", "keyboard", "keys", "synth"],
            Self::Guitar => &["guitar", "synth"],
            Self::Bass => &["bass", "synth"],
            Self::Strings => &["strings", "orchestral", "synth"],
            Self::Ensemble => &["strings", "choir", "orchestral", "synth"],
            Self::Brass => &["brass", "orchestral", "synth"],
            Self::Reed => &["woodwind", "reed", "synth"],
            Self::Pipe => &["woodwind", "flute", "synth"],
            Self::Lead => &["synth", "lead"],
            Self::Pad => &["synth", "pad"],
            Self::Synth => &["synth"],
            Self::Drum => &["drums", "drum", "percussion", "drum machine"],
            Self::Percussion => &["percussion", "drums", "mallet"],
        }
    }

    /// Words in a free-form hint that identify this family.
    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Piano => &["piano", "harpsichord", "clavinet", "keys"],
            Self::Organ => &["organ", "accordion", "harmonica"],
            Self::Guitar => &["guitar"],
            Self::Bass => &["bass"],
            Self::Strings => &["string", "violin", "viola", "cello", "contrabass", "harp"],
            Self::Ensemble => &["ensemble", "choir", "orchestra", "voice"],
            Self::Brass => &["brass", "trumpet", "trombone", "tuba", "horn"],
            Self::Reed => &["reed", "sax", "oboe", "bassoon", "clarinet"],
            Self::Pipe => &["pipe", "flute", "piccolo", "recorder", "whistle", "ocarina"],
            Self::Lead => &["lead"],
            Self::Pad => &["pad"],
            Self::Synth => &["synth", "fx"],
            Self::Drum => &["drum", "kit"],
            Self::Percussion => &["percussion", "mallet", "bell", "marimba", "xylophone"],
        }
    }

    /// Family of a General MIDI program, by its block of eight.
    pub fn from_program(program: u8) -> Option<Self> {
        match (program & 0x7F) / 8 {
            0 => Some(Self::Piano),
            1 => Some(Self::Percussion),
            2 => Some(Self::Organ),
            3 => Some(Self::Guitar),
            4 => Some(Self::Bass),
            5 => Some(Self::Strings),
            6 => Some(Self::Ensemble),
            7 => Some(Self::Brass),
            8 => Some(Self::Reed),
            9 => Some(Self::Pipe),
            10 => Some(Self::Lead),
            11 => Some(Self::Pad),
            12 => Some(Self::Synth),
            14 => Some(Self::Percussion),
            // Ethnic and sound effects have no routing family
            _ => None,
        }
    }

    /// Resolve a channel hint.
    ///
    /// Tried in order: a family name ("Piano"), a GM program name
    /// ("Electric Bass (finger)"), then the first word of the hint that is a
    /// family keyword ("Warm Pad Layer" → Pad).
    pub fn from_hint(hint: &str) -> Option<Self> {
        let hint = hint.trim();
        if hint.is_empty() {
            return None;
        }

        if let Some(family) = Self::ALL
            .iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(hint))
        {
            return Some(*family);
        }

        if let Some(program) = gm::program_number(hint) {
            return Self::from_program(program);
        }

        let lower = hint.to_ascii_lowercase();
        lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|word| !word.is_empty())
            .find_map(|word| {
                Self::ALL.iter().copied().find(|family| {
                    family
                        .keywords()
                        .iter()
                        .any(|kw| word == *kw || word.strip_suffix('s') == Some(*kw))
                })
            })
    }

    pub fn accepts(&self, instrument_type: &str) -> bool {
        let instrument_type = instrument_type.trim();
        self.accepted_types()
            .iter()
            .any(|t| t.eq_ignore_ascii_case(instrument_type))
    }
}

impl fmt::Display for InstrumentFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score how well `instrument` suits `channel`.
///
/// Pure: the same pair always produces the same result.
pub fn score(channel: &ChannelSummary, instrument: &InstrumentDescriptor) -> CompatibilityResult {
    let mut details = CompatibilityDetails {
        family: InstrumentFamily::from_hint(&channel.instrument_hint),
        ..Default::default()
    };
    let mut reasons = Vec::new();

    if details
        .family
        .is_some_and(|family| family.accepts(&instrument.instrument_type))
    {
        details.type_match = TYPE_WEIGHT;
        reasons.push("type match".to_string());
    }

    let range = range_factor(&channel.note_range, instrument.note_range.as_ref());
    details.note_range = RANGE_WEIGHT * range;
    if range > RANGE_REASON_THRESHOLD {
        reasons.push("note range compatible".to_string());
    }

    if instrument.supports_velocity {
        details.velocity = VELOCITY_WEIGHT;
        reasons.push("velocity supported".to_string());
    }

    if instrument.state == InstrumentState::Ready {
        details.availability = AVAILABILITY_WEIGHT;
        reasons.push("instrument ready".to_string());
    }

    let score = (details.type_match + details.note_range + details.velocity + details.availability)
        .clamp(0.0, 1.0);

    CompatibilityResult {
        score,
        reasons,
        details,
    }
}

/// Fraction of the channel's span the instrument can play.
fn range_factor(channel: &NoteRange, instrument: Option<&NoteRange>) -> f64 {
    let Some(instrument) = instrument else {
        return 0.5;
    };

    if instrument.contains(channel) {
        return 1.0;
    }

    let span = channel.span();
    if span == 0 {
        // A single pitch outside the range
        return 0.0;
    }

    let low = channel.min.max(instrument.min) as f64;
    let high = channel.max.min(instrument.max) as f64;
    ((high - low).max(0.0) / span as f64).min(1.0)
}
