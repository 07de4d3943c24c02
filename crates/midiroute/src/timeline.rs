//! Flat MIDI timeline consumed by the channel extractor.
//!
//! `from_smf` is a thin adapter over midly: it walks every track with
//! absolute ticks and pairs note-ons with their note-offs so each note-on
//! carries a duration.

use midly::{MidiMessage, Smf, TrackEventKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// A timed event on one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiEvent {
    /// Absolute tick.
    pub time: u64,
    /// Channel, 0-15.
    pub channel: u8,
    pub kind: MidiEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MidiEventKind {
    NoteOn { note: u8, velocity: u8, duration: u64 },
    NoteOff { note: u8 },
    ControlChange { controller: u8, value: u8 },
    ProgramChange { program: u8 },
    /// Signed bend, centered on zero.
    PitchBend { value: i16 },
    /// Polyphonic aftertouch when `note` is set, channel pressure otherwise.
    Aftertouch { note: Option<u8>, pressure: u8 },
}

impl MidiEvent {
    pub fn note_on(time: u64, channel: u8, note: u8, velocity: u8, duration: u64) -> Self {
        Self {
            time,
            channel,
            kind: MidiEventKind::NoteOn {
                note,
                velocity,
                duration,
            },
        }
    }

    pub fn program_change(time: u64, channel: u8, program: u8) -> Self {
        Self {
            time,
            channel,
            kind: MidiEventKind::ProgramChange { program },
        }
    }
}

/// Parse a Standard MIDI File into a time-ordered event list.
pub fn from_smf(bytes: &[u8]) -> crate::Result<Vec<MidiEvent>> {
    let smf = Smf::parse(bytes).map_err(|e| crate::Error::MidiParse(e.to_string()))?;
    let mut events = Vec::new();

    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut current_tick: u64 = 0;
        // (channel, pitch) → stack of indices into `events` awaiting a note-off
        let mut pending: HashMap<(u8, u8), Vec<usize>> = HashMap::new();

        for event in track {
            current_tick += event.delta.as_int() as u64;

            let TrackEventKind::Midi { channel, message } = event.kind else {
                continue;
            };
            let ch = channel.as_int();

            let kind = match message {
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                    pending
                        .entry((ch, key.as_int()))
                        .or_default()
                        .push(events.len());
                    MidiEventKind::NoteOn {
                        note: key.as_int(),
                        velocity: vel.as_int(),
                        duration: 0,
                    }
                }
                // vel=0 NoteOn is NoteOff
                MidiMessage::NoteOff { key, .. } | MidiMessage::NoteOn { key, .. } => {
                    close_note(&mut events, &mut pending, ch, key.as_int(), current_tick);
                    MidiEventKind::NoteOff { note: key.as_int() }
                }
                MidiMessage::Controller { controller, value } => MidiEventKind::ControlChange {
                    controller: controller.as_int(),
                    value: value.as_int(),
                },
                MidiMessage::ProgramChange { program } => MidiEventKind::ProgramChange {
                    program: program.as_int(),
                },
                MidiMessage::PitchBend { bend } => MidiEventKind::PitchBend {
                    value: bend.as_int(),
                },
                MidiMessage::Aftertouch { key, vel } => MidiEventKind::Aftertouch {
                    note: Some(key.as_int()),
                    pressure: vel.as_int(),
                },
                MidiMessage::ChannelAftertouch { vel } => MidiEventKind::Aftertouch {
                    note: None,
                    pressure: vel.as_int(),
                },
            };

            events.push(MidiEvent {
                time: current_tick,
                channel: ch,
                kind,
            });
        }

        // Close any unclosed notes at the track's final tick
        let dangling: Vec<usize> = pending.into_values().flatten().collect();
        if !dangling.is_empty() {
            debug!(
                "track {} ends with {} unclosed notes",
                track_index,
                dangling.len()
            );
        }
        for index in dangling {
            set_duration(&mut events[index], current_tick);
        }
    }

    // Stable: events at the same tick keep file order
    events.sort_by(|a, b| a.time.cmp(&b.time).then(a.channel.cmp(&b.channel)));

    debug!("parsed {} timeline events from {} tracks", events.len(), smf.tracks.len());
    Ok(events)
}

fn close_note(
    events: &mut [MidiEvent],
    pending: &mut HashMap<(u8, u8), Vec<usize>>,
    channel: u8,
    pitch: u8,
    tick: u64,
) {
    if let Some(index) = pending.get_mut(&(channel, pitch)).and_then(|stack| stack.pop()) {
        set_duration(&mut events[index], tick);
    }
}

fn set_duration(event: &mut MidiEvent, end_tick: u64) {
    let onset = event.time;
    if let MidiEventKind::NoteOn { duration, .. } = &mut event.kind {
        *duration = end_tick.saturating_sub(onset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_midi() -> Vec<u8> {
        // Format 1: tempo track + one note track on channel 2
        let mut buf = Vec::new();
        buf.extend_from_slice(b"MThd");
        buf.extend_from_slice(&6u32.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&2u16.to_be_bytes());
        buf.extend_from_slice(&480u16.to_be_bytes());

        let mut track0 = Vec::new();
        track0.extend_from_slice(&[0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20]);
        track0.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(track0.len() as u32).to_be_bytes());
        buf.extend_from_slice(&track0);

        let mut track1 = Vec::new();
        // Program change to 33 (fingered bass)
        track1.extend_from_slice(&[0x00, 0xC2, 33]);
        // Note On E2, off after 480 ticks
        track1.extend_from_slice(&[0x00, 0x92, 40, 90]);
        track1.extend_from_slice(&[0x83, 0x60, 0x82, 40, 0]);
        // Note On A2, released with vel-0 note-on after 240 ticks
        track1.extend_from_slice(&[0x00, 0x92, 45, 110]);
        track1.extend_from_slice(&[0x81, 0x70, 0x92, 45, 0]);
        // Modulation wheel
        track1.extend_from_slice(&[0x00, 0xB2, 1, 64]);
        // Dangling note, closed by end of track 120 ticks later
        track1.extend_from_slice(&[0x00, 0x92, 47, 80]);
        track1.extend_from_slice(&[0x78, 0xFF, 0x2F, 0x00]);
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(track1.len() as u32).to_be_bytes());
        buf.extend_from_slice(&track1);

        buf
    }

    #[test]
    fn note_durations_are_paired() {
        let events = from_smf(&make_test_midi()).unwrap();

        let notes: Vec<(u64, u8, u64)> = events
            .iter()
            .filter_map(|e| match e.kind {
                MidiEventKind::NoteOn { note, duration, .. } => Some((e.time, note, duration)),
                _ => None,
            })
            .collect();

        assert_eq!(notes, vec![(0, 40, 480), (480, 45, 240), (720, 47, 120)]);
        assert!(events.iter().all(|e| e.channel == 2));
    }

    #[test]
    fn non_note_events_are_kept() {
        let events = from_smf(&make_test_midi()).unwrap();

        assert!(events
            .iter()
            .any(|e| e.kind == MidiEventKind::ProgramChange { program: 33 }));
        assert!(events.iter().any(|e| e.kind
            == MidiEventKind::ControlChange {
                controller: 1,
                value: 64
            }));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e.kind, MidiEventKind::NoteOff { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn events_are_time_ordered() {
        let events = from_smf(&make_test_midi()).unwrap();
        assert!(events.windows(2).all(|w| w[0].time <= w[1].time));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = from_smf(b"not a midi file").unwrap_err();
        assert!(matches!(err, crate::Error::MidiParse(_)));
    }
}
