use crate::gm;
use crate::timeline::{MidiEvent, MidiEventKind};
use crate::types::{ChannelSummary, NoteSample};
use std::collections::BTreeMap;

/// Derive per-channel statistics from a timeline.
///
/// Only channels with at least one note-on appear in the output, in
/// ascending channel order. Program changes set the channel's program (the
/// first one seen wins) but never create a channel on their own; every other
/// event is ignored.
pub fn extract_channels(timeline: &[MidiEvent]) -> Vec<ChannelSummary> {
    let mut channels: BTreeMap<u8, ChannelSummary> = BTreeMap::new();
    let mut programs: BTreeMap<u8, u8> = BTreeMap::new();

    for event in timeline {
        match event.kind {
            MidiEventKind::NoteOn {
                note,
                velocity,
                duration,
            } if velocity > 0 => {
                let summary = channels
                    .entry(event.channel)
                    .or_insert_with(|| ChannelSummary::new(event.channel));

                summary.note_count += 1;
                summary.notes.push(NoteSample {
                    pitch: note,
                    velocity,
                    duration,
                    time: event.time,
                });
                summary.note_range.widen(note);
                summary.velocity.min = summary.velocity.min.min(velocity);
                summary.velocity.max = summary.velocity.max.max(velocity);
            }
            MidiEventKind::ProgramChange { program } => {
                programs.entry(event.channel).or_insert(program);
            }
            _ => {}
        }
    }

    channels
        .into_values()
        .map(|mut summary| {
            summary.program = programs.get(&summary.number).copied().unwrap_or(0);
            summary.instrument_hint = gm::channel_hint(summary.number, summary.program).to_string();
            summary.velocity.avg = midpoint(summary.velocity.min, summary.velocity.max);
            summary
        })
        .collect()
}

/// `round((min + max) / 2)`, with halves rounding up.
fn midpoint(min: u8, max: u8) -> u8 {
    ((min as u16 + max as u16 + 1) / 2) as u8
}
