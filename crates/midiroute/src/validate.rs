use crate::types::{Assignment, ChannelSummary, Conflict, InstrumentId, RoutingStats, ValidationResult};
use std::collections::{BTreeMap, HashMap};

/// Score below which an assignment is reported as a poor fit.
pub const DEFAULT_LOW_COMPATIBILITY: f64 = 0.3;

/// Scan the assignment table for problems.
///
/// A routing is valid when every known channel is assigned. Duplicate
/// instrument use and low compatibility are reported but do not make it
/// invalid. The table is keyed by channel, so ownership of a shared
/// instrument goes by channel number, not by when each channel was
/// assigned: the lowest channel owns it and every higher channel on the
/// same instrument gets a duplicate conflict.
pub fn validate(
    channels: &[ChannelSummary],
    assignments: &BTreeMap<u8, Assignment>,
    low_compatibility: f64,
) -> ValidationResult {
    let mut conflicts = Vec::new();

    for channel in channels {
        if !assignments.contains_key(&channel.number) {
            conflicts.push(Conflict::Unassigned {
                channel: channel.number,
                message: format!("{} is not assigned to an instrument", channel.name),
            });
        }
    }
    let is_valid = conflicts.is_empty();

    let mut owners: HashMap<&InstrumentId, u8> = HashMap::new();
    for assignment in assignments.values() {
        match owners.get(&assignment.instrument_id) {
            Some(&owner) => conflicts.push(Conflict::Duplicate {
                channel: assignment.channel,
                instrument_id: assignment.instrument_id.clone(),
                owner_channel: owner,
                message: format!(
                    "Channel {} uses {}, already assigned to channel {}",
                    assignment.channel as u16 + 1,
                    assignment.instrument_id,
                    owner as u16 + 1
                ),
            }),
            None => {
                owners.insert(&assignment.instrument_id, assignment.channel);
            }
        }
    }

    for assignment in assignments.values() {
        let score = assignment.compatibility.score;
        if score < low_compatibility {
            conflicts.push(Conflict::LowCompatibility {
                channel: assignment.channel,
                instrument_id: assignment.instrument_id.clone(),
                score,
                message: format!(
                    "Channel {} has low compatibility with {} ({:.0}%)",
                    assignment.channel as u16 + 1,
                    assignment.instrument_id,
                    score * 100.0
                ),
            });
        }
    }

    ValidationResult {
        is_valid,
        conflicts,
    }
}

impl RoutingStats {
    pub fn compute(channels: &[ChannelSummary], assignments: &BTreeMap<u8, Assignment>) -> Self {
        let total_channels = channels.len();
        let assigned_channels = channels
            .iter()
            .filter(|c| assignments.contains_key(&c.number))
            .count();

        let compatibility_score = if assignments.is_empty() {
            0.0
        } else {
            assignments
                .values()
                .map(|a| a.compatibility.score)
                .sum::<f64>()
                / assignments.len() as f64
        };

        Self {
            total_channels,
            assigned_channels,
            unassigned_channels: total_channels - assigned_channels,
            compatibility_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompatibilityDetails, CompatibilityResult};
    use chrono::Utc;

    fn channels(numbers: &[u8]) -> Vec<ChannelSummary> {
        numbers.iter().map(|&n| ChannelSummary::new(n)).collect()
    }

    fn assign(table: &mut BTreeMap<u8, Assignment>, channel: u8, instrument: &str, score: f64) {
        table.insert(
            channel,
            Assignment {
                channel,
                instrument_id: instrument.into(),
                compatibility: CompatibilityResult {
                    score,
                    reasons: Vec::new(),
                    details: CompatibilityDetails::default(),
                },
                timestamp: Utc::now(),
            },
        );
    }

    #[test]
    fn empty_table_reports_every_channel() {
        let result = validate(&channels(&[0, 1, 9]), &BTreeMap::new(), DEFAULT_LOW_COMPATIBILITY);
        assert!(!result.is_valid);
        assert_eq!(result.conflicts.len(), 3);
        assert!(result
            .conflicts
            .iter()
            .all(|c| matches!(c, Conflict::Unassigned { .. })));
        assert_eq!(result.conflicts[2].message(), "Channel 10 is not assigned to an instrument");
    }

    #[test]
    fn duplicate_flags_later_channel_only() {
        let mut table = BTreeMap::new();
        assign(&mut table, 5, "synth", 0.9);
        assign(&mut table, 2, "synth", 0.9);

        let result = validate(&channels(&[2, 5]), &table, DEFAULT_LOW_COMPATIBILITY);
        assert!(result.is_valid);
        assert_eq!(result.conflicts.len(), 1);
        match &result.conflicts[0] {
            Conflict::Duplicate {
                channel,
                owner_channel,
                ..
            } => {
                assert_eq!(*channel, 5);
                assert_eq!(*owner_channel, 2);
            }
            other => panic!("expected duplicate, got {:?}", other),
        }
    }

    #[test]
    fn low_compatibility_is_advisory() {
        let mut table = BTreeMap::new();
        assign(&mut table, 0, "kazoo", 0.1);

        let result = validate(&channels(&[0]), &table, DEFAULT_LOW_COMPATIBILITY);
        assert!(result.is_valid);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].kind(), "low-compatibility");
    }

    #[test]
    fn threshold_is_exclusive() {
        let mut table = BTreeMap::new();
        assign(&mut table, 0, "synth", 0.3);
        assert!(validate(&channels(&[0]), &table, 0.3).conflicts.is_empty());
    }

    #[test]
    fn stats_average_scores() {
        let mut table = BTreeMap::new();
        assign(&mut table, 0, "a", 0.5);
        assign(&mut table, 1, "b", 1.0);

        let stats = RoutingStats::compute(&channels(&[0, 1, 2]), &table);
        assert_eq!(stats.total_channels, 3);
        assert_eq!(stats.assigned_channels, 2);
        assert_eq!(stats.unassigned_channels, 1);
        assert!((stats.compatibility_score - 0.75).abs() < 1e-9);

        let empty = RoutingStats::compute(&channels(&[0]), &BTreeMap::new());
        assert_eq!(empty.compatibility_score, 0.0);
    }
}
