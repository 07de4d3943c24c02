//! Greedy channel → instrument matching.
//!
//! Channels with the most notes pick first; each takes the best instrument
//! nobody has claimed yet. This is not a globally optimal matching, but at
//! MIDI scale (16 channels) it is predictable and fast, O(channels × instruments).

use crate::compat::score;
use crate::types::{ChannelSummary, CompatibilityResult, InstrumentDescriptor, InstrumentId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Minimum compatibility for an automatic assignment.
pub const DEFAULT_MIN_SCORE: f64 = 0.3;

/// A proposed pairing from `auto_route`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteMatch {
    pub channel: u8,
    pub instrument_id: InstrumentId,
    pub compatibility: CompatibilityResult,
}

/// Match channels to instruments.
///
/// Channels are visited by descending note count (ties keep input order).
/// Each takes the unclaimed instrument with the strictly highest score, so
/// equal scores go to whichever instrument comes first in `instruments`;
/// pass a stably ordered list to get stable results. A channel whose best
/// score is below `min_score` is left out rather than forced onto a poor fit.
pub fn auto_route(
    channels: &[ChannelSummary],
    instruments: &[InstrumentDescriptor],
    min_score: f64,
) -> Vec<RouteMatch> {
    let mut order: Vec<&ChannelSummary> = channels.iter().collect();
    order.sort_by(|a, b| b.note_count.cmp(&a.note_count));

    let mut claimed = vec![false; instruments.len()];
    let mut matches = Vec::new();

    for channel in order {
        let mut best: Option<(usize, CompatibilityResult)> = None;

        for (index, instrument) in instruments.iter().enumerate() {
            if claimed[index] {
                continue;
            }
            let result = score(channel, instrument);
            if best.as_ref().map_or(true, |(_, b)| result.score > b.score) {
                best = Some((index, result));
            }
        }

        match best {
            Some((index, compatibility)) if compatibility.score >= min_score => {
                debug!(
                    "auto-route: channel {} → {} ({:.2})",
                    channel.number, instruments[index].id, compatibility.score
                );
                claimed[index] = true;
                matches.push(RouteMatch {
                    channel: channel.number,
                    instrument_id: instruments[index].id.clone(),
                    compatibility,
                });
            }
            Some((index, compatibility)) => {
                debug!(
                    "auto-route: channel {} left unassigned, best {} scored {:.2} < {:.2}",
                    channel.number, instruments[index].id, compatibility.score, min_score
                );
            }
            None => {
                debug!("auto-route: no instruments left for channel {}", channel.number);
            }
        }
    }

    matches
}
