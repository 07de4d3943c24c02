//! Human-readable tables for terminal output.

use midiroute::{
    score, ChannelSummary, InstrumentDescriptor, Preset, PresetApplyReport, RoutingStore,
};
use owo_colors::OwoColorize;
use std::fmt::Write;

fn percent(score: f64) -> String {
    format!("{:>3.0}%", score * 100.0)
}

fn colored_score(score: f64, low: f64) -> String {
    let text = percent(score);
    if score >= 0.7 {
        text.green().to_string()
    } else if score >= low {
        text.yellow().to_string()
    } else {
        text.red().to_string()
    }
}

fn range_label(channel: &ChannelSummary) -> String {
    if channel.note_range.is_empty() {
        "-".to_string()
    } else {
        format!("{}-{}", channel.note_range.min, channel.note_range.max)
    }
}

pub fn channels(channels: &[ChannelSummary]) -> String {
    let mut out = String::new();
    if channels.is_empty() {
        let _ = writeln!(out, "No channels with notes.");
        return out;
    }

    let _ = writeln!(
        out,
        "{}",
        format!(
            "{:<4} {:<11} {:<26} {:>5} {:>7} {:>9}",
            "#", "Name", "Hint", "Notes", "Range", "Velocity"
        )
        .bold()
    );
    for c in channels {
        let _ = writeln!(
            out,
            "{:<4} {:<11} {:<26} {:>5} {:>7} {:>9}",
            c.number,
            c.name,
            c.instrument_hint,
            c.note_count,
            range_label(c),
            format!("{}-{}", c.velocity.min, c.velocity.max),
        );
    }
    out
}

/// Assignment table, conflicts, then summary stats.
pub fn routing(store: &RoutingStore, low: f64) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{} {}", "Mode:".bold(), store.mode());
    if let Some(preset) = store.current_preset_id() {
        let _ = writeln!(out, "{} {}", "Preset:".bold(), preset);
    }
    let _ = writeln!(out);

    for channel in store.channels() {
        let label = format!("{:<11} {:<26}", channel.name, channel.instrument_hint);
        match store.assignment(channel.number) {
            Some(a) => {
                let name = store
                    .instrument(&a.instrument_id)
                    .map(|i| i.name.as_str())
                    .unwrap_or("(disconnected)");
                let _ = writeln!(
                    out,
                    "{} → {} {} {}",
                    label,
                    a.instrument_id.bright_cyan(),
                    name.dimmed(),
                    colored_score(a.compatibility.score, low),
                );
            }
            None => {
                let _ = writeln!(out, "{} → {}", label, "unassigned".red());
            }
        }
    }

    let validation = store.validation();
    if !validation.conflicts.is_empty() {
        let _ = writeln!(out, "\n{}", "Conflicts:".yellow().bold());
        for conflict in &validation.conflicts {
            let _ = writeln!(out, "  [{}] {}", conflict.kind(), conflict.message());
        }
    }

    let stats = store.stats();
    let status = if validation.is_valid {
        "valid".green().to_string()
    } else {
        "invalid".red().to_string()
    };
    let _ = writeln!(
        out,
        "\n{}/{} channels assigned, mean compatibility {}, routing {}",
        stats.assigned_channels,
        stats.total_channels,
        percent(stats.compatibility_score).trim_start(),
        status,
    );
    out
}

pub fn matrix(channels: &[ChannelSummary], instruments: &[InstrumentDescriptor]) -> String {
    let mut out = String::new();

    let mut header = format!("{:<11}", "");
    for instrument in instruments {
        let _ = write!(header, " {:>8.8}", instrument.id.as_str());
    }
    let _ = writeln!(out, "{}", header.bold());

    for channel in channels {
        let _ = write!(out, "{:<11}", channel.name);
        for instrument in instruments {
            let _ = write!(out, "     {}", colored_score(score(channel, instrument).score, 0.3));
        }
        let _ = writeln!(out);
    }
    out
}

pub fn presets(presets: &[Preset]) -> String {
    let mut out = String::new();
    if presets.is_empty() {
        let _ = writeln!(out, "No presets saved.");
        return out;
    }
    for preset in presets {
        let _ = writeln!(
            out,
            "{}  {}  {} assignments, {}",
            preset.id.dimmed(),
            preset.name.bold(),
            preset.metadata.assignment_count,
            preset.metadata.created.format("%Y-%m-%d %H:%M"),
        );
    }
    out
}

pub fn apply_report(report: &PresetApplyReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Applied {} of {} preset assignments",
        report.applied,
        report.applied + report.skipped.len()
    );
    for skipped in &report.skipped {
        let _ = writeln!(
            out,
            "  {} channel {} → {}: {}",
            "skipped".yellow(),
            skipped.channel,
            skipped.instrument_id,
            skipped.reason
        );
    }
    let _ = writeln!(out);
    out
}
