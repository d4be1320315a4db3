//! Plain-text reports for the CLI `--print` flag.

use std::fmt::Write;

use crate::periods::{FINAL_LABEL, QUARTER_LABELS};
use crate::schedule::ScheduleEntry;
use crate::scores::ScoreOutcome;

const NOT_AVAILABLE: &str = "N/A";

fn banner(out: &mut String, title: &str, width: usize) {
    let rule = "=".repeat(width);
    let _ = writeln!(out, "\n{rule}\n{title}\n{rule}");
}

pub fn scores_report(outcome: &ScoreOutcome) -> String {
    let mut out = String::new();
    banner(&mut out, "ESPN NFL GAME SCORES", 60);

    let teams = match outcome {
        ScoreOutcome::Teams { teams } => teams,
        ScoreOutcome::Failed { error, .. } => {
            let _ = writeln!(out, "\nError: {error}");
            return out;
        }
    };

    for (name, line) in teams.iter() {
        let _ = writeln!(out, "\n{name}:\n{}", "-".repeat(40));
        for (label, value) in line.ordered_periods() {
            let kind = if QUARTER_LABELS.contains(&label) {
                "Quarter"
            } else {
                "Period"
            };
            let _ = writeln!(out, "  {label:>6} {kind}: {value}");
        }
        if let Some(total) = line.final_score() {
            let _ = writeln!(out, "  {FINAL_LABEL:>6} Total: {total}");
        }
    }

    banner(&mut out, "SUMMARY", 60);
    for (name, line) in teams.iter() {
        let total = line.final_score().unwrap_or(NOT_AVAILABLE);
        let summary = line
            .ordered_periods()
            .iter()
            .map(|(label, value)| format!("{label}: {value}"))
            .collect::<Vec<_>>()
            .join(" | ");
        let _ = writeln!(out, "{name:20} Final: {total:>3}  ({summary})");
    }
    out
}

pub fn schedule_report(games: &[ScheduleEntry]) -> String {
    let mut out = String::new();
    banner(&mut out, "ESPN NFL SCHEDULE - UPCOMING GAMES", 80);

    for game in games {
        let field = |value: &Option<String>| value.as_deref().unwrap_or(NOT_AVAILABLE).to_string();
        let _ = writeln!(out, "\nWeek {}", field(&game.week));
        let _ = writeln!(out, "  Date: {}", field(&game.date));
        let _ = writeln!(out, "  Match-up: {}", field(&game.match_up));
        let _ = writeln!(out, "  Time: {}", field(&game.time));
        let _ = writeln!(out, "  TV: {}", field(&game.tv));
        let _ = writeln!(out, "  Game ID: {}", field(&game.game_id));
    }
    out
}
