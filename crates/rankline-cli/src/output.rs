//! Event rendering for the terminal.

use chrono::{DateTime, Local};
use owo_colors::OwoColorize;
use rankline_core::LeaderboardEvent;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Console,
    Json,
}

#[derive(Serialize)]
struct JsonLine<'a> {
    time: String,
    event: &'static str,
    #[serde(flatten)]
    payload: &'a LeaderboardEvent,
}

/// Render one event as a single line
pub fn format_event(format: OutputFormat, event: &LeaderboardEvent, at: DateTime<Local>) -> String {
    match format {
        OutputFormat::Console => format_console(event),
        OutputFormat::Json => format_json(event, at),
    }
}

fn format_console(event: &LeaderboardEvent) -> String {
    let status = if event.success {
        "ok".green().to_string()
    } else {
        "failed".red().to_string()
    };
    let player = if event.player.is_empty() {
        "-"
    } else {
        event.player.as_str()
    };

    let mut line = format!("{:<17} {:<6} player={}", event.phase.as_str().bold(), status, player);
    for (key, value) in &event.fields {
        line.push_str(&format!(" {}={}", key, value));
    }
    line
}

fn format_json(event: &LeaderboardEvent, at: DateTime<Local>) -> String {
    let line = JsonLine {
        time: at.to_rfc3339(),
        event: "leaderboard",
        payload: event,
    };
    serde_json::to_string(&line).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
}
