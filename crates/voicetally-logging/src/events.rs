use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Structured log events for the tracker lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    TrackerStarted {
        members: usize,
        location: String,
    },
    /// Sessions were rebuilt from a presence snapshot
    SessionsReconciled {
        active: usize,
    },
    TallyReset {
        wiped: usize,
        active: usize,
    },
    SnapshotSaved {
        members: usize,
        location: String,
    },
    SaveFailed {
        location: String,
        error: String,
    },
    TrackerStopped {
        members: usize,
    },
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Operator-facing logger for tracker lifecycle events. Writes to stderr.
pub struct Logger {
    format: LogFormat,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self { format }
    }

    pub fn log(&self, event: &LogEvent) {
        if let Some(line) = self.render(event) {
            let _ = writeln!(std::io::stderr(), "{}", line);
        }
    }

    fn render(&self, event: &LogEvent) -> Option<String> {
        match self.format {
            LogFormat::Json => serde_json::to_string(event).ok(),
            LogFormat::Pretty => Some(Self::render_pretty(event)),
            LogFormat::Compact => Some(Self::render_compact(event)),
        }
    }

    fn render_pretty(event: &LogEvent) -> String {
        match event {
            LogEvent::TrackerStarted { members, location } => format!(
                "{} {} {} {}",
                "▶".bright_blue(),
                "voicetally".bold().bright_white(),
                format!("loaded {} {}", members, plural(*members, "member", "members")),
                format!("from {}", location).dimmed()
            ),
            LogEvent::SessionsReconciled { active } => format!(
                "  {} {} {} active",
                "↻".bright_cyan(),
                "Reconciled:".dimmed(),
                active
            ),
            LogEvent::TallyReset { wiped, active } => format!(
                "  {} {} wiped {} {}, {} now active",
                "⟲".bright_magenta(),
                "Reset:".bright_magenta().bold(),
                wiped,
                plural(*wiped, "record", "records"),
                active
            ),
            LogEvent::SnapshotSaved { members, location } => format!(
                "  {} Saved {} {} {}",
                "✓".bright_green(),
                members,
                plural(*members, "record", "records"),
                format!("to {}", location).dimmed()
            ),
            LogEvent::SaveFailed { location, error } => format!(
                "{} Failed to save time data to {}: {}",
                "✗".bright_red(),
                location,
                error.bright_red()
            ),
            LogEvent::TrackerStopped { members } => format!(
                "{} Stopped with {} {}",
                "■".bright_blue(),
                members,
                plural(*members, "record", "records")
            ),
        }
    }

    fn render_compact(event: &LogEvent) -> String {
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        match event {
            LogEvent::TrackerStarted { members, .. } => {
                format!("[{}] tracker:start members={}", timestamp, members)
            }
            LogEvent::SessionsReconciled { active } => {
                format!("[{}] sessions:reconcile active={}", timestamp, active)
            }
            LogEvent::TallyReset { wiped, active } => {
                format!("[{}] tally:reset wiped={} active={}", timestamp, wiped, active)
            }
            LogEvent::SnapshotSaved { members, .. } => {
                format!("[{}] save:ok members={}", timestamp, members)
            }
            LogEvent::SaveFailed { error, .. } => {
                format!("[{}] save:error {}", timestamp, error)
            }
            LogEvent::TrackerStopped { members } => {
                format!("[{}] tracker:stop members={}", timestamp, members)
            }
        }
    }
}

fn plural<'a>(count: usize, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 {
        one
    } else {
        many
    }
}
