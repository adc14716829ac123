use std::time::Duration;

use colored::Colorize;
use serde::Serialize;

use voicetally_core::{badge, format_duration, MemberId};

/// One rendered leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub badge: &'static str,
    pub member: MemberId,
    pub name: String,
    pub total: String,
    pub seconds: u64,
}

/// A single member's accumulated time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberTime {
    pub member: MemberId,
    pub name: String,
    pub total: String,
    pub seconds: u64,
}

impl MemberTime {
    pub fn new(member: MemberId, name: String, duration: Duration) -> Self {
        Self {
            member,
            name,
            total: format_duration(duration),
            seconds: duration.as_secs(),
        }
    }
}

/// Attach ranks, badges and display names to a top-N selection.
pub fn entries<F>(rows: Vec<(MemberId, Duration)>, name_of: F) -> Vec<LeaderboardEntry>
where
    F: Fn(MemberId) -> String,
{
    rows.into_iter()
        .enumerate()
        .map(|(i, (member, duration))| LeaderboardEntry {
            rank: i + 1,
            badge: badge(i),
            member,
            name: name_of(member),
            total: format_duration(duration),
            seconds: duration.as_secs(),
        })
        .collect()
}

/// Message shown for a member without any recorded time.
pub fn not_seen(name: &str) -> String {
    format!("We haven't seen {} today...", name)
}

pub fn print_leaderboard(entries: &[LeaderboardEntry]) {
    if entries.is_empty() {
        println!("{}", "Nobody has been active yet.".dimmed());
        return;
    }

    let name_width = entries
        .iter()
        .map(|e| e.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(6);

    println!(
        "     {:<width$}  {}",
        "MEMBER".bold(),
        "TIME".bold(),
        width = name_width
    );
    for entry in entries {
        println!(
            "{:>2} {} {:<width$}  {}",
            entry.rank,
            entry.badge,
            entry.name,
            entry.total.bright_green(),
            width = name_width
        );
    }
}

pub fn print_member(time: &MemberTime) {
    println!("{} {}", time.name.bold(), time.total.bright_green());
}
