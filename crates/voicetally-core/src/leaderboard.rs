use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;

use crate::codec::TimeTable;
use crate::member::MemberId;

/// Badges shown next to leaderboard places. Everyone past third gets the last one.
pub const TOP_BADGES: [&str; 4] = ["\u{1f947}", "\u{1f948}", "\u{1f949}", "\u{1f3c5}"];

/// Select the `n` members with the largest totals, longest first.
///
/// Uses a bounded min-heap so the cost is `O(len * log n)`. Equal totals are
/// ordered by ascending member id.
pub fn top_n(table: &TimeTable, n: usize) -> Vec<(MemberId, Duration)> {
    if n == 0 {
        return Vec::new();
    }

    // Reverse(member) makes the lower id win a tie
    let mut heap: BinaryHeap<Reverse<(Duration, Reverse<MemberId>)>> =
        BinaryHeap::with_capacity(n.min(table.len()) + 1);

    for (&member, &duration) in table {
        let entry = Reverse((duration, Reverse(member)));
        if heap.len() < n {
            heap.push(entry);
        } else if let Some(worst) = heap.peek() {
            if entry < *worst {
                heap.pop();
                heap.push(entry);
            }
        }
    }

    heap.into_sorted_vec()
        .into_iter()
        .map(|Reverse((duration, Reverse(member)))| (member, duration))
        .collect()
}

/// Format a duration as zero-padded `HH:MM:SS`.
///
/// Hours are counted from the whole duration and widen past two digits
/// instead of wrapping at a day.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

/// Badge for a zero-based leaderboard position.
pub fn badge(position: usize) -> &'static str {
    TOP_BADGES[position.min(TOP_BADGES.len() - 1)]
}
