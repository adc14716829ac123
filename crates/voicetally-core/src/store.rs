use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::codec::TimeTable;
use crate::leaderboard::top_n;
use crate::member::MemberId;

/// Per-member accumulated voice time plus the sessions currently open.
///
/// `total` and `active` are independent: a member may have a total without
/// an open session, an open session without a total, both or neither.
/// Every path that ends a session goes through [`SessionStore::stop_session`]
/// or [`SessionStore::clear_sessions`], which fold the elapsed time into
/// `total` before the session is dropped.
pub struct SessionStore {
    total: TimeTable,
    active: HashMap<MemberId, Instant>,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    /// Create an empty store driven by the system clock.
    pub fn new() -> Self {
        Self::from_table(TimeTable::new())
    }

    /// Create a store seeded with previously persisted totals.
    pub fn from_table(total: TimeTable) -> Self {
        Self::with_clock(total, Arc::new(SystemClock))
    }

    /// Create a store with a custom clock (useful for testing).
    pub fn with_clock(total: TimeTable, clock: Arc<dyn Clock>) -> Self {
        Self {
            total,
            active: HashMap::new(),
            clock,
        }
    }

    /// Whether the member currently has an open session.
    pub fn is_active(&self, member: MemberId) -> bool {
        self.active.contains_key(&member)
    }

    /// Members with an open session, in ascending id order.
    pub fn active_members(&self) -> Vec<MemberId> {
        let mut members: Vec<MemberId> = self.active.keys().copied().collect();
        members.sort_unstable();
        members
    }

    /// Accumulated totals as of the last committed session close.
    pub fn totals(&self) -> &TimeTable {
        &self.total
    }

    /// Open a session for `member`, closing any session it already has.
    pub fn start_session(&mut self, member: MemberId) {
        self.stop_session(member);
        self.open(member, self.clock.now());
    }

    /// Close the member's session and commit its elapsed time.
    ///
    /// A member without an open session is left untouched.
    pub fn stop_session(&mut self, member: MemberId) {
        if let Some(started) = self.active.remove(&member) {
            self.close(member, started, self.clock.now());
        }
    }

    /// Open fresh sessions for every given member.
    ///
    /// Callers must make sure no session is open (see [`SessionStore::clear_sessions`]);
    /// existing sessions are not closed first.
    pub fn populate_sessions<I>(&mut self, members: I)
    where
        I: IntoIterator<Item = MemberId>,
    {
        debug_assert!(
            self.active.is_empty(),
            "populate_sessions called with open sessions"
        );
        let now = self.clock.now();
        let mut opened = 0usize;
        for member in members {
            self.open(member, now);
            opened += 1;
        }
        debug!(opened, "Populated sessions");
    }

    /// Close every open session. Returns the members whose sessions were closed.
    pub fn clear_sessions(&mut self) -> Vec<MemberId> {
        let now = self.clock.now();
        let mut closed: Vec<(MemberId, Instant)> = self.active.drain().collect();
        closed.sort_unstable_by_key(|(member, _)| *member);

        for &(member, started) in &closed {
            self.close(member, started, now);
        }

        closed.into_iter().map(|(member, _)| member).collect()
    }

    /// Fold all in-flight time into the totals while keeping everyone's session open.
    pub fn commit(&mut self) {
        let members = self.clear_sessions();
        self.populate_sessions(members);
    }

    /// Wipe every total and restart sessions for the members in `snapshot`.
    ///
    /// `snapshot` should be a freshly fetched view of who is active right now.
    /// Returns the number of records wiped, counted after open sessions were
    /// folded in.
    pub fn reset<I>(&mut self, snapshot: I) -> usize
    where
        I: IntoIterator<Item = MemberId>,
    {
        let closed = self.clear_sessions();
        let wiped = self.total.len();
        self.total.clear();
        debug!(closed = closed.len(), wiped, "Reset totals");
        self.populate_sessions(snapshot);
        wiped
    }

    /// Total time recorded for `member`, including its in-flight session.
    ///
    /// Returns `None` when the member has never been seen since the last reset.
    pub fn member_time(&mut self, member: MemberId) -> Option<Duration> {
        if self.is_active(member) {
            self.start_session(member);
        }
        self.total.get(&member).copied()
    }

    /// The `n` members with the most accumulated time, longest first.
    pub fn top(&mut self, n: usize) -> Vec<(MemberId, Duration)> {
        self.commit();
        top_n(&self.total, n)
    }

    /// Up-to-date copy of the totals. Open sessions stay open.
    pub fn snapshot(&mut self) -> TimeTable {
        self.commit();
        self.total.clone()
    }

    /// Close every session and return the final totals for persisting.
    pub fn flush(&mut self) -> TimeTable {
        self.clear_sessions();
        self.total.clone()
    }

    fn open(&mut self, member: MemberId, now: Instant) {
        self.active.insert(member, now);
    }

    fn close(&mut self, member: MemberId, started: Instant, now: Instant) {
        let elapsed = now.saturating_duration_since(started);
        *self.total.entry(member).or_default() += elapsed;
        debug!(%member, elapsed_secs = elapsed.as_secs_f64(), "Closed session");
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
