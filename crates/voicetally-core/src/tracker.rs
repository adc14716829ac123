use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::debug;
use voicetally_logging::{LogEvent, Logger};

use crate::codec::TimeTable;
use crate::error::Result;
use crate::member::MemberId;
use crate::persist::Persistence;
use crate::presence::{PresenceEvent, PresenceSource};
use crate::store::SessionStore;

struct Shared {
    store: Mutex<SessionStore>,
    presence: Arc<dyn PresenceSource>,
    persistence: Arc<dyn Persistence>,
    logger: Arc<Logger>,
    stopped: AtomicBool,
}

/// Thread-safe handle to the session store.
///
/// All mutations go through one lock, so no caller observes a session that is
/// half closed. Work that touches the presence snapshot or the disk runs on
/// the blocking pool.
#[derive(Clone)]
pub struct Tracker {
    shared: Arc<Shared>,
}

impl Tracker {
    pub fn new(
        store: SessionStore,
        presence: Arc<dyn PresenceSource>,
        persistence: Arc<dyn Persistence>,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store: Mutex::new(store),
                presence,
                persistence,
                logger,
                stopped: AtomicBool::new(false),
            }),
        }
    }

    /// Load persisted totals and build a tracker around them.
    ///
    /// Fails if the persisted data cannot be read or is malformed.
    pub async fn open(
        presence: Arc<dyn PresenceSource>,
        persistence: Arc<dyn Persistence>,
        logger: Arc<Logger>,
    ) -> Result<Self> {
        let loader = persistence.clone();
        let table = tokio::task::spawn_blocking(move || loader.load()).await??;

        logger.log(&LogEvent::TrackerStarted {
            members: table.len(),
            location: persistence.location(),
        });

        Ok(Self::new(
            SessionStore::from_table(table),
            presence,
            persistence,
            logger,
        ))
    }

    fn store(&self) -> MutexGuard<'_, SessionStore> {
        self.shared.store.lock().expect("session store lock poisoned")
    }

    /// Whether [`Tracker::shutdown`] has run.
    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    pub fn is_active(&self, member: MemberId) -> bool {
        self.store().is_active(member)
    }

    /// Open a session for `member`. Ignored once the tracker has stopped.
    pub fn start_session(&self, member: MemberId) {
        if !self.is_stopped() {
            self.store().start_session(member);
        }
    }

    /// Close the member's session. Ignored once the tracker has stopped.
    pub fn stop_session(&self, member: MemberId) {
        if !self.is_stopped() {
            self.store().stop_session(member);
        }
    }

    /// Apply a presence change. Events arriving after shutdown are dropped.
    pub async fn apply(&self, event: PresenceEvent) -> Result<()> {
        if self.is_stopped() {
            debug!(?event, "Tracker stopped, dropping presence event");
            return Ok(());
        }

        match event {
            PresenceEvent::BecameActive { member } => self.start_session(member),
            PresenceEvent::BecameInactive { member } => self.stop_session(member),
            PresenceEvent::Resync => {
                self.reconcile().await?;
            }
        }
        Ok(())
    }

    /// Close every session and reopen sessions for whoever is active right now.
    ///
    /// Returns the number of open sessions afterwards.
    pub async fn reconcile(&self) -> Result<usize> {
        let this = self.clone();
        let active = tokio::task::spawn_blocking(move || {
            let snapshot = this.shared.presence.active_members();
            let mut store = this.store();
            store.clear_sessions();
            store.populate_sessions(snapshot);
            store.active_members().len()
        })
        .await?;

        self.shared
            .logger
            .log(&LogEvent::SessionsReconciled { active });
        Ok(active)
    }

    /// Total time for `member` up to now, or `None` if it has no record.
    pub fn member_time(&self, member: MemberId) -> Option<Duration> {
        self.store().member_time(member)
    }

    /// Leaderboard of the `n` longest totals, including in-flight time.
    pub fn top(&self, n: usize) -> Vec<(MemberId, Duration)> {
        self.store().top(n)
    }

    /// Wipe all totals, restart sessions for the live presence snapshot and
    /// persist the emptied table.
    pub async fn reset(&self) -> Result<()> {
        let this = self.clone();
        let (wiped, active, table) = tokio::task::spawn_blocking(move || {
            let snapshot = this.shared.presence.active_members();
            let mut store = this.store();
            let wiped = store.reset(snapshot);
            let active = store.active_members().len();
            (wiped, active, store.snapshot())
        })
        .await?;

        self.shared
            .logger
            .log(&LogEvent::TallyReset { wiped, active });

        self.persist(table).await
    }

    /// Persist current totals without ending anyone's session.
    pub async fn save(&self) -> Result<()> {
        let table = self.store().snapshot();
        self.persist(table).await
    }

    /// Close every session and persist the final totals.
    ///
    /// Runs once; later calls return immediately. Presence events applied
    /// afterwards are ignored.
    pub async fn shutdown(&self) -> Result<()> {
        if self.shared.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let table = self.store().flush();
        let members = table.len();
        self.persist(table).await?;

        self.shared
            .logger
            .log(&LogEvent::TrackerStopped { members });
        Ok(())
    }

    async fn persist(&self, table: TimeTable) -> Result<()> {
        let persistence = self.shared.persistence.clone();
        let members = table.len();
        let result = tokio::task::spawn_blocking(move || persistence.save(&table)).await?;
        let location = self.shared.persistence.location();

        match result {
            Ok(()) => {
                self.shared
                    .logger
                    .log(&LogEvent::SnapshotSaved { members, location });
                Ok(())
            }
            Err(e) => {
                self.shared.logger.log(&LogEvent::SaveFailed {
                    location,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }
}
