use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use voicetally_core::{
    JsonFileStore, ManualClock, MemberId, Persistence, PresenceEvent, PresenceRegistry,
    PresenceSource, Result, SessionStore, TallyError, TimeTable, Tracker, VoiceState,
    VoiceStateUpdate,
};
use voicetally_logging::{LogFormat, Logger};

/// Persistence that keeps every saved table in memory.
#[derive(Default)]
struct MemoryStore {
    saved: Mutex<Vec<TimeTable>>,
}

impl MemoryStore {
    fn saves(&self) -> Vec<TimeTable> {
        self.saved.lock().unwrap().clone()
    }
}

impl Persistence for MemoryStore {
    fn load(&self) -> Result<TimeTable> {
        Ok(self.saved.lock().unwrap().last().cloned().unwrap_or_default())
    }

    fn save(&self, table: &TimeTable) -> Result<()> {
        self.saved.lock().unwrap().push(table.clone());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// Persistence whose writes always fail.
struct BrokenDisk;

impl Persistence for BrokenDisk {
    fn load(&self) -> Result<TimeTable> {
        Ok(TimeTable::new())
    }

    fn save(&self, _table: &TimeTable) -> Result<()> {
        Err(TallyError::Worker("disk unplugged".to_string()))
    }

    fn location(&self) -> String {
        "nowhere".to_string()
    }
}

fn join(registry: &PresenceRegistry, member: u64) -> Option<PresenceEvent> {
    registry.update(VoiceStateUpdate {
        member: MemberId(member),
        name: None,
        state: VoiceState {
            channel: Some(1),
            ..Default::default()
        },
    })
}

fn logger() -> Arc<Logger> {
    Arc::new(Logger::new(LogFormat::Compact))
}

struct Harness {
    tracker: Tracker,
    clock: Arc<ManualClock>,
    registry: Arc<PresenceRegistry>,
    disk: Arc<MemoryStore>,
}

fn harness(seed: &[(u64, u64)]) -> Harness {
    let clock = Arc::new(ManualClock::new());
    let table: TimeTable = seed
        .iter()
        .map(|&(m, secs)| (MemberId(m), Duration::from_secs(secs)))
        .collect();
    let registry = Arc::new(PresenceRegistry::new());
    let disk = Arc::new(MemoryStore::default());
    let tracker = Tracker::new(
        SessionStore::with_clock(table, clock.clone()),
        registry.clone(),
        disk.clone(),
        logger(),
    );
    Harness {
        tracker,
        clock,
        registry,
        disk,
    }
}

// ============================================================
// Presence events
// ============================================================

#[tokio::test]
async fn test_events_open_and_close_sessions() {
    let h = harness(&[]);

    let joined = join(&h.registry, 7).unwrap();
    h.tracker.apply(joined).await.unwrap();
    h.clock.advance(Duration::from_secs(40));
    h.tracker
        .apply(PresenceEvent::BecameInactive { member: MemberId(7) })
        .await
        .unwrap();

    assert!(!h.tracker.is_active(MemberId(7)));
    assert_eq!(h.tracker.member_time(MemberId(7)), Some(Duration::from_secs(40)));
}

#[tokio::test]
async fn test_resync_rebuilds_sessions_without_losing_time() {
    let h = harness(&[]);
    h.tracker.start_session(MemberId(1));
    h.clock.advance(Duration::from_secs(15));

    let event = h.registry.replace(vec![VoiceStateUpdate {
        member: MemberId(2),
        name: Some("bo".to_string()),
        state: VoiceState {
            channel: Some(9),
            ..Default::default()
        },
    }]);
    h.tracker.apply(event).await.unwrap();

    assert!(!h.tracker.is_active(MemberId(1)));
    assert!(h.tracker.is_active(MemberId(2)));
    assert_eq!(h.tracker.member_time(MemberId(1)), Some(Duration::from_secs(15)));
}

#[tokio::test]
async fn test_reconcile_on_startup_uses_snapshot() {
    let h = harness(&[(3, 60)]);
    join(&h.registry, 3);
    join(&h.registry, 4);

    let active = h.tracker.reconcile().await.unwrap();

    assert_eq!(active, 2);
    h.clock.advance(Duration::from_secs(10));
    assert_eq!(
        h.tracker.top(5),
        vec![
            (MemberId(3), Duration::from_secs(70)),
            (MemberId(4), Duration::from_secs(10)),
        ]
    );
}

// ============================================================
// Reset and persistence
// ============================================================

#[tokio::test]
async fn test_reset_wipes_totals_and_persists_empty_table() {
    let h = harness(&[(1, 600), (2, 300)]);
    join(&h.registry, 2);
    h.tracker.start_session(MemberId(2));
    h.clock.advance(Duration::from_secs(5));

    h.tracker.reset().await.unwrap();

    assert_eq!(h.tracker.member_time(MemberId(1)), None);
    assert!(h.tracker.is_active(MemberId(2)));
    let saves = h.disk.saves();
    assert_eq!(saves.len(), 1);
    assert!(saves[0].values().all(|d| d.is_zero()));
}

#[tokio::test]
async fn test_save_keeps_sessions_running() {
    let h = harness(&[]);
    h.tracker.start_session(MemberId(5));
    h.clock.advance(Duration::from_secs(9));

    h.tracker.save().await.unwrap();

    assert!(h.tracker.is_active(MemberId(5)));
    assert_eq!(h.disk.saves()[0][&MemberId(5)], Duration::from_secs(9));
}

#[tokio::test]
async fn test_shutdown_flushes_once_and_ignores_later_events() {
    let h = harness(&[(1, 10)]);
    h.tracker.start_session(MemberId(1));
    h.clock.advance(Duration::from_secs(20));

    h.tracker.shutdown().await.unwrap();
    h.tracker.shutdown().await.unwrap();
    h.tracker
        .apply(PresenceEvent::BecameActive { member: MemberId(8) })
        .await
        .unwrap();

    let saves = h.disk.saves();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0][&MemberId(1)], Duration::from_secs(30));
    assert!(h.tracker.is_stopped());
    assert!(!h.tracker.is_active(MemberId(8)));
}

#[tokio::test]
async fn test_direct_session_calls_ignored_after_shutdown() {
    let h = harness(&[]);
    h.tracker.shutdown().await.unwrap();

    h.tracker.start_session(MemberId(4));
    h.clock.advance(Duration::from_secs(30));
    h.tracker.stop_session(MemberId(4));

    assert!(!h.tracker.is_active(MemberId(4)));
    assert_eq!(h.tracker.member_time(MemberId(4)), None);
}

#[tokio::test]
async fn test_save_failure_is_reported() {
    let tracker = Tracker::new(
        SessionStore::new(),
        Arc::new(PresenceRegistry::new()),
        Arc::new(BrokenDisk),
        logger(),
    );

    let err = tracker.shutdown().await.unwrap_err();

    assert!(err.to_string().contains("disk unplugged"));
}

#[tokio::test]
async fn test_open_restores_totals_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("time_data.json");
    std::fs::write(
        &path,
        r#"{"11": "0001-01-01 01:00:00", "12": "0001-01-01 00:00:30.500000"}"#,
    )
    .unwrap();
    let presence: Arc<dyn PresenceSource> = Arc::new(PresenceRegistry::new());

    let tracker = Tracker::open(presence, Arc::new(JsonFileStore::new(&path)), logger())
        .await
        .unwrap();

    assert_eq!(tracker.member_time(MemberId(11)), Some(Duration::from_secs(3_600)));
    assert_eq!(tracker.member_time(MemberId(12)), Some(Duration::from_millis(30_500)));
}

#[tokio::test]
async fn test_open_fails_on_malformed_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("time_data.json");
    std::fs::write(&path, r#"{"eleven": "0001-01-01 01:00:00"}"#).unwrap();

    let result = Tracker::open(
        Arc::new(PresenceRegistry::new()),
        Arc::new(JsonFileStore::new(&path)),
        logger(),
    )
    .await;

    assert!(matches!(result, Err(TallyError::MalformedKey { .. })));
}

#[tokio::test]
async fn test_shutdown_then_reopen_round_trips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("time_data.json");
    let clock = Arc::new(ManualClock::new());
    let tracker = Tracker::new(
        SessionStore::with_clock(TimeTable::new(), clock.clone()),
        Arc::new(PresenceRegistry::new()),
        Arc::new(JsonFileStore::new(&path)),
        logger(),
    );
    tracker.start_session(MemberId(21));
    clock.advance(Duration::from_secs(75));

    tracker.shutdown().await.unwrap();
    let reopened = Tracker::open(
        Arc::new(PresenceRegistry::new()),
        Arc::new(JsonFileStore::new(&path)),
        logger(),
    )
    .await
    .unwrap();

    assert_eq!(reopened.member_time(MemberId(21)), Some(Duration::from_secs(75)));
    assert!(!reopened.is_active(MemberId(21)));
}
