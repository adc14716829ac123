use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{info, warn};

use voicetally_core::{PresenceEvent, Tracker};

/// Size of the presence event queue between the API and the daemon
pub const EVENT_QUEUE: usize = 1024;

/// Single consumer of presence events; also owns the reset and autosave timers.
pub struct Daemon {
    tracker: Tracker,
    events: mpsc::Receiver<PresenceEvent>,
    reset_period: Duration,
    autosave_period: Option<Duration>,
}

impl Daemon {
    pub fn new(
        tracker: Tracker,
        events: mpsc::Receiver<PresenceEvent>,
        reset_period: Duration,
        autosave_period: Option<Duration>,
    ) -> Self {
        Self {
            tracker,
            events,
            reset_period,
            autosave_period,
        }
    }

    /// Process events until every sender is gone, then flush and persist.
    pub async fn run(mut self) -> Result<()> {
        let mut reset = periodic(self.reset_period);
        let mut autosave = self.autosave_period.map(periodic);

        info!(
            reset_secs = self.reset_period.as_secs(),
            autosave_secs = self.autosave_period.map(|p| p.as_secs()),
            "Daemon started"
        );

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.tracker.apply(event).await {
                            warn!(error = %e, ?event, "Failed to apply presence event");
                        }
                    }
                    None => {
                        info!("Presence event stream closed");
                        break;
                    }
                },
                _ = reset.tick() => {
                    if let Err(e) = self.tracker.reset().await {
                        warn!(error = %e, "Scheduled reset did not complete cleanly");
                    }
                }
                _ = tick(&mut autosave) => {
                    if let Err(e) = self.tracker.save().await {
                        warn!(error = %e, "Autosave failed");
                    }
                }
            }
        }

        self.tracker
            .shutdown()
            .await
            .context("Failed to persist time data on shutdown")
    }
}

/// Interval whose first tick fires one full period from now.
fn periodic(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
