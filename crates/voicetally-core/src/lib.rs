//! # voicetally-core
//!
//! Tracks how long each community member spends active in voice.
//!
//! ## Key Types
//!
//! - [`SessionStore`] - Open sessions and accumulated totals
//! - [`Tracker`] - Lock-guarded handle used by the daemon and the API
//! - [`PresenceRegistry`] - Voice states, activity transitions and display names
//! - [`JsonFileStore`] - Time data file persistence
//!
//! Elapsed time is only ever committed when a session closes. Queries close
//! and reopen sessions so their answers include time up to "now".

mod clock;
mod codec;
mod error;
mod leaderboard;
mod member;
mod persist;
mod presence;
mod store;
mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{
    decode, decode_duration, encode, encode_duration, read_table, write_table, zero_epoch,
    TimeTable,
};
pub use error::{Result, TallyError};
pub use leaderboard::{badge, format_duration, top_n, TOP_BADGES};
pub use member::MemberId;
pub use persist::{JsonFileStore, Persistence};
pub use presence::{PresenceEvent, PresenceRegistry, PresenceSource, VoiceState, VoiceStateUpdate};
pub use store::SessionStore;
pub use tracker::Tracker;
