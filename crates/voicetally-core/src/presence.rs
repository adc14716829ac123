use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::member::MemberId;

/// A member's state in the voice space, as reported by the chat platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceState {
    /// Voice channel the member is connected to, if any.
    #[serde(default)]
    pub channel: Option<u64>,
    #[serde(default)]
    pub afk: bool,
    #[serde(default)]
    pub self_mute: bool,
    /// Muted by a moderator.
    #[serde(default)]
    pub mute: bool,
}

impl VoiceState {
    /// Connected to a channel, not AFK and able to speak.
    pub fn is_active(&self) -> bool {
        self.channel.is_some() && !self.afk && !self.self_mute && !self.mute
    }
}

/// One voice-state report for a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStateUpdate {
    pub member: MemberId,
    #[serde(default)]
    pub name: Option<String>,
    pub state: VoiceState,
}

/// Presence changes that drive session bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PresenceEvent {
    BecameActive { member: MemberId },
    BecameInactive { member: MemberId },
    /// The full presence picture was replaced; sessions must be rebuilt.
    Resync,
}

/// Answers "who is active right now".
pub trait PresenceSource: Send + Sync {
    fn active_members(&self) -> Vec<MemberId>;
}

#[derive(Default)]
struct RegistryInner {
    states: HashMap<MemberId, VoiceState>,
    names: HashMap<MemberId, String>,
}

/// Last known voice state and display name of every member.
#[derive(Default)]
pub struct PresenceRegistry {
    inner: RwLock<RegistryInner>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a member's new voice state.
    ///
    /// Returns an event only when the member crossed the active/inactive line.
    pub fn update(&self, update: VoiceStateUpdate) -> Option<PresenceEvent> {
        let mut inner = self.inner.write().expect("presence registry lock poisoned");
        let VoiceStateUpdate {
            member,
            name,
            state,
        } = update;

        if let Some(name) = name {
            inner.names.insert(member, name);
        }

        let previous = if state.channel.is_some() {
            inner.states.insert(member, state)
        } else {
            inner.states.remove(&member)
        };
        let before = previous.unwrap_or_default();

        match (before.is_active(), state.is_active()) {
            (false, true) => Some(PresenceEvent::BecameActive { member }),
            (true, false) => Some(PresenceEvent::BecameInactive { member }),
            _ => None,
        }
    }

    /// Replace every known voice state with a fresh full listing.
    pub fn replace(&self, updates: Vec<VoiceStateUpdate>) -> PresenceEvent {
        let mut inner = self.inner.write().expect("presence registry lock poisoned");
        inner.states.clear();

        for update in updates {
            if let Some(name) = update.name {
                inner.names.insert(update.member, name);
            }
            if update.state.channel.is_some() {
                inner.states.insert(update.member, update.state);
            }
        }

        PresenceEvent::Resync
    }

    pub fn name(&self, member: MemberId) -> Option<String> {
        let inner = self.inner.read().expect("presence registry lock poisoned");
        inner.names.get(&member).cloned()
    }

    /// Known display name, or the member id when no name was ever reported.
    pub fn display_name(&self, member: MemberId) -> String {
        self.name(member).unwrap_or_else(|| member.to_string())
    }
}

impl PresenceSource for PresenceRegistry {
    fn active_members(&self) -> Vec<MemberId> {
        let inner = self.inner.read().expect("presence registry lock poisoned");
        let mut members: Vec<MemberId> = inner
            .states
            .iter()
            .filter(|(_, state)| state.is_active())
            .map(|(member, _)| *member)
            .collect();
        members.sort_unstable();
        members
    }
}
