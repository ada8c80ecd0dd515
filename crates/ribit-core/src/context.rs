//! Per-room conversation context with bounded retention.
//!
//! [`RoomContextStore`] holds the recent turns of each room that has
//! received a directed message. Retention is a fixed-capacity sliding
//! window: appending beyond `max_turns` evicts the oldest turn (FIFO).
//! What matters is recency of the conversation, not access frequency,
//! so this is deliberately not an LRU cache.
//!
//! Context is working memory -- it is never persisted across restarts.
//! Rooms are created lazily on first append, cleared by an explicit
//! (idempotent) reset, and optionally discarded after an idle age.
//! Callers only ever receive cloned snapshots.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::debug;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// A room participant.
    User,
    /// The agent itself.
    Agent,
}

/// One conversational turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// Who spoke.
    pub role: Role,
    /// What was said.
    pub text: String,
}

impl Turn {
    /// Convenience constructor.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// Mutable state for one room.
struct RoomContext {
    turns: VecDeque<Turn>,
    last_activity: Instant,
}

/// Bounded per-room turn history.
pub struct RoomContextStore {
    rooms: RwLock<HashMap<String, RoomContext>>,
    max_turns: usize,
    max_idle: Option<Duration>,
}

impl RoomContextStore {
    /// Create a store retaining at most `max_turns` turns per room.
    pub fn new(max_turns: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            max_turns,
            max_idle: None,
        }
    }

    /// Builder method to discard a room's context after an idle age.
    pub fn with_max_idle(mut self, max_idle: Option<Duration>) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Append a turn to a room, evicting the oldest turn if full.
    pub fn append_turn(&self, room_id: &str, role: Role, text: &str) {
        self.append_turn_at(room_id, role, text, Instant::now());
    }

    /// [`append_turn`](Self::append_turn) with an explicit clock, for tests.
    pub fn append_turn_at(&self, room_id: &str, role: Role, text: &str, now: Instant) {
        if self.max_turns == 0 {
            return;
        }

        let mut rooms = match self.rooms.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let room = rooms.entry(room_id.to_owned()).or_insert(RoomContext {
            turns: VecDeque::new(),
            last_activity: now,
        });

        if self.expired(room, now) {
            debug!(room_id, "discarding idle conversation context");
            room.turns.clear();
        }

        while room.turns.len() >= self.max_turns {
            room.turns.pop_front();
        }
        room.turns.push_back(Turn::new(role, text));
        room.last_activity = now;
    }

    /// Snapshot of a room's turns, oldest first. Empty if unknown.
    pub fn context(&self, room_id: &str) -> Vec<Turn> {
        self.context_at(room_id, Instant::now())
    }

    /// [`context`](Self::context) with an explicit clock, for tests.
    pub fn context_at(&self, room_id: &str, now: Instant) -> Vec<Turn> {
        let rooms = match self.rooms.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match rooms.get(room_id) {
            Some(room) if !self.expired(room, now) => room.turns.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Clear a room's turns. Resetting an unknown or already-empty room
    /// is a no-op, not an error.
    pub fn reset(&self, room_id: &str) {
        let mut rooms = match self.rooms.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if rooms.remove(room_id).is_some() {
            debug!(room_id, "conversation context reset");
        }
    }

    fn expired(&self, room: &RoomContext, now: Instant) -> bool {
        self.max_idle
            .is_some_and(|idle| now.duration_since(room.last_activity) >= idle)
    }
}
