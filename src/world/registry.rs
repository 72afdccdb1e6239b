//! Per-room player registry.

use std::time::Instant;

use hashbrown::HashMap;

use crate::util::now_ms;
use crate::world::spatial::{cell_for, CellKey};

/// Runtime player id, derived from the opaque player key.
pub type PlayerId = String;

/// Authoritative runtime state for one connected player.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub x: f64,
    pub y: f64,
    /// Derived from position; kept in lockstep with the spatial index.
    pub cell: CellKey,
    /// Wall-clock ms of the last state change, echoed on the wire.
    pub last_update_ms: u64,
    /// Set on every position change, cleared after broadcast.
    pub dirty: bool,
    /// Monotonic time of the last accepted move, for rate limiting.
    pub last_move_at: Option<Instant>,
}

impl Player {
    /// New player at the given position, dirty so the next broadcast
    /// includes it.
    pub fn new(id: PlayerId, name: String, color: String, x: f64, y: f64) -> Self {
        Self {
            id,
            name,
            color,
            x,
            y,
            cell: cell_for(x, y),
            last_update_ms: now_ms(),
            dirty: true,
            last_move_at: None,
        }
    }
}

/// Mapping of player id to runtime state for one room.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: HashMap<PlayerId, Player>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
        }
    }

    /// Register a player, returning any previous state under the same id.
    pub fn insert(&mut self, player: Player) -> Option<Player> {
        self.players.insert(player.id.clone(), player)
    }

    pub fn remove(&mut self, id: &str) -> Option<Player> {
        self.players.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Players whose state changed since the last broadcast.
    pub fn dirty_players(&self) -> impl Iterator<Item = &Player> {
        self.players.values().filter(|p| p.dirty)
    }

    /// Clear every dirty flag after a broadcast.
    pub fn clear_dirty(&mut self) {
        for player in self.players.values_mut() {
            player.dirty = false;
        }
    }
}
