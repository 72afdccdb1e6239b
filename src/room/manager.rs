//! Room table: get-or-create lookup and occupancy reporting.
//!
//! The table is the only shared mutable state between connections. It is
//! mutated on connect/disconnect paths only; everything per-room lives
//! inside the room's actor task.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::config::ServerConfig;
use crate::metrics::Metrics;
use crate::persist::PlayerStore;
use crate::room::actor::{JoinRequest, RoomActor, RoomCommand, RoomHandle};
use crate::world::validator::{MoveValidator, ValidatorConfig};

/// Shared room id to handle mapping. Join sends happen while holding the
/// write lock; room actors remove their own entry under the same lock when
/// they drain, which is what makes "join races last leave" safe.
pub type RoomTable = RwLock<HashMap<String, RoomHandle>>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ManagerError {
    #[error("room limit reached ({0} rooms)")]
    TooManyRooms(usize),
    #[error("room is shutting down")]
    RoomClosed,
}

/// Owns the room table and the shared dependencies every room needs.
pub struct RoomManager {
    table: Arc<RoomTable>,
    max_rooms: usize,
    validator: MoveValidator,
    store: Arc<PlayerStore>,
    metrics: Arc<Metrics>,
}

impl RoomManager {
    pub fn new(config: &ServerConfig, store: Arc<PlayerStore>, metrics: Arc<Metrics>) -> Self {
        let validator = MoveValidator::new(ValidatorConfig {
            speed_check: config.speed_check,
            ..Default::default()
        });
        Self {
            table: Arc::new(RwLock::new(HashMap::new())),
            max_rooms: config.max_rooms,
            validator,
            store,
            metrics,
        }
    }

    /// Join a player to a room, creating the room if needed. Returns the
    /// room handle for the connection's later `Move`/`Leave` commands.
    pub fn join(&self, room_id: &str, req: JoinRequest) -> Result<RoomHandle, ManagerError> {
        let mut req = req;
        // Two attempts: the first can lose to a room that drained between
        // lookup and send; the retry then creates a fresh room.
        for _ in 0..2 {
            let mut rooms = self.table.write();
            let handle = match rooms.get(room_id) {
                Some(handle) => handle.clone(),
                None => {
                    if rooms.len() >= self.max_rooms {
                        return Err(ManagerError::TooManyRooms(self.max_rooms));
                    }
                    let handle = RoomActor::spawn(
                        room_id.to_owned(),
                        self.validator.clone(),
                        self.store.clone(),
                        self.metrics.clone(),
                        self.table.clone(),
                    );
                    rooms.insert(room_id.to_owned(), handle.clone());
                    handle
                }
            };

            match handle.commands.send(RoomCommand::Join(Box::new(req))) {
                Ok(()) => return Ok(handle),
                Err(failed) => {
                    // The actor already drained; drop the stale entry.
                    if rooms.get(room_id).map(|h| h.uid) == Some(handle.uid) {
                        rooms.remove(room_id);
                    }
                    req = match failed.0 {
                        RoomCommand::Join(boxed) => *boxed,
                        _ => unreachable!("send returns the command it was given"),
                    };
                }
            }
        }
        Err(ManagerError::RoomClosed)
    }

    pub fn room_count(&self) -> usize {
        self.table.read().len()
    }

    pub fn total_player_count(&self) -> usize {
        self.table
            .read()
            .values()
            .map(|h| h.player_count.load(Ordering::Relaxed))
            .sum()
    }

    /// Per-room player counts for the status endpoint.
    pub fn occupancy(&self) -> Vec<RoomOccupancy> {
        self.table
            .read()
            .iter()
            .map(|(id, handle)| RoomOccupancy {
                room_id: id.clone(),
                players: handle.player_count.load(Ordering::Relaxed),
            })
            .collect()
    }
}

/// One row of the status endpoint's room listing.
#[derive(Debug, Clone, Serialize)]
pub struct RoomOccupancy {
    #[serde(rename = "roomId")]
    pub room_id: String,
    pub players: usize,
}
