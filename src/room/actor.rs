//! Per-room actor: owns all room state and runs the tick loop.
//!
//! Each room is one tokio task. `Join`/`Move`/`Leave` commands arrive on a
//! channel and ticks fire from an interval inside the same select loop, so a
//! tick body can never interleave with a message handler for the same room.
//! Rooms tick independently of each other.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::metrics::Metrics;
use crate::net::protocol::{self, PlayerSnapshot, ServerMessage};
use crate::persist::{PlayerRecord, PlayerStore};
use crate::room::manager::RoomTable;
use crate::util::now_ms;
use crate::world::constants::{interaction, sync};
use crate::world::objects::{ObjectId, ObjectSet};
use crate::world::registry::{Player, PlayerId, PlayerRegistry};
use crate::world::spatial::{cell_for, SpatialIndex};
use crate::world::validator::{MoveValidator, MoveVerdict};

/// Commands a room accepts from connection handlers.
#[derive(Debug)]
pub enum RoomCommand {
    Join(Box<JoinRequest>),
    Move {
        player_id: PlayerId,
        x: f64,
        y: f64,
    },
    Leave {
        player_id: PlayerId,
        conn_id: Uuid,
    },
}

/// Everything needed to register a new connection's player.
#[derive(Debug)]
pub struct JoinRequest {
    pub player_id: PlayerId,
    pub name: String,
    pub color: String,
    pub x: f64,
    pub y: f64,
    /// Identifies the connection behind the player, so a close from a
    /// replaced socket cannot evict the replacement.
    pub conn_id: Uuid,
    pub outbound: mpsc::UnboundedSender<ServerMessage>,
}

/// Handle to a live room, stored in the manager's table.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    pub commands: mpsc::UnboundedSender<RoomCommand>,
    pub player_count: Arc<AtomicUsize>,
    pub(crate) uid: Uuid,
}

#[derive(Debug)]
struct ClientLink {
    conn_id: Uuid,
    outbound: mpsc::UnboundedSender<ServerMessage>,
}

pub struct RoomActor {
    room_id: String,
    uid: Uuid,
    registry: PlayerRegistry,
    spatial: SpatialIndex,
    objects: ObjectSet,
    conns: hashbrown::HashMap<PlayerId, ClientLink>,
    pending_player_removals: Vec<PlayerId>,
    pending_object_removals: Vec<ObjectId>,
    last_snapshot_at: Option<Instant>,
    validator: MoveValidator,
    store: Arc<PlayerStore>,
    metrics: Arc<Metrics>,
    player_count: Arc<AtomicUsize>,
}

impl RoomActor {
    fn new(
        room_id: String,
        uid: Uuid,
        validator: MoveValidator,
        store: Arc<PlayerStore>,
        metrics: Arc<Metrics>,
        player_count: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            room_id,
            uid,
            registry: PlayerRegistry::new(),
            spatial: SpatialIndex::new(),
            objects: ObjectSet::default_layout(),
            conns: hashbrown::HashMap::new(),
            pending_player_removals: Vec::new(),
            pending_object_removals: Vec::new(),
            last_snapshot_at: None,
            validator,
            store,
            metrics,
            player_count,
        }
    }

    /// Spawn the actor task for a new room and return its handle. The caller
    /// must insert the handle into the room table before releasing the table
    /// lock; the actor uses the same lock when it tears itself down.
    pub fn spawn(
        room_id: String,
        validator: MoveValidator,
        store: Arc<PlayerStore>,
        metrics: Arc<Metrics>,
        table: Arc<RoomTable>,
    ) -> RoomHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let uid = Uuid::new_v4();
        let player_count = Arc::new(AtomicUsize::new(0));
        let actor = Self::new(
            room_id,
            uid,
            validator,
            store,
            metrics,
            player_count.clone(),
        );
        let handle = RoomHandle {
            commands: tx,
            player_count,
            uid,
        };
        tokio::spawn(actor.run(rx, table));
        handle
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<RoomCommand>, table: Arc<RoomTable>) {
        info!("room {} created", self.room_id);
        let mut ticker =
            tokio::time::interval(Duration::from_millis(sync::TICK_INTERVAL_MS));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd, Instant::now()),
                    None => break,
                },
                _ = ticker.tick() => self.tick(Instant::now()),
            }

            if self.registry.is_empty() {
                // The room drains as soon as its last player leaves. A join
                // may be racing us: joins are sent while holding the table
                // lock, so under that lock either the join is already queued
                // here (serve it and stay alive) or the sender will find the
                // table entry gone and retry against a fresh room.
                let mut rooms = table.write();
                match commands.try_recv() {
                    Ok(queued) => {
                        drop(rooms);
                        self.handle_command(queued, Instant::now());
                    }
                    Err(_) => {
                        if rooms.get(&self.room_id).map(|h| h.uid) == Some(self.uid) {
                            rooms.remove(&self.room_id);
                        }
                        drop(rooms);
                        break;
                    }
                }
            }
        }
        info!("room {} destroyed", self.room_id);
    }

    fn handle_command(&mut self, cmd: RoomCommand, now: Instant) {
        match cmd {
            RoomCommand::Join(req) => self.handle_join(*req),
            RoomCommand::Move { player_id, x, y } => self.handle_move(&player_id, x, y, now),
            RoomCommand::Leave { player_id, conn_id } => self.handle_leave(&player_id, conn_id),
        }
    }

    fn handle_join(&mut self, req: JoinRequest) {
        let JoinRequest {
            player_id,
            name,
            color,
            x,
            y,
            conn_id,
            outbound,
        } = req;

        // A second connection with the same key replaces the first outright.
        if let Some(old) = self.registry.remove(&player_id) {
            warn!(
                "player {player_id} rejoined room {}; replacing old session",
                self.room_id
            );
            self.spatial.remove(&player_id, old.cell);
        }

        let player = Player::new(player_id.clone(), name.clone(), color.clone(), x, y);
        self.spatial.insert(player_id.clone(), player.cell);
        self.registry.insert(player);
        self.conns.insert(player_id.clone(), ClientLink { conn_id, outbound });
        self.player_count.store(self.registry.len(), Ordering::Relaxed);

        self.store.save(
            &player_id,
            PlayerRecord {
                room_id: Some(self.room_id.clone()),
                name: Some(name),
                color: Some(color),
                x: Some(x),
                y: Some(y),
                ts: Some(now_ms()),
            },
        );

        let welcome = protocol::welcome_message(&player_id, &self.registry);
        self.send_to(&player_id, welcome);

        info!(
            "player {player_id} joined room {} ({} online)",
            self.room_id,
            self.registry.len()
        );
    }

    fn handle_move(&mut self, player_id: &str, x: f64, y: f64, now: Instant) {
        let Some(player) = self.registry.get(player_id) else {
            return;
        };

        let verdict = self.validator.validate(x, y, player, now);
        match verdict {
            MoveVerdict::Accept => {
                let new_cell = cell_for(x, y);
                if let Some(player) = self.registry.get_mut(player_id) {
                    if new_cell != player.cell {
                        self.spatial.relocate(player_id, player.cell, new_cell);
                        player.cell = new_cell;
                    }
                    player.x = x;
                    player.y = y;
                    player.last_update_ms = now_ms();
                    player.dirty = true;
                    player.last_move_at = Some(now);
                }

                let collected = self
                    .objects
                    .collect_pickups(x, y, interaction::PICKUP_RADIUS);
                if !collected.is_empty() {
                    self.metrics
                        .pickups_collected
                        .fetch_add(collected.len() as u64, Ordering::Relaxed);
                    self.pending_object_removals.extend(collected);
                }

                self.store.save(player_id, PlayerRecord::position_update(x, y));
            }
            // Expected from clients sampling faster than the throttle.
            MoveVerdict::RejectRateLimited => {}
            rejected => {
                self.metrics.violations.fetch_add(1, Ordering::Relaxed);
                debug!("rejected move from {player_id}: {rejected:?}");
            }
        }
    }

    fn handle_leave(&mut self, player_id: &str, conn_id: Uuid) {
        match self.conns.get(player_id) {
            Some(link) if link.conn_id == conn_id => {}
            // Close from a connection that was already replaced.
            _ => return,
        }

        self.conns.remove(player_id);
        if let Some(player) = self.registry.remove(player_id) {
            self.spatial.remove(player_id, player.cell);
            self.pending_player_removals.push(player.id);
        }
        self.player_count.store(self.registry.len(), Ordering::Relaxed);

        info!(
            "player {player_id} left room {} ({} online)",
            self.room_id,
            self.registry.len()
        );
    }

    /// One tick: decide snapshot vs delta, filter per client, broadcast,
    /// then clear dirty flags and pending removals.
    fn tick(&mut self, now: Instant) {
        // The player count can hit zero between scheduling and running a
        // tick; never act on an empty room.
        if self.registry.is_empty() {
            return;
        }

        let is_snapshot_tick = match self.last_snapshot_at {
            Some(at) => {
                now.duration_since(at) > Duration::from_millis(sync::SNAPSHOT_INTERVAL_MS)
            }
            None => true,
        };

        let upserts: Vec<PlayerSnapshot> = if is_snapshot_tick {
            self.registry.iter().map(PlayerSnapshot::from_player).collect()
        } else {
            self.registry
                .dirty_players()
                .map(PlayerSnapshot::from_player)
                .collect()
        };

        if upserts.is_empty()
            && self.pending_player_removals.is_empty()
            && self.pending_object_removals.is_empty()
            && !is_snapshot_tick
        {
            return;
        }

        self.metrics.broadcasts.fetch_add(1, Ordering::Relaxed);
        let ts = now_ms();

        for (player_id, link) in &self.conns {
            // The backing record can vanish while this tick's batch is being
            // assembled; skip the orphaned socket.
            let Some(me) = self.registry.get(player_id) else {
                continue;
            };
            let visible = self.spatial.neighbors(me.cell);

            let msg = if is_snapshot_tick {
                Some(protocol::snapshot_message(
                    &self.registry,
                    &visible,
                    &self.objects,
                    ts,
                ))
            } else {
                let visible_upserts: Vec<PlayerSnapshot> = upserts
                    .iter()
                    .filter(|p| visible.contains(&p.id))
                    .cloned()
                    .collect();

                // Removals go to every client in the room regardless of
                // distance; only upserts are AOI-filtered.
                if visible_upserts.is_empty()
                    && self.pending_player_removals.is_empty()
                    && self.pending_object_removals.is_empty()
                {
                    None
                } else {
                    Some(protocol::delta_message(
                        visible_upserts,
                        self.pending_player_removals.clone(),
                        self.pending_object_removals.clone(),
                        ts,
                    ))
                }
            };

            if let Some(msg) = msg {
                if link.outbound.send(msg).is_err() {
                    debug!("dropping frame for {player_id}: connection closed");
                } else {
                    self.metrics.messages_sent.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        self.registry.clear_dirty();
        self.pending_player_removals.clear();
        self.pending_object_removals.clear();
        if is_snapshot_tick {
            self.last_snapshot_at = Some(now);
        }
    }

    fn send_to(&self, player_id: &str, msg: ServerMessage) {
        if let Some(link) = self.conns.get(player_id) {
            if link.outbound.send(msg).is_err() {
                debug!("dropping frame for {player_id}: connection closed");
            } else {
                self.metrics.messages_sent.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
