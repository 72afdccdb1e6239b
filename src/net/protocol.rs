//! Wire protocol: JSON frames tagged by `type`, plus the pure builders that
//! turn room state into outbound messages.
//!
//! Unknown or malformed frames fail deserialization at this boundary and are
//! dropped by the transport; they never reach room state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::util::now_ms;
use crate::world::objects::{ObjectId, ObjectKind, ObjectSet, WorldObject};
use crate::world::registry::{Player, PlayerId, PlayerRegistry};

/// Protocol version carried on every server frame. Version 2 predates world
/// objects; clients can discover the `objects` payload by this number.
pub const PROTO_VERSION: u8 = 3;

/// Messages from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Move { x: f64, y: f64 },
}

/// Messages from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// First frame after joining: the new player's id and the full room.
    Welcome {
        proto: u8,
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        players: HashMap<PlayerId, PlayerSnapshot>,
        ts: u64,
    },
    /// Periodic full re-sync of everything visible to this client.
    Snapshot {
        proto: u8,
        players: HashMap<PlayerId, PlayerSnapshot>,
        objects: Vec<ObjectSnapshot>,
        ts: u64,
    },
    /// Incremental update since the last broadcast.
    Delta {
        proto: u8,
        upserts: Vec<PlayerSnapshot>,
        removes: Vec<PlayerId>,
        #[serde(rename = "objRemoves")]
        obj_removes: Vec<ObjectId>,
        ts: u64,
    },
}

/// Player state as sent on the wire. Derived cell and dirty flag stay
/// server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub x: f64,
    pub y: f64,
    pub ts: u64,
}

impl PlayerSnapshot {
    pub fn from_player(player: &Player) -> Self {
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
            color: player.color.clone(),
            x: player.x,
            y: player.y,
            ts: player.last_update_ms,
        }
    }
}

/// World object as sent on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub id: ObjectId,
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    pub x: f64,
    pub y: f64,
}

impl ObjectSnapshot {
    pub fn from_object(object: &WorldObject) -> Self {
        Self {
            id: object.id.clone(),
            kind: object.kind,
            x: object.x,
            y: object.y,
        }
    }
}

/// Parse one inbound text frame.
pub fn parse_client_frame(text: &str) -> Result<ClientMessage, serde_json::Error> {
    serde_json::from_str(text)
}

/// Build the `welcome` frame: the joining player's id plus the full player
/// mapping of the room (not AOI-filtered, so the client can render the whole
/// room immediately).
pub fn welcome_message(player_id: &str, registry: &PlayerRegistry) -> ServerMessage {
    ServerMessage::Welcome {
        proto: PROTO_VERSION,
        player_id: player_id.to_owned(),
        players: registry
            .iter()
            .map(|p| (p.id.clone(), PlayerSnapshot::from_player(p)))
            .collect(),
        ts: now_ms(),
    }
}

/// Build a `snapshot` frame for one client: every player in the client's
/// visible set, recomputed fresh, plus all active objects.
pub fn snapshot_message(
    registry: &PlayerRegistry,
    visible: &hashbrown::HashSet<PlayerId>,
    objects: &ObjectSet,
    ts: u64,
) -> ServerMessage {
    ServerMessage::Snapshot {
        proto: PROTO_VERSION,
        players: visible
            .iter()
            .filter_map(|id| registry.get(id))
            .map(|p| (p.id.clone(), PlayerSnapshot::from_player(p)))
            .collect(),
        objects: objects.active().map(ObjectSnapshot::from_object).collect(),
        ts,
    }
}

/// Build a `delta` frame for one client: upserts already filtered to the
/// client's visible set, plus the room-wide removal lists.
pub fn delta_message(
    upserts: Vec<PlayerSnapshot>,
    removes: Vec<PlayerId>,
    obj_removes: Vec<ObjectId>,
    ts: u64,
) -> ServerMessage {
    ServerMessage::Delta {
        proto: PROTO_VERSION,
        upserts,
        removes,
        obj_removes,
        ts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(players: &[(&str, f64, f64)]) -> PlayerRegistry {
        let mut registry = PlayerRegistry::new();
        for (id, x, y) in players {
            registry.insert(Player::new(
                (*id).into(),
                format!("Player {id}"),
                "#123456".into(),
                *x,
                *y,
            ));
        }
        registry
    }

    #[test]
    fn test_parse_move_frame() {
        let msg = parse_client_frame(r#"{"type":"move","x":120.5,"y":88.0}"#).unwrap();
        let ClientMessage::Move { x, y } = msg;
        assert_eq!(x, 120.5);
        assert_eq!(y, 88.0);
    }

    #[test]
    fn test_unknown_frame_type_rejected() {
        assert!(parse_client_frame(r#"{"type":"teleport","x":1,"y":2}"#).is_err());
        assert!(parse_client_frame("not json").is_err());
        assert!(parse_client_frame(r#"{"x":1,"y":2}"#).is_err());
    }

    #[test]
    fn test_welcome_shape() {
        let registry = registry_with(&[("p1", 100.0, 100.0), ("p2", 300.0, 300.0)]);
        let msg = welcome_message("p1", &registry);

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "welcome");
        assert_eq!(json["proto"], 3);
        assert_eq!(json["playerId"], "p1");
        assert_eq!(json["players"].as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_snapshot_filters_players_and_inactive_objects() {
        let registry = registry_with(&[("near", 100.0, 100.0), ("far", 4000.0, 4000.0)]);
        let mut visible = hashbrown::HashSet::new();
        visible.insert("near".to_string());
        visible.insert("gone".to_string());

        let mut objects = ObjectSet::default_layout();
        objects.collect_pickups(150.0, 150.0, 60.0);

        let msg = snapshot_message(&registry, &visible, &objects, 42);
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "snapshot");
        let players = json["players"].as_object().unwrap();
        assert!(players.contains_key("near"));
        assert!(!players.contains_key("far"));
        // Ids with no backing record are skipped, not serialized as null.
        assert!(!players.contains_key("gone"));

        let objects = json["objects"].as_array().unwrap();
        assert!(objects.iter().all(|o| o["id"] != "gen_pickup_001"));
        assert!(objects.iter().any(|o| o["type"] == "npc"));
    }

    #[test]
    fn test_delta_shape() {
        let registry = registry_with(&[("p1", 100.0, 100.0)]);
        let upserts = registry.iter().map(PlayerSnapshot::from_player).collect();

        let msg = delta_message(
            upserts,
            vec!["left".to_string()],
            vec!["gen_pickup_002".to_string()],
            7,
        );
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "delta");
        assert_eq!(json["upserts"][0]["id"], "p1");
        assert_eq!(json["removes"][0], "left");
        assert_eq!(json["objRemoves"][0], "gen_pickup_002");
        assert_eq!(json["ts"], 7);
    }
}
