//! HTTP and WebSocket surface.
//!
//! `/ws` upgrades the connection and bridges it to a room actor: inbound
//! frames become room commands, and a per-connection outbound queue is
//! drained by a dedicated send task so one slow client never stalls a tick.
//! `/health` and `/status` are the thin operational endpoints.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::metrics::{Metrics, MetricsSnapshot};
use crate::net::protocol::{self, ClientMessage, ServerMessage};
use crate::persist::{PlayerRecord, PlayerStore};
use crate::room::actor::{JoinRequest, RoomCommand};
use crate::room::manager::{RoomManager, RoomOccupancy};
use crate::util::{now_ms, random_color, random_spawn};

/// Room joined when the client names none and has no stored room.
pub const DEFAULT_ROOM: &str = "poc_world";

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<RoomManager>,
    pub store: Arc<PlayerStore>,
    pub metrics: Arc<Metrics>,
}

/// Query parameters accepted on the WebSocket upgrade.
#[derive(Debug, Default, Deserialize)]
pub struct JoinParams {
    #[serde(rename = "roomId")]
    pub room_id: Option<String>,
    #[serde(rename = "playerKey")]
    pub player_key: Option<String>,
    pub name: Option<String>,
    pub color: Option<String>,
}

/// Resolved join identity after merging query params with stored state.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub room_id: String,
    pub player_key: String,
    pub name: String,
    pub color: String,
    pub x: f64,
    pub y: f64,
}

/// Merge precedence: explicit query param, then persisted record, then a
/// generated default.
pub fn resolve_identity(params: JoinParams, persisted: Option<PlayerRecord>) -> ClientIdentity {
    let persisted = persisted.unwrap_or_default();
    let player_key = params
        .player_key
        .filter(|k| !k.is_empty())
        .unwrap_or_else(|| format!("pk-{}", Uuid::new_v4().simple()));

    let room_id = params
        .room_id
        .filter(|r| !r.is_empty())
        .or(persisted.room_id)
        .unwrap_or_else(|| DEFAULT_ROOM.to_string());

    let name = params
        .name
        .filter(|n| !n.is_empty())
        .or(persisted.name)
        .unwrap_or_else(|| {
            let prefix: String = player_key.chars().take(4).collect();
            format!("Player {prefix}")
        });

    let color = params
        .color
        .filter(|c| !c.is_empty())
        .or(persisted.color)
        .unwrap_or_else(random_color);

    let (x, y) = match (persisted.x, persisted.y) {
        (Some(x), Some(y)) => (x, y),
        _ => random_spawn(),
    };

    ClientIdentity {
        room_id,
        player_key,
        name,
        color,
        x,
        y,
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    ok: bool,
    ts: u64,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        ts: now_ms(),
    })
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    rooms: usize,
    players: usize,
    occupancy: Vec<RoomOccupancy>,
    metrics: MetricsSnapshot,
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        rooms: state.manager.room_count(),
        players: state.manager.total_player_count(),
        occupancy: state.manager.occupancy(),
        metrics: state.metrics.snapshot(),
    })
}

async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<JoinParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params))
}

async fn handle_socket(socket: WebSocket, state: AppState, params: JoinParams) {
    let persisted = params
        .player_key
        .as_deref()
        .and_then(|key| state.store.load(key));
    let identity = resolve_identity(params, persisted);

    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let conn_id = Uuid::new_v4();
    let req = JoinRequest {
        player_id: identity.player_key.clone(),
        name: identity.name,
        color: identity.color,
        x: identity.x,
        y: identity.y,
        conn_id,
        outbound,
    };

    let handle = match state.manager.join(&identity.room_id, req) {
        Ok(handle) => handle,
        Err(e) => {
            warn!(
                "join refused for {} in room {}: {e}",
                identity.player_key, identity.room_id
            );
            return;
        }
    };

    state
        .metrics
        .connections_active
        .fetch_add(1, Ordering::Relaxed);

    let (mut socket_sender, mut socket_receiver) = socket.split();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let payload = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    warn!("serialize frame failed: {e}");
                    continue;
                }
            };
            if socket_sender.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    let player_key = identity.player_key;
    while let Some(Ok(frame)) = socket_receiver.next().await {
        match frame {
            Message::Text(text) => {
                state.metrics.frames_received.fetch_add(1, Ordering::Relaxed);
                match protocol::parse_client_frame(&text) {
                    Ok(ClientMessage::Move { x, y }) => {
                        let _ = handle.commands.send(RoomCommand::Move {
                            player_id: player_key.clone(),
                            x,
                            y,
                        });
                    }
                    Err(e) => debug!("dropping malformed frame from {player_key}: {e}"),
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // The room drops this connection's outbound sender when it processes the
    // leave, which ends the send task.
    let _ = handle.commands.send(RoomCommand::Leave {
        player_id: player_key,
        conn_id,
    });
    state
        .metrics
        .connections_active
        .fetch_sub(1, Ordering::Relaxed);
    let _ = send_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(
        room_id: Option<&str>,
        player_key: Option<&str>,
        name: Option<&str>,
        color: Option<&str>,
    ) -> JoinParams {
        JoinParams {
            room_id: room_id.map(String::from),
            player_key: player_key.map(String::from),
            name: name.map(String::from),
            color: color.map(String::from),
        }
    }

    #[test]
    fn test_identity_defaults() {
        let identity = resolve_identity(JoinParams::default(), None);

        assert_eq!(identity.room_id, DEFAULT_ROOM);
        assert!(identity.player_key.starts_with("pk-"));
        assert!(identity.name.starts_with("Player "));
        assert!(identity.color.starts_with('#'));
    }

    #[test]
    fn test_identity_params_win_over_persisted() {
        let persisted = PlayerRecord {
            room_id: Some("old_room".into()),
            name: Some("Old Name".into()),
            color: Some("#000000".into()),
            x: Some(1.0),
            y: Some(2.0),
            ts: None,
        };
        let identity = resolve_identity(
            params(Some("new_room"), Some("pk-abc"), Some("Ada"), Some("#ffffff")),
            Some(persisted),
        );

        assert_eq!(identity.room_id, "new_room");
        assert_eq!(identity.player_key, "pk-abc");
        assert_eq!(identity.name, "Ada");
        assert_eq!(identity.color, "#ffffff");
        // Position always restores from the stored record.
        assert_eq!((identity.x, identity.y), (1.0, 2.0));
    }

    #[test]
    fn test_identity_falls_back_to_persisted() {
        let persisted = PlayerRecord {
            room_id: Some("saved_room".into()),
            name: Some("Saved".into()),
            color: Some("#112233".into()),
            x: Some(700.0),
            y: Some(800.0),
            ts: None,
        };
        let identity = resolve_identity(params(None, Some("pk-abc"), None, None), Some(persisted));

        assert_eq!(identity.room_id, "saved_room");
        assert_eq!(identity.name, "Saved");
        assert_eq!(identity.color, "#112233");
        assert_eq!((identity.x, identity.y), (700.0, 800.0));
    }

    #[test]
    fn test_identity_empty_strings_treated_as_absent() {
        let identity = resolve_identity(params(Some(""), Some(""), Some(""), Some("")), None);

        assert_eq!(identity.room_id, DEFAULT_ROOM);
        assert!(identity.player_key.starts_with("pk-"));
    }
}
