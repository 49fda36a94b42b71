//! WebSocket relay of a match's event-bus payload (§6: "Event bus payload
//! (published to subscribers, e.g. WebSocket)"), grounded on
//! `proerror77-ploy`'s `api::websocket::handle_socket` split-socket +
//! forwarding-task shape.

use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use dome_core::bus::{match_lifecycle_topic, match_tick_topic};
use futures_util::{SinkExt, StreamExt};
use tracing::{error, info};

/// `GET /ws/matches/:id`: relays that match's tick and lifecycle events, in
/// the wire shape `{ matchId, tick, gameTime, homeScore, awayScore, event,
/// revenue? }` (§6), for as long as the socket and the match both stay
/// alive.
pub async fn match_events(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| relay(socket, state, id))
}

async fn relay(socket: WebSocket, state: AppState, game_id: u64) {
    let (mut sender, mut receiver) = socket.split();

    let mut tick_sub = state.match_bus.subscribe(match_tick_topic(game_id), 64);
    let mut lifecycle_sub = state.match_bus.subscribe(match_lifecycle_topic(game_id), 16);

    let forward_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(event) = tick_sub.recv() => {
                    if !send_event(&mut sender, &event).await {
                        break;
                    }
                }
                Some(event) = lifecycle_sub.recv() => {
                    if !send_event(&mut sender, &event).await {
                        break;
                    }
                }
                else => break,
            }
        }
    });

    // Drain inbound frames (ping/pong handled by axum) until the client
    // closes, then tear down the forwarding task.
    while let Some(Ok(msg)) = receiver.next().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }

    forward_task.abort();
    info!(game_id, "match event websocket closed");
}

async fn send_event(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    event: &dome_core::MatchTickPayload,
) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(err) => {
            error!(error = %err, "failed to serialize match event for websocket relay");
            return true;
        }
    };
    sender.send(Message::Text(json)).await.is_ok()
}
