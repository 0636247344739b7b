//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::room::ConnectionHandle;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::ServerMsg;
use crate::ws::session::Session;

/// Outbound messages buffered per connection before updates are dropped
const OUTBOUND_BUFFER: usize = 256;

/// WebSocket upgrade handler for `/ws/game/:room_code`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room_code): Path<String>,
    State(state): State<AppState>,
) -> Response {
    debug!(room_code = %room_code, "WebSocket upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, room_code, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, room_code: String, state: AppState) {
    let (ws_sink, mut ws_stream) = socket.split();

    let (conn, outbound_rx) = ConnectionHandle::channel(OUTBOUND_BUFFER);
    let conn_id = conn.id;
    let mut session = Session::connect(state.registry.clone(), room_code, conn);
    let rate_limiter = ConnectionRateLimiter::new(state.config.input_rate_limit);

    // Spawn writer task: room and session replies -> WebSocket
    let writer_handle = tokio::spawn(write_outbound(ws_sink, outbound_rx, conn_id));

    // Reader loop: WebSocket -> session
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(conn_id = %conn_id, room_code = %session.room_code(), "Rate limited input message");
                    continue;
                }
                session.handle_text(&text);
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(conn_id = %conn_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(conn_id = %conn_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    session.disconnect();

    // Abort writer task
    writer_handle.abort();
}

async fn write_outbound(
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<ServerMsg>,
    conn_id: uuid::Uuid,
) {
    while let Some(msg) = outbound_rx.recv().await {
        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
            break;
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
