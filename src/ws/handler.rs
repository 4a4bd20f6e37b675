//! WebSocket upgrade handler: match updates out, player commands in

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::http::routes::AppError;
use crate::game::GameError;
use crate::ws::protocol::{ClientMsg, ServerMsg};

type WsSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Player the connection acts for; observers leave it out
    pub player: Option<Uuid>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(match_id): Path<Uuid>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    // Subscribe before upgrading so a deleted match is rejected here
    let updates = state
        .matches
        .hub()
        .subscribe(match_id)
        .ok_or(GameError::UnknownMatch)?;
    info!(match_id = %match_id, player_id = ?query.player, "WebSocket upgrade");
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, match_id, query.player, updates, state)))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(
    socket: WebSocket,
    match_id: Uuid,
    player_id: Option<Uuid>,
    updates: broadcast::Receiver<Arc<str>>,
    state: AppState,
) {
    let (ws_sink, ws_stream) = socket.split();
    let sink: WsSink = Arc::new(Mutex::new(ws_sink));

    let welcome = ServerMsg::Welcome {
        match_id,
        player_id,
        server_time: chrono::Utc::now().timestamp_millis(),
    };
    if let Err(e) = send_msg(&sink, &welcome).await {
        error!(match_id = %match_id, error = %e, "Failed to send welcome");
        return;
    }

    run_session(match_id, player_id, sink, ws_stream, updates, state).await;

    info!(match_id = %match_id, player_id = ?player_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    match_id: Uuid,
    player_id: Option<Uuid>,
    sink: WsSink,
    mut ws_stream: SplitStream<WebSocket>,
    mut updates: broadcast::Receiver<Arc<str>>,
    state: AppState,
) {
    // Writer task: match broadcasts -> WebSocket
    let writer_sink = sink.clone();
    let writer_handle = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(payload) => {
                    let mut sink = writer_sink.lock().await;
                    if let Err(e) = sink.send(Message::Text(payload.to_string())).await {
                        debug!(match_id = %match_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(match_id = %match_id, lagged_count = n, "Client lagged, skipping updates");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(match_id = %match_id, "Match channel closed");
                    let _ = writer_sink.lock().await.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> match actor
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMsg>(&text) {
                Ok(msg) => {
                    if let Some(reply) = dispatch(&state, match_id, player_id, msg).await {
                        if send_msg(&sink, &reply).await.is_err() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    warn!(match_id = %match_id, error = %e, "Failed to parse client message");
                    let reply = ServerMsg::Error {
                        code: "bad_message".to_string(),
                        message: e.to_string(),
                    };
                    if send_msg(&sink, &reply).await.is_err() {
                        break;
                    }
                }
            },
            Ok(Message::Binary(_)) => {
                warn!(match_id = %match_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                debug!(match_id = %match_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(match_id = %match_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Run one client command; returns a direct reply when there is something to say
async fn dispatch(
    state: &AppState,
    match_id: Uuid,
    player_id: Option<Uuid>,
    msg: ClientMsg,
) -> Option<ServerMsg> {
    if let ClientMsg::Ping { t } = msg {
        return Some(ServerMsg::Pong { t });
    }
    let Some(player_id) = player_id else {
        return Some(error_reply(&GameError::UnknownPlayer));
    };

    let result = match msg {
        ClientMsg::Move { path } => state
            .matches
            .move_player(match_id, player_id, path)
            .await
            .map(|_| ()),
        other => match other.into_trade() {
            Some(trade) => state
                .matches
                .trade(match_id, player_id, trade)
                .await
                .map(|_| ()),
            None => Ok(()),
        },
    };

    // Successful commands are visible through the broadcast updates
    result.err().map(|e| {
        debug!(match_id = %match_id, player_id = %player_id, code = e.code(), "Command rejected");
        error_reply(&e)
    })
}

fn error_reply(err: &GameError) -> ServerMsg {
    ServerMsg::Error {
        code: err.code().to_string(),
        message: err.to_string(),
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &WsSink, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.lock()
        .await
        .send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
