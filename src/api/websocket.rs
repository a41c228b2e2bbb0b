//! WebSocket bindings: one data socket per session, plus control sockets.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
    Extension,
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::handlers::AppState;
use super::types::{SizeQuery, WsMessage};
use crate::bridge::Admission;
use crate::control::ControlDispatcher;
use crate::error::BridgeError;
use crate::pty::PtySize;
use crate::session::SessionId;

/// Capacity of the byte channels between the socket and the pump.
const CHANNEL_CAPACITY: usize = 64;

type WsSink = SplitSink<WebSocket, Message>;

/// Upgrade to a session socket.
///
/// Authentication already happened in middleware, so a rejected client
/// gets a plain 401 and never reaches the upgrade.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(admission): Extension<Admission>,
    Query(query): Query<SizeQuery>,
) -> impl IntoResponse {
    let size = query.size(state.bridge.default_size());
    ws.on_upgrade(move |socket| handle_session_socket(socket, admission, state, size))
}

async fn send(sink: &mut WsSink, msg: &WsMessage) -> bool {
    sink.send(Message::Text(msg.to_json().into())).await.is_ok()
}

/// Drive one session over a socket.
async fn handle_session_socket(
    socket: WebSocket,
    admission: Admission,
    state: AppState,
    size: Option<PtySize>,
) {
    let (mut sink, stream) = socket.split();

    let connection = match admission.open(size) {
        Ok(connection) => connection,
        Err(e) => {
            let _ = send(&mut sink, &WsMessage::error(&e)).await;
            let _ = sink.close().await;
            return;
        }
    };

    let id = connection.id();
    if !send(&mut sink, &WsMessage::Session { session_id: id }).await {
        debug!(session_id = %id, "Client left before the session started");
        return;
    }

    let (in_tx, in_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (out_tx, out_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (reply_tx, reply_rx) = mpsc::channel(8);

    let inbound = tokio::spawn(read_client(
        stream,
        id,
        state.bridge.dispatcher(),
        in_tx,
        reply_tx,
    ));

    let (outcome, sink) = tokio::join!(
        connection.run(in_rx, out_tx),
        write_client(sink, out_rx, reply_rx)
    );
    inbound.abort();

    if let Some(mut sink) = sink {
        if outcome.exit.is_process_side() {
            let _ = send(&mut sink, &WsMessage::Exit { code: outcome.exit_code }).await;
        }
        let _ = sink.close().await;
    }

    debug!(session_id = %id, reason = %outcome.reason(), "Session socket finished");
}

/// Forward client frames: bytes to the process, envelopes to the dispatcher.
///
/// Returning drops `input`, which ends the session.
async fn read_client(
    mut stream: SplitStream<WebSocket>,
    id: SessionId,
    dispatcher: ControlDispatcher,
    input: mpsc::Sender<Vec<u8>>,
    replies: mpsc::Sender<WsMessage>,
) {
    while let Some(msg) = stream.next().await {
        let data = match msg {
            Ok(Message::Binary(bytes)) => bytes.to_vec(),
            Ok(Message::Text(text)) => match serde_json::from_str::<WsMessage>(text.as_str()) {
                Ok(WsMessage::Input { data }) => data.into_bytes(),
                Ok(WsMessage::Ping) => {
                    let _ = replies.send(WsMessage::Pong).await;
                    continue;
                }
                Ok(envelope) => {
                    if let Some(event) = envelope.control_event() {
                        dispatcher.dispatch(id, event);
                    }
                    continue;
                }
                Err(e) => {
                    let err = BridgeError::InvalidFrame(e.to_string());
                    let _ = replies.send(WsMessage::error(&err)).await;
                    continue;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(session_id = %id, error = %e, "Socket read failed");
                break;
            }
        };

        if input.send(data).await.is_err() {
            break;
        }
    }
}

/// Send terminal output and replies until the output channel closes.
///
/// Returns the sink if the client is still there.
async fn write_client(
    mut sink: WsSink,
    mut output: mpsc::Receiver<Vec<u8>>,
    mut replies: mpsc::Receiver<WsMessage>,
) -> Option<WsSink> {
    loop {
        tokio::select! {
            chunk = output.recv() => match chunk {
                Some(chunk) => {
                    if sink.send(Message::Binary(chunk.into())).await.is_err() {
                        return None;
                    }
                }
                None => return Some(sink),
            },
            Some(reply) = replies.recv() => {
                if !send(&mut sink, &reply).await {
                    return None;
                }
            }
        }
    }
}

/// Upgrade to a control socket.
pub async fn control_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_control_socket(socket, state.bridge.dispatcher()))
}

/// Apply control envelopes to the session named by the first `attach`.
///
/// Events are applied in arrival order. Events for a session that has gone
/// away are dropped without closing the socket.
async fn handle_control_socket(socket: WebSocket, dispatcher: ControlDispatcher) {
    let (mut sink, mut stream) = socket.split();
    let mut attached: Option<SessionId> = None;

    while let Some(msg) = stream.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(_) => break,
        };

        let envelope = match serde_json::from_str::<WsMessage>(text.as_str()) {
            Ok(envelope) => envelope,
            Err(e) => {
                let err = WsMessage::error(&BridgeError::InvalidFrame(e.to_string()));
                if !send(&mut sink, &err).await {
                    break;
                }
                continue;
            }
        };

        match (envelope, attached) {
            (WsMessage::Attach { session_id }, _) => {
                debug!(session_id = %session_id, "Control socket attached");
                attached = Some(session_id);
            }
            (WsMessage::Ping, _) => {
                if !send(&mut sink, &WsMessage::Pong).await {
                    break;
                }
            }
            (envelope, Some(id)) => {
                if let Some(event) = envelope.control_event() {
                    dispatcher.dispatch(id, event);
                }
            }
            (_, None) => {
                warn!("Control event before attach");
                let err = WsMessage::Error {
                    code: "NOT_ATTACHED".to_string(),
                    message: "send an attach message first".to_string(),
                };
                if !send(&mut sink, &err).await {
                    break;
                }
            }
        }
    }
}
