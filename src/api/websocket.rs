//! WebSocket handler for real-time voice sessions

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::ApiState;
use crate::session::{Conversation, SessionEvent, Turn};
use crate::voice::AudioEncoding;

/// Incoming WebSocket message from client
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsIncoming {
    /// A finished voice recording, base64-encoded
    Audio {
        data: String,
        /// MIME type of the recording; defaults to `WebM/Opus`
        #[serde(default)]
        encoding: Option<String>,
    },
    /// Clear the conversation back to its seeded greeting
    Reset,
    /// Request a full transcript snapshot
    Transcript,
    /// Ping to keep connection alive
    Ping,
}

/// Outgoing WebSocket message to client
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsOutgoing {
    /// Connection established; carries the seeded transcript
    Connected {
        session_id: String,
        transcript: Vec<Turn>,
    },
    /// A user turn entered the transcript
    UserTurn { turn: Turn },
    /// An assistant turn entered the transcript
    AssistantTurn { turn: Turn },
    /// Synthesized reply audio, base64-encoded
    Playback { mime: String, data: String },
    /// Full transcript snapshot
    Transcript { turns: Vec<Turn> },
    /// Error occurred
    Error { code: String, message: String },
    /// Pong response
    Pong,
}

impl From<SessionEvent> for WsOutgoing {
    fn from(event: SessionEvent) -> Self {
        match event {
            SessionEvent::UserTurn(turn) => Self::UserTurn { turn },
            SessionEvent::AssistantTurn(turn) => Self::AssistantTurn { turn },
            SessionEvent::Playback { mime, audio } => Self::Playback {
                mime: mime.to_string(),
                data: BASE64.encode(audio),
            },
            SessionEvent::TranscriptionFailed { reason } => Self::Error {
                code: "transcription_failed".to_string(),
                message: reason,
            },
            SessionEvent::SynthesisFailed { reason } => Self::Error {
                code: "synthesis_failed".to_string(),
                message: reason,
            },
        }
    }
}

/// Build WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/session", get(ws_upgrade_anonymous))
        .route("/session/{session_id}", get(ws_upgrade))
        .with_state(state)
}

/// Handle WebSocket upgrade request
async fn ws_upgrade(
    State(state): State<Arc<ApiState>>,
    Path(session_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

/// Upgrade without a client-chosen id; the gateway assigns one and reports
/// it in the `Connected` message
async fn ws_upgrade_anonymous(
    State(state): State<Arc<ApiState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let session_id = uuid::Uuid::new_v4().to_string();
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<ApiState>, session_id: String) {
    let (mut sender, mut receiver) = socket.split();

    // Pipeline events flow through this channel into the socket
    let (event_tx, mut event_rx) = mpsc::channel::<SessionEvent>(32);
    let session = state.sessions.create(&session_id, event_tx).await;

    tracing::info!(session_id = %session_id, "WebSocket connected");

    // Channel for sending messages back to the client
    let (tx, mut rx) = mpsc::channel::<WsOutgoing>(32);

    // Forward messages from channel to WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Bridge session events to the client
    let bridge_tx = tx.clone();
    let bridge_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if bridge_tx.send(event.into()).await.is_err() {
                break;
            }
        }
    });

    let _ = tx
        .send(WsOutgoing::Connected {
            session_id: session_id.clone(),
            transcript: session.transcript(),
        })
        .await;

    // Handle incoming messages
    let session_for_recv = Arc::clone(&session);
    let session_id_clone = session_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_message(&text, &session_for_recv, &tx).await;
                }
                Message::Ping(data) => {
                    tracing::trace!(len = data.len(), "received ping");
                }
                Message::Close(_) => {
                    tracing::info!(session_id = %session_id_clone, "WebSocket closed by client");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            bridge_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
            bridge_task.abort();
        }
    }

    state.sessions.remove(&session_id).await;
    tracing::info!(session_id = %session_id, "WebSocket disconnected");
}

/// Dispatch one parsed client message
async fn handle_message(text: &str, session: &Arc<Conversation>, tx: &mpsc::Sender<WsOutgoing>) {
    let incoming: WsIncoming = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            let _ = tx
                .send(WsOutgoing::Error {
                    code: "bad_message".to_string(),
                    message: e.to_string(),
                })
                .await;
            return;
        }
    };

    match incoming {
        WsIncoming::Audio { data, encoding } => {
            let audio = match BASE64.decode(&data) {
                Ok(bytes) => bytes,
                Err(e) => {
                    let _ = tx
                        .send(WsOutgoing::Error {
                            code: "bad_audio".to_string(),
                            message: format!("invalid base64 audio: {e}"),
                        })
                        .await;
                    return;
                }
            };
            let hint = encoding
                .as_deref()
                .map_or(AudioEncoding::WebmOpus, AudioEncoding::from_mime);

            // Run the turn off the receive loop so further messages keep
            // flowing; audio arriving mid-turn is dropped by the session
            let session = Arc::clone(session);
            tokio::spawn(async move {
                session.submit_audio(audio, hint).await;
            });
        }
        WsIncoming::Reset => {
            session.reset();
            let _ = tx
                .send(WsOutgoing::Transcript {
                    turns: session.transcript(),
                })
                .await;
        }
        WsIncoming::Transcript => {
            let _ = tx
                .send(WsOutgoing::Transcript {
                    turns: session.transcript(),
                })
                .await;
        }
        WsIncoming::Ping => {
            let _ = tx.send(WsOutgoing::Pong).await;
        }
    }
}
