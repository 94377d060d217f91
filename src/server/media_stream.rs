use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::AppState;
use crate::bridge;
use crate::registry::TeardownReason;
use crate::session::{CallOutbound, CallSession};
use crate::types::MediaStreamEvent;

/// Channel buffer size for frames headed to the platform.
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// `GET /media-stream`
pub async fn media_stream_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    info!("Media stream WebSocket upgrade requested");
    ws.on_upgrade(move |socket| handle_media_socket(socket, state))
}

/// Runs one platform media connection from accept to teardown.
async fn handle_media_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (call_tx, mut call_rx) = mpsc::channel::<CallOutbound>(CHANNEL_BUFFER_SIZE);

    let session = Arc::new(CallSession::new(call_tx));
    let session_id = session.id();
    info!(%session_id, "Client connected");

    // Sole writer of the platform socket.
    let sender_task = tokio::spawn(async move {
        while let Some(outbound) = call_rx.recv().await {
            let result = match outbound {
                CallOutbound::Event(event) => match serde_json::to_string(&event) {
                    Ok(json) => sender.send(Message::Text(json.into())).await,
                    Err(e) => {
                        error!(%session_id, "failed to serialize media stream event: {}", e);
                        continue;
                    }
                },
                CallOutbound::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };
            if let Err(e) = result {
                debug!(%session_id, "media socket write failed: {}", e);
                break;
            }
        }
    });

    state.registry.insert(session.clone());
    tokio::spawn(bridge::run(
        session.clone(),
        state.registry.clone(),
        state.config.clone(),
    ));

    loop {
        tokio::select! {
            message = receiver.next() => match message {
                Some(Ok(Message::Text(text))) => handle_platform_text(&session, text.as_str()).await,
                Some(Ok(Message::Binary(data))) => {
                    debug!(%session_id, len = data.len(), "ignoring binary frame");
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(%session_id, ?frame, "Client disconnected");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(%session_id, "media socket error: {}", e);
                    break;
                }
                None => {
                    info!(%session_id, "Client disconnected");
                    break;
                }
            },
            _ = session.closed() => {
                info!(%session_id, "realtime leg ended, closing media socket");
                break;
            }
        }
    }

    state
        .registry
        .teardown(&session_id, TeardownReason::CallClosed)
        .await;
    if let Err(e) = sender_task.await {
        error!(%session_id, "media socket writer panicked: {}", e);
    }
}

/// Dispatches one text frame from the platform.
///
/// Frames that fail to decode are logged and skipped; the connection stays up.
pub(crate) async fn handle_platform_text(session: &CallSession, text: &str) {
    let session_id = session.id();
    let event = match serde_json::from_str::<MediaStreamEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(%session_id, "failed to decode media stream event: {}", e);
            return;
        }
    };

    match event {
        MediaStreamEvent::Media { media, .. } => {
            session.forward_media(media.into_payload()).await;
        }
        MediaStreamEvent::Start { stream_id, start } => {
            match stream_id.as_deref() {
                Some(stream_id) => {
                    session.record_stream_id(stream_id);
                    info!(%session_id, "Incoming stream has started: {}", stream_id);
                }
                None => warn!(%session_id, "start event without a stream_id"),
            }
            if let Some(format) = start.as_ref().and_then(|start| start.media_format()) {
                debug!(
                    %session_id,
                    encoding = format.encoding(),
                    sample_rate = format.sample_rate(),
                    channels = format.channels(),
                    "call media format"
                );
            }
        }
        other => {
            info!(%session_id, "Received non-media event: {}", other.event_name());
        }
    }
}
