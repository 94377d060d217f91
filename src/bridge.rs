//! The realtime leg of a call.
//!
//! [`run`] connects to the realtime service, negotiates the session, attaches
//! the connection to the [`CallSession`] and relays the service's audio back
//! to the platform until either side goes away.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::client::{self, ServerRx};
use crate::config::Config;
use crate::registry::{SessionRegistry, TeardownReason};
use crate::session::CallSession;
use crate::types::{MediaStreamEvent, ServerEvent};

/// Service events that are logged but produce no traffic.
pub const LOG_EVENT_TYPES: &[&str] = &[
    "response.content.done",
    "rate_limits.updated",
    "response.done",
    "input_audio_buffer.committed",
    "input_audio_buffer.speech_stopped",
    "input_audio_buffer.speech_started",
    "session.created",
];

/// Opens and drives the realtime connection for `session`.
///
/// A failed connection leaves the session without a realtime leg; its media
/// frames are then dropped until the platform hangs up. Once the attached
/// connection ends, the whole session is torn down.
pub async fn run(session: Arc<CallSession>, registry: Arc<SessionRegistry>, config: Arc<Config>) {
    let session_id = session.id();

    let mut client = match client::connect(config.realtime.clone()).await {
        Ok(client) => client,
        Err(e) => {
            error!(%session_id, "could not connect to realtime service: {:#}", e);
            return;
        }
    };

    let events = match client.server_events() {
        Ok(events) => events,
        Err(e) => {
            error!(%session_id, "{:#}", e);
            client.close().await;
            return;
        }
    };

    let negotiation = config.session();
    debug!(%session_id, ?negotiation, "sending session update");
    if let Err(e) = client.update_session(negotiation).await {
        error!(%session_id, "failed to send session update: {:#}", e);
        client.close().await;
        return;
    }

    if !session.attach_ai(client).await {
        info!(%session_id, "call ended during negotiation, realtime connection closed");
        return;
    }
    info!(%session_id, "realtime connection attached");

    let reason = relay_server_events(&session, events).await;
    info!(%session_id, ?reason, "realtime connection closed");
    registry.teardown(&session_id, TeardownReason::AiClosed).await;
}

/// Dispatches service events until the connection closes or the call leg is gone.
///
/// Returns the close reason reported by the connection, if any.
pub async fn relay_server_events(session: &CallSession, mut events: ServerRx) -> Option<String> {
    let session_id = session.id();
    while let Some(event) = events.recv().await {
        let event_type = event.event_type();
        if LOG_EVENT_TYPES.contains(&event_type) {
            info!(%session_id, "Received event: {}", event_type);
        }

        match event {
            ServerEvent::ResponseAudioDelta(delta) => {
                let frame = MediaStreamEvent::media(delta.into_delta());
                if !session.send_to_call(frame).await {
                    debug!(%session_id, "call leg closed, stopping relay");
                    return None;
                }
            }
            ServerEvent::SessionUpdated(updated) => {
                info!(%session_id, "Session updated successfully");
                debug!(%session_id, session = %updated.session(), "negotiated session");
            }
            ServerEvent::ResponseDone(done) => {
                if done.response().status() == Some("failed") {
                    warn!(%session_id, response_id = done.response().id(), "response failed");
                }
            }
            ServerEvent::Error(e) => {
                error!(
                    %session_id,
                    event_id = e.error().event_id().unwrap_or("-"),
                    "realtime service error: {}",
                    e.error()
                );
            }
            ServerEvent::Close { reason } => return reason,
            _ => {}
        }
    }
    None
}
