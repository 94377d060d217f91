use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::client::{Client, UsageStats};
use crate::types::audio::Base64EncodedAudioBytes;
use crate::types::MediaStreamEvent;

pub type SessionId = Uuid;

/// Work for the call leg's writer task.
#[derive(Debug)]
pub enum CallOutbound {
    Event(MediaStreamEvent),
    Close,
}

/// Relay counters for one call.
#[derive(Debug, Default)]
pub struct RelayStats {
    frames_to_ai: AtomicU64,
    frames_to_call: AtomicU64,
    dropped_frames: AtomicU64,
}

impl RelayStats {
    pub fn frames_to_ai(&self) -> u64 {
        self.frames_to_ai.load(Ordering::Relaxed)
    }

    pub fn frames_to_call(&self) -> u64 {
        self.frames_to_call.load(Ordering::Relaxed)
    }

    /// Media frames that arrived while no realtime connection was usable.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }
}

/// The pairing of one platform media connection with at most one realtime
/// connection.
///
/// The realtime connection is attached at most once and never replaced; once
/// the session is closed neither leg carries traffic again.
pub struct CallSession {
    id: SessionId,
    stream_id: OnceLock<String>,
    call_tx: mpsc::Sender<CallOutbound>,
    ai: OnceLock<Client>,
    /// Held while attaching or closing so the two never interleave.
    transition: Mutex<()>,
    closed: AtomicBool,
    closed_tx: watch::Sender<bool>,
    stats: RelayStats,
}

impl CallSession {
    pub fn new(call_tx: mpsc::Sender<CallOutbound>) -> Self {
        let (closed_tx, _) = watch::channel(false);
        Self {
            id: Uuid::new_v4(),
            stream_id: OnceLock::new(),
            call_tx,
            ai: OnceLock::new(),
            transition: Mutex::new(()),
            closed: AtomicBool::new(false),
            closed_tx,
            stats: RelayStats::default(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn stream_id(&self) -> Option<&str> {
        self.stream_id.get().map(String::as_str)
    }

    /// Records the id announced by the platform's `start` event. First one wins.
    pub fn record_stream_id(&self, stream_id: &str) {
        if self.stream_id.set(stream_id.to_string()).is_err() {
            tracing::debug!(session_id = %self.id, stream_id, "stream id already recorded");
        }
    }

    pub fn ai(&self) -> Option<&Client> {
        self.ai.get()
    }

    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Attaches the negotiated realtime connection.
    ///
    /// Returns `false` and closes `client` when a connection is already
    /// attached or the session was closed while the handshake was in flight.
    pub async fn attach_ai(&self, client: Client) -> bool {
        let rejected = {
            let _transition = self.transition.lock().unwrap_or_else(PoisonError::into_inner);
            if self.is_closed() {
                Some(client)
            } else {
                self.ai.set(client).err()
            }
        };
        match rejected {
            Some(client) => {
                if self.is_closed() {
                    tracing::debug!(session_id = %self.id, "session closed before attach");
                } else {
                    tracing::warn!(session_id = %self.id, "realtime connection already attached");
                }
                client.close().await;
                false
            }
            None => true,
        }
    }

    /// Relays one inbound audio payload to the realtime connection.
    ///
    /// Frames are dropped, not queued, while no open connection is attached.
    pub async fn forward_media(&self, payload: Base64EncodedAudioBytes) -> bool {
        let Some(ai) = self.ai.get().filter(|ai| ai.is_open()) else {
            self.stats.dropped_frames.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(session_id = %self.id, "no realtime connection, dropping media frame");
            return false;
        };
        match ai.append_input_audio_buffer(payload).await {
            Ok(()) => {
                self.stats.frames_to_ai.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                self.stats.dropped_frames.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(session_id = %self.id, "failed to relay media frame: {}", e);
                false
            }
        }
    }

    /// Queues an event for the platform connection.
    pub async fn send_to_call(&self, event: MediaStreamEvent) -> bool {
        if self.is_closed() {
            return false;
        }
        if self.call_tx.send(CallOutbound::Event(event)).await.is_err() {
            tracing::debug!(session_id = %self.id, "call writer is gone");
            return false;
        }
        self.stats.frames_to_call.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Token usage of the attached realtime connection, if any.
    pub fn usage(&self) -> Option<UsageStats> {
        let ai = self.ai.get()?;
        match ai.stats() {
            Ok(usage) => Some(usage),
            Err(e) => {
                tracing::warn!(session_id = %self.id, "{}", e);
                None
            }
        }
    }

    /// Closes both legs. Later calls are no-ops.
    pub async fn close(&self) {
        let ai = {
            let _transition = self.transition.lock().unwrap_or_else(PoisonError::into_inner);
            if self.closed.swap(true, Ordering::SeqCst) {
                return;
            }
            self.ai.get()
        };
        self.closed_tx.send_replace(true);

        if let Some(ai) = ai {
            ai.close().await;
            if let Some(usage) = self.usage() {
                tracing::info!(
                    session_id = %self.id,
                    responses = usage.responses(),
                    total_tokens = usage.total_tokens(),
                    input_tokens = usage.input_tokens(),
                    output_tokens = usage.output_tokens(),
                    "realtime usage"
                );
            }
        }
        let _ = self.call_tx.send(CallOutbound::Close).await;

        tracing::info!(
            session_id = %self.id,
            stream_id = self.stream_id().unwrap_or("-"),
            frames_to_ai = self.stats.frames_to_ai(),
            frames_to_call = self.stats.frames_to_call(),
            dropped_frames = self.stats.dropped_frames(),
            "call session closed"
        );
    }

    /// Resolves once [`CallSession::close`] has run.
    pub async fn closed(&self) {
        let mut rx = self.closed_tx.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl std::fmt::Debug for CallSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSession")
            .field("id", &self.id)
            .field("stream_id", &self.stream_id())
            .field("ai_attached", &self.ai.get().is_some())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use futures_util::StreamExt;
    use secrecy::SecretString;
    use tokio::net::TcpListener;

    use crate::client;

    /// Accepts realtime connections and reads each one until it ends.
    async fn realtime_endpoint() -> client::Config {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    while let Some(Ok(_)) = ws.next().await {}
                });
            }
        });
        client::Config::builder(SecretString::from("sk-test".to_string()))
            .with_base_url(&format!("ws://{}/v1", addr))
            .build()
    }

    #[tokio::test]
    async fn attach_after_close_is_rejected() {
        let config = realtime_endpoint().await;
        let (call_tx, _call_rx) = mpsc::channel(8);
        let session = CallSession::new(call_tx);
        session.close().await;

        let client = client::connect(config).await.unwrap();
        assert!(!session.attach_ai(client).await);
        assert!(session.ai().is_none());
        assert!(!session.forward_media("AAAA".to_string()).await);
    }

    #[tokio::test]
    async fn second_attach_is_rejected() {
        let config = realtime_endpoint().await;
        let (call_tx, _call_rx) = mpsc::channel(8);
        let session = CallSession::new(call_tx);

        assert!(session.attach_ai(client::connect(config.clone()).await.unwrap()).await);
        assert!(!session.attach_ai(client::connect(config).await.unwrap()).await);
        assert!(session.ai().unwrap().is_open());
        assert_eq!(session.usage().unwrap().responses(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn close_racing_attach_never_leaves_an_open_connection() {
        let config = realtime_endpoint().await;
        for _ in 0..32 {
            let client = client::connect(config.clone()).await.unwrap();
            let (call_tx, _call_rx) = mpsc::channel(8);
            let session = Arc::new(CallSession::new(call_tx));

            let attaching = tokio::spawn({
                let session = session.clone();
                async move { session.attach_ai(client).await }
            });
            let closing = tokio::spawn({
                let session = session.clone();
                async move { session.close().await }
            });
            let attached = attaching.await.unwrap();
            closing.await.unwrap();

            assert!(session.is_closed());
            assert_eq!(attached, session.ai().is_some());
            if let Some(ai) = session.ai() {
                assert!(!ai.is_open());
            }
        }
    }

    #[tokio::test]
    async fn media_without_ai_is_dropped() {
        let (call_tx, _call_rx) = mpsc::channel(8);
        let session = CallSession::new(call_tx);

        for _ in 0..3 {
            assert!(!session.forward_media("AAAA".to_string()).await);
        }
        assert_eq!(session.stats().dropped_frames(), 3);
        assert_eq!(session.stats().frames_to_ai(), 0);
        assert!(session.ai().is_none());
    }

    #[tokio::test]
    async fn stream_id_first_one_wins() {
        let (call_tx, _call_rx) = mpsc::channel(8);
        let session = CallSession::new(call_tx);
        assert_eq!(session.stream_id(), None);

        session.record_stream_id("first");
        session.record_stream_id("second");
        assert_eq!(session.stream_id(), Some("first"));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_stops_call_traffic() {
        let (call_tx, mut call_rx) = mpsc::channel(8);
        let session = CallSession::new(call_tx);

        assert!(session.send_to_call(MediaStreamEvent::media("abc".to_string())).await);
        session.close().await;
        session.close().await;
        session.closed().await;

        assert!(!session.send_to_call(MediaStreamEvent::media("def".to_string())).await);
        assert!(matches!(call_rx.recv().await, Some(CallOutbound::Event(_))));
        assert!(matches!(call_rx.recv().await, Some(CallOutbound::Close)));
        assert!(call_rx.try_recv().is_err());
        assert_eq!(session.stats().frames_to_call(), 1);
    }
}
