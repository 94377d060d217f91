use crate::client::stats::Stats;
use crate::types;
use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use types::audio::Base64EncodedAudioBytes;
use types::session::Session;

mod config;
pub(crate) mod consts;
mod stats;
mod utils;

pub use config::{Config, ConfigBuilder};
pub use stats::Stats as UsageStats;

type ClientTx = tokio::sync::mpsc::Sender<Outbound>;
type ServerTx = tokio::sync::mpsc::Sender<types::ServerEvent>;
pub type ServerRx = tokio::sync::mpsc::Receiver<types::ServerEvent>;

/// Work for the writer task. The socket sink has exactly one owner.
#[derive(Debug)]
enum Outbound {
    Event(types::ClientEvent),
    Close,
}

/// One connection to the realtime service.
///
/// Events are written in the order they are sent through the client; the
/// service's events are delivered through [`Client::server_events`], ending
/// with a synthesized [`types::ServerEvent::Close`].
pub struct Client {
    capacity: usize,
    config: Config,
    c_tx: Option<ClientTx>,
    s_rx: Option<ServerRx>,
    open: Arc<AtomicBool>,
    closed: AtomicBool,
    stats: Arc<Mutex<Stats>>,
}

impl Client {
    fn new(capacity: usize, config: Config) -> Self {
        Self {
            capacity,
            config,
            c_tx: None,
            s_rx: None,
            open: Arc::new(AtomicBool::new(false)),
            closed: AtomicBool::new(false),
            stats: Arc::new(Mutex::new(Stats::new())),
        }
    }

    async fn connect(&mut self) -> Result<()> {
        if self.c_tx.is_some() {
            return Err(anyhow::anyhow!("already connected"));
        }

        let request = utils::build_request(&self.config)?;
        let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;
        tracing::debug!(model = self.config.model(), "realtime connection established");

        let (mut write, mut read) = ws_stream.split();

        let (c_tx, mut c_rx) = tokio::sync::mpsc::channel::<Outbound>(self.capacity);
        let (s_tx, s_rx): (ServerTx, ServerRx) = tokio::sync::mpsc::channel(self.capacity);

        self.c_tx = Some(c_tx);
        self.s_rx = Some(s_rx);
        self.open.store(true, Ordering::SeqCst);

        let open = self.open.clone();
        tokio::spawn(async move {
            while let Some(outbound) = c_rx.recv().await {
                match outbound {
                    Outbound::Event(event) => match serde_json::to_string(&event) {
                        Ok(text) => {
                            if let Err(e) = write.send(Message::Text(text)).await {
                                tracing::error!("failed to send message: {}", e);
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::error!("failed to serialize event: {}", e);
                        }
                    },
                    Outbound::Close => {
                        if let Err(e) = write.send(Message::Close(None)).await {
                            tracing::debug!("failed to send close frame: {}", e);
                        }
                        break;
                    }
                }
            }
            open.store(false, Ordering::SeqCst);
        });

        let stats = self.stats.clone();
        let open = self.open.clone();
        tokio::spawn(async move {
            let mut reason = None;
            while let Some(message) = read.next().await {
                let message = match message {
                    Err(e) => {
                        tracing::error!("failed to read message: {}", e);
                        reason = Some(e.to_string());
                        break;
                    }
                    Ok(message) => message,
                };
                match message {
                    Message::Text(text) => {
                        if let Ok(json) = serde_json::from_str::<serde_json::Value>(&text) {
                            let event_type = json.get("type").and_then(|v| v.as_str());
                            let event_id = json.get("event_id").and_then(|v| v.as_str());
                            tracing::debug!(
                                "received message: {}, id={}",
                                event_type.unwrap_or("unknown"),
                                event_id.unwrap_or("unknown")
                            );
                        }
                        let event = match serde_json::from_str::<types::ServerEvent>(&text) {
                            Ok(event) => event,
                            Err(e) => {
                                tracing::warn!("failed to deserialize event: {}, text=> {:?}", e, text);
                                continue;
                            }
                        };

                        if let types::ServerEvent::ResponseDone(response) = &event {
                            if let Some(usage) = response.response().usage() {
                                match stats.lock() {
                                    Ok(mut stats_guard) => stats_guard.update_usage(
                                        usage.total_tokens(),
                                        usage.input_tokens(),
                                        usage.output_tokens(),
                                    ),
                                    Err(_) => tracing::error!("failed to update stats"),
                                }
                            }
                        }

                        if s_tx.send(event).await.is_err() {
                            tracing::debug!("server event receiver dropped");
                            break;
                        }
                    }
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary message: {} bytes", bin.len());
                    }
                    Message::Close(frame) => {
                        tracing::info!("connection closed: {:?}", frame);
                        reason = frame.map(|v| format!("{:?}", v));
                        break;
                    }
                    _ => {}
                }
            }
            open.store(false, Ordering::SeqCst);
            let _ = s_tx.send(types::ServerEvent::Close { reason }).await;
        });
        Ok(())
    }

    /// Takes the receiver for server events. Only one consumer is supported.
    pub fn server_events(&mut self) -> Result<ServerRx> {
        if self.c_tx.is_none() {
            return Err(anyhow::anyhow!("not connected yet"));
        }
        self.s_rx
            .take()
            .ok_or_else(|| anyhow::anyhow!("server events have already been taken"))
    }

    pub fn stats(&self) -> Result<Stats> {
        match self.stats.lock() {
            Ok(stats_guard) => Ok(stats_guard.clone()),
            Err(_) => Err(anyhow::anyhow!("failed to get stats")),
        }
    }

    /// Whether both directions of the connection are still usable.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send(&self, outbound: Outbound) -> Result<()> {
        match self.c_tx {
            Some(ref tx) => {
                tx.send(outbound)
                    .await
                    .map_err(|_| anyhow::anyhow!("connection is closed"))?;
                Ok(())
            }
            None => Err(anyhow::anyhow!("not connected yet")),
        }
    }

    async fn send_client_event(&self, event: types::ClientEvent) -> Result<()> {
        if !self.is_open() {
            return Err(anyhow::anyhow!("connection is closed"));
        }
        self.send(Outbound::Event(event)).await
    }

    pub async fn update_session(&self, config: Session) -> Result<()> {
        let event = types::ClientEvent::SessionUpdate(
            types::events::client::SessionUpdateEvent::new(config),
        );
        self.send_client_event(event).await
    }

    pub async fn append_input_audio_buffer(&self, audio: Base64EncodedAudioBytes) -> Result<()> {
        let event = types::ClientEvent::InputAudioBufferAppend(
            types::events::client::InputAudioBufferAppendEvent::new(audio),
        );
        self.send_client_event(event).await
    }

    /// Sends a close frame after any queued events. Calling it again is a no-op.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.open.store(false, Ordering::SeqCst);
        if let Err(e) = self.send(Outbound::Close).await {
            tracing::debug!("close on finished connection: {}", e);
        }
    }
}

pub async fn connect_with_config(capacity: usize, config: Config) -> Result<Client> {
    let mut client = Client::new(capacity, config);
    client.connect().await?;
    Ok(client)
}

pub async fn connect(config: Config) -> Result<Client> {
    connect_with_config(consts::CHANNEL_CAPACITY, config).await
}
