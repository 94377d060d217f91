//! Shared harness: a mock realtime service and the app on ephemeral ports.

#![allow(dead_code)]

use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use texml_realtime::server::{self, AppState};
use texml_realtime::{CallSession, Config};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, MaybeTlsStream, WebSocketStream};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub type PlatformSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One accepted connection on the mock realtime service.
pub struct MockConnection {
    pub uri: String,
    pub authorization: Option<String>,
    pub openai_beta: Option<String>,
    pub ws: WebSocketStream<TcpStream>,
}

pub struct MockRealtime {
    pub addr: SocketAddr,
    pub connections: mpsc::Receiver<MockConnection>,
}

impl MockRealtime {
    pub fn base_url(&self) -> String {
        format!("ws://{}/v1", self.addr)
    }

    pub async fn next_connection(&mut self) -> MockConnection {
        tokio::time::timeout(TIMEOUT, self.connections.recv())
            .await
            .expect("no realtime connection within timeout")
            .expect("mock realtime service stopped")
    }
}

/// Starts a mock realtime service that waits `handshake_delay` before
/// completing each WebSocket handshake.
pub async fn spawn_mock_realtime(handshake_delay: Duration) -> MockRealtime {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, connections) = mpsc::channel(8);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(handshake_delay).await;
                let captured = Arc::new(Mutex::new(None));
                let sink = captured.clone();
                let ws = accept_hdr_async(stream, move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    let header = |name: &str| {
                        req.headers()
                            .get(name)
                            .and_then(|value| value.to_str().ok())
                            .map(str::to_string)
                    };
                    *sink.lock().unwrap() = Some((
                        req.uri().to_string(),
                        header("authorization"),
                        header("openai-beta"),
                    ));
                    Ok(resp)
                })
                .await;
                let Ok(ws) = ws else { return };
                let Some((uri, authorization, openai_beta)) = captured.lock().unwrap().take() else {
                    return;
                };
                let _ = tx
                    .send(MockConnection {
                        uri,
                        authorization,
                        openai_beta,
                        ws,
                    })
                    .await;
            });
        }
    });

    MockRealtime { addr, connections }
}

/// An address nothing listens on.
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}/v1", addr)
}

pub struct TestApp {
    pub http: SocketAddr,
    pub media: SocketAddr,
    pub state: AppState,
    pub server: JoinHandle<anyhow::Result<()>>,
    stop: Option<oneshot::Sender<()>>,
    _texml: tempfile::NamedTempFile,
}

impl TestApp {
    pub fn media_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.media, path)
    }

    pub async fn connect_platform(&self) -> PlatformSocket {
        let (ws, _) = tokio::time::timeout(
            TIMEOUT,
            tokio_tungstenite::connect_async(self.media_url("/media-stream")),
        )
        .await
        .expect("media socket connect timed out")
        .expect("media socket connect failed");
        ws
    }

    /// The single live session, once the media socket has been accepted.
    pub async fn only_session(&self) -> Arc<CallSession> {
        let registry = self.state.registry.clone();
        eventually(|| registry.len() == 1).await;
        self.state.registry.sessions().remove(0)
    }

    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

pub async fn spawn_app(realtime_url: &str) -> TestApp {
    let mut texml = tempfile::NamedTempFile::new().unwrap();
    write!(
        texml,
        r#"<Response><Connect><Stream url="wss://{{host}}/media-stream"/></Connect></Response>"#
    )
    .unwrap();

    let texml_path = texml.path().display().to_string();
    let realtime_url = realtime_url.to_string();
    let config = Config::from_lookup(|key| match key {
        "OPENAI_API_KEY" => Some("sk-test".to_string()),
        "OPENAI_REALTIME_URL" => Some(realtime_url.clone()),
        "TEXML_PATH" => Some(texml_path.clone()),
        _ => None,
    })
    .unwrap();

    let http = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let media = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let http_addr = http.local_addr().unwrap();
    let media_addr = media.local_addr().unwrap();

    let state = AppState::new(config);
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(server::serve(http, media, state.clone(), async move {
        let _ = stopped.await;
    }));

    TestApp {
        http: http_addr,
        media: media_addr,
        state,
        server,
        stop: Some(stop),
        _texml: texml,
    }
}

/// Polls `condition` until it holds or the timeout expires.
pub async fn eventually<F>(condition: F)
where
    F: Fn() -> bool,
{
    tokio::time::timeout(TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached within timeout");
}

/// Next JSON text frame, skipping control frames.
pub async fn next_json<S>(ws: &mut WebSocketStream<S>) -> Value
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    tokio::time::timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str::<Value>(&text).unwrap(),
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                other => panic!("expected a text frame, got {:?}", other),
            }
        }
    })
    .await
    .expect("no frame within timeout")
}

/// Waits for the peer to close the socket.
pub async fn expect_closed<S>(ws: &mut WebSocketStream<S>)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    tokio::time::timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(Message::Text(text))) => panic!("unexpected frame after close: {}", text),
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .expect("socket was not closed within timeout")
}

pub async fn send_json<S>(ws: &mut WebSocketStream<S>, value: Value)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}
