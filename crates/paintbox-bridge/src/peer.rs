//! The remote end of the channel: accepts bridge connections and drives them.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::ws::{Message, WebSocket};
use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use paintbox_core::protocol::{Envelope, InvocationRequest, InvocationResult};
use paintbox_media::{AudioChunk, frame};

/// Shared across every accepted connection.
pub struct PeerState {
    sessions: mpsc::UnboundedSender<PeerSession>,
    connections: AtomicUsize,
}

impl PeerState {
    /// New peer state, and the receiver that each accepted connection is
    /// handed out on.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<PeerSession>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(Self {
            sessions: tx,
            connections: AtomicUsize::new(0),
        });
        (state, rx)
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// One connected bridge, seen from the peer.
///
/// Dropping the session closes the socket.
pub struct PeerSession {
    conn_id: String,
    out: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<Envelope>,
}

impl PeerSession {
    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    /// Send a `command.invoke`. `args` is double-encoded on the wire.
    pub fn invoke(
        &self,
        call_id: impl Into<Value>,
        name: &str,
        args: &Value,
    ) -> anyhow::Result<()> {
        let request = InvocationRequest::new(call_id, name, args);
        self.send_raw(Envelope::CommandInvoke(request).encode())
    }

    pub fn send_audio(&self, chunk: &AudioChunk) -> anyhow::Result<()> {
        self.send_raw(Envelope::audio(frame(chunk)).encode())
    }

    /// Send arbitrary text as-is.
    pub fn send_raw(&self, text: impl Into<String>) -> anyhow::Result<()> {
        self.out
            .send(text.into())
            .map_err(|_| anyhow::anyhow!("connection {} is closed", self.conn_id))
    }

    /// Next `audio` or `command.result` from the bridge. `None` once the
    /// connection is gone.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.inbound.recv().await
    }

    /// Next `command.result`, skipping any audio in between.
    pub async fn recv_result(&mut self) -> Option<InvocationResult> {
        while let Some(envelope) = self.inbound.recv().await {
            if let Envelope::CommandResult(result) = envelope {
                return Some(result);
            }
        }
        None
    }
}

pub fn peer_router(state: Arc<PeerState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the peer endpoint on an already-bound listener.
pub async fn serve_peer(listener: TcpListener, state: Arc<PeerState>) -> anyhow::Result<()> {
    axum::serve(listener, peer_router(state)).await?;
    Ok(())
}

/// Bind `bind:port` and serve until Ctrl-C.
pub async fn start_peer(state: Arc<PeerState>, bind: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("Peer listening on {addr}");

    axum::serve(listener, peer_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<PeerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_peer_socket(state, socket))
}

async fn health_handler(State(state): State<Arc<PeerState>>) -> impl IntoResponse {
    axum::Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": state.connections(),
    }))
}

async fn handle_peer_socket(state: Arc<PeerState>, ws: WebSocket) {
    let conn_id = Uuid::new_v4().to_string();
    info!(conn_id = %conn_id, "Bridge connected");

    let (mut ws_tx, mut ws_rx) = ws.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let (in_tx, in_rx) = mpsc::unbounded_channel::<Envelope>();

    let session = PeerSession {
        conn_id: conn_id.clone(),
        out: out_tx,
        inbound: in_rx,
    };
    state.connections.fetch_add(1, Ordering::SeqCst);
    if state.sessions.send(session).is_err() {
        warn!(conn_id = %conn_id, "Nobody is accepting sessions, closing");
        state.connections.fetch_sub(1, Ordering::SeqCst);
        let _ = ws_tx.send(Message::Close(None)).await;
        return;
    }

    let send_task = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                return;
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
    });

    while let Some(msg_result) = ws_rx.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match Envelope::decode(text.as_str()) {
                Ok(envelope @ (Envelope::Audio(_) | Envelope::CommandResult(_))) => {
                    let _ = in_tx.send(envelope);
                }
                Ok(other) => {
                    debug!(conn_id = %conn_id, kind = other.kind(), "Ignoring envelope");
                }
                Err(e) => warn!(conn_id = %conn_id, error = %e, "Invalid envelope received"),
            },
            Ok(Message::Close(_)) => {
                debug!(conn_id = %conn_id, "Bridge requested close");
                break;
            }
            Err(e) => {
                warn!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    send_task.abort();
    state.connections.fetch_sub(1, Ordering::SeqCst);
    info!(conn_id = %conn_id, "Bridge disconnected");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
