//! Bridge connection lifecycle: connect, route inbound envelopes, stream
//! captured audio out, tear down.

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use paintbox_canvas::RecordingSurface;
use paintbox_core::config::{CaptureSource, Config};
use paintbox_core::error::{PaintboxError, Result};
use paintbox_core::protocol::Envelope;
use paintbox_media::{
    AudioCapture, AudioPlayback, DiscardPlayback, NullCapture, SilenceCapture, frame, unframe,
};

use crate::dispatch::Dispatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Disconnected,
    Connecting,
    Open,
    Closing,
    Errored,
}

/// One bridge endpoint: a dispatcher plus the audio devices, driven over a
/// single WebSocket connection at a time.
pub struct Bridge {
    dispatcher: Dispatcher,
    capture: Option<Box<dyn AudioCapture>>,
    playback: Box<dyn AudioPlayback>,
    stream_id: String,
    phase: ConnectionPhase,
    phase_tx: broadcast::Sender<ConnectionPhase>,
    shutdown: CancellationToken,
}

impl Bridge {
    pub fn new(
        dispatcher: Dispatcher,
        capture: Box<dyn AudioCapture>,
        playback: Box<dyn AudioPlayback>,
    ) -> Self {
        let (phase_tx, _) = broadcast::channel(16);
        Self {
            dispatcher,
            capture: Some(capture),
            playback,
            stream_id: "ai-audio".to_string(),
            phase: ConnectionPhase::Disconnected,
            phase_tx,
            shutdown: CancellationToken::new(),
        }
    }

    /// Build a bridge from config, with an in-memory drawing surface and no
    /// playback device.
    pub fn from_config(config: &Config) -> Self {
        let (width, height) = config.canvas_size();
        let dispatcher = Dispatcher::new(Box::new(RecordingSurface::new(width, height)))
            .with_batch_steps(config.report_batch_steps());

        let capture: Box<dyn AudioCapture> = match config.capture_source() {
            CaptureSource::None => Box::new(NullCapture),
            CaptureSource::Silence => {
                Box::new(SilenceCapture::new(config.sample_rate(), config.frame_ms()))
            }
        };

        Self::new(dispatcher, capture, Box::new(DiscardPlayback::default()))
            .with_stream_id(config.stream_id())
    }

    /// Playback stream that inbound audio is queued on.
    pub fn with_stream_id(mut self, stream_id: impl Into<String>) -> Self {
        self.stream_id = stream_id.into();
        self
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Every phase transition from now on, in order.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionPhase> {
        self.phase_tx.subscribe()
    }

    /// Cancelling this token closes the current connection through the
    /// normal teardown path, and makes `run` return without connecting.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn set_phase(&mut self, phase: ConnectionPhase) {
        debug!(from = ?self.phase, to = ?phase, "Phase change");
        self.phase = phase;
        let _ = self.phase_tx.send(phase);
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Connect to `url` and serve the connection until it closes.
    ///
    /// There is no reconnect: once the connection is gone this returns.
    pub async fn run(&mut self, url: &str) -> Result<()> {
        self.set_phase(ConnectionPhase::Connecting);
        info!(url, "Connecting");

        let shutdown = self.shutdown.clone();
        let connected = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("Shutdown before the connection opened");
                self.set_phase(ConnectionPhase::Disconnected);
                return Ok(());
            }
            connected = tokio_tungstenite::connect_async(url) => connected,
        };

        let ws = match connected {
            Ok((ws, _response)) => ws,
            Err(e) => {
                error!(url, error = %e, "Connection failed");
                self.set_phase(ConnectionPhase::Errored);
                self.set_phase(ConnectionPhase::Disconnected);
                return Err(PaintboxError::Transport(e.to_string()));
            }
        };

        self.serve(ws).await;
        Ok(())
    }

    /// Serve an already-open WebSocket until the peer closes it, the
    /// transport fails, or the shutdown token is cancelled.
    pub async fn serve<S>(&mut self, ws: S)
    where
        S: Stream<Item = std::result::Result<Message, WsError>>
            + Sink<Message, Error = WsError>
            + Send
            + Unpin
            + 'static,
    {
        self.set_phase(ConnectionPhase::Open);
        info!("Bridge connected");

        let (mut ws_tx, mut ws_rx) = ws.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

        let send_task = tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if let Err(e) = ws_tx.send(Message::text(text)).await {
                    warn!(error = %e, "Send failed");
                    break;
                }
            }
            let _ = ws_tx.close().await;
        });

        let cancel = self.shutdown.child_token();
        let capture_task = self.open_devices(&out_tx, &cancel).await;

        let shutdown = self.shutdown.clone();
        loop {
            let msg = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, closing connection");
                    break;
                }
                msg = ws_rx.next() => msg,
            };
            let Some(msg) = msg else { break };
            match msg {
                Ok(Message::Text(text)) => self.handle_text(text.as_str(), &out_tx).await,
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Peer requested close");
                    break;
                }
                Ok(_) => {}
                Err(e @ (WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                    debug!(error = %e, "Connection closed");
                    break;
                }
                Err(e @ (WsError::Io(_) | WsError::Protocol(_))) => {
                    error!(error = %e, "Transport failed");
                    self.set_phase(ConnectionPhase::Errored);
                    break;
                }
                Err(e) => warn!(error = %e, "Transport error"),
            }
        }

        self.set_phase(ConnectionPhase::Closing);
        cancel.cancel();
        if let Some(task) = capture_task {
            match task.await {
                Ok(capture) => self.capture = Some(capture),
                Err(e) => error!(error = %e, "Capture loop panicked"),
            }
        }
        self.close_devices().await;

        drop(out_tx);
        let _ = send_task.await;

        self.set_phase(ConnectionPhase::Disconnected);
        info!("Bridge disconnected");
    }

    /// Start capture, then playback, then the outbound capture loop. A
    /// device that fails to start is logged and left out; commands keep
    /// working without it.
    async fn open_devices(
        &mut self,
        out: &mpsc::UnboundedSender<String>,
        cancel: &CancellationToken,
    ) -> Option<tokio::task::JoinHandle<Box<dyn AudioCapture>>> {
        let mut capture = self.capture.take();
        let capturing = match capture.as_mut() {
            Some(device) => match device.begin().await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Audio capture failed to start");
                    false
                }
            },
            None => false,
        };

        if let Err(e) = self.playback.connect().await {
            warn!(error = %e, "Audio playback failed to start");
        }

        match capture {
            Some(device) if capturing => Some(tokio::spawn(capture_loop(
                device,
                out.clone(),
                cancel.clone(),
            ))),
            device => {
                self.capture = device;
                None
            }
        }
    }

    async fn close_devices(&mut self) {
        if let Some(capture) = self.capture.as_mut() {
            if let Err(e) = capture.pause().await {
                warn!(error = %e, "Failed to pause capture");
            }
            if let Err(e) = capture.end().await {
                warn!(error = %e, "Failed to release capture");
            }
        }
        if let Err(e) = self.playback.interrupt().await {
            warn!(error = %e, "Failed to interrupt playback");
        }
    }

    async fn handle_text(&mut self, text: &str, out: &mpsc::UnboundedSender<String>) {
        match Envelope::decode(text) {
            Ok(Envelope::Audio(payload)) => match unframe(&payload.audio) {
                Ok(pcm) => {
                    if let Err(e) = self.playback.add_pcm16(pcm, &self.stream_id).await {
                        warn!(error = %e, "Playback rejected audio");
                    }
                }
                Err(e) => warn!(error = %e, "Dropping audio"),
            },
            Ok(Envelope::CommandInvoke(request)) => {
                let result = self.dispatcher.dispatch(&request).await;
                if out.send(Envelope::CommandResult(result).encode()).is_err() {
                    warn!(name = %request.name, "Connection closed, result dropped");
                }
            }
            Ok(Envelope::CommandResult(result)) => {
                debug!(name = %result.name, "Ignoring command.result from peer");
            }
            Err(e) => warn!(error = %e, "Dropping message"),
        }
    }
}

/// Frame every captured chunk into an `audio` envelope until cancelled or
/// the device runs dry. Hands the device back for teardown.
async fn capture_loop(
    mut capture: Box<dyn AudioCapture>,
    out: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
) -> Box<dyn AudioCapture> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            chunk = capture.next_chunk() => {
                let Some(chunk) = chunk else {
                    debug!("Capture ended");
                    break;
                };
                if chunk.is_empty() {
                    continue;
                }
                if out.send(Envelope::audio(frame(&chunk)).encode()).is_err() {
                    debug!("Writer gone, stopping capture loop");
                    break;
                }
            }
        }
    }
    capture
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};

    use async_trait::async_trait;
    use futures::channel::mpsc as fmpsc;
    use serde_json::{Value, json};

    use paintbox_core::protocol::InvocationRequest;
    use paintbox_media::{AudioChunk, ChannelCapture, ChannelPlayback};

    /// In-memory WebSocket: reads from `inbound`, writes into `outbound`.
    struct MemorySocket<St> {
        inbound: St,
        outbound: fmpsc::UnboundedSender<Message>,
    }

    impl<St> Stream for MemorySocket<St>
    where
        St: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
    {
        type Item = std::result::Result<Message, WsError>;

        fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            Pin::new(&mut self.get_mut().inbound).poll_next(cx)
        }
    }

    impl<St: Unpin> Sink<Message> for MemorySocket<St> {
        type Error = WsError;

        fn poll_ready(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
        ) -> Poll<std::result::Result<(), WsError>> {
            Pin::new(&mut self.get_mut().outbound)
                .poll_ready(cx)
                .map_err(|_| WsError::ConnectionClosed)
        }

        fn start_send(self: Pin<&mut Self>, item: Message) -> std::result::Result<(), WsError> {
            Pin::new(&mut self.get_mut().outbound)
                .start_send(item)
                .map_err(|_| WsError::ConnectionClosed)
        }

        fn poll_flush(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
        ) -> Poll<std::result::Result<(), WsError>> {
            Pin::new(&mut self.get_mut().outbound)
                .poll_flush(cx)
                .map_err(|_| WsError::ConnectionClosed)
        }

        fn poll_close(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
        ) -> Poll<std::result::Result<(), WsError>> {
            Pin::new(&mut self.get_mut().outbound)
                .poll_close(cx)
                .map_err(|_| WsError::ConnectionClosed)
        }
    }

    type Frames = Pin<Box<dyn Stream<Item = std::result::Result<Message, WsError>> + Send>>;

    /// Socket that yields `frames` one per scheduler turn, then ends.
    fn memory_socket(
        frames: Vec<std::result::Result<Message, WsError>>,
    ) -> (MemorySocket<Frames>, fmpsc::UnboundedReceiver<Message>) {
        let inbound: Frames = Box::pin(futures::stream::iter(frames).then(|frame| async move {
            tokio::task::yield_now().await;
            frame
        }));
        let (outbound, written) = fmpsc::unbounded();
        (MemorySocket { inbound, outbound }, written)
    }

    fn invoke_frame(
        call_id: &str,
        name: &str,
        args: Value,
    ) -> std::result::Result<Message, WsError> {
        let request = InvocationRequest::new(call_id, name, &args);
        Ok(Message::text(Envelope::CommandInvoke(request).encode()))
    }

    #[derive(Clone, Default)]
    struct DeviceLog(Arc<Mutex<Vec<&'static str>>>);

    impl DeviceLog {
        fn push(&self, event: &'static str) {
            self.0.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<&'static str> {
            self.0.lock().unwrap().clone()
        }
    }

    struct LoggedCapture(DeviceLog);

    #[async_trait]
    impl AudioCapture for LoggedCapture {
        async fn begin(&mut self) -> anyhow::Result<()> {
            self.0.push("capture.begin");
            Ok(())
        }

        async fn next_chunk(&mut self) -> Option<AudioChunk> {
            std::future::pending().await
        }

        async fn pause(&mut self) -> anyhow::Result<()> {
            self.0.push("capture.pause");
            Ok(())
        }

        async fn end(&mut self) -> anyhow::Result<()> {
            self.0.push("capture.end");
            Ok(())
        }
    }

    struct LoggedPlayback(DeviceLog);

    #[async_trait]
    impl AudioPlayback for LoggedPlayback {
        async fn connect(&mut self) -> anyhow::Result<()> {
            self.0.push("playback.connect");
            Ok(())
        }

        async fn add_pcm16(&mut self, _pcm: Vec<u8>, _stream_id: &str) -> anyhow::Result<()> {
            self.0.push("playback.chunk");
            Ok(())
        }

        async fn interrupt(&mut self) -> anyhow::Result<()> {
            self.0.push("playback.interrupt");
            Ok(())
        }
    }

    fn logged_bridge() -> (Bridge, DeviceLog) {
        let log = DeviceLog::default();
        let bridge = Bridge::new(
            Dispatcher::new(Box::new(RecordingSurface::new(10, 10))),
            Box::new(LoggedCapture(log.clone())),
            Box::new(LoggedPlayback(log.clone())),
        );
        (bridge, log)
    }

    fn drain(phases: &mut broadcast::Receiver<ConnectionPhase>) -> Vec<ConnectionPhase> {
        let mut seen = Vec::new();
        while let Ok(phase) = phases.try_recv() {
            seen.push(phase);
        }
        seen
    }

    #[test]
    fn test_from_config_defaults() {
        let bridge = Bridge::from_config(&Config::default());
        assert_eq!(bridge.phase(), ConnectionPhase::Disconnected);
        assert_eq!(bridge.stream_id, "ai-audio");
        assert_eq!(bridge.dispatcher().surface().size(), (800, 600));
    }

    #[tokio::test]
    async fn test_connect_failure_reports_transport_error() {
        let (capture, _feed) = ChannelCapture::new();
        let (playback, _events) = ChannelPlayback::new();
        let mut bridge = Bridge::new(
            Dispatcher::new(Box::new(RecordingSurface::new(10, 10))),
            Box::new(capture),
            Box::new(playback),
        );

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = bridge
            .run(&format!("ws://127.0.0.1:{port}/ws"))
            .await
            .unwrap_err();
        assert!(matches!(err, PaintboxError::Transport(_)));
        assert_eq!(bridge.phase(), ConnectionPhase::Disconnected);
    }

    #[tokio::test]
    async fn test_devices_start_capture_first_and_stop_in_reverse() {
        let (mut bridge, log) = logged_bridge();
        let (socket, _written) = memory_socket(vec![Ok(Message::Close(None))]);

        bridge.serve(socket).await;

        assert_eq!(
            log.events(),
            vec![
                "capture.begin",
                "playback.connect",
                "capture.pause",
                "capture.end",
                "playback.interrupt",
            ]
        );
    }

    #[tokio::test]
    async fn test_transport_failure_passes_through_errored() {
        let (mut bridge, log) = logged_bridge();
        let mut phases = bridge.subscribe();
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let (socket, mut written) =
            memory_socket(vec![
            invoke_frame("c1", "beginPath", json!({})),
            Err(WsError::Io(reset)),
        ]);

        bridge.serve(socket).await;

        assert_eq!(
            drain(&mut phases),
            vec![
                ConnectionPhase::Open,
                ConnectionPhase::Errored,
                ConnectionPhase::Closing,
                ConnectionPhase::Disconnected,
            ]
        );
        assert_eq!(log.events().last(), Some(&"playback.interrupt"));

        // The result answered before the failure was still flushed.
        let Some(Message::Text(text)) = written.next().await else {
            panic!("expected the command.result");
        };
        let Envelope::CommandResult(result) = Envelope::decode(text.as_str()).unwrap() else {
            panic!("expected command.result");
        };
        assert_eq!(result.name, "beginPath");
    }

    #[tokio::test]
    async fn test_peer_close_skips_errored() {
        let (mut bridge, _log) = logged_bridge();
        let mut phases = bridge.subscribe();
        let (socket, _written) = memory_socket(vec![Ok(Message::Close(None))]);

        bridge.serve(socket).await;

        assert_eq!(
            drain(&mut phases),
            vec![
                ConnectionPhase::Open,
                ConnectionPhase::Closing,
                ConnectionPhase::Disconnected,
            ]
        );
    }

    #[tokio::test]
    async fn test_results_after_writer_closed_are_dropped() {
        let (mut bridge, log) = logged_bridge();
        let (socket, written) = memory_socket(vec![
            invoke_frame("c1", "setLineWidth", json!({"width": 2})),
            invoke_frame("c2", "setLineWidth", json!({"width": 7})),
        ]);
        drop(written);

        bridge.serve(socket).await;

        assert_eq!(bridge.phase(), ConnectionPhase::Disconnected);
        // Both commands ran even though neither answer could be written.
        assert_eq!(bridge.dispatcher().surface().state().line_width, 7.0);
        assert_eq!(log.events().last(), Some(&"playback.interrupt"));
    }

    #[tokio::test]
    async fn test_shutdown_token_closes_through_teardown() {
        let (mut bridge, log) = logged_bridge();
        let mut phases = bridge.subscribe();
        let shutdown = bridge.shutdown_token();
        let (outbound, mut written) = fmpsc::unbounded();
        let inbound: Frames = Box::pin(futures::stream::pending());
        let socket = MemorySocket { inbound, outbound };

        tokio::spawn(async move {
            tokio::task::yield_now().await;
            shutdown.cancel();
        });
        tokio::time::timeout(std::time::Duration::from_secs(5), bridge.serve(socket))
            .await
            .expect("shutdown did not stop the bridge");

        assert_eq!(
            drain(&mut phases),
            vec![
                ConnectionPhase::Open,
                ConnectionPhase::Closing,
                ConnectionPhase::Disconnected,
            ]
        );
        assert_eq!(
            log.events(),
            vec![
                "capture.begin",
                "playback.connect",
                "capture.pause",
                "capture.end",
                "playback.interrupt",
            ]
        );
        // The writer half was closed, so nothing more is coming.
        assert!(written.next().await.is_none());
    }

    #[tokio::test]
    async fn test_run_returns_when_already_shut_down() {
        let (mut bridge, log) = logged_bridge();
        bridge.shutdown_token().cancel();

        bridge.run("ws://127.0.0.1:9/ws").await.unwrap();

        assert_eq!(bridge.phase(), ConnectionPhase::Disconnected);
        assert!(log.events().is_empty());
    }
}
