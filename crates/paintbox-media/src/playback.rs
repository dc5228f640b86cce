//! Playback side: where inbound synthesized audio goes.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

/// A PCM16 stream player.
#[async_trait]
pub trait AudioPlayback: Send {
    /// Open the output.
    async fn connect(&mut self) -> anyhow::Result<()>;

    /// Enqueue little-endian PCM16 bytes on the stream `stream_id`.
    async fn add_pcm16(&mut self, pcm: Vec<u8>, stream_id: &str) -> anyhow::Result<()>;

    /// Stop and flush anything queued.
    async fn interrupt(&mut self) -> anyhow::Result<()>;
}

/// Everything a [`ChannelPlayback`] was asked to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Connected,
    Chunk { stream_id: String, pcm: Vec<u8> },
    Interrupted,
}

/// Playback that forwards to an in-process channel.
pub struct ChannelPlayback {
    tx: mpsc::UnboundedSender<PlaybackEvent>,
}

impl ChannelPlayback {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn emit(&self, event: PlaybackEvent) -> anyhow::Result<()> {
        self.tx
            .send(event)
            .map_err(|_| anyhow::anyhow!("playback receiver dropped"))
    }
}

#[async_trait]
impl AudioPlayback for ChannelPlayback {
    async fn connect(&mut self) -> anyhow::Result<()> {
        self.emit(PlaybackEvent::Connected)
    }

    async fn add_pcm16(&mut self, pcm: Vec<u8>, stream_id: &str) -> anyhow::Result<()> {
        self.emit(PlaybackEvent::Chunk {
            stream_id: stream_id.to_string(),
            pcm,
        })
    }

    async fn interrupt(&mut self) -> anyhow::Result<()> {
        self.emit(PlaybackEvent::Interrupted)
    }
}

/// Playback with no output device.
#[derive(Default)]
pub struct DiscardPlayback {
    received: usize,
}

#[async_trait]
impl AudioPlayback for DiscardPlayback {
    async fn connect(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn add_pcm16(&mut self, pcm: Vec<u8>, stream_id: &str) -> anyhow::Result<()> {
        self.received += pcm.len();
        debug!(stream_id, bytes = pcm.len(), total = self.received, "Discarding audio");
        Ok(())
    }

    async fn interrupt(&mut self) -> anyhow::Result<()> {
        self.received = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_playback_records_sequence() {
        let (mut playback, mut rx) = ChannelPlayback::new();
        playback.connect().await.unwrap();
        playback.add_pcm16(vec![1, 0], "ai-audio").await.unwrap();
        playback.interrupt().await.unwrap();

        assert_eq!(rx.recv().await, Some(PlaybackEvent::Connected));
        assert_eq!(
            rx.recv().await,
            Some(PlaybackEvent::Chunk {
                stream_id: "ai-audio".into(),
                pcm: vec![1, 0],
            })
        );
        assert_eq!(rx.recv().await, Some(PlaybackEvent::Interrupted));
    }

    #[tokio::test]
    async fn test_channel_playback_errors_when_receiver_gone() {
        let (mut playback, rx) = ChannelPlayback::new();
        drop(rx);
        assert!(playback.connect().await.is_err());
    }
}
