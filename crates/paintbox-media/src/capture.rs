//! Capture side: where outbound microphone audio comes from.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::framer::AudioChunk;

/// A mono capture device at the configured sample rate.
#[async_trait]
pub trait AudioCapture: Send {
    /// Acquire the device.
    async fn begin(&mut self) -> anyhow::Result<()>;

    /// Wait for the next captured chunk. `None` means the device is done.
    ///
    /// Must be cancel-safe: the capture loop races it against shutdown.
    async fn next_chunk(&mut self) -> Option<AudioChunk>;

    /// Stop delivering chunks.
    async fn pause(&mut self) -> anyhow::Result<()>;

    /// Release the device.
    async fn end(&mut self) -> anyhow::Result<()>;
}

/// Capture fed from an in-process channel.
pub struct ChannelCapture {
    rx: mpsc::UnboundedReceiver<AudioChunk>,
    paused: bool,
    ended: Arc<AtomicBool>,
}

/// Feeding side of a [`ChannelCapture`].
#[derive(Clone)]
pub struct CaptureFeed {
    pub chunks: mpsc::UnboundedSender<AudioChunk>,
    ended: Arc<AtomicBool>,
}

impl CaptureFeed {
    /// Whether the capture was released with [`AudioCapture::end`].
    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
}

impl ChannelCapture {
    pub fn new() -> (Self, CaptureFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ended = Arc::new(AtomicBool::new(false));
        let capture = Self {
            rx,
            paused: false,
            ended: ended.clone(),
        };
        (capture, CaptureFeed { chunks: tx, ended })
    }
}

#[async_trait]
impl AudioCapture for ChannelCapture {
    async fn begin(&mut self) -> anyhow::Result<()> {
        self.paused = false;
        Ok(())
    }

    async fn next_chunk(&mut self) -> Option<AudioChunk> {
        if self.paused || self.ended.load(Ordering::SeqCst) {
            return None;
        }
        self.rx.recv().await
    }

    async fn pause(&mut self) -> anyhow::Result<()> {
        self.paused = true;
        Ok(())
    }

    async fn end(&mut self) -> anyhow::Result<()> {
        self.rx.close();
        self.ended.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// No device. Never yields a chunk.
#[derive(Default)]
pub struct NullCapture;

#[async_trait]
impl AudioCapture for NullCapture {
    async fn begin(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn next_chunk(&mut self) -> Option<AudioChunk> {
        std::future::pending().await
    }

    async fn pause(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn end(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Zeroed PCM16 frames on a fixed tick.
pub struct SilenceCapture {
    frame_samples: usize,
    period: Duration,
    ticker: Option<tokio::time::Interval>,
}

impl SilenceCapture {
    pub fn new(sample_rate: u32, frame_ms: u64) -> Self {
        let frame_samples = (sample_rate as u64 * frame_ms / 1000) as usize;
        Self {
            frame_samples,
            period: Duration::from_millis(frame_ms.max(1)),
            ticker: None,
        }
    }
}

#[async_trait]
impl AudioCapture for SilenceCapture {
    async fn begin(&mut self) -> anyhow::Result<()> {
        debug!(frame_samples = self.frame_samples, "Silence capture started");
        self.ticker = Some(tokio::time::interval(self.period));
        Ok(())
    }

    async fn next_chunk(&mut self) -> Option<AudioChunk> {
        let ticker = self.ticker.as_mut()?;
        ticker.tick().await;
        Some(AudioChunk::Pcm16(vec![0; self.frame_samples]))
    }

    async fn pause(&mut self) -> anyhow::Result<()> {
        self.ticker = None;
        Ok(())
    }

    async fn end(&mut self) -> anyhow::Result<()> {
        self.ticker = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_capture_delivers_then_ends() {
        let (mut capture, feed) = ChannelCapture::new();
        capture.begin().await.unwrap();

        feed.chunks.send(AudioChunk::Pcm16(vec![1, 2, 3])).unwrap();
        assert_eq!(capture.next_chunk().await, Some(AudioChunk::Pcm16(vec![1, 2, 3])));

        capture.pause().await.unwrap();
        assert_eq!(capture.next_chunk().await, None);

        assert!(!feed.is_ended());
        capture.end().await.unwrap();
        assert!(feed.is_ended());
        assert!(feed.chunks.send(AudioChunk::Pcm16(vec![])).is_err());
    }

    #[tokio::test]
    async fn test_silence_capture_frame_size() {
        let mut capture = SilenceCapture::new(24_000, 20);
        assert_eq!(capture.next_chunk().await, None);

        capture.begin().await.unwrap();
        let chunk = capture.next_chunk().await.unwrap();
        assert_eq!(chunk, AudioChunk::Pcm16(vec![0; 480]));

        capture.end().await.unwrap();
        assert_eq!(capture.next_chunk().await, None);
    }
}
