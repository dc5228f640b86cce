//! Audio path: PCM framing plus the capture and playback device seams.

pub mod capture;
pub mod framer;
pub mod playback;

pub use capture::{AudioCapture, CaptureFeed, ChannelCapture, NullCapture, SilenceCapture};
pub use framer::{AudioChunk, FramingError, frame, pcm16_to_bytes, unframe};
pub use playback::{AudioPlayback, ChannelPlayback, DiscardPlayback, PlaybackEvent};
