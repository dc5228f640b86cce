//! Audio framing: PCM16 samples to and from the channel's base64 text.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// Bytes encoded per pass: 32 KiB rounded down to a whole number of base64
/// groups, so per-chunk output concatenates to exactly the one-shot encoding.
pub const ENCODE_CHUNK_BYTES: usize = 0x8000 - 0x8000 % 3;

#[derive(Debug, Error)]
pub enum FramingError {
    #[error("invalid base64 audio: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// One capture tick or synthesis delivery of mono audio.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioChunk {
    /// Native 16-bit signed PCM.
    Pcm16(Vec<i16>),
    /// 32-bit float samples, nominally in [-1, 1].
    Float32(Vec<f32>),
}

impl AudioChunk {
    pub fn len(&self) -> usize {
        match self {
            Self::Pcm16(samples) => samples.len(),
            Self::Float32(samples) => samples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Little-endian PCM16 bytes. Float input is quantized.
    pub fn to_pcm16_bytes(&self) -> Vec<u8> {
        match self {
            Self::Pcm16(samples) => pcm16_to_bytes(samples),
            Self::Float32(samples) => float_to_pcm16_bytes(samples),
        }
    }
}

/// Quantize one float sample. Negative samples scale by 32768, the rest by
/// 32767, so +1.0 lands on `i16::MAX` without overflow.
/// The product is taken in f64 and rounded once.
pub fn quantize(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    let s = f64::from(sample.clamp(-1.0, 1.0));
    let scaled = if s < 0.0 { s * 32768.0 } else { s * 32767.0 };
    scaled.round() as i16
}

pub fn float_to_pcm16_bytes(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&s| quantize(s).to_le_bytes())
        .collect()
}

pub fn pcm16_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Little-endian bytes back to samples. A trailing odd byte is ignored.
pub fn pcm16_from_bytes(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Base64-encode raw bytes in fixed-size passes.
pub fn encode_chunked(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for chunk in bytes.chunks(ENCODE_CHUNK_BYTES) {
        STANDARD.encode_string(chunk, &mut out);
    }
    out
}

/// Outbound: audio chunk to transport-safe text.
pub fn frame(chunk: &AudioChunk) -> String {
    encode_chunked(&chunk.to_pcm16_bytes())
}

/// Inbound: transport text to raw PCM16 bytes, byte order preserved.
pub fn unframe(text: &str) -> Result<Vec<u8>, FramingError> {
    Ok(STANDARD.decode(text)?)
}
