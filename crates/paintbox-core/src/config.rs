//! Configuration loading and validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Top-level Paintbox configuration. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge: Option<BridgeConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub canvas: Option<CanvasConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer: Option<PeerConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Peer endpoint (default: ws://127.0.0.1:8080/ws).
    #[serde(default = "default_url")]
    pub url: String,
}

fn default_url() -> String {
    "ws://127.0.0.1:8080/ws".into()
}

/// Where outbound microphone audio comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSource {
    /// No capture device; nothing is sent.
    #[default]
    None,
    /// Zeroed frames on a fixed tick.
    Silence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate of both directions in Hz (default: 24000).
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Stream identifier inbound audio is tagged with on playback.
    #[serde(default = "default_stream_id")]
    pub stream_id: String,

    #[serde(default)]
    pub capture: CaptureSource,

    /// Capture tick for the silence source, in milliseconds (default: 100).
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u64,
}

fn default_sample_rate() -> u32 {
    24_000
}

fn default_stream_id() -> String {
    "ai-audio".into()
}

fn default_frame_ms() -> u64 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasConfig {
    #[serde(default = "default_canvas_width")]
    pub width: u32,

    #[serde(default = "default_canvas_height")]
    pub height: u32,

    /// Add per-step results to `paintCanvas` output.
    #[serde(default)]
    pub report_batch_steps: bool,
}

fn default_canvas_width() -> u32 {
    800
}

fn default_canvas_height() -> u32 {
    600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    #[serde(default = "default_peer_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
}

fn default_peer_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "paintbox_bridge=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> crate::error::Result<String> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| crate::error::PaintboxError::Config(e.to_string()))?;
    Ok(re
        .replace_all(input, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| {
                warn!(var = &caps[1], "Config references an unset environment variable");
                String::new()
            })
        })
        .into_owned())
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&raw)?;

        json5::from_str(&substituted)
            .map_err(|e| crate::error::PaintboxError::Config(e.to_string()))
    }

    /// Default config file location.
    pub fn config_path() -> PathBuf {
        data_dir().join("config.json")
    }

    pub fn bridge_url(&self) -> String {
        self.bridge
            .as_ref()
            .map(|b| b.url.clone())
            .unwrap_or_else(default_url)
    }

    pub fn sample_rate(&self) -> u32 {
        self.audio
            .as_ref()
            .map(|a| a.sample_rate)
            .unwrap_or_else(default_sample_rate)
    }

    pub fn stream_id(&self) -> String {
        self.audio
            .as_ref()
            .map(|a| a.stream_id.clone())
            .unwrap_or_else(default_stream_id)
    }

    pub fn capture_source(&self) -> CaptureSource {
        self.audio.as_ref().map(|a| a.capture).unwrap_or_default()
    }

    pub fn frame_ms(&self) -> u64 {
        self.audio
            .as_ref()
            .map(|a| a.frame_ms)
            .unwrap_or_else(default_frame_ms)
    }

    /// Canvas dimensions in pixels.
    pub fn canvas_size(&self) -> (u32, u32) {
        self.canvas
            .as_ref()
            .map(|c| (c.width, c.height))
            .unwrap_or((default_canvas_width(), default_canvas_height()))
    }

    pub fn report_batch_steps(&self) -> bool {
        self.canvas
            .as_ref()
            .map(|c| c.report_batch_steps)
            .unwrap_or(false)
    }

    pub fn peer_port(&self) -> u16 {
        self.peer
            .as_ref()
            .map(|p| p.port)
            .unwrap_or_else(default_peer_port)
    }

    pub fn peer_bind(&self) -> String {
        self.peer
            .as_ref()
            .and_then(|p| p.bind.clone())
            .unwrap_or_else(|| "127.0.0.1".to_string())
    }

    /// Get a config value by dotted path (e.g. "canvas.width").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        let url = self.bridge_url();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            errors.push(format!("Bridge url must use ws:// or wss://: {url}"));
        }

        if self.sample_rate() == 0 {
            errors.push("Audio sample rate cannot be 0".to_string());
        } else if self.sample_rate() != default_sample_rate() {
            warnings.push(format!(
                "Audio sample rate {} differs from the peer default of {}; audio is not resampled",
                self.sample_rate(),
                default_sample_rate()
            ));
        }

        if self.capture_source() == CaptureSource::Silence && self.frame_ms() == 0 {
            errors.push("Audio frame_ms cannot be 0 with the silence source".to_string());
        }

        let (width, height) = self.canvas_size();
        if width == 0 || height == 0 {
            errors.push(format!("Canvas size must be non-zero, got {width}x{height}"));
        }

        if let Some(peer) = &self.peer {
            if peer.port == 0 {
                errors.push("Peer port cannot be 0".to_string());
            }
        }

        (warnings, errors)
    }

    /// Save config to a file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Base directory for Paintbox data: `~/.paintbox/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".paintbox")
}
