use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, StreamError};

pub const DEFAULT_TARGET_RATE: u32 = 16_000;
pub const DEFAULT_FRAME_SIZE: usize = 4096;
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const RECONNECT_DELAY_MS: u64 = 2000;

/// Top level settings for one streaming process.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub transport: TransportConfig,
    pub language: LanguageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Rate the remote endpoint expects, in Hz.
    pub target_rate: u32,
    /// Native samples per frame callback.
    pub frame_size: usize,
    pub constraints: InputConstraints,
    /// Input device name; the host default when unset.
    pub device: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target_rate: DEFAULT_TARGET_RATE,
            frame_size: DEFAULT_FRAME_SIZE,
            constraints: InputConstraints::default(),
            device: None,
        }
    }
}

/// Processing the input device is asked to apply before samples reach us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InputConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for InputConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub url: String,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    /// Bound of the command queue between callers and the transport task.
    /// Audio sent while the queue is full is dropped.
    pub command_capacity: usize,
    pub connect_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000/ws".to_string(),
            max_attempts: MAX_RECONNECT_ATTEMPTS,
            retry_delay_ms: RECONNECT_DELAY_MS,
            command_capacity: 256,
            connect_timeout_ms: 10_000,
        }
    }
}

impl TransportConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LanguageConfig {
    pub from: String,
    pub to: String,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            from: "zh-CHS".to_string(),
            to: "en".to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StreamError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Config = serde_json::from_str(&raw)
            .map_err(|e| StreamError::Config(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Applies `SPEECHLINK_URL`, `SPEECHLINK_FROM`, `SPEECHLINK_TO` and
    /// `SPEECHLINK_DEVICE` on top of the current values.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SPEECHLINK_URL") {
            self.transport.url = url;
        }
        if let Some(from) = lookup("SPEECHLINK_FROM") {
            self.language.from = from;
        }
        if let Some(to) = lookup("SPEECHLINK_TO") {
            self.language.to = to;
        }
        if let Some(device) = lookup("SPEECHLINK_DEVICE") {
            self.capture.device = Some(device);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.capture.target_rate == 0 {
            return Err(StreamError::Config("capture.target_rate must be non-zero".into()));
        }
        if self.capture.frame_size == 0 {
            return Err(StreamError::Config("capture.frame_size must be non-zero".into()));
        }
        if self.transport.url.trim().is_empty() {
            return Err(StreamError::Config("transport.url is empty".into()));
        }
        if self.transport.command_capacity == 0 {
            return Err(StreamError::Config("transport.command_capacity must be non-zero".into()));
        }
        Ok(())
    }
}
