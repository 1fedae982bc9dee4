//! File and environment configuration for the `equilay` binary.

use anyhow::{Context, Result};
use equilay_realtime::VoiceConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings read from `config.toml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Realtime voice model.
    pub live_model: String,
    /// Model used for search-grounded market refreshes.
    pub search_model: String,
    /// Prebuilt voice name, e.g. `Kore`.
    pub voice: Option<String>,
    pub connect_timeout_secs: u64,
    /// Samples per microphone frame.
    pub frame_size: usize,
    /// Outbound audio frames buffered before new ones are dropped.
    pub audio_queue_capacity: usize,
    /// Log filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub json_logs: bool,
    /// OTLP collector endpoint; console logging only when unset.
    pub otlp_endpoint: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let voice = VoiceConfig::default();
        Self {
            live_model: equilay_realtime::gemini::DEFAULT_MODEL.to_string(),
            search_model: equilay_market::DEFAULT_SEARCH_MODEL.to_string(),
            voice: None,
            connect_timeout_secs: voice.connect_timeout.as_secs(),
            frame_size: voice.frame_size,
            audio_queue_capacity: voice.audio_queue_capacity,
            log_filter: "warn,equilay=info".to_string(),
            json_logs: false,
            otlp_endpoint: None,
        }
    }
}

impl AppConfig {
    /// `<config dir>/equilay/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("equilay").join("config.toml"))
    }

    /// Load `path`, or the default path when `None`.
    ///
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Parse one TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Pipeline settings for the voice session manager.
    pub fn voice_config(&self) -> VoiceConfig {
        let mut config = VoiceConfig::default()
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs.max(1)))
            .with_frame_size(self.frame_size.max(1))
            .with_audio_queue_capacity(self.audio_queue_capacity.max(1));
        if let Some(voice) = &self.voice {
            config = config.with_voice(voice);
        }
        config
    }
}

/// API key from `GOOGLE_API_KEY`, falling back to `GEMINI_API_KEY`.
pub fn api_key_from_env() -> Result<String> {
    std::env::var("GOOGLE_API_KEY")
        .or_else(|_| std::env::var("GEMINI_API_KEY"))
        .map_err(|_| anyhow::anyhow!("GOOGLE_API_KEY or GEMINI_API_KEY environment variable not set"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: AppConfig = toml::from_str("voice = \"Kore\"\nconnect_timeout_secs = 5\n").unwrap();
        assert_eq!(config.voice.as_deref(), Some("Kore"));
        assert_eq!(config.frame_size, 4096);
        assert_eq!(config.search_model, "gemini-3-flash-preview");

        let voice = config.voice_config();
        assert_eq!(voice.connect_timeout, Duration::from_secs(5));
        assert_eq!(voice.voice.as_deref(), Some("Kore"));
    }

    #[test]
    fn test_defaults_match_pipeline() {
        assert_eq!(AppConfig::default().voice_config(), VoiceConfig::default());
    }
}
