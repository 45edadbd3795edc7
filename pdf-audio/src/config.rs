//! pdf-audio job defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use speech_client::{AudioFormat, DEFAULT_VOICE};
use std::fs;
use std::path::PathBuf;

use crate::audio::{DEFAULT_SILENCE_SECS, MAX_SILENCE_SECS};
use crate::text::DEFAULT_MAX_CHUNK_LENGTH;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfAudioConfig {
    /// Speech provider name (see speech.toml for credentials)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Voice identifier passed to the provider
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Encoding requested from the provider
    #[serde(default)]
    pub format: AudioFormat,

    /// Model override
    #[serde(default)]
    pub model: Option<String>,

    /// Upper bound on chunk length, in characters
    #[serde(default = "default_max_chunk_length")]
    pub max_chunk_length: usize,

    /// Pause inserted between chunks, in seconds
    #[serde(default = "default_silence_secs")]
    pub silence_secs: f64,

    /// Concurrent synthesis requests
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Extra attempts per chunk on transient errors
    #[serde(default)]
    pub max_retries: u32,

    /// Give up on unfinished chunks after this many seconds
    #[serde(default)]
    pub job_timeout_secs: Option<u64>,

    /// MinerU server, tried before local extraction when set
    #[serde(default)]
    pub mineru_url: Option<String>,

    #[serde(default = "default_mineru_backend")]
    pub mineru_backend: String,

    #[serde(default = "default_mineru_lang")]
    pub mineru_lang: String,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_voice() -> String {
    DEFAULT_VOICE.to_string()
}

fn default_max_chunk_length() -> usize {
    DEFAULT_MAX_CHUNK_LENGTH
}

fn default_silence_secs() -> f64 {
    DEFAULT_SILENCE_SECS
}

fn default_workers() -> usize {
    1
}

fn default_mineru_backend() -> String {
    "pipeline".to_string()
}

fn default_mineru_lang() -> String {
    "ch".to_string()
}

impl Default for PdfAudioConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            voice: default_voice(),
            format: AudioFormat::default(),
            model: None,
            max_chunk_length: default_max_chunk_length(),
            silence_secs: default_silence_secs(),
            workers: default_workers(),
            max_retries: 0,
            job_timeout_secs: None,
            mineru_url: None,
            mineru_backend: default_mineru_backend(),
            mineru_lang: default_mineru_lang(),
        }
    }
}

impl PdfAudioConfig {
    /// Get the config file path: <config dir>/cli-programs/pdf-audio.toml
    pub fn config_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(dir.join("cli-programs").join("pdf-audio.toml"))
    }

    /// Load config from file, returning default if file doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: PdfAudioConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        Ok(config)
    }

    /// Reject values a job cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=MAX_SILENCE_SECS).contains(&self.silence_secs) {
            anyhow::bail!(
                "silence_secs must be between 0 and {} seconds, got {}",
                MAX_SILENCE_SECS,
                self.silence_secs
            );
        }
        if self.max_chunk_length == 0 {
            anyhow::bail!("max_chunk_length must be at least 1");
        }
        if self.workers == 0 {
            anyhow::bail!("workers must be at least 1");
        }
        Ok(())
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PdfAudioConfig::default();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.voice, "alloy");
        assert_eq!(config.format, AudioFormat::Mp3);
        assert_eq!(config.max_chunk_length, 4000);
        assert_eq!(config.silence_secs, 0.5);
        assert_eq!(config.workers, 1);
        assert_eq!(config.max_retries, 0);
        assert!(config.model.is_none());
        assert!(config.mineru_url.is_none());
    }

    #[test]
    fn test_config_path() {
        if let Ok(path) = PdfAudioConfig::config_path() {
            assert!(path.ends_with("cli-programs/pdf-audio.toml"));
        }
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
voice = "nova"
format = "wav"
model = "tts-1"
max_chunk_length = 2000
workers = 4
job_timeout_secs = 600
mineru_url = "http://localhost:8000"
"#;
        let config: PdfAudioConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.voice, "nova");
        assert_eq!(config.format, AudioFormat::Wav);
        assert_eq!(config.model.as_deref(), Some("tts-1"));
        assert_eq!(config.max_chunk_length, 2000);
        assert_eq!(config.workers, 4);
        assert_eq!(config.job_timeout_secs, Some(600));
        assert_eq!(config.mineru_url.as_deref(), Some("http://localhost:8000"));
        assert_eq!(config.mineru_backend, "pipeline");
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let huge: PdfAudioConfig = toml::from_str("silence_secs = 1e15").unwrap();
        assert!(huge.validate().is_err());

        let negative: PdfAudioConfig = toml::from_str("silence_secs = -0.5").unwrap();
        assert!(negative.validate().is_err());

        let idle: PdfAudioConfig = toml::from_str("workers = 0").unwrap();
        assert!(idle.validate().is_err());

        let ok: PdfAudioConfig = toml::from_str("silence_secs = 2.0").unwrap();
        assert!(ok.validate().is_ok());
        assert!(PdfAudioConfig::default().validate().is_ok());
    }

    #[test]
    fn test_parse_empty_config() {
        let config: PdfAudioConfig = toml::from_str("").unwrap();
        assert_eq!(config, PdfAudioConfig::default());
    }

    #[test]
    fn test_round_trip() {
        let config = PdfAudioConfig {
            voice: "onyx".to_string(),
            mineru_url: Some("http://mineru:8000".to_string()),
            ..Default::default()
        };
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: PdfAudioConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed, config);
    }
}
