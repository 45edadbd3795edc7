use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpeechError};

/// Encoding of the audio payload returned by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
    Flac,
}

impl AudioFormat {
    /// Parse an audio format from its wire name
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "wav" | "wave" => Ok(Self::Wav),
            "flac" => Ok(Self::Flac),
            _ => Err(SpeechError::ConfigError(format!("Unknown audio format: {}", s))),
        }
    }

    /// Name used in API requests
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Flac => "flac",
        }
    }

    /// File extension for staged payloads
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request to send to a speech provider
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub text: String,
    /// Opaque voice identifier, passed through unvalidated
    pub voice: String,
    pub format: AudioFormat,
    /// Model override; providers fall back to their own default
    pub model: Option<String>,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: voice.into(),
            format: AudioFormat::default(),
            model: None,
        }
    }

    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

/// Response from a speech provider
#[derive(Debug, Clone)]
pub struct SpeechResponse {
    /// Encoded audio bytes
    pub audio: Vec<u8>,
    pub format: AudioFormat,
    pub model: String,
}

/// Trait for speech synthesis providers
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Synthesize one piece of text into an encoded audio payload
    async fn synthesize(&self, request: SpeechRequest) -> Result<SpeechResponse>;

    /// Get the provider name for display
    fn name(&self) -> &'static str;

    /// Longest input, in characters, the provider accepts
    fn max_input_chars(&self) -> usize;

    /// Check if the provider is configured (API key set, etc.)
    fn is_available(&self) -> Result<()>;

    /// Verify the credentials with a minimal round trip.
    async fn check_credentials(&self, voice: &str) -> Result<()> {
        self.synthesize(SpeechRequest::new("Test", voice)).await?;
        Ok(())
    }
}
