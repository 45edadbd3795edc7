//! Shared text-to-speech client library for the pdf-audio workspace
//!
//! Provides a unified interface over speech synthesis backends:
//! - OpenAI `/audio/speech` (hosted or compatible self-hosted servers)
//! - A mock provider for tests

pub mod config;
pub mod error;
pub mod provider;
pub mod providers;
pub mod voice;

pub use config::{Config, ProviderConfig};
pub use error::{Result, SpeechError};
pub use provider::{AudioFormat, SpeechProvider, SpeechRequest, SpeechResponse};
pub use providers::{MockProvider, OpenAiSpeechProvider, ProviderKind, get_provider};
pub use voice::{DEFAULT_VOICE, VOICES, VoiceInfo, find_voice};
