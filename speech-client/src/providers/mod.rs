//! Speech provider implementations

pub mod mock;
mod openai;

pub use mock::MockProvider;
pub use openai::{DEFAULT_MODEL, MAX_INPUT_CHARS, OPENAI_BASE_URL, OpenAiSpeechProvider};

use std::time::Duration;

use crate::config::ProviderConfig;
use crate::error::{Result, SpeechError};
use crate::provider::SpeechProvider;

/// Supported provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
}

impl ProviderKind {
    /// Parse provider kind from string
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" | "open-ai" | "open_ai" => Ok(Self::OpenAi),
            _ => Err(SpeechError::ConfigError(format!("Unknown provider: {}", s))),
        }
    }

    /// Get the environment variable name for this provider's API key
    pub fn env_var(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }

    /// Display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
        }
    }
}

/// Create a provider instance by name and optional config
///
/// `model` overrides the configured model when set.
pub fn get_provider(
    name: &str,
    provider_config: Option<&ProviderConfig>,
    model: Option<&str>,
) -> Result<Box<dyn SpeechProvider>> {
    let kind = ProviderKind::from_str(name)?;

    match kind {
        ProviderKind::OpenAi => {
            let api_key = get_api_key(provider_config, kind.env_var(), kind.display_name())?;
            let base_url = provider_config
                .and_then(|c| c.base_url.as_deref())
                .unwrap_or(OPENAI_BASE_URL);
            let model = model.or_else(|| provider_config.and_then(|c| c.model.as_deref()));
            let timeout = provider_config
                .and_then(|c| c.timeout_secs)
                .map(Duration::from_secs);
            Ok(Box::new(OpenAiSpeechProvider::new(
                model, base_url, api_key, timeout,
            )?))
        }
    }
}

/// Get API key from config or environment variable
fn get_api_key(
    config: Option<&ProviderConfig>,
    env_var: &str,
    provider_name: &str,
) -> Result<String> {
    // Check config first
    if let Some(key) = config.and_then(|c| c.api_key.clone()) {
        if !key.trim().is_empty() {
            return Ok(key.trim().to_string());
        }
    }

    // Fall back to environment variable
    std::env::var(env_var)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| SpeechError::MissingApiKey {
            provider: provider_name.to_string(),
            env_var: env_var.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!(ProviderKind::from_str("OpenAI").unwrap(), ProviderKind::OpenAi);
        assert!(ProviderKind::from_str("espeak").is_err());
    }

    #[test]
    fn test_config_key_takes_precedence() {
        let config = ProviderConfig {
            api_key: Some(" sk-config ".to_string()),
            ..Default::default()
        };
        let key = get_api_key(Some(&config), "PDF_AUDIO_TEST_UNSET_VAR", "OpenAI").unwrap();
        assert_eq!(key, "sk-config");
    }

    #[test]
    fn test_missing_key_reports_env_var() {
        let err = get_api_key(None, "PDF_AUDIO_TEST_UNSET_VAR", "OpenAI").unwrap_err();
        match err {
            SpeechError::MissingApiKey { env_var, .. } => {
                assert_eq!(env_var, "PDF_AUDIO_TEST_UNSET_VAR")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_get_provider_with_configured_key() {
        let config = ProviderConfig {
            api_key: Some("sk-config".to_string()),
            base_url: Some("http://localhost:8880/v1".to_string()),
            ..Default::default()
        };
        let provider = get_provider("openai", Some(&config), Some("tts-1")).unwrap();
        assert_eq!(provider.name(), "OpenAI");
        assert_eq!(provider.max_input_chars(), MAX_INPUT_CHARS);
        assert!(provider.is_available().is_ok());
    }
}
