//! OpenAI speech API provider
//!
//! Used for the hosted `/v1/audio/speech` endpoint and for self-hosted
//! servers that implement the same request shape.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, SpeechError};
use crate::provider::{SpeechProvider, SpeechRequest, SpeechResponse};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// High-definition model, the default for document narration
pub const DEFAULT_MODEL: &str = "tts-1-hd";

/// Documented input limit of the speech endpoint
pub const MAX_INPUT_CHARS: usize = 4096;

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Provider for OpenAI-compatible speech APIs
pub struct OpenAiSpeechProvider {
    model: String,
    base_url: String,
    api_key: String,
    client: Client,
}

impl OpenAiSpeechProvider {
    /// Create a new provider against a custom base URL
    pub fn new(
        model: Option<&str>,
        base_url: &str,
        api_key: String,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)))
            .build()
            .map_err(|e| SpeechError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    /// Create a provider for the hosted OpenAI API
    pub fn openai(model: Option<&str>, api_key: String) -> Result<Self> {
        Self::new(model, OPENAI_BASE_URL, api_key, None)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct SpeechApiRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[async_trait]
impl SpeechProvider for OpenAiSpeechProvider {
    async fn synthesize(&self, request: SpeechRequest) -> Result<SpeechResponse> {
        let len = request.text.chars().count();
        if len > MAX_INPUT_CHARS {
            return Err(SpeechError::InputTooLong {
                len,
                limit: MAX_INPUT_CHARS,
            });
        }

        let model = request.model.as_deref().unwrap_or(&self.model);
        let api_request = SpeechApiRequest {
            model,
            input: &request.text,
            voice: &request.voice,
            response_format: request.format.as_str(),
        };

        let url = format!("{}/audio/speech", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&api_request)
            .send()
            .await
            .map_err(|e| SpeechError::ApiError {
                message: format!("Request failed: {}", e),
                status_code: None,
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());

            let error_text = response.text().await.unwrap_or_default();
            let message =
                if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&error_text) {
                    error_response.error.message
                } else {
                    error_text
                };

            return Err(match status.as_u16() {
                429 => SpeechError::RateLimited { retry_after },
                503 => SpeechError::ServerOverloaded { message },
                code => SpeechError::ApiError {
                    message,
                    status_code: Some(code),
                },
            });
        }

        let audio = response.bytes().await.map_err(|e| SpeechError::ApiError {
            message: format!("Failed to read audio body: {}", e),
            status_code: None,
        })?;

        if audio.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }

        log::debug!(
            "{} returned {} bytes of {} for {} chars",
            self.name(),
            audio.len(),
            request.format,
            len
        );

        Ok(SpeechResponse {
            audio: audio.to_vec(),
            format: request.format,
            model: model.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "OpenAI"
    }

    fn max_input_chars(&self) -> usize {
        MAX_INPUT_CHARS
    }

    fn is_available(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(SpeechError::MissingApiKey {
                provider: "OpenAI".to_string(),
                env_var: "OPENAI_API_KEY".to_string(),
            });
        }
        Ok(())
    }
}
