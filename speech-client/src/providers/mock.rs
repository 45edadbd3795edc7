//! Mock speech provider for testing
//!
//! Returns a fixed audio payload and can be told to fail or stall on
//! specific inputs, which lets callers exercise partial failures and
//! timeouts without a network.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{Result, SpeechError};
use crate::provider::{SpeechProvider, SpeechRequest, SpeechResponse};

/// A mock provider for testing dispatch, failure isolation and timeouts
pub struct MockProvider {
    /// Number of leading calls that fail (0 = none)
    fail_count: AtomicUsize,
    /// Current call count
    call_count: AtomicUsize,
    /// Error returned by failing calls
    fail_with: Mutex<Option<SpeechError>>,
    /// Inputs containing this marker always fail
    fail_marker: Option<String>,
    /// Inputs containing the marker are delayed by the duration
    delay: Option<(String, Duration)>,
    /// Audio returned on success
    audio: Vec<u8>,
    /// Inputs containing the marker get this audio instead
    audio_overrides: Vec<(String, Vec<u8>)>,
    /// Texts received, in call order
    received: Mutex<Vec<String>>,
    max_input_chars: usize,
    available: bool,
}

impl MockProvider {
    fn with_audio(audio: Vec<u8>) -> Self {
        Self {
            fail_count: AtomicUsize::new(0),
            call_count: AtomicUsize::new(0),
            fail_with: Mutex::new(None),
            fail_marker: None,
            delay: None,
            audio,
            audio_overrides: Vec::new(),
            received: Mutex::new(Vec::new()),
            max_input_chars: 4096,
            available: true,
        }
    }

    /// Create a provider that always returns `audio`
    pub fn always_succeeds(audio: Vec<u8>) -> Self {
        Self::with_audio(audio)
    }

    /// Create a provider that always fails with the given error
    pub fn always_fails(error: SpeechError) -> Self {
        let provider = Self::with_audio(Vec::new());
        provider.fail_count.store(usize::MAX, Ordering::SeqCst);
        *provider.fail_with.lock().unwrap() = Some(error);
        provider
    }

    /// Create a provider that fails `n` times with the given error, then succeeds
    pub fn fails_then_succeeds(n: usize, error: SpeechError, audio: Vec<u8>) -> Self {
        let provider = Self::with_audio(audio);
        provider.fail_count.store(n, Ordering::SeqCst);
        *provider.fail_with.lock().unwrap() = Some(error);
        provider
    }

    /// Fail every request whose text contains `marker`
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    /// Delay every request whose text contains `marker`
    pub fn delaying(mut self, marker: &str, delay: Duration) -> Self {
        self.delay = Some((marker.to_string(), delay));
        self
    }

    /// Return `audio` for every request whose text contains `marker`
    pub fn with_audio_for(mut self, marker: &str, audio: Vec<u8>) -> Self {
        self.audio_overrides.push((marker.to_string(), audio));
        self
    }

    /// Override the advertised input limit
    pub fn with_max_input_chars(mut self, limit: usize) -> Self {
        self.max_input_chars = limit;
        self
    }

    /// Report the provider as unconfigured
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Get the number of times synthesize() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Texts received so far, in call order
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechProvider for MockProvider {
    async fn synthesize(&self, request: SpeechRequest) -> Result<SpeechResponse> {
        let call_num = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.received.lock().unwrap().push(request.text.clone());

        if let Some((marker, delay)) = &self.delay {
            if request.text.contains(marker.as_str()) {
                tokio::time::sleep(*delay).await;
            }
        }

        if let Some(marker) = &self.fail_marker {
            if request.text.contains(marker.as_str()) {
                return Err(SpeechError::ApiError {
                    message: format!("mock rejected input containing '{}'", marker),
                    status_code: Some(400),
                });
            }
        }

        if call_num < self.fail_count.load(Ordering::SeqCst) {
            let error = self.fail_with.lock().unwrap();
            if let Some(err) = error.as_ref() {
                return Err(clone_error(err));
            }
        }

        let audio = self
            .audio_overrides
            .iter()
            .find(|(marker, _)| request.text.contains(marker.as_str()))
            .map_or(&self.audio, |(_, audio)| audio);

        if audio.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }

        Ok(SpeechResponse {
            audio: audio.clone(),
            format: request.format,
            model: "mock-model".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    fn max_input_chars(&self) -> usize {
        self.max_input_chars
    }

    fn is_available(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(SpeechError::MissingApiKey {
                provider: "mock".to_string(),
                env_var: "MOCK_API_KEY".to_string(),
            })
        }
    }
}

/// Clone a SpeechError (needed because SpeechError doesn't implement Clone)
fn clone_error(err: &SpeechError) -> SpeechError {
    match err {
        SpeechError::ServerOverloaded { message } => SpeechError::ServerOverloaded {
            message: message.clone(),
        },
        SpeechError::MissingApiKey { provider, env_var } => SpeechError::MissingApiKey {
            provider: provider.clone(),
            env_var: env_var.clone(),
        },
        SpeechError::RateLimited { retry_after } => SpeechError::RateLimited {
            retry_after: *retry_after,
        },
        SpeechError::ApiError {
            message,
            status_code,
        } => SpeechError::ApiError {
            message: message.clone(),
            status_code: *status_code,
        },
        SpeechError::EmptyAudio => SpeechError::EmptyAudio,
        SpeechError::InputTooLong { len, limit } => SpeechError::InputTooLong {
            len: *len,
            limit: *limit,
        },
        SpeechError::ConfigError(s) => SpeechError::ConfigError(s.clone()),
        // For Io and Toml errors, we create a generic error since they can't be cloned
        SpeechError::Io(_) => SpeechError::ConfigError("IO error (mock)".to_string()),
        SpeechError::TomlParse(_) => SpeechError::ConfigError("TOML parse error (mock)".to_string()),
        SpeechError::TomlSerialize(_) => {
            SpeechError::ConfigError("TOML serialize error (mock)".to_string())
        }
    }
}
