use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error(
        "API key not found for {provider}. Set {env_var} environment variable or add to config."
    )]
    MissingApiKey { provider: String, env_var: String },

    #[error("Rate limit exceeded{}", .retry_after.map(|s| format!(". Retry after {} seconds", s)).unwrap_or_default())]
    RateLimited { retry_after: Option<u64> },

    #[error("Server overloaded (HTTP 503): {message}")]
    ServerOverloaded { message: String },

    #[error("API error{}: {message}", status_code.map(|c| format!(" (HTTP {})", c)).unwrap_or_default())]
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Provider returned an empty audio payload")]
    EmptyAudio,

    #[error("Input of {len} characters exceeds the provider limit of {limit}")]
    InputTooLong { len: usize, limit: usize },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl SpeechError {
    /// Whether a later attempt with the same input could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::ServerOverloaded { .. } => true,
            Self::ApiError { status_code, .. } => {
                status_code.is_none_or(|code| code >= 500 || code == 408)
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SpeechError>;
