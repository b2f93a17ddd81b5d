//! Error types for glyphsmith

use thiserror::Error;

/// Failures raised by the rate-limited gateway.
///
/// Classification is driven by response status and payload structure;
/// backend-supplied messages are carried along but never inspected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Backend throttled the request: {0}")]
    RateLimited(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Daily request budget of {0} exhausted")]
    BudgetExhausted(usize),

    #[error("Request cancelled")]
    Cancelled,
}

/// The main error type for glyphsmith operations
#[derive(Debug, Error)]
pub enum GlyphsmithError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Unsupported icon role: {0}")]
    UnsupportedRole(String),

    #[error("Invalid markup: {0}")]
    InvalidMarkup(String),

    #[error("Matrix expansion failed: {0}")]
    MatrixExpansion(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),
}

/// Result type alias for glyphsmith operations
pub type Result<T> = std::result::Result<T, GlyphsmithError>;

impl From<toml::de::Error> for GlyphsmithError {
    fn from(err: toml::de::Error) -> Self {
        GlyphsmithError::TomlParseError(err.to_string())
    }
}

impl GlyphsmithError {
    /// True when the error came from a cancelled request, at any layer
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            GlyphsmithError::Cancelled | GlyphsmithError::Gateway(GatewayError::Cancelled)
        )
    }
}
