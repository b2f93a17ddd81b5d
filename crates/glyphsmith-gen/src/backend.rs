//! Generation backend trait and request/result types
//!
//! A backend is the opaque capability "produce a raster image for a prompt" /
//! "produce vector markup for a prompt". It reports failures structurally and
//! leaves classification to the gateway.

use glyphsmith_core::CancellationToken;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Parameters for raster generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageParams {
    pub width: u32,
    pub height: u32,
    /// "standard" or "hd"
    pub quality: String,
    /// "natural" or "vivid"
    pub style: String,
}

impl Default for ImageParams {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            quality: "hd".to_string(),
            style: "vivid".to_string(),
        }
    }
}

impl ImageParams {
    /// Size string in the `WIDTHxHEIGHT` form backends expect
    pub fn size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Parameters for markup generation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupParams {
    /// Palette hint, hex strings
    #[serde(default)]
    pub colors: Vec<String>,
    /// Target size hint, e.g. "24x24"
    #[serde(default)]
    pub size: Option<String>,
}

/// Where a generated image lives
#[derive(Clone, PartialEq, Eq)]
pub enum ImageSource {
    Url(String),
    Bytes(Vec<u8>),
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Url(url) => write!(f, "Url({})", url),
            ImageSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
        }
    }
}

/// A successfully generated image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub source: ImageSource,
    /// Prompt as rewritten by the backend, when it reports one
    pub revised_prompt: Option<String>,
}

/// Structured failure reported by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendFailure {
    /// The backend answered with a non-success status
    Status { code: u16, message: Option<String> },
    /// The backend answered but the payload did not have the expected shape
    Malformed(String),
    /// The transport gave up at its deadline
    Timeout,
    /// Connection, DNS, or I/O failure
    Transport(String),
    /// The call observed its cancellation token and stopped
    Cancelled,
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendFailure::Status { code, message } => match message {
                Some(m) => write!(f, "HTTP {}: {}", code, m),
                None => write!(f, "HTTP {}", code),
            },
            BackendFailure::Malformed(detail) => write!(f, "malformed payload: {}", detail),
            BackendFailure::Timeout => write!(f, "transport timeout"),
            BackendFailure::Transport(detail) => write!(f, "transport failure: {}", detail),
            BackendFailure::Cancelled => write!(f, "call cancelled"),
        }
    }
}

/// Trait implemented by each generation backend (OpenAI, Mock)
///
/// Every call receives the time budget left for it and a token owned by the
/// gateway. Implementations must make their transport give up by the deadline
/// and stop with [`BackendFailure::Cancelled`] once the token fires.
pub trait GenerationBackend: Send + Sync {
    /// Backend name (e.g. "openai", "mock")
    fn name(&self) -> &str;

    fn generate_image(
        &self,
        instruction: &str,
        params: &ImageParams,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<GeneratedImage, BackendFailure>;

    fn generate_markup(
        &self,
        instruction: &str,
        params: &MarkupParams,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, BackendFailure>;

    /// Download a previously generated image as binary data
    fn fetch_image(
        &self,
        url: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, BackendFailure>;
}
