//! OpenAI-compatible backend
//!
//! Raster images come from the image generation endpoint (DALL-E 3), vector
//! markup from the chat completion endpoint. Every request builds an agent
//! whose global timeout equals the time the gateway granted the call, so the
//! transport terminates itself at the gateway's deadline. Bodies are read in
//! chunks and the call's token is checked between them, so a cancelled call
//! drops its connection instead of draining it.

use crate::backend::*;
use crate::config::GlyphsmithConfig;
use base64::Engine as _;
use glyphsmith_core::{CancellationToken, GlyphsmithError, Result};
use std::io::Read;
use std::time::Duration;

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
const IMAGE_MODEL: &str = "dall-e-3";
const CHAT_MODEL: &str = "gpt-4";
const READ_CHUNK: usize = 16 * 1024;
const SVG_SYSTEM_PROMPT: &str = "You are an expert SVG designer. Generate clean, optimized SVG code for iOS app assets. Return only valid SVG markup.";

/// Backend speaking the OpenAI REST dialect
pub struct OpenAiBackend {
    api_key: String,
    api_url: String,
}

impl OpenAiBackend {
    /// Create a new backend from config
    pub fn from_config(config: &GlyphsmithConfig) -> Result<Self> {
        let api_key = config
            .api_key("openai")
            .ok_or_else(|| {
                GlyphsmithError::Config(
                    "OpenAI API key not configured. Set GLYPHSMITH_OPENAI_API_KEY or add to .glyphsmith/config.toml".to_string(),
                )
            })?
            .to_string();

        if !looks_like_api_key(&api_key) {
            return Err(GlyphsmithError::Config(
                "OpenAI API key should start with \"sk-\" and be at least 20 characters".to_string(),
            ));
        }

        let api_url = config
            .api_url("openai")
            .unwrap_or(DEFAULT_OPENAI_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self { api_key, api_url })
    }

    fn post_json(
        &self,
        endpoint: &str,
        payload: &serde_json::Value,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> std::result::Result<serde_json::Value, BackendFailure> {
        if cancel.is_cancelled() {
            return Err(BackendFailure::Cancelled);
        }
        let agent = build_agent(timeout, false);
        let response = agent
            .post(&format!("{}{}", self.api_url, endpoint))
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send_json(payload)
            .map_err(map_transport_error)?;

        let status = response.status().as_u16();
        let raw = read_body(response.into_body().into_reader(), cancel)?;
        let body: Option<serde_json::Value> = serde_json::from_slice(&raw).ok();

        if !(200..300).contains(&status) {
            return Err(BackendFailure::Status {
                code: status,
                message: body.as_ref().and_then(error_message),
            });
        }

        body.ok_or_else(|| BackendFailure::Malformed("response body is not JSON".to_string()))
    }
}

/// Basic key shape check: `sk-` prefix and a plausible length
pub fn looks_like_api_key(key: &str) -> bool {
    key.starts_with("sk-") && key.len() >= 20
}

fn build_agent(timeout: Duration, status_as_error: bool) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(status_as_error)
        .build();
    config.into()
}

fn map_transport_error(e: ureq::Error) -> BackendFailure {
    match e {
        ureq::Error::Timeout(_) => BackendFailure::Timeout,
        ureq::Error::StatusCode(code) => BackendFailure::Status {
            code,
            message: None,
        },
        ureq::Error::Json(e) => BackendFailure::Malformed(e.to_string()),
        other => BackendFailure::Transport(other.to_string()),
    }
}

/// Read a response body to the end, stopping as soon as `cancel` fires
pub fn read_body(mut reader: impl Read, cancel: &CancellationToken) -> std::result::Result<Vec<u8>, BackendFailure> {
    let mut bytes = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        if cancel.is_cancelled() {
            return Err(BackendFailure::Cancelled);
        }
        match reader.read(&mut chunk) {
            Ok(0) => return Ok(bytes),
            Ok(n) => bytes.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Err(BackendFailure::Timeout),
            Err(e) => return Err(BackendFailure::Transport(format!("failed to read body: {}", e))),
        }
    }
}

/// Extract the backend-supplied `error.message`, if any
pub fn error_message(body: &serde_json::Value) -> Option<String> {
    body.get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(|s| s.to_string())
}

/// Parse an image generation response (`data[0].url` or `data[0].b64_json`)
pub fn parse_image_response(
    response: &serde_json::Value,
) -> std::result::Result<GeneratedImage, BackendFailure> {
    let first = response
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| BackendFailure::Malformed("missing data[0]".to_string()))?;

    let revised_prompt = first
        .get("revised_prompt")
        .and_then(|p| p.as_str())
        .map(|s| s.to_string());

    if let Some(url) = first.get("url").and_then(|u| u.as_str()) {
        return Ok(GeneratedImage {
            source: ImageSource::Url(url.to_string()),
            revised_prompt,
        });
    }

    if let Some(encoded) = first.get("b64_json").and_then(|b| b.as_str()) {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| BackendFailure::Malformed(format!("invalid b64_json: {}", e)))?;
        return Ok(GeneratedImage {
            source: ImageSource::Bytes(bytes),
            revised_prompt,
        });
    }

    Err(BackendFailure::Malformed(
        "data[0] has neither url nor b64_json".to_string(),
    ))
}

/// Parse a chat completion response (`choices[0].message.content`)
pub fn parse_chat_response(
    response: &serde_json::Value,
) -> std::result::Result<String, BackendFailure> {
    response
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| BackendFailure::Malformed("missing choices[0].message.content".to_string()))
}

impl GenerationBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn generate_image(
        &self,
        instruction: &str,
        params: &ImageParams,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> std::result::Result<GeneratedImage, BackendFailure> {
        let payload = serde_json::json!({
            "model": IMAGE_MODEL,
            "prompt": instruction,
            "size": params.size(),
            "quality": params.quality,
            "style": params.style,
            "n": 1
        });

        let response = self.post_json("/images/generations", &payload, timeout, cancel)?;
        parse_image_response(&response)
    }

    fn generate_markup(
        &self,
        instruction: &str,
        _params: &MarkupParams,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, BackendFailure> {
        let payload = serde_json::json!({
            "model": CHAT_MODEL,
            "messages": [
                { "role": "system", "content": SVG_SYSTEM_PROMPT },
                { "role": "user", "content": instruction }
            ],
            "temperature": 0.7,
            "max_tokens": 2000
        });

        let response = self.post_json("/chat/completions", &payload, timeout, cancel)?;
        parse_chat_response(&response)
    }

    fn fetch_image(
        &self,
        url: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> std::result::Result<Vec<u8>, BackendFailure> {
        if cancel.is_cancelled() {
            return Err(BackendFailure::Cancelled);
        }
        let agent = build_agent(timeout, true);
        let response = agent.get(url).call().map_err(map_transport_error)?;
        read_body(response.into_body().into_reader(), cancel)
    }
}
