//! Mock backend for testing and offline runs
//!
//! Generates solid-color PNGs and fixed SVG markup without any network calls.
//! Failure modes can be scripted to exercise the gateway and orchestrator.

use crate::backend::*;
use glyphsmith_core::CancellationToken;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const MOCK_URL_SCHEME: &str = "mock://image/";

/// How the mock hands out generated images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockImageMode {
    /// Inline PNG bytes
    Inline,
    /// A `mock://` URL that `fetch_image` resolves
    Url,
    /// A URL that can never be fetched (cross-origin style restriction)
    UnreachableUrl,
}

/// A backend that generates placeholder assets locally
pub struct MockBackend {
    image_mode: MockImageMode,
    image_edge: Option<u32>,
    image_failure: Option<BackendFailure>,
    markup_failure: Option<BackendFailure>,
    delay: Duration,
    calls: AtomicUsize,
    cancelled: AtomicUsize,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            image_mode: MockImageMode::Url,
            image_edge: None,
            image_failure: None,
            markup_failure: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
        }
    }

    pub fn with_image_mode(mut self, mode: MockImageMode) -> Self {
        self.image_mode = mode;
        self
    }

    /// Render square images of this edge regardless of the requested size
    pub fn with_image_edge(mut self, edge: u32) -> Self {
        self.image_edge = Some(edge);
        self
    }

    pub fn failing_images(mut self, failure: BackendFailure) -> Self {
        self.image_failure = Some(failure);
        self
    }

    pub fn failing_markup(mut self, failure: BackendFailure) -> Self {
        self.markup_failure = Some(failure);
        self
    }

    /// Sleep this long inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of generation calls received (fetches excluded)
    pub fn generation_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls that stopped early because their token fired
    pub fn cancelled_calls(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn simulate_latency(&self, timeout: Duration, cancel: &CancellationToken) -> Result<(), BackendFailure> {
        if cancel.is_cancelled() {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
            return Err(BackendFailure::Cancelled);
        }
        if self.delay.is_zero() {
            return Ok(());
        }
        if cancel.wait_timeout(self.delay.min(timeout)) {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
            return Err(BackendFailure::Cancelled);
        }
        if self.delay > timeout {
            return Err(BackendFailure::Timeout);
        }
        Ok(())
    }
}

fn name_hash(text: &str) -> u32 {
    text.bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32))
}

/// Encode a solid-color PNG whose color is derived from `seed`
pub fn solid_png(seed: &str, width: u32, height: u32) -> Result<Vec<u8>, BackendFailure> {
    let hash_val = name_hash(seed);
    let color = image::Rgba([
        ((hash_val >> 16) & 0xFF) as u8,
        ((hash_val >> 8) & 0xFF) as u8,
        (hash_val & 0xFF) as u8,
        255,
    ]);

    let img = image::RgbaImage::from_pixel(width, height, color);
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|e| BackendFailure::Malformed(format!("failed to encode PNG: {}", e)))?;
    Ok(bytes)
}

impl GenerationBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn generate_image(
        &self,
        instruction: &str,
        params: &ImageParams,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<GeneratedImage, BackendFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency(timeout, cancel)?;
        if let Some(failure) = &self.image_failure {
            return Err(failure.clone());
        }

        let (width, height) = match self.image_edge {
            Some(edge) => (edge, edge),
            None => (params.width, params.height),
        };
        let tag = format!("{:08x}-{}x{}", name_hash(instruction), width, height);

        let source = match self.image_mode {
            MockImageMode::Inline => ImageSource::Bytes(solid_png(instruction, width, height)?),
            MockImageMode::Url => ImageSource::Url(format!("{}{}.png", MOCK_URL_SCHEME, tag)),
            MockImageMode::UnreachableUrl => {
                ImageSource::Url(format!("https://blocked.invalid/{}.png", tag))
            }
        };

        Ok(GeneratedImage {
            source,
            revised_prompt: Some(instruction.to_string()),
        })
    }

    fn generate_markup(
        &self,
        instruction: &str,
        params: &MarkupParams,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, BackendFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency(timeout, cancel)?;
        if let Some(failure) = &self.markup_failure {
            return Err(failure.clone());
        }

        let color = params
            .colors
            .first()
            .cloned()
            .unwrap_or_else(|| "#007AFF".to_string());
        let radius = 6.0 + (name_hash(instruction) % 400) as f64 / 100.0;

        // Deliberately untidy, like a chat model's answer
        Ok(format!(
            "```svg\n<svg width=\"24\"  height=\"24\">\n  <circle cx=\"12\" cy=\"12\" r=\"{:.4}\" fill=\"{}\"/>\n  <path d=\"M M 4 20 L L 20 20\" stroke=\"{}\"/>\n</svg>\n```",
            radius, color, color
        ))
    }

    fn fetch_image(
        &self,
        url: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, BackendFailure> {
        self.simulate_latency(timeout, cancel)?;
        let Some(tag) = url.strip_prefix(MOCK_URL_SCHEME) else {
            return Err(BackendFailure::Transport(format!(
                "cross-origin fetch blocked for {}",
                url
            )));
        };

        // Tag layout: <hash>-<w>x<h>.png
        let dims = tag
            .trim_end_matches(".png")
            .rsplit('-')
            .next()
            .and_then(|d| d.split_once('x'))
            .and_then(|(w, h)| Some((w.parse::<u32>().ok()?, h.parse::<u32>().ok()?)));
        let (width, height) =
            dims.ok_or_else(|| BackendFailure::Status { code: 404, message: None })?;
        solid_png(tag, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live() -> CancellationToken {
        CancellationToken::new()
    }

    #[test]
    fn test_inline_image_decodes() {
        let backend = MockBackend::new()
            .with_image_mode(MockImageMode::Inline)
            .with_image_edge(16);
        let image = backend
            .generate_image("blue cup", &ImageParams::default(), Duration::from_secs(1), &live())
            .unwrap();
        let ImageSource::Bytes(bytes) = image.source else {
            panic!("expected inline bytes");
        };
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 16));
        assert_eq!(backend.generation_calls(), 1);
    }

    #[test]
    fn test_url_roundtrip_through_fetch() {
        let backend = MockBackend::new().with_image_edge(8);
        let image = backend
            .generate_image("cup", &ImageParams::default(), Duration::from_secs(1), &live())
            .unwrap();
        let ImageSource::Url(url) = image.source else {
            panic!("expected url");
        };
        let bytes = backend.fetch_image(&url, Duration::from_secs(1), &live()).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 8);
        assert_eq!(backend.generation_calls(), 1);
    }

    #[test]
    fn test_unreachable_url_fails_fetch() {
        let backend = MockBackend::new().with_image_mode(MockImageMode::UnreachableUrl);
        let image = backend
            .generate_image("cup", &ImageParams::default(), Duration::from_secs(1), &live())
            .unwrap();
        let ImageSource::Url(url) = image.source else {
            panic!("expected url");
        };
        assert!(matches!(
            backend.fetch_image(&url, Duration::from_secs(1), &live()),
            Err(BackendFailure::Transport(_))
        ));
    }

    #[test]
    fn test_scripted_failure() {
        let backend = MockBackend::new().failing_markup(BackendFailure::Status {
            code: 401,
            message: None,
        });
        assert!(backend
            .generate_markup("x", &MarkupParams::default(), Duration::from_secs(1), &live())
            .is_err());
    }

    #[test]
    fn test_delay_beyond_timeout_reports_timeout() {
        let backend = MockBackend::new().with_delay(Duration::from_millis(50));
        let result = backend.generate_markup("x", &MarkupParams::default(), Duration::from_millis(5), &live());
        assert_eq!(result, Err(BackendFailure::Timeout));
        assert_eq!(backend.cancelled_calls(), 0);
    }

    #[test]
    fn test_token_stops_delayed_call() {
        let backend = MockBackend::new().with_delay(Duration::from_secs(5));
        let token = CancellationToken::new();
        let remote = token.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        let start = std::time::Instant::now();
        let result = backend.generate_markup("x", &MarkupParams::default(), Duration::from_secs(10), &token);
        canceller.join().unwrap();

        assert_eq!(result, Err(BackendFailure::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(backend.cancelled_calls(), 1);
    }
}
