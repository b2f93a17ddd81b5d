//! Backend registry
//!
//! Maps backend names to concrete implementations.

pub mod mock;
pub mod openai;

use crate::backend::GenerationBackend;
use crate::config::GlyphsmithConfig;
use glyphsmith_core::{GlyphsmithError, Result};
use std::sync::Arc;

/// Create a backend by name with configuration
pub fn create_backend(name: &str, config: &GlyphsmithConfig) -> Result<Arc<dyn GenerationBackend>> {
    match name {
        "mock" => Ok(Arc::new(mock::MockBackend::new())),
        "openai" => Ok(Arc::new(openai::OpenAiBackend::from_config(config)?)),
        _ => Err(GlyphsmithError::Config(format!(
            "Unknown backend '{}'. Available: {}",
            name,
            available_backends().join(", ")
        ))),
    }
}

/// List all available backend names
pub fn available_backends() -> Vec<&'static str> {
    vec!["mock", "openai"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mock_backend() {
        let backend = create_backend("mock", &GlyphsmithConfig::default()).unwrap();
        assert_eq!(backend.name(), "mock");
    }

    #[test]
    fn test_unknown_backend() {
        let err = create_backend("dalle-9000", &GlyphsmithConfig::default()).err().unwrap();
        assert!(err.to_string().contains("mock, openai"));
    }
}
