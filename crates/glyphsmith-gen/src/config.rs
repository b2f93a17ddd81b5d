//! Layered configuration system
//!
//! Config is loaded with three layers of precedence (highest wins):
//! 1. Environment variables: `GLYPHSMITH_{PROVIDER}_API_KEY`
//! 2. Project-local: `.glyphsmith/config.toml`
//! 3. Global: `~/.glyphsmith/config.toml`
//!
//! The pipeline treats the resolved config as read-only input.

use crate::asset::AssetKind;
use glyphsmith_core::{GlyphsmithError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Provider names that accept an environment-variable key override
const ENV_PROVIDERS: [&str; 2] = ["openai", "elevenlabs"];

/// Provider-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: None,
            enabled: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Generation defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_asset_kinds")]
    pub default_asset_kinds: Vec<AssetKind>,
    #[serde(default = "default_image_quality")]
    pub image_quality: String,
    #[serde(default = "default_image_style")]
    pub image_style: String,
    /// Also expand a tab-bar icon matrix during the raster stage
    #[serde(default)]
    pub tab_bar_icons: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            default_asset_kinds: default_asset_kinds(),
            image_quality: default_image_quality(),
            image_style: default_image_style(),
            tab_bar_icons: false,
        }
    }
}

fn default_backend() -> String {
    "openai".to_string()
}
fn default_asset_kinds() -> Vec<AssetKind> {
    vec![
        AssetKind::RasterIcon,
        AssetKind::VectorIcon,
        AssetKind::Documentation,
    ]
}
fn default_image_quality() -> String {
    "hd".to_string()
}
fn default_image_style() -> String {
    "natural".to_string()
}

/// Outbound call limits enforced by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_per_minute")]
    pub max_requests_per_minute: usize,
    #[serde(default = "default_per_day")]
    pub max_requests_per_day: usize,
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_requests_per_minute: default_per_minute(),
            max_requests_per_day: default_per_day(),
            request_timeout_ms: default_timeout_ms(),
        }
    }
}

impl LimitsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_per_minute() -> usize {
    50
}
fn default_per_day() -> usize {
    1000
}
fn default_timeout_ms() -> u64 {
    60_000
}

/// Vector post-processing switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SvgOptions {
    #[serde(default = "default_true")]
    pub optimize: bool,
    #[serde(default = "default_true")]
    pub minify: bool,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self {
            optimize: true,
            minify: true,
        }
    }
}

/// Top-level config file structure. Every section is optional so that
/// overlay files only need to carry what they change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlyphsmithConfigFile {
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub generation: Option<GenerationConfig>,
    #[serde(default)]
    pub limits: Option<LimitsConfig>,
    #[serde(default)]
    pub svg: Option<SvgOptions>,
}

/// Resolved configuration with environment variable overrides applied
#[derive(Debug, Clone, Default)]
pub struct GlyphsmithConfig {
    pub providers: HashMap<String, ProviderConfig>,
    pub generation: GenerationConfig,
    pub limits: LimitsConfig,
    pub svg: SvgOptions,
}

impl GlyphsmithConfig {
    /// Load config with layered precedence: global < project < env vars
    pub fn load() -> Result<Self> {
        let mut config = GlyphsmithConfig::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                config.merge(global);
            }
        }

        let local_path = PathBuf::from(".glyphsmith/config.toml");
        if local_path.exists() {
            let local = Self::load_file(&local_path)?;
            config.merge(local);
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load config from a specific file path only (for testing)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut config = GlyphsmithConfig::default();
        config.merge(Self::load_file(path)?);
        config.apply_env_overrides();
        Ok(config)
    }

    /// Get API key for a provider
    pub fn api_key(&self, provider_name: &str) -> Option<&str> {
        self.providers
            .get(provider_name)
            .filter(|p| p.enabled)
            .and_then(|p| p.api_key.as_deref())
            .filter(|k| !k.is_empty())
    }

    /// Get API URL for a provider (or `None` to use its default)
    pub fn api_url(&self, provider_name: &str) -> Option<&str> {
        self.providers
            .get(provider_name)
            .and_then(|p| p.api_url.as_deref())
    }

    /// Whether an audio credential was supplied; gates the audio stage
    pub fn has_audio_credential(&self) -> bool {
        self.api_key("elevenlabs").is_some()
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".glyphsmith").join("config.toml"))
    }

    fn load_file(path: &Path) -> Result<GlyphsmithConfigFile> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            GlyphsmithError::Config(format!("Failed to parse config {}: {}", path.display(), e))
        })
    }

    fn merge(&mut self, overlay: GlyphsmithConfigFile) {
        for (name, provider) in overlay.providers {
            let entry = self.providers.entry(name).or_default();
            if provider.api_key.is_some() {
                entry.api_key = provider.api_key;
            }
            if provider.api_url.is_some() {
                entry.api_url = provider.api_url;
            }
            entry.enabled = provider.enabled;
        }

        if let Some(generation) = overlay.generation {
            self.generation = generation;
        }
        if let Some(limits) = overlay.limits {
            self.limits = limits;
        }
        if let Some(svg) = overlay.svg {
            self.svg = svg;
        }
    }

    fn apply_env_overrides(&mut self) {
        for name in &ENV_PROVIDERS {
            let env_key = format!("GLYPHSMITH_{}_API_KEY", name.to_uppercase());
            if let Ok(key) = std::env::var(&env_key) {
                let entry = self.providers.entry(name.to_string()).or_default();
                entry.api_key = Some(key);
            }
        }
    }

    /// Validate the limits before the gateway is built
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_requests_per_minute == 0 {
            return Err(GlyphsmithError::Config(
                "limits.max_requests_per_minute must be at least 1".to_string(),
            ));
        }
        if self.limits.max_requests_per_day < self.limits.max_requests_per_minute {
            return Err(GlyphsmithError::Config(
                "limits.max_requests_per_day must not be below max_requests_per_minute".to_string(),
            ));
        }
        if self.limits.request_timeout_ms == 0 {
            return Err(GlyphsmithError::Config(
                "limits.request_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_config(content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("glyphsmith_config_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_config_from_file() {
        let config_str = r#"
[providers.openai]
api_key = "sk-test-key-123456789"
api_url = "https://api.example.com/v1"

[generation]
backend = "mock"
default_asset_kinds = ["vector-icon", "documentation"]
tab_bar_icons = true

[limits]
max_requests_per_minute = 5
max_requests_per_day = 100
request_timeout_ms = 1500
"#;
        let path = temp_config(config_str);
        let config = GlyphsmithConfig::load_from_file(&path).unwrap();

        assert_eq!(config.api_url("openai"), Some("https://api.example.com/v1"));
        assert_eq!(config.generation.backend, "mock");
        assert_eq!(
            config.generation.default_asset_kinds,
            vec![AssetKind::VectorIcon, AssetKind::Documentation]
        );
        assert!(config.generation.tab_bar_icons);
        assert_eq!(config.limits.max_requests_per_minute, 5);
        assert_eq!(config.limits.request_timeout(), Duration::from_millis(1500));
        assert!(config.svg.optimize);
        config.validate().unwrap();

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_env_var_override() {
        let config_str = r#"
[providers.elevenlabs]
api_key = "file-key"
"#;
        let path = temp_config(config_str);

        std::env::set_var("GLYPHSMITH_ELEVENLABS_API_KEY", "env-key-override");
        let config = GlyphsmithConfig::load_from_file(&path).unwrap();
        assert_eq!(config.api_key("elevenlabs"), Some("env-key-override"));
        assert!(config.has_audio_credential());

        std::env::remove_var("GLYPHSMITH_ELEVENLABS_API_KEY");
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_defaults() {
        let config = GlyphsmithConfig::default();
        assert_eq!(config.limits.max_requests_per_minute, 50);
        assert_eq!(config.limits.max_requests_per_day, 1000);
        assert_eq!(config.limits.request_timeout_ms, 60_000);
        assert_eq!(config.generation.image_quality, "hd");
        assert_eq!(config.api_key("nonexistent"), None);
        config.validate().unwrap();
    }

    #[test]
    fn test_disabled_provider_hides_key() {
        let mut config = GlyphsmithConfig::default();
        config.providers.insert(
            "elevenlabs".to_string(),
            ProviderConfig {
                api_key: Some("k".to_string()),
                api_url: None,
                enabled: false,
            },
        );
        assert!(!config.has_audio_credential());
    }

    #[test]
    fn test_invalid_limits_rejected() {
        let mut config = GlyphsmithConfig::default();
        config.limits.max_requests_per_minute = 0;
        assert!(config.validate().is_err());
    }
}
