//! Vector Asset Synthesizer
//!
//! Simple glyph roles are filled from fixed templates without any external
//! call; complex roles and the themed set go through the gateway. Both origins
//! pass through the same normalization step.

pub mod markup;
pub mod templates;

use crate::asset::{Asset, AssetPayload, Mode, VectorAsset, VectorCategory, VectorOrigin};
use crate::backend::MarkupParams;
use crate::gateway::Gateway;
use glyphsmith_core::{CancellationToken, GlyphsmithError, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

pub use markup::{is_well_formed, normalize, optimize, strip_code_fences};

/// Named colors recognized in prompts, in match order
const COLOR_LEXICON: [(&str, &str); 10] = [
    ("blue", "#007AFF"),
    ("red", "#FF3B30"),
    ("green", "#34C759"),
    ("orange", "#FF9500"),
    ("purple", "#5856D6"),
    ("pink", "#FF2D92"),
    ("yellow", "#FFCC00"),
    ("gray", "#8E8E93"),
    ("black", "#000000"),
    ("white", "#FFFFFF"),
];

const DEFAULT_COLORS: [&str; 2] = ["#007AFF", "#5856D6"];

const THEMED_ICONS: [&str; 4] = ["star", "heart", "bookmark", "share"];

/// Lexicon colors mentioned in the prompt, or the two default brand colors
pub fn extract_colors(prompt: &str) -> Vec<String> {
    let lower = prompt.to_lowercase();
    let found: Vec<String> = COLOR_LEXICON
        .iter()
        .filter(|(name, _)| lower.contains(name))
        .map(|(_, hex)| hex.to_string())
        .collect();

    if found.is_empty() {
        DEFAULT_COLORS.iter().map(|c| c.to_string()).collect()
    } else {
        found
    }
}

/// Closed set of icon roles, in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IconRole {
    AppIcon,
    TabBarHome,
    TabBarSearch,
    TabBarProfile,
    TabBarSettings,
    NavigationBack,
    NavigationForward,
    UiClose,
    UiMenu,
    UiPlus,
}

impl IconRole {
    pub const ALL: [IconRole; 10] = [
        IconRole::AppIcon,
        IconRole::TabBarHome,
        IconRole::TabBarSearch,
        IconRole::TabBarProfile,
        IconRole::TabBarSettings,
        IconRole::NavigationBack,
        IconRole::NavigationForward,
        IconRole::UiClose,
        IconRole::UiMenu,
        IconRole::UiPlus,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IconRole::AppIcon => "app-icon",
            IconRole::TabBarHome => "tab-bar-home",
            IconRole::TabBarSearch => "tab-bar-search",
            IconRole::TabBarProfile => "tab-bar-profile",
            IconRole::TabBarSettings => "tab-bar-settings",
            IconRole::NavigationBack => "navigation-back",
            IconRole::NavigationForward => "navigation-forward",
            IconRole::UiClose => "ui-close",
            IconRole::UiMenu => "ui-menu",
            IconRole::UiPlus => "ui-plus",
        }
    }

    /// Human description used in generation instructions
    pub fn description(self) -> &'static str {
        match self {
            IconRole::AppIcon => "main app icon",
            IconRole::TabBarHome => "home tab bar icon",
            IconRole::TabBarSearch => "search tab bar icon",
            IconRole::TabBarProfile => "profile tab bar icon",
            IconRole::TabBarSettings => "settings tab bar icon",
            IconRole::NavigationBack => "back navigation arrow",
            IconRole::NavigationForward => "forward navigation arrow",
            IconRole::UiClose => "close button icon",
            IconRole::UiMenu => "hamburger menu icon",
            IconRole::UiPlus => "add/plus button icon",
        }
    }

    /// Complex roles need the backend; simple ones have a template
    pub fn is_complex(self) -> bool {
        matches!(self, IconRole::AppIcon)
    }

    pub fn category(self) -> VectorCategory {
        match self {
            IconRole::AppIcon => VectorCategory::App,
            IconRole::TabBarHome
            | IconRole::TabBarSearch
            | IconRole::TabBarProfile
            | IconRole::TabBarSettings => VectorCategory::TabBar,
            IconRole::NavigationBack | IconRole::NavigationForward => VectorCategory::Navigation,
            IconRole::UiClose | IconRole::UiMenu | IconRole::UiPlus => VectorCategory::Ui,
        }
    }

    pub fn filename(self) -> String {
        format!("{}.svg", self.as_str())
    }
}

impl fmt::Display for IconRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IconRole {
    type Err = GlyphsmithError;

    fn from_str(s: &str) -> Result<Self> {
        IconRole::ALL
            .into_iter()
            .find(|role| role.as_str() == s.trim())
            .ok_or_else(|| GlyphsmithError::UnsupportedRole(s.to_string()))
    }
}

/// Which synthesis path a caller wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OriginPreference {
    /// Templates for simple roles, the backend for complex ones
    #[default]
    Auto,
    Generated,
    Templated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IconSpec {
    pub role: IconRole,
    pub origin: OriginPreference,
}

impl IconSpec {
    pub fn new(role: IconRole) -> Self {
        Self {
            role,
            origin: OriginPreference::Auto,
        }
    }

    pub fn with_origin(mut self, origin: OriginPreference) -> Self {
        self.origin = origin;
        self
    }
}

/// Build a templated icon without any backend
pub fn templated(prompt: &str, role: IconRole) -> Result<Asset> {
    let colors = extract_colors(prompt);
    let color = colors.first().map(String::as_str).unwrap_or(DEFAULT_COLORS[0]);
    let raw = templates::render(role, color).ok_or_else(|| {
        GlyphsmithError::UnsupportedRole(format!("{} has no template", role))
    })?;

    Ok(Asset::new(
        role.filename(),
        prompt,
        AssetPayload::Vector(VectorAsset {
            markup: normalize(&raw)?,
            category: role.category(),
            origin: VectorOrigin::Templated,
        }),
    ))
}

/// Instruction text sent to the backend for markup generation
pub fn markup_instruction(subject: &str, params: &MarkupParams) -> String {
    let colors = if params.colors.is_empty() {
        "Use appropriate colors".to_string()
    } else {
        format!("Colors: {}", params.colors.join(", "))
    };
    let size = match &params.size {
        Some(size) => format!("Target size: {}", size),
        None => "Scalable design".to_string(),
    };

    format!(
        "Generate clean, scalable SVG code for: {}\n\n\
         Requirements:\n\
         - Valid SVG markup only\n\
         - iOS-compliant design\n\
         - Proper viewBox and dimensions\n\
         - Optimized paths and shapes\n\
         - {}\n\
         - {}\n\
         - No text elements unless specifically requested\n\
         - Clean, minimal design suitable for app icons\n\n\
         Return only the SVG code, no explanations or markdown formatting.",
        subject, colors, size
    )
}

/// One item that could not be produced; the rest of the batch is unaffected
#[derive(Debug)]
pub struct VectorFailure {
    pub filename: String,
    pub error: GlyphsmithError,
}

/// Result of a full vector run
#[derive(Debug, Default)]
pub struct VectorBatch {
    pub assets: Vec<Asset>,
    pub failures: Vec<VectorFailure>,
}

impl VectorBatch {
    fn absorb(&mut self, filename: String, result: Result<Asset>) {
        match result {
            Ok(asset) => self.assets.push(asset),
            Err(error) => {
                warn!(%filename, %error, "vector item failed");
                self.failures.push(VectorFailure { filename, error });
            }
        }
    }
}

pub struct VectorSynthesizer {
    gateway: Arc<Gateway>,
}

impl VectorSynthesizer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// Produce one icon for `spec`
    pub fn synthesize(&self, prompt: &str, spec: IconSpec, cancel: &CancellationToken) -> Result<Asset> {
        let use_template = match spec.origin {
            OriginPreference::Auto => !spec.role.is_complex(),
            OriginPreference::Templated => true,
            OriginPreference::Generated => false,
        };

        if use_template {
            debug!(role = %spec.role, "templated icon");
            return templated(prompt, spec.role);
        }

        let subject = format!("{}, {}, SVG icon style", prompt, spec.role.description());
        let params = MarkupParams {
            colors: extract_colors(prompt),
            size: Some("24x24".to_string()),
        };
        let markup = self.generate(&subject, &params, cancel)?;

        Ok(Asset::new(
            spec.role.filename(),
            subject,
            AssetPayload::Vector(VectorAsset {
                markup,
                category: spec.role.category(),
                origin: VectorOrigin::Generated,
            }),
        ))
    }

    /// One themed icon in the given appearance
    pub fn themed(&self, prompt: &str, icon: &str, mode: Mode, cancel: &CancellationToken) -> Result<Asset> {
        let subject = format!("{}, {} icon, {} theme, minimal design", prompt, icon, mode);
        let colors = match mode {
            Mode::Dark => ["#FFFFFF", "#F2F2F7"],
            Mode::Light => ["#000000", "#1C1C1E"],
        };
        let params = MarkupParams {
            colors: colors.iter().map(|c| c.to_string()).collect(),
            size: None,
        };
        let markup = self.generate(&subject, &params, cancel)?;

        Ok(Asset::new(
            format!("{}-{}.svg", icon, mode),
            subject,
            AssetPayload::Vector(VectorAsset {
                markup,
                category: VectorCategory::Themed,
                origin: VectorOrigin::Generated,
            }),
        ))
    }

    fn generate(&self, subject: &str, params: &MarkupParams, cancel: &CancellationToken) -> Result<String> {
        let instruction = markup_instruction(subject, params);
        let raw = self.gateway.generate_markup(&instruction, params, cancel)?;
        normalize(strip_code_fences(&raw))
    }

    /// Every role, then the themed set. Items run in parallel; output keeps
    /// role declaration order followed by themed order (light before dark).
    pub fn generate_all(&self, prompt: &str, cancel: &CancellationToken) -> VectorBatch {
        let role_results: Vec<Result<Asset>> = std::thread::scope(|scope| {
            let handles: Vec<_> = IconRole::ALL
                .iter()
                .map(|&role| scope.spawn(move || self.synthesize(prompt, IconSpec::new(role), cancel)))
                .collect();
            handles.into_iter().map(join_item).collect()
        });

        let themed_items: Vec<(&str, Mode)> = [Mode::Light, Mode::Dark]
            .into_iter()
            .flat_map(|mode| THEMED_ICONS.iter().map(move |&icon| (icon, mode)))
            .collect();
        let themed_results: Vec<Result<Asset>> = std::thread::scope(|scope| {
            let handles: Vec<_> = themed_items
                .iter()
                .map(|&(icon, mode)| scope.spawn(move || self.themed(prompt, icon, mode, cancel)))
                .collect();
            handles.into_iter().map(join_item).collect()
        });

        let mut batch = VectorBatch::default();
        for (role, result) in IconRole::ALL.iter().zip(role_results) {
            batch.absorb(role.filename(), result);
        }
        for ((icon, mode), result) in themed_items.iter().zip(themed_results) {
            batch.absorb(format!("{}-{}.svg", icon, mode), result);
        }
        batch
    }
}

fn join_item(handle: std::thread::ScopedJoinHandle<'_, Result<Asset>>) -> Result<Asset> {
    handle
        .join()
        .unwrap_or_else(|_| Err(GlyphsmithError::Generation("vector worker panicked".to_string())))
}

/// Combine vector assets into a `<symbol>` sprite sheet
pub fn sprite(assets: &[Asset]) -> String {
    let symbols: Vec<String> = assets
        .iter()
        .filter_map(|asset| asset.as_vector().map(|v| (asset, v)))
        .map(|(asset, vector)| {
            let id = asset.filename.trim_end_matches(".svg");
            let (view_box, body) = split_root(&vector.markup);
            format!("<symbol id=\"{}\" viewBox=\"{}\">{}</symbol>", id, view_box, body)
        })
        .collect();

    format!(
        "<svg xmlns=\"{}\" style=\"display: none;\">\n{}\n</svg>",
        markup::SVG_NAMESPACE,
        symbols.join("\n")
    )
}

/// The root's viewBox value and the markup between the root tags
fn split_root(markup: &str) -> (String, &str) {
    let Some((start, end)) = markup::root_tag_bounds(markup) else {
        return (markup::DEFAULT_VIEW_BOX.to_string(), markup);
    };
    let root = &markup[start..end];
    let view_box = root
        .split_once("viewBox=\"")
        .and_then(|(_, rest)| rest.split_once('"'))
        .map(|(value, _)| value.to_string())
        .unwrap_or_else(|| markup::DEFAULT_VIEW_BOX.to_string());

    // A self-closing root has no body
    if root.trim_end().ends_with('/') {
        return (view_box, "");
    }
    let inner_start = end + 1;
    let inner_end = markup.rfind("</svg>").filter(|&i| i >= inner_start).unwrap_or(inner_start);
    (view_box, markup[inner_start..inner_end].trim())
}
