//! Asset data model: requests, assets, and the finished bundle

use chrono::{DateTime, SecondsFormat, Utc};
use glyphsmith_core::{GlyphsmithError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// The kind of asset a request can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetKind {
    RasterIcon,
    VectorIcon,
    LaunchScreen,
    Audio,
    Animation,
    Documentation,
}

impl AssetKind {
    pub const ALL: [AssetKind; 6] = [
        AssetKind::RasterIcon,
        AssetKind::VectorIcon,
        AssetKind::LaunchScreen,
        AssetKind::Audio,
        AssetKind::Animation,
        AssetKind::Documentation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::RasterIcon => "raster-icon",
            AssetKind::VectorIcon => "vector-icon",
            AssetKind::LaunchScreen => "launch-screen",
            AssetKind::Audio => "audio",
            AssetKind::Animation => "animation",
            AssetKind::Documentation => "documentation",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetKind {
    type Err = GlyphsmithError;

    /// Accepts the kebab-case names and the older UI names (`images`, `svgs`, ...)
    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "raster-icon" | "images" => Ok(AssetKind::RasterIcon),
            "vector-icon" | "svgs" => Ok(AssetKind::VectorIcon),
            "launch-screen" | "launchScreens" => Ok(AssetKind::LaunchScreen),
            "audio" => Ok(AssetKind::Audio),
            "animation" | "animations" => Ok(AssetKind::Animation),
            "documentation" => Ok(AssetKind::Documentation),
            other => Err(GlyphsmithError::Validation(format!(
                "Unknown asset kind '{}'. Available: raster-icon, vector-icon, launch-screen, audio, animation, documentation",
                other
            ))),
        }
    }
}

/// A validated generation request. Immutable once built.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    prompt: String,
    kinds: Vec<AssetKind>,
}

impl GenerationRequest {
    /// Validate and build a request. Duplicate kinds are dropped, first occurrence wins.
    pub fn new(prompt: impl Into<String>, kinds: impl IntoIterator<Item = AssetKind>) -> Result<Self> {
        let prompt: String = prompt.into();
        let prompt = prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(GlyphsmithError::Validation(
                "Prompt must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let kinds: Vec<AssetKind> = kinds.into_iter().filter(|k| seen.insert(*k)).collect();
        if kinds.is_empty() {
            return Err(GlyphsmithError::Validation(
                "Select at least one asset kind".to_string(),
            ));
        }

        Ok(Self { prompt, kinds })
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Requested kinds in the caller's order
    pub fn kinds(&self) -> &[AssetKind] {
        &self.kinds
    }
}

/// Light/dark appearance variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Light,
    Dark,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Light => "light",
            Mode::Dark => "dark",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output-pixel-per-logical-pixel multiplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Density {
    X1,
    X2,
    X3,
}

impl Density {
    pub const ALL: [Density; 3] = [Density::X1, Density::X2, Density::X3];

    pub fn factor(self) -> u32 {
        match self {
            Density::X1 => 1,
            Density::X2 => 2,
            Density::X3 => 3,
        }
    }

    /// Filename suffix: empty for 1x, `@2x` / `@3x` otherwise
    pub fn suffix(self) -> &'static str {
        match self {
            Density::X1 => "",
            Density::X2 => "@2x",
            Density::X3 => "@3x",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RasterCategory {
    AppIcon,
    TabBarIcon,
    LaunchScreen,
}

/// Raster payload: real PNG bytes, or a tagged reference to an image that could not be fetched
#[derive(Clone, PartialEq, Eq)]
pub enum RasterPayload {
    Png(Vec<u8>),
    Reference { url: String, note: String },
}

impl fmt::Debug for RasterPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RasterPayload::Png(bytes) => write!(f, "Png({} bytes)", bytes.len()),
            RasterPayload::Reference { url, .. } => write!(f, "Reference({})", url),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterAsset {
    pub payload: RasterPayload,
    pub width_px: u32,
    pub height_px: u32,
    pub density: Density,
    pub mode: Option<Mode>,
    pub category: RasterCategory,
}

impl RasterAsset {
    pub fn is_reference(&self) -> bool {
        matches!(self.payload, RasterPayload::Reference { .. })
    }
}

/// Grouping used to route vector assets
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VectorCategory {
    App,
    TabBar,
    Navigation,
    Ui,
    Themed,
    Other(String),
}

impl VectorCategory {
    pub fn as_str(&self) -> &str {
        match self {
            VectorCategory::App => "app",
            VectorCategory::TabBar => "tab-bar",
            VectorCategory::Navigation => "navigation",
            VectorCategory::Ui => "ui",
            VectorCategory::Themed => "themed",
            VectorCategory::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorOrigin {
    Generated,
    Templated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorAsset {
    pub markup: String,
    pub category: VectorCategory,
    pub origin: VectorOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Markdown,
    Json,
    Svg,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentAsset {
    pub content: String,
    pub format: DocumentFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetPayload {
    Raster(RasterAsset),
    Vector(VectorAsset),
    Document(DocumentAsset),
}

/// One generated file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub filename: String,
    pub source_prompt: String,
    pub payload: AssetPayload,
}

impl Asset {
    pub fn new(filename: impl Into<String>, source_prompt: impl Into<String>, payload: AssetPayload) -> Self {
        Self {
            filename: filename.into(),
            source_prompt: source_prompt.into(),
            payload,
        }
    }

    /// Kind derived from the payload; launch-screen rasters are their own kind
    pub fn kind(&self) -> AssetKind {
        match &self.payload {
            AssetPayload::Raster(r) if r.category == RasterCategory::LaunchScreen => {
                AssetKind::LaunchScreen
            }
            AssetPayload::Raster(_) => AssetKind::RasterIcon,
            AssetPayload::Vector(_) => AssetKind::VectorIcon,
            AssetPayload::Document(_) => AssetKind::Documentation,
        }
    }

    pub fn as_raster(&self) -> Option<&RasterAsset> {
        match &self.payload {
            AssetPayload::Raster(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&VectorAsset> {
        match &self.payload {
            AssetPayload::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// Bytes as written into the archive
    pub fn contents(&self) -> Vec<u8> {
        match &self.payload {
            AssetPayload::Raster(r) => match &r.payload {
                RasterPayload::Png(bytes) => bytes.clone(),
                RasterPayload::Reference { url, note } => {
                    format!("[InternetShortcut]\nURL={}\n; {}\n", url, note).into_bytes()
                }
            },
            AssetPayload::Vector(v) => v.markup.as_bytes().to_vec(),
            AssetPayload::Document(d) => d.content.as_bytes().to_vec(),
        }
    }

    /// Name inside the archive; URL references get a `.url` shortcut suffix
    pub fn archive_name(&self) -> String {
        match &self.payload {
            AssetPayload::Raster(r) if r.is_reference() => format!("{}.url", self.filename),
            _ => self.filename.clone(),
        }
    }
}

/// Request metadata carried by the bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleMetadata {
    pub id: String,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
    pub kinds: Vec<AssetKind>,
}

impl BundleMetadata {
    pub fn created_at_rfc3339(&self) -> String {
        self.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// The finished, read-only result of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    metadata: BundleMetadata,
    assets: BTreeMap<AssetKind, Vec<Asset>>,
}

impl Bundle {
    pub fn metadata(&self) -> &BundleMetadata {
        &self.metadata
    }

    /// Assets of one kind in emission order (empty slice if none)
    pub fn assets(&self, kind: AssetKind) -> &[Asset] {
        self.assets.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, kind: AssetKind) -> usize {
        self.assets(kind).len()
    }

    pub fn total(&self) -> usize {
        self.assets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Every asset, kinds in enum order
    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.assets.values().flatten()
    }
}

/// Accumulates assets while the orchestrator runs
#[derive(Debug)]
pub struct BundleBuilder {
    metadata: BundleMetadata,
    assets: BTreeMap<AssetKind, Vec<Asset>>,
    filenames: HashSet<String>,
}

impl BundleBuilder {
    pub fn new(request: &GenerationRequest) -> Self {
        Self::with_metadata(BundleMetadata {
            id: uuid::Uuid::new_v4().to_string(),
            prompt: request.prompt().to_string(),
            created_at: Utc::now(),
            kinds: request.kinds().to_vec(),
        })
    }

    pub fn with_metadata(metadata: BundleMetadata) -> Self {
        Self {
            metadata,
            assets: BTreeMap::new(),
            filenames: HashSet::new(),
        }
    }

    pub fn metadata(&self) -> &BundleMetadata {
        &self.metadata
    }

    /// Append a batch atomically; any filename collision rejects the whole batch
    pub fn append(&mut self, batch: Vec<Asset>) -> Result<()> {
        let mut incoming = HashSet::new();
        for asset in &batch {
            if self.filenames.contains(&asset.filename) || !incoming.insert(asset.filename.as_str()) {
                return Err(GlyphsmithError::Generation(format!(
                    "Duplicate filename in bundle: {}",
                    asset.filename
                )));
            }
        }

        for asset in batch {
            self.filenames.insert(asset.filename.clone());
            self.assets.entry(asset.kind()).or_default().push(asset);
        }
        Ok(())
    }

    pub fn assets(&self, kind: AssetKind) -> &[Asset] {
        self.assets.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn assets_mut(&mut self, kind: AssetKind) -> Option<&mut Vec<Asset>> {
        self.assets.get_mut(&kind)
    }

    pub fn finish(self) -> Bundle {
        Bundle {
            metadata: self.metadata,
            assets: self.assets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str) -> Asset {
        Asset::new(
            name,
            "prompt",
            AssetPayload::Document(DocumentAsset {
                content: "# hi".to_string(),
                format: DocumentFormat::Markdown,
            }),
        )
    }

    #[test]
    fn test_request_rejects_empty_prompt() {
        let err = GenerationRequest::new("   ", [AssetKind::VectorIcon]).unwrap_err();
        assert!(matches!(err, GlyphsmithError::Validation(_)));
    }

    #[test]
    fn test_request_rejects_no_kinds() {
        let err = GenerationRequest::new("cup", Vec::<AssetKind>::new()).unwrap_err();
        assert!(matches!(err, GlyphsmithError::Validation(_)));
    }

    #[test]
    fn test_request_dedups_preserving_order() {
        let req = GenerationRequest::new(
            " a cup ",
            [AssetKind::Documentation, AssetKind::VectorIcon, AssetKind::Documentation],
        )
        .unwrap();
        assert_eq!(req.prompt(), "a cup");
        assert_eq!(req.kinds(), &[AssetKind::Documentation, AssetKind::VectorIcon]);
    }

    #[test]
    fn test_kind_parsing_accepts_aliases() {
        assert_eq!("svgs".parse::<AssetKind>().unwrap(), AssetKind::VectorIcon);
        assert_eq!("launchScreens".parse::<AssetKind>().unwrap(), AssetKind::LaunchScreen);
        assert_eq!("raster-icon".parse::<AssetKind>().unwrap(), AssetKind::RasterIcon);
        assert!("sprites".parse::<AssetKind>().is_err());
    }

    #[test]
    fn test_launch_screen_kind_derived_from_category() {
        let asset = Asset::new(
            "LaunchScreen-iPad.png",
            "p",
            AssetPayload::Raster(RasterAsset {
                payload: RasterPayload::Png(vec![1]),
                width_px: 1024,
                height_px: 1024,
                density: Density::X1,
                mode: None,
                category: RasterCategory::LaunchScreen,
            }),
        );
        assert_eq!(asset.kind(), AssetKind::LaunchScreen);
    }

    #[test]
    fn test_builder_rejects_duplicate_filenames_atomically() {
        let req = GenerationRequest::new("cup", [AssetKind::Documentation]).unwrap();
        let mut builder = BundleBuilder::new(&req);
        builder.append(vec![doc("README.md")]).unwrap();

        let err = builder.append(vec![doc("guide.md"), doc("README.md")]);
        assert!(err.is_err());
        assert_eq!(builder.assets(AssetKind::Documentation).len(), 1);

        assert!(builder.append(vec![doc("a.md"), doc("a.md")]).is_err());

        let bundle = builder.finish();
        assert_eq!(bundle.count(AssetKind::Documentation), 1);
        assert_eq!(bundle.count(AssetKind::Audio), 0);
    }

    #[test]
    fn test_reference_archive_name() {
        let asset = Asset::new(
            "app-icon-light-mode.png",
            "p",
            AssetPayload::Raster(RasterAsset {
                payload: RasterPayload::Reference {
                    url: "https://cdn.example.com/a.png".to_string(),
                    note: "see url".to_string(),
                },
                width_px: 1024,
                height_px: 1024,
                density: Density::X1,
                mode: Some(Mode::Light),
                category: RasterCategory::AppIcon,
            }),
        );
        assert_eq!(asset.archive_name(), "app-icon-light-mode.png.url");
        let text = String::from_utf8(asset.contents()).unwrap();
        assert!(text.contains("URL=https://cdn.example.com/a.png"));
    }
}
