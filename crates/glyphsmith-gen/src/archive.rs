//! Archive Assembler
//!
//! Lays a finished bundle out into a fixed folder tree, writes the manifest,
//! collects completeness warnings, and compresses everything into a zip whose
//! entry order, timestamps, and permissions do not vary between runs.

use crate::asset::{Asset, AssetKind, AssetPayload, Bundle, Mode, RasterCategory, VectorCategory};
use crate::raster::{RasterRole, SizeTable};
use crate::vector::is_well_formed;
use glyphsmith_core::{ContentHash, GlyphsmithError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

pub const MANIFEST_NAME: &str = "asset-manifest.json";
pub const MANIFEST_VERSION: &str = "1.0.0";
pub const COMPRESSION_LEVEL: i64 = 6;

/// Folder tree created in every archive, with the description written to the manifest
pub const SKELETON: [(&str, &str); 18] = [
    ("images/", "PNG image assets for iOS apps"),
    ("images/app-icons/", "App icons in all required iOS sizes"),
    ("images/app-icons/light-mode/", "App icons optimized for light mode"),
    ("images/app-icons/dark-mode/", "App icons optimized for dark mode"),
    ("images/launch-screens/", "Launch screen backgrounds"),
    ("images/tab-bar-icons/", "Tab bar icons (if generated)"),
    ("vectors/", "SVG vector graphics"),
    ("vectors/ui-icons/", "User interface icons"),
    ("vectors/illustrations/", "Decorative illustrations"),
    ("vectors/themed/", "Themed icon variations"),
    ("audio/", "Audio assets (if generated)"),
    ("audio/ui-sounds/", "User interface sound effects"),
    ("audio/game-sounds/", "Game-specific audio"),
    ("animations/", "Animation assets (if generated)"),
    ("animations/ui/", "UI animations"),
    ("animations/lottie/", "Lottie JSON animations"),
    ("documentation/", "Implementation guides and documentation"),
    ("documentation/usage-examples/", "Code samples for using the assets"),
];

/// Destination folder for an asset, without a trailing slash.
///
/// A pure function of kind, category, and mode. Combinations without a
/// dedicated folder land in `misc` under their top-level folder.
pub fn route(asset: &Asset) -> &'static str {
    match &asset.payload {
        AssetPayload::Raster(raster) => match (raster.category, raster.mode) {
            (RasterCategory::AppIcon, Some(Mode::Light)) => "images/app-icons/light-mode",
            (RasterCategory::AppIcon, Some(Mode::Dark)) => "images/app-icons/dark-mode",
            (RasterCategory::AppIcon, None) => "images/misc",
            (RasterCategory::LaunchScreen, _) => "images/launch-screens",
            (RasterCategory::TabBarIcon, _) => "images/tab-bar-icons",
        },
        AssetPayload::Vector(vector) => match vector.category {
            VectorCategory::App
            | VectorCategory::TabBar
            | VectorCategory::Navigation
            | VectorCategory::Ui => "vectors/ui-icons",
            VectorCategory::Themed => "vectors/themed",
            VectorCategory::Other(_) => "vectors/misc",
        },
        AssetPayload::Document(_) => {
            if asset.filename.contains("example") || asset.filename.contains("usage") {
                "documentation/usage-examples"
            } else {
                "documentation"
            }
        }
    }
}

/// Full path of an asset inside the archive
pub fn archive_path(asset: &Asset) -> String {
    format!("{}/{}", route(asset), asset.archive_name())
}

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    pub generated: String,
    pub prompt: String,
    pub types: Vec<AssetKind>,
    pub assets: BTreeMap<String, usize>,
    pub structure: BTreeMap<String, String>,
    pub usage: BTreeMap<String, String>,
}

impl Manifest {
    pub fn for_bundle(bundle: &Bundle) -> Self {
        let metadata = bundle.metadata();
        let assets = AssetKind::ALL
            .iter()
            .map(|kind| (kind.as_str().to_string(), bundle.count(*kind)))
            .collect();
        let structure = SKELETON
            .iter()
            .map(|(path, description)| (path.to_string(), description.to_string()))
            .collect();
        let usage = [
            ("xcode", "Drag and drop the images folder into your Xcode project"),
            ("swift", "Use the SVG files with SF Symbols or custom image views"),
            ("implementation", "See documentation/implementation-guide.md for details"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            name: "iOS Asset Bundle".to_string(),
            version: MANIFEST_VERSION.to_string(),
            generated: metadata.created_at_rfc3339(),
            prompt: metadata.prompt.clone(),
            types: metadata.kinds.clone(),
            assets,
            structure,
            usage,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| GlyphsmithError::Archive(format!("Failed to serialize manifest: {}", e)))
    }
}

/// A finished archive
#[derive(Debug, Clone)]
pub struct ArchiveOutput {
    pub bytes: Vec<u8>,
    pub manifest: Manifest,
    pub warnings: Vec<String>,
    /// Entry paths in archive order
    pub entries: Vec<String>,
    pub digest: ContentHash,
    pub filename: String,
}

impl ArchiveOutput {
    /// Write the archive to `path`, or into `path` under its default name when `path` is a directory
    pub fn write_to(&self, path: &Path) -> Result<std::path::PathBuf> {
        let target = if path.is_dir() {
            path.join(&self.filename)
        } else {
            path.to_path_buf()
        };
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&target, &self.bytes)?;
        info!(path = %target.display(), digest = %self.digest.short(), "archive written");
        Ok(target)
    }
}

/// Default archive name, `app-assets-YYYY-MM-DD.zip`
pub fn default_filename(bundle: &Bundle) -> String {
    format!(
        "app-assets-{}.zip",
        bundle.metadata().created_at.format("%Y-%m-%d")
    )
}

/// Packages bundles into archives
pub struct ArchiveAssembler {
    table: SizeTable,
}

impl Default for ArchiveAssembler {
    fn default() -> Self {
        Self::new(SizeTable::default())
    }
}

impl ArchiveAssembler {
    /// `table` is the size table the bundle's icon matrices were expanded with
    pub fn new(table: SizeTable) -> Self {
        Self { table }
    }

    /// Advisory completeness checks; never blocks packaging
    pub fn validate(&self, bundle: &Bundle) -> Vec<String> {
        let mut warnings = Vec::new();
        let requested = &bundle.metadata().kinds;

        if requested.contains(&AssetKind::RasterIcon) {
            let icons: Vec<_> = bundle
                .assets(AssetKind::RasterIcon)
                .iter()
                .filter_map(|a| a.as_raster())
                .filter(|r| r.category == RasterCategory::AppIcon)
                .collect();

            if icons.is_empty() {
                warnings.push("No app icons in bundle".to_string());
            } else {
                let expected = self.table.plan(RasterRole::AppIcon).len();
                for mode in [Mode::Light, Mode::Dark] {
                    let of_mode: Vec<_> = icons.iter().filter(|r| r.mode == Some(mode)).collect();
                    if of_mode.is_empty() {
                        warnings.push(format!("No {}-mode app icons", mode));
                        continue;
                    }
                    let cells = of_mode.iter().filter(|r| !r.is_reference()).count();
                    if cells > 0 && cells != expected {
                        warnings.push(format!(
                            "Incomplete {}-mode app icon matrix: {} of {} sizes",
                            mode, cells, expected
                        ));
                    }
                }
            }
        }

        let references = bundle
            .iter()
            .filter(|a| a.as_raster().is_some_and(|r| r.is_reference()))
            .count();
        if references > 0 {
            warnings.push(format!(
                "{} image(s) included as URL references only",
                references
            ));
        }

        let vectors = bundle.assets(AssetKind::VectorIcon);
        if requested.contains(&AssetKind::VectorIcon) && vectors.is_empty() {
            warnings.push("No vector icons in bundle".to_string());
        }
        for (index, asset) in vectors.iter().enumerate() {
            if let Some(vector) = asset.as_vector() {
                if !is_well_formed(&vector.markup) {
                    warnings.push(format!(
                        "Invalid vector markup at index {} ({})",
                        index, asset.filename
                    ));
                }
            }
        }

        warnings
    }

    /// Lay out, describe, validate, and compress `bundle`
    pub fn assemble(&self, bundle: &Bundle) -> Result<ArchiveOutput> {
        let manifest = Manifest::for_bundle(bundle);
        let warnings = self.validate(bundle);
        for warning in &warnings {
            warn!(%warning, "archive completeness");
        }

        let mut files: Vec<(String, Vec<u8>)> = bundle
            .iter()
            .map(|asset| (archive_path(asset), asset.contents()))
            .collect();
        files.push((MANIFEST_NAME.to_string(), manifest.to_json()?.into_bytes()));
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let bytes = write_zip(&files)?;
        let mut entries: Vec<String> = SKELETON.iter().map(|(p, _)| p.to_string()).collect();
        entries.extend(files.into_iter().map(|(path, _)| path));

        info!(entries = entries.len(), bytes = bytes.len(), "archive assembled");
        Ok(ArchiveOutput {
            digest: ContentHash::from_bytes(&bytes),
            filename: default_filename(bundle),
            bytes,
            manifest,
            warnings,
            entries,
        })
    }
}

fn write_zip(files: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let zip_err = |e: zip::result::ZipError| GlyphsmithError::Archive(e.to_string());
    let dir_options = SimpleFileOptions::default()
        .last_modified_time(DateTime::default())
        .unix_permissions(0o755);
    let file_options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL))
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (dir, _) in SKELETON.iter() {
        writer.add_directory(dir.to_string(), dir_options).map_err(zip_err)?;
    }
    for (path, contents) in files {
        writer.start_file(path.as_str(), file_options).map_err(zip_err)?;
        writer.write_all(contents)?;
    }
    let cursor = writer.finish().map_err(zip_err)?;
    Ok(cursor.into_inner())
}
