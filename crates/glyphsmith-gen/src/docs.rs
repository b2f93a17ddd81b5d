//! Documentation generator
//!
//! Describes the assets collected so far: a README, a hashed inventory,
//! integration notes, and catalog files for the app icon set.

use crate::asset::{
    Asset, AssetKind, AssetPayload, BundleMetadata, DocumentAsset, DocumentFormat, Mode,
    RasterCategory, RasterPayload,
};
use crate::vector::sprite;
use glyphsmith_core::{ContentHash, GlyphsmithError, Result};
use std::fmt::Write as _;

pub const README: &str = "README.md";
pub const INVENTORY: &str = "asset-inventory.json";
pub const IMPLEMENTATION_GUIDE: &str = "implementation-guide.md";
pub const USAGE_EXAMPLES: &str = "usage-examples.md";
pub const APP_ICON_CONTENTS: &str = "AppIcon-Contents.json";
pub const SPRITE_SHEET: &str = "icons-sprite.svg";

fn document(filename: &str, prompt: &str, content: String, format: DocumentFormat) -> Asset {
    Asset::new(
        filename,
        prompt,
        AssetPayload::Document(DocumentAsset { content, format }),
    )
}

/// Build the documentation set for `assets`
pub fn generate(metadata: &BundleMetadata, assets: &[&Asset]) -> Result<Vec<Asset>> {
    let prompt = metadata.prompt.as_str();
    let mut docs = vec![
        document(README, prompt, readme(metadata, assets), DocumentFormat::Markdown),
        document(INVENTORY, prompt, inventory(metadata, assets)?, DocumentFormat::Json),
        document(
            IMPLEMENTATION_GUIDE,
            prompt,
            implementation_guide(assets),
            DocumentFormat::Markdown,
        ),
        document(USAGE_EXAMPLES, prompt, usage_examples(assets), DocumentFormat::Markdown),
    ];

    if let Some(contents) = app_icon_contents(assets)? {
        docs.push(document(APP_ICON_CONTENTS, prompt, contents, DocumentFormat::Json));
    }

    let vectors: Vec<Asset> = assets
        .iter()
        .filter(|a| a.as_vector().is_some())
        .map(|a| (*a).clone())
        .collect();
    if !vectors.is_empty() {
        docs.push(document(SPRITE_SHEET, prompt, sprite(&vectors), DocumentFormat::Svg));
    }

    Ok(docs)
}

fn count(assets: &[&Asset], kind: AssetKind) -> usize {
    assets.iter().filter(|a| a.kind() == kind).count()
}

fn readme(metadata: &BundleMetadata, assets: &[&Asset]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# App Assets\n");
    let _ = writeln!(out, "Generated from the prompt: \"{}\"\n", metadata.prompt);
    let _ = writeln!(out, "Created: {}\n", metadata.created_at_rfc3339());

    let _ = writeln!(out, "## Contents\n");
    for kind in AssetKind::ALL {
        let n = count(assets, kind);
        if n > 0 {
            let _ = writeln!(out, "- {}: {} file(s)", kind, n);
        }
    }

    let references: Vec<&&Asset> = assets
        .iter()
        .filter(|a| a.as_raster().is_some_and(|r| r.is_reference()))
        .collect();
    if !references.is_empty() {
        let _ = writeln!(out, "\n## Images available by URL\n");
        let _ = writeln!(
            out,
            "Some images could not be downloaded and are included as `.url` shortcuts:\n"
        );
        for asset in references {
            if let Some(RasterPayload::Reference { url, .. }) = asset.as_raster().map(|r| &r.payload) {
                let _ = writeln!(out, "- {}: {}", asset.filename, url);
            }
        }
    }

    let _ = writeln!(out, "\n## Layout\n");
    let _ = writeln!(out, "- `images/` app icons, tab bar icons and launch screens");
    let _ = writeln!(out, "- `vectors/` SVG icons");
    let _ = writeln!(out, "- `audio/` sound effects");
    let _ = writeln!(out, "- `animations/` animation files");
    let _ = writeln!(out, "- `documentation/` these documents");
    out
}

fn inventory(metadata: &BundleMetadata, assets: &[&Asset]) -> Result<String> {
    let entries: Vec<serde_json::Value> = assets
        .iter()
        .map(|asset| {
            let contents = asset.contents();
            serde_json::json!({
                "filename": asset.archive_name(),
                "kind": asset.kind().as_str(),
                "bytes": contents.len(),
                "sha256": ContentHash::from_bytes(&contents).to_hex(),
            })
        })
        .collect();

    let doc = serde_json::json!({
        "prompt": metadata.prompt,
        "generated": metadata.created_at_rfc3339(),
        "assets": entries,
    });
    serde_json::to_string_pretty(&doc)
        .map_err(|e| GlyphsmithError::Generation(format!("Failed to serialize inventory: {}", e)))
}

fn implementation_guide(assets: &[&Asset]) -> String {
    let mut out = String::from("# Implementation Guide\n");

    if count(assets, AssetKind::RasterIcon) > 0 {
        out.push_str(
            "\n## App Icons\n\n\
             1. Open `Assets.xcassets` in Xcode and select `AppIcon`.\n\
             2. Replace its `Contents.json` with `AppIcon-Contents.json` and copy the PNG files from `images/app-icons/light-mode/` next to it.\n\
             3. Dark-mode variants live in `images/app-icons/dark-mode/`.\n",
        );
    }
    if count(assets, AssetKind::VectorIcon) > 0 {
        out.push_str(
            "\n## Vector Icons\n\n\
             Drag the SVG files from `vectors/` into the asset catalog and enable \"Preserve Vector Data\".\n\
             `icons-sprite.svg` bundles every icon as a `<symbol>` for web views.\n",
        );
    }
    if count(assets, AssetKind::LaunchScreen) > 0 {
        out.push_str(
            "\n## Launch Screens\n\n\
             Add `LaunchScreen-iPhone.png` and `LaunchScreen-iPad.png` to the asset catalog and reference them from `LaunchScreen.storyboard`.\n",
        );
    }
    out
}

fn usage_examples(assets: &[&Asset]) -> String {
    let mut out = String::from("# Usage Examples\n");
    let icon_names: Vec<&str> = assets
        .iter()
        .filter(|a| a.as_vector().is_some())
        .map(|a| a.filename.trim_end_matches(".svg"))
        .take(3)
        .collect();

    if icon_names.is_empty() {
        out.push_str("\nNo vector icons were generated for this bundle.\n");
        return out;
    }

    out.push_str("\n## SwiftUI\n\n```swift\n");
    for name in &icon_names {
        let _ = writeln!(out, "Image(\"{}\")\n    .resizable()\n    .frame(width: 24, height: 24)", name);
    }
    out.push_str("```\n\n## UIKit\n\n```swift\n");
    for name in &icon_names {
        let _ = writeln!(out, "let icon = UIImage(named: \"{}\")", name);
    }
    out.push_str("```\n\n## Web\n\n```html\n");
    for name in &icon_names {
        let _ = writeln!(
            out,
            "<svg width=\"24\" height=\"24\"><use href=\"icons-sprite.svg#{}\"/></svg>",
            name
        );
    }
    out.push_str("```\n");
    out
}

/// Xcode asset catalog contents for the light (or appearance-less) app icon matrix
fn app_icon_contents(assets: &[&Asset]) -> Result<Option<String>> {
    let images: Vec<serde_json::Value> = assets
        .iter()
        .filter_map(|asset| {
            let raster = asset.as_raster()?;
            let is_matrix_icon = raster.category == RasterCategory::AppIcon
                && !raster.is_reference()
                && raster.mode != Some(Mode::Dark);
            if !is_matrix_icon {
                return None;
            }
            let factor = raster.density.factor();
            let logical = raster.width_px / factor;
            Some(serde_json::json!({
                "filename": asset.filename,
                "idiom": "universal",
                "scale": format!("{}x", factor),
                "size": format!("{}x{}", logical, logical),
            }))
        })
        .collect();

    if images.is_empty() {
        return Ok(None);
    }

    let doc = serde_json::json!({
        "images": images,
        "info": { "author": "glyphsmith", "version": 1 },
    });
    serde_json::to_string_pretty(&doc)
        .map(Some)
        .map_err(|e| GlyphsmithError::Generation(format!("Failed to serialize AppIcon contents: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{Density, RasterAsset};
    use crate::vector::{templated, IconRole};
    use chrono::TimeZone;

    fn metadata() -> BundleMetadata {
        BundleMetadata {
            id: "test".to_string(),
            prompt: "a blue coffee cup".to_string(),
            created_at: chrono::Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            kinds: vec![AssetKind::RasterIcon, AssetKind::VectorIcon, AssetKind::Documentation],
        }
    }

    fn icon(filename: &str, edge: u32, density: Density, mode: Mode) -> Asset {
        Asset::new(
            filename,
            "p",
            AssetPayload::Raster(RasterAsset {
                payload: RasterPayload::Png(vec![1, 2, 3]),
                width_px: edge,
                height_px: edge,
                density,
                mode: Some(mode),
                category: RasterCategory::AppIcon,
            }),
        )
    }

    #[test]
    fn test_full_documentation_set() {
        let light = icon("AppIcon-20x20@2x.png", 40, Density::X2, Mode::Light);
        let dark = icon("AppIcon-Dark-20x20@2x.png", 40, Density::X2, Mode::Dark);
        let back = templated("a blue coffee cup", IconRole::NavigationBack).unwrap();
        let assets = vec![&light, &dark, &back];

        let docs = generate(&metadata(), &assets).unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(
            names,
            vec![README, INVENTORY, IMPLEMENTATION_GUIDE, USAGE_EXAMPLES, APP_ICON_CONTENTS, SPRITE_SHEET]
        );

        let contents = match &docs[4].payload {
            AssetPayload::Document(d) => d.content.clone(),
            _ => panic!("expected document"),
        };
        let json: serde_json::Value = serde_json::from_str(&contents).unwrap();
        let images = json["images"].as_array().unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0]["size"], "20x20");
        assert_eq!(images[0]["scale"], "2x");
    }

    #[test]
    fn test_inventory_hashes_contents() {
        let back = templated("cup", IconRole::NavigationBack).unwrap();
        let text = inventory(&metadata(), &[&back]).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["assets"][0]["filename"], "navigation-back.svg");
        assert_eq!(
            json["assets"][0]["sha256"],
            ContentHash::from_bytes(back.contents().as_slice()).to_hex()
        );
        assert_eq!(json["generated"], "2026-03-01T12:00:00Z");
    }

    #[test]
    fn test_no_catalog_or_sprite_without_assets() {
        let docs = generate(&metadata(), &[]).unwrap();
        assert_eq!(docs.len(), 4);
    }
}
