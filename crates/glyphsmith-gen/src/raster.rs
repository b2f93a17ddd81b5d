//! Raster Resolution Matrix Renderer
//!
//! Expands one source image into every (size, density) pair of a size table.
//! The expansion itself is table-driven; pixel work goes through a
//! [`RasterSurface`].

use crate::asset::{
    Asset, AssetPayload, Density, Mode, RasterAsset, RasterCategory, RasterPayload,
};
use crate::backend::{ImageParams, ImageSource};
use crate::gateway::Gateway;
use crate::prompt::{enhance, PromptPurpose};
use glyphsmith_core::{CancellationToken, GatewayError, GlyphsmithError, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Corner radius as a fraction of the edge length
pub const CORNER_RADIUS_RATIO: f32 = 0.2237;
pub const PREVIEW_EDGE: u32 = 64;
pub const MIN_ICON_EDGE: u32 = 20;

pub const REFERENCE_NOTE: &str = "Image available via URL (CORS restricted - right-click to save)";

const APP_ICON_SIZES: [u32; 13] = [20, 29, 40, 58, 60, 76, 80, 87, 120, 152, 167, 180, 1024];
const TAB_BAR_SIZES: [u32; 3] = [25, 50, 75];

/// Which matrix a source image is expanded into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RasterRole {
    AppIcon,
    TabBar,
}

impl RasterRole {
    pub fn prefix(self) -> &'static str {
        match self {
            RasterRole::AppIcon => "AppIcon",
            RasterRole::TabBar => "TabBarIcon",
        }
    }

    pub fn category(self) -> RasterCategory {
        match self {
            RasterRole::AppIcon => RasterCategory::AppIcon,
            RasterRole::TabBar => RasterCategory::TabBarIcon,
        }
    }
}

/// Output file name for one matrix cell.
///
/// Dark-mode app icons carry a `-Dark` prefix segment so that both
/// appearances can live in one bundle.
pub fn matrix_filename(role: RasterRole, mode: Option<Mode>, size: u32, density: Density) -> String {
    let prefix = match (role, mode) {
        (RasterRole::AppIcon, Some(Mode::Dark)) => "AppIcon-Dark",
        _ => role.prefix(),
    };
    format!("{}-{}x{}{}.png", prefix, size, size, density.suffix())
}

/// Base sizes per role plus the density set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeTable {
    pub app_icon: Vec<u32>,
    pub tab_bar: Vec<u32>,
    pub densities: Vec<Density>,
}

impl Default for SizeTable {
    fn default() -> Self {
        Self {
            app_icon: APP_ICON_SIZES.to_vec(),
            tab_bar: TAB_BAR_SIZES.to_vec(),
            densities: Density::ALL.to_vec(),
        }
    }
}

impl SizeTable {
    pub fn sizes(&self, role: RasterRole) -> &[u32] {
        match role {
            RasterRole::AppIcon => &self.app_icon,
            RasterRole::TabBar => &self.tab_bar,
        }
    }

    /// Every (size, density) pair, size ascending then density ascending
    pub fn plan(&self, role: RasterRole) -> Vec<(u32, Density)> {
        let mut sizes = self.sizes(role).to_vec();
        sizes.sort_unstable();
        sizes.dedup();
        let mut densities = self.densities.clone();
        densities.sort();
        densities.dedup();

        sizes
            .into_iter()
            .flat_map(|size| densities.iter().map(move |&d| (size, d)))
            .collect()
    }
}

/// Drawing capability used by the renderer
pub trait RasterSurface: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage>;

    /// Draw `source` scaled into a new `width`x`height` canvas
    fn draw_scaled(&self, source: &DynamicImage, width: u32, height: u32) -> DynamicImage;

    fn to_grayscale(&self, image: &DynamicImage) -> DynamicImage;

    /// Clear everything outside a rounded rectangle of the given corner radius
    fn round_corners(&self, image: &mut RgbaImage, radius: f32);

    fn encode_png(&self, image: &DynamicImage) -> Result<Vec<u8>>;
}

/// [`RasterSurface`] backed by the `image` crate with Lanczos3 resampling
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageSurface;

impl RasterSurface for ImageSurface {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes)
            .map_err(|e| GlyphsmithError::MatrixExpansion(format!("Failed to decode source image: {}", e)))
    }

    fn draw_scaled(&self, source: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        source.resize_exact(width, height, FilterType::Lanczos3)
    }

    fn to_grayscale(&self, image: &DynamicImage) -> DynamicImage {
        image.grayscale()
    }

    fn round_corners(&self, image: &mut RgbaImage, radius: f32) {
        let (width, height) = image.dimensions();
        let radius = radius.min(width.min(height) as f32 / 2.0).max(0.0);
        if radius == 0.0 {
            return;
        }

        for (x, y, pixel) in image.enumerate_pixels_mut() {
            let px = x as f32 + 0.5;
            let py = y as f32 + 0.5;
            let cx = px.clamp(radius, width as f32 - radius);
            let cy = py.clamp(radius, height as f32 - radius);
            let distance = ((px - cx).powi(2) + (py - cy).powi(2)).sqrt();
            let coverage = (radius - distance + 0.5).clamp(0.0, 1.0);
            if coverage < 1.0 {
                pixel.0[3] = (pixel.0[3] as f32 * coverage).round() as u8;
            }
        }
    }

    fn encode_png(&self, image: &DynamicImage) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| GlyphsmithError::MatrixExpansion(format!("Failed to encode PNG: {}", e)))?;
        Ok(bytes)
    }
}

/// Deterministic size x density expansion
pub struct MatrixRenderer {
    surface: Arc<dyn RasterSurface>,
    table: SizeTable,
}

impl MatrixRenderer {
    pub fn new(table: SizeTable) -> Self {
        Self::with_surface(Arc::new(ImageSurface), table)
    }

    pub fn with_surface(surface: Arc<dyn RasterSurface>, table: SizeTable) -> Self {
        Self { surface, table }
    }

    pub fn table(&self) -> &SizeTable {
        &self.table
    }

    /// Render every cell of `role`'s matrix from `source`.
    ///
    /// Cells are split across worker threads and returned in plan order. Any
    /// cell failure fails the whole matrix; no partial matrix is returned.
    pub fn expand(
        &self,
        source: &[u8],
        role: RasterRole,
        mode: Option<Mode>,
        source_prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Asset>> {
        let image = self.surface.decode(source)?;
        let plan = self.table.plan(role);
        if plan.is_empty() {
            return Err(GlyphsmithError::MatrixExpansion(format!(
                "size table for {} is empty",
                role.prefix()
            )));
        }

        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(plan.len())
            .max(1);
        let chunk_size = plan.len().div_ceil(workers);
        debug!(role = role.prefix(), cells = plan.len(), workers, "expanding matrix");

        let indexed: Vec<(usize, (u32, Density))> = plan.into_iter().enumerate().collect();
        let mut rendered: Vec<(usize, Result<Asset>)> = std::thread::scope(|scope| {
            let handles: Vec<_> = indexed
                .chunks(chunk_size)
                .map(|chunk| {
                    let image = &image;
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|&(index, (size, density))| {
                                let cell = if cancel.is_cancelled() {
                                    Err(GlyphsmithError::Cancelled)
                                } else {
                                    self.render_cell(image, role, mode, size, density, source_prompt)
                                };
                                (index, cell)
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        vec![(
                            usize::MAX,
                            Err(GlyphsmithError::MatrixExpansion("render worker panicked".to_string())),
                        )]
                    })
                })
                .collect()
        });

        rendered.sort_by_key(|(index, _)| *index);
        if cancel.is_cancelled() {
            return Err(GlyphsmithError::Cancelled);
        }
        rendered.into_iter().map(|(_, cell)| cell).collect()
    }

    /// Decode `source` and re-encode it as a `width`x`height` PNG.
    ///
    /// Fails with `MatrixExpansion` when the bytes are not a decodable image.
    pub fn render_exact(&self, source: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
        let image = self.surface.decode(source)?;
        let canvas = if (image.width(), image.height()) == (width, height) {
            image
        } else {
            self.surface.draw_scaled(&image, width, height)
        };
        self.surface.encode_png(&canvas)
    }

    fn render_cell(
        &self,
        image: &DynamicImage,
        role: RasterRole,
        mode: Option<Mode>,
        size: u32,
        density: Density,
        source_prompt: &str,
    ) -> Result<Asset> {
        let edge = size * density.factor();
        let mut canvas = self.surface.draw_scaled(image, edge, edge);
        if role == RasterRole::TabBar {
            canvas = self.surface.to_grayscale(&canvas);
        }
        let bytes = self.surface.encode_png(&canvas)?;

        Ok(Asset::new(
            matrix_filename(role, mode, size, density),
            source_prompt,
            AssetPayload::Raster(RasterAsset {
                payload: RasterPayload::Png(bytes),
                width_px: edge,
                height_px: edge,
                density,
                mode,
                category: role.category(),
            }),
        ))
    }
}

/// Tagged stand-in for a source image that could not be downloaded
pub fn reference_asset(url: &str, role: RasterRole, mode: Option<Mode>, source_prompt: &str) -> Asset {
    let filename = match (role, mode) {
        (RasterRole::AppIcon, Some(mode)) => format!("app-icon-{}-mode.png", mode),
        (RasterRole::AppIcon, None) => "app-icon.png".to_string(),
        (RasterRole::TabBar, _) => "tab-bar-icon.png".to_string(),
    };
    Asset::new(
        filename,
        source_prompt,
        AssetPayload::Raster(RasterAsset {
            payload: RasterPayload::Reference {
                url: url.to_string(),
                note: REFERENCE_NOTE.to_string(),
            },
            width_px: 1024,
            height_px: 1024,
            density: Density::X1,
            mode,
            category: role.category(),
        }),
    )
}

/// Scale to `edge` and clip to the rounded app-icon shape
pub fn round_corners(bytes: &[u8], edge: u32) -> Result<Vec<u8>> {
    let surface = ImageSurface;
    let source = surface.decode(bytes)?;
    let mut canvas = surface.draw_scaled(&source, edge, edge).to_rgba8();
    surface.round_corners(&mut canvas, edge as f32 * CORNER_RADIUS_RATIO);
    surface.encode_png(&DynamicImage::ImageRgba8(canvas))
}

/// Small square preview, rounded like the home screen shows it
pub fn preview(bytes: &[u8]) -> Result<Vec<u8>> {
    round_corners(bytes, PREVIEW_EDGE)
}

/// Dimensions and advisory findings for an icon image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReport {
    pub width: u32,
    pub height: u32,
    pub warnings: Vec<String>,
}

pub fn inspect(bytes: &[u8]) -> Result<ImageReport> {
    let image = ImageSurface.decode(bytes)?;
    let (width, height) = (image.width(), image.height());
    let mut warnings = Vec::new();

    if width < MIN_ICON_EDGE || height < MIN_ICON_EDGE {
        warnings.push(format!(
            "Image is {}x{}, below the {}px minimum",
            width, height, MIN_ICON_EDGE
        ));
    }
    if width.abs_diff(height) > 2 {
        warnings.push(format!("Image is not square ({}x{})", width, height));
    }

    Ok(ImageReport {
        width,
        height,
        warnings,
    })
}

/// Raster and launch-screen generation through the gateway
pub struct RasterGenerator {
    gateway: Arc<Gateway>,
    renderer: MatrixRenderer,
    params: ImageParams,
    tab_bar_icons: bool,
}

impl RasterGenerator {
    pub fn new(gateway: Arc<Gateway>, renderer: MatrixRenderer, params: ImageParams) -> Self {
        Self {
            gateway,
            renderer,
            params,
            tab_bar_icons: false,
        }
    }

    pub fn with_tab_bar_icons(mut self, enabled: bool) -> Self {
        self.tab_bar_icons = enabled;
        self
    }

    pub fn renderer(&self) -> &MatrixRenderer {
        &self.renderer
    }

    /// Light and dark app icon matrices, plus the tab-bar matrix when enabled.
    ///
    /// When a generated image cannot be downloaded, every URL-sourced mode is
    /// emitted as a reference asset instead and no matrix is expanded for it.
    pub fn generate(&self, prompt: &str, cancel: &CancellationToken) -> Result<Vec<Asset>> {
        let square = ImageParams {
            width: 1024,
            height: 1024,
            ..self.params.clone()
        };

        let mut sources = Vec::new();
        for mode in [Mode::Light, Mode::Dark] {
            let background = match mode {
                Mode::Light => "light mode, bright background",
                Mode::Dark => "dark mode, dark background",
            };
            let instruction = enhance(&format!("{}, {}", prompt, background), PromptPurpose::AppIcon);
            let image = self.gateway.generate_image(&instruction, &square, cancel)?;
            sources.push((mode, instruction, image.source));
        }

        let mut fetched = Vec::new();
        let mut any_blocked = false;
        for (mode, instruction, source) in &sources {
            let bytes = match self.download(source, cancel) {
                Ok(bytes) => Some(bytes),
                Err(GlyphsmithError::Gateway(GatewayError::Cancelled)) => {
                    return Err(GlyphsmithError::Cancelled)
                }
                Err(e) => {
                    warn!(%mode, error = %e, "app icon download failed, falling back to URL references");
                    any_blocked = true;
                    None
                }
            };
            fetched.push((*mode, instruction.as_str(), source, bytes));
        }

        let mut assets = Vec::new();
        for (mode, instruction, source, bytes) in fetched {
            match (source, bytes) {
                (ImageSource::Url(url), _) if any_blocked => {
                    assets.push(reference_asset(url, RasterRole::AppIcon, Some(mode), instruction));
                }
                (_, Some(bytes)) => {
                    assets.extend(self.renderer.expand(
                        &bytes,
                        RasterRole::AppIcon,
                        Some(mode),
                        instruction,
                        cancel,
                    )?);
                }
                (_, None) => {
                    return Err(GlyphsmithError::MatrixExpansion(format!(
                        "{} mode source image unavailable",
                        mode
                    )))
                }
            }
        }

        if self.tab_bar_icons {
            assets.extend(self.tab_bar_matrix(prompt, &square, cancel)?);
        }

        info!(count = assets.len(), "raster assets ready");
        Ok(assets)
    }

    fn tab_bar_matrix(&self, prompt: &str, params: &ImageParams, cancel: &CancellationToken) -> Result<Vec<Asset>> {
        let instruction = enhance(prompt, PromptPurpose::TabBar);
        let image = self.gateway.generate_image(&instruction, params, cancel)?;
        match (self.download(&image.source, cancel), &image.source) {
            (Ok(bytes), _) => self
                .renderer
                .expand(&bytes, RasterRole::TabBar, None, &instruction, cancel),
            (Err(GlyphsmithError::Gateway(GatewayError::Cancelled)), _) => Err(GlyphsmithError::Cancelled),
            (Err(e), ImageSource::Url(url)) => {
                warn!(error = %e, "tab bar download failed, falling back to URL reference");
                Ok(vec![reference_asset(url, RasterRole::TabBar, None, &instruction)])
            }
            (Err(e), ImageSource::Bytes(_)) => Err(e),
        }
    }

    /// iPhone and iPad launch screens, with the same URL fallback.
    ///
    /// Downloaded bytes are decoded and re-encoded at the device size; a URL
    /// source that does not decode becomes a reference like a blocked one.
    pub fn generate_launch_screens(&self, prompt: &str, cancel: &CancellationToken) -> Result<Vec<Asset>> {
        let devices = [
            ("iPhone", "iPhone launch screen, vertical orientation, 9:19.5 aspect ratio", 1024, 1792),
            ("iPad", "iPad launch screen, can be portrait or landscape, 4:3 aspect ratio", 1024, 1024),
        ];

        let mut generated = Vec::new();
        for (device, detail, width, height) in devices {
            let instruction = enhance(&format!("{}, {}", prompt, detail), PromptPurpose::LaunchScreen);
            let params = ImageParams {
                width,
                height,
                ..self.params.clone()
            };
            let image = self.gateway.generate_image(&instruction, &params, cancel)?;
            generated.push((device, instruction, params, image.source));
        }

        let mut downloads = Vec::new();
        let mut any_blocked = false;
        for (device, _, params, source) in &generated {
            let rendered = self
                .download(source, cancel)
                .and_then(|bytes| self.renderer.render_exact(&bytes, params.width, params.height));
            match rendered {
                Ok(png) => downloads.push(Some(png)),
                Err(GlyphsmithError::Gateway(GatewayError::Cancelled)) => {
                    return Err(GlyphsmithError::Cancelled)
                }
                Err(e) => {
                    warn!(device = *device, error = %e, "launch screen unusable, falling back to URL references");
                    any_blocked = true;
                    downloads.push(None);
                }
            }
        }

        let mut assets = Vec::new();
        for ((device, instruction, params, source), bytes) in generated.into_iter().zip(downloads) {
            let payload = match (source, bytes) {
                (ImageSource::Url(url), _) if any_blocked => RasterPayload::Reference {
                    url,
                    note: REFERENCE_NOTE.to_string(),
                },
                (_, Some(bytes)) => RasterPayload::Png(bytes),
                (_, None) => {
                    return Err(GlyphsmithError::MatrixExpansion(format!(
                        "{} launch screen unavailable or not a decodable image",
                        device
                    )))
                }
            };
            assets.push(Asset::new(
                format!("LaunchScreen-{}.png", device),
                instruction,
                AssetPayload::Raster(RasterAsset {
                    payload,
                    width_px: params.width,
                    height_px: params.height,
                    density: Density::X1,
                    mode: None,
                    category: RasterCategory::LaunchScreen,
                }),
            ));
        }
        Ok(assets)
    }

    fn download(&self, source: &ImageSource, cancel: &CancellationToken) -> Result<Vec<u8>> {
        match source {
            ImageSource::Bytes(bytes) => Ok(bytes.clone()),
            ImageSource::Url(url) => Ok(self.gateway.fetch_image(url, cancel)?),
        }
    }
}
