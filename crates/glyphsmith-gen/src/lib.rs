//! Glyphsmith Gen - prompt-to-asset-bundle pipeline
//!
//! Turns a text prompt into a packaged bundle of app assets: raster icon
//! matrices in light and dark appearance, vector glyphs, launch screens and
//! documentation. Every external call goes through a rate-limited gateway,
//! stages run under an orchestrator that isolates their failures, and the
//! result is written as a deterministic zip archive.

pub mod archive;
pub mod asset;
pub mod backend;
pub mod config;
pub mod docs;
pub mod gateway;
pub mod orchestrator;
pub mod prompt;
pub mod providers;
pub mod raster;
pub mod vector;

pub use archive::{ArchiveAssembler, ArchiveOutput, Manifest};
pub use asset::{Asset, AssetKind, AssetPayload, Bundle, BundleMetadata, Density, GenerationRequest, Mode};
pub use backend::{BackendFailure, GeneratedImage, GenerationBackend, ImageParams, ImageSource, MarkupParams};
pub use config::GlyphsmithConfig;
pub use gateway::{Gateway, RateBudget};
pub use orchestrator::{
    Orchestrator, PackagedRun, ProgressObserver, Stage, StageIssue, StageStatus, StatusReport,
};
pub use raster::{MatrixRenderer, SizeTable};
pub use vector::{IconRole, IconSpec, VectorSynthesizer};
