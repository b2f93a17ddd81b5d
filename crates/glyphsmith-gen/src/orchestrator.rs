//! Stage Orchestrator
//!
//! Runs the selected generation stages in the caller's order, isolates each
//! stage's failure, and collects the results into a [`Bundle`].

use crate::archive::{ArchiveAssembler, ArchiveOutput};
use crate::asset::{Asset, AssetKind, AssetPayload, Bundle, BundleBuilder, GenerationRequest, RasterPayload};
use crate::backend::{GenerationBackend, ImageParams};
use crate::config::GlyphsmithConfig;
use crate::docs;
use crate::gateway::Gateway;
use crate::providers::create_backend;
use crate::raster::{self, MatrixRenderer, RasterGenerator, SizeTable};
use crate::vector::{self, VectorSynthesizer};
use glyphsmith_core::{CancellationToken, GlyphsmithError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Named unit of pipeline work, in fixed order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Raster,
    Vector,
    Audio,
    Animation,
    LaunchScreens,
    Documentation,
    Processing,
    Packaging,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Raster,
        Stage::Vector,
        Stage::Audio,
        Stage::Animation,
        Stage::LaunchScreens,
        Stage::Documentation,
        Stage::Processing,
        Stage::Packaging,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Raster => "raster",
            Stage::Vector => "vector",
            Stage::Audio => "audio",
            Stage::Animation => "animation",
            Stage::LaunchScreens => "launchScreens",
            Stage::Documentation => "documentation",
            Stage::Processing => "processing",
            Stage::Packaging => "packaging",
        }
    }

    /// The content stage that produces `kind`
    pub fn for_kind(kind: AssetKind) -> Stage {
        match kind {
            AssetKind::RasterIcon => Stage::Raster,
            AssetKind::VectorIcon => Stage::Vector,
            AssetKind::LaunchScreen => Stage::LaunchScreens,
            AssetKind::Audio => Stage::Audio,
            AssetKind::Animation => Stage::Animation,
            AssetKind::Documentation => Stage::Documentation,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Active,
    Completed,
    Failed,
    Skipped,
}

impl StageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Active => "active",
            StageStatus::Completed => "completed",
            StageStatus::Failed => "failed",
            StageStatus::Skipped => "skipped",
        }
    }

    fn can_become(self, next: StageStatus) -> bool {
        matches!(
            (self, next),
            (StageStatus::Pending, StageStatus::Active)
                | (StageStatus::Pending, StageStatus::Skipped)
                | (StageStatus::Active, StageStatus::Completed)
                | (StageStatus::Active, StageStatus::Failed)
        )
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives every stage transition, e.g. to drive a progress display
pub trait ProgressObserver: Send + Sync {
    fn on_transition(&self, stage: Stage, status: StageStatus);
}

/// Per-stage state machine
pub struct PipelineProgress {
    states: [(Stage, StageStatus); 8],
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl fmt::Debug for PipelineProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.states.iter().map(|(s, st)| (s.as_str(), st.as_str())))
            .finish()
    }
}

impl Default for PipelineProgress {
    fn default() -> Self {
        Self::new(None)
    }
}

impl PipelineProgress {
    pub fn new(observer: Option<Arc<dyn ProgressObserver>>) -> Self {
        Self {
            states: Stage::ALL.map(|stage| (stage, StageStatus::Pending)),
            observer,
        }
    }

    pub fn status(&self, stage: Stage) -> StageStatus {
        self.states
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, status)| *status)
            .unwrap_or(StageStatus::Pending)
    }

    /// All stages with their status, in fixed order
    pub fn snapshot(&self) -> Vec<(Stage, StageStatus)> {
        self.states.to_vec()
    }

    pub fn transition(&mut self, stage: Stage, next: StageStatus) -> Result<()> {
        let Some(entry) = self.states.iter_mut().find(|(s, _)| *s == stage) else {
            return Err(GlyphsmithError::Generation(format!("Unknown stage {}", stage)));
        };
        if !entry.1.can_become(next) {
            return Err(GlyphsmithError::Generation(format!(
                "Stage {} cannot go from {} to {}",
                stage, entry.1, next
            )));
        }
        entry.1 = next;
        if let Some(observer) = &self.observer {
            observer.on_transition(stage, next);
        }
        Ok(())
    }

    pub fn start(&mut self, stage: Stage) -> Result<()> {
        self.transition(stage, StageStatus::Active)
    }

    pub fn complete(&mut self, stage: Stage) -> Result<()> {
        self.transition(stage, StageStatus::Completed)
    }

    pub fn fail(&mut self, stage: Stage) -> Result<()> {
        self.transition(stage, StageStatus::Failed)
    }

    pub fn skip(&mut self, stage: Stage) -> Result<()> {
        self.transition(stage, StageStatus::Skipped)
    }
}

/// Something worth telling the caller about a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageIssue {
    pub stage: Stage,
    pub message: String,
}

/// Per-stage outcome plus the finished bundle
#[derive(Debug)]
pub struct StatusReport {
    progress: PipelineProgress,
    requested: Vec<Stage>,
    issues: Vec<StageIssue>,
    bundle: Bundle,
}

impl StatusReport {
    pub fn status(&self, stage: Stage) -> StageStatus {
        self.progress.status(stage)
    }

    pub fn stages(&self) -> Vec<(Stage, StageStatus)> {
        self.progress.snapshot()
    }

    /// Content stages the request selected, in run order
    pub fn requested(&self) -> &[Stage] {
        &self.requested
    }

    pub fn issues(&self) -> &[StageIssue] {
        &self.issues
    }

    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }

    pub fn into_bundle(self) -> Bundle {
        self.bundle
    }

    /// True when every selected content stage failed
    pub fn all_content_failed(&self) -> bool {
        !self.requested.is_empty()
            && self
                .requested
                .iter()
                .all(|stage| self.status(*stage) == StageStatus::Failed)
    }
}

/// A run followed by the packaging decision
#[derive(Debug)]
pub struct PackagedRun {
    pub report: StatusReport,
    /// `None` when packaging was refused or failed; see the report's issues
    pub archive: Option<ArchiveOutput>,
}

/// Drives one request through the pipeline
pub struct Orchestrator {
    config: GlyphsmithConfig,
    gateway: Arc<Gateway>,
    table: SizeTable,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl Orchestrator {
    /// Build with the backend named in `config.generation.backend`
    pub fn from_config(config: GlyphsmithConfig) -> Result<Self> {
        let backend = create_backend(&config.generation.backend, &config)?;
        Self::new(config, backend)
    }

    pub fn new(config: GlyphsmithConfig, backend: Arc<dyn GenerationBackend>) -> Result<Self> {
        config.validate()?;
        let gateway = Arc::new(Gateway::from_limits(backend, &config.limits));
        Ok(Self::with_gateway(config, gateway))
    }

    /// Share an existing gateway (and with it, its rate budget)
    pub fn with_gateway(config: GlyphsmithConfig, gateway: Arc<Gateway>) -> Self {
        Self {
            config,
            gateway,
            table: SizeTable::default(),
            observer: None,
        }
    }

    pub fn with_size_table(mut self, table: SizeTable) -> Self {
        self.table = table;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Validate the raw inputs, then run. Invalid input never reaches the gateway.
    pub fn generate(&self, prompt: &str, kinds: &[AssetKind], cancel: &CancellationToken) -> Result<StatusReport> {
        let request = GenerationRequest::new(prompt, kinds.iter().copied())?;
        self.run(&request, cancel)
    }

    /// Run every selected stage plus the trailing processing stage.
    ///
    /// Stage failures are recorded, never propagated. Cancellation drops
    /// everything collected so far and returns `Cancelled`. Packaging is not
    /// part of a plain run and is reported as skipped, so no stage is left
    /// pending in the returned report.
    pub fn run(&self, request: &GenerationRequest, cancel: &CancellationToken) -> Result<StatusReport> {
        let mut report = self.run_stages(request, cancel)?;
        report.progress.skip(Stage::Packaging)?;
        Ok(report)
    }

    /// Content and processing stages; packaging is left to the caller
    fn run_stages(&self, request: &GenerationRequest, cancel: &CancellationToken) -> Result<StatusReport> {
        let mut progress = PipelineProgress::new(self.observer.clone());
        let mut builder = BundleBuilder::new(request);
        let mut issues = Vec::new();
        let requested: Vec<Stage> = request.kinds().iter().map(|k| Stage::for_kind(*k)).collect();

        info!(
            id = %builder.metadata().id,
            backend = self.gateway.backend_name(),
            stages = requested.len(),
            "starting generation"
        );

        for stage in Stage::ALL {
            if !matches!(stage, Stage::Processing | Stage::Packaging) && !requested.contains(&stage) {
                progress.skip(stage)?;
            }
        }

        for &stage in &requested {
            ensure_not_cancelled(cancel)?;

            if stage == Stage::Audio && !self.config.has_audio_credential() {
                info!(%stage, "no audio credential configured, skipping");
                progress.skip(stage)?;
                continue;
            }

            progress.start(stage)?;
            let outcome = self
                .run_stage(stage, request, &builder, cancel)
                .and_then(|output| {
                    let count = output.assets.len();
                    builder.append(output.assets)?;
                    Ok((count, output.issues))
                });

            match outcome {
                Ok((count, notes)) => {
                    info!(%stage, assets = count, "stage completed");
                    issues.extend(notes.into_iter().map(|message| StageIssue { stage, message }));
                    progress.complete(stage)?;
                }
                Err(e) if e.is_cancellation() || cancel.is_cancelled() => {
                    warn!(%stage, "request cancelled, discarding partial results");
                    return Err(GlyphsmithError::Cancelled);
                }
                Err(e) => {
                    warn!(%stage, error = %e, "stage failed");
                    issues.push(StageIssue {
                        stage,
                        message: e.to_string(),
                    });
                    progress.fail(stage)?;
                }
            }
        }

        ensure_not_cancelled(cancel)?;
        progress.start(Stage::Processing)?;
        let notes = self.post_process(&mut builder);
        issues.extend(notes.into_iter().map(|message| StageIssue {
            stage: Stage::Processing,
            message,
        }));
        progress.complete(Stage::Processing)?;

        Ok(StatusReport {
            progress,
            requested,
            issues,
            bundle: builder.finish(),
        })
    }

    /// Run, then package unless every selected content stage failed
    pub fn run_and_package(&self, request: &GenerationRequest, cancel: &CancellationToken) -> Result<PackagedRun> {
        let mut report = self.run_stages(request, cancel)?;

        if report.all_content_failed() {
            warn!("every requested stage failed, refusing to package");
            report.progress.start(Stage::Packaging)?;
            report.progress.fail(Stage::Packaging)?;
            report.issues.push(StageIssue {
                stage: Stage::Packaging,
                message: "Every requested stage failed; nothing to package".to_string(),
            });
            return Ok(PackagedRun {
                report,
                archive: None,
            });
        }

        ensure_not_cancelled(cancel)?;
        report.progress.start(Stage::Packaging)?;
        let assembler = ArchiveAssembler::new(self.table.clone());
        let archive = match assembler.assemble(&report.bundle) {
            Ok(archive) => {
                report.issues.extend(archive.warnings.iter().map(|w| StageIssue {
                    stage: Stage::Packaging,
                    message: w.clone(),
                }));
                report.progress.complete(Stage::Packaging)?;
                Some(archive)
            }
            Err(e) => {
                warn!(error = %e, "packaging failed");
                report.issues.push(StageIssue {
                    stage: Stage::Packaging,
                    message: e.to_string(),
                });
                report.progress.fail(Stage::Packaging)?;
                None
            }
        };

        Ok(PackagedRun { report, archive })
    }

    fn run_stage(
        &self,
        stage: Stage,
        request: &GenerationRequest,
        builder: &BundleBuilder,
        cancel: &CancellationToken,
    ) -> Result<StageOutput> {
        let prompt = request.prompt();
        match stage {
            Stage::Raster => Ok(StageOutput::assets(self.raster().generate(prompt, cancel)?)),
            Stage::LaunchScreens => Ok(StageOutput::assets(
                self.raster().generate_launch_screens(prompt, cancel)?,
            )),
            Stage::Vector => {
                let batch = VectorSynthesizer::new(Arc::clone(&self.gateway)).generate_all(prompt, cancel);
                if batch.failures.iter().any(|f| f.error.is_cancellation()) {
                    return Err(GlyphsmithError::Cancelled);
                }
                if batch.assets.is_empty() {
                    let first = batch
                        .failures
                        .first()
                        .map(|f| f.error.to_string())
                        .unwrap_or_else(|| "no icons produced".to_string());
                    return Err(GlyphsmithError::Generation(format!(
                        "All {} vector items failed; first error: {}",
                        batch.failures.len(),
                        first
                    )));
                }
                Ok(StageOutput {
                    assets: batch.assets,
                    issues: batch
                        .failures
                        .iter()
                        .map(|f| format!("{}: {}", f.filename, f.error))
                        .collect(),
                })
            }
            Stage::Audio => Ok(StageOutput::assets(generate_audio(prompt))),
            Stage::Animation => Ok(StageOutput::assets(generate_animations(prompt))),
            Stage::Documentation => {
                let collected: Vec<&Asset> = AssetKind::ALL
                    .iter()
                    .flat_map(|kind| builder.assets(*kind))
                    .collect();
                Ok(StageOutput::assets(docs::generate(builder.metadata(), &collected)?))
            }
            Stage::Processing | Stage::Packaging => Err(GlyphsmithError::Generation(format!(
                "{} is not a content stage",
                stage
            ))),
        }
    }

    fn raster(&self) -> RasterGenerator {
        let params = ImageParams {
            quality: self.config.generation.image_quality.clone(),
            style: self.config.generation.image_style.clone(),
            ..ImageParams::default()
        };
        RasterGenerator::new(
            Arc::clone(&self.gateway),
            MatrixRenderer::new(self.table.clone()),
            params,
        )
        .with_tab_bar_icons(self.config.generation.tab_bar_icons)
    }

    /// Optimize vector markup and inspect the raster icons already in the bundle
    fn post_process(&self, builder: &mut BundleBuilder) -> Vec<String> {
        let mut notes = Vec::new();
        let options = self.config.svg;

        if let Some(vectors) = builder.assets_mut(AssetKind::VectorIcon) {
            for asset in vectors.iter_mut() {
                let filename = asset.filename.clone();
                if let AssetPayload::Vector(v) = &mut asset.payload {
                    let optimized = vector::optimize(&v.markup, options);
                    if vector::is_well_formed(&optimized) {
                        v.markup = optimized;
                    } else {
                        notes.push(format!("{}: optimization skipped, result not well formed", filename));
                    }
                }
            }
        }

        // Launch screens are not square; only icons are inspected
        for asset in builder.assets(AssetKind::RasterIcon) {
            let Some(r) = asset.as_raster() else { continue };
            let RasterPayload::Png(bytes) = &r.payload else { continue };
            match raster::inspect(bytes) {
                Ok(report) => notes.extend(
                    report
                        .warnings
                        .into_iter()
                        .map(|w| format!("{}: {}", asset.filename, w)),
                ),
                Err(e) => notes.push(format!("{}: {}", asset.filename, e)),
            }
        }

        debug!(notes = notes.len(), "post-processing done");
        notes
    }
}

struct StageOutput {
    assets: Vec<Asset>,
    issues: Vec<String>,
}

impl StageOutput {
    fn assets(assets: Vec<Asset>) -> Self {
        Self {
            assets,
            issues: Vec::new(),
        }
    }
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        warn!("request cancelled, discarding partial results");
        return Err(GlyphsmithError::Cancelled);
    }
    Ok(())
}

/// Audio generation is a placeholder: it produces nothing and never fails
fn generate_audio(prompt: &str) -> Vec<Asset> {
    debug!(prompt, "audio generation is not implemented, returning no assets");
    Vec::new()
}

/// Animation generation is a placeholder: it produces nothing and never fails
fn generate_animations(prompt: &str) -> Vec<Asset> {
    debug!(prompt, "animation generation is not implemented, returning no assets");
    Vec::new()
}
