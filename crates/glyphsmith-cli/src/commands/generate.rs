//! Full pipeline run

use anyhow::{Context, Result};
use glyphsmith_core::CancellationToken;
use glyphsmith_gen::providers::create_backend;
use glyphsmith_gen::{
    AssetKind, GenerationRequest, GlyphsmithConfig, Orchestrator, ProgressObserver, Stage,
    StageStatus,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub struct GenerateArgs {
    pub prompt: String,
    pub kinds: Vec<String>,
    pub backend: Option<String>,
    pub output: Option<String>,
    pub tab_bar: bool,
}

/// Prints each stage transition as it happens
struct ConsoleProgress;

impl ProgressObserver for ConsoleProgress {
    fn on_transition(&self, stage: Stage, status: StageStatus) {
        let marker = match status {
            StageStatus::Active => "...",
            StageStatus::Completed => "ok",
            StageStatus::Failed => "FAILED",
            StageStatus::Skipped => "skipped",
            StageStatus::Pending => return,
        };
        println!("  {:<14} {}", stage.as_str(), marker);
    }
}

/// Fall back to defaults when the layered config cannot be read
fn config_or_default(loaded: glyphsmith_core::Result<GlyphsmithConfig>) -> GlyphsmithConfig {
    match loaded {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "could not load config, using defaults");
            GlyphsmithConfig::default()
        }
    }
}

pub fn run(args: GenerateArgs) -> Result<()> {
    let mut config = config_or_default(GlyphsmithConfig::load());
    if let Some(backend) = args.backend {
        config.generation.backend = backend;
    }
    if args.tab_bar {
        config.generation.tab_bar_icons = true;
    }

    let kinds: Vec<AssetKind> = if args.kinds.is_empty() {
        config.generation.default_asset_kinds.clone()
    } else {
        args.kinds
            .iter()
            .map(|k| k.parse::<AssetKind>())
            .collect::<glyphsmith_core::Result<_>>()?
    };
    let request = GenerationRequest::new(args.prompt, kinds)?;

    let backend = create_backend(&config.generation.backend, &config)?;
    println!(
        "Generating {} kind(s) with backend '{}'",
        request.kinds().len(),
        backend.name()
    );
    let orchestrator = Orchestrator::new(config, backend)?.with_observer(Arc::new(ConsoleProgress));

    let packaged = orchestrator.run_and_package(&request, &CancellationToken::new())?;
    let report = &packaged.report;

    if !report.issues().is_empty() {
        println!("\nIssues:");
        for issue in report.issues() {
            println!("  [{}] {}", issue.stage, issue.message);
        }
    }

    let Some(archive) = packaged.archive else {
        anyhow::bail!("No archive was written: every requested stage failed");
    };

    let target = args.output.unwrap_or_else(|| ".".to_string());
    let written = archive
        .write_to(Path::new(&target))
        .with_context(|| format!("Failed to write archive to {}", target))?;
    info!(path = %written.display(), digest = %archive.digest, "archive written");

    println!(
        "\nWrote {} ({} assets, {} bytes)",
        written.display(),
        report.bundle().total(),
        archive.bytes.len()
    );
    println!("  {}", archive.digest);
    Ok(())
}
