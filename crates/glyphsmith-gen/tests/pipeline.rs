//! End-to-end pipeline runs against the mock backend

use glyphsmith_core::{CancellationToken, GlyphsmithError};
use glyphsmith_gen::asset::{BundleBuilder, BundleMetadata, RasterPayload};
use glyphsmith_gen::providers::mock::{MockBackend, MockImageMode};
use glyphsmith_gen::{
    ArchiveAssembler, AssetKind, BackendFailure, Density, GenerationRequest, GlyphsmithConfig,
    Orchestrator, SizeTable, Stage, StageStatus,
};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

fn small_table() -> SizeTable {
    SizeTable {
        app_icon: vec![20, 29],
        tab_bar: vec![25],
        densities: vec![Density::X1, Density::X2],
    }
}

fn orchestrator(backend: MockBackend) -> Orchestrator {
    let mut config = GlyphsmithConfig::default();
    config.generation.backend = "mock".to_string();
    Orchestrator::new(config, Arc::new(backend.with_image_edge(64)))
        .unwrap()
        .with_size_table(small_table())
}

#[test]
fn test_vector_only_request_uses_prompt_color() {
    let report = orchestrator(MockBackend::new())
        .generate("a blue coffee cup", &[AssetKind::VectorIcon], &CancellationToken::new())
        .unwrap();

    assert_eq!(report.status(Stage::Vector), StageStatus::Completed);
    let bundle = report.bundle();
    let back = bundle
        .assets(AssetKind::VectorIcon)
        .iter()
        .find(|a| a.filename == "navigation-back.svg")
        .unwrap();
    assert!(back.as_vector().unwrap().markup.contains("fill=\"#007AFF\""));
    assert_eq!(bundle.count(AssetKind::RasterIcon), 0);
    assert_eq!(bundle.count(AssetKind::Documentation), 0);
}

#[test]
fn test_blocked_downloads_become_references() {
    let orch = orchestrator(MockBackend::new().with_image_mode(MockImageMode::UnreachableUrl));
    let request = GenerationRequest::new("a red rocket", [AssetKind::RasterIcon]).unwrap();
    let packaged = orch.run_and_package(&request, &CancellationToken::new()).unwrap();

    let report = &packaged.report;
    assert_eq!(report.status(Stage::Raster), StageStatus::Completed);
    let rasters = report.bundle().assets(AssetKind::RasterIcon);
    assert_eq!(rasters.len(), 2);
    for asset in rasters {
        let raster = asset.as_raster().unwrap();
        match &raster.payload {
            RasterPayload::Reference { url, .. } => assert!(url.starts_with("https://blocked.invalid/")),
            other => panic!("expected reference, got {:?}", other),
        }
    }

    let archive = packaged.archive.unwrap();
    assert!(archive
        .entries
        .contains(&"images/app-icons/light-mode/app-icon-light-mode.png.url".to_string()));
    assert!(archive
        .warnings
        .contains(&"2 image(s) included as URL references only".to_string()));
}

#[test]
fn test_blocked_tab_bar_source_is_archived_as_reference() {
    let mut config = GlyphsmithConfig::default();
    config.generation.backend = "mock".to_string();
    config.generation.tab_bar_icons = true;
    let backend = MockBackend::new()
        .with_image_mode(MockImageMode::UnreachableUrl)
        .with_image_edge(64);
    let orch = Orchestrator::new(config, Arc::new(backend))
        .unwrap()
        .with_size_table(small_table());
    let request = GenerationRequest::new("a red rocket", [AssetKind::RasterIcon]).unwrap();
    let packaged = orch.run_and_package(&request, &CancellationToken::new()).unwrap();

    assert_eq!(packaged.report.status(Stage::Raster), StageStatus::Completed);
    assert_eq!(packaged.report.bundle().count(AssetKind::RasterIcon), 3);

    let archive = packaged.archive.unwrap();
    assert!(archive
        .entries
        .contains(&"images/tab-bar-icons/tab-bar-icon.png.url".to_string()));
    assert!(archive
        .warnings
        .contains(&"3 image(s) included as URL references only".to_string()));
}

#[test]
fn test_empty_prompt_never_reaches_gateway() {
    let orch = orchestrator(MockBackend::new());
    let err = orch
        .generate("   ", &[AssetKind::RasterIcon], &CancellationToken::new())
        .unwrap_err();

    assert!(matches!(err, GlyphsmithError::Validation(_)));
    assert_eq!(orch.gateway().budget().in_window(), 0);
}

#[test]
fn test_no_kinds_is_rejected() {
    let err = orchestrator(MockBackend::new())
        .generate("cup", &[], &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, GlyphsmithError::Validation(_)));
}

#[test]
fn test_failed_stage_is_isolated() {
    let backend = MockBackend::new().failing_markup(BackendFailure::Status {
        code: 429,
        message: Some("slow down".to_string()),
    });
    let report = orchestrator(backend)
        .generate(
            "a green leaf",
            &[AssetKind::VectorIcon, AssetKind::RasterIcon, AssetKind::Documentation],
            &CancellationToken::new(),
        )
        .unwrap();

    // Templated roles still succeed, so the stage completes with per-item issues
    assert_eq!(report.status(Stage::Vector), StageStatus::Completed);
    assert_eq!(report.bundle().count(AssetKind::VectorIcon), 9);
    assert_eq!(
        report
            .issues()
            .iter()
            .filter(|i| i.stage == Stage::Vector)
            .count(),
        9
    );

    assert_eq!(report.status(Stage::Raster), StageStatus::Completed);
    assert_eq!(report.bundle().count(AssetKind::RasterIcon), 8);
    assert_eq!(report.status(Stage::Documentation), StageStatus::Completed);
}

#[test]
fn test_archive_is_deterministic() {
    let report = orchestrator(MockBackend::new().with_image_mode(MockImageMode::Inline))
        .generate(
            "a purple owl",
            &[AssetKind::RasterIcon, AssetKind::VectorIcon],
            &CancellationToken::new(),
        )
        .unwrap();
    let original = report.into_bundle();

    let repack = || {
        let mut metadata: BundleMetadata = original.metadata().clone();
        metadata.id = "fixed".to_string();
        let mut builder = BundleBuilder::with_metadata(metadata);
        builder.append(original.iter().cloned().collect()).unwrap();
        ArchiveAssembler::new(small_table())
            .assemble(&builder.finish())
            .unwrap()
    };

    let first = repack();
    let second = repack();
    assert_eq!(first.bytes, second.bytes);
    assert_eq!(first.digest, second.digest);
    assert!(first.warnings.is_empty(), "{:?}", first.warnings);
}

#[test]
fn test_archive_round_trips_through_zip() {
    let orch = orchestrator(MockBackend::new());
    let request = GenerationRequest::new(
        "an orange fox",
        [AssetKind::VectorIcon, AssetKind::Documentation],
    )
    .unwrap();
    let packaged = orch.run_and_package(&request, &CancellationToken::new()).unwrap();
    let archive = packaged.archive.unwrap();

    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(archive.bytes.clone())).unwrap();
    let mut manifest = String::new();
    zip.by_name("asset-manifest.json")
        .unwrap()
        .read_to_string(&mut manifest)
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&manifest).unwrap();
    assert_eq!(json["prompt"], "an orange fox");
    assert_eq!(json["assets"]["vector-icon"], 18);

    let mut sprite = String::new();
    zip.by_name("documentation/icons-sprite.svg")
        .unwrap()
        .read_to_string(&mut sprite)
        .unwrap();
    assert!(sprite.contains("id=\"navigation-back\""));
}

#[test]
fn test_cancellation_discards_partial_results() {
    let orch = orchestrator(MockBackend::new().with_delay(Duration::from_millis(300)));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(30));
        trigger.cancel();
    });

    let result = orch.generate(
        "a yellow sun",
        &[AssetKind::VectorIcon, AssetKind::Documentation],
        &cancel,
    );
    handle.join().unwrap();

    assert!(result.unwrap_err().is_cancellation());
}

#[test]
fn test_audio_requires_credential() {
    let report = orchestrator(MockBackend::new())
        .generate("a bell", &[AssetKind::Audio], &CancellationToken::new())
        .unwrap();
    assert_eq!(report.status(Stage::Audio), StageStatus::Skipped);

    let mut config = GlyphsmithConfig::default();
    config.providers.entry("elevenlabs".to_string()).or_default().api_key = Some("key".to_string());
    let orch = Orchestrator::new(config, Arc::new(MockBackend::new())).unwrap();
    let report = orch
        .generate("a bell", &[AssetKind::Audio], &CancellationToken::new())
        .unwrap();
    assert_eq!(report.status(Stage::Audio), StageStatus::Completed);
}

#[test]
fn test_written_archive_uses_default_name() {
    let orch = orchestrator(MockBackend::new());
    let request = GenerationRequest::new("a gray cloud", [AssetKind::VectorIcon]).unwrap();
    let archive = orch
        .run_and_package(&request, &CancellationToken::new())
        .unwrap()
        .archive
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let written = archive.write_to(dir.path()).unwrap();
    assert_eq!(written, dir.path().join(&archive.filename));
    assert!(archive.filename.starts_with("app-assets-"));
    assert_eq!(std::fs::read(written).unwrap(), archive.bytes);
}
