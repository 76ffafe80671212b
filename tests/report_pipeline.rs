/// Offline integration tests for cspace-report
///
/// These tests run the full pipeline against the fixture in `test-data/`
/// without network access: images are either disabled or unreachable.
use cspace_report::images::{CancelToken, ImagePipelineConfig, ImageResolver};
use cspace_report::report::{self, ReportMode, ReportOptions};
use cspace_report::types::parse_records;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Duration;

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("test-data/work-orders.json")
}

fn fixture_records() -> Vec<cspace_report::WorkOrderRecord> {
    let text = std::fs::read_to_string(fixture()).expect("fixture should exist");
    parse_records(&text).expect("fixture should parse")
}

/// Images pointing at a port nothing listens on fail fast.
fn unreachable_resolver() -> ImageResolver {
    ImageResolver::new(
        ImagePipelineConfig::new()
            .with_asset_base_url("http://127.0.0.1:9/")
            .with_timeout(Duration::from_secs(2)),
    )
}

fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cspace-report"))
        .args(args)
        .env_remove("CSPACE_REPORT_CONFIG")
        .env_remove("CSPACE_REPORT_TOKEN")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run cspace-report {}: {}", args.join(" "), e))
}

fn assert_success(output: &Output, context: &str) {
    assert!(
        output.status.success(),
        "{} failed with status: {:?}\nstdout: {}\nstderr: {}",
        context,
        output.status.code(),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_fixture_parses_from_envelope() {
    let records = fixture_records();
    assert_eq!(records.len(), 4);
}

#[test]
fn test_consolidated_report_written_to_disk() {
    let records = fixture_records();
    let dir = tempfile::tempdir().unwrap();

    let output = report::build_report(
        &records,
        &ReportOptions::new(ReportMode::Consolidated),
        &unreachable_resolver(),
        &CancelToken::new(),
    )
    .expect("report should build");

    assert_eq!(output.entries.len(), 3);
    assert_eq!(output.merged_entries(), 1);
    let merged = &output.entries[0];
    assert_eq!(merged.original_entry_count, 2);
    assert_eq!(merged.original_indexes, vec![0, 2]);
    assert!(merged.has_hazard);
    // The data: URI is never fetched, the relative picture fails to connect
    assert_eq!(merged.images.total, 2);
    assert_eq!(merged.images.loaded, 0);

    let path = report::output_path(dir.path(), None, output.mode, output.generated_at);
    report::write_report(&output, &path).unwrap();
    let manifest = report::write_json_manifest(&output, &path).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"%PDF-"));

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(manifest).unwrap()).unwrap();
    assert_eq!(json["mode"], "consolidated");
    assert_eq!(json["record_count"], 4);
    assert_eq!(json["merged_entries"], 1);
    assert_eq!(json["entries"][0]["original_entry_count"], 2);
    assert_eq!(json["images"]["total"], 2);
}

#[test]
fn test_write_report_into_missing_directory() {
    let records = fixture_records();
    let dir = tempfile::tempdir().unwrap();
    let options = ReportOptions::new(ReportMode::Detailed).with_images(false);
    let output = report::build_report(&records, &options, &unreachable_resolver(), &CancelToken::new()).unwrap();

    let path = dir.path().join("nested/out/report.pdf");
    report::write_report(&output, &path).unwrap();
    assert!(path.exists());
    assert_eq!(output.entries.len(), 4);
}

#[test]
fn test_output_error_names_path() {
    let records = fixture_records();
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let options = ReportOptions::new(ReportMode::Summary);
    let output = report::build_report(&records, &options, &unreachable_resolver(), &CancelToken::new()).unwrap();
    let err = report::write_report(&output, &blocker.join("report.pdf")).unwrap_err();

    assert_eq!(err.stage(), cspace_report::Stage::Output);
    assert!(err.to_string().contains("failed to write"));
}

#[test]
fn test_cli_summary_mode() {
    let dir = tempfile::tempdir().unwrap();
    let input = fixture();
    let output = run_cli(&[
        "--input",
        input.to_str().unwrap(),
        "--mode",
        "summary",
        "--group-by",
        "status",
        "--output-dir",
        dir.path().to_str().unwrap(),
        "--output",
        "summary.pdf",
        "--json",
        "--console-width",
        "100",
    ]);
    assert_success(&output, "summary report");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("=== Summary ==="));
    assert!(stdout.contains("Groups:          2"));
    assert!(dir.path().join("summary.pdf").exists());
    assert!(dir.path().join("summary.json").exists());
}

#[test]
fn test_cli_single_mode_without_images() {
    let dir = tempfile::tempdir().unwrap();
    let input = fixture();
    let output = run_cli(&[
        "--input",
        input.to_str().unwrap(),
        "--mode",
        "single",
        "--work-order-id",
        "WO-1002",
        "--no-images",
        "--output-dir",
        dir.path().to_str().unwrap(),
    ]);
    assert_success(&output, "single report");

    let written: Vec<_> = std::fs::read_dir(dir.path()).unwrap().filter_map(|e| e.ok()).collect();
    assert_eq!(written.len(), 1);
    let name = written[0].file_name().to_string_lossy().to_string();
    assert!(name.starts_with("work-orders-single-"), "unexpected name {}", name);
    assert!(name.ends_with(".pdf"));
}

#[test]
fn test_cli_unknown_record_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = fixture();
    let output = run_cli(&[
        "--input",
        input.to_str().unwrap(),
        "--mode",
        "single",
        "--work-order-id",
        "WO-404",
        "--output-dir",
        dir.path().to_str().unwrap(),
    ]);

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("WO-404"), "stdout: {}", stdout);
}

#[test]
fn test_cli_missing_input_fails() {
    let output = run_cli(&["--input", "/nonexistent/records.json"]);
    assert!(!output.status.success());
}
