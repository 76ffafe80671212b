//! Writing report artifacts to disk.
//!
//! This module handles:
//! - The output filename convention
//! - Writing the PDF
//! - The optional JSON manifest describing what was rendered

use super::types::{ReportMode, ReportOutput};
use crate::error::ReportError;
use chrono::{DateTime, Local};
use log::{debug, info};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// `work-orders-<mode>-<YYYYMMDD-HHMMSS>.pdf`
pub fn output_filename(mode: ReportMode, at: DateTime<Local>) -> String {
    format!("work-orders-{}-{}.pdf", mode, at.format("%Y%m%d-%H%M%S"))
}

/// Where the PDF goes: an explicit file wins over the directory plus the
/// generated filename. Relative explicit paths are taken relative to `dir`.
pub fn output_path(dir: &Path, explicit: Option<&Path>, mode: ReportMode, at: DateTime<Local>) -> PathBuf {
    match explicit {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => dir.join(path),
        None => dir.join(output_filename(mode, at)),
    }
}

/// Manifest path next to the PDF: `<name>.json`.
pub fn manifest_path(pdf_path: &Path) -> PathBuf {
    pdf_path.with_extension("json")
}

/// Write the PDF, creating the parent directory if needed.
pub fn write_report(output: &ReportOutput, path: &Path) -> Result<(), ReportError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| ReportError::output(parent, e))?;
    }

    let mut file = File::create(path).map_err(|e| ReportError::output(path, e))?;
    file.write_all(&output.pdf).map_err(|e| ReportError::output(path, e))?;

    info!("wrote {} ({} pages, {} bytes)", path.display(), output.page_count, output.pdf.len());
    Ok(())
}

/// Export a JSON description of the report next to the PDF.
///
/// Lists every entry with its provenance and image counts. Merged records
/// themselves are not written.
pub fn write_json_manifest(output: &ReportOutput, pdf_path: &Path) -> Result<PathBuf, ReportError> {
    use serde_json::json;

    let images = output.images();
    let manifest = json!({
        "mode": output.mode,
        "title": output.title,
        "generated_at": output.generated_at.to_rfc3339(),
        "pdf": pdf_path.file_name().map(|n| n.to_string_lossy().to_string()),
        "record_count": output.record_count,
        "page_count": output.page_count,
        "merged_entries": output.merged_entries(),
        "images": { "loaded": images.loaded, "total": images.total },
        "entries": output.entries,
        "summary": output.summary_rows,
    });

    let path = manifest_path(pdf_path);
    let file = File::create(&path).map_err(|e| ReportError::output(&path, e))?;
    serde_json::to_writer_pretty(file, &manifest)
        .map_err(|e| ReportError::output(&path, std::io::Error::other(e)))?;

    debug!("wrote manifest {}", path.display());
    Ok(path)
}
