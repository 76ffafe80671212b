//! Report orchestration.
//!
//! This module handles:
//! - Choosing entries per mode (consolidated, detailed, single, summary)
//! - Resolving each entry's images with bounded concurrency
//! - Driving the layout engine: cover page, entry pages, footer pass
//! - Serialising to PDF and writing artifacts (`export`)
//!
//! # Module Organization
//!
//! - `types` - Modes, options and results
//! - `sections` - Cover and per-entry page content
//! - `summary` - Grouped counts for summary mode
//! - `export` - Filenames, PDF output and the JSON manifest

mod export;
mod sections;
mod summary;
mod types;

pub use export::{manifest_path, output_filename, output_path, write_json_manifest, write_report};
pub use sections::EntryImages;
pub use summary::summarize;
pub use types::{
    DEFAULT_IMAGES_PER_ROW, DEFAULT_TITLE, EntrySummary, RecordSelector, ReportMode, ReportOptions, ReportOutput,
    SummaryGroupBy, SummaryRow,
};

use crate::consolidate::{ConsolidatedEntry, consolidate_all, passthrough_all};
use crate::error::ReportError;
use crate::images::{CancelToken, ImageResolver, resolve_all};
use crate::layout::{DocumentBuilder, ReportDocument};
use crate::pdf;
use crate::types::WorkOrderRecord;
use chrono::Local;
use log::{debug, info};

/// A laid-out report before serialisation.
#[derive(Debug)]
pub struct LaidOutReport {
    pub document: ReportDocument,
    pub entries: Vec<EntrySummary>,
    pub summary_rows: Vec<SummaryRow>,
}

/// Entries to render for a per-entry mode.
fn select_entries(records: &[WorkOrderRecord], options: &ReportOptions) -> Result<Vec<ConsolidatedEntry>, ReportError> {
    if records.is_empty() {
        return Err(ReportError::EmptyInput { mode: options.mode });
    }

    match options.mode {
        ReportMode::Single => {
            let selector = options.selector.clone().unwrap_or(RecordSelector::Index(0));
            let record = selector.find(records).ok_or_else(|| ReportError::RecordNotFound(selector.to_string()))?;
            Ok(passthrough_all(std::slice::from_ref(record)))
        }
        ReportMode::Detailed => Ok(passthrough_all(records)),
        ReportMode::Consolidated => {
            let entries = consolidate_all(records);
            let covered: usize = entries.iter().map(ConsolidatedEntry::original_entry_count).sum();
            if covered != records.len() {
                return Err(ReportError::Grouping(format!(
                    "{} records grouped into entries covering {}",
                    records.len(),
                    covered
                )));
            }
            Ok(entries)
        }
        ReportMode::Summary => Ok(Vec::new()),
    }
}

/// Lay out a report without serialising it.
///
/// `cancel` aborts the report with [`ReportError::Cancelled`]. The
/// optional deadline in `options` only cuts image resolution short: images
/// still pending become placeholders and the report completes.
pub fn layout_report(
    records: &[WorkOrderRecord],
    options: &ReportOptions,
    resolver: &ImageResolver,
    cancel: &CancelToken,
) -> Result<LaidOutReport, ReportError> {
    let generated_at = options.generated_at.unwrap_or_else(Local::now);
    let mut builder = DocumentBuilder::new(&options.title);
    info!("building {} report from {} records", options.mode, records.len());

    if options.mode == ReportMode::Summary {
        let rows = summary::summarize(records, options.group_by);
        summary::render_summary(&mut builder, options, &rows, generated_at);
        let document = builder.finish(generated_at);
        return Ok(LaidOutReport { document, entries: Vec::new(), summary_rows: rows });
    }

    let entries = select_entries(records, options)?;
    debug!("{} entries to render", entries.len());

    if options.mode != ReportMode::Single {
        sections::render_cover(&mut builder, options, records.len(), &entries, generated_at);
    }

    let (image_cancel, _watchdog) = cancel.child(options.deadline);
    let total = entries.len();
    let mut summaries = Vec::with_capacity(total);

    for (i, entry) in entries.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(ReportError::Cancelled);
        }

        let references = entry.record.image_refs();
        let images = if options.include_images {
            EntryImages::Resolved(resolve_all(resolver, &references, &image_cancel))
        } else {
            EntryImages::Omitted { references: references.len() }
        };

        let summary = sections::render_entry(&mut builder, entry, i + 1, total, images, options.images_per_row);
        debug!("entry {} of {}: {} ({})", i + 1, total, entry.key.label(), summary.images.describe());
        summaries.push(summary);
    }

    if cancel.is_cancelled() {
        return Err(ReportError::Cancelled);
    }

    let document = builder.finish(generated_at);
    Ok(LaidOutReport { document, entries: summaries, summary_rows: Vec::new() })
}

/// Build a report end to end and return the PDF with its description.
pub fn build_report(
    records: &[WorkOrderRecord],
    options: &ReportOptions,
    resolver: &ImageResolver,
    cancel: &CancelToken,
) -> Result<ReportOutput, ReportError> {
    let laid_out = layout_report(records, options, resolver, cancel)?;
    let pdf = pdf::render(&laid_out.document)?;

    info!("{} report: {} pages, {} entries", options.mode, laid_out.document.page_count(), laid_out.entries.len());

    Ok(ReportOutput {
        mode: options.mode,
        title: options.title.clone(),
        generated_at: laid_out.document.generated_at,
        record_count: records.len(),
        page_count: laid_out.document.page_count(),
        entries: laid_out.entries,
        summary_rows: laid_out.summary_rows,
        pdf,
    })
}
