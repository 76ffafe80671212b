//! Cover and per-entry page content.

use super::types::{EntrySummary, ReportMode, ReportOptions};
use crate::consolidate::ConsolidatedEntry;
use crate::images::{ImageResource, LoadSummary};
use crate::layout::builder::{KV_ROW_HEIGHT, LINE_HEIGHT, TABLE_HEADER_HEIGHT, TABLE_ROW_HEIGHT};
use crate::layout::{ColumnWidths, DocumentBuilder};
use crate::types::{WorkOrderRecord, fields, value_items, value_text};
use chrono::{DateTime, Local};

const MISSING: &str = "-";

fn yes_no(record: &WorkOrderRecord, field: &str) -> String {
    if record.flag(field) { "Yes".to_string() } else { "No".to_string() }
}

/// Display text for a field: scalars as text, arrays joined with ", ".
fn display(record: &WorkOrderRecord, field: &str) -> String {
    match record.get(field) {
        Some(serde_json::Value::Array(_)) => {
            let items: Vec<String> = value_items(record.get(field)).into_iter().filter_map(value_text).collect();
            if items.is_empty() { MISSING.to_string() } else { items.join(", ") }
        }
        _ => record.text(field).unwrap_or_else(|| MISSING.to_string()),
    }
}

fn pairs(items: &[(&str, String)]) -> Vec<(String, String)> {
    items.iter().map(|(label, value)| (label.to_string(), value.clone())).collect()
}

/// Title block and overview table ahead of the entry pages.
pub fn render_cover(
    builder: &mut DocumentBuilder,
    options: &ReportOptions,
    record_count: usize,
    entries: &[ConsolidatedEntry],
    generated_at: DateTime<Local>,
) {
    let merged = entries.iter().filter(|e| e.is_consolidated()).count();
    let mut subtitle = vec![
        format!("Generated {}", generated_at.format("%Y-%m-%d %H:%M")),
        format!("Mode: {}", options.mode),
        format!("{} work orders, {} report entries", record_count, entries.len()),
    ];
    if options.mode == ReportMode::Consolidated {
        subtitle.push(format!("{} entries consolidated from duplicate surveys", merged));
    }
    builder.add_title(&options.title, &subtitle);

    builder.add_section_header("Overview", TABLE_HEADER_HEIGHT + TABLE_ROW_HEIGHT);
    let headers: Vec<String> =
        ["#", "Building", "Location", "Space", "Records", "Hazards"].iter().map(|s| s.to_string()).collect();
    let rows: Vec<Vec<String>> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            vec![
                (i + 1).to_string(),
                entry.key.building.clone(),
                entry.key.location.clone(),
                entry.key.space.clone(),
                entry.original_entry_count().to_string(),
                if entry.record.has_hazard() { "Yes".to_string() } else { "No".to_string() },
            ]
        })
        .collect();
    builder.add_data_table(&headers, &rows, &ColumnWidths::Proportional(vec![0.5, 2.0, 2.5, 2.5, 1.0, 1.0]));
}

/// Images for one entry page.
#[derive(Debug)]
pub enum EntryImages {
    /// The report was built without images
    Omitted { references: usize },
    Resolved(Vec<ImageResource>),
}

/// Lay out one entry starting on a fresh page.
pub fn render_entry(
    builder: &mut DocumentBuilder,
    entry: &ConsolidatedEntry,
    position: usize,
    total: usize,
    images: EntryImages,
    images_per_row: usize,
) -> EntrySummary {
    let record = &entry.record;
    builder.start_new_page();

    let work_orders = display(record, fields::WORK_ORDER_ID);
    builder.add_title(
        &entry.key.label(),
        &[format!("Entry {} of {}", position, total), format!("Work order(s): {}", work_orders)],
    );

    if let Some(ref merge) = entry.merge {
        let rows: Vec<String> = merge.original_indexes.iter().map(|i| (i + 1).to_string()).collect();
        builder.add_callout(&format!(
            "Consolidated entry: {} original work orders combined (input records {})",
            merge.original_entry_count,
            rows.join(", ")
        ));
    }

    builder.add_section_header("Location", KV_ROW_HEIGHT);
    builder.add_key_value_table(&pairs(&[
        ("Building", display(record, fields::BUILDING)),
        ("Location", display(record, fields::LOCATION_DESCRIPTION)),
        ("Space", record.text_any(&[fields::SPACE_NAME, fields::CONFINED_SPACE_DESCRIPTION]).unwrap_or_else(|| MISSING.to_string())),
        ("Work Order ID", work_orders.clone()),
        ("Unique ID", display(record, fields::UNIQUE_ID)),
        ("Survey Date", display(record, fields::SURVEY_DATE)),
        ("Status", display(record, fields::STATUS)),
        ("Priority", display(record, fields::PRIORITY)),
        ("Technician", display(record, fields::TECHNICIAN)),
        ("Entry Points", display(record, fields::ENTRY_POINTS)),
        ("Confined Space", yes_no(record, fields::IS_CONFINED_SPACE)),
        ("Permit Required", yes_no(record, fields::PERMIT_REQUIRED)),
    ]));

    builder.add_section_header("Hazard Assessment", KV_ROW_HEIGHT);
    builder.add_key_value_table(&pairs(&[
        ("Atmospheric Hazard", yes_no(record, fields::ATMOSPHERIC_HAZARD)),
        ("Engulfment Hazard", yes_no(record, fields::ENGULFMENT_HAZARD)),
        ("Configuration Hazard", yes_no(record, fields::CONFIGURATION_HAZARD)),
        ("Other Recognized Hazards", yes_no(record, fields::OTHER_HAZARD)),
    ]));
    for (label, field) in [
        ("Atmospheric hazard details", fields::ATMOSPHERIC_HAZARD_DESCRIPTION),
        ("Engulfment hazard details", fields::ENGULFMENT_HAZARD_DESCRIPTION),
        ("Configuration hazard details", fields::CONFIGURATION_HAZARD_DESCRIPTION),
        ("Other hazard details", fields::OTHER_HAZARD_DESCRIPTION),
    ] {
        if let Some(text) = record.text(field) {
            builder.add_paragraph(Some(label), &text);
        }
    }

    builder.add_section_header("Safety Measures", KV_ROW_HEIGHT);
    builder.add_key_value_table(&pairs(&[
        ("PPE Required", yes_no(record, fields::PPE_REQUIRED)),
        ("PPE List", display(record, fields::PPE_LIST)),
        ("Forced Air Ventilation Sufficient", yes_no(record, fields::VENTILATION)),
        ("Dedicated Continuous Air Monitor", yes_no(record, fields::AIR_MONITOR)),
        ("Warning Sign Posted", yes_no(record, fields::WARNING_SIGN)),
    ]));

    builder.add_section_header("Personnel", KV_ROW_HEIGHT);
    builder.add_key_value_table(&pairs(&[
        ("Others Working Near Space", yes_no(record, fields::OTHERS_WORKING_NEAR)),
        ("Can Others See Into Space", yes_no(record, fields::CAN_OTHERS_SEE_IN)),
        ("Contractors Enter Space", yes_no(record, fields::CONTRACTORS_ENTER)),
        ("Surveyors", display(record, fields::SURVEYORS)),
    ]));

    builder.add_section_header("Entry Requirements & Notes", LINE_HEIGHT * 2.0);
    let requirements = record.text(fields::ENTRY_REQUIREMENTS);
    let notes = record.text(fields::NOTES);
    if requirements.is_none() && notes.is_none() {
        builder.add_note("No entry requirements or notes recorded.");
    }
    if let Some(text) = requirements {
        builder.add_paragraph(Some("Entry requirements"), &text);
    }
    if let Some(text) = notes {
        builder.add_paragraph(Some("Notes"), &text);
    }

    let first_block = match images {
        EntryImages::Resolved(ref resources) if !resources.is_empty() => builder.image_row_height(images_per_row),
        _ => LINE_HEIGHT,
    };
    builder.add_section_header("Photographic Evidence", first_block);
    let load = match images {
        EntryImages::Omitted { references } => {
            builder.add_note(&format!("{} image(s) omitted from this report.", references));
            LoadSummary { loaded: 0, total: 0 }
        }
        EntryImages::Resolved(resources) if resources.is_empty() => {
            builder.add_note("No images attached.");
            LoadSummary::default()
        }
        EntryImages::Resolved(resources) => {
            let load = LoadSummary::of(&resources);
            builder.add_image_grid(resources.into_iter().map(ImageResource::into_image).collect(), images_per_row);
            builder.add_note(&load.describe());
            load
        }
    };

    EntrySummary {
        position,
        building: entry.key.building.clone(),
        location: entry.key.location.clone(),
        space: entry.key.space.clone(),
        work_order_ids: work_orders,
        original_entry_count: entry.original_entry_count(),
        original_indexes: entry.merge.as_ref().map(|m| m.original_indexes.clone()).unwrap_or_default(),
        has_hazard: record.has_hazard(),
        images: load,
    }
}
