//! Grouped counts for summary reports.

use super::types::{ReportOptions, SummaryGroupBy, SummaryRow};
use crate::consolidate::UNSPECIFIED;
use crate::layout::builder::{TABLE_HEADER_HEIGHT, TABLE_ROW_HEIGHT};
use crate::layout::{ColumnWidths, DocumentBuilder};
use crate::types::WorkOrderRecord;
use chrono::{DateTime, Local};
use std::collections::HashMap;

/// Count records per value of the grouping field, in first-occurrence order.
pub fn summarize(records: &[WorkOrderRecord], group_by: SummaryGroupBy) -> Vec<SummaryRow> {
    let mut rows: Vec<SummaryRow> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for record in records {
        let group = record.text(group_by.field()).unwrap_or_else(|| UNSPECIFIED.to_string());
        let pos = *positions.entry(group.clone()).or_insert_with(|| {
            rows.push(SummaryRow { group, work_orders: 0, with_hazards: 0 });
            rows.len() - 1
        });
        rows[pos].work_orders += 1;
        if record.has_hazard() {
            rows[pos].with_hazards += 1;
        }
    }

    rows
}

/// Lay out the summary document: title block and one grouped table.
pub fn render_summary(
    builder: &mut DocumentBuilder,
    options: &ReportOptions,
    rows: &[SummaryRow],
    generated_at: DateTime<Local>,
) {
    let total: usize = rows.iter().map(|r| r.work_orders).sum();
    let hazards: usize = rows.iter().map(|r| r.with_hazards).sum();

    builder.add_title(
        &options.title,
        &[
            format!("Generated {}", generated_at.format("%Y-%m-%d %H:%M")),
            format!("Summary by {}: {} work orders in {} groups", options.group_by.label().to_lowercase(), total, rows.len()),
        ],
    );
    builder.add_section_header(
        &format!("Work Orders by {}", options.group_by.label()),
        TABLE_HEADER_HEIGHT + TABLE_ROW_HEIGHT,
    );

    let headers: Vec<String> =
        [options.group_by.label(), "Work Orders", "With Hazards", "Share"].iter().map(|s| s.to_string()).collect();
    let mut table: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            vec![
                row.group.clone(),
                row.work_orders.to_string(),
                row.with_hazards.to_string(),
                format!("{:.1}%", row.share(total)),
            ]
        })
        .collect();
    table.push(vec![
        "Total".to_string(),
        total.to_string(),
        hazards.to_string(),
        if total == 0 { "0.0%".to_string() } else { "100.0%".to_string() },
    ]);

    builder.add_data_table(&headers, &table, &ColumnWidths::Proportional(vec![4.0, 1.5, 1.5, 1.0]));
}
