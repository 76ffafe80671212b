//! Report options and results.

use crate::images::LoadSummary;
use crate::types::{WorkOrderRecord, fields};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Which kind of report to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    /// One raw record
    Single,
    /// Duplicate surveys of a space merged into one entry
    Consolidated,
    /// One page per raw record
    Detailed,
    /// Grouped counts only
    Summary,
}

impl ReportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportMode::Single => "single",
            ReportMode::Consolidated => "consolidated",
            ReportMode::Detailed => "detailed",
            ReportMode::Summary => "summary",
        }
    }
}

impl fmt::Display for ReportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grouping column for summary reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SummaryGroupBy {
    Building,
    Status,
    Priority,
    Technician,
}

impl SummaryGroupBy {
    pub fn field(&self) -> &'static str {
        match self {
            SummaryGroupBy::Building => fields::BUILDING,
            SummaryGroupBy::Status => fields::STATUS,
            SummaryGroupBy::Priority => fields::PRIORITY,
            SummaryGroupBy::Technician => fields::TECHNICIAN,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SummaryGroupBy::Building => "Building",
            SummaryGroupBy::Status => "Status",
            SummaryGroupBy::Priority => "Priority",
            SummaryGroupBy::Technician => "Technician",
        }
    }
}

/// How `single` mode picks its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSelector {
    /// Position in the input
    Index(usize),
    /// Matches `workOrderId` or `uniqueId`
    WorkOrderId(String),
}

impl RecordSelector {
    pub fn find<'a>(&self, records: &'a [WorkOrderRecord]) -> Option<&'a WorkOrderRecord> {
        match self {
            RecordSelector::Index(i) => records.get(*i),
            RecordSelector::WorkOrderId(id) => records.iter().find(|r| {
                r.text(fields::WORK_ORDER_ID).as_deref() == Some(id.as_str())
                    || r.text(fields::UNIQUE_ID).as_deref() == Some(id.as_str())
            }),
        }
    }
}

impl fmt::Display for RecordSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordSelector::Index(i) => write!(f, "record #{}", i),
            RecordSelector::WorkOrderId(id) => write!(f, "work order {}", id),
        }
    }
}

pub const DEFAULT_TITLE: &str = "Confined Space Work Order Report";
pub const DEFAULT_IMAGES_PER_ROW: usize = 2;

/// Render options for one report.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub title: String,
    pub mode: ReportMode,
    pub group_by: SummaryGroupBy,
    /// `single` mode only; defaults to the first record
    pub selector: Option<RecordSelector>,
    pub include_images: bool,
    pub images_per_row: usize,
    /// Overall budget; images still pending when it expires become placeholders
    pub deadline: Option<Duration>,
    /// Fixed timestamp for the footer and filename; defaults to now
    pub generated_at: Option<DateTime<Local>>,
}

impl ReportOptions {
    pub fn new(mode: ReportMode) -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            mode,
            group_by: SummaryGroupBy::Building,
            selector: None,
            include_images: true,
            images_per_row: DEFAULT_IMAGES_PER_ROW,
            deadline: None,
            generated_at: None,
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_group_by(mut self, group_by: SummaryGroupBy) -> Self {
        self.group_by = group_by;
        self
    }

    pub fn with_selector(mut self, selector: RecordSelector) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn with_images(mut self, include: bool) -> Self {
        self.include_images = include;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_generated_at(mut self, at: DateTime<Local>) -> Self {
        self.generated_at = Some(at);
        self
    }
}

/// What was rendered for one entry page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySummary {
    /// 1-based position in the report
    pub position: usize,
    pub building: String,
    pub location: String,
    pub space: String,
    pub work_order_ids: String,
    pub original_entry_count: usize,
    pub original_indexes: Vec<usize>,
    pub has_hazard: bool,
    pub images: LoadSummary,
}

/// One row of a summary report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub group: String,
    pub work_orders: usize,
    pub with_hazards: usize,
}

impl SummaryRow {
    /// Share of all work orders, as a percentage.
    pub fn share(&self, total: usize) -> f64 {
        if total == 0 { 0.0 } else { self.work_orders as f64 * 100.0 / total as f64 }
    }
}

/// A built report: document bytes plus what went into them.
#[derive(Debug, Clone)]
pub struct ReportOutput {
    pub mode: ReportMode,
    pub title: String,
    pub generated_at: DateTime<Local>,
    pub record_count: usize,
    pub page_count: usize,
    pub entries: Vec<EntrySummary>,
    pub summary_rows: Vec<SummaryRow>,
    pub pdf: Vec<u8>,
}

impl ReportOutput {
    pub fn merged_entries(&self) -> usize {
        self.entries.iter().filter(|e| e.original_entry_count > 1).count()
    }

    pub fn images(&self) -> LoadSummary {
        self.entries.iter().fold(LoadSummary::default(), |acc, e| LoadSummary {
            loaded: acc.loaded + e.images.loaded,
            total: acc.total + e.images.total,
        })
    }
}
