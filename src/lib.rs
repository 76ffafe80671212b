//! Confined-space work-order reports.
//!
//! Records arrive as JSON from the surrounding application. The pipeline
//! optionally consolidates duplicate surveys of the same space, resolves
//! each entry's images with bounded time and concurrency, lays the result
//! out on paginated A4 pages and serialises it to PDF.
//!
//! ```ignore
//! let records = parse_records(&json)?;
//! let resolver = ImageResolver::new(ImagePipelineConfig::new().with_proxy(proxy));
//! let output = build_report(&records, &ReportOptions::new(ReportMode::Consolidated), &resolver, &CancelToken::new())?;
//! write_report(&output, &path)?;
//! ```

pub mod consolidate;
pub mod error;
pub mod images;
pub mod layout;
pub mod pdf;
pub mod report;
pub mod types;

pub use error::{ReportError, Stage};
pub use images::{CancelToken, ImagePipelineConfig, ImageResolver};
pub use report::{ReportMode, ReportOptions, ReportOutput, build_report, write_report};
pub use types::{WorkOrderRecord, parse_records};
