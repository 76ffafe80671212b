//! Document layout engine.
//!
//! This module handles:
//! - Page geometry and the [`LayoutState`] cursor (`geometry`)
//! - Helvetica text measurement, truncation and wrapping (`metrics`)
//! - The display list a laid-out document consists of (`document`)
//! - The block-level [`DocumentBuilder`] and the footer pass (`builder`)

pub mod builder;
pub mod document;
pub mod geometry;
pub mod metrics;

pub use builder::{ColumnWidths, DocumentBuilder};
pub use document::{Color, DrawOp, Page, ReportDocument};
pub use geometry::{LayoutState, PageGeometry};
