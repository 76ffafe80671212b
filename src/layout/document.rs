/// The laid-out document: pages of positioned drawing operations.
///
/// A `ReportDocument` is a display list. Layout decides every position;
/// serialisation (see `crate::pdf`) only translates operations.

use super::geometry::PageGeometry;
use crate::images::ResolvedImage;
use chrono::{DateTime, Local};

/// RGB colour, one byte per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub const WHITE: Color = Color(0xFF, 0xFF, 0xFF);
    pub const TEXT: Color = Color(0x22, 0x22, 0x22);
    pub const MUTED: Color = Color(0x66, 0x66, 0x66);
    pub const RULE: Color = Color(0xBB, 0xBB, 0xBB);
    pub const ACCENT: Color = Color(0x1F, 0x4E, 0x79);
    pub const SHADE: Color = Color(0xF2, 0xF5, 0xF8);
    pub const LABEL_FILL: Color = Color(0xE8, 0xEE, 0xF4);
    pub const NOTICE: Color = Color(0xFF, 0xF4, 0xD6);

    /// Channels scaled to 0.0..=1.0.
    pub fn unit(&self) -> (f32, f32, f32) {
        (self.0 as f32 / 255.0, self.1 as f32 / 255.0, self.2 as f32 / 255.0)
    }
}

/// One positioned drawing operation. `y` is measured from the page top;
/// for text it is the baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text { x: f32, y: f32, size: f32, bold: bool, color: Color, text: String },
    Rect { x: f32, y: f32, width: f32, height: f32, fill: Option<Color>, stroke: Option<Color> },
    Line { x1: f32, y1: f32, x2: f32, y2: f32, color: Color, width: f32 },
    /// `image` indexes [`ReportDocument::images`]
    Image { x: f32, y: f32, width: f32, height: f32, image: usize },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub ops: Vec<DrawOp>,
}

impl Page {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Text of every text operation on the page, in drawing order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.texts().any(|t| t.contains(needle))
    }
}

/// A finished, paginated document.
#[derive(Debug, Clone)]
pub struct ReportDocument {
    pub title: String,
    pub geometry: PageGeometry,
    pub pages: Vec<Page>,
    pub images: Vec<ResolvedImage>,
    pub generated_at: DateTime<Local>,
}

impl ReportDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}
