/// Stateful document builder.
///
/// All content is appended at the cursor held in a [`LayoutState`]. Every
/// block computes the height it needs and asks [`DocumentBuilder::check_page_break`]
/// for room first; no other method decides pagination.

use super::document::{Color, DrawOp, Page, ReportDocument};
use super::geometry::{LayoutState, PageGeometry};
use super::metrics::{text_width, truncate_to_width, wrap_text};
use crate::images::ResolvedImage;
use chrono::{DateTime, Local};
use log::{debug, info};

pub const TITLE_SIZE: f32 = 20.0;
pub const SUBTITLE_SIZE: f32 = 10.0;
pub const HEADER_SIZE: f32 = 11.0;
pub const BODY_SIZE: f32 = 9.0;
pub const NOTE_SIZE: f32 = 8.0;
pub const FOOTER_SIZE: f32 = 7.5;

pub const SECTION_HEADER_BAR: f32 = 18.0;
pub const SECTION_HEADER_HEIGHT: f32 = 26.0;
pub const KV_ROW_HEIGHT: f32 = 16.0;
pub const TABLE_HEADER_HEIGHT: f32 = 18.0;
pub const TABLE_ROW_HEIGHT: f32 = 15.0;
pub const LINE_HEIGHT: f32 = 12.0;
pub const CALLOUT_HEIGHT: f32 = 20.0;
pub const CAPTION_HEIGHT: f32 = 14.0;
pub const CELL_PADDING: f32 = 4.0;
pub const IMAGE_GAP: f32 = 10.0;
pub const BLOCK_GAP: f32 = 8.0;

/// Share of a key/value card given to the label column.
const LABEL_SHARE: f32 = 0.38;

/// How data table columns divide the printable width.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnWidths {
    /// Every column the same width
    Equal,
    /// Relative weights; missing or non-positive weights count as 1
    Proportional(Vec<f32>),
    /// Absolute widths in points; columns past the right margin are clipped
    Fixed(Vec<f32>),
}

impl ColumnWidths {
    /// Concrete widths for `columns` columns within `available` points.
    ///
    /// The result never extends past `available`: a column crossing the
    /// edge is narrowed and columns beyond it get zero width.
    pub fn resolve(&self, columns: usize, available: f32) -> Vec<f32> {
        if columns == 0 {
            return Vec::new();
        }
        let raw: Vec<f32> = match self {
            ColumnWidths::Equal => vec![available / columns as f32; columns],
            ColumnWidths::Proportional(weights) => {
                let weights: Vec<f32> = (0..columns)
                    .map(|i| weights.get(i).copied().filter(|w| *w > 0.0).unwrap_or(1.0))
                    .collect();
                let total: f32 = weights.iter().sum();
                weights.iter().map(|w| available * w / total).collect()
            }
            ColumnWidths::Fixed(widths) => {
                let default = available / columns as f32;
                (0..columns).map(|i| widths.get(i).copied().filter(|w| *w > 0.0).unwrap_or(default)).collect()
            }
        };

        let mut start = 0.0;
        raw.into_iter()
            .map(|w| {
                let clipped = w.min((available - start).max(0.0));
                start += w;
                clipped
            })
            .collect()
    }
}

/// Builds a [`ReportDocument`] block by block.
pub struct DocumentBuilder {
    title: String,
    geometry: PageGeometry,
    state: LayoutState,
    pages: Vec<Page>,
    images: Vec<ResolvedImage>,
}

impl DocumentBuilder {
    pub fn new(title: &str) -> Self {
        Self::with_geometry(title, PageGeometry::A4)
    }

    pub fn with_geometry(title: &str, geometry: PageGeometry) -> Self {
        Self {
            title: title.to_string(),
            geometry,
            state: geometry.first_page(),
            pages: vec![Page::default()],
            images: Vec::new(),
        }
    }

    pub fn state(&self) -> LayoutState {
        self.state
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn push(&mut self, op: DrawOp) {
        if let Some(page) = self.pages.get_mut(self.state.page_index) {
            page.ops.push(op);
        }
    }

    fn push_to(&mut self, page_index: usize, op: DrawOp) {
        if let Some(page) = self.pages.get_mut(page_index) {
            page.ops.push(op);
        }
    }

    fn open_page(&mut self, state: LayoutState) {
        while self.pages.len() <= state.page_index {
            self.pages.push(Page::default());
        }
        self.state = state;
        debug!("layout: starting page {}", state.page_index + 1);
    }

    fn current_page_is_empty(&self) -> bool {
        self.pages.get(self.state.page_index).map(Page::is_empty).unwrap_or(true)
    }

    /// Start a new page if `required` points do not fit below the cursor.
    ///
    /// Returns true when a page break happened.
    pub fn check_page_break(&mut self, required: f32) -> bool {
        let (state, broke) = self.geometry.break_if_needed(self.state, required);
        if broke {
            self.open_page(state);
        }
        broke
    }

    /// Continue on a fresh page. An empty current page is reused.
    pub fn start_new_page(&mut self) {
        if self.current_page_is_empty() {
            self.state.cursor_y = self.geometry.margin_top;
            return;
        }
        let next = self.geometry.next_page(self.state);
        self.open_page(next);
    }

    pub fn add_spacing(&mut self, dy: f32) {
        self.state = self.state.advanced(dy);
    }

    fn text(&mut self, x: f32, y: f32, size: f32, bold: bool, color: Color, text: String) {
        if !text.is_empty() {
            self.push(DrawOp::Text { x, y, size, bold, color, text });
        }
    }

    /// Baseline for text vertically centred in a band starting at `top`.
    fn baseline(top: f32, band: f32, size: f32) -> f32 {
        top + (band + size * 0.7) / 2.0
    }

    /// Large title with optional subtitle lines and a rule beneath.
    pub fn add_title(&mut self, title: &str, subtitle: &[String]) {
        let height = TITLE_SIZE + 6.0 + subtitle.len() as f32 * (SUBTITLE_SIZE + 4.0) + BLOCK_GAP * 2.0;
        self.check_page_break(height);

        let left = self.geometry.margin_left;
        let width = self.geometry.content_width();
        let mut y = self.state.cursor_y + TITLE_SIZE;
        self.text(left, y, TITLE_SIZE, true, Color::ACCENT, truncate_to_width(title, width, TITLE_SIZE, true));
        y += 6.0;
        for line in subtitle {
            y += SUBTITLE_SIZE + 4.0;
            self.text(left, y, SUBTITLE_SIZE, false, Color::MUTED, truncate_to_width(line, width, SUBTITLE_SIZE, false));
        }
        y += BLOCK_GAP;
        let right = self.geometry.content_right();
        self.push(DrawOp::Line { x1: left, y1: y, x2: right, y2: y, color: Color::ACCENT, width: 1.0 });

        self.state.cursor_y = y + BLOCK_GAP;
    }

    /// Coloured header bar for a section.
    ///
    /// `keep_with` is the height of the first block that follows; the header
    /// moves to the next page unless that block fits beneath it.
    pub fn add_section_header(&mut self, title: &str, keep_with: f32) {
        self.check_page_break(SECTION_HEADER_HEIGHT + keep_with.max(0.0));

        let left = self.geometry.margin_left;
        let width = self.geometry.content_width();
        let top = self.state.cursor_y;
        self.push(DrawOp::Rect {
            x: left,
            y: top,
            width,
            height: SECTION_HEADER_BAR,
            fill: Some(Color::ACCENT),
            stroke: None,
        });
        let text = truncate_to_width(title, width - 2.0 * CELL_PADDING, HEADER_SIZE, true);
        self.text(left + CELL_PADDING + 2.0, Self::baseline(top, SECTION_HEADER_BAR, HEADER_SIZE), HEADER_SIZE, true, Color::WHITE, text);

        self.add_spacing(SECTION_HEADER_HEIGHT);
    }

    /// Highlighted single-line notice, e.g. a merged-entry indicator.
    pub fn add_callout(&mut self, text: &str) {
        self.check_page_break(CALLOUT_HEIGHT);

        let left = self.geometry.margin_left;
        let width = self.geometry.content_width();
        let top = self.state.cursor_y;
        self.push(DrawOp::Rect {
            x: left,
            y: top,
            width,
            height: CALLOUT_HEIGHT,
            fill: Some(Color::NOTICE),
            stroke: Some(Color::RULE),
        });
        let text = truncate_to_width(text, width - 2.0 * CELL_PADDING, BODY_SIZE, true);
        self.text(left + CELL_PADDING, Self::baseline(top, CALLOUT_HEIGHT, BODY_SIZE), BODY_SIZE, true, Color::TEXT, text);

        self.add_spacing(CALLOUT_HEIGHT + BLOCK_GAP);
    }

    /// Label/value pairs in a bordered card.
    ///
    /// Rows have a fixed height and values are truncated to one line. The
    /// card may continue on the next page, but only between rows; each
    /// page's part of the card gets its own border.
    pub fn add_key_value_table(&mut self, pairs: &[(String, String)]) {
        if pairs.is_empty() {
            return;
        }

        let left = self.geometry.margin_left;
        let width = self.geometry.content_width();
        let label_width = width * LABEL_SHARE;
        let value_width = width - label_width;

        // (page, top, bottom) of the card part on the current page
        let mut segment: Option<(usize, f32, f32)> = None;

        for (label, value) in pairs {
            if self.check_page_break(KV_ROW_HEIGHT)
                && let Some(part) = segment.take()
            {
                self.close_card(part);
            }

            let top = self.state.cursor_y;
            let page = self.state.page_index;
            let part = segment.get_or_insert((page, top, top));
            part.2 = top + KV_ROW_HEIGHT;

            self.push(DrawOp::Rect {
                x: left,
                y: top,
                width: label_width,
                height: KV_ROW_HEIGHT,
                fill: Some(Color::LABEL_FILL),
                stroke: None,
            });
            let baseline = Self::baseline(top, KV_ROW_HEIGHT, BODY_SIZE);
            let label = truncate_to_width(label, label_width - 2.0 * CELL_PADDING, BODY_SIZE, true);
            self.text(left + CELL_PADDING, baseline, BODY_SIZE, true, Color::TEXT, label);
            let value = truncate_to_width(value, value_width - 2.0 * CELL_PADDING, BODY_SIZE, false);
            self.text(left + label_width + CELL_PADDING, baseline, BODY_SIZE, false, Color::TEXT, value);

            let bottom = top + KV_ROW_HEIGHT;
            self.push(DrawOp::Line { x1: left, y1: bottom, x2: left + width, y2: bottom, color: Color::RULE, width: 0.5 });

            self.add_spacing(KV_ROW_HEIGHT);
        }

        if let Some(part) = segment {
            self.close_card(part);
        }
        self.add_spacing(BLOCK_GAP);
    }

    fn close_card(&mut self, (page, top, bottom): (usize, f32, f32)) {
        let x = self.geometry.margin_left;
        let width = self.geometry.content_width();
        self.push_to(page, DrawOp::Rect { x, y: top, width, height: bottom - top, fill: None, stroke: Some(Color::RULE) });
    }

    /// Word-wrapped free text with an optional bold label.
    ///
    /// Lines have a fixed height; a page break can fall between any two
    /// lines but never inside one.
    pub fn add_paragraph(&mut self, label: Option<&str>, text: &str) {
        let left = self.geometry.margin_left;
        let width = self.geometry.content_width();
        let lines = wrap_text(text, width, BODY_SIZE, false);

        if let Some(label) = label {
            // Keep the label with the first line
            self.check_page_break(LINE_HEIGHT * 2.0);
            let y = self.state.cursor_y + BODY_SIZE;
            self.text(left, y, BODY_SIZE, true, Color::TEXT, truncate_to_width(label, width, BODY_SIZE, true));
            self.add_spacing(LINE_HEIGHT);
        }

        for line in lines {
            self.check_page_break(LINE_HEIGHT);
            let y = self.state.cursor_y + BODY_SIZE;
            self.text(left, y, BODY_SIZE, false, Color::TEXT, line);
            self.add_spacing(LINE_HEIGHT);
        }

        self.add_spacing(BLOCK_GAP / 2.0);
    }

    /// One line of small muted text.
    pub fn add_note(&mut self, text: &str) {
        self.check_page_break(LINE_HEIGHT);
        let left = self.geometry.margin_left;
        let text = truncate_to_width(text, self.geometry.content_width(), NOTE_SIZE, false);
        let y = self.state.cursor_y + NOTE_SIZE;
        self.text(left, y, NOTE_SIZE, false, Color::MUTED, text);
        self.add_spacing(LINE_HEIGHT);
    }

    /// Tabular data with a styled header row and alternating row shading.
    ///
    /// Cell text that does not fit its column is truncated with an
    /// ellipsis. Rows are never split; when the table continues on a new
    /// page the header row is drawn again first.
    pub fn add_data_table(&mut self, headers: &[String], rows: &[Vec<String>], widths: &ColumnWidths) {
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0).max(headers.len());
        if columns == 0 {
            return;
        }
        let widths = widths.resolve(columns, self.geometry.content_width());

        let first_row = if rows.is_empty() { 0.0 } else { TABLE_ROW_HEIGHT };
        self.check_page_break(TABLE_HEADER_HEIGHT + first_row);
        self.draw_table_header(headers, &widths);

        for (i, row) in rows.iter().enumerate() {
            if self.check_page_break(TABLE_ROW_HEIGHT) {
                self.draw_table_header(headers, &widths);
            }

            let top = self.state.cursor_y;
            let left = self.geometry.margin_left;
            let table_width: f32 = widths.iter().sum();
            if i % 2 == 1 {
                self.push(DrawOp::Rect {
                    x: left,
                    y: top,
                    width: table_width,
                    height: TABLE_ROW_HEIGHT,
                    fill: Some(Color::SHADE),
                    stroke: None,
                });
            }
            self.draw_cells(row, &widths, top, TABLE_ROW_HEIGHT, false, Color::TEXT);
            let bottom = top + TABLE_ROW_HEIGHT;
            self.push(DrawOp::Line { x1: left, y1: bottom, x2: left + table_width, y2: bottom, color: Color::RULE, width: 0.5 });

            self.add_spacing(TABLE_ROW_HEIGHT);
        }

        self.add_spacing(BLOCK_GAP);
    }

    fn draw_table_header(&mut self, headers: &[String], widths: &[f32]) {
        let top = self.state.cursor_y;
        let table_width: f32 = widths.iter().sum();
        self.push(DrawOp::Rect {
            x: self.geometry.margin_left,
            y: top,
            width: table_width,
            height: TABLE_HEADER_HEIGHT,
            fill: Some(Color::ACCENT),
            stroke: None,
        });
        self.draw_cells(headers, widths, top, TABLE_HEADER_HEIGHT, true, Color::WHITE);
        self.add_spacing(TABLE_HEADER_HEIGHT);
    }

    fn draw_cells(&mut self, cells: &[String], widths: &[f32], top: f32, band: f32, bold: bool, color: Color) {
        let baseline = Self::baseline(top, band, BODY_SIZE);
        let mut x = self.geometry.margin_left;
        for (i, width) in widths.iter().enumerate() {
            let room = width - 2.0 * CELL_PADDING;
            if room > 0.0
                && let Some(cell) = cells.get(i)
            {
                let text = truncate_to_width(cell, room, BODY_SIZE, bold);
                self.text(x + CELL_PADDING, baseline, BODY_SIZE, bold, color, text);
            }
            x += width;
        }
    }

    /// Images in a grid of `per_row` columns.
    ///
    /// Each image is scaled to fit its cell keeping its aspect ratio.
    /// A grid row is placed as a unit, so a page break always starts a
    /// fresh row. Captions (placeholders carry one) go beneath the image.
    pub fn add_image_grid(&mut self, images: Vec<ResolvedImage>, per_row: usize) {
        let per_row = per_row.max(1);
        let mut row = Vec::with_capacity(per_row);
        for image in images {
            row.push(image);
            if row.len() == per_row {
                self.place_image_row(std::mem::take(&mut row), per_row);
            }
        }
        if !row.is_empty() {
            self.place_image_row(row, per_row);
        }
    }

    fn image_cell(&self, per_row: usize) -> (f32, f32) {
        let per_row = per_row.max(1);
        let gap_total = IMAGE_GAP * (per_row - 1) as f32;
        let cell_width = (self.geometry.content_width() - gap_total) / per_row as f32;
        let box_height = (cell_width * 0.75).min(self.geometry.printable_height() - CAPTION_HEIGHT);
        (cell_width, box_height)
    }

    /// Height of one image grid row including its caption band.
    pub fn image_row_height(&self, per_row: usize) -> f32 {
        self.image_cell(per_row).1 + CAPTION_HEIGHT
    }

    fn place_image_row(&mut self, row: Vec<ResolvedImage>, per_row: usize) {
        let (cell_width, box_height) = self.image_cell(per_row);
        let row_height = box_height + CAPTION_HEIGHT;

        self.check_page_break(row_height);
        let top = self.state.cursor_y;

        for (col, image) in row.into_iter().enumerate() {
            let x0 = self.geometry.margin_left + col as f32 * (cell_width + IMAGE_GAP);

            let (w, h) = (image.width.max(1) as f32, image.height.max(1) as f32);
            let scale = (cell_width / w).min(box_height / h);
            let (draw_w, draw_h) = (w * scale, h * scale);
            let x = x0 + (cell_width - draw_w) / 2.0;
            let y = top + (box_height - draw_h) / 2.0;

            let caption = image.caption.clone();
            let index = self.images.len();
            self.images.push(image);
            self.push(DrawOp::Image { x, y, width: draw_w, height: draw_h, image: index });
            self.push(DrawOp::Rect { x: x0, y: top, width: cell_width, height: box_height, fill: None, stroke: Some(Color::RULE) });

            if let Some(caption) = caption {
                let text = truncate_to_width(&caption, cell_width, NOTE_SIZE, false);
                self.text(x0, top + box_height + NOTE_SIZE + 3.0, NOTE_SIZE, false, Color::MUTED, text);
            }
        }

        self.add_spacing(row_height + IMAGE_GAP);
    }

    /// Finish layout and run the footer pass.
    ///
    /// Trailing empty pages are dropped, then every page gets the
    /// generation timestamp and "Page i of N".
    pub fn finish(mut self, generated_at: DateTime<Local>) -> ReportDocument {
        while self.pages.len() > 1 && self.pages.last().map(Page::is_empty).unwrap_or(false) {
            self.pages.pop();
        }

        let total = self.pages.len();
        let geometry = self.geometry;
        let stamp = format!("Generated {}", generated_at.format("%Y-%m-%d %H:%M"));
        let rule_y = geometry.printable_bottom() + 6.0;
        let baseline = geometry.height - geometry.margin_bottom;
        let left = geometry.margin_left;
        let right = geometry.content_right();

        for (i, page) in self.pages.iter_mut().enumerate() {
            let number = format!("Page {} of {}", i + 1, total);
            let number_width = text_width(&number, FOOTER_SIZE, false);
            let title_room = geometry.content_width() / 3.0;
            let title = truncate_to_width(&self.title, title_room, FOOTER_SIZE, false);
            let title_x = left + (geometry.content_width() - text_width(&title, FOOTER_SIZE, false)) / 2.0;

            page.ops.push(DrawOp::Line { x1: left, y1: rule_y, x2: right, y2: rule_y, color: Color::RULE, width: 0.5 });
            page.ops.push(DrawOp::Text { x: left, y: baseline, size: FOOTER_SIZE, bold: false, color: Color::MUTED, text: stamp.clone() });
            if !title.is_empty() {
                page.ops.push(DrawOp::Text { x: title_x, y: baseline, size: FOOTER_SIZE, bold: false, color: Color::MUTED, text: title });
            }
            page.ops.push(DrawOp::Text {
                x: right - number_width,
                y: baseline,
                size: FOOTER_SIZE,
                bold: false,
                color: Color::MUTED,
                text: number,
            });
        }

        info!("laid out {} pages with {} images", total, self.images.len());

        ReportDocument { title: self.title, geometry, pages: self.pages, images: self.images, generated_at }
    }
}

#[cfg(test)]
#[path = "layout_test.rs"]
mod layout_test;
