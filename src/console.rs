/// Console formatting module - Pure rendering concerns
///
/// This module handles all console output after a report is written:
/// - Entry table layout and borders
/// - Color terminal output for hazard and image-failure rows
/// - Text truncation and padding
/// - The closing summary block
///
/// Output goes through `TableWriter`, which accepts any `std::io::Write`
/// destination so the exact text can be tested.
use cspace_report::images::LoadSummary;
use cspace_report::report::{EntrySummary, ReportOutput, SummaryRow};
use std::io::{self, Write};
use std::path::Path;
use std::sync::OnceLock;
use term::color::Color;
use terminal_size::{Width, terminal_size};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Writer for table output - configurable for color/plain text
pub struct TableWriter<W: Write> {
    writer: W,
    use_colors: bool,
    widths: TableWidths,
}

impl<W: Write> TableWriter<W> {
    pub fn new(writer: W, use_colors: bool, widths: TableWidths) -> Self {
        Self { writer, use_colors, widths }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Write formatted text, optionally with color
    fn write_colored(&mut self, text: &str, color: Color) -> io::Result<()> {
        if self.use_colors {
            if let Some(ref mut t) = term::stdout() {
                let _ = t.fg(color);
                let _ = t.write_all(text.as_bytes());
                let _ = t.reset();
                Ok(())
            } else {
                write!(self.writer, "{}", text)
            }
        } else {
            write!(self.writer, "{}", text)
        }
    }

    fn border(&mut self, left: char, mid: char, right: char) -> io::Result<()> {
        let cols: Vec<String> = self.widths.columns().iter().map(|w| "─".repeat(*w)).collect();
        writeln!(self.writer, "{}{}{}", left, cols.join(&mid.to_string()), right)
    }

    fn row(&mut self, cells: [&str; 7], color: Option<Color>) -> io::Result<()> {
        let displays: Vec<String> = cells
            .iter()
            .zip(self.widths.columns().iter())
            .map(|(cell, width)| truncate_with_padding(cell, width.saturating_sub(2)))
            .collect();
        let row = format!("│ {} │", displays.join(" │ "));
        match color {
            Some(c) => self.write_colored(&row, c)?,
            None => write!(self.writer, "{}", row)?,
        }
        writeln!(self.writer)
    }

    /// Write the bordered entries table
    pub fn write_entry_table(&mut self, entries: &[EntrySummary]) -> io::Result<()> {
        self.border('┌', '┬', '┐')?;
        self.row(["#", "Building", "Location", "Space", "Records", "Images", "Hazard"], None)?;
        self.border('├', '┼', '┤')?;

        for entry in entries {
            let position = entry.position.to_string();
            let records = entry.original_entry_count.to_string();
            let images = if entry.images.total == 0 {
                "-".to_string()
            } else {
                format!("{}/{}", entry.images.loaded, entry.images.total)
            };
            let hazard = if entry.has_hazard { "YES" } else { "no" };

            let color = if entry.has_hazard {
                Some(term::color::BRIGHT_RED)
            } else if entry.images.failed() > 0 {
                Some(term::color::BRIGHT_YELLOW)
            } else {
                None
            };
            self.row(
                [&position, &entry.building, &entry.location, &entry.space, &records, &images, hazard],
                color,
            )?;
        }

        self.border('└', '┴', '┘')
    }

    /// Write the grouped counts of a summary report
    pub fn write_summary_rows(&mut self, label: &str, rows: &[SummaryRow]) -> io::Result<()> {
        let total: usize = rows.iter().map(|r| r.work_orders).sum();
        let width = rows.iter().map(|r| display_width(&r.group)).max().unwrap_or(0).max(display_width(label)).max(5);

        writeln!(self.writer, "{}  {:>11}  {:>12}  {:>6}", truncate_with_padding(label, width), "Work Orders", "With Hazards", "Share")?;
        writeln!(self.writer, "{}", "━".repeat(width + 37))?;
        for row in rows {
            writeln!(
                self.writer,
                "{}  {:>11}  {:>12}  {:>5.1}%",
                truncate_with_padding(&row.group, width),
                row.work_orders,
                row.with_hazards,
                row.share(total)
            )?;
        }
        writeln!(self.writer, "{}", "━".repeat(width + 37))
    }

    /// Write the closing `=== Summary ===` block
    pub fn write_summary_block(&mut self, output: &ReportOutput, path: &Path) -> io::Result<()> {
        let images: LoadSummary = output.images();

        writeln!(self.writer)?;
        writeln!(self.writer, "=== Summary ===")?;
        writeln!(self.writer, "Mode:            {}", output.mode)?;
        writeln!(self.writer, "Records:         {}", output.record_count)?;
        if !output.entries.is_empty() {
            writeln!(self.writer, "Entries:         {}", output.entries.len())?;
            writeln!(self.writer, "Merged entries:  {}", output.merged_entries())?;
            writeln!(self.writer, "Images:          {}", images.describe())?;
        }
        if !output.summary_rows.is_empty() {
            writeln!(self.writer, "Groups:          {}", output.summary_rows.len())?;
        }
        writeln!(self.writer, "Pages:           {}", output.page_count)?;
        writeln!(self.writer, "Output:          {}", path.display())?;
        writeln!(self.writer)
    }
}

//
// Table Layout and Widths
//

/// Column widths for the 7-column entry table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableWidths {
    pub position: usize,
    pub building: usize,
    pub location: usize,
    pub space: usize,
    pub records: usize,
    pub images: usize,
    pub hazard: usize,
}

impl TableWidths {
    pub fn new(terminal_width: usize) -> Self {
        // Borders: │ = 8 characters (1 before each column + 1 at end)
        let borders = 8;
        let available = terminal_width.saturating_sub(borders);

        let position = 5;
        let records = 9;
        let images = 9;
        let hazard = 8;

        // Text columns share the rest: building 1/4, location 3/8, space 3/8
        let fixed_total = position + records + images + hazard;
        let flexible = if available > fixed_total + 36 { available - fixed_total } else { 36 };
        let building = flexible / 4;
        let location = flexible * 3 / 8;
        let space = flexible - building - location;

        TableWidths { position, building, location, space, records, images, hazard }
    }

    fn columns(&self) -> [usize; 7] {
        [self.position, self.building, self.location, self.space, self.records, self.images, self.hazard]
    }

    /// Total table width including borders
    pub fn total(&self) -> usize {
        self.columns().iter().sum::<usize>() + 8
    }
}

/// Get terminal width or default to 120
fn get_terminal_width() -> usize {
    if let Some((Width(w), _)) = terminal_size() {
        w as usize
    } else {
        120 // Default width
    }
}

static CONSOLE_WIDTH: OnceLock<usize> = OnceLock::new();

/// Override the detected terminal width
pub fn set_console_width(width: usize) {
    let _ = CONSOLE_WIDTH.set(width); // Ignore error if already initialized
}

/// Table widths for the current console
pub fn get_widths() -> TableWidths {
    TableWidths::new(*CONSOLE_WIDTH.get_or_init(get_terminal_width))
}

//
// Text Formatting Utilities
//

/// Count the display width of a string, accounting for wide Unicode characters
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Truncate and pad string to exact width
pub fn truncate_with_padding(s: &str, width: usize) -> String {
    let display_w = display_width(s);

    if display_w > width {
        let mut result = String::new();
        let mut current_width = 0;

        // Reserve space for "..."
        let target_width = if width >= 3 { width - 3 } else { width };

        for c in s.chars() {
            let c_width = UnicodeWidthChar::width(c).unwrap_or(1);

            if current_width + c_width > target_width {
                break;
            }

            result.push(c);
            current_width += c_width;
        }

        if width >= 3 {
            result.push_str("...");
            current_width += 3;
        }

        if current_width < width {
            result.push_str(&" ".repeat(width - current_width));
        }

        result
    } else {
        let padding = width - display_w;
        format!("{}{}", s, " ".repeat(padding))
    }
}

//
// Stdout helpers
//

/// Print the entries table to stdout with colors
pub fn print_entry_table(entries: &[EntrySummary]) {
    let mut writer = TableWriter::new(io::stdout(), true, get_widths());
    let _ = writer.write_entry_table(entries);
}

/// Print grouped counts to stdout
pub fn print_summary_rows(label: &str, rows: &[SummaryRow]) {
    let mut writer = TableWriter::new(io::stdout(), false, get_widths());
    let _ = writer.write_summary_rows(label, rows);
}

/// Print the `=== Summary ===` block to stdout
pub fn print_summary_block(output: &ReportOutput, path: &Path) {
    let mut writer = TableWriter::new(io::stdout(), false, get_widths());
    let _ = writer.write_summary_block(output, path);
}

#[cfg(test)]
#[path = "console_test.rs"]
mod console_test;
