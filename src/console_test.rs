/// Tests for console formatting module
///
/// Output is rendered into a byte buffer without colors so the exact text
/// can be compared.

#[cfg(test)]
mod tests {
    use crate::console::*;
    use chrono::Local;
    use cspace_report::images::LoadSummary;
    use cspace_report::report::{EntrySummary, ReportMode, ReportOutput, SummaryRow};
    use std::path::Path;

    const TEST_CONSOLE_WIDTH: usize = 120;

    fn entry(position: usize, space: &str, count: usize, hazard: bool, images: (usize, usize)) -> EntrySummary {
        EntrySummary {
            position,
            building: "B".to_string(),
            location: "L".to_string(),
            space: space.to_string(),
            work_order_ids: format!("WO-{}", position),
            original_entry_count: count,
            original_indexes: Vec::new(),
            has_hazard: hazard,
            images: LoadSummary { loaded: images.0, total: images.1 },
        }
    }

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut TableWriter<Vec<u8>>) -> std::io::Result<()>,
    {
        let mut writer = TableWriter::new(Vec::new(), false, TableWidths::new(TEST_CONSOLE_WIDTH));
        f(&mut writer).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn test_display_width_unicode() {
        assert_eq!(display_width("hello"), 5);
        assert_eq!(display_width("│"), 1);
        assert_eq!(display_width("日本"), 4);
    }

    #[test]
    fn test_truncate_with_padding() {
        assert_eq!(truncate_with_padding("hello", 5), "hello");
        assert_eq!(truncate_with_padding("hi", 5), "hi   ");
        assert_eq!(truncate_with_padding("hello world", 8), "hello...");
        assert_eq!(display_width(&truncate_with_padding("Tank 日本語 north", 10)), 10);
    }

    #[test]
    fn test_widths_fill_terminal() {
        let w = TableWidths::new(TEST_CONSOLE_WIDTH);
        assert_eq!(w.total(), TEST_CONSOLE_WIDTH);

        // Narrow terminals keep a usable minimum instead of collapsing
        let narrow = TableWidths::new(40);
        assert!(narrow.building >= 9);
        assert!(narrow.total() > 40);
    }

    #[test]
    fn test_entry_table_rows_align() {
        let out = render(|w| {
            w.write_entry_table(&[
                entry(1, "Tank 1", 3, true, (2, 3)),
                entry(2, "A very long confined space description that will not fit", 1, false, (0, 0)),
            ])
        });

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with('┌'));
        assert!(lines[1].contains("Building"));
        assert!(lines[3].contains("Tank 1"));
        assert!(lines[3].contains("2/3"));
        assert!(lines[3].contains("YES"));
        assert!(lines[4].contains("..."));
        assert!(lines[5].starts_with('└'));
        for line in &lines {
            assert_eq!(display_width(line), TEST_CONSOLE_WIDTH, "misaligned: {}", line);
        }
    }

    #[test]
    fn test_summary_rows_block() {
        let rows = vec![
            SummaryRow { group: "Open".to_string(), work_orders: 3, with_hazards: 1 },
            SummaryRow { group: "Closed".to_string(), work_orders: 1, with_hazards: 0 },
        ];
        let out = render(|w| w.write_summary_rows("Status", &rows));

        assert!(out.contains("Work Orders"));
        assert!(out.contains("75.0%"));
        assert!(out.contains("25.0%"));
    }

    #[test]
    fn test_summary_block() {
        let output = ReportOutput {
            mode: ReportMode::Consolidated,
            title: "T".to_string(),
            generated_at: Local::now(),
            record_count: 5,
            page_count: 4,
            entries: vec![entry(1, "Tank 1", 3, true, (2, 3)), entry(2, "Vault", 1, false, (1, 1))],
            summary_rows: Vec::new(),
            pdf: Vec::new(),
        };
        let out = render(|w| w.write_summary_block(&output, Path::new("out/report.pdf")));

        assert!(out.contains("=== Summary ==="));
        assert!(out.contains("Records:         5"));
        assert!(out.contains("Merged entries:  1"));
        assert!(out.contains("3 of 4 images loaded"));
        assert!(out.contains("out/report.pdf"));
        assert!(!out.contains("Groups:"));
    }
}
