/// PDF serialisation of a laid-out [`ReportDocument`]
///
/// This module handles:
/// - Translating display-list operations into content streams
/// - Embedding RGB images as Flate-compressed XObjects
/// - The standard Helvetica fonts with WinAnsi encoding
/// - Document info (title, producer, creation date)

use crate::error::ReportError;
use crate::layout::{Color, DrawOp, ReportDocument};
use chrono::{Datelike, Timelike};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use log::debug;
use pdf_writer::{Content, Date, Filter, Name, Pdf, Rect, Ref, Str, TextStr};
use std::io::Write;

const PRODUCER: &str = concat!("cspace-report ", env!("CARGO_PKG_VERSION"));

const FONT_REGULAR: &[u8] = b"F1";
const FONT_BOLD: &[u8] = b"F2";

/// Encode text as WinAnsi bytes; unmappable characters become `?`.
pub fn winansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            code @ (0x20..=0x7E | 0xA0..=0xFF) => code as u8,
            _ => match c {
                '€' => 0x80,
                '‚' => 0x82,
                'ƒ' => 0x83,
                '„' => 0x84,
                '…' => 0x85,
                '†' => 0x86,
                '‡' => 0x87,
                'ˆ' => 0x88,
                '‰' => 0x89,
                'Š' => 0x8A,
                '‹' => 0x8B,
                'Œ' => 0x8C,
                'Ž' => 0x8E,
                '‘' => 0x91,
                '’' => 0x92,
                '“' => 0x93,
                '”' => 0x94,
                '•' => 0x95,
                '–' => 0x96,
                '—' => 0x97,
                '˜' => 0x98,
                '™' => 0x99,
                'š' => 0x9A,
                '›' => 0x9B,
                'œ' => 0x9C,
                'ž' => 0x9E,
                'Ÿ' => 0x9F,
                _ => b'?',
            },
        })
        .collect()
}

fn compress(data: &[u8]) -> Result<Vec<u8>, ReportError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| ReportError::Rendering(format!("Failed to compress PDF stream: {}", e)))
}

fn set_fill(content: &mut Content, color: Color) {
    let (r, g, b) = color.unit();
    content.set_fill_rgb(r, g, b);
}

fn set_stroke(content: &mut Content, color: Color) {
    let (r, g, b) = color.unit();
    content.set_stroke_rgb(r, g, b);
}

/// Content stream for one page. `page_height` flips y to PDF's bottom-up space.
fn page_content(ops: &[DrawOp], page_height: f32, image_names: &[String]) -> Vec<u8> {
    let mut content = Content::new();

    for op in ops {
        match op {
            DrawOp::Text { x, y, size, bold, color, text } => {
                let font = if *bold { FONT_BOLD } else { FONT_REGULAR };
                set_fill(&mut content, *color);
                content.begin_text();
                content.set_font(Name(font), *size);
                content.next_line(*x, page_height - y);
                content.show(Str(&winansi(text)));
                content.end_text();
            }
            DrawOp::Rect { x, y, width, height, fill, stroke } => {
                content.rect(*x, page_height - y - height, *width, *height);
                match (fill, stroke) {
                    (Some(f), Some(s)) => {
                        set_fill(&mut content, *f);
                        set_stroke(&mut content, *s);
                        content.set_line_width(0.5);
                        content.fill_nonzero_and_stroke();
                    }
                    (Some(f), None) => {
                        set_fill(&mut content, *f);
                        content.fill_nonzero();
                    }
                    (None, Some(s)) => {
                        set_stroke(&mut content, *s);
                        content.set_line_width(0.5);
                        content.stroke();
                    }
                    (None, None) => {
                        content.end_path();
                    }
                }
            }
            DrawOp::Line { x1, y1, x2, y2, color, width } => {
                set_stroke(&mut content, *color);
                content.set_line_width(*width);
                content.move_to(*x1, page_height - y1);
                content.line_to(*x2, page_height - y2);
                content.stroke();
            }
            DrawOp::Image { x, y, width, height, image } => {
                let Some(name) = image_names.get(*image) else {
                    continue;
                };
                content.save_state();
                content.transform([*width, 0.0, 0.0, *height, *x, page_height - y - height]);
                content.x_object(Name(name.as_bytes()));
                content.restore_state();
            }
        }
    }

    content.finish().to_vec()
}

fn info_date(doc: &ReportDocument) -> Date {
    let t = doc.generated_at;
    Date::new(t.year().clamp(0, 9999) as u16)
        .month(t.month() as u8)
        .day(t.day() as u8)
        .hour(t.hour() as u8)
        .minute(t.minute() as u8)
        .second(t.second() as u8)
}

/// Serialise a document to PDF bytes.
pub fn render(doc: &ReportDocument) -> Result<Vec<u8>, ReportError> {
    let mut pdf = Pdf::new();
    let mut next_id = 1;
    let mut alloc = || {
        let id = Ref::new(next_id);
        next_id += 1;
        id
    };

    let catalog_id = alloc();
    let pages_id = alloc();
    let regular_id = alloc();
    let bold_id = alloc();
    let info_id = alloc();

    pdf.type1_font(regular_id).base_font(Name(b"Helvetica")).encoding_predefined(Name(b"WinAnsiEncoding"));
    pdf.type1_font(bold_id).base_font(Name(b"Helvetica-Bold")).encoding_predefined(Name(b"WinAnsiEncoding"));

    let mut image_refs: Vec<(String, Ref)> = Vec::with_capacity(doc.images.len());
    for (i, image) in doc.images.iter().enumerate() {
        let id = alloc();
        let compressed = compress(&image.rgb)?;
        let mut xobj = pdf.image_xobject(id, &compressed);
        xobj.filter(Filter::FlateDecode);
        xobj.width(image.width as i32);
        xobj.height(image.height as i32);
        xobj.color_space().device_rgb();
        xobj.bits_per_component(8);
        image_refs.push((format!("Im{}", i + 1), id));
    }
    let image_names: Vec<String> = image_refs.iter().map(|(name, _)| name.clone()).collect();

    let page_height = doc.geometry.height;
    let mut page_ids = Vec::with_capacity(doc.pages.len());
    for page in &doc.pages {
        let page_id = alloc();
        let content_id = alloc();
        let raw = page_content(&page.ops, page_height, &image_names);
        pdf.stream(content_id, &compress(&raw)?).filter(Filter::FlateDecode);

        let mut page_writer = pdf.page(page_id);
        page_writer
            .media_box(Rect::new(0.0, 0.0, doc.geometry.width, page_height))
            .parent(pages_id)
            .contents(content_id);
        {
            let mut resources = page_writer.resources();
            resources.fonts().pair(Name(FONT_REGULAR), regular_id).pair(Name(FONT_BOLD), bold_id);
            if !image_refs.is_empty() {
                let mut xobjects = resources.x_objects();
                for (name, id) in &image_refs {
                    xobjects.pair(Name(name.as_bytes()), *id);
                }
            }
        }
        drop(page_writer);
        page_ids.push(page_id);
    }

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id).kids(page_ids.iter().copied()).count(page_ids.len() as i32);
    pdf.document_info(info_id)
        .title(TextStr(&doc.title))
        .producer(TextStr(PRODUCER))
        .creation_date(info_date(doc));

    let bytes = pdf.finish();
    debug!("serialised {} pages, {} images, {} bytes", doc.pages.len(), doc.images.len(), bytes.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::placeholder;
    use crate::layout::DocumentBuilder;
    use crate::layout::builder::KV_ROW_HEIGHT;
    use chrono::Local;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_winansi_mapping() {
        assert_eq!(winansi("A-z"), b"A-z".to_vec());
        assert_eq!(winansi("café"), vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(winansi("“ok”—€"), vec![0x93, b'o', b'k', 0x94, 0x97, 0x80]);
        assert_eq!(winansi("✓"), b"?".to_vec());
    }

    #[test]
    fn test_render_produces_pdf() {
        let mut builder = DocumentBuilder::new("Work Orders");
        builder.add_section_header("Location", KV_ROW_HEIGHT);
        builder.add_key_value_table(&[("Building".to_string(), "A".to_string())]);
        builder.add_image_grid(vec![placeholder::generate("offline")], 2);
        builder.start_new_page();
        builder.add_note("second page");
        let doc = builder.finish(Local::now());

        let bytes = render(&doc).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        assert!(contains(&bytes, b"%%EOF"));
        assert!(contains(&bytes, b"/Helvetica-Bold"));
        assert!(contains(&bytes, b"WinAnsiEncoding"));
        assert!(contains(&bytes, b"/Count 2"));
        assert!(contains(&bytes, b"/Im1"));
    }
}
