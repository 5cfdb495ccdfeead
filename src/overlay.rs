//! Overlay Writer (spec §4.6). Builds, per page, a content stream that paints a
//! white rectangle and draws the recognised glyph for each box, then appends it
//! to the page's `Contents` (widening a single stream to an array when needed)
//! and registers the Type 3 font in the page's `/Resources./Font`. Generalised
//! from `pdf.rs::PdfPage`/`PdfResources`'s "build a fresh document" idiom into
//! "mutate an existing `lopdf::Document`", per spec §9's object-graph note.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Object, ObjectId};

use crate::ocr::CharBox;
use crate::raster::PageFrame;
use crate::type3_font::char_code;
use crate::vectorizer::VectorGlyph;

pub const FONT_RESOURCE_NAME: &str = "VF1";

/// Builds the overlay content-stream bytes for one page, skipping boxes whose
/// codepoint is absent from the font map or whose box is degenerate
/// (`w_pt <= 0 || h_pt <= 0`). Returns `None` if no box survives — the page
/// then contributes no overlay and no font-resource registration (§8's
/// "zero boxes" boundary behaviour).
pub fn build_page_stream(
    page: &PageFrame,
    boxes: &[CharBox],
    glyphs: &BTreeMap<char, VectorGlyph>,
) -> Option<Vec<u8>> {
    let mut body = String::new();
    let mut emitted_any = false;

    for char_box in boxes {
        if !glyphs.contains_key(&char_box.codepoint) {
            continue;
        }

        let x_pt = page.px_to_pt(char_box.x1 as f32);
        let y2_pt = page.px_to_pt(char_box.y2 as f32);
        let y_pt = page.height_pt - y2_pt;
        let w_pt = page.px_to_pt(char_box.width() as f32);
        let h_pt = page.px_to_pt(char_box.height() as f32);

        if w_pt <= 0.0 || h_pt <= 0.0 {
            continue;
        }

        body.push_str(&format!("1 g  {x_pt:.4} {y_pt:.4} {w_pt:.4} {h_pt:.4} re f\n"));

        let code = char_code(char_box.codepoint);
        let escaped = escape_octal(code);
        body.push_str(&format!(
            "0 g  BT  /{FONT_RESOURCE_NAME} {h_pt:.4} Tf  1 0 0 1 {x_pt:.4} {y_pt:.4} Tm  ({escaped}) Tj  ET\n"
        ));

        emitted_any = true;
    }

    if !emitted_any {
        return None;
    }

    let mut stream = String::from("q\n");
    stream.push_str(&body);
    stream.push('Q');
    Some(stream.into_bytes())
}

/// A byte's `\NNN` octal escape as a PDF string-literal body — safe for any
/// byte including parentheses and backslash (§4.6).
fn escape_octal(byte: u8) -> String {
    format!("\\{byte:03o}")
}

/// Appends `stream_id` to `page_dict`'s `Contents`, widening a single stream
/// reference to an array when necessary (§9's Contents-may-be-single-or-array
/// branch).
pub fn append_content_stream(page_dict: &mut Dictionary, stream_id: ObjectId) {
    let existing = page_dict.get(b"Contents").cloned();
    let widened = match existing {
        None | Some(Object::Null) => Object::Array(vec![Object::Reference(stream_id)]),
        Some(Object::Array(mut contents)) => {
            contents.push(Object::Reference(stream_id));
            Object::Array(contents)
        }
        Some(single) => Object::Array(vec![single, Object::Reference(stream_id)]),
    };
    page_dict.set("Contents", widened);
}

/// Registers the Type 3 font under `/Resources./Font./VF1`, creating the
/// `Resources`/`Font` sub-dictionaries if they are absent.
pub fn register_font_resource(page_dict: &mut Dictionary, font_id: ObjectId) {
    let mut resources = match page_dict.get(b"Resources") {
        Ok(Object::Dictionary(dictionary)) => dictionary.clone(),
        _ => Dictionary::new(),
    };
    let mut fonts = match resources.get(b"Font") {
        Ok(Object::Dictionary(dictionary)) => dictionary.clone(),
        _ => Dictionary::new(),
    };
    fonts.set(FONT_RESOURCE_NAME, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));
    page_dict.set("Resources", Object::Dictionary(resources));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> PageFrame {
        PageFrame {
            page_index: 0,
            width_px: 2550,
            height_px: 3300,
            width_pt: 612.0,
            height_pt: 792.0,
            dpi: 300.0,
            luminance: Vec::new(),
        }
    }

    fn box_at(codepoint: char, x1: u32, y1: u32, x2: u32, y2: u32) -> CharBox {
        CharBox { codepoint, x1, x2, y1, y2, page_index: 0, confidence: None }
    }

    fn sample_glyphs() -> BTreeMap<char, VectorGlyph> {
        let mut glyphs = BTreeMap::new();
        glyphs.insert('H', VectorGlyph { advance_width: 600.0, path_ops: "f".to_string() });
        glyphs.insert('i', VectorGlyph { advance_width: 240.0, path_ops: "f".to_string() });
        glyphs
    }

    #[test]
    fn hi_scenario_produces_two_rects_and_two_text_draws_at_14_4_size() {
        let frame = page();
        let boxes = vec![
            box_at('H', 100, 100, 140, 160),
            box_at('i', 150, 100, 160, 160),
        ];
        let stream = build_page_stream(&frame, &boxes, &sample_glyphs()).unwrap();
        let text = String::from_utf8(stream).unwrap();
        assert!(text.starts_with("q\n"));
        assert!(text.trim_end().ends_with('Q'));
        assert_eq!(text.matches("re f").count(), 2);
        assert_eq!(text.matches("BT").count(), 2);
        assert_eq!(text.matches("ET").count(), 2);
        assert!(text.contains("14.4000 Tf"));
        // x_pt = 100 * 72/300 = 24.0, w_pt = 40 * 72/300 = 9.6
        assert!(text.contains("24.0000"));
        assert!(text.contains("9.6000"));
    }

    #[test]
    fn boxes_absent_from_font_map_are_skipped() {
        let frame = page();
        let boxes = vec![box_at('Z', 0, 0, 10, 10)];
        assert!(build_page_stream(&frame, &boxes, &sample_glyphs()).is_none());
    }

    #[test]
    fn zero_boxes_yields_no_overlay() {
        let frame = page();
        assert!(build_page_stream(&frame, &[], &sample_glyphs()).is_none());
    }

    #[test]
    fn append_content_stream_widens_null_and_single_and_array() {
        let mut dict = Dictionary::new();
        append_content_stream(&mut dict, (1, 0));
        assert!(matches!(dict.get(b"Contents"), Ok(Object::Array(a)) if a.len() == 1));

        let mut single = Dictionary::new();
        single.set("Contents", Object::Reference((2, 0)));
        append_content_stream(&mut single, (3, 0));
        assert!(matches!(single.get(b"Contents"), Ok(Object::Array(a)) if a.len() == 2));
    }

    #[test]
    fn escape_octal_formats_three_digit_octal() {
        assert_eq!(escape_octal(b'('), "\\050");
        assert_eq!(escape_octal(72), "\\110");
    }
}
