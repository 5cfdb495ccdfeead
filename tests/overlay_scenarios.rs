//! End-to-end scenario tests from spec §8, exercised over the public
//! `aggregator`/`vectorizer`/`type3_font`/`overlay` surface without needing a
//! live PDF/Tesseract/tracer installation — the scenarios fix their inputs
//! directly at the `CharBox`/`VectorGlyph` layer, the same boundary the
//! pipeline crosses between OCR and vectorisation.

use std::collections::BTreeMap;

use vectorscan::aggregator::{collect_representatives, pick_representative, GlyphGroup};
use vectorscan::job_store::{optimised_name, safe_filename};
use vectorscan::ocr::CharBox;
use vectorscan::overlay::build_page_stream;
use vectorscan::raster::PageFrame;
use vectorscan::type3_font::assemble;
use vectorscan::vectorizer::VectorGlyph;

fn page_300dpi() -> PageFrame {
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

fn char_box(codepoint: char, x1: u32, y1: u32, x2: u32, y2: u32, page_index: usize) -> CharBox {
    CharBox { codepoint, x1, x2, y1, y2, page_index, confidence: None }
}

/// Scenario 1: single-page scan of "Hi" at 300 DPI.
#[test]
fn scenario_hi_overlay_matches_expected_geometry_and_font() {
    let page = page_300dpi();
    let boxes = vec![
        char_box('H', 100, 100, 140, 160, 0),
        char_box('i', 150, 100, 160, 160, 0),
    ];

    let mut glyphs: BTreeMap<char, VectorGlyph> = BTreeMap::new();
    glyphs.insert('H', VectorGlyph { advance_width: 600.0, path_ops: "0 0 m h f".to_string() });
    glyphs.insert('i', VectorGlyph { advance_width: 240.0, path_ops: "0 0 m h f".to_string() });

    let stream = build_page_stream(&page, &boxes, &glyphs).expect("two boxes should overlay");
    let text = String::from_utf8(stream).unwrap();

    // x_pt = 100*72/300 = 24.0, w_pt = 40*72/300 = 9.6, h_pt = 60*72/300 = 14.4
    assert!(text.contains("24.0000 "));
    assert!(text.contains("9.6000 14.4000 re f"));
    // second box: x1=150 -> 36.0pt, w = 10px -> 2.4pt
    assert!(text.contains("36.0000 "));
    assert!(text.contains("2.4000 14.4000 re f"));
    assert_eq!(text.matches("Tf").count(), 2);
    assert!(text.contains("14.4000 Tf"));

    let font = assemble(&glyphs).unwrap();
    assert_eq!(font.first_char, 72); // 'H'
    assert_eq!(font.last_char, 105); // 'i'
    assert_eq!(font.widths.len(), 34);
    assert!(font.char_procs.contains_key("H"));
    assert!(font.char_procs.contains_key("i"));
}

/// Scenario 2: a born-digital page with zero OCR boxes contributes no overlay.
#[test]
fn scenario_zero_boxes_short_circuits_overlay() {
    let page = page_300dpi();
    let glyphs: BTreeMap<char, VectorGlyph> = BTreeMap::new();
    assert!(build_page_stream(&page, &[], &glyphs).is_none());
}

/// Scenario 3: "A" found on pages 1 and 3 (0-indexed 0 and 2) with areas 1200
/// and 3000; the aggregator must pick the page-index-2 instance.
#[test]
fn scenario_aggregator_picks_larger_area_across_pages() {
    let boxes = vec![
        char_box('A', 0, 0, 40, 30, 0), // area 1200
        char_box('A', 0, 0, 60, 50, 2), // area 3000
    ];
    let representatives = collect_representatives(boxes);
    let representative = representatives.get(&'A').unwrap();
    assert_eq!(representative.page_index, 2);
    assert_eq!(representative.area(), 3000);
    let advance_width = 1000.0 * representative.width() as f64 / representative.height() as f64;
    assert!((advance_width - 1200.0).abs() < 1e-9);
}

/// Scenario 5: a filename containing path separators and spaces is sanitised,
/// and the downloadable name gets the `-optimised.pdf` suffix.
#[test]
fn scenario_weird_filename_is_sanitised_and_suffixed() {
    let sanitised = safe_filename("../weird name.PDF");
    assert_eq!(sanitised, "weird name.PDF");
    assert_eq!(optimised_name("../weird name.PDF"), "weird name-optimised.pdf");
}

#[test]
fn tie_break_prefers_smallest_page_then_y1_then_x1() {
    let group = GlyphGroup {
        instances: vec![
            char_box('A', 5, 5, 15, 15, 1),
            char_box('A', 2, 2, 12, 12, 1),
            char_box('A', 2, 1, 12, 11, 1),
        ],
    };
    let representative = pick_representative(&group).unwrap();
    assert_eq!((representative.y1, representative.x1), (1, 2));
}
