//! Type 3 Font Assembler (spec §4.5). Builds the CharProcs/Encoding/Widths
//! triple from a codepoint→VectorGlyph map. Field shape grounded on
//! `other_examples/bc86c93e_connorskees-pdf__src-font-type3.rs.rs`; object
//! assembly (Dictionary/Stream via indirect references) grounded on
//! `pdf.rs::Font::insert_into_document`.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::{PipelineErrorKind, TraceableError};
use crate::vectorizer::{VectorGlyph, EM};

/// Adobe standard glyph names for printable ASCII, ported verbatim from
/// `type3_font.py::_GLYPH_NAMES`.
const GLYPH_NAMES: &[(char, &str)] = &[
    (' ', "space"),
    ('!', "exclam"),
    ('"', "quotedbl"),
    ('#', "numbersign"),
    ('$', "dollar"),
    ('%', "percent"),
    ('&', "ampersand"),
    ('\'', "quotesingle"),
    ('(', "parenleft"),
    (')', "parenright"),
    ('*', "asterisk"),
    ('+', "plus"),
    (',', "comma"),
    ('-', "hyphen"),
    ('.', "period"),
    ('/', "slash"),
    ('0', "zero"),
    ('1', "one"),
    ('2', "two"),
    ('3', "three"),
    ('4', "four"),
    ('5', "five"),
    ('6', "six"),
    ('7', "seven"),
    ('8', "eight"),
    ('9', "nine"),
    (':', "colon"),
    (';', "semicolon"),
    ('<', "less"),
    ('=', "equal"),
    ('>', "greater"),
    ('?', "question"),
    ('@', "at"),
    ('[', "bracketleft"),
    ('\\', "backslash"),
    (']', "bracketright"),
    ('^', "asciicircum"),
    ('_', "underscore"),
    ('`', "grave"),
    ('{', "braceleft"),
    ('|', "bar"),
    ('}', "braceright"),
    ('~', "asciitilde"),
];

fn standard_name(codepoint: char) -> Option<&'static str> {
    if codepoint.is_ascii_uppercase() || codepoint.is_ascii_lowercase() {
        return None; // handled by the direct-letter fallthrough below
    }
    GLYPH_NAMES.iter().find(|(c, _)| *c == codepoint).map(|(_, name)| *name)
}

/// Printable ASCII uses Adobe standard names; letters map to themselves
/// (`A`, `a`); everything else falls through to `uniXXXX` uppercase hex.
pub fn glyph_name(codepoint: char) -> String {
    if codepoint.is_ascii_alphabetic() {
        return codepoint.to_string();
    }
    if let Some(name) = standard_name(codepoint) {
        return name.to_string();
    }
    format!("uni{:04X}", codepoint as u32)
}

/// `char_code(c) = ord(c)` when `ord(c) ≤ 0xFF`, otherwise `(ord(c) mod 128) + 128`.
pub fn char_code(codepoint: char) -> u8 {
    let value = codepoint as u32;
    if value <= 0xFF {
        value as u8
    } else {
        ((value % 128) + 128) as u8
    }
}

/// Byte-code collisions detected while assigning codes: two distinct codepoints
/// mapping to the same byte. §9's first Open Question: this crate does not
/// split into multiple fonts; it records the collision so tests/callers can
/// detect it, and keeps last-writer-wins on `Differences` (both glyphs still
/// live in CharProcs under distinct names).
#[derive(Debug, Clone)]
pub struct Type3Font {
    pub first_char: u8,
    pub last_char: u8,
    pub widths: Vec<f64>,
    pub char_procs: BTreeMap<String, String>,
    pub differences: Vec<Object>,
    pub collisions: Vec<(char, char)>,
}

/// Assembles a `Type3Font` description from the codepoint→VectorGlyph map.
/// Fails with `VectorisationEmpty` if the map is empty (§4.5's `NoGlyphs`).
pub fn assemble(glyphs: &BTreeMap<char, VectorGlyph>) -> Result<Type3Font, TraceableError> {
    if glyphs.is_empty() {
        return Err(TraceableError::with_context("no glyph was vectorised")
            .with_kind(PipelineErrorKind::VectorisationEmpty));
    }

    // CharProcs holds every codepoint's glyph under its own name, independent
    // of any byte-code collision below: §4.5 requires "both go into CharProcs
    // under distinct glyph names" even when they share a `char_code`.
    let mut char_procs = BTreeMap::new();
    for (&codepoint, glyph) in glyphs {
        char_procs.insert(glyph_name(codepoint), char_proc_stream(glyph));
    }

    // code -> (codepoint, name, VectorGlyph); last-writer-wins per §4.5, with
    // the iteration itself already in Unicode-ascending order (BTreeMap keyset).
    // This resolution governs Widths/Differences only, never CharProcs above.
    let mut by_code: BTreeMap<u8, (char, String, &VectorGlyph)> = BTreeMap::new();
    let mut collisions = Vec::new();
    for (&codepoint, glyph) in glyphs {
        let code = char_code(codepoint);
        let name = glyph_name(codepoint);
        if let Some((previous_codepoint, _, _)) = by_code.get(&code) {
            collisions.push((*previous_codepoint, codepoint));
        }
        by_code.insert(code, (codepoint, name, glyph));
    }

    let first_char = *by_code.keys().next().unwrap();
    let last_char = *by_code.keys().next_back().unwrap();

    let mut widths = Vec::with_capacity(last_char as usize - first_char as usize + 1);
    let mut differences = Vec::new();
    let mut run_open = false;

    for code in first_char..=last_char {
        match by_code.get(&code) {
            Some((_, name, glyph)) => {
                widths.push(glyph.advance_width);
                if !run_open {
                    differences.push(Object::Integer(code as i64));
                    run_open = true;
                }
                differences.push(Object::Name(name.clone().into_bytes()));
            }
            None => {
                widths.push(0.0);
                run_open = false;
            }
        }
    }

    Ok(Type3Font { first_char, last_char, widths, char_procs, differences, collisions })
}

/// The `d1`-headed CharProc body: `<adv> 0 0 0 <adv> <EM> d1\n<path-ops>`.
fn char_proc_stream(glyph: &VectorGlyph) -> String {
    format!("{:.4} 0 0 0 {:.4} {:.1} d1\n{}", glyph.advance_width, glyph.advance_width, EM, glyph.path_ops)
}

/// Inserts the assembled `Type3Font` as an indirect PDF object into `document`,
/// returning its object id for registration in a page's `/Resources./Font`.
/// Object-graph construction follows `pdf.rs`'s "never construct indirect
/// references by hand; go through the document's factory" convention.
pub fn insert_into_document(document: &mut Document, font: &Type3Font) -> ObjectId {
    let mut char_procs_dict = Dictionary::new();
    for (name, body) in &font.char_procs {
        let stream = Stream::new(Dictionary::new(), body.clone().into_bytes()).with_compression(false);
        let stream_id = document.add_object(Object::Stream(stream));
        char_procs_dict.set(name.as_bytes(), Object::Reference(stream_id));
    }
    let char_procs_id = document.add_object(Object::Dictionary(char_procs_dict));

    let widths: Vec<Object> = font.widths.iter().map(|w| Object::Real(*w as f32)).collect();

    let mut font_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type3".to_vec())),
        (
            "FontBBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(EM as i64),
                Object::Integer(EM as i64),
            ]),
        ),
        (
            "FontMatrix",
            Object::Array(vec![
                Object::Real(0.001),
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(0.001),
                Object::Integer(0),
                Object::Integer(0),
            ]),
        ),
        ("FirstChar", Object::Integer(font.first_char as i64)),
        ("LastChar", Object::Integer(font.last_char as i64)),
        ("Widths", Object::Array(widths)),
        ("CharProcs", Object::Reference(char_procs_id)),
        ("Resources", Object::Dictionary(Dictionary::new())),
    ]);

    let encoding_dict = Dictionary::from_iter(vec![(
        "Differences",
        Object::Array(font.differences.clone()),
    )]);
    font_dict.set("Encoding", Object::Dictionary(encoding_dict));

    document.add_object(Object::Dictionary(font_dict))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyph(advance_width: f64) -> VectorGlyph {
        VectorGlyph { advance_width, path_ops: "0.0 0.0 m\n1.0 1.0 l\nh\nf".to_string() }
    }

    #[test]
    fn glyph_name_uses_direct_letters_and_standard_names() {
        assert_eq!(glyph_name('A'), "A");
        assert_eq!(glyph_name(' '), "space");
        assert_eq!(glyph_name('"'), "quotedbl");
        assert_eq!(glyph_name('&'), "ampersand");
    }

    #[test]
    fn glyph_name_falls_back_to_uni_hex_for_non_ascii() {
        assert_eq!(glyph_name('é'), "uni00E9");
    }

    #[test]
    fn char_code_folds_high_codepoints_into_byte_range() {
        assert_eq!(char_code('A'), 65);
        let high = char::from_u32(0x1F600).unwrap();
        assert_eq!(char_code(high), ((0x1F600u32 % 128) + 128) as u8);
    }

    #[test]
    fn hi_scenario_produces_expected_first_last_char_and_width_count() {
        let mut glyphs = BTreeMap::new();
        glyphs.insert('H', glyph(600.0));
        glyphs.insert('i', glyph(240.0));
        let font = assemble(&glyphs).unwrap();
        assert_eq!(font.first_char, 72); // 'H'
        assert_eq!(font.last_char, 105); // 'i'
        assert_eq!(font.widths.len(), 34);
        assert!(font.char_procs.contains_key("H"));
        assert!(font.char_procs.contains_key("i"));
    }

    #[test]
    fn codes_with_no_glyph_get_zero_width_and_absent_from_differences() {
        let mut glyphs = BTreeMap::new();
        glyphs.insert('A', glyph(500.0));
        glyphs.insert('D', glyph(500.0));
        let font = assemble(&glyphs).unwrap();
        // B, C sit between A and D with no glyph.
        assert_eq!(font.widths[1], 0.0);
        assert_eq!(font.widths[2], 0.0);
        let names: Vec<String> = font
            .differences
            .iter()
            .filter_map(|object| match object {
                Object::Name(bytes) => Some(String::from_utf8_lossy(bytes).to_string()),
                _ => None,
            })
            .collect();
        assert!(!names.contains(&"B".to_string()));
    }

    #[test]
    fn empty_glyph_map_fails_with_vectorisation_empty() {
        let glyphs = BTreeMap::new();
        let error = assemble(&glyphs).unwrap_err();
        assert_eq!(error.kind(), Some(PipelineErrorKind::VectorisationEmpty));
    }
}
