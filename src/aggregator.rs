//! Glyph Aggregator (spec §4.3). Partitions boxes from all pages by codepoint
//! and picks the maximal-area representative per codepoint, ties broken by the
//! smallest `(page_index, y1, x1)` tuple. Plain algorithm over the teacher's
//! `Itertools`-flavoured iterator idiom (`layouting.rs`, `main.rs`).

use std::collections::BTreeMap;

use crate::ocr::CharBox;

/// All boxes sharing a codepoint, in extractor insertion order (page-index
/// ascending, then within-page extractor order, per §5's determinism contract).
#[derive(Debug, Clone, Default)]
pub struct GlyphGroup {
    pub instances: Vec<CharBox>,
}

/// Groups boxes by codepoint. A `BTreeMap` keeps the keyset in Unicode-ascending
/// order for free, matching §5's "codepoints in Unicode ascending order when
/// building Widths/Differences" determinism requirement.
pub fn group_by_codepoint(boxes: impl IntoIterator<Item = CharBox>) -> BTreeMap<char, GlyphGroup> {
    let mut groups: BTreeMap<char, GlyphGroup> = BTreeMap::new();
    for char_box in boxes {
        groups.entry(char_box.codepoint).or_default().instances.push(char_box);
    }
    groups
}

/// Selects the representative instance of a non-empty group: maximal area,
/// ties broken by the smallest `(page_index, y1, x1)`.
pub fn pick_representative(group: &GlyphGroup) -> Option<CharBox> {
    group
        .instances
        .iter()
        .copied()
        .max_by(|a, b| {
            a.area()
                .cmp(&b.area())
                .then_with(|| {
                    // Reverse the tuple comparison: a *smaller* tuple should win
                    // ties, so it must compare as *greater* under max_by.
                    let key_a = (a.page_index, a.y1, a.x1);
                    let key_b = (b.page_index, b.y1, b.x1);
                    key_b.cmp(&key_a)
                })
        })
}

/// Convenience over the full pipeline: group then pick, in one pass, yielding
/// codepoints in ascending order.
pub fn collect_representatives(
    boxes: impl IntoIterator<Item = CharBox>,
) -> BTreeMap<char, CharBox> {
    group_by_codepoint(boxes)
        .into_iter()
        .filter_map(|(codepoint, group)| pick_representative(&group).map(|rep| (codepoint, rep)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_box(codepoint: char, x1: u32, y1: u32, x2: u32, y2: u32, page_index: usize) -> CharBox {
        CharBox { codepoint, x1, x2, y1, y2, page_index, confidence: None }
    }

    #[test]
    fn picks_the_largest_area_instance() {
        let group = GlyphGroup {
            instances: vec![
                char_box('A', 0, 0, 10, 10, 0),
                char_box('A', 0, 0, 50, 60, 1),
                char_box('A', 0, 0, 20, 20, 0),
            ],
        };
        let representative = pick_representative(&group).unwrap();
        assert_eq!(representative.page_index, 1);
    }

    #[test]
    fn ties_break_on_smallest_page_then_y1_then_x1() {
        let group = GlyphGroup {
            instances: vec![
                char_box('A', 5, 5, 15, 15, 2),
                char_box('A', 1, 1, 11, 11, 0),
                char_box('A', 3, 3, 13, 13, 1),
            ],
        };
        let representative = pick_representative(&group).unwrap();
        assert_eq!(representative.page_index, 0);
    }

    #[test]
    fn scenario_page_three_wins_over_page_one() {
        // End-to-end scenario 3: areas 1200 (page 1) vs 3000 (page 3).
        let group = GlyphGroup {
            instances: vec![
                char_box('A', 0, 0, 40, 30, 0), // area 1200, represented as page 1
                char_box('A', 0, 0, 60, 50, 2), // area 3000, represented as page 3
            ],
        };
        let representative = pick_representative(&group).unwrap();
        assert_eq!(representative.page_index, 2);
        assert_eq!(representative.area(), 3000);
    }

    #[test]
    fn groups_keyset_is_unicode_ascending() {
        let boxes = vec![
            char_box('b', 0, 0, 10, 10, 0),
            char_box('A', 0, 0, 10, 10, 0),
            char_box('a', 0, 0, 10, 10, 0),
        ];
        let groups = group_by_codepoint(boxes);
        let keys: Vec<char> = groups.keys().copied().collect();
        assert_eq!(keys, vec!['A', 'a', 'b']);
    }
}
