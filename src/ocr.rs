//! Character Box Extractor (spec §4.2). Runs OCR per page, yielding
//! top-left-origin pixel boxes. Grounded on `leptess`'s Tesseract binding, using
//! the same engine-mode cascade and Y-flip math as
//! `other_examples/7a58f108_Osso-refextract__src-ocr.rs.rs`.

use leptess::LepTess;

use crate::raster::PageFrame;

/// A recognised character-level bounding box in the page's pixel frame
/// (top-left origin, Y down), already Y-flipped from the OCR backend's
/// bottom-left convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharBox {
    pub codepoint: char,
    pub x1: u32,
    pub x2: u32,
    pub y1: u32,
    pub y2: u32,
    pub page_index: usize,
    pub confidence: Option<f32>,
}

impl CharBox {
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }
}

/// Legacy engine mode (`oem` 0) is tried first for more reliable per-character
/// boxes; `oem` 1 (neural/LSTM) is the fallback. Mirrors
/// `extractor.py::extract_char_boxes`'s cascade.
const ENGINE_MODES: [&str; 2] = ["0", "1"];

/// Whether Tesseract is reachable at all — used by the orchestrator to decide
/// whether OCR is available before attempting any page (§7 `OCRUnavailable`).
pub fn tesseract_available(lang: &str) -> bool {
    LepTess::new(None, lang).is_ok()
}

/// Extracts character boxes from one rasterised page, trying the legacy engine
/// mode before the neural mode. Falls through to the next mode only on a hard
/// failure (an exception from the engine, not an empty-but-successful read) —
/// a legacy-mode page with genuinely zero characters is accepted as final,
/// matching `extractor.py::extract_char_boxes`'s cascade. Both modes failing
/// yields an empty Vec, which is NOT an error (§4.2): the page simply
/// contributes no overlay.
pub fn extract_char_boxes(page: &PageFrame, lang: &str) -> Vec<CharBox> {
    let encoded = match luminance_to_png(page) {
        Ok(bytes) => bytes,
        Err(error) => {
            log::warn!("page {}: failed to encode raster for OCR: {error}", page.page_index);
            return Vec::new();
        }
    };

    for &oem in &ENGINE_MODES {
        match run_engine_mode(page, lang, oem, &encoded) {
            Ok(boxes) => {
                log::debug!(
                    "page {}: oem {oem} yielded {} boxes",
                    page.page_index,
                    boxes.len()
                );
                return boxes;
            }
            Err(error) => {
                log::warn!("page {}: oem {oem} failed: {error}", page.page_index);
            }
        }
    }
    Vec::new()
}

fn run_engine_mode(
    page: &PageFrame,
    lang: &str,
    oem: &str,
    encoded: &[u8],
) -> Result<Vec<CharBox>, String> {
    let mut tesseract = LepTess::new(None, lang).map_err(|error| format!("{error:?}"))?;
    tesseract
        .set_variable(leptess::Variable::TesseditOcrEngineMode, oem)
        .map_err(|error| format!("{error:?}"))?;
    tesseract
        .set_image_from_mem(encoded)
        .map_err(|_| "failed to load raster into tesseract".to_string())?;

    let boxes = tesseract
        .get_component_boxes(leptess::capi::TessPageIteratorLevel_RIL_SYMBOL, true)
        .ok_or_else(|| "tesseract returned no component boxes".to_string())?;

    let mut char_boxes = Vec::new();
    for symbol in &boxes {
        let geometry = symbol.get_geometry();
        tesseract.set_rectangle(geometry.x, geometry.y, geometry.w, geometry.h);
        let confidence = tesseract.mean_text_conf();

        let text = match tesseract.get_utf8_text() {
            Ok(text) => text.trim().to_string(),
            Err(_) => continue,
        };
        let codepoint = match single_char(&text) {
            Some(character) => character,
            None => continue,
        };

        if codepoint.is_whitespace() {
            continue;
        }

        let y1_raw = geometry.y.max(0) as u32;
        let y2_raw = (geometry.y + geometry.h).max(0) as u32;
        let y1 = page.height_px.saturating_sub(y2_raw);
        let y2 = page.height_px.saturating_sub(y1_raw);
        let x1 = geometry.x.max(0) as u32;
        let x2 = (geometry.x + geometry.w).max(0) as u32;

        if x2 <= x1 || y2 <= y1 {
            continue;
        }
        if x2 > page.width_px || y2 > page.height_px {
            continue;
        }

        char_boxes.push(CharBox {
            codepoint,
            x1,
            x2,
            y1,
            y2,
            page_index: page.page_index,
            confidence: Some(confidence as f32),
        });
    }

    Ok(char_boxes)
}

/// A symbol-level OCR result is expected to be exactly one character; anything
/// else (ligatures, merged glyphs, empty reads) is out of scope for box hygiene.
fn single_char(text: &str) -> Option<char> {
    let mut characters = text.chars();
    let first = characters.next()?;
    if characters.next().is_some() {
        return None;
    }
    Some(first)
}

/// `leptess` consumes encoded image bytes, not raw buffers; PNG-encode the
/// page's luminance plane in-memory.
fn luminance_to_png(page: &PageFrame) -> Result<Vec<u8>, String> {
    use image::{ImageBuffer, Luma};
    let buffer: ImageBuffer<Luma<u8>, _> =
        ImageBuffer::from_raw(page.width_px, page.height_px, page.luminance.clone())
            .ok_or_else(|| "luminance buffer size mismatch".to_string())?;
    let mut encoded = Vec::new();
    buffer
        .write_to(&mut std::io::Cursor::new(&mut encoded), image::ImageFormat::Png)
        .map_err(|error| error.to_string())?;
    Ok(encoded)
}
