//! Serialiser & Orchestration (spec §4.7). Ties every stage together in the
//! dependency order of §2: Page Rasteriser and Box Extractor → Glyph
//! Aggregator → Vectoriser → Type 3 Assembler → Overlay Writer → Serialiser,
//! falling back to OCRmyPDF whenever an earlier stage raises `NoGlyphs` or a
//! catastrophic failure.

use std::collections::BTreeMap;
use std::path::Path;

use image::GrayImage;
use lopdf::{Document, Object};
use pdfium_render::prelude::Pdfium;

use crate::aggregator::{collect_representatives, group_by_codepoint};
use crate::config::JobParameters;
use crate::error::{PipelineErrorKind, TraceableError};
use crate::fallback::run_fallback;
use crate::ocr::{extract_char_boxes, tesseract_available, CharBox};
use crate::overlay::{append_content_stream, build_page_stream, register_font_resource};
use crate::raster::{rasterise_pdf, PageFrame, DEFAULT_DPI};
use crate::type3_font::{assemble, insert_into_document};
use crate::vectorizer::{vectorize_glyph, VectorGlyph};

#[derive(Debug)]
pub enum PipelineResult {
    Vectorised { output_bytes: u64 },
    FellBack { exit_code: i32 },
}

/// Runs the full pipeline against `input`, writing to `output`. On `NoGlyphs`
/// or any catastrophic upstream failure (OCR unavailable, rasteriser missing),
/// invokes the OCRmyPDF fallback instead and propagates its exit code, per
/// §4.7.
pub fn run(
    input: &Path,
    output: &Path,
    parameters: &JobParameters,
) -> Result<PipelineResult, TraceableError> {
    match run_vectorisation(input, output, parameters) {
        Ok(output_bytes) => Ok(PipelineResult::Vectorised { output_bytes }),
        Err(error) if triggers_fallback(&error) => {
            log::warn!("vector pipeline surrendered to the fallback: {error}");
            let outcome = run_fallback(input, output, parameters)?;
            Ok(PipelineResult::FellBack { exit_code: outcome.exit_code })
        }
        Err(error) => Err(error),
    }
}

fn triggers_fallback(error: &TraceableError) -> bool {
    matches!(
        error.kind(),
        Some(PipelineErrorKind::OcrUnavailable)
            | Some(PipelineErrorKind::VectorisationEmpty)
            | Some(PipelineErrorKind::VectoriserBackendMissing)
    )
}

fn run_vectorisation(
    input: &Path,
    output: &Path,
    parameters: &JobParameters,
) -> Result<u64, TraceableError> {
    if !tesseract_available(&parameters.lang) {
        return Err(TraceableError::with_context("tesseract is unavailable for this language")
            .with_kind(PipelineErrorKind::OcrUnavailable));
    }

    let pdfium = Pdfium::new(
        Pdfium::bind_to_system_library()
            .map_err(|error| TraceableError::with_error("Failed to bind to pdfium", &error))?,
    );

    let pages = rasterise_pdf(&pdfium, input, DEFAULT_DPI)?;

    let mut all_boxes: Vec<CharBox> = Vec::new();
    let mut boxes_by_page: BTreeMap<usize, Vec<CharBox>> = BTreeMap::new();
    for page in &pages {
        let boxes = extract_char_boxes(page, &parameters.lang);
        log::debug!("page {}: {} boxes after hygiene", page.page_index, boxes.len());
        boxes_by_page.insert(page.page_index, boxes.clone());
        all_boxes.extend(boxes);
    }

    if all_boxes.is_empty() {
        return Err(TraceableError::with_context("extractor yielded zero boxes on every page")
            .with_kind(PipelineErrorKind::VectorisationEmpty));
    }

    let representatives = collect_representatives(all_boxes.clone());
    let mut glyphs: BTreeMap<char, VectorGlyph> = BTreeMap::new();
    for (codepoint, representative) in &representatives {
        let page = &pages[representative.page_index];
        let crop = crop_glyph(page, representative);
        match vectorize_glyph(&crop) {
            Some(glyph) => {
                glyphs.insert(*codepoint, glyph);
            }
            None => {
                log::debug!("glyph '{codepoint}' failed to vectorise, dropped");
            }
        }
    }

    let font = assemble(&glyphs)?;

    let mut document = Document::load(input).map_err(|error| {
        TraceableError::with_error(format!("Failed to open {} for overlay", input.display()), &error)
            .with_kind(PipelineErrorKind::InputUnreadable)
    })?;

    let font_id = insert_into_document(&mut document, &font);

    let page_ids: Vec<_> = document.get_pages().into_values().collect();
    for (page_index, page_id) in page_ids.into_iter().enumerate() {
        let boxes = match boxes_by_page.get(&page_index) {
            Some(boxes) if !boxes.is_empty() => boxes,
            _ => continue,
        };
        let page = &pages[page_index];
        let stream_bytes = match build_page_stream(page, boxes, &glyphs) {
            Some(bytes) => bytes,
            None => continue,
        };

        let stream =
            lopdf::Stream::new(lopdf::Dictionary::new(), stream_bytes).with_compression(false);
        let stream_id = document.add_object(Object::Stream(stream));

        if let Ok(Object::Dictionary(page_dict)) = document.get_object_mut(page_id) {
            append_content_stream(page_dict, stream_id);
            register_font_resource(page_dict, font_id);
        }
    }

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).map_err(|error| {
            TraceableError::with_error("Failed to create the output directory", &error)
                .with_kind(PipelineErrorKind::OutputWriteFailed)
        })?;
    }

    document.save(output).map_err(|error| {
        TraceableError::with_error(format!("Failed to write {}", output.display()), &error)
            .with_kind(PipelineErrorKind::OutputWriteFailed)
    })?;

    std::fs::metadata(output)
        .map(|metadata| metadata.len())
        .map_err(|error| {
            TraceableError::with_error("Failed to stat the written output", &error)
                .with_kind(PipelineErrorKind::OutputWriteFailed)
        })
}

/// Crops a representative box's pixels out of its page's luminance plane,
/// producing the grayscale input the vectoriser binarises (§4.4/§9's
/// "pre-extract representative crops" bitmap-lifetime strategy).
fn crop_glyph(page: &PageFrame, char_box: &CharBox) -> GrayImage {
    let width = char_box.width();
    let height = char_box.height();
    let mut crop = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let source_x = char_box.x1 + x;
            let source_y = char_box.y1 + y;
            let index = source_y as usize * page.width_px as usize + source_x as usize;
            let value = page.luminance.get(index).copied().unwrap_or(255);
            crop.put_pixel(x, y, image::Luma([value]));
        }
    }
    crop
}
