//! Page Rasteriser (spec §4.1). Renders each page of the source PDF to an RGB
//! bitmap at a chosen DPI, grounded on `pdfium-render`'s page-render API as used
//! in `other_examples/7a58f108_Osso-refextract__src-ocr.rs.rs`.

use pdfium_render::prelude::*;

use crate::error::{PipelineErrorKind, TraceableError};

pub const DEFAULT_DPI: f32 = 300.0;

/// One rasterised page: its pixel buffer plus the scale and point-size needed to
/// map pixel coordinates back into the PDF user-space frame (§2's coordinate
/// frames: `pt = px · 72 / dpi`).
#[derive(Debug, Clone)]
pub struct PageFrame {
    pub page_index: usize,
    pub width_px: u32,
    pub height_px: u32,
    /// Page dimensions in PDF points, independent of the raster DPI.
    pub width_pt: f32,
    pub height_pt: f32,
    pub dpi: f32,
    /// 8-bit luminance, row-major, top-left origin (pixel frame).
    pub luminance: Vec<u8>,
}

impl PageFrame {
    /// `pt = px · 72 / dpi`, the pixel→point conversion of §2.
    pub fn px_to_pt(&self, px: f32) -> f32 {
        px * 72.0 / self.dpi
    }
}

/// Renders every page of `path` to a [`PageFrame`] at `dpi`. Per §4.1, partial-page
/// success is not attempted: if any single page fails to render, the whole job
/// fails as `InputUnreadable`, same as an unopenable document.
pub fn rasterise_pdf(
    pdfium: &Pdfium,
    path: &std::path::Path,
    dpi: f32,
) -> Result<Vec<PageFrame>, TraceableError> {
    let document = pdfium.load_pdf_from_file(path, None).map_err(|error| {
        TraceableError::with_error(
            format!("Failed to open {} for rasterisation", path.display()),
            &error,
        )
        .with_kind(PipelineErrorKind::InputUnreadable)
    })?;

    let scale = dpi / 72.0;
    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

    let mut frames = Vec::new();
    for (page_index, page) in document.pages().iter().enumerate() {
        let width_pt = page.width().value;
        let height_pt = page.height().value;
        let bitmap = page.render_with_config(&render_config).map_err(|error| {
            TraceableError::with_error(
                format!("failed to rasterise page {page_index} of {}", path.display()),
                &error,
            )
            .with_kind(PipelineErrorKind::InputUnreadable)
        })?;
        let image = bitmap.as_image().to_luma8();
        let (width_px, height_px) = image.dimensions();
        log::debug!("rasterised page {page_index} at {width_px}x{height_px}px, {dpi} dpi");
        frames.push(PageFrame {
            page_index,
            width_px,
            height_px,
            width_pt,
            height_pt,
            dpi,
            luminance: image.into_raw(),
        });
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn px_to_pt_uses_72_over_dpi_scale() {
        let frame = PageFrame {
            page_index: 0,
            width_px: 2550,
            height_px: 3300,
            width_pt: 612.0,
            height_pt: 792.0,
            dpi: DEFAULT_DPI,
            luminance: Vec::new(),
        };
        assert!((frame.px_to_pt(2550.0) - 612.0).abs() < 1e-3);
    }
}
