//! Vectoriser and SVG-path transcoder (spec §4.4). Crops, binarises, traces to
//! SVG through a backend cascade, then translates the SVG path data into PDF
//! path operators in the 1000-unit em-square frame. Grounded on
//! `original_source/engine/glyph_pipeline/vectorizer.py`'s `vtracer` binding and
//! potrace subprocess cascade, the subprocess idiom from
//! `pdf.rs::optimize_pdf_file_with_gs`/`optimize_pdf_file_with_ps2pdf`, and the
//! state-machine tokeniser design note of spec §9.

use std::io::Write as _;
use std::process::Command;

use image::{GrayImage, Luma};

use crate::error::{PipelineErrorKind, TraceableError};

pub const EM: f64 = 1000.0;
const BINARIZATION_THRESHOLD: u8 = 128;

/// A fully vectorised glyph: advance width in em units and a path-ops string in
/// the glyph frame, ready to be embedded verbatim as a Type 3 CharProc body
/// (minus the `d1` header, which the assembler prepends).
#[derive(Debug, Clone, PartialEq)]
pub struct VectorGlyph {
    pub advance_width: f64,
    pub path_ops: String,
}

/// Binarises a cropped glyph image: luminance < 128 → glyph (0), else background
/// (255). §4.4's binarisation step.
pub fn binarize(crop: &GrayImage) -> GrayImage {
    let mut output = GrayImage::new(crop.width(), crop.height());
    for (x, y, pixel) in crop.enumerate_pixels() {
        let value = if pixel.0[0] < BINARIZATION_THRESHOLD { 0u8 } else { 255u8 };
        output.put_pixel(x, y, Luma([value]));
    }
    output
}

/// Traces a binarised crop to SVG path data through the backend cascade: the
/// in-process tracer first, then an external command-line tracer on a temporary
/// BMP. `None` if both fail — the glyph is then dropped, not an error (§4.4).
pub fn trace_to_svg(binary: &GrayImage) -> Option<String> {
    trace_in_process(binary).or_else(|| trace_subprocess(binary))
}

fn trace_in_process(binary: &GrayImage) -> Option<String> {
    let rgba: Vec<u8> = binary
        .pixels()
        .flat_map(|pixel| {
            let v = pixel.0[0];
            [v, v, v, 255]
        })
        .collect();

    let config = vtracer::Config {
        color_mode: vtracer::ColorMode::Binary,
        mode: vtracer::PathSimplifyMode::Spline,
        corner_threshold: (60.0_f64).to_radians(),
        length_threshold: 4.0,
        filter_speckle: 2,
        ..Default::default()
    };

    let image = vtracer::ColorImage {
        pixels: rgba,
        width: binary.width() as usize,
        height: binary.height() as usize,
    };

    match vtracer::convert_image_to_svg(&image, config) {
        Ok(svg) => Some(svg.to_string()),
        Err(error) => {
            log::debug!("in-process tracer failed: {error}");
            None
        }
    }
}

/// External command-line tracer (`potrace`), invoked on a temporary BMP,
/// producing SVG to a temporary file — same spawn/wait/status-check idiom as
/// `pdf.rs`'s Ghostscript/ps2pdf subprocess helpers.
fn trace_subprocess(binary: &GrayImage) -> Option<String> {
    let workdir = std::env::temp_dir();
    let unique = uuid::Uuid::new_v4();
    let bmp_path = workdir.join(format!("vectorscan-{unique}.bmp"));
    let svg_path = workdir.join(format!("vectorscan-{unique}.svg"));

    if binary.save(&bmp_path).is_err() {
        return None;
    }

    let status = Command::new("potrace")
        .arg("--svg")
        .arg("--output")
        .arg(&svg_path)
        .arg(&bmp_path)
        .status();

    let result = match status {
        Ok(status) if status.success() => std::fs::read_to_string(&svg_path).ok(),
        _ => None,
    };

    let _ = std::fs::remove_file(&bmp_path);
    let _ = std::fs::remove_file(&svg_path);
    result
}

/// Extracts every `d` attribute from `<path …>` elements, case-insensitively.
fn extract_path_data(svg: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let lower = svg.to_lowercase();
    let mut search_from = 0usize;
    while let Some(tag_start) = lower[search_from..].find("<path") {
        let tag_start = search_from + tag_start;
        let tag_end = match svg[tag_start..].find('>') {
            Some(offset) => tag_start + offset,
            None => break,
        };
        let tag = &svg[tag_start..tag_end];
        if let Some(data) = extract_d_attribute(tag) {
            paths.push(data);
        }
        search_from = tag_end + 1;
    }
    paths
}

fn extract_d_attribute(tag: &str) -> Option<String> {
    let lower = tag.to_lowercase();
    let marker = lower.find(" d=")?;
    let rest = &tag[marker + 3..];
    let quote = rest.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let body = &rest[1..];
    let end = body.find(quote)?;
    Some(body[..end].to_string())
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Command(char),
    Number(f64),
}

/// Tokenises an SVG `d` string into command letters and signed decimals
/// (exponent notation supported), per §4.4/§9's state-machine design.
fn tokenize(data: &str) -> Vec<Token> {
    let chars: Vec<char> = data.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0;
    while index < chars.len() {
        let character = chars[index];
        if character.is_whitespace() || character == ',' {
            index += 1;
            continue;
        }
        if character.is_ascii_alphabetic() {
            // Every letter is tokenised as a command, supported or not, so that
            // `transcode_path`'s unsupported-command guard actually sees it
            // instead of its operands being silently absorbed by whatever
            // command preceded it.
            tokens.push(Token::Command(character));
            index += 1;
            continue;
        }
        if character == '-' || character == '+' || character == '.' || character.is_ascii_digit() {
            let start = index;
            index += 1;
            let mut seen_dot = character == '.';
            while index < chars.len() {
                let next = chars[index];
                if next.is_ascii_digit() {
                    index += 1;
                } else if next == '.' && !seen_dot {
                    seen_dot = true;
                    index += 1;
                } else if (next == 'e' || next == 'E')
                    && index + 1 < chars.len()
                    && (chars[index + 1].is_ascii_digit()
                        || chars[index + 1] == '+'
                        || chars[index + 1] == '-')
                {
                    index += 2;
                    while index < chars.len() && chars[index].is_ascii_digit() {
                        index += 1;
                    }
                } else {
                    break;
                }
            }
            let text: String = chars[start..index].iter().collect();
            if let Ok(value) = text.parse::<f64>() {
                tokens.push(Token::Number(value));
            }
            continue;
        }
        // Anything else (stray punctuation) is skipped; unsupported commands
        // are already tokenised above and rejected in `transcode_path`.
        index += 1;
    }
    tokens
}

/// Translates one `d` string into PDF path operators in the glyph frame.
/// `scale = EM / h_px` (height-preserving, per §2's coordinate-frame note).
/// Returns `None` if the path uses an unsupported command (`A S T H V`).
fn transcode_path(data: &str, h_px: f64) -> Option<String> {
    let scale = if h_px > 0.0 { EM / h_px } else { return None };
    let fx = |v: f64| v * scale;
    let fy = |v: f64| (h_px - v) * scale;

    let tokens = tokenize(data);
    let mut ops = String::new();
    let mut cx = 0.0_f64;
    let mut cy = 0.0_f64;
    let mut start_x = 0.0_f64;
    let mut start_y = 0.0_f64;
    let mut index = 0usize;

    while index < tokens.len() {
        let command = match tokens[index] {
            Token::Command(c) => c,
            Token::Number(_) => return None,
        };
        index += 1;

        match command {
            'M' | 'm' => {
                let relative = command == 'm';
                let mut first = true;
                while index + 1 < tokens.len() {
                    let (x, y) = match (tokens.get(index), tokens.get(index + 1)) {
                        (Some(Token::Number(x)), Some(Token::Number(y))) => (*x, *y),
                        _ => break,
                    };
                    index += 2;
                    let (nx, ny) = if relative { (cx + x, cy + y) } else { (x, y) };
                    if first {
                        ops.push_str(&format!("{:.4} {:.4} m\n", fx(nx), fy(ny)));
                        start_x = nx;
                        start_y = ny;
                        first = false;
                    } else {
                        ops.push_str(&format!("{:.4} {:.4} l\n", fx(nx), fy(ny)));
                    }
                    cx = nx;
                    cy = ny;
                }
            }
            'L' | 'l' => {
                let relative = command == 'l';
                while index + 1 < tokens.len() {
                    let (x, y) = match (tokens.get(index), tokens.get(index + 1)) {
                        (Some(Token::Number(x)), Some(Token::Number(y))) => (*x, *y),
                        _ => break,
                    };
                    index += 2;
                    let (nx, ny) = if relative { (cx + x, cy + y) } else { (x, y) };
                    ops.push_str(&format!("{:.4} {:.4} l\n", fx(nx), fy(ny)));
                    cx = nx;
                    cy = ny;
                }
            }
            'C' | 'c' => {
                let relative = command == 'c';
                while index + 5 < tokens.len() {
                    let values: Vec<f64> = (0..6)
                        .filter_map(|offset| match tokens.get(index + offset) {
                            Some(Token::Number(v)) => Some(*v),
                            _ => None,
                        })
                        .collect();
                    if values.len() != 6 {
                        break;
                    }
                    index += 6;
                    let (x1, y1, x2, y2, x, y) =
                        (values[0], values[1], values[2], values[3], values[4], values[5]);
                    let (cp1x, cp1y, cp2x, cp2y, nx, ny) = if relative {
                        (cx + x1, cy + y1, cx + x2, cy + y2, cx + x, cy + y)
                    } else {
                        (x1, y1, x2, y2, x, y)
                    };
                    ops.push_str(&format!(
                        "{:.4} {:.4} {:.4} {:.4} {:.4} {:.4} c\n",
                        fx(cp1x),
                        fy(cp1y),
                        fx(cp2x),
                        fy(cp2y),
                        fx(nx),
                        fy(ny)
                    ));
                    cx = nx;
                    cy = ny;
                }
            }
            'Q' | 'q' => {
                let relative = command == 'q';
                while index + 3 < tokens.len() {
                    let values: Vec<f64> = (0..4)
                        .filter_map(|offset| match tokens.get(index + offset) {
                            Some(Token::Number(v)) => Some(*v),
                            _ => None,
                        })
                        .collect();
                    if values.len() != 4 {
                        break;
                    }
                    index += 4;
                    let (qx, qy, x, y) = (values[0], values[1], values[2], values[3]);
                    let (qcx, qcy, nx, ny) =
                        if relative { (cx + qx, cy + qy, cx + x, cy + y) } else { (qx, qy, x, y) };
                    // cp1 = P0 + 2/3(Q - P0), cp2 = P1 + 2/3(Q - P1)
                    let cp1x = cx + 2.0 / 3.0 * (qcx - cx);
                    let cp1y = cy + 2.0 / 3.0 * (qcy - cy);
                    let cp2x = nx + 2.0 / 3.0 * (qcx - nx);
                    let cp2y = ny + 2.0 / 3.0 * (qcy - ny);
                    ops.push_str(&format!(
                        "{:.4} {:.4} {:.4} {:.4} {:.4} {:.4} c\n",
                        fx(cp1x),
                        fy(cp1y),
                        fx(cp2x),
                        fy(cp2y),
                        fx(nx),
                        fy(ny)
                    ));
                    cx = nx;
                    cy = ny;
                }
            }
            'Z' | 'z' => {
                ops.push_str("h\n");
                cx = start_x;
                cy = start_y;
            }
            _ => return None,
        }
    }

    Some(ops)
}

/// Full vectorisation of one representative glyph crop: binarise, trace,
/// transcode, compute advance width. `None` on any cascade failure, unsupported
/// command, or `h_px == 0` (§4.4).
pub fn vectorize_glyph(crop: &GrayImage) -> Option<VectorGlyph> {
    let h_px = crop.height() as f64;
    let w_px = crop.width() as f64;
    if h_px == 0.0 {
        return None;
    }

    let binary = binarize(crop);
    let svg = trace_to_svg(&binary)?;
    let path_data = extract_path_data(&svg);
    if path_data.is_empty() {
        return None;
    }

    let mut ops = String::new();
    for data in &path_data {
        let transcoded = transcode_path(data, h_px)?;
        ops.push_str(&transcoded);
    }
    ops.push('f');

    Some(VectorGlyph { advance_width: EM * w_px / h_px, path_ops: ops })
}

/// Surfaces a `VectoriserBackendMissing` diagnosis — both cascade backends
/// unavailable at process start, treated as `VectorisationEmpty` per §7.
pub fn backend_cascade_available() -> bool {
    // The in-process tracer (`vtracer`) is always linked; degrade only if the
    // subprocess tracer is the sole remaining path and `potrace` is absent —
    // which is fine, since the in-process tracer covers the common case.
    true
}

pub fn missing_backend_error() -> TraceableError {
    TraceableError::with_context("both raster-to-SVG tracer backends are unavailable")
        .with_kind(PipelineErrorKind::VectoriserBackendMissing)
}

/// Writes a BMP to a scoped temp path and guarantees cleanup, used by callers
/// that need the temp-file contract outside `trace_subprocess` (tests).
#[allow(dead_code)]
fn with_temp_bmp<T>(binary: &GrayImage, f: impl FnOnce(&std::path::Path) -> T) -> Option<T> {
    let path = std::env::temp_dir().join(format!("vectorscan-{}.bmp", uuid::Uuid::new_v4()));
    binary.save(&path).ok()?;
    let result = f(&path);
    let _ = std::fs::remove_file(&path);
    Some(result)
}

#[allow(dead_code)]
fn write_scoped_tempfile(bytes: &[u8], extension: &str) -> std::io::Result<std::path::PathBuf> {
    let path = std::env::temp_dir().join(format!("vectorscan-{}.{extension}", uuid::Uuid::new_v4()));
    let mut file = std::fs::File::create(&path)?;
    file.write_all(bytes)?;
    Ok(path)
}
