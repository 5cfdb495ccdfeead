//! OCRmyPDF fallback invocation (spec §4.7). Subprocess spawn/wait/status-check
//! idiom grounded on `pdf.rs::optimize_pdf_file_with_gs`/
//! `optimize_pdf_file_with_ps2pdf`; the degradation-retry contract itself
//! (substring matching on missing-tool messages) is ported verbatim from
//! `original_source/engine/clearscan_engine.py::run_capture`.

use std::path::Path;
use std::process::Command;

use crate::config::{JobParameters, OcrMode};
use crate::error::{PipelineErrorKind, TraceableError};

/// Substrings the original looks for in the combined stdout/stderr of a failed
/// `ocrmypdf` invocation to decide a dependency is missing, not a real error.
const MISSING_TOOL_MARKERS: [&str; 3] =
    ["was not found", "could not find program", "could not be executed"];

#[derive(Debug, Clone)]
pub struct FallbackOutcome {
    pub exit_code: i32,
    pub command_line: String,
    pub combined_output: String,
    pub attempts: u32,
}

/// Runs the OCRmyPDF fallback, degrading up to twice on missing-tool messages
/// (§4.7): first a missing page-cleaner (`unpaper`) drops `--clean`; then a
/// missing quantiser (`pngquant`) reduces `--optimize` to 1. After two such
/// degradations the final exit code is surfaced regardless of outcome.
pub fn run_fallback(
    input: &Path,
    output: &Path,
    parameters: &JobParameters,
) -> Result<FallbackOutcome, TraceableError> {
    let mut clean = matches!(parameters.mode, OcrMode::Best);
    let mut optimize = parameters.optimize.0;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let mut command = Command::new("ocrmypdf");
        command.arg("--jobs").arg("2");
        command.arg("--language").arg(&parameters.lang);
        command.arg("--output-type").arg(parameters.output_type.to_string());
        command.arg("--optimize").arg(optimize.to_string());
        if parameters.force_ocr {
            command.arg("--force-ocr");
        }
        if matches!(parameters.mode, OcrMode::Best) {
            command.arg("--deskew").arg("--rotate-pages");
            if clean {
                command.arg("--clean");
            }
        }
        command.arg(input).arg(output);

        let command_line = format!("{command:?}");
        log::debug!("invoking fallback (attempt {attempts}): {command_line}");

        let result = command.output().map_err(|error| {
            TraceableError::with_error("Failed to spawn the ocrmypdf fallback", &error)
        })?;

        let combined_output = format!(
            "{}{}",
            String::from_utf8_lossy(&result.stdout),
            String::from_utf8_lossy(&result.stderr)
        );

        if result.status.success() {
            return Ok(FallbackOutcome {
                exit_code: 0,
                command_line,
                combined_output,
                attempts,
            });
        }

        if attempts <= 2 {
            if clean && mentions_missing_unpaper(&combined_output) {
                log::warn!("fallback reports a missing page-cleaning tool, retrying without --clean");
                clean = false;
                continue;
            }
            if optimize > 1 && mentions_missing_pngquant(&combined_output) {
                log::warn!("fallback reports a missing quantiser, retrying with --optimize 1");
                optimize = 1;
                continue;
            }
        }

        let exit_code = result.status.code().unwrap_or(-1);
        log::error!("fallback exited with code {exit_code} after {attempts} attempt(s)");
        return Ok(FallbackOutcome { exit_code, command_line, combined_output, attempts });
    }
}

/// A missing-tool phrase alone is not enough: the original only degrades
/// `--clean` when the output also names `unpaper`, the page-cleaning tool
/// `ocrmypdf` shells out to (`clearscan_engine.py:51`). Without the name
/// check, an unrelated missing binary (tesseract, gs, …) would incorrectly
/// trigger this degradation.
fn mentions_missing_unpaper(output: &str) -> bool {
    let lower = output.to_lowercase();
    lower.contains("unpaper") && mentions_missing_tool(&lower)
}

/// Same restriction as [`mentions_missing_unpaper`] but for the quantiser
/// (`pngquant`), per `clearscan_engine.py:59`.
fn mentions_missing_pngquant(output: &str) -> bool {
    let lower = output.to_lowercase();
    lower.contains("pngquant") && mentions_missing_tool(&lower)
}

fn mentions_missing_tool(output: &str) -> bool {
    MISSING_TOOL_MARKERS.iter().any(|marker| output.contains(marker))
}

pub fn missing_ocrmypdf_error() -> TraceableError {
    TraceableError::with_context("the ocrmypdf fallback binary is not on PATH")
        .with_kind(PipelineErrorKind::DegradedDependency)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mentions_missing_tool_matches_all_three_markers() {
        assert!(mentions_missing_tool("error: was not found on path"));
        assert!(mentions_missing_tool("could not find program 'pngquant'"));
        assert!(mentions_missing_tool("the helper could not be executed"));
        assert!(!mentions_missing_tool("ocr completed successfully"));
    }

    #[test]
    fn unpaper_degradation_requires_both_the_tool_name_and_a_missing_tool_phrase() {
        assert!(mentions_missing_unpaper("ERROR: unpaper WAS NOT FOUND on PATH"));
        assert!(!mentions_missing_unpaper("ERROR: tesseract WAS NOT FOUND on PATH"));
        assert!(!mentions_missing_unpaper("unpaper exited with an unrelated error"));
    }

    #[test]
    fn pngquant_degradation_requires_both_the_tool_name_and_a_missing_tool_phrase() {
        assert!(mentions_missing_pngquant("could not find program 'pngquant'"));
        assert!(!mentions_missing_pngquant("could not find program 'gs'"));
        assert!(!mentions_missing_pngquant("pngquant exited with an unrelated error"));
    }
}
