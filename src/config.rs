//! The §6 CLI surface, expressed as a configuration type that can be built either
//! from parsed command-line arguments or deserialised straight out of `meta.json`
//! when a job is resumed from the job store — mirroring
//! `document_configuration.rs::DocumentConfiguration::from_path`'s
//! read-then-parse-with-context idiom.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TraceableError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrMode {
    Fast,
    Best,
}

impl fmt::Display for OcrMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OcrMode::Fast => write!(formatter, "fast"),
            OcrMode::Best => write!(formatter, "best"),
        }
    }
}

impl std::str::FromStr for OcrMode {
    type Err = TraceableError;

    fn from_str(value: &str) -> Result<OcrMode, TraceableError> {
        match value {
            "fast" => Ok(OcrMode::Fast),
            "best" => Ok(OcrMode::Best),
            other => Err(TraceableError::with_context(format!(
                "unrecognised mode '{other}', expected 'fast' or 'best'"
            ))),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputType {
    Pdf,
    PdfA2,
}

impl fmt::Display for OutputType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputType::Pdf => write!(formatter, "pdf"),
            OutputType::PdfA2 => write!(formatter, "pdfa-2"),
        }
    }
}

impl std::str::FromStr for OutputType {
    type Err = TraceableError;

    fn from_str(value: &str) -> Result<OutputType, TraceableError> {
        match value {
            "pdf" => Ok(OutputType::Pdf),
            "pdfa-2" => Ok(OutputType::PdfA2),
            other => Err(TraceableError::with_context(format!(
                "unrecognised output type '{other}', expected 'pdf' or 'pdfa-2'"
            ))),
        }
    }
}

/// `0`–`3`, forwarded verbatim to `ocrmypdf --optimize` in the fallback path and
/// used by the core pipeline only to decide whether to run `image`-crate
/// recompression on the final raster streams (§4.7).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OptimizeLevel(pub u8);

impl fmt::Display for OptimizeLevel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl std::str::FromStr for OptimizeLevel {
    type Err = TraceableError;

    fn from_str(value: &str) -> Result<OptimizeLevel, TraceableError> {
        let level: u8 = value
            .parse()
            .map_err(|_| TraceableError::with_context(format!("'{value}' is not an integer")))?;
        if level > 3 {
            return Err(TraceableError::with_context(format!(
                "optimize level {level} out of range, expected 0-3"
            )));
        }
        Ok(OptimizeLevel(level))
    }
}

/// The per-job knobs of §6's CLI surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobParameters {
    pub lang: String,
    pub mode: OcrMode,
    pub force_ocr: bool,
    pub output_type: OutputType,
    pub optimize: OptimizeLevel,
}

impl Default for JobParameters {
    fn default() -> JobParameters {
        JobParameters {
            lang: "eng".to_string(),
            mode: OcrMode::Best,
            force_ocr: false,
            output_type: OutputType::Pdf,
            optimize: OptimizeLevel(3),
        }
    }
}

impl JobParameters {
    /// Deserialises `JobParameters` out of a job-store `meta.json`, reusing the
    /// teacher's read-then-parse-with-context chaining.
    pub fn from_path(path: &Path) -> Result<JobParameters, TraceableError> {
        let contents = std::fs::read_to_string(path).map_err(|error| {
            TraceableError::with_error(
                format!("Failed to read the job parameters at {}", path.display()),
                &error,
            )
        })?;
        serde_json::from_str(&contents).map_err(|error| {
            TraceableError::with_error(
                format!("Failed to parse the job parameters at {}", path.display()),
                &error,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn ocr_mode_round_trips_through_display_and_from_str() {
        assert_eq!(OcrMode::from_str("best").unwrap(), OcrMode::Best);
        assert_eq!(OcrMode::Best.to_string(), "best");
    }

    #[test]
    fn output_type_accepts_pdfa_2() {
        assert_eq!(OutputType::from_str("pdfa-2").unwrap(), OutputType::PdfA2);
    }

    #[test]
    fn optimize_level_rejects_out_of_range() {
        assert!(OptimizeLevel::from_str("4").is_err());
        assert!(OptimizeLevel::from_str("0").is_ok());
    }

    #[test]
    fn default_parameters_match_spec_defaults() {
        let parameters = JobParameters::default();
        assert_eq!(parameters.lang, "eng");
        assert_eq!(parameters.mode, OcrMode::Best);
        assert!(!parameters.force_ocr);
        assert_eq!(parameters.output_type, OutputType::Pdf);
        assert_eq!(parameters.optimize, OptimizeLevel(3));
    }
}
