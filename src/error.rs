use serde::{Deserialize, Serialize};

/// The taxonomy of §7: a `TraceableError` optionally carries one of these so that
/// the orchestrator can match on *kind* (whether to trigger the OCRmyPDF fallback,
/// retry with degraded options, or terminate the job) without parsing message text.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineErrorKind {
    /// The source PDF cannot be opened or any page cannot be rendered. Fatal.
    InputUnreadable,
    /// The OCR backend is missing or failed on every page. Triggers the fallback.
    OcrUnavailable,
    /// No glyph was successfully vectorised. Triggers the fallback.
    VectorisationEmpty,
    /// Both raster-to-SVG backends are unavailable. Treated as `VectorisationEmpty`.
    VectoriserBackendMissing,
    /// A fallback tool (page cleaner, quantiser) is missing; retry with reduced options.
    DegradedDependency,
    /// Final serialisation to the output path failed. Fatal.
    OutputWriteFailed,
}

/// A single crate-wide error type carrying a human-readable context, an optional
/// source error and an optional structured `PipelineErrorKind`. Consolidates the
/// near-duplicate `CustomError`/`TraceableError` pairs this crate's predecessor
/// accumulated into one canonical type.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TraceableError {
    pub context: String,
    pub source: Option<String>,
    pub kind: Option<PipelineErrorKind>,
}

impl std::fmt::Display for TraceableError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(source) => write!(
                formatter,
                "{}: {}",
                self.context,
                minimize_first_letter(source.to_string())
            ),
            None => write!(formatter, "{}", self.context),
        }
    }
}

impl std::error::Error for TraceableError {}

impl TraceableError {
    pub fn with_context<S: Into<String>>(context: S) -> TraceableError {
        TraceableError { context: context.into(), source: None, kind: None }
    }

    pub fn with_error<S: Into<String>>(
        context: S,
        source: &dyn std::error::Error,
    ) -> TraceableError {
        TraceableError { context: context.into(), source: Some(source.to_string()), kind: None }
    }

    pub fn with_source<S: Into<String>>(context: S, source: anyhow::Error) -> TraceableError {
        TraceableError { context: context.into(), source: Some(source.to_string()), kind: None }
    }

    /// Attaches a `PipelineErrorKind` so the orchestrator can decide whether to
    /// trigger the OCRmyPDF fallback (§4.7) without matching on message text.
    pub fn with_kind(mut self, kind: PipelineErrorKind) -> TraceableError {
        self.kind = Some(kind);
        self
    }

    pub fn kind(&self) -> Option<PipelineErrorKind> {
        self.kind
    }
}

/// Minimizes the first letter of a string, it is used for standardizing the error message.
pub(crate) fn minimize_first_letter(string: String) -> String {
    let mut characters = string.chars();
    match characters.next() {
        None => String::new(),
        Some(character) => character.to_lowercase().chain(characters).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_without_source_is_bare_context() {
        let error = TraceableError::with_context("failed to open the document");
        assert_eq!(error.to_string(), "failed to open the document");
    }

    #[test]
    fn display_with_source_minimizes_first_letter() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "Not found");
        let error = TraceableError::with_error("failed to read font", &io_error);
        assert_eq!(error.to_string(), "failed to read font: not found");
    }

    #[test]
    fn with_kind_round_trips_through_accessor() {
        let error = TraceableError::with_context("no glyphs vectorised")
            .with_kind(PipelineErrorKind::VectorisationEmpty);
        assert_eq!(error.kind(), Some(PipelineErrorKind::VectorisationEmpty));
    }
}
