//! The job-store layout of §6. Out of core scope (the HTTP collaborator owns the
//! actual job queue) but the on-disk shapes are stipulated here so the core can be
//! driven by, and tested against, that interface.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::JobParameters;
use crate::error::TraceableError;

/// `<jobs_root>/<job_id>/...` paths, per §6.
#[derive(Debug, Clone)]
pub struct JobPaths {
    pub base: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
    pub log: PathBuf,
    pub meta: PathBuf,
    pub status: PathBuf,
}

impl JobPaths {
    pub fn new(jobs_root: &Path, job_id: &str) -> JobPaths {
        let base = jobs_root.join(job_id);
        JobPaths {
            input: base.join("input.pdf"),
            output: base.join("out").join("output.pdf"),
            log: base.join("job.log"),
            meta: base.join("meta.json"),
            status: base.join("status.json"),
            base,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMeta {
    pub filename: String,
    pub created: String,
    pub lang: String,
    pub mode: String,
    pub force_ocr: bool,
    pub output_type: String,
    pub optimize: String,
    pub input_bytes: u64,
}

impl JobMeta {
    pub fn new(filename: String, parameters: &JobParameters, input_bytes: u64) -> JobMeta {
        JobMeta {
            filename,
            created: to_iso8601(&OffsetDateTime::now_utc()),
            lang: parameters.lang.clone(),
            mode: parameters.mode.to_string(),
            force_ocr: parameters.force_ocr,
            output_type: parameters.output_type.to_string(),
            optimize: parameters.optimize.to_string(),
            input_bytes,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Done,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub state: JobState,
    pub ts: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub savings_bytes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub savings_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl JobStatus {
    fn new(state: JobState) -> JobStatus {
        JobStatus {
            state,
            ts: to_iso8601(&OffsetDateTime::now_utc()),
            input_bytes: None,
            output_bytes: None,
            savings_bytes: None,
            savings_pct: None,
            exit_code: None,
        }
    }

    pub fn queued() -> JobStatus {
        JobStatus::new(JobState::Queued)
    }

    pub fn running() -> JobStatus {
        JobStatus::new(JobState::Running)
    }

    /// `savings_pct = round((input_bytes − output_bytes)/input_bytes · 100, 2)`, per §6.
    pub fn done(input_bytes: u64, output_bytes: u64) -> JobStatus {
        let mut status = JobStatus::new(JobState::Done);
        let savings_bytes = input_bytes as i64 - output_bytes as i64;
        let savings_pct = if input_bytes > 0 {
            Some((savings_bytes as f64 / input_bytes as f64 * 100.0 * 100.0).round() / 100.0)
        } else {
            None
        };
        status.input_bytes = Some(input_bytes);
        status.output_bytes = Some(output_bytes);
        status.savings_bytes = Some(savings_bytes);
        status.savings_pct = savings_pct;
        status
    }

    pub fn error(exit_code: Option<i32>) -> JobStatus {
        let mut status = JobStatus::new(JobState::Error);
        status.exit_code = exit_code;
        status
    }
}

/// Writes `status.json`, creating the job directory if needed. Ported from
/// `app/main.py`'s `write_status`.
pub fn write_status(path: &Path, status: &JobStatus) -> Result<(), TraceableError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|error| {
            TraceableError::with_error("Failed to create the job directory", &error)
        })?;
    }
    let contents = serde_json::to_string_pretty(status).map_err(|error| {
        TraceableError::with_source("Failed to serialise the job status".into(), error.into())
    })?;
    std::fs::write(path, contents)
        .map_err(|error| TraceableError::with_error("Failed to write the job status", &error))
}

pub fn write_meta(path: &Path, meta: &JobMeta) -> Result<(), TraceableError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|error| {
            TraceableError::with_error("Failed to create the job directory", &error)
        })?;
    }
    let contents = serde_json::to_string_pretty(meta).map_err(|error| {
        TraceableError::with_source("Failed to serialise the job metadata".into(), error.into())
    })?;
    std::fs::write(path, contents)
        .map_err(|error| TraceableError::with_error("Failed to write the job metadata", &error))
}

/// Sanitises an untrusted upload filename into a safe on-disk name. Ported from
/// `app/main.py::safe_filename`, expressed with manual char filtering rather than
/// a regex dependency (neither the teacher nor the rest of the pack reach for
/// `regex` for this class of problem).
pub fn safe_filename(name: &str) -> String {
    let trimmed = name.trim();
    let candidate = if trimmed.is_empty() { "document.pdf" } else { trimmed };

    // Keep only the final path segment, accepting either separator.
    let base_name = candidate
        .replace('\\', "/")
        .rsplit('/')
        .next()
        .unwrap_or(candidate)
        .to_string();

    let with_extension = if base_name.to_lowercase().ends_with(".pdf") {
        base_name
    } else {
        format!("{base_name}.pdf")
    };

    let mut sanitised = String::with_capacity(with_extension.len());
    let mut last_was_space = false;
    for character in with_extension.chars() {
        let keep = character.is_ascii_alphanumeric()
            || matches!(character, '.' | '_' | '-' | ' ');
        if keep {
            if character == ' ' {
                if !last_was_space {
                    sanitised.push(' ');
                }
                last_was_space = true;
            } else {
                sanitised.push(character);
                last_was_space = false;
            }
        } else {
            sanitised.push('_');
            last_was_space = false;
        }
    }

    let trimmed = sanitised.trim();
    let truncated: String = trimmed.chars().take(180).collect();
    if truncated.is_empty() {
        "document.pdf".to_string()
    } else {
        truncated
    }
}

/// Appends the `-optimised.pdf` suffix to a sanitised filename's stem, per §8 scenario 5.
pub fn optimised_name(original: &str) -> String {
    let safe = safe_filename(original);
    let stem = safe.strip_suffix(".pdf").unwrap_or(&safe);
    format!("{stem}-optimised.pdf")
}

fn to_iso8601(date: &OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        date.year(),
        u8::from(date.month()),
        date.day(),
        date.hour(),
        date.minute(),
        date.second(),
    )
}
