//! Boundary entry points: single transforms and parallel batches.
//!
//! [`process`] is what an HTTP or IPC layer calls: it takes a source and
//! loose options, and always answers with a [`ProcessResult`]. Bad input of
//! any kind becomes `{success: false}`; nothing here panics or retries.
//!
//! ## Batches
//!
//! A batch manifest is a JSON array of jobs:
//!
//! ```json
//! [
//!   { "input": "photos/sea.jpg", "options": { "format": "webp" } },
//!   { "input": "photos/hill.png", "options": { "outputPath": "custom/hill.png" } }
//! ]
//! ```
//!
//! Jobs without an `outputPath` are written to `<out-dir>/<input stem>.<ext>`.
//!
//! ## Parallel Processing
//!
//! Jobs run in parallel using [rayon](https://docs.rs/rayon) and share one
//! backend. The engine holds no mutable state, so jobs are independent: a
//! failing job never affects another. Progress is reported as
//! [`BatchEvent`]s over an optional channel so the CLI can print while work
//! is still running.

use crate::config::EngineConfig;
use crate::imaging::{
    ErrorKind, ImageBackend, OutputFormat, ProcessRequest, SourceInput, TransformError, transform,
};
use crate::request::{ProcessOptions, ProcessResult, resolve};
use rayon::prelude::*;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Run one transform. Every failure is reported in the result.
pub fn process(
    backend: &impl ImageBackend,
    source: SourceInput,
    options: &ProcessOptions,
    config: &EngineConfig,
) -> ProcessResult {
    let label = source.describe();
    let result = resolve(source, options, config).and_then(|request| transform(backend, &request));
    if let Err(err) = &result {
        log_failure(&label, err);
    }
    result.into()
}

/// Like [`process`], with options given as a JSON object string.
pub fn process_json(
    backend: &impl ImageBackend,
    source: SourceInput,
    options_json: &str,
    config: &EngineConfig,
) -> ProcessResult {
    match ProcessOptions::from_json(options_json) {
        Ok(options) => process(backend, source, &options, config),
        Err(err) => {
            log_failure(&source.describe(), &err);
            err.into()
        }
    }
}

fn log_failure(source: &str, err: &TransformError) {
    tracing::warn!(source, kind = ?err.kind(), error = %err, "transform failed");
}

/// One entry of a batch manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchJob {
    pub input: PathBuf,
    #[serde(default)]
    pub options: ProcessOptions,
}

/// Progress report for one batch job.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Started {
        index: usize,
        input: PathBuf,
    },
    Finished {
        index: usize,
        input: PathBuf,
        output_path: PathBuf,
        bytes: usize,
        /// Short SHA-256 of the encoded bytes.
        digest: String,
    },
    Failed {
        index: usize,
        input: PathBuf,
        kind: ErrorKind,
        error: String,
    },
}

/// Final result of one batch job, in manifest order.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub index: usize,
    pub input: PathBuf,
    pub result: ProcessResult,
}

/// Read a batch manifest.
pub fn load_batch(path: &Path) -> Result<Vec<BatchJob>, BatchError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// First 12 hex digits of the SHA-256 of `bytes`.
pub fn short_digest(bytes: &[u8]) -> String {
    let digest = format!("{:x}", Sha256::digest(bytes));
    digest[..12].to_string()
}

/// Where a job without an explicit `outputPath` is written.
pub fn default_output_path(out_dir: &Path, input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "banner".to_string());
    out_dir.join(format!("{}.{}", stem, format.extension()))
}

/// `<stem>-<n>.<ext>`, for a default destination already taken.
fn numbered_output_path(out_dir: &Path, input: &Path, format: OutputFormat, n: usize) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "banner".to_string());
    out_dir.join(format!("{}-{}.{}", stem, n, format.extension()))
}

/// Resolve every job and give each one its own destination.
///
/// Explicit `outputPath`s are claimed first, in manifest order; a later job
/// naming a path already claimed fails with `InvalidSpec`. Default
/// destinations that would collide (`a/sea.png` and `b/sea.png`) get a
/// numeric suffix instead.
fn plan_jobs(
    jobs: &[BatchJob],
    out_dir: &Path,
    config: &EngineConfig,
) -> Vec<Result<ProcessRequest, TransformError>> {
    let mut planned: Vec<_> = jobs
        .iter()
        .map(|job| resolve(SourceInput::Path(job.input.clone()), &job.options, config))
        .collect();
    let mut claimed: HashMap<PathBuf, usize> = HashMap::new();

    for (index, entry) in planned.iter_mut().enumerate() {
        let Some(path) = entry.as_ref().ok().and_then(|r| r.output_path.clone()) else {
            continue;
        };
        if let Some(&first) = claimed.get(&path) {
            *entry = Err(TransformError::InvalidSpec(format!(
                "outputPath {} is already used by job {}",
                path.display(),
                first + 1
            )));
        } else {
            claimed.insert(path, index);
        }
    }

    for (index, (entry, job)) in planned.iter_mut().zip(jobs).enumerate() {
        let Ok(request) = entry else { continue };
        if request.output_path.is_some() {
            continue;
        }
        let format = request.output.format;
        let mut path = default_output_path(out_dir, &job.input, format);
        let mut n = 2;
        while claimed.contains_key(&path) {
            path = numbered_output_path(out_dir, &job.input, format, n);
            n += 1;
        }
        claimed.insert(path.clone(), index);
        request.output_path = Some(path);
    }

    planned
}

fn send(events: &Option<Sender<BatchEvent>>, event: BatchEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is listening
        let _ = tx.send(event);
    }
}

/// Run every job in parallel, writing outputs under `out_dir`.
///
/// Returns one outcome per job in manifest order. Destinations are planned
/// before any work starts, so no two jobs ever write the same file. Only
/// failing to create `out_dir` aborts the batch.
pub fn process_batch(
    backend: &impl ImageBackend,
    jobs: &[BatchJob],
    out_dir: &Path,
    config: &EngineConfig,
    events: Option<Sender<BatchEvent>>,
) -> Result<Vec<BatchOutcome>, BatchError> {
    std::fs::create_dir_all(out_dir)?;
    tracing::info!(jobs = jobs.len(), out_dir = %out_dir.display(), "starting batch");

    let planned = plan_jobs(jobs, out_dir, config);

    let outcomes = planned
        .into_par_iter()
        .zip(jobs.par_iter())
        .enumerate()
        .map_with(events, |events, (index, (request, job))| {
            send(
                events,
                BatchEvent::Started {
                    index,
                    input: job.input.clone(),
                },
            );

            let result = match request.and_then(|request| transform(backend, &request)) {
                Ok(transformed) => {
                    send(
                        events,
                        BatchEvent::Finished {
                            index,
                            input: job.input.clone(),
                            output_path: transformed.output_path.clone().unwrap_or_default(),
                            bytes: transformed.buffer.len(),
                            digest: short_digest(&transformed.buffer),
                        },
                    );
                    transformed.into()
                }
                Err(err) => {
                    log_failure(&job.input.display().to_string(), &err);
                    send(
                        events,
                        BatchEvent::Failed {
                            index,
                            input: job.input.clone(),
                            kind: err.kind(),
                            error: err.to_string(),
                        },
                    );
                    err.into()
                }
            };

            BatchOutcome {
                index,
                input: job.input.clone(),
                result,
            }
        })
        .collect();

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use std::fs;
    use tempfile::TempDir;

    fn options(json: &str) -> ProcessOptions {
        ProcessOptions::from_json(json).unwrap()
    }

    fn job(input: &str, json: &str) -> BatchJob {
        BatchJob {
            input: PathBuf::from(input),
            options: options(json),
        }
    }

    // =========================================================================
    // process tests
    // =========================================================================

    #[test]
    fn process_success_returns_buffer() {
        let backend = MockBackend::with_source(800, 600);
        let result = process(
            &backend,
            SourceInput::Bytes(vec![0; 4]),
            &ProcessOptions::default(),
            &EngineConfig::default(),
        );
        assert!(result.is_success());
        assert_eq!(result.buffer(), Some(&[0xAB; 16][..]));
    }

    #[test]
    fn process_invalid_spec_never_touches_backend() {
        let backend = MockBackend::with_source(800, 600);
        let result = process(
            &backend,
            SourceInput::Bytes(vec![0; 4]),
            &options(r#"{"quality": 0}"#),
            &EngineConfig::default(),
        );
        assert_eq!(result.error_kind(), Some(ErrorKind::InvalidSpec));
        assert_eq!(result.buffer(), None);
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn process_unsupported_format() {
        let backend = MockBackend::with_source(800, 600);
        let result = process(
            &backend,
            SourceInput::Bytes(vec![0; 4]),
            &options(r#"{"format": "gif"}"#),
            &EngineConfig::default(),
        );
        assert_eq!(result.error_kind(), Some(ErrorKind::UnsupportedFormat));
    }

    #[test]
    fn process_decode_failure_is_reported() {
        let backend = MockBackend::new();
        let result = process(
            &backend,
            SourceInput::Path("/missing.jpg".into()),
            &ProcessOptions::default(),
            &EngineConfig::default(),
        );
        assert_eq!(result.error_kind(), Some(ErrorKind::DecodeFailure));
    }

    #[test]
    fn process_json_rejects_malformed_options() {
        let backend = MockBackend::with_source(10, 10);
        let result = process_json(
            &backend,
            SourceInput::Bytes(vec![]),
            "[1, 2",
            &EngineConfig::default(),
        );
        assert_eq!(result.error_kind(), Some(ErrorKind::InvalidSpec));
    }

    #[test]
    fn process_json_applies_options() {
        let backend = MockBackend::with_source(100, 100);
        let result = process_json(
            &backend,
            SourceInput::Bytes(vec![]),
            r#"{"format": "png", "quality": 12}"#,
            &EngineConfig::default(),
        );
        assert!(result.is_success());
        assert!(backend.get_operations().contains(&RecordedOp::Encode {
            format: OutputFormat::Png,
            quality: 12,
        }));
    }

    // =========================================================================
    // batch tests
    // =========================================================================

    #[test]
    fn short_digest_is_twelve_hex_chars() {
        let digest = short_digest(b"abc");
        assert_eq!(digest, "ba7816bf8f01");
    }

    #[test]
    fn default_output_path_uses_stem_and_extension() {
        let path = default_output_path(
            Path::new("/out"),
            Path::new("photos/sea.view.png"),
            OutputFormat::Jpeg,
        );
        assert_eq!(path, PathBuf::from("/out/sea.view.jpg"));
    }

    #[test]
    fn parse_batch_manifest() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("jobs.json");
        fs::write(
            &path,
            r#"[{"input": "a.jpg"}, {"input": "b.png", "options": {"format": "webp", "ignored": 1}}]"#,
        )
        .unwrap();

        let jobs = load_batch(&path).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].options, ProcessOptions::default());
        assert_eq!(jobs[1].options.format.as_deref(), Some("webp"));
    }

    #[test]
    fn batch_writes_default_paths_and_reports_events() {
        let tmp = TempDir::new().unwrap();
        let out_dir = tmp.path().join("out");
        let backend = MockBackend::with_source(640, 480);
        let jobs = vec![
            job("photos/sea.jpg", "{}"),
            job("photos/hill.png", r#"{"format": "webp"}"#),
        ];

        let (tx, rx) = std::sync::mpsc::channel();
        let outcomes =
            process_batch(&backend, &jobs, &out_dir, &EngineConfig::default(), Some(tx)).unwrap();
        let events: Vec<BatchEvent> = rx.iter().collect();

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.result.is_success()));
        assert_eq!(outcomes[1].input, PathBuf::from("photos/hill.png"));
        assert!(out_dir.join("sea.jpg").exists());
        assert!(out_dir.join("hill.webp").exists());

        assert_eq!(events.len(), 4);
        let expected = short_digest(&[0xAB; 16]);
        let finished = events
            .iter()
            .filter(|e| {
                matches!(e, BatchEvent::Finished { digest, bytes: 16, .. } if *digest == expected)
            })
            .count();
        assert_eq!(finished, 2);
    }

    #[test]
    fn batch_failure_is_isolated() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::with_source(100, 100);
        let jobs = vec![
            job("good.jpg", "{}"),
            job("bad.jpg", r#"{"crop": "sideways"}"#),
            job("also-good.jpg", r#"{"format": "png"}"#),
        ];

        let (tx, rx) = std::sync::mpsc::channel();
        let outcomes =
            process_batch(&backend, &jobs, tmp.path(), &EngineConfig::default(), Some(tx)).unwrap();
        let events: Vec<BatchEvent> = rx.iter().collect();

        assert!(outcomes[0].result.is_success());
        assert_eq!(outcomes[1].result.error_kind(), Some(ErrorKind::InvalidSpec));
        assert!(outcomes[2].result.is_success());
        assert!(events.iter().any(|e| matches!(
            e,
            BatchEvent::Failed { index: 1, kind: ErrorKind::InvalidSpec, .. }
        )));
        assert!(!tmp.path().join("bad.jpg").exists());
    }

    #[test]
    fn batch_honours_explicit_output_path() {
        let tmp = TempDir::new().unwrap();
        let custom = tmp.path().join("custom.png");
        let backend = MockBackend::with_source(100, 100);
        let json = format!(
            r#"{{"format": "png", "outputPath": {:?}}}"#,
            custom.display().to_string()
        );
        let jobs = vec![job("x.jpg", &json)];

        let out_dir = tmp.path().join("out");
        let outcomes =
            process_batch(&backend, &jobs, &out_dir, &EngineConfig::default(), None).unwrap();
        assert!(custom.exists());
        assert!(matches!(
            &outcomes[0].result,
            ProcessResult::Success { output_path: Some(p), .. } if *p == custom
        ));
    }

    #[test]
    fn batch_gives_repeated_stems_distinct_paths() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::with_source(100, 100);
        let jobs = vec![
            job("a/sea.png", r#"{"format": "png"}"#),
            job("b/sea.png", r#"{"format": "png"}"#),
            job("c/sea.jpg", r#"{"format": "png"}"#),
        ];

        let outcomes =
            process_batch(&backend, &jobs, tmp.path(), &EngineConfig::default(), None).unwrap();

        let paths: Vec<PathBuf> = outcomes
            .iter()
            .map(|o| match &o.result {
                ProcessResult::Success { output_path: Some(p), .. } => p.clone(),
                other => panic!("unexpected result {other:?}"),
            })
            .collect();
        assert_eq!(
            paths,
            vec![
                tmp.path().join("sea.png"),
                tmp.path().join("sea-2.png"),
                tmp.path().join("sea-3.png"),
            ]
        );
        assert!(paths.iter().all(|p| p.exists()));
    }

    #[test]
    fn default_path_skips_explicitly_claimed_destination() {
        let tmp = TempDir::new().unwrap();
        let claimed = tmp.path().join("sea.png");
        let json = format!(
            r#"{{"format": "png", "outputPath": {:?}}}"#,
            claimed.display().to_string()
        );
        let jobs = vec![job("sea.png", r#"{"format": "png"}"#), job("other.jpg", &json)];

        let planned = plan_jobs(&jobs, tmp.path(), &EngineConfig::default());
        assert_eq!(
            planned[0].as_ref().unwrap().output_path,
            Some(tmp.path().join("sea-2.png"))
        );
        assert_eq!(planned[1].as_ref().unwrap().output_path, Some(claimed));
    }

    #[test]
    fn repeated_explicit_output_path_fails_later_job() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::with_source(100, 100);
        let json = format!(
            r#"{{"outputPath": {:?}}}"#,
            tmp.path().join("same.jpg").display().to_string()
        );
        let jobs = vec![job("one.jpg", &json), job("two.jpg", &json)];

        let outcomes =
            process_batch(&backend, &jobs, tmp.path(), &EngineConfig::default(), None).unwrap();
        assert!(outcomes[0].result.is_success());
        assert_eq!(outcomes[1].result.error_kind(), Some(ErrorKind::InvalidSpec));
    }
}
