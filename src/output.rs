//! CLI output formatting for every command.
//!
//! # Output Format
//!
//! ## Process
//!
//! ```text
//! photos/sea.jpg → banner.jpg
//!     1200x630 jpeg, 84211 bytes
//! ```
//!
//! ## Batch
//!
//! ```text
//! 001 photos/sea.jpg → out/sea.jpg (84211 bytes, 3f9a01c2b7de)
//! 002 photos/bad.gif
//!     Failed: DecodeFailure: Failed to decode source image: ...
//!
//! Processed 1 of 2 images
//! ```
//!
//! ## Identify
//!
//! ```text
//! photos/sea.jpg
//!     Format: jpeg
//!     Size: 4000x3000
//!     Alpha: no
//!     ICC profile: 3144 bytes
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure and do no I/O.

use crate::imaging::SourceMetadata;
use crate::process::{BatchEvent, BatchOutcome};
use crate::request::ProcessResult;
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

// ============================================================================
// Process output
// ============================================================================

/// Format the outcome of a single `process` command.
pub fn format_process_result(source: &str, result: &ProcessResult) -> Vec<String> {
    match result {
        ProcessResult::Success {
            buffer,
            output_path,
            format,
            size,
        } => {
            let header = match output_path {
                Some(path) => format!("{} \u{2192} {}", source, path.display()),
                None => source.to_string(),
            };
            vec![
                header,
                format!(
                    "    {}x{} {}, {} bytes",
                    size.width,
                    size.height,
                    format,
                    buffer.len()
                ),
            ]
        }
        ProcessResult::Failure { kind, error } => {
            vec![source.to_string(), format!("    Failed: {:?}: {}", kind, error)]
        }
    }
}

/// Print process output to stdout.
pub fn print_process_result(source: &str, result: &ProcessResult) {
    for line in format_process_result(source, result) {
        println!("{}", line);
    }
}

// ============================================================================
// Batch output
// ============================================================================

/// Format a single batch progress event as display lines.
///
/// `Started` events print nothing; each job gets its lines when it ends.
pub fn format_batch_event(event: &BatchEvent) -> Vec<String> {
    match event {
        BatchEvent::Started { .. } => Vec::new(),
        BatchEvent::Finished {
            index,
            input,
            output_path,
            bytes,
            digest,
        } => vec![format!(
            "{} {} \u{2192} {} ({} bytes, {})",
            format_index(index + 1),
            input.display(),
            output_path.display(),
            bytes,
            digest
        )],
        BatchEvent::Failed {
            index,
            input,
            kind,
            error,
        } => vec![
            format!("{} {}", format_index(index + 1), input.display()),
            format!("    Failed: {:?}: {}", kind, error),
        ],
    }
}

/// Format the closing summary line of a batch.
pub fn format_batch_summary(outcomes: &[BatchOutcome]) -> Vec<String> {
    let succeeded = outcomes.iter().filter(|o| o.result.is_success()).count();
    vec![
        String::new(),
        format!("Processed {} of {} images", succeeded, outcomes.len()),
    ]
}

pub fn print_batch_summary(outcomes: &[BatchOutcome]) {
    for line in format_batch_summary(outcomes) {
        println!("{}", line);
    }
}

// ============================================================================
// Identify output
// ============================================================================

/// Format intrinsic source metadata.
pub fn format_identify(source: &Path, metadata: &SourceMetadata) -> Vec<String> {
    let mut lines = vec![source.display().to_string()];
    lines.push(format!(
        "    Format: {}",
        metadata.format.as_deref().unwrap_or("unknown")
    ));
    lines.push(format!("    Size: {}x{}", metadata.width, metadata.height));
    lines.push(format!(
        "    Alpha: {}",
        if metadata.has_alpha { "yes" } else { "no" }
    ));
    if let Some(icc) = &metadata.icc_profile {
        lines.push(format!("    ICC profile: {} bytes", icc.len()));
    }
    lines
}

pub fn print_identify(source: &Path, metadata: &SourceMetadata) {
    for line in format_identify(source, metadata) {
        println!("{}", line);
    }
}
