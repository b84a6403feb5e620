//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the stages every backend must support:
//! identify, decode, cover-fit, composite and encode. The pipeline in
//! [`operations`](super::operations) only talks to this trait, so it can be
//! exercised against a recording mock without touching pixels.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::calculations::FitPlan;
use super::overlay::OverlayLayer;
use super::params::EncodeParams;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Every way a transform can fail. None of these are retried internally.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Failed to decode source image: {0}")]
    Decode(String),
    #[error("Invalid output spec: {0}")]
    InvalidSpec(String),
    #[error("Unsupported output format: {0:?}")]
    UnsupportedFormat(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed overlay layer: {0}")]
    Overlay(String),
}

/// Caller-visible classification of a [`TransformError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    DecodeFailure,
    InvalidSpec,
    UnsupportedFormat,
    EncodeFailure,
    IoFailure,
    OverlayFailure,
}

impl TransformError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(_) => ErrorKind::DecodeFailure,
            Self::InvalidSpec(_) => ErrorKind::InvalidSpec,
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::Encode(_) => ErrorKind::EncodeFailure,
            Self::Io { .. } => ErrorKind::IoFailure,
            Self::Overlay(_) => ErrorKind::OverlayFailure,
        }
    }
}

/// Pixel dimensions of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Where the source photograph comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceInput {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

impl SourceInput {
    /// Short human label for logs and CLI output.
    pub fn describe(&self) -> String {
        match self {
            Self::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
            Self::Path(path) => path.display().to_string(),
        }
    }
}

/// Intrinsic properties of a decoded source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceMetadata {
    pub width: u32,
    pub height: u32,
    /// Container format sniffed from the content, e.g. `"jpeg"`.
    pub format: Option<String>,
    /// Embedded ICC color profile, if the container carries one.
    #[serde(skip)]
    pub icc_profile: Option<Vec<u8>>,
    pub has_alpha: bool,
}

impl SourceMetadata {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }
}

/// A decoded source raster. Owned by exactly one pipeline invocation and
/// consumed by the fit stage.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub image: DynamicImage,
    pub metadata: SourceMetadata,
}

impl SourceImage {
    pub fn dimensions(&self) -> Dimensions {
        self.metadata.dimensions()
    }
}

/// Trait for image processing backends.
///
/// Implementations must hold no mutable state: one backend value is shared
/// by every concurrent invocation.
pub trait ImageBackend: Sync {
    /// Read dimensions, format and color profile without a full decode.
    fn identify(&self, input: &SourceInput) -> Result<SourceMetadata, TransformError>;

    /// Decode the full raster.
    fn decode(&self, input: &SourceInput) -> Result<SourceImage, TransformError>;

    /// Scale and crop so the result is exactly `plan.target`.
    fn cover_fit(&self, source: SourceImage, plan: &FitPlan)
    -> Result<DynamicImage, TransformError>;

    /// Alpha-composite the overlay layer over `base` at (0, 0).
    fn composite(
        &self,
        base: DynamicImage,
        layer: &OverlayLayer,
    ) -> Result<DynamicImage, TransformError>;

    /// Serialize the final raster.
    fn encode(&self, image: &DynamicImage, params: &EncodeParams)
    -> Result<Vec<u8>, TransformError>;
}
