//! High-level image operations.
//!
//! These functions combine calculations with backend execution. A transform
//! runs strictly in sequence: decode, plan, cover-fit, overlay, encode and
//! (optionally) persist. Every intermediate buffer is local to one call.

use super::backend::{Dimensions, ImageBackend, SourceInput, SourceMetadata, TransformError};
use super::calculations::FitPlan;
use super::overlay::{OverlayLayer, OverlayStyle, compose_overlay};
use super::params::{EncodeParams, OutputFormat, OutputSpec, TextOverlaySpec, WatermarkSpec};
use std::path::{Path, PathBuf};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, TransformError>;

/// One fully validated transform request.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub source: SourceInput,
    pub output: OutputSpec,
    pub text: Option<TextOverlaySpec>,
    pub watermark: Option<WatermarkSpec>,
    pub style: OverlayStyle,
    /// When set, the encoded bytes are also written here.
    pub output_path: Option<PathBuf>,
}

impl ProcessRequest {
    /// Request with no overlay and no destination path.
    pub fn new(source: SourceInput, output: OutputSpec) -> Self {
        Self {
            source,
            output,
            text: None,
            watermark: None,
            style: OverlayStyle::default(),
            output_path: None,
        }
    }
}

/// Successful transform output.
#[derive(Debug, Clone)]
pub struct Transformed {
    pub buffer: Vec<u8>,
    pub output_path: Option<PathBuf>,
    pub size: Dimensions,
    pub format: OutputFormat,
}

/// Read source metadata using the backend.
pub fn identify(backend: &impl ImageBackend, input: &SourceInput) -> Result<SourceMetadata> {
    backend.identify(input)
}

/// Plan the cover-fit for a source of `source` size.
pub fn plan_fit(source: Dimensions, output: &OutputSpec) -> FitPlan {
    FitPlan::new(source, output.size, output.crop)
}

/// Overlay layer for the request, sized to the output canvas.
pub fn plan_overlay(request: &ProcessRequest) -> Option<OverlayLayer> {
    compose_overlay(
        request.output.size,
        request.text.as_ref(),
        request.watermark.as_ref(),
        &request.style,
    )
}

/// Run the full pipeline for one request.
///
/// Either the complete encoded buffer is returned or an error is; a failed
/// encode never touches the destination path.
pub fn transform(backend: &impl ImageBackend, request: &ProcessRequest) -> Result<Transformed> {
    let source = backend.decode(&request.source)?;
    let source_dims = source.dimensions();
    let icc_profile = source.metadata.icc_profile.clone();
    tracing::debug!(
        source = %request.source.describe(),
        width = source_dims.width,
        height = source_dims.height,
        "decoded source"
    );

    let plan = plan_fit(source_dims, &request.output);
    tracing::debug!(
        scaled_width = plan.scaled.width,
        scaled_height = plan.scaled.height,
        crop = %plan.crop,
        "planned cover fit"
    );
    let fitted = backend.cover_fit(source, &plan)?;

    let composed = match plan_overlay(request) {
        Some(layer) => {
            tracing::debug!(elements = layer.elements.len(), "compositing overlay");
            backend.composite(fitted, &layer)?
        }
        None => fitted,
    };

    let params = EncodeParams {
        icc_profile,
        ..request.output.encode_params()
    };
    let buffer = backend.encode(&composed, &params)?;
    tracing::debug!(bytes = buffer.len(), format = %params.format, "encoded");

    if let Some(path) = &request.output_path {
        write_output(path, &buffer)?;
    }

    tracing::info!(
        format = %params.format,
        width = request.output.size.width,
        height = request.output.size.height,
        bytes = buffer.len(),
        "transform complete"
    );

    Ok(Transformed {
        buffer,
        output_path: request.output_path.clone(),
        size: request.output.size,
        format: params.format,
    })
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).map_err(|source| TransformError::Io {
        path: path.to_path_buf(),
        source,
    })
}
