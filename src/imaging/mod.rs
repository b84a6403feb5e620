//! Image transform engine, pure Rust.
//!
//! | Stage | Crate / function |
//! |---|---|
//! | **Identify / decode** | `image::ImageReader` (JPEG, PNG, TIFF, WebP) |
//! | **Cover-fit** | Lanczos3 `resize_exact` + `crop_imm`, attention scoring for `smart` |
//! | **Overlay** | SVG markup rendered by `resvg` |
//! | **Encode** | `image` (JPEG, PNG) and `webp` (libwebp) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for cover-fit geometry (unit testable)
//! - **Parameters**: Validated tokens and specs describing one transform
//! - **Overlay**: Pure layout of text runs and their SVG markup
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: The sequential pipeline combining all of the above

pub mod backend;
mod calculations;
mod compositor;
mod encode;
pub mod operations;
pub mod overlay;
pub mod params;
pub mod rust_backend;
mod smart_crop;

pub use backend::{
    Dimensions, ErrorKind, ImageBackend, SourceImage, SourceInput, SourceMetadata, TransformError,
};
pub use calculations::{FitPlan, calculate_fill_dimensions, crop_offset};
pub use operations::{ProcessRequest, Transformed, identify, plan_fit, plan_overlay, transform};
pub use overlay::{OverlayLayer, OverlayStyle, compose_overlay, escape_xml};
pub use params::{
    CropPolicy, EncodeParams, MAX_DIMENSION, OutputFormat, OutputSpec, Quality, TextOverlaySpec,
    TextPosition, WatermarkPosition, WatermarkSpec, parse_dimension,
};
pub use rust_backend::RustBackend;
