//! Parameter types for the transform pipeline.
//!
//! These types describe *what* to produce, not *how*. Every caller-supplied
//! token is parsed here, and invalid values are rejected instead of clamped:
//! a request either describes a valid output or fails with
//! [`TransformError::InvalidSpec`] / [`TransformError::UnsupportedFormat`].
//!
//! ## Types
//!
//! - [`OutputFormat`]: `jpeg`, `png`, `webp` (exact, lowercase).
//! - [`CropPolicy`]: `smart`, `center`, `top`, `bottom`, `left`, `right`.
//! - [`Quality`]: Integer encoding quality in 1–100, default 90.
//! - [`OutputSpec`]: Target size, format, quality and crop policy together.
//! - [`TextOverlaySpec`] / [`WatermarkSpec`]: Optional overlay content.

use super::backend::{Dimensions, TransformError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest accepted target edge. Guards against absurd allocations.
pub const MAX_DIMENSION: u32 = 16_384;

/// Encoded output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    Webp,
}

impl OutputFormat {
    pub fn token(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }

    /// File extension for derived output names.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for OutputFormat {
    type Err = TransformError;

    /// Tokens are case-sensitive: `"JPEG"` and `"jpg"` are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::Webp),
            other => Err(TransformError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Where the crop window lands once the source is scaled to cover the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropPolicy {
    /// Content-aware: the window covering the most salient region.
    Smart,
    Center,
    Top,
    Bottom,
    Left,
    Right,
}

impl CropPolicy {
    pub fn token(self) -> &'static str {
        match self {
            Self::Smart => "smart",
            Self::Center => "center",
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for CropPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for CropPolicy {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "smart" => Ok(Self::Smart),
            "center" => Ok(Self::Center),
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(TransformError::InvalidSpec(format!(
                "unknown crop policy {other:?}"
            ))),
        }
    }
}

/// Quality setting for encoding (1-100).
///
/// For JPEG and WebP this is lossy quality; for PNG it selects compression
/// effort (see [`Quality::png_effort`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    /// Validate a caller-supplied quality. Non-integral or out-of-range
    /// values are rejected, never clamped.
    pub fn try_new(value: f64) -> Result<Self, TransformError> {
        if !value.is_finite() || value.fract() != 0.0 || !(1.0..=100.0).contains(&value) {
            return Err(TransformError::InvalidSpec(format!(
                "quality must be an integer in 1-100, got {value}"
            )));
        }
        Ok(Self(value as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Map quality onto PNG compression effort.
    pub fn png_effort(self) -> PngEffort {
        match self.0 {
            1..=33 => PngEffort::Fast,
            34..=66 => PngEffort::Default,
            _ => PngEffort::Best,
        }
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// PNG compression effort buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PngEffort {
    Fast,
    Default,
    Best,
}

/// Validate one requested target edge.
///
/// Must be finite, integral, positive and at most [`MAX_DIMENSION`].
pub fn parse_dimension(name: &str, value: f64) -> Result<u32, TransformError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(TransformError::InvalidSpec(format!(
            "{name} must be a positive finite number, got {value}"
        )));
    }
    if value.fract() != 0.0 {
        return Err(TransformError::InvalidSpec(format!(
            "{name} must be a whole number of pixels, got {value}"
        )));
    }
    if value > MAX_DIMENSION as f64 {
        return Err(TransformError::InvalidSpec(format!(
            "{name} must be at most {MAX_DIMENSION}, got {value}"
        )));
    }
    Ok(value as u32)
}

/// Validated description of the output raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSpec {
    pub size: Dimensions,
    pub format: OutputFormat,
    pub quality: Quality,
    pub crop: CropPolicy,
}

impl OutputSpec {
    pub fn encode_params(&self) -> EncodeParams {
        EncodeParams {
            format: self.format,
            quality: self.quality,
            icc_profile: None,
        }
    }
}

/// Parameters for the encode stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeParams {
    pub format: OutputFormat,
    pub quality: Quality,
    /// Source color profile. Embedded in JPEG and PNG output when it
    /// describes an RGB space; WebP output is always untagged.
    pub icc_profile: Option<Vec<u8>>,
}

/// Vertical anchor of the title/subtitle block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPosition {
    Top,
    Center,
    Bottom,
}

impl TextPosition {
    /// Fraction of the canvas height where the text block is anchored.
    pub fn anchor_fraction(self) -> f64 {
        match self {
            Self::Top => 0.3,
            Self::Center => 0.5,
            Self::Bottom => 0.7,
        }
    }
}

impl FromStr for TextPosition {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(Self::Top),
            "center" => Ok(Self::Center),
            "bottom" => Ok(Self::Bottom),
            other => Err(TransformError::InvalidSpec(format!(
                "unknown text position {other:?}"
            ))),
        }
    }
}

/// Canvas corner for the watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl WatermarkPosition {
    pub fn is_left(self) -> bool {
        matches!(self, Self::TopLeft | Self::BottomLeft)
    }

    pub fn is_top(self) -> bool {
        matches!(self, Self::TopLeft | Self::TopRight)
    }
}

impl FromStr for WatermarkPosition {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top-left" => Ok(Self::TopLeft),
            "top-right" => Ok(Self::TopRight),
            "bottom-left" => Ok(Self::BottomLeft),
            "bottom-right" => Ok(Self::BottomRight),
            other => Err(TransformError::InvalidSpec(format!(
                "unknown watermark position {other:?}"
            ))),
        }
    }
}

/// Title/subtitle block. Only constructed when at least one of the two
/// strings is non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextOverlaySpec {
    pub title: String,
    pub subtitle: String,
    pub title_color: String,
    pub subtitle_color: String,
    pub position: TextPosition,
    /// Full-canvas fill; `None` when unset or `"transparent"`.
    pub background_color: Option<String>,
}

/// Corner watermark. Only constructed for non-empty text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkSpec {
    pub text: String,
    pub position: WatermarkPosition,
}
