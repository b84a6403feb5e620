//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify / decode (JPEG, PNG, TIFF, WebP) | `image::ImageReader` with content sniffing |
//! | Crop | `image::DynamicImage::crop_imm` of the source window, offset from [`FitPlan`] or [`smart_crop`](super::smart_crop) |
//! | Scale | `image::DynamicImage::resize_exact` of that window with `Lanczos3` filter |
//! | Overlay | `resvg`/`usvg` rasterization, see [`compositor`](super::compositor) |
//! | Encode | see [`encode`](super::encode) |

use super::backend::{
    Dimensions, ImageBackend, SourceImage, SourceInput, SourceMetadata, TransformError,
};
use super::calculations::FitPlan;
use super::compositor::{build_fontdb, composite_layer, rasterize};
use super::encode::encode_image;
use super::overlay::OverlayLayer;
use super::params::EncodeParams;
use super::smart_crop::attention_offset;
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use resvg::usvg::fontdb;
use std::borrow::Cow;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

/// Pure Rust backend using the `image` and `resvg` crate ecosystems.
///
/// Holds only the read-only font database, so one value can be shared by
/// every worker thread.
pub struct RustBackend {
    fontdb: Arc<fontdb::Database>,
}

impl RustBackend {
    /// Backend with the host's system fonts loaded.
    pub fn new() -> Self {
        Self::from_fonts(true, &[])
    }

    /// Backend with an explicit font setup. `load_system = false` plus an
    /// empty `dirs` gives a hermetic backend that still renders shapes.
    pub fn from_fonts(load_system: bool, dirs: &[PathBuf]) -> Self {
        Self {
            fontdb: build_fontdb(load_system, dirs),
        }
    }

    pub fn font_faces(&self) -> usize {
        self.fontdb.len()
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw encoded bytes of the source, reading from disk when needed.
fn source_bytes(input: &SourceInput) -> Result<Cow<'_, [u8]>, TransformError> {
    match input {
        SourceInput::Bytes(bytes) => Ok(Cow::Borrowed(bytes.as_slice())),
        SourceInput::Path(path) => std::fs::read(path).map(Cow::Owned).map_err(|e| {
            TransformError::Decode(format!("Failed to read {}: {}", path.display(), e))
        }),
    }
}

fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg".to_string(),
        ImageFormat::Png => "png".to_string(),
        ImageFormat::Tiff => "tiff".to_string(),
        ImageFormat::WebP => "webp".to_string(),
        other => format!("{other:?}").to_lowercase(),
    }
}

/// Sniff the container and open a decoder, reporting metadata alongside it.
fn open_decoder(
    bytes: &[u8],
) -> Result<(impl ImageDecoder + '_, SourceMetadata), TransformError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| TransformError::Decode(e.to_string()))?;
    let format = reader
        .format()
        .ok_or_else(|| TransformError::Decode("unrecognized image data".to_string()))?;

    let mut decoder = reader.into_decoder().map_err(|e| {
        TransformError::Decode(format!("No decoder for {}: {}", format_name(format), e))
    })?;

    let (width, height) = decoder.dimensions();
    if width == 0 || height == 0 {
        return Err(TransformError::Decode(format!(
            "source has empty dimensions {width}x{height}"
        )));
    }

    let icc_profile = decoder.icc_profile().unwrap_or_default();
    let metadata = SourceMetadata {
        width,
        height,
        format: Some(format_name(format)),
        icc_profile,
        has_alpha: decoder.color_type().has_alpha(),
    };
    Ok((decoder, metadata))
}

/// Attention-based offset on the scaled raster, scored on a stand-in no
/// larger than the scoring budget.
fn smart_offset(image: &DynamicImage, plan: &FitPlan) -> (u32, u32) {
    let (raster, window) = plan.scoring_plan();
    let proxy = image.resize_exact(raster.width, raster.height, FilterType::Triangle);
    let found = attention_offset(&proxy, window);
    plan.offset_from_scoring(raster, found)
}

impl ImageBackend for RustBackend {
    fn identify(&self, input: &SourceInput) -> Result<SourceMetadata, TransformError> {
        let bytes = source_bytes(input)?;
        let (_, metadata) = open_decoder(&bytes)?;
        Ok(metadata)
    }

    fn decode(&self, input: &SourceInput) -> Result<SourceImage, TransformError> {
        let bytes = source_bytes(input)?;
        let (decoder, metadata) = open_decoder(&bytes)?;
        let image = DynamicImage::from_decoder(decoder)
            .map_err(|e| TransformError::Decode(format!("{}: {}", input.describe(), e)))?;
        Ok(SourceImage { image, metadata })
    }

    fn cover_fit(&self, source: SourceImage, plan: &FitPlan) -> Result<DynamicImage, TransformError> {
        let Dimensions { width, height } = plan.target;
        let image = source.image;

        // Exact-size sources pass through untouched so lossless round trips stay exact
        if plan.is_identity_scale() {
            if plan.scaled == plan.target {
                return Ok(image);
            }
            let (x, y) = plan
                .fixed_offset()
                .unwrap_or_else(|| attention_offset(&image, plan.target));
            tracing::debug!(x, y, crop = %plan.crop, "crop window");
            return Ok(image.crop_imm(x, y, width, height));
        }

        if plan.scaled == plan.target {
            return Ok(image.resize_exact(width, height, FilterType::Lanczos3));
        }

        let offset = match plan.fixed_offset() {
            Some(offset) => offset,
            None => smart_offset(&image, plan),
        };
        let (x, y, w, h) = plan.source_window(offset);
        tracing::debug!(
            x,
            y,
            window_width = w,
            window_height = h,
            crop = %plan.crop,
            "crop window"
        );
        Ok(image
            .crop_imm(x, y, w, h)
            .resize_exact(width, height, FilterType::Lanczos3))
    }

    fn composite(&self, base: DynamicImage, layer: &OverlayLayer) -> Result<DynamicImage, TransformError> {
        let raster = rasterize(layer, &self.fontdb)?;
        composite_layer(base, &raster)
    }

    fn encode(&self, image: &DynamicImage, params: &EncodeParams) -> Result<Vec<u8>, TransformError> {
        encode_image(image, params)
    }
}
