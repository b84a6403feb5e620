//! Final serialization of the composited raster.
//!
//! | Format | Encoder | Quality meaning |
//! |---|---|---|
//! | JPEG | `image::codecs::jpeg::JpegEncoder` | lossy quality; alpha dropped |
//! | PNG | `image::codecs::png::PngEncoder` | compression effort; always lossless |
//! | WebP | `webp::Encoder` (libwebp) | lossy quality |
//!
//! All encoders are deterministic for a fixed input and configuration, so
//! identical requests produce byte-identical output.
//!
//! JPEG and PNG carry the source's ICC profile when it describes an RGB
//! space. Other profiles (gray, CMYK) no longer match the 8-bit RGB(A)
//! output and are dropped. WebP output is untagged and reads as sRGB.

use super::backend::TransformError;
use super::params::{EncodeParams, OutputFormat, PngEffort, Quality};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder};

/// Encode `image` into an in-memory buffer.
pub fn encode_image(image: &DynamicImage, params: &EncodeParams) -> Result<Vec<u8>, TransformError> {
    match params.format {
        OutputFormat::Jpeg => encode_jpeg(image, params),
        OutputFormat::Png => encode_png(image, params),
        OutputFormat::Webp => encode_webp(image, params.quality),
    }
}

/// Whether an ICC header declares an RGB data color space.
fn is_rgb_profile(profile: &[u8]) -> bool {
    profile.get(16..20) == Some(b"RGB ".as_slice())
}

fn embed_profile(encoder: &mut impl ImageEncoder, params: &EncodeParams) {
    let Some(profile) = params.icc_profile.as_deref() else {
        return;
    };
    if !is_rgb_profile(profile) {
        tracing::debug!(bytes = profile.len(), "dropping non-RGB ICC profile");
        return;
    }
    if let Err(err) = encoder.set_icc_profile(profile.to_vec()) {
        tracing::debug!(%err, format = %params.format, "encoder cannot embed ICC profile");
    }
}

fn encode_jpeg(image: &DynamicImage, params: &EncodeParams) -> Result<Vec<u8>, TransformError> {
    let rgb = image.to_rgb8();
    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, params.quality.value());
    embed_profile(&mut encoder, params);
    encoder
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|e| TransformError::Encode(format!("JPEG encode failed: {e}")))?;
    Ok(buffer)
}

fn encode_png(image: &DynamicImage, params: &EncodeParams) -> Result<Vec<u8>, TransformError> {
    let compression = match params.quality.png_effort() {
        PngEffort::Fast => CompressionType::Fast,
        PngEffort::Default => CompressionType::Default,
        PngEffort::Best => CompressionType::Best,
    };

    let mut buffer = Vec::new();
    let mut encoder = PngEncoder::new_with_quality(&mut buffer, compression, FilterType::Adaptive);
    embed_profile(&mut encoder, params);
    let result = if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        encoder.write_image(rgba.as_raw(), rgba.width(), rgba.height(), ExtendedColorType::Rgba8)
    } else {
        let rgb = image.to_rgb8();
        encoder.write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
    };
    result.map_err(|e| TransformError::Encode(format!("PNG encode failed: {e}")))?;
    Ok(buffer)
}

fn encode_webp(image: &DynamicImage, quality: Quality) -> Result<Vec<u8>, TransformError> {
    let quality = quality.value() as f32;
    let encoded = if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height())
            .encode_simple(false, quality)
    } else {
        let rgb = image.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height())
            .encode_simple(false, quality)
    };
    let memory =
        encoded.map_err(|e| TransformError::Encode(format!("WebP encode failed: {e:?}")))?;
    Ok(memory.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageDecoder, Rgb, RgbImage, Rgba, RgbaImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 4 % 256) as u8, (y * 4 % 256) as u8, 90])
        }))
    }

    fn params(format: OutputFormat, quality: f64) -> EncodeParams {
        EncodeParams {
            format,
            quality: Quality::try_new(quality).unwrap(),
            icc_profile: None,
        }
    }

    /// Minimal ICC-shaped blob: 128-byte header with the data color space
    /// field set to `space`.
    fn fake_profile(space: &[u8; 4]) -> Vec<u8> {
        let mut profile = vec![0u8; 128];
        profile[..4].copy_from_slice(&128u32.to_be_bytes());
        profile[16..20].copy_from_slice(space);
        profile[36..40].copy_from_slice(b"acsp");
        profile
    }

    fn embedded_profile(bytes: &[u8]) -> Option<Vec<u8>> {
        let mut decoder = image::ImageReader::new(std::io::Cursor::new(bytes))
            .with_guessed_format()
            .unwrap()
            .into_decoder()
            .unwrap();
        decoder.icc_profile().unwrap()
    }

    #[test]
    fn rgb_profile_is_embedded_in_jpeg_and_png() {
        let profile = fake_profile(b"RGB ");
        for format in [OutputFormat::Jpeg, OutputFormat::Png] {
            let params = EncodeParams {
                icc_profile: Some(profile.clone()),
                ..params(format, 90.0)
            };
            let bytes = encode_image(&gradient(16, 16), &params).unwrap();
            assert_eq!(embedded_profile(&bytes), Some(profile.clone()), "{format}");
        }
    }

    #[test]
    fn non_rgb_profile_is_dropped() {
        let params = EncodeParams {
            icc_profile: Some(fake_profile(b"CMYK")),
            ..params(OutputFormat::Png, 90.0)
        };
        let bytes = encode_image(&gradient(16, 16), &params).unwrap();
        assert_eq!(embedded_profile(&bytes), None);
    }

    #[test]
    fn untagged_source_gives_untagged_output() {
        let bytes = encode_image(&gradient(16, 16), &params(OutputFormat::Jpeg, 90.0)).unwrap();
        assert_eq!(embedded_profile(&bytes), None);
    }

    #[test]
    fn jpeg_has_soi_marker() {
        let bytes = encode_image(&gradient(32, 24), &params(OutputFormat::Jpeg, 90.0)).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
    }

    #[test]
    fn jpeg_quality_changes_size() {
        let img = gradient(64, 64);
        let low = encode_image(&img, &params(OutputFormat::Jpeg, 10.0)).unwrap();
        let high = encode_image(&img, &params(OutputFormat::Jpeg, 100.0)).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn png_is_lossless_at_every_effort() {
        let img = gradient(40, 30);
        for quality in [1.0, 50.0, 100.0] {
            let bytes = encode_image(&img, &params(OutputFormat::Png, quality)).unwrap();
            assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
            let decoded = image::load_from_memory(&bytes).unwrap();
            assert_eq!(decoded.to_rgb8(), img.to_rgb8(), "quality {quality}");
        }
    }

    #[test]
    fn png_keeps_alpha_when_present() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 77])));
        let bytes = encode_image(&img, &params(OutputFormat::Png, 90.0)).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert!(decoded.color().has_alpha());
        assert_eq!(decoded.to_rgba8().get_pixel(0, 0), &Rgba([1, 2, 3, 77]));
    }

    #[test]
    fn webp_has_riff_header() {
        let bytes = encode_image(&gradient(32, 32), &params(OutputFormat::Webp, 80.0)).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    #[test]
    fn encoding_is_deterministic() {
        let img = gradient(48, 32);
        for format in [OutputFormat::Jpeg, OutputFormat::Png, OutputFormat::Webp] {
            let a = encode_image(&img, &params(format, 85.0)).unwrap();
            let b = encode_image(&img, &params(format, 85.0)).unwrap();
            assert_eq!(a, b, "{format}");
        }
    }
}
