//! Pure calculation functions for cover-fit geometry.
//!
//! All functions here are pure and testable without any I/O or images.
//! A fit is always "cover": scale the source so it fully covers the target
//! box (upscaling allowed), then cut a target-sized window out of the
//! scaled raster. Only the position of that window depends on the crop
//! policy.
//!
//! The scaled raster is never materialized. An extreme aspect ratio plans
//! a scaled size far larger than memory (20000x2 into 1200x630 scales to
//! 6300000x630), so the window is mapped back onto the source with
//! [`FitPlan::source_window`] and only that region is resampled.

use super::backend::Dimensions;
use super::params::CropPolicy;

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Target area dimensions (width, height)
///
/// # Returns
/// * `(width, height)` - Fill dimensions (at least one matches target)
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = (h as f64 * src_aspect).round() as u32;
        (w.max(tgt_w), h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = (w as f64 / src_aspect).round() as u32;
        (w, h.max(tgt_h))
    }
}

/// Top-left corner of the crop window for a fixed-anchor policy.
///
/// Returns `None` for [`CropPolicy::Smart`], whose offset depends on pixel
/// content. The axis without excess always gets offset 0; on the other
/// axis the window is pinned to the named edge or centred. `top`/`bottom`
/// centre horizontally and `left`/`right` centre vertically.
pub fn crop_offset(scaled: Dimensions, target: Dimensions, policy: CropPolicy) -> Option<(u32, u32)> {
    let excess_x = scaled.width.saturating_sub(target.width);
    let excess_y = scaled.height.saturating_sub(target.height);

    let (x, y) = match policy {
        CropPolicy::Smart => return None,
        CropPolicy::Center => (excess_x / 2, excess_y / 2),
        CropPolicy::Top => (excess_x / 2, 0),
        CropPolicy::Bottom => (excess_x / 2, excess_y),
        CropPolicy::Left => (0, excess_y / 2),
        CropPolicy::Right => (excess_x, excess_y / 2),
    };
    Some((x, y))
}

/// Largest raster, in pixels, the smart policy scores.
pub const SCORING_PIXEL_BUDGET: u64 = 4_000_000;

/// Map a span `[offset, offset + len)` of a `scaled`-long axis onto a
/// `source`-long axis, keeping it inside the source and at least 1 px long.
fn source_span(offset: u32, len: u32, scaled: u32, source: u32) -> (u32, u32) {
    let ratio = source as f64 / scaled as f64;
    let start = ((offset as f64 * ratio).round() as u32).min(source - 1);
    let len = ((len as f64 * ratio).round() as u32).clamp(1, source - start);
    (start, len)
}

/// Resize-then-crop plan for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitPlan {
    pub source: Dimensions,
    /// Size the source is resampled to; covers `target` on both axes.
    pub scaled: Dimensions,
    /// Final output size.
    pub target: Dimensions,
    pub crop: CropPolicy,
}

impl FitPlan {
    pub fn new(source: Dimensions, target: Dimensions, crop: CropPolicy) -> Self {
        let (w, h) = calculate_fill_dimensions(
            (source.width, source.height),
            (target.width, target.height),
        );
        Self {
            source,
            scaled: Dimensions::new(w, h),
            target,
            crop,
        }
    }

    /// Whether the scale step can be skipped.
    pub fn is_identity_scale(&self) -> bool {
        self.scaled == self.source
    }

    /// Fixed crop offset, or `None` when it must be detected (smart).
    pub fn fixed_offset(&self) -> Option<(u32, u32)> {
        crop_offset(self.scaled, self.target, self.crop)
    }

    /// Source region `(x, y, width, height)` that becomes the crop window
    /// placed at `offset` on the scaled raster.
    pub fn source_window(&self, offset: (u32, u32)) -> (u32, u32, u32, u32) {
        let (x, width) = source_span(
            offset.0,
            self.target.width,
            self.scaled.width,
            self.source.width,
        );
        let (y, height) = source_span(
            offset.1,
            self.target.height,
            self.scaled.height,
            self.source.height,
        );
        (x, y, width, height)
    }

    /// Stand-in raster for smart scoring and the window size inside it.
    ///
    /// Equal to `(scaled, target)` while the scaled raster fits
    /// [`SCORING_PIXEL_BUDGET`]; otherwise both shrink by the same factor.
    pub fn scoring_plan(&self) -> (Dimensions, Dimensions) {
        let area = self.scaled.width as u64 * self.scaled.height as u64;
        if area <= SCORING_PIXEL_BUDGET {
            return (self.scaled, self.target);
        }
        let factor = (area as f64 / SCORING_PIXEL_BUDGET as f64).sqrt();
        let shrink = |v: u32| ((v as f64 / factor).round() as u32).max(1);
        let raster = Dimensions::new(shrink(self.scaled.width), shrink(self.scaled.height));
        let window = Dimensions::new(
            shrink(self.target.width).min(raster.width),
            shrink(self.target.height).min(raster.height),
        );
        (raster, window)
    }

    /// Bring an offset found on a `raster`-sized scoring image back to
    /// scaled coordinates, clamped so the window stays inside.
    pub fn offset_from_scoring(&self, raster: Dimensions, offset: (u32, u32)) -> (u32, u32) {
        let rescale = |v: u32, from: u32, to: u32, max: u32| {
            ((v as f64 * to as f64 / from as f64).round() as u32).min(max)
        };
        (
            rescale(
                offset.0,
                raster.width,
                self.scaled.width,
                self.scaled.width - self.target.width,
            ),
            rescale(
                offset.1,
                raster.height,
                self.scaled.height,
                self.scaled.height - self.target.height,
            ),
        )
    }
}
