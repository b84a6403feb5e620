//! Attention-based crop placement for [`CropPolicy::Smart`](super::CropPolicy::Smart).
//!
//! After a cover-fit scale only one axis has excess pixels, so choosing the
//! crop window reduces to sliding a 1-D window along that axis. Each pixel
//! gets an integer saliency score built from three cues:
//!
//! | Cue | Signal |
//! |---|---|
//! | Luminance frequency | absolute luma difference to the right and lower neighbours |
//! | Saturation | `max(r,g,b) - min(r,g,b)` |
//! | Skin tone | fixed bonus for pixels in a simple RGB skin range |
//!
//! Scores are summed per column (or row) and the window with the highest
//! total wins. Integer arithmetic keeps ties exact, and ties resolve to the
//! window closest to the centre, so a featureless image crops like `center`.

use super::backend::Dimensions;
use image::{DynamicImage, RgbImage};

const EDGE_WEIGHT: u64 = 2;
const SKIN_BONUS: u64 = 64;

/// Top-left corner of the most salient `target`-sized window in `image`.
///
/// `image` is the already-scaled raster; it must be at least as large as
/// `target` on both axes.
pub fn attention_offset(image: &DynamicImage, target: Dimensions) -> (u32, u32) {
    let (width, height) = (image.width(), image.height());
    if width <= target.width && height <= target.height {
        return (0, 0);
    }

    let rgb = image.to_rgb8();
    let (columns, rows) = saliency_profiles(&rgb);

    let x = best_window(&columns, target.width as usize);
    let y = best_window(&rows, target.height as usize);
    (x, y)
}

/// Per-column and per-row saliency totals.
fn saliency_profiles(rgb: &RgbImage) -> (Vec<u64>, Vec<u64>) {
    let (width, height) = rgb.dimensions();
    let mut columns = vec![0u64; width as usize];
    let mut rows = vec![0u64; height as usize];

    for y in 0..height {
        for x in 0..width {
            let score = pixel_saliency(rgb, x, y);
            columns[x as usize] += score;
            rows[y as usize] += score;
        }
    }

    (columns, rows)
}

fn luma(rgb: &RgbImage, x: u32, y: u32) -> i32 {
    let [r, g, b] = rgb.get_pixel(x, y).0;
    // BT.601 weights in integer form
    (299 * r as i32 + 587 * g as i32 + 114 * b as i32) / 1000
}

fn pixel_saliency(rgb: &RgbImage, x: u32, y: u32) -> u64 {
    let (width, height) = rgb.dimensions();
    let here = luma(rgb, x, y);

    let mut edge = 0;
    if x + 1 < width {
        edge += (luma(rgb, x + 1, y) - here).unsigned_abs();
    }
    if y + 1 < height {
        edge += (luma(rgb, x, y + 1) - here).unsigned_abs();
    }

    let [r, g, b] = rgb.get_pixel(x, y).0;
    let saturation = (r.max(g).max(b) - r.min(g).min(b)) as u64;

    let skin = if is_skin_tone(r, g, b) { SKIN_BONUS } else { 0 };

    edge as u64 * EDGE_WEIGHT + saturation + skin
}

fn is_skin_tone(r: u8, g: u8, b: u8) -> bool {
    r > 95 && g > 40 && b > 20 && r > g && r > b && r - g > 15
}

/// Start of the highest-scoring `window`-long run in `profile`.
///
/// Ties go to the start closest to the centred position.
fn best_window(profile: &[u64], window: usize) -> u32 {
    if window == 0 || profile.len() <= window {
        return 0;
    }

    let last_start = profile.len() - window;
    let centre = last_start / 2;

    let mut prefix = Vec::with_capacity(profile.len() + 1);
    prefix.push(0u64);
    for value in profile {
        let running = prefix[prefix.len() - 1] + value;
        prefix.push(running);
    }

    let mut best_start = centre;
    let mut best_score = prefix[centre + window] - prefix[centre];

    for start in 0..=last_start {
        let score = prefix[start + window] - prefix[start];
        let closer = start.abs_diff(centre) < best_start.abs_diff(centre);
        if score > best_score || (score == best_score && closer) {
            best_score = score;
            best_start = start;
        }
    }

    best_start as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Flat gray canvas with a high-contrast checkerboard inside `region`.
    fn canvas_with_detail(width: u32, height: u32, region: (u32, u32, u32, u32)) -> DynamicImage {
        let (rx, ry, rw, rh) = region;
        let img = RgbImage::from_fn(width, height, |x, y| {
            let inside = x >= rx && x < rx + rw && y >= ry && y < ry + rh;
            if inside && (x + y) % 2 == 0 {
                Rgb([250, 250, 250])
            } else if inside {
                Rgb([5, 5, 5])
            } else {
                Rgb([128, 128, 128])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn uniform_image_crops_centre() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 100, Rgb([200, 10, 10])));
        assert_eq!(attention_offset(&img, Dimensions::new(100, 100)), (100, 0));
    }

    #[test]
    fn detail_on_the_right_pulls_window_right() {
        let img = canvas_with_detail(300, 100, (220, 0, 80, 100));
        assert_eq!(attention_offset(&img, Dimensions::new(100, 100)), (200, 0));
    }

    #[test]
    fn detail_on_the_left_pulls_window_left() {
        let img = canvas_with_detail(300, 100, (0, 0, 60, 100));
        assert_eq!(attention_offset(&img, Dimensions::new(100, 100)), (0, 0));
    }

    #[test]
    fn detail_at_the_top_pulls_window_up() {
        let img = canvas_with_detail(100, 300, (0, 0, 100, 60));
        assert_eq!(attention_offset(&img, Dimensions::new(100, 100)), (0, 0));
    }

    #[test]
    fn exact_size_needs_no_search() {
        let img = canvas_with_detail(64, 48, (0, 0, 10, 10));
        assert_eq!(attention_offset(&img, Dimensions::new(64, 48)), (0, 0));
    }

    #[test]
    fn skin_tones_score_higher_than_gray() {
        assert!(is_skin_tone(224, 172, 140));
        assert!(!is_skin_tone(128, 128, 128));
        assert!(!is_skin_tone(20, 40, 200));
    }

    #[test]
    fn best_window_prefers_centre_on_ties() {
        assert_eq!(best_window(&[1, 1, 1, 1, 1, 1], 2), 2);
        assert_eq!(best_window(&[9, 0, 0, 0, 0, 0], 2), 0);
        assert_eq!(best_window(&[0, 0, 0, 0, 3, 3], 2), 4);
        assert_eq!(best_window(&[5, 5], 2), 0);
    }
}
