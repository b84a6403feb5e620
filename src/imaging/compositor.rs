//! Overlay rasterization and alpha compositing.
//!
//! | Step | Crate / function |
//! |---|---|
//! | Parse overlay markup | `usvg::Tree::from_str` (text converted to paths with `fontdb`) |
//! | Rasterize | `resvg::render` into a `tiny_skia::Pixmap` |
//! | Composite | `image::imageops::overlay` (source-over blending) |
//!
//! Fonts are resolved once per backend from a read-only database; nothing
//! here mutates shared state.

use super::backend::{Dimensions, TransformError};
use super::overlay::OverlayLayer;
use image::{DynamicImage, Rgba, RgbaImage};
use resvg::{tiny_skia, usvg};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Build the font database used to shape overlay text.
///
/// System fonts are optional so tests and sandboxed runs stay hermetic;
/// every `.ttf`/`.otf`/`.ttc` in `dirs` is added on top.
pub fn build_fontdb(load_system: bool, dirs: &[PathBuf]) -> Arc<usvg::fontdb::Database> {
    let mut db = usvg::fontdb::Database::new();
    if load_system {
        db.load_system_fonts();
    }
    for dir in dirs {
        load_fonts_from_dir(&mut db, dir);
    }
    tracing::debug!(faces = db.len(), "font database ready");
    Arc::new(db)
}

fn load_fonts_from_dir(db: &mut usvg::fontdb::Database, dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        tracing::warn!(dir = %dir.display(), "font directory not readable");
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_font = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc"));
        if is_font && path.is_file() {
            if let Err(err) = db.load_font_file(&path) {
                tracing::warn!(font = %path.display(), %err, "skipping unreadable font");
            }
        }
    }
}

/// Resolve the requested families, then generic fallbacks, then any face at
/// all, so a missing "Arial" still renders text.
fn font_resolver() -> usvg::FontResolver<'static> {
    usvg::FontResolver {
        select_font: Box::new(|font, fontdb| {
            let mut families: Vec<usvg::fontdb::Family<'_>> = font
                .families()
                .iter()
                .map(|family| match family {
                    usvg::FontFamily::Serif => usvg::fontdb::Family::Serif,
                    usvg::FontFamily::SansSerif => usvg::fontdb::Family::SansSerif,
                    usvg::FontFamily::Cursive => usvg::fontdb::Family::Cursive,
                    usvg::FontFamily::Fantasy => usvg::fontdb::Family::Fantasy,
                    usvg::FontFamily::Monospace => usvg::fontdb::Family::Monospace,
                    usvg::FontFamily::Named(name) => usvg::fontdb::Family::Name(name),
                })
                .collect();
            families.push(usvg::fontdb::Family::SansSerif);
            families.push(usvg::fontdb::Family::Serif);

            let style = match font.style() {
                usvg::FontStyle::Normal => usvg::fontdb::Style::Normal,
                usvg::FontStyle::Italic => usvg::fontdb::Style::Italic,
                usvg::FontStyle::Oblique => usvg::fontdb::Style::Oblique,
            };

            let query = usvg::fontdb::Query {
                families: &families,
                weight: usvg::fontdb::Weight(font.weight()),
                stretch: usvg::fontdb::Stretch::Normal,
                style,
            };

            fontdb
                .query(&query)
                .or_else(|| fontdb.faces().next().map(|face| face.id))
        }),
        select_fallback: usvg::FontResolver::default_fallback_selector(),
    }
}

/// Rasterize an overlay layer to a straight-alpha RGBA buffer of its size.
pub fn rasterize(
    layer: &OverlayLayer,
    fontdb: &Arc<usvg::fontdb::Database>,
) -> Result<RgbaImage, TransformError> {
    let Dimensions { width, height } = layer.size;
    let markup = layer.to_svg();

    let options = usvg::Options {
        fontdb: Arc::clone(fontdb),
        font_resolver: font_resolver(),
        ..Default::default()
    };
    let tree = usvg::Tree::from_str(&markup, &options)
        .map_err(|e| TransformError::Overlay(format!("overlay markup rejected: {e}")))?;

    let mut pixmap = tiny_skia::Pixmap::new(width, height).ok_or_else(|| {
        TransformError::Overlay(format!("cannot allocate {width}x{height} overlay"))
    })?;
    resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());

    let mut raster = RgbaImage::new(width, height);
    for (dst, src) in raster.pixels_mut().zip(pixmap.pixels()) {
        let color = src.demultiply();
        *dst = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
    }
    Ok(raster)
}

/// Source-over composite `layer` onto `base` at (0, 0).
///
/// The layer must match the base dimensions exactly. The result keeps an
/// alpha channel only if `base` had one.
pub fn composite_layer(base: DynamicImage, layer: &RgbaImage) -> Result<DynamicImage, TransformError> {
    if (base.width(), base.height()) != layer.dimensions() {
        return Err(TransformError::Overlay(format!(
            "layer is {}x{} but canvas is {}x{}",
            layer.width(),
            layer.height(),
            base.width(),
            base.height()
        )));
    }

    let keep_alpha = base.color().has_alpha();
    let mut canvas = base.into_rgba8();
    image::imageops::overlay(&mut canvas, layer, 0, 0);

    let composited = DynamicImage::ImageRgba8(canvas);
    Ok(if keep_alpha {
        composited
    } else {
        DynamicImage::ImageRgb8(composited.to_rgb8())
    })
}
