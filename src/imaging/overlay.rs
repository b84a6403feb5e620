//! Overlay composer: title, subtitle and watermark laid out on a vector layer.
//!
//! The layer is always exactly the output canvas size, never the source
//! size, because it is composed after the fit stage. Layout is pure
//! arithmetic on the canvas dimensions:
//!
//! | Element | Font size | Anchor |
//! |---|---|---|
//! | Title | `floor(width / 25)`, bold, 2px outline | x = width/2, y = block − 30 |
//! | Subtitle | `floor(width / 35)`, 1px outline | x = width/2, y = block + 40 |
//! | Watermark | `floor(width × 0.03)`, opacity 0.7 | 20px from the chosen corner (y = 40 at the top) |
//!
//! where `block` is height × 0.3 / 0.5 / 0.7 for `top` / `center` / `bottom`.
//!
//! The element list is kept in paint order (background, title, subtitle,
//! watermark) and serialized to SVG markup by [`OverlayLayer::to_svg`]. All
//! caller text is XML-escaped on the way in.

use super::backend::Dimensions;
use super::params::{TextOverlaySpec, TextPosition, WatermarkPosition, WatermarkSpec};
use std::fmt::Write as _;

const TITLE_BASELINE_OFFSET: f64 = -30.0;
const SUBTITLE_BASELINE_OFFSET: f64 = 40.0;
const TITLE_STROKE_WIDTH: u32 = 2;
const SUBTITLE_STROKE_WIDTH: u32 = 1;
const WATERMARK_MARGIN: f64 = 20.0;
const WATERMARK_TOP_BASELINE: f64 = 40.0;
pub const WATERMARK_OPACITY: f64 = 0.7;

/// Presentation settings that are not part of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayStyle {
    pub font_family: String,
    /// Outline color for title and subtitle.
    pub stroke_color: String,
    pub watermark_color: String,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            font_family: "Arial, sans-serif".to_string(),
            stroke_color: "#000000".to_string(),
            watermark_color: "#ffffff".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRole {
    Title,
    Subtitle,
    Watermark,
}

/// Horizontal alignment of a run relative to its x coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    Start,
    Middle,
    End,
}

impl TextAnchor {
    pub fn svg_token(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Middle => "middle",
            Self::End => "end",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub color: String,
    pub width: u32,
}

/// One positioned line of text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub role: TextRole,
    pub text: String,
    pub x: f64,
    /// Baseline.
    pub y: f64,
    pub font_size: u32,
    pub anchor: TextAnchor,
    pub fill: String,
    pub bold: bool,
    pub stroke: Option<Stroke>,
    pub opacity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayElement {
    /// Full-canvas flat fill.
    Background { fill: String },
    Text(TextRun),
}

/// Transparent canvas-sized layer holding the overlay elements in paint order.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayLayer {
    pub size: Dimensions,
    pub font_family: String,
    pub elements: Vec<OverlayElement>,
}

impl OverlayLayer {
    /// Find the run for a role, if present.
    pub fn text_run(&self, role: TextRole) -> Option<&TextRun> {
        self.elements.iter().find_map(|element| match element {
            OverlayElement::Text(run) if run.role == role => Some(run),
            _ => None,
        })
    }

    pub fn has_background(&self) -> bool {
        self.elements
            .iter()
            .any(|e| matches!(e, OverlayElement::Background { .. }))
    }

    /// Serialize the layer as an SVG document of exactly `size`.
    pub fn to_svg(&self) -> String {
        let mut svg = format!(
            r#"<svg width="{}" height="{}" xmlns="http://www.w3.org/2000/svg">"#,
            self.size.width, self.size.height
        );
        let family = escape_xml(&self.font_family);

        for element in &self.elements {
            match element {
                OverlayElement::Background { fill } => {
                    let _ = write!(
                        svg,
                        r#"<rect width="100%" height="100%" fill="{}"/>"#,
                        escape_xml(fill)
                    );
                }
                OverlayElement::Text(run) => {
                    let _ = write!(
                        svg,
                        r#"<text x="{}" y="{}" font-family="{}" font-size="{}""#,
                        run.x, run.y, family, run.font_size
                    );
                    if run.bold {
                        svg.push_str(r#" font-weight="bold""#);
                    }
                    let _ = write!(
                        svg,
                        r#" fill="{}" text-anchor="{}""#,
                        escape_xml(&run.fill),
                        run.anchor.svg_token()
                    );
                    if let Some(stroke) = &run.stroke {
                        let _ = write!(
                            svg,
                            r#" stroke="{}" stroke-width="{}""#,
                            escape_xml(&stroke.color),
                            stroke.width
                        );
                    }
                    if let Some(opacity) = run.opacity {
                        let _ = write!(svg, r#" opacity="{opacity}""#);
                    }
                    let _ = write!(svg, ">{}</text>", escape_xml(&run.text));
                }
            }
        }

        svg.push_str("</svg>");
        svg
    }
}

/// Escape the five XML metacharacters.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Vertical anchor of the title/subtitle block.
pub fn text_block_y(height: u32, position: TextPosition) -> f64 {
    height as f64 * position.anchor_fraction()
}

pub fn title_font_size(width: u32) -> u32 {
    width / 25
}

pub fn subtitle_font_size(width: u32) -> u32 {
    width / 35
}

pub fn watermark_font_size(width: u32) -> u32 {
    (width as f64 * 0.03).floor() as u32
}

/// Baseline anchor and alignment of the watermark.
pub fn watermark_anchor(size: Dimensions, position: WatermarkPosition) -> (f64, f64, TextAnchor) {
    let (x, anchor) = if position.is_left() {
        (WATERMARK_MARGIN, TextAnchor::Start)
    } else {
        (size.width as f64 - WATERMARK_MARGIN, TextAnchor::End)
    };
    let y = if position.is_top() {
        WATERMARK_TOP_BASELINE
    } else {
        size.height as f64 - WATERMARK_MARGIN
    };
    (x, y, anchor)
}

/// Lay out the overlay for a canvas of `size`.
///
/// Returns `None` when there is nothing to draw: no title, no subtitle and
/// no watermark text. A background color alone never produces a layer.
pub fn compose_overlay(
    size: Dimensions,
    text: Option<&TextOverlaySpec>,
    watermark: Option<&WatermarkSpec>,
    style: &OverlayStyle,
) -> Option<OverlayLayer> {
    let text = text.filter(|t| !t.title.is_empty() || !t.subtitle.is_empty());
    let watermark = watermark.filter(|w| !w.text.is_empty());
    if text.is_none() && watermark.is_none() {
        return None;
    }

    let mut elements = Vec::new();

    if let Some(spec) = text {
        if let Some(fill) = spec
            .background_color
            .as_ref()
            .filter(|c| !c.is_empty() && c.as_str() != "transparent")
        {
            elements.push(OverlayElement::Background { fill: fill.clone() });
        }

        let centre_x = size.width as f64 / 2.0;
        let block_y = text_block_y(size.height, spec.position);

        if !spec.title.is_empty() {
            elements.push(OverlayElement::Text(TextRun {
                role: TextRole::Title,
                text: spec.title.clone(),
                x: centre_x,
                y: block_y + TITLE_BASELINE_OFFSET,
                font_size: title_font_size(size.width),
                anchor: TextAnchor::Middle,
                fill: spec.title_color.clone(),
                bold: true,
                stroke: Some(Stroke {
                    color: style.stroke_color.clone(),
                    width: TITLE_STROKE_WIDTH,
                }),
                opacity: None,
            }));
        }

        if !spec.subtitle.is_empty() {
            elements.push(OverlayElement::Text(TextRun {
                role: TextRole::Subtitle,
                text: spec.subtitle.clone(),
                x: centre_x,
                y: block_y + SUBTITLE_BASELINE_OFFSET,
                font_size: subtitle_font_size(size.width),
                anchor: TextAnchor::Middle,
                fill: spec.subtitle_color.clone(),
                bold: false,
                stroke: Some(Stroke {
                    color: style.stroke_color.clone(),
                    width: SUBTITLE_STROKE_WIDTH,
                }),
                opacity: None,
            }));
        }
    }

    if let Some(spec) = watermark {
        let (x, y, anchor) = watermark_anchor(size, spec.position);
        elements.push(OverlayElement::Text(TextRun {
            role: TextRole::Watermark,
            text: spec.text.clone(),
            x,
            y,
            font_size: watermark_font_size(size.width),
            anchor,
            fill: style.watermark_color.clone(),
            bold: false,
            stroke: None,
            opacity: Some(WATERMARK_OPACITY),
        }));
    }

    Some(OverlayLayer {
        size,
        font_family: style.font_family.clone(),
        elements,
    })
}
