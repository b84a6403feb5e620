//! JSON-shaped request options and the wire form of results.
//!
//! Callers describe a transform with a loose, camelCase JSON object:
//!
//! ```json
//! {
//!   "width": 1200, "height": 630, "format": "webp", "quality": 80, "crop": "top",
//!   "textOverlay": { "title": "Hello", "subtitle": "World", "position": "bottom",
//!                    "titleColor": "#fff", "subtitleColor": "#ddd",
//!                    "backgroundColor": "transparent" },
//!   "watermark": { "text": "example.com", "position": "bottom-right" },
//!   "outputPath": "out/banner.webp"
//! }
//! ```
//!
//! Every field is optional and unknown keys are ignored. [`resolve`] turns
//! the options into a validated [`ProcessRequest`], filling gaps from
//! [`EngineConfig`]. Invalid values fail instead of being clamped.

use crate::config::EngineConfig;
use crate::imaging::{
    CropPolicy, Dimensions, ErrorKind, OutputFormat, OutputSpec, ProcessRequest, Quality,
    SourceInput, TextOverlaySpec, TextPosition, TransformError, Transformed, WatermarkPosition,
    WatermarkSpec, parse_dimension,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize, Serializer};
use std::path::{Path, PathBuf};

/// Loose request options as they arrive over JSON.
///
/// Numbers are kept as `f64` so that `1200.5` or `-3` reach validation and
/// fail there with a precise message.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessOptions {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub format: Option<String>,
    pub quality: Option<f64>,
    pub crop: Option<String>,
    pub text_overlay: Option<TextOverlayOptions>,
    pub watermark: Option<WatermarkOptions>,
    pub output_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextOverlayOptions {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub title_color: Option<String>,
    pub subtitle_color: Option<String>,
    pub position: Option<String>,
    pub background_color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WatermarkOptions {
    pub text: Option<String>,
    pub position: Option<String>,
}

impl ProcessOptions {
    /// Parse options from a JSON object. Malformed JSON is an invalid spec.
    pub fn from_json(json: &str) -> Result<Self, TransformError> {
        serde_json::from_str(json)
            .map_err(|e| TransformError::InvalidSpec(format!("malformed options: {e}")))
    }
}

fn parse_token<T>(value: Option<&str>, fallback: T) -> Result<T, TransformError>
where
    T: std::str::FromStr<Err = TransformError>,
{
    value.map(str::parse).transpose().map(|v| v.unwrap_or(fallback))
}

fn resolve_output(
    options: &ProcessOptions,
    config: &EngineConfig,
) -> Result<OutputSpec, TransformError> {
    let width = match options.width {
        Some(w) => parse_dimension("width", w)?,
        None => config.output.width,
    };
    let height = match options.height {
        Some(h) => parse_dimension("height", h)?,
        None => config.output.height,
    };
    let format: OutputFormat = parse_token(options.format.as_deref(), config.output.format)?;
    let quality = Quality::try_new(options.quality.unwrap_or(f64::from(config.output.quality)))?;
    let crop: CropPolicy = parse_token(options.crop.as_deref(), config.output.crop)?;

    Ok(OutputSpec {
        size: Dimensions::new(width, height),
        format,
        quality,
        crop,
    })
}

fn resolve_text(
    options: Option<&TextOverlayOptions>,
    config: &EngineConfig,
) -> Result<Option<TextOverlaySpec>, TransformError> {
    let Some(text) = options else {
        return Ok(None);
    };

    let position: TextPosition = parse_token(text.position.as_deref(), config.text.position)?;
    let title = text.title.clone().unwrap_or_default();
    let subtitle = text.subtitle.clone().unwrap_or_default();
    if title.is_empty() && subtitle.is_empty() {
        return Ok(None);
    }

    Ok(Some(TextOverlaySpec {
        title,
        subtitle,
        title_color: text
            .title_color
            .clone()
            .unwrap_or_else(|| config.text.title_color.clone()),
        subtitle_color: text
            .subtitle_color
            .clone()
            .unwrap_or_else(|| config.text.subtitle_color.clone()),
        position,
        background_color: text
            .background_color
            .clone()
            .filter(|c| !c.is_empty() && c != "transparent"),
    }))
}

fn resolve_watermark(
    options: Option<&WatermarkOptions>,
    config: &EngineConfig,
) -> Result<Option<WatermarkSpec>, TransformError> {
    let Some(watermark) = options else {
        return Ok(None);
    };

    let position: WatermarkPosition =
        parse_token(watermark.position.as_deref(), config.watermark.position)?;
    Ok(watermark
        .text
        .clone()
        .filter(|t| !t.is_empty())
        .map(|text| WatermarkSpec { text, position }))
}

/// Validate `options` and build the typed request for `source`.
///
/// Missing optional fields take their values from `config`. Empty title,
/// subtitle and watermark strings are treated as absent.
pub fn resolve(
    source: SourceInput,
    options: &ProcessOptions,
    config: &EngineConfig,
) -> Result<ProcessRequest, TransformError> {
    Ok(ProcessRequest {
        source,
        output: resolve_output(options, config)?,
        text: resolve_text(options.text_overlay.as_ref(), config)?,
        watermark: resolve_watermark(options.watermark.as_ref(), config)?,
        style: config.overlay_style(),
        output_path: options.output_path.clone(),
    })
}

/// Outcome of one transform as seen by callers at the boundary.
///
/// Serializes to `{"success":true,"buffer":"<base64>","outputPath":...}` or
/// `{"success":false,"error":"...","kind":"InvalidSpec"}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessResult {
    Success {
        buffer: Vec<u8>,
        output_path: Option<PathBuf>,
        /// Not part of the wire shape; kept for callers that label output.
        format: OutputFormat,
        size: Dimensions,
    },
    Failure {
        kind: ErrorKind,
        error: String,
    },
}

impl ProcessResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Encoded image, present only on success.
    pub fn buffer(&self) -> Option<&[u8]> {
        match self {
            Self::Success { buffer, .. } => Some(buffer),
            Self::Failure { .. } => None,
        }
    }

    pub fn format(&self) -> Option<OutputFormat> {
        match self {
            Self::Success { format, .. } => Some(*format),
            Self::Failure { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}

impl From<Transformed> for ProcessResult {
    fn from(transformed: Transformed) -> Self {
        Self::Success {
            buffer: transformed.buffer,
            output_path: transformed.output_path,
            format: transformed.format,
            size: transformed.size,
        }
    }
}

impl From<TransformError> for ProcessResult {
    fn from(err: TransformError) -> Self {
        Self::Failure {
            kind: err.kind(),
            error: err.to_string(),
        }
    }
}

impl From<Result<Transformed, TransformError>> for ProcessResult {
    fn from(result: Result<Transformed, TransformError>) -> Self {
        match result {
            Ok(transformed) => transformed.into(),
            Err(err) => err.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireResult<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    buffer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_path: Option<&'a Path>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<ErrorKind>,
}

impl Serialize for ProcessResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            Self::Success {
                buffer,
                output_path,
                ..
            } => WireResult {
                success: true,
                buffer: Some(BASE64.encode(buffer)),
                output_path: output_path.as_deref(),
                error: None,
                kind: None,
            },
            Self::Failure { kind, error } => WireResult {
                success: false,
                buffer: None,
                output_path: None,
                error: Some(error),
                kind: Some(*kind),
            },
        };
        wire.serialize(serializer)
    }
}

/// `data:` URL embedding an encoded image, for inline previews.
pub fn data_url(format: OutputFormat, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", format.mime_type(), BASE64.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_json(json: &str) -> Result<ProcessRequest, TransformError> {
        let options = ProcessOptions::from_json(json)?;
        resolve(
            SourceInput::Bytes(vec![]),
            &options,
            &EngineConfig::default(),
        )
    }

    #[test]
    fn empty_options_take_defaults() {
        let request = resolve_json("{}").unwrap();
        assert_eq!(request.output.size, Dimensions::new(1200, 630));
        assert_eq!(request.output.format, OutputFormat::Jpeg);
        assert_eq!(request.output.quality.value(), 90);
        assert_eq!(request.output.crop, CropPolicy::Smart);
        assert_eq!(request.text, None);
        assert_eq!(request.watermark, None);
        assert_eq!(request.output_path, None);
    }

    #[test]
    fn full_options_are_honoured() {
        let request = resolve_json(
            r##"{
                "width": 800, "height": 400, "format": "png", "quality": 40, "crop": "left",
                "textOverlay": {"title": "T", "subtitle": "S", "titleColor": "#111",
                                "subtitleColor": "#222", "position": "bottom",
                                "backgroundColor": "#000000"},
                "watermark": {"text": "wm", "position": "top-left"},
                "outputPath": "/tmp/out.png"
            }"##,
        )
        .unwrap();

        assert_eq!(request.output.size, Dimensions::new(800, 400));
        assert_eq!(request.output.format, OutputFormat::Png);
        assert_eq!(request.output.quality.value(), 40);
        assert_eq!(request.output.crop, CropPolicy::Left);

        let text = request.text.unwrap();
        assert_eq!(text.title, "T");
        assert_eq!(text.subtitle_color, "#222");
        assert_eq!(text.position, TextPosition::Bottom);
        assert_eq!(text.background_color.as_deref(), Some("#000000"));

        let watermark = request.watermark.unwrap();
        assert_eq!(watermark.text, "wm");
        assert_eq!(watermark.position, WatermarkPosition::TopLeft);
        assert_eq!(request.output_path, Some(PathBuf::from("/tmp/out.png")));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let request = resolve_json(r#"{"width": 300, "sharpen": true, "extra": {"a": 1}}"#);
        assert_eq!(request.unwrap().output.size.width, 300);
    }

    #[test]
    fn null_fields_take_defaults() {
        let request = resolve_json(r#"{"textOverlay": null, "watermark": null, "format": null}"#);
        let request = request.unwrap();
        assert_eq!(request.output.format, OutputFormat::Jpeg);
        assert_eq!(request.text, None);
    }

    #[test]
    fn unsupported_format_token() {
        for token in ["gif", "JPEG", "jpg", ""] {
            let json = format!(r#"{{"format": "{token}"}}"#);
            let err = resolve_json(&json).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedFormat, "{token}");
        }
    }

    #[test]
    fn quality_out_of_range() {
        for quality in ["0", "101", "-5", "50.5"] {
            let json = format!(r#"{{"quality": {quality}}}"#);
            let err = resolve_json(&json).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidSpec, "{quality}");
        }
    }

    #[test]
    fn invalid_dimensions() {
        for json in [
            r#"{"width": 0}"#,
            r#"{"height": -10}"#,
            r#"{"width": 10.5}"#,
            r#"{"width": 100000}"#,
            r#"{"width": "wide"}"#,
        ] {
            let err = resolve_json(json).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidSpec, "{json}");
        }
    }

    #[test]
    fn unknown_crop_and_positions() {
        for json in [
            r#"{"crop": "entropy"}"#,
            r#"{"textOverlay": {"title": "x", "position": "middle"}}"#,
            r#"{"watermark": {"text": "x", "position": "centre"}}"#,
        ] {
            let err = resolve_json(json).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidSpec, "{json}");
        }
    }

    #[test]
    fn empty_strings_mean_absent() {
        let request = resolve_json(
            r#"{"textOverlay": {"title": "", "subtitle": ""}, "watermark": {"text": ""}}"#,
        )
        .unwrap();
        assert_eq!(request.text, None);
        assert_eq!(request.watermark, None);
    }

    #[test]
    fn transparent_background_is_dropped() {
        let request =
            resolve_json(r#"{"textOverlay": {"title": "x", "backgroundColor": "transparent"}}"#)
                .unwrap();
        assert_eq!(request.text.unwrap().background_color, None);
    }

    #[test]
    fn config_supplies_missing_values() {
        let mut config = EngineConfig::default();
        config.output.format = OutputFormat::Webp;
        config.text.title_color = "#abcdef".to_string();
        config.watermark.position = WatermarkPosition::TopRight;

        let options = ProcessOptions::from_json(
            r#"{"textOverlay": {"title": "x"}, "watermark": {"text": "y"}}"#,
        )
        .unwrap();
        let request = resolve(SourceInput::Bytes(vec![]), &options, &config).unwrap();

        assert_eq!(request.output.format, OutputFormat::Webp);
        assert_eq!(request.text.unwrap().title_color, "#abcdef");
        assert_eq!(request.watermark.unwrap().position, WatermarkPosition::TopRight);
    }

    #[test]
    fn malformed_json_is_invalid_spec() {
        let err = ProcessOptions::from_json("{not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSpec);
    }

    #[test]
    fn success_serializes_with_base64_buffer() {
        let result = ProcessResult::Success {
            buffer: vec![1, 2, 3],
            output_path: Some(PathBuf::from("out/a.jpg")),
            format: OutputFormat::Jpeg,
            size: Dimensions::new(1200, 630),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": true, "buffer": "AQID", "outputPath": "out/a.jpg"})
        );
    }

    #[test]
    fn failure_serializes_without_buffer() {
        let result: ProcessResult = TransformError::UnsupportedFormat("gif".into()).into();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["kind"], "UnsupportedFormat");
        assert!(json.get("buffer").is_none());
        assert!(json["error"].as_str().unwrap().contains("gif"));
        assert_eq!(result.buffer(), None);
    }

    #[test]
    fn data_url_uses_mime_type() {
        assert_eq!(data_url(OutputFormat::Png, &[1, 2, 3]), "data:image/png;base64,AQID");
        assert!(data_url(OutputFormat::Jpeg, &[]).starts_with("data:image/jpeg;base64,"));
    }
}
