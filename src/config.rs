//! Engine configuration module.
//!
//! Handles loading, validating, and merging `blog-banner.toml`. The file
//! supplies the defaults a request falls back to when it omits an optional
//! field. Stock defaults are the base layer and the user file is merged on
//! top of them key by key.
//!
//! ## Config File Location
//!
//! Pass `--config <path>` to the CLI, or place `blog-banner.toml` in the
//! working directory. Without either, the stock defaults apply.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [output]
//! width = 1200              # Output canvas width in pixels
//! height = 630              # Output canvas height in pixels
//! format = "jpeg"           # jpeg | png | webp
//! quality = 90              # 1-100 (PNG: compression effort)
//! crop = "smart"            # smart | center | top | bottom | left | right
//!
//! [text]
//! title_color = "#ffffff"
//! subtitle_color = "#ffffff"
//! position = "center"       # top | center | bottom
//! stroke_color = "#000000"  # Outline around title and subtitle
//!
//! [watermark]
//! position = "bottom-right" # top-left | top-right | bottom-left | bottom-right
//! color = "#ffffff"
//!
//! [fonts]
//! family = "Arial, sans-serif"
//! system = true             # Load fonts installed on the host
//! dirs = []                 # Extra directories scanned for .ttf/.otf/.ttc
//!
//! [processing]
//! max_processes = 4         # Max parallel batch workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse; set only the values you want to change:
//!
//! ```toml
//! [output]
//! format = "webp"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{
    CropPolicy, MAX_DIMENSION, OutputFormat, OverlayStyle, TextPosition, WatermarkPosition,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File looked up in the working directory when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "blog-banner.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Engine configuration loaded from `blog-banner.toml`.
///
/// All fields have defaults matching the values a request without options
/// gets. User config files need only specify what they override. Unknown
/// keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Default output geometry and encoding.
    pub output: OutputConfig,
    /// Title and subtitle styling.
    pub text: TextConfig,
    /// Watermark placement and color.
    pub watermark: WatermarkConfig,
    /// Fonts available to overlay text.
    pub fonts: FontsConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl EngineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.output.quality) {
            return Err(ConfigError::Validation(
                "output.quality must be 1-100".into(),
            ));
        }
        for (name, value) in [("width", self.output.width), ("height", self.output.height)] {
            if value == 0 || value > MAX_DIMENSION {
                return Err(ConfigError::Validation(format!(
                    "output.{name} must be 1-{MAX_DIMENSION}"
                )));
            }
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        if self.fonts.family.trim().is_empty() {
            return Err(ConfigError::Validation(
                "fonts.family must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Overlay presentation derived from the text, watermark and font sections.
    pub fn overlay_style(&self) -> OverlayStyle {
        OverlayStyle {
            font_family: self.fonts.family.clone(),
            stroke_color: self.text.stroke_color.clone(),
            watermark_color: self.watermark.color.clone(),
        }
    }
}

/// Default output geometry and encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    /// Lossy quality for JPEG/WebP, compression effort for PNG.
    pub quality: u32,
    pub crop: CropPolicy,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 630,
            format: OutputFormat::Jpeg,
            quality: 90,
            crop: CropPolicy::Smart,
        }
    }
}

/// Title and subtitle styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextConfig {
    pub title_color: String,
    pub subtitle_color: String,
    pub position: TextPosition,
    /// Outline drawn around title and subtitle glyphs.
    pub stroke_color: String,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            title_color: "#ffffff".to_string(),
            subtitle_color: "#ffffff".to_string(),
            position: TextPosition::Center,
            stroke_color: "#000000".to_string(),
        }
    }
}

/// Watermark placement and color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatermarkConfig {
    pub position: WatermarkPosition,
    pub color: String,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            position: WatermarkPosition::BottomRight,
            color: "#ffffff".to_string(),
        }
    }
}

/// Fonts available to overlay text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FontsConfig {
    /// CSS-style family list used for every text run.
    pub family: String,
    /// Whether to load fonts installed on the host.
    pub system: bool,
    /// Extra directories scanned for font files.
    pub dirs: Vec<PathBuf>,
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            family: "Arial, sans-serif".to_string(),
            system: true,
            dirs: Vec::new(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel batch workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(EngineConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<EngineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: EngineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when it is absent.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Load the config the CLI should use.
///
/// An explicit path must exist. Otherwise [`CONFIG_FILE_NAME`] in `cwd` is
/// used when present.
pub fn discover_config(explicit: Option<&Path>, cwd: &Path) -> Result<EngineConfig, ConfigError> {
    match explicit {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            let overlay: toml::Value = toml::from_str(&content)?;
            resolve_config(stock_defaults_value(), Some(overlay))
        }
        None => load_config(&cwd.join(CONFIG_FILE_NAME)),
    }
}

/// Returns a fully-commented stock `blog-banner.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Blog Banner Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# These values are used whenever a request leaves the matching option out.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# Output canvas size in pixels. The source always covers the full canvas;
# the excess is cropped away.
width = 1200
height = 630

# Encoding: "jpeg", "png" or "webp".
format = "jpeg"

# 1-100. Lossy quality for JPEG and WebP; compression effort for PNG.
quality = 90

# Crop anchor: "smart", "center", "top", "bottom", "left" or "right".
crop = "smart"

# ---------------------------------------------------------------------------
# Title and subtitle
# ---------------------------------------------------------------------------
[text]
title_color = "#ffffff"
subtitle_color = "#ffffff"

# Vertical block anchor: "top", "center" or "bottom".
position = "center"

# Outline drawn around title and subtitle glyphs.
stroke_color = "#000000"

# ---------------------------------------------------------------------------
# Watermark
# ---------------------------------------------------------------------------
[watermark]
# "top-left", "top-right", "bottom-left" or "bottom-right".
position = "bottom-right"
color = "#ffffff"

# ---------------------------------------------------------------------------
# Fonts
# ---------------------------------------------------------------------------
[fonts]
# Family list used for every text run. Missing families fall back to any
# sans-serif face, then to the first face available.
family = "Arial, sans-serif"

# Load fonts installed on the host.
system = true

# Extra directories scanned for .ttf, .otf and .ttc files.
dirs = []

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel batch workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
