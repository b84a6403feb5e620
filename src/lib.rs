//! # Blog Banner
//!
//! Turns a photograph into a blog header: a fixed-size, cropped, re-encoded
//! image with an optional title block and watermark drawn on top. Given the
//! same source bytes and options the output bytes are the same, every time.
//!
//! # Architecture: One Sequential Pipeline
//!
//! Every request runs the same four stages, strictly in order:
//!
//! ```text
//! 1. Decode     source bytes / path  →  raster + metadata
//! 2. Cover-fit  raster               →  width×height raster (resize, then crop)
//! 3. Overlay    options              →  SVG layer, composited over the raster
//! 4. Encode     raster               →  jpeg / png / webp bytes (+ optional file)
//! ```
//!
//! Requests share nothing mutable, so any number of them can run at once on
//! one backend. [`process::process_batch`] does exactly that with rayon.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | The engine: geometry, overlay layout, compositing, encoding, and the `ImageBackend` seam |
//! | [`request`] | Loose JSON options → validated `ProcessRequest`; `ProcessResult` wire shape |
//! | [`process`] | Boundary entry points that never fail: single transforms and parallel batches |
//! | [`config`] | `blog-banner.toml` loading, layered over stock defaults, and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Cover, Never Contain
//!
//! The output canvas is always filled. The source is scaled until both sides
//! cover the target, then the excess is cropped according to the crop policy.
//! Aspect ratio is never distorted and there is never letterboxing. Upscaling
//! a small source is accepted as is.
//!
//! ## Overlays as SVG
//!
//! Text and watermark are laid out as a small SVG document the size of the
//! output canvas and rasterized with [resvg](https://docs.rs/resvg). Layout is
//! a pure function from options to markup, so tests assert on the markup
//! without needing any installed font.
//!
//! ## Invalid Input Fails
//!
//! Out-of-range quality, fractional dimensions, unknown crop or position
//! tokens: all of these are rejected with `InvalidSpec` rather than clamped
//! or guessed. The boundary turns every error into
//! `{"success": false, "kind": ..., "error": ...}`.

pub mod config;
pub mod imaging;
pub mod output;
pub mod process;
pub mod request;
