//! Painter interface.
//!
//! The content-stream interpreter never rasterizes anything itself; it
//! turns path/text/image operators into calls against this trait. Mirrors
//! a narrower surface than a full rasterizer backend would expose,
//! trimmed to what the interpreter in this crate actually drives (no
//! GPU-vs-CPU backend split, no SMask push/pop bookkeeping — a host that
//! wants soft masks composites them itself around `draw_image`).

use crate::content::color::Rgb;
use crate::content::graphics_state::Matrix;
use crate::content::path::{FillRule, Path};

/// A decoded raster image ready to be placed by a `cm`-transformed unit
/// square, as produced by [`crate::document::Document::decode_image_xobject`].
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// Interleaved 8-bit RGB samples, `width * height * 3` bytes.
    pub rgb: Vec<u8>,
    /// Optional per-pixel alpha (from `/SMask` or `/Mask`), `width *
    /// height` bytes, or empty if the image is fully opaque.
    pub alpha: Vec<u8>,
}

/// A glyph placement the interpreter has already resolved to a position,
/// size, and source glyph id; the painter is responsible for outline
/// lookup and rasterization.
#[derive(Debug, Clone)]
pub struct GlyphRun {
    pub font_key: String,
    pub glyph_ids: Vec<u32>,
    /// Text-space-to-device-space matrix for this run (includes Tm, CTM,
    /// font size, Tz horizontal scaling).
    pub matrix: Matrix,
    pub fill_color: Rgb,
    pub render_mode: i64,
    /// Glyph render size in device space: `fontSize · |Tm.y-scale| ·
    /// |CTM.y-scale|`.
    pub render_size: f64,
    /// Glyph advance size in device space, scaled by the x-basis rather
    /// than the y-basis (non-uniform text matrices compress glyphs
    /// horizontally without shrinking their height).
    pub advance_size: f64,
    /// Text rotation angle in radians, combining the text and CTM
    /// rotations.
    pub angle: f64,
}

/// Sink for everything a content stream draws. Implementations may fail
/// (a painter failure stops the interpreter for that page but never
/// the whole document).
pub trait Painter {
    fn fill_path(&mut self, path: &Path, rule: FillRule, color: Rgb, alpha: f32) -> Result<(), String>;

    fn stroke_path(&mut self, path: &Path, color: Rgb, line_width: f64, alpha: f32) -> Result<(), String>;

    fn draw_glyph_run(&mut self, run: &GlyphRun) -> Result<(), String>;

    fn draw_image(&mut self, image: &RasterImage, matrix: Matrix, alpha: f32) -> Result<(), String>;

    /// Sets the page's overall rotation in degrees (0/90/180/270), called
    /// once before any drawing.
    fn set_page_rotation(&mut self, degrees: i64) {
        let _ = degrees;
    }
}

/// Discards every call; useful as a default when a host only wants
/// metadata (page count, fonts, links) and never rendering.
#[derive(Debug, Default)]
pub struct NullPainter;

impl Painter for NullPainter {
    fn fill_path(&mut self, _path: &Path, _rule: FillRule, _color: Rgb, _alpha: f32) -> Result<(), String> {
        Ok(())
    }

    fn stroke_path(&mut self, _path: &Path, _color: Rgb, _line_width: f64, _alpha: f32) -> Result<(), String> {
        Ok(())
    }

    fn draw_glyph_run(&mut self, _run: &GlyphRun) -> Result<(), String> {
        Ok(())
    }

    fn draw_image(&mut self, _image: &RasterImage, _matrix: Matrix, _alpha: f32) -> Result<(), String> {
        Ok(())
    }
}

/// One recorded painter call, for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintEvent {
    Fill { point_count: usize, rule: FillRule, color: Rgb },
    Stroke { point_count: usize, color: Rgb, line_width: f64 },
    Glyphs { font_key: String, glyph_count: usize },
    Image { width: u32, height: u32 },
    PageRotation(i64),
}

/// Records every call into a `Vec` instead of rasterizing, so tests can
/// assert on what the interpreter produced without a real raster backend.
#[derive(Debug, Default)]
pub struct RecordingPainter {
    pub events: Vec<PaintEvent>,
}

impl RecordingPainter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Painter for RecordingPainter {
    fn fill_path(&mut self, path: &Path, rule: FillRule, color: Rgb, _alpha: f32) -> Result<(), String> {
        self.events.push(PaintEvent::Fill { point_count: path.point_count(), rule, color });
        Ok(())
    }

    fn stroke_path(&mut self, path: &Path, color: Rgb, line_width: f64, _alpha: f32) -> Result<(), String> {
        self.events.push(PaintEvent::Stroke { point_count: path.point_count(), color, line_width });
        Ok(())
    }

    fn draw_glyph_run(&mut self, run: &GlyphRun) -> Result<(), String> {
        self.events.push(PaintEvent::Glyphs { font_key: run.font_key.clone(), glyph_count: run.glyph_ids.len() });
        Ok(())
    }

    fn draw_image(&mut self, image: &RasterImage, _matrix: Matrix, _alpha: f32) -> Result<(), String> {
        self.events.push(PaintEvent::Image { width: image.width, height: image.height });
        Ok(())
    }

    fn set_page_rotation(&mut self, degrees: i64) {
        self.events.push(PaintEvent::PageRotation(degrees));
    }
}
