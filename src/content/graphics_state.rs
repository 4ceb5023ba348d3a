//! Graphics state: the CTM/color/text fields the interpreter pushes
//! and pops on `q`/`Q`.

use crate::content::color::{ColorSpace, Rgb};

/// A 2D affine transform `[a b c d e f]`, applied to a point as
/// `(x' , y') = (a*x + c*y + e, b*x + d*y + f)` — PDF's row-vector
/// convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const fn identity() -> Self {
        Matrix { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 }
    }

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Matrix { a, b, c, d, e, f }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Matrix::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Matrix::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    pub fn rotate_degrees(deg: f64) -> Self {
        let r = deg.to_radians();
        Matrix::new(r.cos(), r.sin(), -r.sin(), r.cos(), 0.0, 0.0)
    }

    /// `self` applied first, then `other` — i.e. the matrix for "this
    /// transform, followed by that one", matching `cm`'s "new CTM = this
    /// matrix × old CTM" composition order.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (self.a * x + self.c * y + self.e, self.b * x + self.d * y + self.f)
    }

    /// Length of the matrix's x-basis vector, used by the interpreter to
    /// scale text advances for non-uniform text matrices, which
    /// compress glyphs horizontally.
    pub fn x_scale(&self) -> f64 {
        (self.a * self.a + self.b * self.b).sqrt()
    }

    /// Length of the matrix's y-basis vector, used for effective font
    /// size (`fontSize · |textMatrix.y-scale| · |CTM.y-scale|`).
    pub fn y_scale(&self) -> f64 {
        (self.c * self.c + self.d * self.d).sqrt()
    }

    /// `atan2` of the combined rotation the interpreter reports to the
    /// painter for text angle.
    pub fn rotation_angle_with(&self, ctm: &Matrix) -> f64 {
        (ctm.b * self.a + ctm.d * self.b).atan2(ctm.a * self.a + ctm.c * self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCap {
    Butt,
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineJoin {
    Miter,
    Round,
    Bevel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsState {
    pub ctm: Matrix,
    pub fill_color: Rgb,
    pub stroke_color: Rgb,
    pub fill_cs: ColorSpace,
    pub stroke_cs: ColorSpace,
    /// Set by `scn`/`SCN` when the operand list ends in a Name: the fill
    /// (or stroke) source is a pattern rather than a flat color.
    pub fill_pattern: Option<String>,
    pub stroke_pattern: Option<String>,
    pub fill_alpha: f32,
    pub stroke_alpha: f32,
    /// Named blend mode from the last `gs`-applied ExtGState's `/BM`
    /// entry; no blend compositor exists in this crate (rasterizing is
    /// out of scope), so this is plumbing only.
    pub blend_mode: String,
    pub line_width: f64,
    pub line_cap: LineCap,
    /// Defaults to round, not PDF's nominal miter default — see
    /// `DESIGN.md` for why this crate keeps that behavior.
    pub line_join: LineJoin,
    pub miter_limit: f64,
    /// Kept even though the painter interface has no stroke-dash
    /// parameter of its own: a host drawing dashed strokes through a
    /// lower-level canvas still needs the pattern, so the interpreter
    /// preserves it in state rather than silently dropping it.
    pub dash_pattern: Vec<f64>,
    pub dash_phase: f64,
    /// Clip region as a stack of (path bbox in device space, fill rule) —
    /// approximated by intersection of bounding boxes, see `path.rs`.
    pub clip_box: Option<(f64, f64, f64, f64)>,

    // Text state, persisted across BT/ET so repeated `Tf`/`Tc`/etc.
    // outside a text object still stick.
    pub char_spacing: f64,
    pub word_spacing: f64,
    /// `Tz` value already divided by 100 (1.0 == PDF's default "100").
    pub horizontal_scale: f64,
    pub leading: f64,
    pub font_key: Option<String>,
    pub font_size: f64,
    pub text_rise: f64,
    pub render_mode: i64,
    /// Text matrix / text line matrix. Reset at `BT`; otherwise part of
    /// the graphics state, so `q`/`Q` save and restore them along with
    /// everything else.
    pub text_matrix: Matrix,
    pub text_line_matrix: Matrix,
}

impl GraphicsState {
    pub fn initial(ctm: Matrix) -> Self {
        GraphicsState {
            ctm,
            fill_color: Rgb::BLACK,
            stroke_color: Rgb::BLACK,
            fill_cs: ColorSpace::DeviceGray,
            stroke_cs: ColorSpace::DeviceGray,
            fill_pattern: None,
            stroke_pattern: None,
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            blend_mode: "Normal".to_string(),
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Round,
            miter_limit: 10.0,
            dash_pattern: Vec::new(),
            dash_phase: 0.0,
            clip_box: None,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            font_key: None,
            font_size: 0.0,
            text_matrix: Matrix::identity(),
            text_line_matrix: Matrix::identity(),
            text_rise: 0.0,
            render_mode: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_then_scale_composes_in_cm_order() {
        let t = Matrix::translate(10.0, 0.0);
        let s = Matrix::scale(2.0, 2.0);
        let combined = t.then(&s);
        let (x, y) = combined.apply(1.0, 1.0);
        assert_eq!((x, y), (22.0, 2.0));
    }

    #[test]
    fn identity_is_a_no_op() {
        let m = Matrix::identity();
        assert_eq!(m.apply(3.0, 4.0), (3.0, 4.0));
    }
}
