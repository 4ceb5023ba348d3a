//! Path construction: the `m l c v y h re` operators.
//!
//! Builds device-space polylines: curves are flattened to line segments
//! at construction time rather than handed to the painter as Béziers,
//! since [`crate::painter::Painter`] only deals in polygons.

use crate::content::graphics_state::Matrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    NonZero,
    EvenOdd,
}

const CURVE_STEPS: usize = 16;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    pub subpaths: Vec<Vec<(f64, f64)>>,
}

impl Path {
    pub fn new() -> Self {
        Path::default()
    }

    pub fn point_count(&self) -> usize {
        self.subpaths.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.subpaths.iter().all(|s| s.is_empty())
    }

    fn current_subpath(&mut self) -> &mut Vec<(f64, f64)> {
        if self.subpaths.last().map(|s| s.is_empty()).unwrap_or(true) && self.subpaths.last().is_some() {
            return self.subpaths.last_mut().unwrap();
        }
        self.subpaths.push(Vec::new());
        self.subpaths.last_mut().unwrap()
    }

    pub fn move_to(&mut self, p: (f64, f64)) {
        self.subpaths.push(vec![p]);
    }

    pub fn line_to(&mut self, p: (f64, f64)) {
        if self.subpaths.is_empty() {
            self.subpaths.push(vec![p]);
        } else {
            self.subpaths.last_mut().unwrap().push(p);
        }
    }

    pub fn curve_to(&mut self, p0: (f64, f64), p1: (f64, f64), p2: (f64, f64), p3: (f64, f64)) {
        let sub = if self.subpaths.is_empty() { self.move_to(p0); self.subpaths.last_mut().unwrap() } else { self.subpaths.last_mut().unwrap() };
        for i in 1..=CURVE_STEPS {
            let t = i as f64 / CURVE_STEPS as f64;
            sub.push(cubic_bezier(p0, p1, p2, p3, t));
        }
    }

    pub fn close(&mut self) {
        if let Some(sub) = self.subpaths.last_mut() {
            if let Some(&first) = sub.first() {
                if sub.last() != Some(&first) {
                    sub.push(first);
                }
            }
        }
    }

    pub fn rectangle(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.subpaths.push(vec![(x, y), (x + w, y), (x + w, y + h), (x, y + h), (x, y)]);
    }

    pub fn transformed(&self, m: &Matrix) -> Path {
        Path {
            subpaths: self
                .subpaths
                .iter()
                .map(|sub| sub.iter().map(|&(x, y)| m.apply(x, y)).collect())
                .collect(),
        }
    }

    /// Clamps every point into `bbox`. A true polygon clip would need a
    /// Sutherland-Hodgman pass per clip edge; this crate approximates
    /// clipping with the device-space clip bounding box (see
    /// `GraphicsState::clip_box`'s doc comment), so an axis-aligned
    /// fill path against an axis-aligned clip box — the common case —
    /// comes out exactly right, and anything else degrades gracefully
    /// rather than over- or under-painting by much.
    pub fn clipped_to_box(&self, bbox: (f64, f64, f64, f64)) -> Path {
        let (x0, y0, x1, y1) = bbox;
        Path {
            subpaths: self
                .subpaths
                .iter()
                .map(|sub| sub.iter().map(|&(x, y)| (x.clamp(x0, x1), y.clamp(y0, y1))).collect())
                .collect(),
        }
    }

    pub fn bounding_box(&self) -> Option<(f64, f64, f64, f64)> {
        let mut iter = self.subpaths.iter().flatten();
        let first = iter.next()?;
        let mut bb = (first.0, first.1, first.0, first.1);
        for &(x, y) in iter {
            bb.0 = bb.0.min(x);
            bb.1 = bb.1.min(y);
            bb.2 = bb.2.max(x);
            bb.3 = bb.3.max(y);
        }
        Some(bb)
    }
}

fn cubic_bezier(p0: (f64, f64), p1: (f64, f64), p2: (f64, f64), p3: (f64, f64), t: f64) -> (f64, f64) {
    let mt = 1.0 - t;
    let a = mt * mt * mt;
    let b = 3.0 * mt * mt * t;
    let c = 3.0 * mt * t * t;
    let d = t * t * t;
    (
        a * p0.0 + b * p1.0 + c * p2.0 + d * p3.0,
        a * p0.1 + b * p1.1 + c * p2.1 + d * p3.1,
    )
}

/// Intersects two device-space bounding boxes, as used for nested clip
/// regions.
pub fn intersect_boxes(
    a: Option<(f64, f64, f64, f64)>,
    b: Option<(f64, f64, f64, f64)>,
) -> Option<(f64, f64, f64, f64)> {
    match (a, b) {
        (None, x) => x,
        (x, None) => x,
        (Some(a), Some(b)) => {
            let x0 = a.0.max(b.0);
            let y0 = a.1.max(b.1);
            let x1 = a.2.min(b.2);
            let y1 = a.3.min(b.3);
            Some((x0, y0, x1.max(x0), y1.max(y0)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangle_has_five_points_closed() {
        let mut p = Path::new();
        p.rectangle(0.0, 0.0, 10.0, 20.0);
        assert_eq!(p.subpaths[0].len(), 5);
        assert_eq!(p.subpaths[0][0], p.subpaths[0][4]);
    }

    #[test]
    fn nested_clip_intersection_shrinks_to_overlap() {
        let outer = Some((0.0, 0.0, 100.0, 100.0));
        let inner = Some((20.0, 20.0, 50.0, 50.0));
        let result = intersect_boxes(outer, inner);
        assert_eq!(result, Some((20.0, 20.0, 50.0, 50.0)));
    }

    #[test]
    fn disjoint_clip_collapses_to_empty_area() {
        let a = Some((0.0, 0.0, 10.0, 10.0));
        let b = Some((20.0, 20.0, 30.0, 30.0));
        let result = intersect_boxes(a, b).unwrap();
        assert_eq!(result.2 - result.0, 0.0);
    }
}
