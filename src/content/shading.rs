//! Shadings: the `sh` operator, and pattern fills with a
//! `/PatternType 2` shading pattern.
//!
//! Axial (Type 2) and radial (Type 3) shadings are supported by sampling
//! the underlying function; the painter interface this crate targets
//! takes a single fill color per path, so a shading is flattened to its
//! midpoint color rather than rasterized as a true gradient. Types 1/4-7
//! (function-based and mesh shadings) are declared unsupported and fall
//! back to the same midpoint-of-domain approximation.

use crate::content::color::{ColorSpace, Rgb};
use crate::content::function::PdfFunction;
use crate::events::{DiagnosticEvent, DiagnosticSink};
use crate::object::Dictionary;

pub struct Shading {
    pub shading_type: i64,
    pub color_space: ColorSpace,
    pub function: Option<PdfFunction>,
}

impl Shading {
    pub fn parse(dict: &Dictionary, resources: Option<&Dictionary>, limits: &crate::limits::Limits, sink: &dyn DiagnosticSink) -> Shading {
        let shading_type = dict.get("ShadingType").and_then(|o| o.as_int()).unwrap_or(2);
        let color_space = dict
            .get("ColorSpace")
            .map(|o| ColorSpace::resolve(o, resources, limits))
            .unwrap_or(ColorSpace::DeviceGray);
        let function = dict.get("Function").map(|o| PdfFunction::parse(o, sink));
        if !(2..=3).contains(&shading_type) {
            sink.emit(DiagnosticEvent::Unsupported { kind: "shading_type", name: shading_type.to_string() });
        }
        Shading { shading_type, color_space, function }
    }

    /// A single representative color for this shading, sampled at the
    /// function's domain midpoint (t = 0.5 for axial/radial shadings).
    pub fn approximate_color(&self) -> Rgb {
        match &self.function {
            Some(f) => {
                let values = f.eval(&[0.5]);
                self.color_space.to_rgb(&values.iter().map(|&v| v as f32).collect::<Vec<_>>())
            }
            None => Rgb::gray(0.5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;
    use crate::object::Object;

    #[test]
    fn shading_without_function_defaults_to_mid_gray() {
        let dict = Dictionary::from(vec![("ShadingType", Object::Number(2.0))]);
        let shading = Shading::parse(&dict, None, &crate::limits::Limits::default(), &NullSink);
        assert_eq!(shading.approximate_color(), Rgb::gray(0.5));
    }
}
