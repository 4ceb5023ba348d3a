//! Pattern fills: `scn`/`SCN` with a trailing Name operand.
//!
//! Neither pattern kind is rasterized as an actual repeating tile or
//! gradient: the painter interface takes one flat color per fill, so both
//! tiling and shading patterns are reduced to a single representative
//! color, approximated rather than rendered pixel-for-pixel.

use crate::content::color::Rgb;
use crate::content::graphics_state::Matrix;
use crate::content::shading::Shading;
use crate::content::Interpreter;
use crate::document::Document;
use crate::events::DiagnosticSink;
use crate::limits::Limits;
use crate::object::{Dictionary, Object};
use crate::painter::{PaintEvent, RecordingPainter};

/// Resolves a `/Pattern` resource entry to a single representative color.
pub fn approximate_pattern_color(
    doc: &Document,
    pattern_obj: &Object,
    resources: Option<&Dictionary>,
    limits: &Limits,
    sink: &dyn DiagnosticSink,
) -> Rgb {
    let Some(dict) = pattern_obj.as_dict() else {
        return Rgb::gray(0.5);
    };
    let pattern_type = dict.get("PatternType").and_then(|o| o.as_int()).unwrap_or(1);

    if pattern_type == 2 {
        let shading = dict.get("Shading").map(|o| doc.resolve(o));
        return match shading.as_ref().and_then(|o| o.as_dict()) {
            Some(shading_dict) => Shading::parse(shading_dict, resources, limits, sink).approximate_color(),
            None => Rgb::gray(0.5),
        };
    }

    // Tiling pattern: run its content stream once through a recording
    // painter with an identity CTM (pattern space is independent of the
    // page's CTM) and average whatever fills it reported.
    let Some(stream) = pattern_obj.as_stream() else {
        return Rgb::gray(0.5);
    };
    let content = crate::filters::decode_stream(stream, sink);
    let pattern_resources = dict
        .get("Resources")
        .map(|o| doc.resolve(o))
        .and_then(|o| o.as_dict().cloned())
        .or_else(|| resources.cloned());
    let empty = Dictionary::new();

    let mut recorder = RecordingPainter::new();
    let interp = Interpreter::new(doc, limits, sink, None);
    // Cap depth at the recursion limit immediately: a tiling pattern whose
    // content references another pattern or a Form XObject stops there
    // rather than tiling indefinitely.
    interp.run(&content, pattern_resources.as_ref().unwrap_or(&empty), Matrix::identity(), &mut recorder, limits.max_interpreter_recursion);
    average_fill_color(&recorder.events)
}

fn average_fill_color(events: &[PaintEvent]) -> Rgb {
    let mut sum = (0.0f32, 0.0f32, 0.0f32);
    let mut count = 0u32;
    for event in events {
        if let PaintEvent::Fill { color, .. } = event {
            sum.0 += color.r;
            sum.1 += color.g;
            sum.2 += color.b;
            count += 1;
        }
    }
    if count == 0 {
        Rgb::gray(0.5)
    } else {
        Rgb { r: sum.0 / count as f32, g: sum.1 / count as f32, b: sum.2 / count as f32 }
    }
}
