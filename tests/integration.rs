//! End-to-end scenarios driven entirely through the public `Document` API:
//! build a minimal in-memory PDF, render it against a recording painter,
//! and check what the interpreter actually produced.

use std::sync::{Arc, Mutex};

use pdf_core::content::color::Rgb;
use pdf_core::content::graphics_state::Matrix;
use pdf_core::content::path::{FillRule, Path};
use pdf_core::events::{DiagnosticEvent, DiagnosticSink};
use pdf_core::painter::{GlyphRun, PaintEvent, Painter, RasterImage, RecordingPainter};
use pdf_core::Document;

/// Builds a minimal single-page PDF (200x200 MediaBox) around one content
/// stream, with an optional extra indirect object appended before the
/// xref table (used for the Form XObject scenario below). Mirrors
/// `Document`'s own inline `minimal_pdf` test helper.
fn minimal_pdf(resources: &[u8], content: &[u8], extra_objects: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.7\n");
    let mut offsets = Vec::new();

    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");

    offsets.push(out.len());
    out.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n");

    offsets.push(out.len());
    out.extend_from_slice(b"3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 200] /Resources ");
    out.extend_from_slice(resources);
    out.extend_from_slice(b" /Contents 4 0 R >>\nendobj\n");

    offsets.push(out.len());
    out.extend_from_slice(format!("4 0 obj\n<< /Length {} >>\nstream\n", content.len()).as_bytes());
    out.extend_from_slice(content);
    out.extend_from_slice(b"\nendstream\nendobj\n");

    for obj in extra_objects {
        offsets.push(out.len());
        out.extend_from_slice(obj);
    }

    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", offsets.len() + 1).as_bytes());
    for off in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
    }
    out.extend_from_slice(format!("trailer\n<< /Size {} /Root 1 0 R >>\n", offsets.len() + 1).as_bytes());
    out.extend_from_slice(format!("startxref\n{xref_offset}\n%%EOF").as_bytes());
    out
}

/// A font resource wide enough to cover every code used by the text
/// scenarios below, with every glyph given the same 600/1000 em width so
/// advances are simple arithmetic to check by hand.
fn flat_width_font() -> String {
    let widths = "600 ".repeat(80);
    let widths = widths.trim_end();
    format!(
        "<< /Font << /F1 << /Type /Font /Subtype /Type1 /BaseFont /Helvetica \
         /FirstChar 32 /Widths [{widths}] /Encoding /WinAnsiEncoding >> >> >>"
    )
}

/// Records every fill and glyph run with full geometry, unlike
/// [`RecordingPainter`] which only keeps point counts — needed here to
/// check clipped coordinates and text-matrix translation directly.
#[derive(Default)]
struct CapturingPainter {
    fills: Vec<(Path, FillRule, Rgb)>,
    glyphs: Vec<GlyphRun>,
}

impl Painter for CapturingPainter {
    fn fill_path(&mut self, path: &Path, rule: FillRule, color: Rgb, _alpha: f32) -> Result<(), String> {
        self.fills.push((path.clone(), rule, color));
        Ok(())
    }

    fn stroke_path(&mut self, _path: &Path, _color: Rgb, _line_width: f64, _alpha: f32) -> Result<(), String> {
        Ok(())
    }

    fn draw_glyph_run(&mut self, run: &GlyphRun) -> Result<(), String> {
        self.glyphs.push(run.clone());
        Ok(())
    }

    fn draw_image(&mut self, _image: &RasterImage, _matrix: Matrix, _alpha: f32) -> Result<(), String> {
        Ok(())
    }
}

/// A [`DiagnosticSink`] that keeps a handle outside the `Document` so a
/// test can inspect diagnostics after `render_page` returns (unlike
/// `RecordingSink`, which `Document::load_with_sink` takes ownership of).
#[derive(Debug, Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<DiagnosticEvent>>>);

impl DiagnosticSink for SharedSink {
    fn emit(&self, event: DiagnosticEvent) {
        self.0.lock().expect("SharedSink poisoned").push(event);
    }
}

#[test]
fn gray_rectangle_fill_reports_one_fill_event() {
    let bytes = minimal_pdf(b"<< >>", b"0.5 g 10 10 100 50 re f", &[]);
    let doc = Document::load(&bytes).unwrap();
    let mut painter = RecordingPainter::new();
    doc.render_page(0, &mut painter).unwrap();

    assert_eq!(
        painter.events,
        vec![PaintEvent::Fill { point_count: 5, rule: FillRule::NonZero, color: Rgb::gray(0.5) }]
    );
}

#[test]
fn nested_clip_intersects_the_fill_to_the_clip_box() {
    let content = b"q 1 0 0 1 50 50 cm 0 0 100 100 re W n 1 0 0 rg 0 0 200 200 re f Q";
    let bytes = minimal_pdf(b"<< >>", content, &[]);
    let doc = Document::load(&bytes).unwrap();
    let mut painter = CapturingPainter::default();
    doc.render_page(0, &mut painter).unwrap();

    assert_eq!(painter.fills.len(), 1);
    let (path, rule, color) = &painter.fills[0];
    assert_eq!(*rule, FillRule::NonZero);
    assert_eq!(*color, Rgb { r: 1.0, g: 0.0, b: 0.0 });
    // The 200x200 fill rectangle (translated by the `cm`) gets clamped down
    // to the 100x100 clip box established by `W n`, not drawn at full size.
    assert_eq!(
        path.subpaths[0],
        vec![(50.0, 50.0), (150.0, 50.0), (150.0, 150.0), (50.0, 150.0), (50.0, 50.0)]
    );
}

#[test]
fn tj_advances_the_text_matrix_by_the_sum_of_glyph_widths() {
    let resources = flat_width_font();
    let content = b"BT /F1 10 Tf (Hello) Tj (X) Tj ET";
    let bytes = minimal_pdf(resources.as_bytes(), content, &[]);
    let doc = Document::load(&bytes).unwrap();
    let mut painter = CapturingPainter::default();
    doc.render_page(0, &mut painter).unwrap();

    assert_eq!(painter.glyphs.len(), 2);
    assert_eq!(painter.glyphs[0].glyph_ids.len(), 5);
    assert!((painter.glyphs[0].matrix.e - 0.0).abs() < 1e-9);
    // Five 600/1000-em glyphs at font size 10 advance by 5 * 6.0 = 30pt.
    assert!((painter.glyphs[1].matrix.e - 30.0).abs() < 1e-9);
    // Identity CTM and text matrix, so render/advance size both equal the
    // raw font size, with no rotation.
    assert!((painter.glyphs[0].render_size - 10.0).abs() < 1e-9);
    assert!((painter.glyphs[0].advance_size - 10.0).abs() < 1e-9);
    assert!(painter.glyphs[0].angle.abs() < 1e-9);
}

#[test]
fn tj_array_kerning_adjustment_shifts_the_next_glyph() {
    let resources = flat_width_font();
    let content = b"BT /F1 10 Tf [(A) -120 (B)] TJ ET";
    let bytes = minimal_pdf(resources.as_bytes(), content, &[]);
    let doc = Document::load(&bytes).unwrap();
    let mut painter = CapturingPainter::default();
    doc.render_page(0, &mut painter).unwrap();

    assert_eq!(painter.glyphs.len(), 2);
    let a_x = painter.glyphs[0].matrix.e;
    let b_x = painter.glyphs[1].matrix.e;
    // A's natural advance alone is 6.0pt; the -120 TJ adjustment (a
    // positive shift, since TJ numbers subtract) pushes B out to 7.2pt.
    assert!((a_x - 0.0).abs() < 1e-9);
    assert!((b_x - 7.2).abs() < 1e-9);
}

#[test]
fn self_referential_form_xobject_stops_at_the_recursion_cap_and_page_continues() {
    // Object 5 is a Form XObject whose own /Resources points `/X0` right
    // back at itself (`5 0 R`), the way a buggy or adversarial generator
    // might. The interpreter should stop recursing once the cap is hit,
    // log exactly one diagnostic for it, and still execute the rest of
    // the page's content stream afterward.
    let form_resources = b"<< /XObject << /X0 5 0 R >> >>";
    let form_content = b"/X0 Do";
    let form_obj = format!(
        "5 0 obj\n<< /Type /XObject /Subtype /Form /BBox [0 0 200 200] /Resources {} /Length {} >>\nstream\n{}\nendstream\nendobj\n",
        String::from_utf8_lossy(form_resources),
        form_content.len(),
        String::from_utf8_lossy(form_content),
    );

    let page_resources = b"<< /XObject << /X0 5 0 R >> >>";
    let page_content = b"/X0 Do 0.5 g 10 10 50 50 re f";
    let bytes = minimal_pdf(page_resources, page_content, &[form_obj.into_bytes()]);

    let sink = SharedSink::default();
    let doc = Document::load_with_sink(&bytes, Box::new(sink.clone())).unwrap();
    let mut painter = RecordingPainter::new();
    doc.render_page(0, &mut painter).unwrap();

    let events = sink.0.lock().unwrap();
    let cap_hits = events.iter().filter(|e| matches!(e, DiagnosticEvent::ResourceCapExceeded { cap: "interpreter_recursion", .. })).count();
    assert_eq!(cap_hits, 1);

    // The page's own fill after the runaway `Do` still goes through.
    assert!(painter.events.iter().any(|e| matches!(e, PaintEvent::Fill { .. })));
}
