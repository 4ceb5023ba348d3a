//! Content-stream interpreter, the heart of this crate.
//!
//! Walks the operator stream of a page or Form XObject and drives an
//! abstract [`crate::painter::Painter`]; it never rasterizes anything
//! itself, following the standard operand-stack-then-keyword content
//! stream grammar.

pub mod color;
pub mod function;
pub mod graphics_state;
pub mod path;
pub mod pattern;
pub mod shading;

use color::{ColorSpace, Rgb};
use graphics_state::{GraphicsState, LineCap, LineJoin, Matrix};
use path::{intersect_boxes, FillRule, Path};
use shading::Shading;

use crate::document::Document;
use crate::events::{DiagnosticEvent, DiagnosticSink};
use crate::font;
use crate::lexer::{Lexer, TokenType};
use crate::limits::Limits;
use crate::object::{Dictionary, Name, Object};
use crate::painter::{GlyphRun, Painter};

/// Drives one content stream (a page's, a Form XObject's, or a tiling
/// pattern's) against a [`Painter`]. Stateless between `run` calls; all
/// mutable state (graphics state stack, current path) lives on the stack
/// of `run_inner` itself.
pub struct Interpreter<'a> {
    doc: &'a Document,
    limits: &'a Limits,
    sink: &'a dyn DiagnosticSink,
    /// Device-space page rectangle, used as the fill target for `sh` when
    /// no clip is active (an unclipped `sh` fills the page's crop box).
    page_bbox: Option<(f64, f64, f64, f64)>,
}

impl<'a> Interpreter<'a> {
    pub fn new(doc: &'a Document, limits: &'a Limits, sink: &'a dyn DiagnosticSink, page_bbox: Option<(f64, f64, f64, f64)>) -> Self {
        Interpreter { doc, limits, sink, page_bbox }
    }

    /// Runs one top-level content stream (a page's). Returns the number of
    /// painter failures encountered; these stop nothing but are worth
    /// reporting back through `PageDone`.
    pub fn run(&self, content: &[u8], resources: &Dictionary, ctm: Matrix, painter: &mut dyn Painter, depth: usize) -> usize {
        self.run_inner(content, resources, ctm, None, painter, depth)
    }

    fn run_inner(
        &self,
        content: &[u8],
        resources: &Dictionary,
        ctm: Matrix,
        inherited_clip: Option<(f64, f64, f64, f64)>,
        painter: &mut dyn Painter,
        depth: usize,
    ) -> usize {
        let mut gs = GraphicsState::initial(ctm);
        gs.clip_box = inherited_clip;
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut path = Path::new();
        let mut current_point = (0.0, 0.0);
        let mut pending_clip: Option<FillRule> = None;
        let mut error_count = 0usize;
        let mut operands: Vec<Object> = Vec::new();

        let mut lex = Lexer::with_limits(content, *self.limits);
        let cap = self.limits.content_iteration_cap(content.len());
        let mut iterations = 0usize;

        loop {
            if iterations >= cap {
                self.sink.emit(DiagnosticEvent::ResourceCapExceeded { cap: "content_iteration", page_index: None });
                break;
            }
            iterations += 1;

            let t = lex.peek();
            if t.kind == TokenType::EndOfFile {
                break;
            }
            if let Some(operand) = self.read_operand(&mut lex) {
                operands.push(operand);
                continue;
            }
            let op_tok = lex.next();
            if op_tok.kind != TokenType::Keyword {
                // Stray delimiter we don't model (e.g. a lone '{'); drop it
                // and keep going rather than stalling the whole stream.
                continue;
            }
            self.execute_operator(
                op_tok.text().as_ref(),
                &operands,
                &mut gs,
                &mut stack,
                &mut path,
                &mut current_point,
                &mut pending_clip,
                resources,
                painter,
                depth,
                &mut error_count,
            );
            operands.clear();
        }

        error_count
    }

    fn read_operand(&self, lex: &mut Lexer<'_>) -> Option<Object> {
        let t = lex.peek();
        match t.kind {
            TokenType::Number => {
                lex.next();
                Some(Object::Number(t.text().parse().unwrap_or(0.0)))
            }
            TokenType::LiteralString | TokenType::HexString => {
                lex.next();
                Some(Object::String(t.bytes))
            }
            TokenType::Name => {
                lex.next();
                Some(Object::Name(Name::new(t.bytes)))
            }
            TokenType::Delimiter if t.is_delimiter("[") => {
                lex.next();
                Some(self.read_array(lex))
            }
            TokenType::Delimiter if t.is_delimiter("<<") => {
                lex.next();
                Some(Object::Dictionary(self.read_dict(lex)))
            }
            _ => None,
        }
    }

    fn read_array(&self, lex: &mut Lexer<'_>) -> Object {
        let mut items = Vec::new();
        loop {
            if items.len() >= self.limits.max_array_items {
                self.sink.emit(DiagnosticEvent::ResourceCapExceeded { cap: "array_items", page_index: None });
                break;
            }
            let t = lex.peek();
            if t.kind == TokenType::EndOfFile || t.is_delimiter("]") {
                if t.is_delimiter("]") {
                    lex.next();
                }
                break;
            }
            match self.read_operand(lex) {
                Some(v) => items.push(v),
                None => {
                    lex.next();
                }
            }
        }
        Object::Array(items)
    }

    fn read_dict(&self, lex: &mut Lexer<'_>) -> Dictionary {
        let mut dict = Dictionary::new();
        loop {
            if dict.len() >= self.limits.max_dict_entries {
                self.sink.emit(DiagnosticEvent::ResourceCapExceeded { cap: "dict_entries", page_index: None });
                break;
            }
            let t = lex.peek();
            if t.kind == TokenType::EndOfFile || t.is_delimiter(">>") {
                if t.is_delimiter(">>") {
                    lex.next();
                }
                break;
            }
            if t.kind != TokenType::Name {
                lex.next();
                continue;
            }
            lex.next();
            let key = Name::new(t.bytes);
            match self.read_operand(lex) {
                Some(v) => dict.set(key, v),
                None => break,
            }
        }
        dict
    }

    #[allow(clippy::too_many_arguments)]
    fn execute_operator(
        &self,
        op: &str,
        operands: &[Object],
        gs: &mut GraphicsState,
        stack: &mut Vec<GraphicsState>,
        path: &mut Path,
        current_point: &mut (f64, f64),
        pending_clip: &mut Option<FillRule>,
        resources: &Dictionary,
        painter: &mut dyn Painter,
        depth: usize,
        error_count: &mut usize,
    ) {
        match op {
            "q" => {
                if stack.len() < self.limits.max_graphics_state_depth {
                    stack.push(gs.clone());
                } else {
                    self.sink.emit(DiagnosticEvent::ResourceCapExceeded { cap: "graphics_state_depth", page_index: None });
                }
            }
            "Q" => {
                if let Some(prev) = stack.pop() {
                    *gs = prev;
                }
            }
            "cm" => {
                let m = Matrix::new(num(operands, 0), num(operands, 1), num(operands, 2), num(operands, 3), num(operands, 4), num(operands, 5));
                gs.ctm = m.then(&gs.ctm);
            }
            "w" => gs.line_width = num(operands, 0),
            "J" => gs.line_cap = match num(operands, 0) as i64 {
                1 => LineCap::Round,
                2 => LineCap::Square,
                _ => LineCap::Butt,
            },
            "j" => gs.line_join = match num(operands, 0) as i64 {
                0 => LineJoin::Miter,
                2 => LineJoin::Bevel,
                _ => LineJoin::Round,
            },
            "M" => gs.miter_limit = num(operands, 0),
            "d" => {
                gs.dash_pattern = operands.first().and_then(|o| o.as_array()).map(|a| a.iter().filter_map(|o| o.as_number()).collect()).unwrap_or_default();
                gs.dash_phase = num(operands, 1);
            }
            "gs" => self.apply_ext_gstate(operands, gs, resources),
            "BX" | "EX" => {}

            "CS" => {
                if let Some(name_obj) = operands.first() {
                    gs.stroke_cs = ColorSpace::resolve(name_obj, Some(resources), self.limits);
                    gs.stroke_color = gs.stroke_cs.default_color();
                    gs.stroke_pattern = None;
                }
            }
            "cs" => {
                if let Some(name_obj) = operands.first() {
                    gs.fill_cs = ColorSpace::resolve(name_obj, Some(resources), self.limits);
                    gs.fill_color = gs.fill_cs.default_color();
                    gs.fill_pattern = None;
                }
            }
            "SC" => {
                gs.stroke_color = gs.stroke_cs.to_rgb(&numbers(operands));
                gs.stroke_pattern = None;
            }
            "sc" => {
                gs.fill_color = gs.fill_cs.to_rgb(&numbers(operands));
                gs.fill_pattern = None;
            }
            "SCN" => self.apply_colorn(operands, gs, resources, false),
            "scn" => self.apply_colorn(operands, gs, resources, true),
            "G" => {
                gs.stroke_cs = ColorSpace::DeviceGray;
                gs.stroke_color = Rgb::gray(num(operands, 0) as f32);
                gs.stroke_pattern = None;
            }
            "g" => {
                gs.fill_cs = ColorSpace::DeviceGray;
                gs.fill_color = Rgb::gray(num(operands, 0) as f32);
                gs.fill_pattern = None;
            }
            "RG" => {
                gs.stroke_cs = ColorSpace::DeviceRgb;
                gs.stroke_color = Rgb { r: num(operands, 0) as f32, g: num(operands, 1) as f32, b: num(operands, 2) as f32 };
                gs.stroke_pattern = None;
            }
            "rg" => {
                gs.fill_cs = ColorSpace::DeviceRgb;
                gs.fill_color = Rgb { r: num(operands, 0) as f32, g: num(operands, 1) as f32, b: num(operands, 2) as f32 };
                gs.fill_pattern = None;
            }
            "K" => {
                gs.stroke_cs = ColorSpace::DeviceCmyk;
                gs.stroke_color = Rgb::from_cmyk(num(operands, 0) as f32, num(operands, 1) as f32, num(operands, 2) as f32, num(operands, 3) as f32);
                gs.stroke_pattern = None;
            }
            "k" => {
                gs.fill_cs = ColorSpace::DeviceCmyk;
                gs.fill_color = Rgb::from_cmyk(num(operands, 0) as f32, num(operands, 1) as f32, num(operands, 2) as f32, num(operands, 3) as f32);
                gs.fill_pattern = None;
            }

            "m" => {
                *current_point = (num(operands, 0), num(operands, 1));
                path.move_to(*current_point);
            }
            "l" => {
                *current_point = (num(operands, 0), num(operands, 1));
                path.line_to(*current_point);
            }
            "c" => {
                let p1 = (num(operands, 0), num(operands, 1));
                let p2 = (num(operands, 2), num(operands, 3));
                let p3 = (num(operands, 4), num(operands, 5));
                path.curve_to(*current_point, p1, p2, p3);
                *current_point = p3;
            }
            "v" => {
                let p2 = (num(operands, 0), num(operands, 1));
                let p3 = (num(operands, 2), num(operands, 3));
                path.curve_to(*current_point, *current_point, p2, p3);
                *current_point = p3;
            }
            "y" => {
                let p1 = (num(operands, 0), num(operands, 1));
                let p3 = (num(operands, 2), num(operands, 3));
                path.curve_to(*current_point, p1, p3, p3);
                *current_point = p3;
            }
            "h" => {
                path.close();
                if let Some(sub) = path.subpaths.last() {
                    if let Some(&first) = sub.first() {
                        *current_point = first;
                    }
                }
            }
            "re" => {
                let (x, y, w, h) = (num(operands, 0), num(operands, 1), num(operands, 2), num(operands, 3));
                path.rectangle(x, y, w, h);
                *current_point = (x, y);
            }

            "W" => *pending_clip = Some(FillRule::NonZero),
            "W*" => *pending_clip = Some(FillRule::EvenOdd),

            "S" => {
                self.stroke(path, gs, painter, error_count);
                self.finish_path(path, gs, pending_clip);
            }
            "s" => {
                path.close();
                self.stroke(path, gs, painter, error_count);
                self.finish_path(path, gs, pending_clip);
            }
            "f" | "F" => {
                self.fill(path, gs, FillRule::NonZero, painter, error_count);
                self.finish_path(path, gs, pending_clip);
            }
            "f*" => {
                self.fill(path, gs, FillRule::EvenOdd, painter, error_count);
                self.finish_path(path, gs, pending_clip);
            }
            "B" => {
                self.fill(path, gs, FillRule::NonZero, painter, error_count);
                self.stroke(path, gs, painter, error_count);
                self.finish_path(path, gs, pending_clip);
            }
            "B*" => {
                self.fill(path, gs, FillRule::EvenOdd, painter, error_count);
                self.stroke(path, gs, painter, error_count);
                self.finish_path(path, gs, pending_clip);
            }
            "b" => {
                path.close();
                self.fill(path, gs, FillRule::NonZero, painter, error_count);
                self.stroke(path, gs, painter, error_count);
                self.finish_path(path, gs, pending_clip);
            }
            "b*" => {
                path.close();
                self.fill(path, gs, FillRule::EvenOdd, painter, error_count);
                self.stroke(path, gs, painter, error_count);
                self.finish_path(path, gs, pending_clip);
            }
            "n" => self.finish_path(path, gs, pending_clip),

            "sh" => self.apply_shading(operands, gs, resources, painter, error_count),

            "BT" => {
                gs.text_matrix = Matrix::identity();
                gs.text_line_matrix = Matrix::identity();
            }
            "ET" => {}
            "Tf" => {
                if let Some(Object::Name(name)) = operands.first() {
                    gs.font_key = Some(name.as_str_lossy().into_owned());
                }
                gs.font_size = num(operands, 1);
            }
            "TL" => gs.leading = num(operands, 0),
            "Tc" => gs.char_spacing = num(operands, 0),
            "Tw" => gs.word_spacing = num(operands, 0),
            "Tz" => gs.horizontal_scale = num(operands, 0) / 100.0,
            "Ts" => gs.text_rise = num(operands, 0),
            "Tr" => gs.render_mode = num(operands, 0) as i64,
            "Tm" => {
                let m = Matrix::new(num(operands, 0), num(operands, 1), num(operands, 2), num(operands, 3), num(operands, 4), num(operands, 5));
                gs.text_matrix = m;
                gs.text_line_matrix = m;
            }
            "Td" => {
                let m = Matrix::translate(num(operands, 0), num(operands, 1)).then(&gs.text_line_matrix);
                gs.text_line_matrix = m;
                gs.text_matrix = m;
            }
            "TD" => {
                gs.leading = -num(operands, 1);
                let m = Matrix::translate(num(operands, 0), num(operands, 1)).then(&gs.text_line_matrix);
                gs.text_line_matrix = m;
                gs.text_matrix = m;
            }
            "T*" => {
                let m = Matrix::translate(0.0, -gs.leading).then(&gs.text_line_matrix);
                gs.text_line_matrix = m;
                gs.text_matrix = m;
            }
            "Tj" => {
                if let Some(Object::String(bytes)) = operands.first() {
                    self.show_text(gs, resources, bytes, painter, error_count);
                }
            }
            "'" => {
                let m = Matrix::translate(0.0, -gs.leading).then(&gs.text_line_matrix);
                gs.text_line_matrix = m;
                gs.text_matrix = m;
                if let Some(Object::String(bytes)) = operands.first() {
                    self.show_text(gs, resources, bytes, painter, error_count);
                }
            }
            "\"" => {
                gs.word_spacing = num(operands, 0);
                gs.char_spacing = num(operands, 1);
                let m = Matrix::translate(0.0, -gs.leading).then(&gs.text_line_matrix);
                gs.text_line_matrix = m;
                gs.text_matrix = m;
                if let Some(Object::String(bytes)) = operands.get(2) {
                    self.show_text(gs, resources, bytes, painter, error_count);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    self.show_text_array(gs, resources, items, painter, error_count);
                }
            }

            "Do" => {
                if let Some(Object::Name(name)) = operands.first() {
                    self.do_xobject(&name.as_str_lossy(), gs, resources, painter, depth, error_count);
                }
            }

            _ => {}
        }
    }

    fn apply_ext_gstate(&self, operands: &[Object], gs: &mut GraphicsState, resources: &Dictionary) {
        let Some(Object::Name(name)) = operands.first() else { return };
        let Some(egs) = self.lookup_resource(resources, "ExtGState", &name.as_str_lossy()) else { return };
        if let Some(ca) = egs.get("ca").and_then(|o| o.as_number()) {
            gs.fill_alpha = ca as f32;
        }
        if let Some(ca) = egs.get("CA").and_then(|o| o.as_number()) {
            gs.stroke_alpha = ca as f32;
        }
        if let Some(lw) = egs.get("LW").and_then(|o| o.as_number()) {
            gs.line_width = lw;
        }
        if let Some(bm) = egs.get("BM") {
            gs.blend_mode = match bm {
                Object::Name(n) => n.as_str_lossy().into_owned(),
                Object::Array(a) => a.first().and_then(|o| o.as_name()).map(|n| n.as_str_lossy().into_owned()).unwrap_or_else(|| "Normal".into()),
                _ => "Normal".into(),
            };
        }
    }

    fn apply_colorn(&self, operands: &[Object], gs: &mut GraphicsState, resources: &Dictionary, fill: bool) {
        if let Some(Object::Name(name)) = operands.last() {
            let pattern_name = name.as_str_lossy().into_owned();
            let color = self
                .lookup_resource_obj(resources, "Pattern", &pattern_name)
                .map(|obj| pattern::approximate_pattern_color(self.doc, &obj, Some(resources), self.limits, self.sink));
            if fill {
                gs.fill_pattern = Some(pattern_name);
                if let Some(c) = color {
                    gs.fill_color = c;
                }
            } else {
                gs.stroke_pattern = Some(pattern_name);
                if let Some(c) = color {
                    gs.stroke_color = c;
                }
            }
        } else {
            let values = numbers(operands);
            if fill {
                gs.fill_color = gs.fill_cs.to_rgb(&values);
                gs.fill_pattern = None;
            } else {
                gs.stroke_color = gs.stroke_cs.to_rgb(&values);
                gs.stroke_pattern = None;
            }
        }
    }

    fn apply_shading(&self, operands: &[Object], gs: &GraphicsState, resources: &Dictionary, painter: &mut dyn Painter, error_count: &mut usize) {
        let Some(Object::Name(name)) = operands.first() else { return };
        let Some(shading_dict) = self.lookup_resource(resources, "Shading", &name.as_str_lossy()) else { return };
        if gs.fill_alpha <= 0.001 {
            return;
        }
        let shading = Shading::parse(&shading_dict, Some(resources), self.limits, self.sink);
        let color = shading.approximate_color();
        let Some(bbox) = gs.clip_box.or(self.page_bbox) else { return };
        let mut fill_region = Path::new();
        fill_region.rectangle(bbox.0, bbox.1, bbox.2 - bbox.0, bbox.3 - bbox.1);
        if let Err(message) = painter.fill_path(&fill_region, FillRule::NonZero, color, gs.fill_alpha) {
            self.sink.emit(DiagnosticEvent::PainterFailed { message });
            *error_count += 1;
        }
    }

    fn fill(&self, path: &Path, gs: &GraphicsState, rule: FillRule, painter: &mut dyn Painter, error_count: &mut usize) {
        if path.is_empty() || gs.fill_alpha <= 0.001 {
            return;
        }
        let device_path = self.clip(path.transformed(&gs.ctm), gs);
        if let Err(message) = painter.fill_path(&device_path, rule, gs.fill_color, gs.fill_alpha) {
            self.sink.emit(DiagnosticEvent::PainterFailed { message });
            *error_count += 1;
        }
    }

    fn stroke(&self, path: &Path, gs: &GraphicsState, painter: &mut dyn Painter, error_count: &mut usize) {
        if path.is_empty() || gs.stroke_alpha <= 0.001 {
            return;
        }
        let device_path = self.clip(path.transformed(&gs.ctm), gs);
        let device_width = gs.line_width * gs.ctm.x_scale().max(gs.ctm.y_scale());
        if let Err(message) = painter.stroke_path(&device_path, gs.stroke_color, device_width, gs.stroke_alpha) {
            self.sink.emit(DiagnosticEvent::PainterFailed { message });
            *error_count += 1;
        }
    }

    fn clip(&self, device_path: Path, gs: &GraphicsState) -> Path {
        match gs.clip_box {
            Some(bbox) => device_path.clipped_to_box(bbox),
            None => device_path,
        }
    }

    fn finish_path(&self, path: &mut Path, gs: &mut GraphicsState, pending_clip: &mut Option<FillRule>) {
        if pending_clip.take().is_some() {
            let device_path = path.transformed(&gs.ctm);
            gs.clip_box = intersect_boxes(gs.clip_box, device_path.bounding_box());
        }
        *path = Path::new();
    }

    /// Shows one string at the current text position, using the
    /// advance formula `tx = ((w0/1000 - Tj/1000) * Tfs + Tc + Tw) * Th`
    /// (with the TJ-only `Tj` adjustment term applied separately in
    /// [`Self::show_text_array`]). One [`GlyphRun`] is emitted per string,
    /// positioned at the text matrix in effect when the string started.
    fn show_text(&self, gs: &mut GraphicsState, resources: &Dictionary, bytes: &[u8], painter: &mut dyn Painter, error_count: &mut usize) {
        let Some(font_key) = gs.font_key.clone() else { return };
        let Some(font_dict) = self.lookup_resource(resources, "Font", &font_key) else { return };
        let resolve = |o: &Object| self.doc.resolve(o);
        let font = font::parse_font(&font_dict, &resolve, self.sink);
        let codes = font.codes(bytes);
        if codes.is_empty() {
            return;
        }

        let trm = Matrix::new(gs.font_size * gs.horizontal_scale, 0.0, 0.0, gs.font_size, 0.0, gs.text_rise).then(&gs.text_matrix).then(&gs.ctm);
        let glyph_ids: Vec<u32> = codes.iter().map(|&c| if font.is_cid { font.gid_for_cid(c) } else { c }).collect();
        // render size follows the y-scale (vertical text-space compression
        // doesn't shrink glyph advances); advance size follows the x-scale
        // separately so non-uniform text matrices compress glyphs
        // horizontally without also shrinking their rendered height.
        let render_size = gs.font_size * gs.text_matrix.y_scale() * gs.ctm.y_scale();
        let advance_size = gs.font_size * gs.text_matrix.x_scale() * gs.ctm.x_scale();
        let angle = gs.text_matrix.rotation_angle_with(&gs.ctm);
        let run = GlyphRun {
            font_key,
            glyph_ids,
            matrix: trm,
            fill_color: gs.fill_color,
            render_mode: gs.render_mode,
            render_size,
            advance_size,
            angle,
        };
        if let Err(message) = painter.draw_glyph_run(&run) {
            self.sink.emit(DiagnosticEvent::PainterFailed { message });
            *error_count += 1;
        }

        let mut advance = 0.0;
        for &code in &codes {
            let w0 = font.width_for_code(code) / 1000.0;
            let word_space = if font.bytes_per_code == 1 && code == 32 { gs.word_spacing } else { 0.0 };
            advance += (w0 * gs.font_size + gs.char_spacing + word_space) * gs.horizontal_scale;
        }
        gs.text_matrix = Matrix::translate(advance, 0.0).then(&gs.text_matrix);
    }

    fn show_text_array(&self, gs: &mut GraphicsState, resources: &Dictionary, items: &[Object], painter: &mut dyn Painter, error_count: &mut usize) {
        for item in items {
            match item {
                Object::String(bytes) => self.show_text(gs, resources, bytes, painter, error_count),
                Object::Number(n) => {
                    let tx = -n / 1000.0 * gs.font_size * gs.horizontal_scale;
                    gs.text_matrix = Matrix::translate(tx, 0.0).then(&gs.text_matrix);
                }
                _ => {}
            }
        }
    }

    fn do_xobject(&self, name: &str, gs: &GraphicsState, resources: &Dictionary, painter: &mut dyn Painter, depth: usize, error_count: &mut usize) {
        let Some(obj) = self.lookup_resource_obj(resources, "XObject", name) else { return };
        let Some(stream) = obj.as_stream() else { return };
        let subtype = stream.dict.get("Subtype").and_then(|o| o.as_name()).map(|n| n.as_str_lossy().into_owned());

        match subtype.as_deref() {
            Some("Image") => {
                if let Some(image) = self.doc.decode_image_xobject(stream, Some(resources)) {
                    if let Err(message) = painter.draw_image(&image, gs.ctm, gs.fill_alpha) {
                        self.sink.emit(DiagnosticEvent::PainterFailed { message });
                        *error_count += 1;
                    }
                }
            }
            Some("Form") => {
                if depth >= self.limits.max_interpreter_recursion {
                    self.sink.emit(DiagnosticEvent::ResourceCapExceeded { cap: "interpreter_recursion", page_index: None });
                    return;
                }
                let form_matrix = stream
                    .dict
                    .get("Matrix")
                    .and_then(|o| o.as_array())
                    .map(|a| {
                        let v: Vec<f64> = a.iter().filter_map(|n| n.as_number()).collect();
                        Matrix::new(
                            *v.first().unwrap_or(&1.0),
                            *v.get(1).unwrap_or(&0.0),
                            *v.get(2).unwrap_or(&0.0),
                            *v.get(3).unwrap_or(&1.0),
                            *v.get(4).unwrap_or(&0.0),
                            *v.get(5).unwrap_or(&0.0),
                        )
                    })
                    .unwrap_or(Matrix::identity());
                let form_ctm = form_matrix.then(&gs.ctm);

                let bbox_clip = stream.dict.get("BBox").and_then(|o| o.as_array()).map(|a| {
                    let v: Vec<f64> = a.iter().filter_map(|n| n.as_number()).collect();
                    let corners = [
                        form_ctm.apply(*v.first().unwrap_or(&0.0), *v.get(1).unwrap_or(&0.0)),
                        form_ctm.apply(*v.get(2).unwrap_or(&0.0), *v.get(1).unwrap_or(&0.0)),
                        form_ctm.apply(*v.get(2).unwrap_or(&0.0), *v.get(3).unwrap_or(&0.0)),
                        form_ctm.apply(*v.first().unwrap_or(&0.0), *v.get(3).unwrap_or(&0.0)),
                    ];
                    let xs = corners.iter().map(|c| c.0);
                    let ys = corners.iter().map(|c| c.1);
                    (
                        xs.clone().fold(f64::INFINITY, f64::min),
                        ys.clone().fold(f64::INFINITY, f64::min),
                        xs.fold(f64::NEG_INFINITY, f64::max),
                        ys.fold(f64::NEG_INFINITY, f64::max),
                    )
                });
                let clip = intersect_boxes(gs.clip_box, bbox_clip);

                let form_resources = stream.dict.get("Resources").map(|o| self.doc.resolve(o)).and_then(|o| o.as_dict().cloned()).unwrap_or_else(|| resources.clone());
                let content = crate::filters::decode_stream(stream, self.sink);
                self.run_inner(&content, &form_resources, form_ctm, clip, painter, depth + 1);
            }
            _ => {}
        }
    }

    fn lookup_resource(&self, resources: &Dictionary, category: &str, name: &str) -> Option<Dictionary> {
        self.lookup_resource_obj(resources, category, name).and_then(|o| o.as_dict().cloned())
    }

    fn lookup_resource_obj(&self, resources: &Dictionary, category: &str, name: &str) -> Option<Object> {
        let cat = self.doc.resolve(resources.get(category)?);
        let cat_dict = cat.as_dict()?;
        let entry = cat_dict.get(name)?;
        Some(self.doc.resolve(entry))
    }
}

fn num(operands: &[Object], index: usize) -> f64 {
    operands.get(index).and_then(|o| o.as_number()).unwrap_or(0.0)
}

fn numbers(operands: &[Object]) -> Vec<f32> {
    operands.iter().filter_map(|o| o.as_number()).map(|n| n as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_extracts_only_numeric_operands() {
        let ops = vec![Object::Number(1.0), Object::Name("X".into()), Object::Number(2.5)];
        assert_eq!(numbers(&ops), vec![1.0, 2.5]);
    }

    #[test]
    fn num_defaults_missing_operand_to_zero() {
        let ops = vec![Object::Number(3.0)];
        assert_eq!(num(&ops, 0), 3.0);
        assert_eq!(num(&ops, 5), 0.0);
    }
}
