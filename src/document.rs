//! Document facade.
//!
//! Ties the xref table, the decrypt service, and the object arena together
//! behind one `resolve`/`get_object` entry point, and walks the page tree
//! to expose page count, sizes, rotation, resources, fonts, and link
//! annotations through a single consumer-facing method list.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::content::graphics_state::Matrix;
use crate::content::Interpreter;
use crate::crypto::{DocumentCrypto, EncryptionStatus as CryptoStatus};
use crate::error::{Error, Result};
use crate::events::{DiagnosticEvent, DiagnosticSink, LogSink};
use crate::filters;
use crate::font::{self, FontInfo};
use crate::limits::Limits;
use crate::object::{Dictionary, Object, ObjectId};
use crate::painter::{Painter, RasterImage};
use crate::parser::Parser;
use crate::xref::{XrefEntry, XrefTable};

/// Encryption method a document declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionType {
    None,
    Password,
    Certificate,
}

/// Document-facing view of [`crate::crypto::EncryptionStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionStatus {
    None,
    NeedsCreds,
    Ready,
}

/// An opaque certificate-recipient identity a host matches against its own
/// store (an issuer DN plus serial number).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientInfo {
    pub issuer_and_serial_der: Vec<u8>,
}

/// One link annotation resolved off a page's `/Annots`.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLink {
    pub rect_pt: (f64, f64, f64, f64),
    pub target: LinkTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkTarget {
    Uri(String),
    PageIndex(usize),
}

struct PageNode {
    dict: Dictionary,
    media_box: (f64, f64, f64, f64),
    rotation: i64,
    resources: Dictionary,
}

/// A loaded PDF document. Conceptually immutable after `load`: the
/// only interior mutation is the write-once decoded-stream cache
/// on each [`crate::object::Stream`] and the object-resolution cache here.
pub struct Document {
    data: Vec<u8>,
    limits: Limits,
    sink: Box<dyn DiagnosticSink>,
    xref: XrefTable,
    crypto: RefCell<DocumentCrypto>,
    arena_cache: RefCell<HashMap<ObjectId, Object>>,
    pages: Vec<PageNode>,
    named_destinations: HashMap<String, usize>,
}

impl Document {
    /// Loads a document with default limits and a `log`-backed sink.
    pub fn load(bytes: &[u8]) -> Result<Document> {
        Self::load_with_limits_and_sink(bytes, Limits::default(), Box::new(LogSink))
    }

    pub fn load_with_sink(bytes: &[u8], sink: Box<dyn DiagnosticSink>) -> Result<Document> {
        Self::load_with_limits_and_sink(bytes, Limits::default(), sink)
    }

    pub fn load_with_limits(bytes: &[u8], limits: Limits) -> Result<Document> {
        Self::load_with_limits_and_sink(bytes, limits, Box::new(LogSink))
    }

    pub fn load_with_limits_and_sink(bytes: &[u8], limits: Limits, sink: Box<dyn DiagnosticSink>) -> Result<Document> {
        if !bytes.windows(5).any(|w| w == b"%PDF-") {
            return Err(Error::NotAPdf);
        }

        let startxref = find_startxref(bytes).ok_or(Error::NoXref)?;
        let xref = crate::xref::load(bytes, startxref, &limits, sink.as_ref());
        if xref.is_empty() {
            return Err(Error::NoXref);
        }

        let id0 = xref
            .trailer
            .get("ID")
            .and_then(|o| o.as_array())
            .and_then(|a| a.first())
            .and_then(|o| o.as_string_bytes())
            .map(|b| b.to_vec())
            .unwrap_or_default();
        let encrypt_dict = resolve_direct_dict(bytes, &xref, &limits, sink.as_ref(), xref.trailer.get("Encrypt"));
        let crypto = DocumentCrypto::from_encrypt_dict(encrypt_dict.as_ref(), id0, &limits);

        let mut doc = Document {
            data: bytes.to_vec(),
            limits,
            sink,
            xref,
            crypto: RefCell::new(crypto),
            arena_cache: RefCell::new(HashMap::new()),
            pages: Vec::new(),
            named_destinations: HashMap::new(),
        };

        // Page tree and named destinations only need to be built once
        // credentials (if any) are not required to walk structure — the
        // tree itself is rarely encrypted even though its content streams
        // are, so build it eagerly rather than deferring to first render.
        doc.build_page_tree()?;
        doc.build_named_destinations();
        Ok(doc)
    }

    fn emit(&self, event: DiagnosticEvent) {
        self.sink.emit(event);
    }

    // ---- object resolution ----

    /// Resolves an indirect reference, following chains up to
    /// `Limits::max_resolve_chain` and breaking cycles by returning Null
    /// (the `visited` set is a bitset over the arena).
    pub fn resolve(&self, obj: &Object) -> Object {
        let mut current = obj.clone();
        let mut visited = std::collections::HashSet::new();
        let mut hops = 0usize;
        loop {
            let Object::Reference(id) = current else {
                return current;
            };
            if !visited.insert(id) || hops >= self.limits.max_resolve_chain {
                self.emit(DiagnosticEvent::CycleDetected { obj_num: id.0, gen: id.1 });
                return Object::Null;
            }
            hops += 1;
            current = self.get_object(id);
        }
    }

    /// Fetches and caches one arena slot, expanding object streams and
    /// decrypting strings/streams on first read.
    fn get_object(&self, id: ObjectId) -> Object {
        if let Some(obj) = self.arena_cache.borrow().get(&id) {
            return obj.clone();
        }
        let obj = self.load_object(id);
        self.arena_cache.borrow_mut().insert(id, obj.clone());
        obj
    }

    fn load_object(&self, id: ObjectId) -> Object {
        match self.xref.get(id.0) {
            Some(XrefEntry::InUse { offset, .. }) => {
                let parser = Parser::with_limits(&self.data, self.limits);
                let raw = parser.parse_object_at(offset, self.sink.as_ref()).unwrap_or(Object::Null);
                self.decrypt_object(id, raw)
            }
            Some(XrefEntry::InStream { stream_obj, index }) => self.load_from_object_stream(stream_obj, index),
            Some(XrefEntry::Free) | None => Object::Null,
        }
    }

    /// Decrypts a freshly-parsed direct object in place: strings decrypt
    /// unconditionally, streams decrypt their raw payload before any
    /// filter runs.
    fn decrypt_object(&self, id: ObjectId, obj: Object) -> Object {
        let crypto = self.crypto.borrow();
        if !crypto.is_encrypted() {
            return obj;
        }
        if crypto.status() != CryptoStatus::Unlocked {
            self.emit(DiagnosticEvent::EncryptionPending);
            return obj;
        }
        decrypt_recursive(&crypto, id, obj)
    }

    /// Expands a compressed object out of an `/ObjStm`: decode the
    /// container stream, read `/N` pairs of `obj_num
    /// offset`, then parse the payload at `/First + offset`.
    fn load_from_object_stream(&self, stream_obj: u32, index: u32) -> Object {
        let container = self.get_object((stream_obj, 0));
        let Some(stream) = container.as_stream() else {
            return Object::Null;
        };
        let n = stream.dict.get("N").and_then(|o| o.as_int()).unwrap_or(0) as usize;
        let first = stream.dict.get("First").and_then(|o| o.as_int()).unwrap_or(0) as usize;
        let payload = filters::decode_stream(stream, self.sink.as_ref());

        let mut lex = crate::lexer::Lexer::with_limits(&payload, self.limits);
        let mut offsets = Vec::with_capacity(n);
        for _ in 0..n {
            let num_tok = lex.next();
            let off_tok = lex.next();
            let (Ok(_num), Ok(off)) = (
                std::str::from_utf8(&num_tok.bytes).unwrap_or("").parse::<u32>(),
                std::str::from_utf8(&off_tok.bytes).unwrap_or("").parse::<usize>(),
            ) else {
                break;
            };
            offsets.push(off);
        }
        let Some(&rel_offset) = offsets.get(index as usize) else {
            return Object::Null;
        };
        let parser = Parser::with_limits(&payload, self.limits);
        parser.parse_object_at(first + rel_offset, self.sink.as_ref()).unwrap_or(Object::Null)
    }

    /// A `resolve` closure bound to `self`, handed to [`crate::font`] and
    /// other modules that stay decoupled from `Document` itself.
    fn resolver(&self) -> impl Fn(&Object) -> Object + '_ {
        move |o| self.resolve(o)
    }

    fn dict_of(&self, obj: &Object) -> Option<Dictionary> {
        self.resolve(obj).as_dict().cloned()
    }

    // ---- page tree ----

    fn build_page_tree(&mut self) -> Result<()> {
        let root = self.dict_of(self.xref.trailer.get("Root").unwrap_or(&Object::Null)).ok_or(Error::NoPages)?;
        let pages_root = root.get("Pages").cloned().ok_or(Error::NoPages)?;
        let mut pages = Vec::new();
        let mut visited = std::collections::HashSet::new();
        self.walk_page_tree(&pages_root, None, None, None, None, &mut visited, &mut pages);
        if pages.is_empty() {
            return Err(Error::NoPages);
        }
        self.pages = pages;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn walk_page_tree(
        &self,
        node_obj: &Object,
        inherited_resources: Option<Dictionary>,
        inherited_media_box: Option<(f64, f64, f64, f64)>,
        inherited_crop_box: Option<(f64, f64, f64, f64)>,
        inherited_rotation: Option<i64>,
        visited: &mut std::collections::HashSet<ObjectId>,
        out: &mut Vec<PageNode>,
    ) {
        if let Some(id) = node_obj.as_reference() {
            if !visited.insert(id) {
                self.emit(DiagnosticEvent::CycleDetected { obj_num: id.0, gen: id.1 });
                return;
            }
        }
        let Some(dict) = self.dict_of(node_obj) else { return };

        let resources = dict.get("Resources").and_then(|o| self.dict_of(o)).or(inherited_resources);
        let media_box = read_rect(&dict, "MediaBox", &self.resolver()).or(inherited_media_box);
        let crop_box = read_rect(&dict, "CropBox", &self.resolver()).or(inherited_crop_box).or(media_box);
        let rotation = dict.get("Rotate").and_then(|o| o.as_int()).or(inherited_rotation);

        let node_type = dict.get("Type").and_then(|o| o.as_name()).map(|n| n.as_str_lossy().into_owned());
        if node_type.as_deref() == Some("Pages") {
            if out.len() >= MAX_PAGES {
                return;
            }
            if let Some(kids) = dict.get("Kids").and_then(|o| o.as_array()) {
                for kid in kids {
                    self.walk_page_tree(kid, resources.clone(), media_box, crop_box, rotation, visited, out);
                }
            }
        } else {
            if out.len() >= MAX_PAGES {
                return;
            }
            out.push(PageNode {
                resources: resources.unwrap_or_default(),
                media_box: crop_box.unwrap_or(DEFAULT_MEDIA_BOX),
                rotation: rotation.unwrap_or(0).rem_euclid(360),
                dict,
            });
        }
    }

    fn build_named_destinations(&mut self) {
        let mut table = HashMap::new();
        let Some(root) = self.dict_of(self.xref.trailer.get("Root").unwrap_or(&Object::Null)) else {
            self.named_destinations = table;
            return;
        };
        let Some(names) = root.get("Names").and_then(|o| self.dict_of(o)) else {
            self.named_destinations = table;
            return;
        };
        let Some(dests) = names.get("Dests").and_then(|o| self.dict_of(o)) else {
            self.named_destinations = table;
            return;
        };
        if let Some(names_array) = dests.get("Names").and_then(|o| o.as_array()) {
            let mut i = 0;
            while i + 1 < names_array.len() {
                if let Some(name) = names_array[i].as_string_bytes() {
                    if let Some(page_index) = self.dest_array_to_page_index(&self.resolve(&names_array[i + 1])) {
                        table.insert(String::from_utf8_lossy(name).into_owned(), page_index);
                    }
                }
                i += 2;
            }
        }
        self.named_destinations = table;
    }

    fn dest_array_to_page_index(&self, dest: &Object) -> Option<usize> {
        let arr = if let Some(d) = dest.as_dict() {
            d.get("D").and_then(|o| o.as_array())?
        } else {
            dest.as_array()?
        };
        let page_ref = arr.first()?;
        let target_id = page_ref.as_reference()?;
        self.pages.iter().position(|p| {
            p.dict.get("__self_id__").and_then(|o| o.as_reference()) == Some(target_id)
        }).or_else(|| self.page_index_for_object(target_id))
    }

    fn page_index_for_object(&self, id: ObjectId) -> Option<usize> {
        // Fall back to matching by re-resolving each page's own identity:
        // pages aren't tagged with their own id when walked, so compare by
        // resolved dictionary equality against the target object.
        let target = self.resolve(&Object::Reference(id));
        self.pages.iter().position(|p| Object::Dictionary(p.dict.clone()) == target)
    }

    fn page(&self, index: usize) -> Result<&PageNode> {
        self.pages.get(index).ok_or(Error::PageIndexOutOfRange(index, self.pages.len()))
    }

    // ---- consumer-facing API ----

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Page size ignoring rotation.
    pub fn raw_page_size(&self, index: usize) -> Result<(f64, f64)> {
        let page = self.page(index)?;
        let (x0, y0, x1, y1) = page.media_box;
        Ok(((x1 - x0).abs(), (y1 - y0).abs()))
    }

    /// Page size with a 90/270 rotation swapping width and height.
    pub fn display_page_size(&self, index: usize) -> Result<(f64, f64)> {
        let (w, h) = self.raw_page_size(index)?;
        let page = self.page(index)?;
        if page.rotation == 90 || page.rotation == 270 {
            Ok((h, w))
        } else {
            Ok((w, h))
        }
    }

    pub fn page_size(&self, index: usize) -> Result<(f64, f64)> {
        self.display_page_size(index)
    }

    pub fn page_fonts(&self, index: usize) -> Result<HashMap<String, FontInfo>> {
        let page = self.page(index)?;
        let mut out = HashMap::new();
        let Some(font_dict) = page.resources.get("Font").and_then(|o| self.dict_of(o)) else {
            return Ok(out);
        };
        for (name, value) in font_dict.iter() {
            if let Some(dict) = self.dict_of(value) {
                let info = font::parse_font(&dict, &self.resolver(), self.sink.as_ref());
                out.insert(name.as_str_lossy().into_owned(), info);
            }
        }
        Ok(out)
    }

    pub fn page_links(&self, index: usize) -> Result<Vec<PageLink>> {
        let page = self.page(index)?;
        let mut out = Vec::new();
        let Some(annots) = page.dict.get("Annots").map(|o| self.resolve(o)) else {
            return Ok(out);
        };
        let Some(annots) = annots.as_array() else { return Ok(out) };
        for annot_obj in annots {
            let Some(annot) = self.dict_of(annot_obj) else { continue };
            if annot.get("Subtype").and_then(|o| o.as_name()).map(|n| n.as_str_lossy() != "Link").unwrap_or(true) {
                continue;
            }
            let Some(rect) = annot.get("Rect").and_then(|o| o.as_array()).map(|a| numbers4(a)) else { continue };
            let target = if let Some(action) = annot.get("A").and_then(|o| self.dict_of(o)) {
                if let Some(uri) = action.get("URI").and_then(|o| o.as_string_bytes()) {
                    Some(LinkTarget::Uri(String::from_utf8_lossy(uri).into_owned()))
                } else if let Some(dest) = action.get("D") {
                    self.dest_array_to_page_index(&self.resolve(dest)).map(LinkTarget::PageIndex)
                } else {
                    None
                }
            } else if let Some(dest) = annot.get("Dest") {
                self.dest_array_to_page_index(&self.resolve(dest)).map(LinkTarget::PageIndex)
            } else {
                None
            };
            if let Some(target) = target {
                out.push(PageLink { rect_pt: rect, target });
            }
        }
        Ok(out)
    }

    /// Content-stream bytes, concatenated with `\n` between array entries.
    fn page_content_bytes(&self, page: &PageNode) -> Vec<u8> {
        let Some(contents) = page.dict.get("Contents") else { return Vec::new() };
        let contents = self.resolve(contents);
        let streams: Vec<Object> = match &contents {
            Object::Array(a) => a.iter().map(|o| self.resolve(o)).collect(),
            other => vec![other.clone()],
        };
        let mut out = Vec::new();
        for (i, s) in streams.iter().enumerate() {
            if let Some(stream) = s.as_stream() {
                if i > 0 {
                    out.push(b'\n');
                }
                out.extend_from_slice(&filters::decode_stream(stream, self.sink.as_ref()));
            }
        }
        out
    }

    /// Renders one page's content stream against `painter`. Painter
    /// failures stop the page, not the document.
    pub fn render_page(&self, index: usize, painter: &mut dyn Painter) -> Result<()> {
        let page = self.page(index)?;
        if self.crypto.borrow().status() == CryptoStatus::PendingPassword
            || self.crypto.borrow().status() == CryptoStatus::PendingSeed
        {
            return Err(Error::EncryptionNotReady);
        }
        painter.set_page_rotation(page.rotation);
        let bytes = self.page_content_bytes(page);
        let (w, h) = self.raw_page_size(index)?;
        let (x0, y0, _, _) = page.media_box;
        let base_ctm = Matrix::translate(-x0, -y0).then(&rotation_matrix(page.rotation, w, h));
        let (disp_w, disp_h) = self.display_page_size(index)?;
        let page_bbox = Some((0.0, 0.0, disp_w, disp_h));

        let interp = Interpreter::new(self, &self.limits, self.sink.as_ref(), page_bbox);
        let error_count = interp.run(&bytes, &page.resources, base_ctm, painter, 0);
        self.emit(DiagnosticEvent::PageDone { page_index: index, error_count });
        Ok(())
    }

    // ---- encryption ----

    pub fn encryption_status(&self) -> EncryptionStatus {
        match self.crypto.borrow().status() {
            CryptoStatus::None => EncryptionStatus::None,
            CryptoStatus::PendingPassword | CryptoStatus::PendingSeed => EncryptionStatus::NeedsCreds,
            CryptoStatus::Unlocked => EncryptionStatus::Ready,
        }
    }

    pub fn encryption_type(&self) -> EncryptionType {
        match self.crypto.borrow().status() {
            CryptoStatus::None => EncryptionType::None,
            CryptoStatus::PendingSeed => EncryptionType::Certificate,
            CryptoStatus::PendingPassword | CryptoStatus::Unlocked if !self.crypto.borrow().cert_recipients().is_empty() => {
                EncryptionType::Certificate
            }
            _ => EncryptionType::Password,
        }
    }

    pub fn try_password(&self, password: &str) -> bool {
        let unlocked = self.crypto.borrow_mut().try_password(password.as_bytes());
        if unlocked {
            self.arena_cache.borrow_mut().clear();
        }
        unlocked
    }

    pub fn supply_seed(&self, seed: &[u8]) -> bool {
        let unlocked = self.crypto.borrow_mut().supply_seed(seed);
        if unlocked {
            self.arena_cache.borrow_mut().clear();
        }
        unlocked
    }

    pub fn cert_recipients(&self) -> Vec<RecipientInfo> {
        self.crypto.borrow().cert_recipients().into_iter().map(|der| RecipientInfo { issuer_and_serial_der: der }).collect()
    }

    /// Decodes an Image XObject stream into RGB(+alpha) samples for the
    /// painter's `draw_image`, resolving its `/ColorSpace` and optional
    /// `/SMask`/`/Mask`. Grounded alongside the filter chain: most of the
    /// work here is just picking the right component interpretation for
    /// whatever `decode_stream` already produced.
    pub fn decode_image_xobject(&self, stream: &crate::object::Stream, resources: Option<&Dictionary>) -> Option<RasterImage> {
        let dict = &stream.dict;
        let width = dict.get("Width").or_else(|| dict.get("W")).and_then(|o| o.as_int())? as u32;
        let height = dict.get("Height").or_else(|| dict.get("H")).and_then(|o| o.as_int())? as u32;
        if width == 0 || height == 0 || (width as u64 * height as u64) > MAX_IMAGE_PIXELS {
            self.emit(DiagnosticEvent::ResourceCapExceeded { cap: "image_pixels", page_index: None });
            return None;
        }
        let bpc = dict.get("BitsPerComponent").or_else(|| dict.get("BPC")).and_then(|o| o.as_int()).unwrap_or(8) as u32;
        let is_dct = dict
            .get("Filter")
            .or_else(|| dict.get("F"))
            .map(|f| filter_names_contain(f, "DCTDecode"))
            .unwrap_or(false);

        let cs = dict
            .get("ColorSpace")
            .or_else(|| dict.get("CS"))
            .map(|o| self.resolve(o))
            .map(|o| crate::content::color::ColorSpace::resolve(&o, resources, &self.limits))
            .unwrap_or(crate::content::color::ColorSpace::DeviceGray);

        let payload = filters::decode_stream(stream, self.sink.as_ref());
        let rgb = if is_dct {
            // jpeg-decoder already yields interleaved 8-bit samples; DCT
            // images are overwhelmingly RGB or Gray, never indexed.
            if payload.len() as u64 == width as u64 * height as u64 * 3 {
                payload
            } else {
                expand_samples(&payload, width, height, 8, &cs)
            }
        } else {
            expand_samples(&payload, width, height, bpc, &cs)
        };

        let alpha = dict
            .get("SMask")
            .map(|o| self.resolve(o))
            .and_then(|o| o.as_stream().and_then(|s| self.decode_soft_mask(s, width, height)))
            .unwrap_or_default();

        Some(RasterImage { width, height, rgb, alpha })
    }

    fn decode_soft_mask(&self, stream: &crate::object::Stream, width: u32, height: u32) -> Option<Vec<u8>> {
        let mw = stream.dict.get("Width").and_then(|o| o.as_int())? as u32;
        let mh = stream.dict.get("Height").and_then(|o| o.as_int())? as u32;
        let bpc = stream.dict.get("BitsPerComponent").and_then(|o| o.as_int()).unwrap_or(8) as u32;
        let payload = filters::decode_stream(stream, self.sink.as_ref());
        let gray = expand_samples(&payload, mw, mh, bpc, &crate::content::color::ColorSpace::DeviceGray);
        if mw == width && mh == height {
            Some(gray.chunks(3).map(|c| c[0]).collect())
        } else {
            // Nearest-neighbor resample to the base image's dimensions.
            let mut out = Vec::with_capacity((width * height) as usize);
            for y in 0..height {
                let sy = if height > 0 { y * mh / height } else { 0 };
                for x in 0..width {
                    let sx = if width > 0 { x * mw / width } else { 0 };
                    let idx = (sy * mw + sx) as usize * 3;
                    out.push(gray.get(idx).copied().unwrap_or(255));
                }
            }
            Some(out)
        }
    }

    pub(crate) fn limits(&self) -> &Limits {
        &self.limits
    }

    pub(crate) fn sink(&self) -> &dyn DiagnosticSink {
        self.sink.as_ref()
    }
}

const MAX_PAGES: usize = 1_000_000;
const MAX_IMAGE_PIXELS: u64 = 64_000_000;
const DEFAULT_MEDIA_BOX: (f64, f64, f64, f64) = (0.0, 0.0, 612.0, 792.0);

fn rotation_matrix(degrees: i64, w: f64, h: f64) -> Matrix {
    match degrees.rem_euclid(360) {
        90 => Matrix::new(0.0, 1.0, -1.0, 0.0, h, 0.0),
        180 => Matrix::new(-1.0, 0.0, 0.0, -1.0, w, h),
        270 => Matrix::new(0.0, -1.0, 1.0, 0.0, 0.0, w),
        _ => Matrix::identity(),
    }
}

fn numbers4(arr: &[Object]) -> (f64, f64, f64, f64) {
    (
        arr.first().and_then(|o| o.as_number()).unwrap_or(0.0),
        arr.get(1).and_then(|o| o.as_number()).unwrap_or(0.0),
        arr.get(2).and_then(|o| o.as_number()).unwrap_or(0.0),
        arr.get(3).and_then(|o| o.as_number()).unwrap_or(0.0),
    )
}

fn read_rect(dict: &Dictionary, key: &str, resolve: &impl Fn(&Object) -> Object) -> Option<(f64, f64, f64, f64)> {
    let arr = resolve(dict.get(key)?);
    let arr = arr.as_array()?;
    if arr.len() < 4 {
        return None;
    }
    let resolved: Vec<Object> = arr.iter().map(resolve).collect();
    Some(numbers4(&resolved))
}

fn find_startxref(data: &[u8]) -> Option<usize> {
    let tail_start = data.len().saturating_sub(2048);
    let tail = &data[tail_start..];
    let pos = tail.windows(9).rposition(|w| w == b"startxref")?;
    let mut lex = crate::lexer::Lexer::new(&tail[pos + 9..]);
    let t = lex.next();
    std::str::from_utf8(&t.bytes).ok()?.trim().parse::<usize>().ok()
}

fn filter_names_contain(filter_obj: &Object, name: &str) -> bool {
    match filter_obj {
        Object::Name(n) => n.as_str_lossy() == name,
        Object::Array(a) => a.iter().any(|o| o.as_name().map(|n| n.as_str_lossy() == name).unwrap_or(false)),
        _ => false,
    }
}

/// Unpacks raw sample bytes into 8-bit-per-channel RGB, honoring
/// `bits_per_component` and the resolved color space (indexed lookups
/// included). Images this crate cannot interpret component-for-component
/// degrade to mid-gray rather than panicking.
fn expand_samples(data: &[u8], width: u32, height: u32, bpc: u32, cs: &crate::content::color::ColorSpace) -> Vec<u8> {
    let components = cs.components().max(1);
    let row_bits = width as usize * components * bpc as usize;
    let row_bytes = row_bits.div_ceil(8);
    let max_val = ((1u32 << bpc.min(16)) - 1).max(1) as f32;

    let mut out = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height as usize {
        let row_start = y * row_bytes;
        if row_start >= data.len() {
            out.extend(std::iter::repeat(128u8).take(width as usize * 3));
            continue;
        }
        let row = &data[row_start..(row_start + row_bytes).min(data.len())];
        for x in 0..width as usize {
            let mut values = [0f32; 4];
            for c in 0..components.min(4) {
                let bit_offset = (x * components + c) * bpc as usize;
                let raw = read_bits_from_row(row, bit_offset, bpc);
                values[c] = if matches!(cs, crate::content::color::ColorSpace::Indexed { .. }) {
                    raw as f32
                } else {
                    raw as f32 / max_val
                };
            }
            let rgb = cs.to_rgb(&values[..components.min(4)]);
            out.push((rgb.r.clamp(0.0, 1.0) * 255.0) as u8);
            out.push((rgb.g.clamp(0.0, 1.0) * 255.0) as u8);
            out.push((rgb.b.clamp(0.0, 1.0) * 255.0) as u8);
        }
    }
    out
}

fn read_bits_from_row(row: &[u8], bit_offset: usize, bits: u32) -> u32 {
    let mut value: u32 = 0;
    for i in 0..bits as usize {
        let pos = bit_offset + i;
        let byte_index = pos / 8;
        if byte_index >= row.len() {
            break;
        }
        let bit_in_byte = 7 - (pos % 8);
        let bit = (row[byte_index] >> bit_in_byte) & 1;
        value = (value << 1) | bit as u32;
    }
    value
}

fn decrypt_recursive(crypto: &DocumentCrypto, id: ObjectId, obj: Object) -> Object {
    match obj {
        Object::String(bytes) => Object::String(crypto.decrypt(id, &bytes).unwrap_or(bytes)),
        Object::Array(items) => Object::Array(items.into_iter().map(|o| decrypt_recursive(crypto, id, o)).collect()),
        Object::Dictionary(dict) => Object::Dictionary(decrypt_dict(crypto, id, dict)),
        Object::Stream(stream) => {
            let dict = decrypt_dict(crypto, id, stream.dict);
            let raw = crypto.decrypt(id, &stream.raw).unwrap_or(stream.raw);
            Object::Stream(crate::object::Stream::new(dict, raw))
        }
        other => other,
    }
}

fn decrypt_dict(crypto: &DocumentCrypto, id: ObjectId, dict: Dictionary) -> Dictionary {
    let mut out = Dictionary::new();
    for (k, v) in dict.iter() {
        out.set(k.clone(), decrypt_recursive(crypto, id, v.clone()));
    }
    out
}

/// Resolves the trailer's `/Encrypt` entry without going through the full
/// object cache (the crypto service doesn't exist yet at this point in
/// `load`), following at most one indirect hop since `/Encrypt` is never
/// itself encrypted.
fn resolve_direct_dict(data: &[u8], xref: &XrefTable, limits: &Limits, sink: &dyn DiagnosticSink, obj: Option<&Object>) -> Option<Dictionary> {
    match obj? {
        Object::Dictionary(d) => Some(d.clone()),
        Object::Reference(id) => {
            let XrefEntry::InUse { offset, .. } = xref.get(id.0)? else { return None };
            let parser = Parser::with_limits(data, *limits);
            parser.parse_object_at(offset, sink)?.as_dict().cloned()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_pdf(content: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.7\n");
        let mut offsets = Vec::new();

        offsets.push(out.len());
        out.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");

        offsets.push(out.len());
        out.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n");

        offsets.push(out.len());
        out.extend_from_slice(
            b"3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 200] /Resources << >> /Contents 4 0 R >>\nendobj\n",
        );

        offsets.push(out.len());
        out.extend_from_slice(format!("4 0 obj\n<< /Length {} >>\nstream\n", content.len()).as_bytes());
        out.extend_from_slice(content);
        out.extend_from_slice(b"\nendstream\nendobj\n");

        let xref_offset = out.len();
        out.extend_from_slice(b"xref\n0 5\n0000000000 65535 f \n");
        for off in &offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
        }
        out.extend_from_slice(b"trailer\n<< /Size 5 /Root 1 0 R >>\n");
        out.extend_from_slice(format!("startxref\n{xref_offset}\n%%EOF").as_bytes());
        out
    }

    #[test]
    fn loads_minimal_single_page_document() {
        let bytes = minimal_pdf(b"0.5 g 10 10 100 50 re f");
        let doc = Document::load(&bytes).unwrap();
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.raw_page_size(0).unwrap(), (200.0, 200.0));
    }

    #[test]
    fn out_of_range_page_index_errors() {
        let bytes = minimal_pdf(b"");
        let doc = Document::load(&bytes).unwrap();
        assert!(matches!(doc.page_size(5), Err(Error::PageIndexOutOfRange(5, 1))));
    }

    #[test]
    fn not_a_pdf_is_rejected_up_front() {
        let err = Document::load(b"not a pdf at all").unwrap_err();
        assert!(matches!(err, Error::NotAPdf));
    }

    #[test]
    fn render_page_runs_without_painter_errors() {
        let bytes = minimal_pdf(b"0.5 g 10 10 100 50 re f");
        let doc = Document::load(&bytes).unwrap();
        let mut painter = crate::painter::RecordingPainter::new();
        doc.render_page(0, &mut painter).unwrap();
        assert!(!painter.events.is_empty());
    }
}
