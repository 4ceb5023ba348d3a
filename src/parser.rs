//! Object parser.
//!
//! Builds [`crate::object::Object`] trees out of the token stream produced
//! by [`crate::lexer`]. Uses a dual iteration-cap / wall-clock
//! top-level loop, with the `int int R` lookahead used inside both
//! arrays and dictionaries, and the "skip a CR/LF run, then take exactly
//! `/Length` bytes, else scan for `endstream`" stream rule.

use std::time::{Duration, Instant};

use crate::events::{DiagnosticEvent, DiagnosticSink};
use crate::lexer::{Lexer, TokenType};
use crate::limits::Limits;
use crate::object::{Dictionary, Name, Object, ObjectId, Stream};

/// Parses objects out of a whole PDF buffer.
pub struct Parser<'a> {
    data: &'a [u8],
    limits: Limits,
}

/// One `N G obj ... endobj` record found while scanning the file
/// top-to-bottom (used by the whole-file-scan xref fallback).
pub struct IndirectObject {
    pub id: ObjectId,
    pub object: Object,
}

const TOP_LEVEL_ITERATION_CAP: usize = 500_000;
const ENDOBJ_SCAN_CAP: usize = 100_000;
const WALL_CLOCK_BUDGET: Duration = Duration::from_secs(30);

impl<'a> Parser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_limits(data, Limits::default())
    }

    pub fn with_limits(data: &'a [u8], limits: Limits) -> Self {
        Parser { data, limits }
    }

    /// Parses a single object starting at `offset`, as used for xref-entry
    /// driven loads (`PdfDocument::loadObjectAtOffset`). Returns the object
    /// alone; the caller already knows the expected id from the xref entry.
    pub fn parse_object_at(&self, offset: usize, sink: &dyn DiagnosticSink) -> Option<Object> {
        if offset >= self.data.len() {
            return None;
        }
        let mut lex = Lexer::with_limits(&self.data[offset..], self.limits);
        // Expect "N G obj" but tolerate its absence (some writers omit it
        // when re-parsing from a known offset).
        let save = lex.position();
        let t1 = lex.next();
        let t2 = lex.next();
        let t3 = lex.next();
        if t1.kind == TokenType::Number && t2.kind == TokenType::Number && t3.is_keyword("obj") {
            // already positioned after "obj"
        } else {
            lex.set_position(save);
        }
        self.parse_value(&mut lex, sink, 0)
    }

    /// Scans the whole buffer top-to-bottom for `N G obj ... endobj`
    /// records. This is also the whole-file-scan xref-rebuild fallback:
    /// it is literally this same loop, not a separate code path.
    pub fn scan_all_objects(&self, sink: &dyn DiagnosticSink) -> Vec<IndirectObject> {
        let mut out = Vec::new();
        let mut lex = Lexer::with_limits(self.data, self.limits);
        let start_time = Instant::now();
        let mut iterations = 0usize;

        loop {
            if iterations >= TOP_LEVEL_ITERATION_CAP {
                sink.emit(DiagnosticEvent::ResourceCapExceeded { cap: "parse_iteration", page_index: None });
                break;
            }
            if start_time.elapsed() > WALL_CLOCK_BUDGET {
                sink.emit(DiagnosticEvent::ResourceCapExceeded { cap: "parse_wall_clock", page_index: None });
                break;
            }
            iterations += 1;

            let checkpoint = lex.position();
            let t1 = lex.peek();
            if t1.kind == TokenType::EndOfFile {
                break;
            }
            if t1.kind != TokenType::Number {
                lex.next();
                continue;
            }
            let num_start = lex.position();
            lex.next();
            let t2 = lex.peek();
            if t2.kind != TokenType::Number {
                lex.set_position(num_start + 1);
                continue;
            }
            lex.next();
            let t3 = lex.peek();
            if !t3.is_keyword("obj") {
                lex.set_position(num_start + 1);
                continue;
            }
            lex.next();

            let obj_num: u32 = match parse_token_number(&t1.bytes) {
                Some(n) if n >= 0.0 => n as u32,
                _ => {
                    lex.set_position(checkpoint + 1);
                    continue;
                }
            };
            let gen: u16 = parse_token_number(&t2.bytes).unwrap_or(0.0) as u16;

            let value = self.parse_value(&mut lex, sink, 0);

            // Scan forward for "endobj" with its own inner safety cap,
            // matching PdfParser.cpp's nested guard.
            let mut inner = 0usize;
            loop {
                if inner >= ENDOBJ_SCAN_CAP {
                    sink.emit(DiagnosticEvent::ResourceCapExceeded { cap: "endobj_scan", page_index: None });
                    break;
                }
                inner += 1;
                let t = lex.peek();
                if t.kind == TokenType::EndOfFile || t.is_keyword("endobj") {
                    if t.is_keyword("endobj") {
                        lex.next();
                    }
                    break;
                }
                // Another "N G obj" starting before we found endobj: the
                // writer omitted endobj. Stop scanning, don't consume it.
                if t.kind == TokenType::Number {
                    let save = lex.position();
                    lex.next();
                    let maybe_gen = lex.peek();
                    if maybe_gen.kind == TokenType::Number {
                        lex.next();
                        if lex.peek().is_keyword("obj") {
                            lex.set_position(save);
                            break;
                        }
                    }
                    lex.set_position(save);
                }
                lex.next();
            }

            if let Some(value) = value {
                out.push(IndirectObject { id: (obj_num, gen), object: value });
            }
        }

        out
    }

    /// Parses one value (atomic, array, dictionary-or-stream) at the
    /// lexer's current position.
    fn parse_value(&self, lex: &mut Lexer<'_>, sink: &dyn DiagnosticSink, depth: usize) -> Option<Object> {
        if depth > self.limits.max_interpreter_recursion * 4 {
            sink.emit(DiagnosticEvent::ResourceCapExceeded { cap: "parse_recursion", page_index: None });
            return Some(Object::Null);
        }
        let t = lex.peek();
        match t.kind {
            TokenType::EndOfFile => None,
            TokenType::Delimiter if t.bytes == b"<<" => Some(self.parse_dictionary_or_stream(lex, sink, depth)),
            TokenType::Delimiter if t.bytes == b"[" => Some(self.parse_array(lex, sink, depth)),
            _ => Some(self.parse_atomic(lex, sink)),
        }
    }

    fn parse_atomic(&self, lex: &mut Lexer<'_>, sink: &dyn DiagnosticSink) -> Object {
        let t = lex.next();
        match t.kind {
            TokenType::Number => {
                // Lookahead for "N G R" indirect reference.
                let save = lex.position();
                let t2 = lex.peek();
                if t2.kind == TokenType::Number {
                    lex.next();
                    let t3 = lex.peek();
                    if t3.is_keyword("R") {
                        lex.next();
                        let n = parse_token_number(&t.bytes).unwrap_or(0.0) as u32;
                        let g = parse_token_number(&t2.bytes).unwrap_or(0.0) as u16;
                        return Object::Reference((n, g));
                    }
                }
                lex.set_position(save);
                Object::Number(parse_token_number(&t.bytes).unwrap_or(0.0))
            }
            TokenType::LiteralString | TokenType::HexString => Object::String(t.bytes),
            TokenType::Name => Object::Name(Name::new(t.bytes)),
            TokenType::Keyword => match t.bytes.as_slice() {
                b"true" => Object::Boolean(true),
                b"false" => Object::Boolean(false),
                b"null" => Object::Null,
                other => {
                    sink.emit(DiagnosticEvent::MalformedSyntax {
                        context: "atomic object".into(),
                        detail: format!("unexpected keyword {:?}", String::from_utf8_lossy(other)),
                    });
                    Object::Null
                }
            },
            TokenType::Delimiter => {
                sink.emit(DiagnosticEvent::MalformedSyntax {
                    context: "atomic object".into(),
                    detail: format!("unexpected delimiter {:?}", t.text()),
                });
                Object::Null
            }
            TokenType::EndOfFile => Object::Null,
        }
    }

    fn parse_array(&self, lex: &mut Lexer<'_>, sink: &dyn DiagnosticSink, depth: usize) -> Object {
        lex.next(); // consume '['
        let mut items = Vec::new();
        loop {
            if items.len() >= self.limits.max_array_items {
                sink.emit(DiagnosticEvent::ResourceCapExceeded { cap: "array_items", page_index: None });
                break;
            }
            let t = lex.peek();
            if t.kind == TokenType::EndOfFile {
                sink.emit(DiagnosticEvent::MalformedSyntax {
                    context: "array".into(),
                    detail: "unterminated array".into(),
                });
                break;
            }
            if t.is_delimiter("]") {
                lex.next();
                break;
            }
            match self.parse_value(lex, sink, depth + 1) {
                Some(v) => items.push(v),
                None => break,
            }
        }
        Object::Array(items)
    }

    fn parse_dictionary_or_stream(&self, lex: &mut Lexer<'_>, sink: &dyn DiagnosticSink, depth: usize) -> Object {
        let dict = self.parse_dictionary(lex, sink, depth);
        let save = lex.position();
        let t = lex.peek();
        if t.is_keyword("stream") {
            lex.next();
            return self.parse_stream(lex, dict, sink);
        }
        lex.set_position(save);
        Object::Dictionary(dict)
    }

    fn parse_dictionary(&self, lex: &mut Lexer<'_>, sink: &dyn DiagnosticSink, depth: usize) -> Dictionary {
        lex.next(); // consume '<<'
        let mut dict = Dictionary::new();
        loop {
            if dict.len() >= self.limits.max_dict_entries {
                sink.emit(DiagnosticEvent::ResourceCapExceeded { cap: "dict_entries", page_index: None });
                break;
            }
            let t = lex.peek();
            if t.kind == TokenType::EndOfFile {
                sink.emit(DiagnosticEvent::MalformedSyntax {
                    context: "dictionary".into(),
                    detail: "unterminated dictionary".into(),
                });
                break;
            }
            if t.is_delimiter(">>") {
                lex.next();
                break;
            }
            if t.kind != TokenType::Name {
                // Malformed key: skip the stray token and keep going so one
                // bad byte doesn't eat the whole document.
                sink.emit(DiagnosticEvent::MalformedSyntax {
                    context: "dictionary".into(),
                    detail: format!("expected name key, found {:?}", t.text()),
                });
                lex.next();
                continue;
            }
            lex.next();
            let key = Name::new(t.bytes);
            match self.parse_value(lex, sink, depth + 1) {
                Some(v) => dict.set(key, v),
                None => break,
            }
        }
        dict
    }

    /// Stream bodies: after the `stream` keyword, skip only a trailing
    /// CR/LF run (not generic whitespace — a one-byte content stream
    /// starting with a space must keep that space), then take exactly
    /// `/Length` bytes if it resolves to a usable positive number,
    /// otherwise fall back to scanning for a literal `endstream`.
    fn parse_stream(&self, lex: &mut Lexer<'_>, dict: Dictionary, sink: &dyn DiagnosticSink) -> Object {
        let data = lex.data();
        let mut pos = lex.position();
        // Per PdfParser.cpp: skip \r, then \n, or just \n — a bare run of
        // CR/LF bytes, not arbitrary whitespace.
        if pos < data.len() && data[pos] == b'\r' {
            pos += 1;
        }
        if pos < data.len() && data[pos] == b'\n' {
            pos += 1;
        }

        let declared_len = dict.get("Length").and_then(|o| o.as_int()).filter(|n| *n >= 0).map(|n| n as usize);

        let (raw, end_pos) = if let Some(len) = declared_len.filter(|l| pos + l <= data.len()) {
            (data[pos..pos + len].to_vec(), pos + len)
        } else {
            match find_subslice(&data[pos..], b"endstream") {
                Some(rel) => {
                    let mut body_end = pos + rel;
                    // Trim a single trailing EOL before "endstream" that
                    // belongs to the stream terminator, not the payload.
                    if body_end > pos && data[body_end - 1] == b'\n' {
                        body_end -= 1;
                    }
                    if body_end > pos && data[body_end - 1] == b'\r' {
                        body_end -= 1;
                    }
                    (data[pos..body_end].to_vec(), pos + rel)
                }
                None => {
                    sink.emit(DiagnosticEvent::MalformedSyntax {
                        context: "stream".into(),
                        detail: "no /Length and no endstream found".into(),
                    });
                    (data[pos..].to_vec(), data.len())
                }
            }
        };

        lex.set_position(end_pos);
        // Consume the "endstream" keyword (and preceding EOL) if present.
        let save = lex.position();
        let t = lex.peek();
        if t.is_keyword("endstream") {
            lex.next();
        } else {
            lex.set_position(save);
        }

        Object::Stream(Stream::new(dict, raw))
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn parse_token_number(bytes: &[u8]) -> Option<f64> {
    std::str::from_utf8(bytes).ok()?.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;

    #[test]
    fn parses_simple_dictionary() {
        let data = b"<< /Type /Catalog /Pages 2 0 R >>";
        let p = Parser::new(data);
        let mut lex = Lexer::new(data);
        let obj = p.parse_value(&mut lex, &NullSink, 0).unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get("Type").unwrap().as_name().unwrap().as_str_lossy(), "Catalog");
        assert_eq!(dict.get("Pages").unwrap().as_reference(), Some((2, 0)));
    }

    #[test]
    fn parses_array_with_references_and_numbers() {
        let data = b"[1 0 R 2 0 R 3.5 (hi)]";
        let p = Parser::new(data);
        let mut lex = Lexer::new(data);
        let obj = p.parse_value(&mut lex, &NullSink, 0).unwrap();
        let arr = obj.as_array().unwrap();
        assert_eq!(arr.len(), 4);
        assert_eq!(arr[0].as_reference(), Some((1, 0)));
        assert_eq!(arr[1].as_reference(), Some((2, 0)));
        assert_eq!(arr[2].as_number(), Some(3.5));
        assert_eq!(arr[3].as_string_bytes(), Some(&b"hi"[..]));
    }

    #[test]
    fn parses_stream_with_declared_length() {
        let data = b"<< /Length 5 >>\nstream\nhello\nendstream";
        let p = Parser::new(data);
        let mut lex = Lexer::new(data);
        let obj = p.parse_value(&mut lex, &NullSink, 0).unwrap();
        let stream = obj.as_stream().unwrap();
        assert_eq!(stream.raw, b"hello");
    }

    #[test]
    fn parses_stream_falling_back_to_endstream_scan() {
        let data = b"<< /Length 999 >>\nstream\nhello world\nendstream";
        let p = Parser::new(data);
        let mut lex = Lexer::new(data);
        let obj = p.parse_value(&mut lex, &NullSink, 0).unwrap();
        let stream = obj.as_stream().unwrap();
        assert_eq!(stream.raw, b"hello world");
    }

    #[test]
    fn scan_all_objects_finds_each_record() {
        let data = b"1 0 obj\n<< /Type /Catalog >>\nendobj\n2 0 obj\n42\nendobj\n";
        let p = Parser::new(data);
        let objs = p.scan_all_objects(&NullSink);
        assert_eq!(objs.len(), 2);
        assert_eq!(objs[0].id, (1, 0));
        assert_eq!(objs[1].id, (2, 0));
        assert_eq!(objs[1].object.as_int(), Some(42));
    }

    #[test]
    fn missing_endobj_does_not_swallow_next_object() {
        let data = b"1 0 obj\n<< /Type /Catalog >>\n2 0 obj\n42\nendobj\n";
        let p = Parser::new(data);
        let objs = p.scan_all_objects(&NullSink);
        assert_eq!(objs.len(), 2);
        assert_eq!(objs[1].id, (2, 0));
    }
}
