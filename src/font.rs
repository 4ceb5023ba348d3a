//! Font resolver.
//!
//! `FontInfo` is a plain, already-resolved snapshot of everything the
//! content interpreter or a painter needs to place glyphs: widths,
//! encoding, and (for Type 3) the glyph procedures themselves.

use std::collections::HashMap;

use crate::content::graphics_state::Matrix;
use crate::events::DiagnosticSink;
use crate::filters;
use crate::lexer::{Lexer, TokenType};
use crate::object::{Dictionary, Object};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontSubtype {
    Type1,
    TrueType,
    Type0,
    Type3,
    MMType1,
    Unknown,
}

#[derive(Debug, Clone)]
pub enum Encoding {
    StandardEncoding,
    WinAnsiEncoding,
    MacRomanEncoding,
    /// Base encoding plus `/Differences` overrides (code -> glyph name).
    Differences { base: Box<Encoding>, differences: HashMap<u32, String> },
    /// Type0/CID fonts: codes map straight through to CIDs (two-byte
    /// Identity-H/V is overwhelmingly the common case in the wild; a full
    /// embedded-CMap parser is out of scope).
    IdentityTwoByte,
}

impl Encoding {
    pub fn glyph_name(&self, code: u32) -> Option<&str> {
        match self {
            Encoding::StandardEncoding => standard_encoding_name(code),
            Encoding::WinAnsiEncoding => win_ansi_encoding_name(code),
            Encoding::MacRomanEncoding => mac_roman_encoding_name(code),
            Encoding::Differences { base, differences } => {
                differences.get(&code).map(|s| s.as_str()).or_else(|| base.glyph_name(code))
            }
            Encoding::IdentityTwoByte => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FontInfo {
    pub base_font: String,
    pub subtype: FontSubtype,
    pub bytes_per_code: usize,
    pub encoding: Encoding,

    // Simple-font widths array, indexed by code, covering
    // FirstChar..LastChar.
    pub first_char: u32,
    pub widths: Vec<f64>,
    pub missing_width: f64,

    // CID-font widths (/DW default, /W sparse overrides).
    pub is_cid: bool,
    pub default_cid_width: f64,
    pub cid_widths: HashMap<u32, f64>,

    // Type 3 fields, carried even when unused by non-Type3 fonts so a
    // caller can match on `subtype` once and read through uniformly.
    pub type3_font_matrix: Option<Matrix>,
    pub type3_char_procs: Option<Dictionary>,
    pub type3_resources: Option<Dictionary>,

    /// Code (or CID, for Identity-H/V fonts) -> Unicode, from `/ToUnicode`.
    pub to_unicode: HashMap<u32, char>,
    /// `/CIDToGIDMap` as a raw big-endian GID table, or `None` for
    /// `/Identity` (the overwhelmingly common case).
    pub cid_to_gid: Option<Vec<u8>>,
}

impl FontInfo {
    /// Glyph-space advance width (1000 units/em for simple/Type1/TrueType
    /// fonts; whatever the font matrix implies for Type 3) for one
    /// character code.
    pub fn width_for_code(&self, code: u32) -> f64 {
        if self.is_cid {
            if let Some(&w) = self.cid_widths.get(&code) {
                return w;
            }
            return if self.default_cid_width > 0.0 { self.default_cid_width } else { 500.0 };
        }
        if code >= self.first_char {
            if let Some(&w) = self.widths.get((code - self.first_char) as usize) {
                return w;
            }
        }
        if self.missing_width > 0.0 {
            self.missing_width
        } else {
            500.0
        }
    }

    /// Splits a string's raw bytes into character codes, per
    /// `bytes_per_code` (1 for simple fonts, 2 for Identity-H/V CID
    /// fonts). An odd-length CID string drops its trailing byte rather
    /// than emitting a bogus one-byte code or panicking.
    pub fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.bytes_per_code == 2 {
            bytes.chunks(2).filter(|c| c.len() == 2).map(|c| ((c[0] as u32) << 8) | c[1] as u32).collect()
        } else {
            bytes.iter().map(|&b| b as u32).collect()
        }
    }

    /// Maps a character code to Unicode: the `/ToUnicode` CMap if one
    /// was present, else a best-effort fallback through the font's glyph
    /// names (simple fonts only — CID fonts with no ToUnicode stay
    /// unmapped).
    pub fn code_to_unicode(&self, code: u32) -> Option<char> {
        if let Some(&c) = self.to_unicode.get(&code) {
            return Some(c);
        }
        if self.is_cid {
            return None;
        }
        self.encoding.glyph_name(code).and_then(glyph_name_to_unicode)
    }

    /// GID for a CID, through `/CIDToGIDMap` (an explicit map, or
    /// Identity). Identity when the map is absent/named
    /// `/Identity`, or the CID itself past the map's end.
    pub fn gid_for_cid(&self, cid: u32) -> u32 {
        match &self.cid_to_gid {
            Some(map) => {
                let idx = cid as usize * 2;
                if idx + 1 < map.len() {
                    ((map[idx] as u32) << 8) | map[idx + 1] as u32
                } else {
                    cid
                }
            }
            None => cid,
        }
    }
}

/// Parses a `/Font` resource entry's dictionary into a [`FontInfo`].
/// `resolve` follows indirect references the way `Document::resolve`
/// does; this function stays decoupled from `Document` itself so it can
/// be unit tested without a full document in hand.
pub fn parse_font(dict: &Dictionary, resolve: &dyn Fn(&Object) -> Object, sink: &dyn DiagnosticSink) -> FontInfo {
    let subtype = dict
        .get("Subtype")
        .and_then(|o| o.as_name())
        .map(|n| match n.as_str_lossy().as_ref() {
            "Type1" => FontSubtype::Type1,
            "TrueType" => FontSubtype::TrueType,
            "Type0" => FontSubtype::Type0,
            "Type3" => FontSubtype::Type3,
            "MMType1" => FontSubtype::MMType1,
            _ => FontSubtype::Unknown,
        })
        .unwrap_or(FontSubtype::Unknown);
    let base_font = dict.get("BaseFont").and_then(|o| o.as_name()).map(|n| n.as_str_lossy().into_owned()).unwrap_or_default();

    if subtype == FontSubtype::Type0 {
        return parse_type0_font(dict, base_font, resolve, sink);
    }

    let first_char = dict.get("FirstChar").and_then(|o| o.as_int()).unwrap_or(0).max(0) as u32;
    let widths = dict
        .get("Widths")
        .map(|o| resolve(o))
        .and_then(|o| o.as_array().map(|a| a.iter().filter_map(|w| w.as_number()).collect::<Vec<_>>()))
        .unwrap_or_default();
    let missing_width = dict
        .get("FontDescriptor")
        .map(|o| resolve(o))
        .as_ref()
        .and_then(|d| d.as_dict())
        .and_then(|d| d.get("MissingWidth"))
        .and_then(|o| o.as_number())
        .unwrap_or(0.0);

    let encoding = resolve_simple_encoding(dict, resolve);
    let to_unicode = dict
        .get("ToUnicode")
        .map(|o| resolve(o))
        .and_then(|o| o.as_stream().map(|s| parse_to_unicode_cmap(&filters::decode_stream(s, sink))))
        .unwrap_or_default();

    let (type3_font_matrix, type3_char_procs, type3_resources) = if subtype == FontSubtype::Type3 {
        let matrix = dict.get("FontMatrix").and_then(|o| o.as_array()).map(|a| {
            let v: Vec<f64> = a.iter().filter_map(|n| n.as_number()).collect();
            Matrix::new(
                *v.first().unwrap_or(&0.001),
                *v.get(1).unwrap_or(&0.0),
                *v.get(2).unwrap_or(&0.0),
                *v.get(3).unwrap_or(&0.001),
                *v.get(4).unwrap_or(&0.0),
                *v.get(5).unwrap_or(&0.0),
            )
        });
        let char_procs = dict.get("CharProcs").map(|o| resolve(o)).and_then(|o| o.as_dict().cloned());
        let resources = dict.get("Resources").map(|o| resolve(o)).and_then(|o| o.as_dict().cloned());
        (matrix, char_procs, resources)
    } else {
        (None, None, None)
    };

    FontInfo {
        base_font,
        subtype,
        bytes_per_code: 1,
        encoding,
        first_char,
        widths,
        missing_width,
        is_cid: false,
        default_cid_width: 1000.0,
        cid_widths: HashMap::new(),
        type3_font_matrix,
        type3_char_procs,
        type3_resources,
        to_unicode,
        cid_to_gid: None,
    }
}

fn resolve_simple_encoding(dict: &Dictionary, resolve: &dyn Fn(&Object) -> Object) -> Encoding {
    match dict.get("Encoding").map(|o| resolve(o)) {
        Some(Object::Name(n)) => named_base_encoding(&n.as_str_lossy()),
        Some(Object::Dictionary(enc_dict)) => {
            let base = enc_dict
                .get("BaseEncoding")
                .and_then(|o| o.as_name())
                .map(|n| named_base_encoding(&n.as_str_lossy()))
                .unwrap_or(Encoding::StandardEncoding);
            let mut differences = HashMap::new();
            if let Some(diff_arr) = enc_dict.get("Differences").and_then(|o| o.as_array()) {
                let mut current_code = 0u32;
                for item in diff_arr {
                    match item {
                        Object::Number(n) => current_code = *n as u32,
                        Object::Name(name) => {
                            differences.insert(current_code, name.as_str_lossy().into_owned());
                            current_code += 1;
                        }
                        _ => {}
                    }
                }
            }
            Encoding::Differences { base: Box::new(base), differences }
        }
        _ => Encoding::StandardEncoding,
    }
}

fn named_base_encoding(name: &str) -> Encoding {
    match name {
        "WinAnsiEncoding" => Encoding::WinAnsiEncoding,
        "MacRomanEncoding" => Encoding::MacRomanEncoding,
        _ => Encoding::StandardEncoding,
    }
}

fn parse_type0_font(
    dict: &Dictionary,
    base_font: String,
    resolve: &dyn Fn(&Object) -> Object,
    sink: &dyn DiagnosticSink,
) -> FontInfo {
    let descendant = dict
        .get("DescendantFonts")
        .map(|o| resolve(o))
        .and_then(|o| o.as_array().and_then(|a| a.first().cloned()))
        .map(|o| resolve(&o));
    let descendant_dict = descendant.as_ref().and_then(|o| o.as_dict());

    let to_unicode = dict
        .get("ToUnicode")
        .map(|o| resolve(o))
        .and_then(|o| o.as_stream().map(|s| parse_to_unicode_cmap(&filters::decode_stream(s, sink))))
        .unwrap_or_default();

    let cid_to_gid = match descendant_dict.and_then(|d| d.get("CIDToGIDMap")).map(|o| resolve(o)) {
        Some(Object::Stream(s)) => Some(filters::decode_stream(&s, sink)),
        _ => None,
    };

    let default_cid_width = descendant_dict.and_then(|d| d.get("DW")).and_then(|o| o.as_number()).unwrap_or(1000.0);
    let mut cid_widths = HashMap::new();
    if let Some(w) = descendant_dict.and_then(|d| d.get("W")).and_then(|o| o.as_array()) {
        let mut i = 0;
        while i < w.len() {
            let Some(first) = w[i].as_int() else { i += 1; continue };
            match w.get(i + 1) {
                Some(Object::Array(list)) => {
                    for (j, width) in list.iter().enumerate() {
                        if let Some(wv) = width.as_number() {
                            cid_widths.insert(first as u32 + j as u32, wv);
                        }
                    }
                    i += 2;
                }
                Some(second) if second.as_int().is_some() => {
                    let last = second.as_int().unwrap();
                    let width = w.get(i + 2).and_then(|o| o.as_number()).unwrap_or(default_cid_width);
                    for c in first..=last {
                        cid_widths.insert(c as u32, width);
                    }
                    i += 3;
                }
                _ => {
                    i += 1;
                }
            }
        }
    }

    FontInfo {
        base_font,
        subtype: FontSubtype::Type0,
        bytes_per_code: 2,
        encoding: Encoding::IdentityTwoByte,
        first_char: 0,
        widths: Vec::new(),
        missing_width: default_cid_width,
        is_cid: true,
        default_cid_width,
        cid_widths,
        type3_font_matrix: None,
        type3_char_procs: None,
        type3_resources: None,
        to_unicode,
        cid_to_gid,
    }
}

/// Parses a `/ToUnicode` CMap stream's `beginbfchar`/`beginbfrange`
/// blocks into a code -> Unicode table. Only the common case (a hex
/// source code mapped to a hex UTF-16BE destination) is handled; `usecmap`
/// and multi-codepoint destinations are not, matching the "practical
/// coverage, not a full CMap interpreter" scope of this crate.
fn parse_to_unicode_cmap(data: &[u8]) -> HashMap<u32, char> {
    let mut out = HashMap::new();
    let mut lex = Lexer::new(data);
    loop {
        let t = lex.next();
        if t.kind == TokenType::EndOfFile {
            break;
        }
        if t.is_keyword("beginbfchar") {
            loop {
                let src = lex.next();
                if src.kind == TokenType::EndOfFile || src.is_keyword("endbfchar") {
                    break;
                }
                let dst = lex.next();
                if src.kind != TokenType::HexString || dst.kind != TokenType::HexString {
                    continue;
                }
                if let (Some(code), Some(ch)) = (hex_string_to_u32(&src.bytes), utf16be_first_char(&dst.bytes)) {
                    out.insert(code, ch);
                }
            }
        } else if t.is_keyword("beginbfrange") {
            loop {
                let lo = lex.next();
                if lo.kind == TokenType::EndOfFile || lo.is_keyword("endbfrange") {
                    break;
                }
                let hi = lex.next();
                let dst = lex.next();
                let (Some(lo_code), Some(hi_code)) = (hex_string_to_u32(&lo.bytes), hex_string_to_u32(&hi.bytes)) else {
                    continue;
                };
                match dst.kind {
                    TokenType::HexString => {
                        if let Some(base) = utf16be_first_char(&dst.bytes).map(|c| c as u32) {
                            for (offset, code) in (lo_code..=hi_code).enumerate() {
                                if let Some(ch) = char::from_u32(base + offset as u32) {
                                    out.insert(code, ch);
                                }
                            }
                        }
                    }
                    TokenType::Delimiter if dst.bytes == b"[" => {
                        let mut code = lo_code;
                        loop {
                            let item = lex.next();
                            if item.kind == TokenType::EndOfFile || item.is_delimiter("]") {
                                break;
                            }
                            if item.kind == TokenType::HexString {
                                if let Some(ch) = utf16be_first_char(&item.bytes) {
                                    out.insert(code, ch);
                                }
                            }
                            code += 1;
                        }
                    }
                    _ => {}
                }
            }
        }
    }
    out
}

fn hex_string_to_u32(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || bytes.len() > 4 {
        return None;
    }
    Some(bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32))
}

fn utf16be_first_char(bytes: &[u8]) -> Option<char> {
    if bytes.len() < 2 {
        return None;
    }
    let unit = ((bytes[0] as u32) << 8) | bytes[1] as u32;
    char::from_u32(unit)
}

/// Maps a standard glyph name to Unicode: ASCII printable names resolve
/// via `ascii_block`'s reverse lookup (those names *are* the ASCII
/// character, so the code point equals the table's key); a short table
/// covers the common Latin-1/typographic glyphs used in the WinAnsi/
/// MacRoman high blocks above.
fn glyph_name_to_unicode(name: &str) -> Option<char> {
    for code in 32u32..=126 {
        if ascii_block(code) == Some(name) {
            return char::from_u32(code);
        }
    }
    let cp = match name {
        "Euro" => 0x20AC,
        "quoteleft" => 0x2018,
        "quoteright" => 0x2019,
        "quotedblleft" => 0x201C,
        "quotedblright" => 0x201D,
        "bullet" => 0x2022,
        "endash" => 0x2013,
        "emdash" => 0x2014,
        "copyright" => 0x00A9,
        "registered" => 0x00AE,
        "degree" => 0x00B0,
        "periodcentered" => 0x00B7,
        "germandbls" => 0x00DF,
        "agrave" => 0x00E0,
        "eacute" => 0x00E9,
        "udieresis" => 0x00FC,
        "exclamdown" => 0x00A1,
        "Adieresis" => 0x00C4,
        "Aring" => 0x00C5,
        "Ccedilla" => 0x00C7,
        "Eacute" => 0x00C9,
        "aring" => 0x00E5,
        "AE" => 0x00C6,
        "mu" => 0x00B5,
        _ => return None,
    };
    char::from_u32(cp)
}

macro_rules! encoding_table {
    ($name:ident, $($code:expr => $glyph:expr),* $(,)?) => {
        fn $name(code: u32) -> Option<&'static str> {
            match code {
                $($code => Some($glyph),)*
                _ => None,
            }
        }
    };
}

// Printable ASCII is shared across all three base encodings; only the
// 128..=255 block differs, so only that block is tabulated per encoding.
encoding_table!(ascii_block,
    32 => "space", 33 => "exclam", 34 => "quotedbl", 35 => "numbersign", 36 => "dollar",
    37 => "percent", 38 => "ampersand", 39 => "quotesingle", 40 => "parenleft", 41 => "parenright",
    42 => "asterisk", 43 => "plus", 44 => "comma", 45 => "hyphen", 46 => "period", 47 => "slash",
    48 => "zero", 49 => "one", 50 => "two", 51 => "three", 52 => "four", 53 => "five", 54 => "six",
    55 => "seven", 56 => "eight", 57 => "nine", 58 => "colon", 59 => "semicolon", 60 => "less",
    61 => "equal", 62 => "greater", 63 => "question", 64 => "at",
    65 => "A", 66 => "B", 67 => "C", 68 => "D", 69 => "E", 70 => "F", 71 => "G", 72 => "H", 73 => "I",
    74 => "J", 75 => "K", 76 => "L", 77 => "M", 78 => "N", 79 => "O", 80 => "P", 81 => "Q", 82 => "R",
    83 => "S", 84 => "T", 85 => "U", 86 => "V", 87 => "W", 88 => "X", 89 => "Y", 90 => "Z",
    91 => "bracketleft", 92 => "backslash", 93 => "bracketright", 94 => "asciicircum", 95 => "underscore",
    96 => "grave",
    97 => "a", 98 => "b", 99 => "c", 100 => "d", 101 => "e", 102 => "f", 103 => "g", 104 => "h",
    105 => "i", 106 => "j", 107 => "k", 108 => "l", 109 => "m", 110 => "n", 111 => "o", 112 => "p",
    113 => "q", 114 => "r", 115 => "s", 116 => "t", 117 => "u", 118 => "v", 119 => "w", 120 => "x",
    121 => "y", 122 => "z", 123 => "braceleft", 124 => "bar", 125 => "braceright", 126 => "asciitilde",
);

encoding_table!(win_ansi_high,
    128 => "Euro", 145 => "quoteleft", 146 => "quoteright", 147 => "quotedblleft", 148 => "quotedblright",
    149 => "bullet", 150 => "endash", 151 => "emdash", 160 => "space", 161 => "exclamdown",
    169 => "copyright", 174 => "registered", 176 => "degree", 183 => "periodcentered", 223 => "germandbls",
    224 => "agrave", 233 => "eacute", 252 => "udieresis",
);

encoding_table!(mac_roman_high,
    128 => "Adieresis", 129 => "Aring", 130 => "Ccedilla", 131 => "Eacute", 138 => "agrave",
    142 => "aring", 165 => "bullet", 174 => "AE", 208 => "endash", 209 => "emdash", 229 => "mu",
);

fn standard_encoding_name(code: u32) -> Option<&'static str> {
    ascii_block(code)
}

fn win_ansi_encoding_name(code: u32) -> Option<&'static str> {
    ascii_block(code).or_else(|| win_ansi_high(code))
}

fn mac_roman_encoding_name(code: u32) -> Option<&'static str> {
    ascii_block(code).or_else(|| mac_roman_high(code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;
    use crate::object::Object;

    fn identity_resolve(o: &Object) -> Object {
        o.clone()
    }

    #[test]
    fn simple_font_width_falls_back_to_missing_width() {
        let mut dict = Dictionary::new();
        dict.set("Subtype", Object::Name("TrueType".into()));
        dict.set("FirstChar", Object::Number(65.0));
        dict.set("Widths", Object::Array(vec![Object::Number(600.0)]));
        let font = parse_font(&dict, &identity_resolve, &NullSink);
        assert_eq!(font.width_for_code(65), 600.0);
        // No /FontDescriptor, so there's no /MissingWidth to fall back to;
        // the interpreter's last resort is the PDF-conventional 500.
        assert_eq!(font.width_for_code(66), 500.0);
    }

    #[test]
    fn win_ansi_resolves_euro_sign() {
        assert_eq!(win_ansi_encoding_name(128), Some("Euro"));
        assert_eq!(win_ansi_encoding_name(65), Some("A"));
    }

    #[test]
    fn cid_font_two_byte_codes() {
        let mut descendant = Dictionary::new();
        descendant.set("DW", Object::Number(500.0));
        descendant.set(
            "W",
            Object::Array(vec![Object::Number(3.0), Object::Array(vec![Object::Number(700.0)])]),
        );
        let mut dict = Dictionary::new();
        dict.set("Subtype", Object::Name("Type0".into()));
        dict.set("DescendantFonts", Object::Array(vec![Object::Dictionary(descendant)]));
        let font = parse_font(&dict, &identity_resolve, &NullSink);
        assert!(font.is_cid);
        assert_eq!(font.codes(&[0x00, 0x03]), vec![3]);
        assert_eq!(font.width_for_code(3), 700.0);
        assert_eq!(font.width_for_code(4), 500.0);
    }
}
