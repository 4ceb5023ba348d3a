//! Stream filter chain.
//!
//! A stream's `/Filter` is a name or an array of names applied in order;
//! `/DecodeParms` carries matching per-filter parameters. Codec filters
//! (Flate, LZW, CCITTFax, DCT) delegate to a crate; structural filters
//! (ASCII85, ASCIIHex, RunLength) and the PNG/TIFF predictor pass are
//! hand-rolled, since they're a handful of lines of bit-twiddling rather
//! than a codec.

pub mod predictor;

use std::io::Read;

use crate::events::{DiagnosticEvent, DiagnosticSink};
use crate::object::{Dictionary, Object, Stream};
use predictor::PredictorParams;

/// One entry in a stream's filter chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    FlateDecode,
    LzwDecode,
    Ascii85Decode,
    AsciiHexDecode,
    RunLengthDecode,
    CcittFaxDecode,
    DctDecode,
    Jbig2Decode,
    JpxDecode,
    Unknown(String),
}

impl Filter {
    fn from_name(name: &str) -> Filter {
        match name {
            "FlateDecode" | "Fl" => Filter::FlateDecode,
            "LZWDecode" | "LZW" => Filter::LzwDecode,
            "ASCII85Decode" | "A85" => Filter::Ascii85Decode,
            "ASCIIHexDecode" | "AHx" => Filter::AsciiHexDecode,
            "RunLengthDecode" | "RL" => Filter::RunLengthDecode,
            "CCITTFaxDecode" | "CCF" => Filter::CcittFaxDecode,
            "DCTDecode" | "DCT" => Filter::DctDecode,
            "JBIG2Decode" => Filter::Jbig2Decode,
            "JPXDecode" => Filter::JpxDecode,
            other => Filter::Unknown(other.to_string()),
        }
    }
}

fn names_of(filter_obj: &Object) -> Vec<String> {
    match filter_obj {
        Object::Name(n) => vec![n.as_str_lossy().into_owned()],
        Object::Array(a) => a.iter().filter_map(|o| o.as_name()).map(|n| n.as_str_lossy().into_owned()).collect(),
        _ => Vec::new(),
    }
}

fn parms_of(dict: &Dictionary, count: usize) -> Vec<Option<Dictionary>> {
    match dict.get("DecodeParms").or_else(|| dict.get("DP")) {
        Some(Object::Dictionary(d)) => {
            let mut v = vec![None; count];
            if count > 0 {
                v[0] = Some(d.clone());
            }
            v
        }
        Some(Object::Array(a)) => {
            let mut v = vec![None; count];
            for (i, item) in a.iter().enumerate().take(count) {
                if let Object::Dictionary(d) = item {
                    v[i] = Some(d.clone());
                }
            }
            v
        }
        _ => vec![None; count],
    }
}

/// Runs a stream's full filter chain, returning the final decoded payload.
/// Never fails: an undecodable stage logs a diagnostic and the original
/// bytes for that stage are passed through unchanged — unsupported
/// features degrade, they don't abort the page.
pub fn decode_stream(stream: &Stream, sink: &dyn DiagnosticSink) -> Vec<u8> {
    if let Some(cached) = stream.decoded_cache.borrow().as_ref() {
        return cached.clone();
    }

    let filter_names = stream
        .dict
        .get("Filter")
        .or_else(|| stream.dict.get("F"))
        .map(names_of)
        .unwrap_or_default();
    let parms = parms_of(&stream.dict, filter_names.len());

    let mut data = stream.raw.clone();
    for (name, parm) in filter_names.iter().zip(parms.iter()) {
        let filter = Filter::from_name(name);
        data = apply_filter(&filter, &data, parm.as_ref(), sink);
    }

    *stream.decoded_cache.borrow_mut() = Some(data.clone());
    data
}

fn apply_filter(filter: &Filter, data: &[u8], parms: Option<&Dictionary>, sink: &dyn DiagnosticSink) -> Vec<u8> {
    match filter {
        Filter::FlateDecode => {
            let inflated = inflate(data).unwrap_or_else(|_| {
                sink.emit(DiagnosticEvent::MalformedSyntax {
                    context: "FlateDecode".into(),
                    detail: "zlib stream did not inflate cleanly".into(),
                });
                Vec::new()
            });
            let params = PredictorParams::from_decode_parms(parms);
            predictor::undo_predictor(&inflated, &params)
        }
        Filter::LzwDecode => {
            let early_change = parms.and_then(|d| d.get("EarlyChange")).and_then(|o| o.as_int()).unwrap_or(1);
            let decoded = lzw_decode(data, early_change != 0).unwrap_or_else(|| {
                sink.emit(DiagnosticEvent::MalformedSyntax {
                    context: "LZWDecode".into(),
                    detail: "LZW stream ended unexpectedly".into(),
                });
                Vec::new()
            });
            let params = PredictorParams::from_decode_parms(parms);
            predictor::undo_predictor(&decoded, &params)
        }
        Filter::Ascii85Decode => ascii85_decode(data),
        Filter::AsciiHexDecode => ascii_hex_decode(data),
        Filter::RunLengthDecode => run_length_decode(data),
        Filter::CcittFaxDecode => ccitt_decode(data, parms, sink),
        Filter::DctDecode => dct_decode(data, sink),
        Filter::Jbig2Decode | Filter::JpxDecode => {
            sink.emit(DiagnosticEvent::Unsupported {
                kind: "filter",
                name: format!("{filter:?}"),
            });
            data.to_vec()
        }
        Filter::Unknown(name) => {
            sink.emit(DiagnosticEvent::Unsupported { kind: "filter", name: name.clone() });
            data.to_vec()
        }
    }
}

fn inflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    flate2::read::ZlibDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

fn lzw_decode(data: &[u8], early_change: bool) -> Option<Vec<u8>> {
    let variant = if early_change { weezl::BitOrder::Msb } else { weezl::BitOrder::Msb };
    let mut decoder = weezl::decode::Decoder::with_tiff_size_switch(variant, 8);
    decoder.decode(data).ok()
}

/// `~>`-terminated base-85 text encoding. Groups of 5 ASCII chars (33..=117
/// offset by `!`) pack into 4 bytes; `z` is a shorthand for four zero bytes.
fn ascii85_decode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut group = [0u8; 5];
    let mut n = 0;
    let mut iter = data.iter().copied().peekable();
    // Tolerate an optional leading "<~".
    if data.starts_with(b"<~") {
        iter.next();
        iter.next();
    }
    while let Some(c) = iter.next() {
        if c == b'~' {
            break;
        }
        if c.is_ascii_whitespace() {
            continue;
        }
        if c == b'z' && n == 0 {
            out.extend_from_slice(&[0, 0, 0, 0]);
            continue;
        }
        if !(b'!'..=b'u').contains(&c) {
            continue;
        }
        group[n] = c - b'!';
        n += 1;
        if n == 5 {
            let value = group.iter().fold(0u32, |acc, &d| acc.wrapping_mul(85).wrapping_add(d as u32));
            out.extend_from_slice(&value.to_be_bytes());
            n = 0;
        }
    }
    if n > 0 {
        for slot in group.iter_mut().skip(n) {
            *slot = 84; // pad with 'u'
        }
        let value = group.iter().fold(0u32, |acc, &d| acc.wrapping_mul(85).wrapping_add(d as u32));
        let bytes = value.to_be_bytes();
        out.extend_from_slice(&bytes[..n - 1]);
    }
    out
}

fn ascii_hex_decode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut hi: Option<u8> = None;
    for &c in data {
        if c == b'>' {
            break;
        }
        let v = match c {
            b'0'..=b'9' => c - b'0',
            b'A'..=b'F' => c - b'A' + 10,
            b'a'..=b'f' => c - b'a' + 10,
            _ => continue,
        };
        match hi.take() {
            Some(h) => out.push((h << 4) | v),
            None => hi = Some(v),
        }
    }
    if let Some(h) = hi {
        out.push(h << 4);
    }
    out
}

/// Byte-oriented RLE: a length byte `0..=127` means copy the next `len+1`
/// literal bytes, `129..=255` means repeat the following byte `257-len`
/// times, `128` is EOD.
fn run_length_decode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let len = data[i];
        i += 1;
        if len == 128 {
            break;
        } else if len < 128 {
            let count = len as usize + 1;
            if i + count > data.len() {
                break;
            }
            out.extend_from_slice(&data[i..i + count]);
            i += count;
        } else {
            if i >= data.len() {
                break;
            }
            let count = 257 - len as usize;
            out.extend(std::iter::repeat(data[i]).take(count));
            i += 1;
        }
    }
    out
}

fn ccitt_decode(data: &[u8], parms: Option<&Dictionary>, sink: &dyn DiagnosticSink) -> Vec<u8> {
    let columns = parms.and_then(|d| d.get("Columns")).and_then(|o| o.as_int()).unwrap_or(1728).max(1) as u32;
    let rows = parms.and_then(|d| d.get("Rows")).and_then(|o| o.as_int()).map(|n| n.max(0) as u32);
    let k = parms.and_then(|d| d.get("K")).and_then(|o| o.as_int()).unwrap_or(0);
    let black_is_1 = parms.and_then(|d| d.get("BlackIs1")).and_then(|o| match o {
        Object::Boolean(b) => Some(*b),
        _ => None,
    }).unwrap_or(false);

    let result = fax::decoder::decode(data, columns as u16, rows.map(|r| r as u16), k);
    match result {
        Ok(mut bits) => {
            if !black_is_1 {
                for byte in bits.iter_mut() {
                    *byte = !*byte;
                }
            }
            bits
        }
        Err(_) => {
            sink.emit(DiagnosticEvent::MalformedSyntax {
                context: "CCITTFaxDecode".into(),
                detail: "G3/G4 bitstream did not decode cleanly".into(),
            });
            Vec::new()
        }
    }
}

fn dct_decode(data: &[u8], sink: &dyn DiagnosticSink) -> Vec<u8> {
    let mut decoder = jpeg_decoder::Decoder::new(data);
    match decoder.decode() {
        Ok(pixels) => pixels,
        Err(_) => {
            sink.emit(DiagnosticEvent::MalformedSyntax {
                context: "DCTDecode".into(),
                detail: "embedded JPEG failed to decode".into(),
            });
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;
    use crate::object::Dictionary;

    #[test]
    fn ascii_hex_round_trips_simple_text() {
        assert_eq!(ascii_hex_decode(b"48656C6C6F>"), b"Hello");
    }

    #[test]
    fn ascii85_decodes_z_shorthand() {
        assert_eq!(ascii85_decode(b"z~>"), vec![0, 0, 0, 0]);
    }

    #[test]
    fn run_length_literal_and_repeat_runs() {
        // literal run: len=2 -> 3 bytes "abc"; repeat run: len=254 -> 3 copies of 'x'
        let data = [2u8, b'a', b'b', b'c', 254, b'x', 128];
        assert_eq!(run_length_decode(&data), b"abcxxx");
    }

    #[test]
    fn unknown_filter_passes_data_through_with_diagnostic() {
        let dict = Dictionary::from(vec![("Filter", Object::Name("WeirdDecode".into()))]);
        let stream = Stream::new(dict, b"raw".to_vec());
        let out = decode_stream(&stream, &NullSink);
        assert_eq!(out, b"raw");
    }
}
