//! PDF Functions (used by shadings and tint transforms).
//!
//! Implements Types 0 (sampled), 2 (exponential interpolation), and 3
//! (stitching); Type 4 (PostScript calculator) is declared unsupported
//! and evaluates to the function's domain midpoint, since a full
//! PostScript calculator interpreter is out of scope for this crate.

use crate::events::{DiagnosticEvent, DiagnosticSink};
use crate::filters;
use crate::object::{Object, Stream};

#[derive(Debug, Clone)]
pub enum PdfFunction {
    Sampled {
        domain: Vec<(f64, f64)>,
        range: Vec<(f64, f64)>,
        size: Vec<usize>,
        bits_per_sample: u32,
        samples: Vec<u8>,
        encode: Vec<(f64, f64)>,
        decode: Vec<(f64, f64)>,
    },
    Exponential {
        domain: Vec<(f64, f64)>,
        c0: Vec<f64>,
        c1: Vec<f64>,
        n: f64,
    },
    Stitching {
        domain: (f64, f64),
        functions: Vec<PdfFunction>,
        bounds: Vec<f64>,
        encode: Vec<(f64, f64)>,
    },
    Unsupported {
        output_len: usize,
    },
}

impl PdfFunction {
    pub fn parse(obj: &Object, sink: &dyn DiagnosticSink) -> PdfFunction {
        let (dict, stream) = match obj {
            Object::Stream(s) => (&s.dict, Some(s)),
            Object::Dictionary(d) => (d, None),
            _ => {
                return PdfFunction::Unsupported { output_len: 1 };
            }
        };
        let function_type = dict.get("FunctionType").and_then(|o| o.as_int()).unwrap_or(2);
        let domain = read_pairs(dict.get("Domain"));

        match function_type {
            0 => {
                let Some(stream) = stream else {
                    return PdfFunction::Unsupported { output_len: 1 };
                };
                let range = read_pairs(dict.get("Range"));
                let size: Vec<usize> = dict
                    .get("Size")
                    .and_then(|o| o.as_array())
                    .map(|a| a.iter().filter_map(|o| o.as_int()).map(|n| n.max(1) as usize).collect())
                    .unwrap_or_else(|| vec![2]);
                let bits_per_sample = dict.get("BitsPerSample").and_then(|o| o.as_int()).unwrap_or(8) as u32;
                let encode = read_pairs(dict.get("Encode"))
                    .into_iter()
                    .collect::<Vec<_>>();
                let encode = if encode.is_empty() {
                    size.iter().map(|&s| (0.0, (s.max(1) - 1) as f64)).collect()
                } else {
                    encode
                };
                let decode = if dict.contains_key("Decode") { read_pairs(dict.get("Decode")) } else { range.clone() };
                let samples = filters::decode_stream(stream, sink);
                PdfFunction::Sampled { domain, range, size, bits_per_sample, samples, encode, decode }
            }
            2 => {
                let c0 = read_numbers(dict.get("C0")).unwrap_or_else(|| vec![0.0]);
                let c1 = read_numbers(dict.get("C1")).unwrap_or_else(|| vec![1.0]);
                let n = dict.get("N").and_then(|o| o.as_number()).unwrap_or(1.0);
                PdfFunction::Exponential { domain, c0, c1, n }
            }
            3 => {
                let functions = dict
                    .get("Functions")
                    .and_then(|o| o.as_array())
                    .map(|a| a.iter().map(|o| PdfFunction::parse(o, sink)).collect())
                    .unwrap_or_default();
                let bounds = read_numbers(dict.get("Bounds")).unwrap_or_default();
                let encode = read_pairs(dict.get("Encode"));
                let d = domain.first().copied().unwrap_or((0.0, 1.0));
                PdfFunction::Stitching { domain: d, functions, bounds, encode }
            }
            _ => {
                sink.emit(DiagnosticEvent::Unsupported { kind: "function_type", name: function_type.to_string() });
                let range = read_pairs(dict.get("Range"));
                PdfFunction::Unsupported { output_len: range.len().max(1) }
            }
        }
    }

    pub fn eval(&self, input: &[f64]) -> Vec<f64> {
        match self {
            PdfFunction::Exponential { domain, c0, c1, n } => {
                let x = clamp_to_domain(input.first().copied().unwrap_or(0.0), domain.first().copied());
                let t = x.powf(*n);
                c0.iter().zip(c1.iter()).map(|(&a, &b)| a + t * (b - a)).collect()
            }
            PdfFunction::Stitching { domain, functions, bounds, encode } => {
                let x = clamp_to_domain(input.first().copied().unwrap_or(0.0), Some(*domain));
                let mut lo = domain.0;
                for (i, func) in functions.iter().enumerate() {
                    let hi = bounds.get(i).copied().unwrap_or(domain.1);
                    if x < hi || i == functions.len() - 1 {
                        let (e0, e1) = encode.get(i).copied().unwrap_or((0.0, 1.0));
                        let t = interpolate(x, lo, hi, e0, e1);
                        return func.eval(&[t]);
                    }
                    lo = hi;
                }
                vec![0.0]
            }
            PdfFunction::Sampled { domain, range, size, bits_per_sample, samples, encode, decode } => {
                eval_sampled(input, domain, range, size, *bits_per_sample, samples, encode, decode)
            }
            PdfFunction::Unsupported { output_len } => vec![0.5; *output_len],
        }
    }
}

fn clamp_to_domain(x: f64, domain: Option<(f64, f64)>) -> f64 {
    match domain {
        Some((lo, hi)) => x.clamp(lo.min(hi), lo.max(hi)),
        None => x,
    }
}

fn interpolate(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    if (x1 - x0).abs() < f64::EPSILON {
        y0
    } else {
        y0 + (x - x0) * (y1 - y0) / (x1 - x0)
    }
}

fn eval_sampled(
    input: &[f64],
    domain: &[(f64, f64)],
    range: &[(f64, f64)],
    size: &[usize],
    bits: u32,
    samples: &[u8],
    encode: &[(f64, f64)],
    decode: &[(f64, f64)],
) -> Vec<f64> {
    // Only 1-D sampled functions (the common shading case) are
    // interpolated; higher-dimensional domains take the nearest sample.
    let n_out = range.len().max(1);
    if size.is_empty() {
        return vec![0.0; n_out];
    }
    let (d0, d1) = domain.first().copied().unwrap_or((0.0, 1.0));
    let x = clamp_to_domain(input.first().copied().unwrap_or(0.0), Some((d0, d1)));
    let (e0, e1) = encode.first().copied().unwrap_or((0.0, (size[0].max(1) - 1) as f64));
    let encoded = interpolate(x, d0, d1, e0, e1).clamp(0.0, (size[0].max(1) - 1) as f64);
    let sample_index = encoded.round() as usize;

    let max_sample = (1u64 << bits.min(63)) - 1;
    let mut out = Vec::with_capacity(n_out);
    for out_i in 0..n_out {
        let bit_offset = (sample_index * n_out + out_i) as u64 * bits as u64;
        let raw = read_bits(samples, bit_offset, bits);
        let frac = raw as f64 / max_sample.max(1) as f64;
        let (dec0, dec1) = decode.get(out_i).copied().unwrap_or((0.0, 1.0));
        out.push(dec0 + frac * (dec1 - dec0));
    }
    out
}

fn read_bits(data: &[u8], bit_offset: u64, bits: u32) -> u64 {
    let mut value: u64 = 0;
    for i in 0..bits as u64 {
        let bit_pos = bit_offset + i;
        let byte_index = (bit_pos / 8) as usize;
        if byte_index >= data.len() {
            break;
        }
        let bit_in_byte = 7 - (bit_pos % 8);
        let bit = (data[byte_index] >> bit_in_byte) & 1;
        value = (value << 1) | bit as u64;
    }
    value
}

fn read_pairs(obj: Option<&Object>) -> Vec<(f64, f64)> {
    let Some(arr) = obj.and_then(|o| o.as_array()) else {
        return Vec::new();
    };
    arr.chunks_exact(2)
        .filter_map(|pair| Some((pair[0].as_number()?, pair[1].as_number()?)))
        .collect()
}

fn read_numbers(obj: Option<&Object>) -> Option<Vec<f64>> {
    obj.and_then(|o| o.as_array()).map(|a| a.iter().filter_map(|o| o.as_number()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;
    use crate::object::Dictionary;

    #[test]
    fn exponential_linear_interpolation() {
        let f = PdfFunction::Exponential {
            domain: vec![(0.0, 1.0)],
            c0: vec![0.0, 0.0, 0.0],
            c1: vec![1.0, 1.0, 1.0],
            n: 1.0,
        };
        assert_eq!(f.eval(&[0.5]), vec![0.5, 0.5, 0.5]);
    }

    #[test]
    fn stitching_picks_correct_sub_function() {
        let f = PdfFunction::Stitching {
            domain: (0.0, 1.0),
            functions: vec![
                PdfFunction::Exponential { domain: vec![(0.0, 1.0)], c0: vec![0.0], c1: vec![0.0], n: 1.0 },
                PdfFunction::Exponential { domain: vec![(0.0, 1.0)], c0: vec![1.0], c1: vec![1.0], n: 1.0 },
            ],
            bounds: vec![0.5],
            encode: vec![(0.0, 1.0), (0.0, 1.0)],
        };
        assert_eq!(f.eval(&[0.2]), vec![0.0]);
        assert_eq!(f.eval(&[0.8]), vec![1.0]);
    }

    #[test]
    fn unsupported_type_is_a_stub_not_a_panic() {
        let dict = Dictionary::from(vec![("FunctionType", Object::Number(4.0))]);
        let f = PdfFunction::parse(&Object::Dictionary(dict), &NullSink);
        assert_eq!(f.eval(&[0.0]), vec![0.5]);
    }
}
