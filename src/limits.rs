//! Safety bounds threaded through the lexer, parser, xref loader, and
//! content-stream interpreter.
//!
//! Every cap named in the spec (string length, name length, array/dict
//! item counts, xref chain depth, content-stream iteration count,
//! XObject/pattern recursion depth) lives here instead of being scattered
//! as magic numbers, so a host can loosen or tighten them for a particular
//! trust boundary without patching the parser.

/// Safety bounds for one [`crate::Document::load_with_limits`] call.
///
/// Defaults match the orders of magnitude a real-world PDF lexer and
/// parser use for the same caps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    /// Max bytes in a literal or hex string (spec: "a bounded safety limit
    /// (≥64 KiB)").
    pub max_string_len: usize,
    /// Max bytes in a `/Name` token.
    pub max_name_len: usize,
    /// Max bytes in a numeric token.
    pub max_number_len: usize,
    /// Max bytes in an unrecognized keyword token.
    pub max_keyword_len: usize,
    /// Max entries in a single array literal.
    pub max_array_items: usize,
    /// Max key/value pairs in a single dictionary literal.
    pub max_dict_entries: usize,
    /// Max `/Prev` chain length walked while merging xref sections.
    pub max_xref_chain: usize,
    /// Max `q`/`Q` nesting depth tracked by the content interpreter.
    pub max_graphics_state_depth: usize,
    /// Max recursion depth for Form XObjects, tiling patterns, and Type 3
    /// glyph procedures (spec: "Recursion ... is capped at 20").
    pub max_interpreter_recursion: usize,
    /// Max ASN.1 element nesting depth while parsing a PKCS#7 blob.
    pub max_asn1_depth: usize,
    /// Max indirect-reference resolution chain before treating it as a
    /// cycle (independent of the `visited` set, as a hard backstop).
    pub max_resolve_chain: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_string_len: 65_536,
            max_name_len: 1024,
            max_number_len: 256,
            max_keyword_len: 256,
            max_array_items: 50_000,
            max_dict_entries: 10_000,
            max_xref_chain: 1024,
            max_graphics_state_depth: 4096,
            max_interpreter_recursion: 20,
            max_asn1_depth: 64,
            max_resolve_chain: 256,
        }
    }
}

impl Limits {
    /// The content-stream iteration cap is a function of the stream's own
    /// length: `max(2 * byte_count, 200_000)` per spec.
    pub fn content_iteration_cap(&self, byte_count: usize) -> usize {
        (2 * byte_count).max(200_000)
    }
}
