//! Error types for the PDF core library

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can escape the public API.
///
/// Per spec, nothing in the object layer or the content-stream interpreter
/// is a fatal process error: malformed syntax, unresolved references, and
/// unsupported features are all recovered from locally and reported through
/// [`crate::events::DiagnosticSink`] instead. `Error` is reserved for
/// failures at the edge of the public API itself.
#[derive(Error, Debug)]
pub enum Error {
    /// The supplied buffer has no recognizable `%PDF-` header.
    #[error("not a PDF file: missing %PDF- header")]
    NotAPdf,

    /// No cross-reference information could be located or reconstructed.
    #[error("could not locate or rebuild a cross-reference table")]
    NoXref,

    /// The document has no page tree / zero pages.
    #[error("document has no pages")]
    NoPages,

    /// `page_count`/`page_size`/etc. called with an out-of-range index.
    #[error("page index {0} out of range (document has {1} pages)")]
    PageIndexOutOfRange(usize, usize),

    /// A read was attempted before the document's encryption was resolved.
    #[error("document is encrypted; supply credentials before reading content")]
    EncryptionNotReady,

    /// The painter reported a failure; the interpreter stops calling it.
    #[error("painter reported a failure: {0}")]
    Painter(String),

    /// Catch-all for host misuse of the API (e.g. malformed seed length).
    #[error("{0}")]
    InvalidArgument(String),
}
