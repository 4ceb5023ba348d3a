//! pdf-core
//!
//! An offline-capable PDF reader and rasterizer core. This library provides:
//! - A byte-level lexer and object parser for classic and cross-reference
//!   stream PDFs, including hybrid-reference and incremental-update files
//! - Standard (password) and public-key (`/Adobe.PubSec`) decryption
//! - The stream filter chain (Flate, LZW, ASCII85/Hex, RunLength, CCITTFax,
//!   DCT)
//! - A content-stream interpreter that drives an abstract [`painter::Painter`]
//!   rather than rasterizing itself
//! - A [`document::Document`] facade exposing page count, sizes, fonts,
//!   links, and rendering
//!
//! # Example
//!
//! ```no_run
//! use pdf_core::document::Document;
//! use pdf_core::painter::NullPainter;
//!
//! let bytes = std::fs::read("handout.pdf").expect("read pdf");
//! let doc = Document::load(&bytes).expect("load pdf");
//! println!("{} pages", doc.page_count());
//!
//! let mut painter = NullPainter;
//! doc.render_page(0, &mut painter).expect("render page");
//! ```

pub mod content;
pub mod crypto;
pub mod document;
pub mod error;
pub mod events;
pub mod filters;
pub mod font;
pub mod lexer;
pub mod limits;
pub mod object;
pub mod painter;
pub mod parser;
pub mod xref;

pub use document::Document;
pub use error::{Error, Result};
pub use limits::Limits;
