//! Structured diagnostics.
//!
//! Replaces ad hoc logging calls scattered through the parser with a
//! sink object passed to the [`crate::Document`] at construction. Each
//! event carries a stable tag (`warn.unsupported_filter`, `info.page_done`,
//! ...) so a host can match on kind without string-matching a log line.

use std::fmt;

/// One diagnostic raised while loading or rendering a document.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    /// Malformed syntax recovered from locally (§7 kind 1).
    MalformedSyntax { context: String, detail: String },
    /// An indirect reference cycle was broken (§7 kind 3).
    CycleDetected { obj_num: u32, gen: u16 },
    /// A filter, shading type, or operator isn't supported (§7 kind 4).
    Unsupported { kind: &'static str, name: String },
    /// Encryption is blocking stream/string reads (§7 kind 5).
    EncryptionPending,
    /// An iteration/recursion/allocation guard tripped (§7 kind 6).
    ResourceCapExceeded { cap: &'static str, page_index: Option<usize> },
    /// The painter reported a failure (§7 kind 7).
    PainterFailed { message: String },
    /// A page finished rendering.
    PageDone { page_index: usize, error_count: usize },
}

impl DiagnosticEvent {
    /// Stable dotted tag, e.g. `warn.unsupported_filter`.
    pub fn tag(&self) -> String {
        match self {
            DiagnosticEvent::MalformedSyntax { .. } => "warn.malformed_syntax".into(),
            DiagnosticEvent::CycleDetected { .. } => "warn.cycle_detected".into(),
            DiagnosticEvent::Unsupported { kind, .. } => format!("warn.unsupported_{kind}"),
            DiagnosticEvent::EncryptionPending => "warn.encryption_pending".into(),
            DiagnosticEvent::ResourceCapExceeded { cap, .. } => format!("warn.{cap}_cap"),
            DiagnosticEvent::PainterFailed { .. } => "error.painter_failed".into(),
            DiagnosticEvent::PageDone { .. } => "info.page_done".into(),
        }
    }
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticEvent::MalformedSyntax { context, detail } => {
                write!(f, "malformed syntax in {context}: {detail}")
            }
            DiagnosticEvent::CycleDetected { obj_num, gen } => {
                write!(f, "reference cycle broken at {obj_num} {gen} R")
            }
            DiagnosticEvent::Unsupported { kind, name } => {
                write!(f, "unsupported {kind}: {name}")
            }
            DiagnosticEvent::EncryptionPending => {
                write!(f, "document encryption not yet resolved")
            }
            DiagnosticEvent::ResourceCapExceeded { cap, page_index } => match page_index {
                Some(p) => write!(f, "{cap} cap exceeded on page {p}"),
                None => write!(f, "{cap} cap exceeded"),
            },
            DiagnosticEvent::PainterFailed { message } => {
                write!(f, "painter failed: {message}")
            }
            DiagnosticEvent::PageDone { page_index, error_count } => {
                write!(f, "page {page_index} done ({error_count} errors)")
            }
        }
    }
}

/// Receives diagnostics as the document is loaded and rendered.
///
/// The default implementation ([`LogSink`]) forwards to the `log` facade;
/// a host that wants a per-page diagnostic record installs its own
/// sink via `Document::load_with_sink` and accumulates
/// events instead.
pub trait DiagnosticSink: std::fmt::Debug {
    fn emit(&self, event: DiagnosticEvent);
}

/// Forwards every event to the `log` crate at a level matched to its
/// severity, using the event's dotted tag as the log target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn emit(&self, event: DiagnosticEvent) {
        let tag = event.tag();
        match &event {
            DiagnosticEvent::PageDone { .. } => log::info!(target: "pdf_core", "[{tag}] {event}"),
            DiagnosticEvent::PainterFailed { .. } => {
                log::error!(target: "pdf_core", "[{tag}] {event}")
            }
            _ => log::warn!(target: "pdf_core", "[{tag}] {event}"),
        }
    }
}

/// Discards every event. Useful for benchmarks or when a host does not
/// care about diagnostics at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&self, _event: DiagnosticEvent) {}
}

/// Collects every event into a `Vec`, for tests and for hosts that want
/// a per-page diagnostic record.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: std::sync::Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<DiagnosticEvent> {
        std::mem::take(&mut self.events.lock().expect("RecordingSink poisoned"))
    }

    pub fn snapshot(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().expect("RecordingSink poisoned").clone()
    }
}

impl DiagnosticSink for RecordingSink {
    fn emit(&self, event: DiagnosticEvent) {
        self.events.lock().expect("RecordingSink poisoned").push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_stable() {
        assert_eq!(
            DiagnosticEvent::Unsupported { kind: "filter", name: "JBIG2Decode".into() }.tag(),
            "warn.unsupported_filter"
        );
        assert_eq!(
            DiagnosticEvent::PageDone { page_index: 0, error_count: 0 }.tag(),
            "info.page_done"
        );
    }

    #[test]
    fn recording_sink_collects_in_order() {
        let sink = RecordingSink::new();
        sink.emit(DiagnosticEvent::CycleDetected { obj_num: 1, gen: 0 });
        sink.emit(DiagnosticEvent::EncryptionPending);
        let events = sink.take();
        assert_eq!(events.len(), 2);
        assert!(sink.snapshot().is_empty());
    }
}
