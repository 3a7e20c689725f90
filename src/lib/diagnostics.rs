//! Collected warnings and errors from one conversion run.
//!
//! Lexer/parser failures abort via [`crate::error::Error`]; everything
//! collected here is non-fatal (malformed figures, unresolved labels,
//! dropped unknown commands — see SPEC_FULL.md §7 tier 3 and §4.6's
//! error policy).

use crate::error::SourcePos;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One collected diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub pos: Option<SourcePos>,
}

/// An ordered bag of diagnostics accumulated while converting a document.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSink {
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> DiagnosticSink {
        DiagnosticSink::default()
    }

    pub fn push(&mut self, severity: Severity, message: impl Into<String>, pos: Option<SourcePos>) {
        self.diagnostics.push(Diagnostic {
            severity,
            message: message.into(),
            pos,
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message, None);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message, None);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    /// Fold the reader's plain warning strings ([`crate::document::DocumentMeta::warnings`]) in.
    pub fn extend_from_reader(&mut self, warnings: &[String]) {
        for message in warnings {
            self.warn(message.clone());
        }
    }
}

#[cfg(feature = "color")]
mod render {
    use super::*;
    use std::io::Write;
    use termcolor::{Color, ColorSpec, StandardStream, WriteColor};

    impl DiagnosticSink {
        /// Write every diagnostic to `out`, colorizing the severity label.
        pub fn write_colorized(&self, out: &mut StandardStream) -> std::io::Result<()> {
            for d in &self.diagnostics {
                let mut spec = ColorSpec::new();
                let label = match d.severity {
                    Severity::Warning => {
                        spec.set_fg(Some(Color::Yellow));
                        "warning"
                    }
                    Severity::Error => {
                        spec.set_fg(Some(Color::Red)).set_bold(true);
                        "error"
                    }
                };
                out.set_color(&spec)?;
                write!(out, "{label}")?;
                out.reset()?;
                match d.pos {
                    Some(pos) => writeln!(out, " ({pos}): {}", d.message)?,
                    None => writeln!(out, ": {}", d.message)?,
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_errors_reflects_severity() {
        let mut sink = DiagnosticSink::new();
        sink.warn("just a warning");
        assert!(!sink.has_errors());
        sink.error("a real problem");
        assert!(sink.has_errors());
        assert_eq!(sink.diagnostics.len(), 2);
    }
}
