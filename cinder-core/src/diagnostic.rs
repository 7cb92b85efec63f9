//! Diagnostics reported while compiling.
//!
//! Every pipeline component receives a `&mut DiagnosticSink` and reports
//! human-readable messages through it. The sink both records them (so
//! callers can count errors after a stage) and emits them immediately to
//! its writer, stderr by default.

use std::io::{self, Write};

use serde::Serialize;

/// How much a diagnostic matters to the run.
///
/// Only `Error` fails a stage. A semantic pass that reported any of them
/// ends with a `SemanticError` carrying their count. Warnings are stderr
/// lines from an assembler or linker that still succeeded; `Info` carries
/// the command lines echoed under `-v`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn is_error(&self) -> bool {
        *self == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        *self == Severity::Warning
    }

    fn label(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A diagnostic message from a pipeline stage.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The stage that produced this diagnostic.
    pub stage: String,
    /// The diagnostic message.
    pub message: String,
    /// Optional source location (e.g. "main.cn:3:7").
    pub location: Option<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, stage, message)
    }

    /// Create a new warning diagnostic.
    pub fn warning(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, stage, message)
    }

    /// Create a new info diagnostic.
    pub fn info(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, stage, message)
    }

    fn new(severity: Severity, stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            stage: stage.into(),
            message: message.into(),
            location: None,
        }
    }

    /// Add a location to this diagnostic.
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: ", self.severity)?;
        if let Some(loc) = &self.location {
            write!(f, "{}: ", loc)?;
        }
        write!(f, "{}", self.message)
    }
}

/// Collects and emits diagnostics for one compiler invocation.
pub struct DiagnosticSink {
    program: String,
    diagnostics: Vec<Diagnostic>,
    writer: Box<dyn Write>,
}

impl DiagnosticSink {
    /// A sink that emits to stderr, prefixing lines with `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self::with_writer(program, Box::new(io::stderr()))
    }

    /// A sink that only records diagnostics.
    pub fn silent(program: impl Into<String>) -> Self {
        Self::with_writer(program, Box::new(io::sink()))
    }

    /// A sink that emits to the given writer.
    pub fn with_writer(program: impl Into<String>, writer: Box<dyn Write>) -> Self {
        Self {
            program: program.into(),
            diagnostics: Vec::new(),
            writer,
        }
    }

    /// Name used to prefix emitted lines.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Record and emit a diagnostic.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        // A broken stderr must not turn a diagnostic into a second failure.
        let _ = writeln!(self.writer, "{}: {}", self.program, diagnostic);
        self.diagnostics.push(diagnostic);
    }

    /// Report an error.
    pub fn error(&mut self, stage: &str, message: impl Into<String>) {
        self.report(Diagnostic::error(stage, message));
    }

    /// Report an error at a source location.
    pub fn error_at(&mut self, stage: &str, location: impl Into<String>, message: impl Into<String>) {
        self.report(Diagnostic::error(stage, message).at(location));
    }

    /// Report a warning.
    pub fn warning(&mut self, stage: &str, message: impl Into<String>) {
        self.report(Diagnostic::warning(stage, message));
    }

    /// Report informational output.
    pub fn info(&mut self, stage: &str, message: impl Into<String>) {
        self.report(Diagnostic::info(stage, message));
    }

    /// All diagnostics recorded so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Check if any error diagnostics have been recorded.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity.is_error())
    }

    /// Count the number of error diagnostics.
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity.is_error())
            .count()
    }

    /// Count the number of warning diagnostics.
    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity.is_warning())
            .count()
    }

    /// Get all error diagnostics.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity.is_error())
    }
}

impl std::fmt::Debug for DiagnosticSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticSink")
            .field("program", &self.program)
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Rc<RefCell<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_diagnostic_error() {
        let diag = Diagnostic::error("resolve", "undefined variable: x");
        assert!(diag.severity.is_error());
        assert_eq!(diag.stage, "resolve");
    }

    #[test]
    fn test_diagnostic_with_location() {
        let diag = Diagnostic::warning("typecheck", "unused value").at("main.cn:2:5");
        assert_eq!(diag.location.as_deref(), Some("main.cn:2:5"));
        assert_eq!(diag.to_string(), "warning: main.cn:2:5: unused value");
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(Severity::Error.to_string(), "error");
        assert_eq!(Severity::Warning.to_string(), "warning");
        assert_eq!(Severity::Info.to_string(), "info");
    }

    #[test]
    fn test_sink_counts() {
        let mut sink = DiagnosticSink::silent("cinder");
        sink.error("parse", "unexpected token");
        sink.warning("typecheck", "just a warning");
        sink.info("link", "cc main.o -o main");

        assert!(sink.has_errors());
        assert_eq!(sink.error_count(), 1);
        assert_eq!(sink.warning_count(), 1);
        assert_eq!(sink.diagnostics().len(), 3);
        assert_eq!(sink.errors().count(), 1);
    }

    #[test]
    fn test_sink_emits_prefixed_lines() {
        let captured = Captured::default();
        let mut sink = DiagnosticSink::with_writer("cinder", Box::new(captured.clone()));
        sink.error_at("resolve", "main.cn:3:7", "undefined variable: y");
        sink.error("write", "file not found: out/main.s");

        let text = String::from_utf8(captured.0.borrow().clone()).unwrap();
        assert_eq!(
            text,
            "cinder: error: main.cn:3:7: undefined variable: y\n\
             cinder: error: file not found: out/main.s\n"
        );
    }
}
