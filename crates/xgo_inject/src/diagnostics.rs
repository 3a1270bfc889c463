//! Diagnostics from re-checking rewritten packages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::ir::Pos;

/// Severity of a diagnostic.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Severity {
    /// Compilation cannot succeed.
    Error,
    /// Informational.
    Warning,
}

/// Numbered diagnostic code, displayed as `E001`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode(pub u16);

impl DiagnosticCode {
    /// A body-less function with no resolved link.
    pub const MISSING_BODY: Self = Self(1);
    /// A call to a runtime symbol that does not exist.
    pub const UNKNOWN_RUNTIME_SYMBOL: Self = Self(2);
    /// A reference to a name that is not a parameter.
    pub const UNDEFINED_NAME: Self = Self(3);
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:03}", self.0)
    }
}

/// One diagnostic, located at a function of a package.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity.
    pub severity: Severity,
    /// Code.
    pub code: DiagnosticCode,
    /// Message text.
    pub message: String,
    /// Import path of the package.
    pub package: String,
    /// Name of the function.
    pub func: String,
    /// Position of the function.
    pub pos: Pos,
}

impl Diagnostic {
    /// Creates an error diagnostic.
    pub fn error(
        code: DiagnosticCode,
        message: impl Into<String>,
        package: impl Into<String>,
        func: impl Into<String>,
        pos: Pos,
    ) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            package: package.into(),
            func: func.into(),
            pos,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {} [{}] in {}",
            self.package, self.pos.line, self.pos.col, self.message, self.code, self.func
        )
    }
}

/// Thread-safe diagnostic accumulator.
///
/// The error count is tracked atomically so `has_errors` never locks.
pub struct DiagnosticSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
    error_count: AtomicUsize,
}

impl DiagnosticSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self {
            diagnostics: Mutex::new(Vec::new()),
            error_count: AtomicUsize::new(0),
        }
    }

    /// Records a diagnostic.
    pub fn emit(&self, diag: Diagnostic) {
        if diag.severity == Severity::Error {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        self.lock().push(diag);
    }

    /// Returns `true` if any error was emitted.
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Number of errors emitted so far.
    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Takes all diagnostics, leaving the sink empty.
    pub fn take_all(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.lock())
    }

    /// A copy of all diagnostics.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Diagnostic>> {
        // a panicking emitter cannot leave the vector half-updated
        self.diagnostics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_error() -> Diagnostic {
        Diagnostic::error(
            DiagnosticCode::MISSING_BODY,
            "missing function body",
            "example.com/app",
            "__xgo_link_getcurg",
            Pos { line: 3, col: 6 },
        )
    }

    #[test]
    fn code_display() {
        assert_eq!(DiagnosticCode::MISSING_BODY.to_string(), "E001");
        assert_eq!(DiagnosticCode::UNDEFINED_NAME.to_string(), "E003");
    }

    #[test]
    fn diagnostic_display() {
        assert_eq!(
            make_error().to_string(),
            "example.com/app:3:6: missing function body [E001] in __xgo_link_getcurg"
        );
    }

    #[test]
    fn take_all_drains() {
        let sink = DiagnosticSink::new();
        sink.emit(make_error());
        sink.emit(make_error());
        assert_eq!(sink.error_count(), 2);
        assert_eq!(sink.take_all().len(), 2);
        assert!(sink.take_all().is_empty());
        assert!(sink.has_errors());
    }

    #[test]
    fn thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let sink = Arc::new(DiagnosticSink::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for _ in 0..50 {
                        sink.emit(make_error());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(sink.error_count(), 400);
        assert_eq!(sink.diagnostics().len(), 400);
    }
}
