//! Re-check of functions after injection.
//!
//! This is where a rejected link becomes loud: a link request that neither
//! got a binding nor a replacement body is reported as missing its body.
//! Other body-less declarations are implemented in assembly or pulled in by
//! `go:linkname` and are left alone. Replacement bodies are checked for calls
//! to runtime symbols that do not exist and for references to names that are
//! not parameters.

use std::collections::HashSet;

use xgo_common::{Ident, Interner};

use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use crate::ir::{Callee, Expr, Func, Stmt};

/// Checks functions of one package against the runtime's symbols.
pub struct Checker<'a> {
    interner: &'a Interner,
    runtime_symbols: &'a HashSet<Ident>,
    link_requests: &'a HashSet<Ident>,
    package: &'a str,
}

impl<'a> Checker<'a> {
    /// A checker for functions of `package`. Only names in `link_requests`
    /// must end up with a body or a binding.
    pub fn new(
        interner: &'a Interner,
        runtime_symbols: &'a HashSet<Ident>,
        link_requests: &'a HashSet<Ident>,
        package: &'a str,
    ) -> Self {
        Self {
            interner,
            runtime_symbols,
            link_requests,
            package,
        }
    }

    /// Checks `func`, returning the number of errors emitted into `sink`.
    pub fn check_func(&self, func: &Func, sink: &DiagnosticSink) -> usize {
        let mut errors = Vec::new();
        match &func.body {
            None if func.binding.is_none() && self.link_requests.contains(&func.name) => {
                errors.push((
                    DiagnosticCode::MISSING_BODY,
                    "missing function body".to_string(),
                ))
            }
            None => {}
            Some(body) => {
                let params: HashSet<Ident> = func.sig.params.iter().map(|p| p.name).collect();
                for stmt in body {
                    match stmt {
                        Stmt::Expr(expr) => self.check_expr(expr, &params, &mut errors),
                        Stmt::Return(values) => {
                            for v in values {
                                self.check_expr(v, &params, &mut errors);
                            }
                        }
                        Stmt::Opaque(_) => {}
                    }
                }
            }
        }

        let name = self.interner.resolve(func.name);
        let count = errors.len();
        for (code, message) in errors {
            sink.emit(Diagnostic::error(code, message, self.package, name, func.pos));
        }
        count
    }

    fn check_expr(
        &self,
        expr: &Expr,
        params: &HashSet<Ident>,
        errors: &mut Vec<(DiagnosticCode, String)>,
    ) {
        match expr {
            Expr::Name(name) => {
                if !params.contains(name) {
                    errors.push((
                        DiagnosticCode::UNDEFINED_NAME,
                        format!("undefined: {}", self.interner.resolve(*name)),
                    ));
                }
            }
            Expr::Call { callee, args } => {
                if let Callee::Runtime(sym) = callee {
                    if !self.runtime_symbols.contains(sym) {
                        errors.push((
                            DiagnosticCode::UNKNOWN_RUNTIME_SYMBOL,
                            format!("undefined: runtime.{}", self.interner.resolve(*sym)),
                        ));
                    }
                }
                for arg in args {
                    self.check_expr(arg, params, errors);
                }
            }
            Expr::ConvIface { expr, .. } => self.check_expr(expr, params, errors),
        }
    }
}
