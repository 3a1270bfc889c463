//! Call injection for the patched compiler.
//!
//! The engine runs once per compiled package. For every body-less function
//! whose name is one of the magic `__xgo_link_*` identifiers it asks the
//! [`LinkPolicy`] whether the declaring package may use that link. Permitted
//! links either bind the declaration to its runtime target or, for the two
//! [`HookPoint`]s, replace the body with a call into the runtime hook.
//! Functions are re-checked afterwards; a rejected link surfaces there as a
//! missing-body error.

#![warn(missing_docs)]

pub mod conversion;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod funcs;
pub mod ir;
pub mod link;
pub mod records;
pub mod rewrite;
pub mod typecheck;

pub use conversion::ArgConversion;
pub use diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink, Severity};
pub use engine::{FuncOutcome, InjectionEngine, PackageReport};
pub use error::InjectError;
pub use funcs::{FuncId, FuncTable};
pub use ir::{Callee, Expr, Field, Func, Package, Pos, Signature, Stmt, Type};
pub use link::{LinkPaths, LinkPolicy, LinkRequest, LinkTable, PackageMatch, Rule, Verdict};
pub use records::{RewriteRecord, RewriteRecords};
pub use rewrite::{HookPoint, RuntimeCallRewrite};
pub use typecheck::Checker;
