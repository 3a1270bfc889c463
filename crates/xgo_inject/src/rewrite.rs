//! Body replacement for hook points.
//!
//! A hook point's body is replaced by a single call into its runtime target
//! that forwards the parameters positionally:
//!
//! ```text
//! func __xgo_link_trap_for_generated(pkg string, pc uintptr, ...) bool {
//!     return runtime.__xgo_trap_for_generated(pkg, runtime.getcallerpc(), ...)
//! }
//! ```
//!
//! The call is returned when the function has results and is a bare
//! statement otherwise.

use xgo_common::{Ident, Interner};

use crate::conversion::ArgConversion;
use crate::error::InjectError;
use crate::ir::{Callee, Expr, Func, Stmt};
use crate::link::{ON_TEST_START, TRAP_FOR_GENERATED};

/// Runtime function returning the caller's program counter.
pub const GET_CALLER_PC: &str = "getcallerpc";

/// The declarations whose bodies are replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    /// `testing`'s test-start notification; arguments may need boxing.
    OnTestStart,
    /// The generic trap for generated code; parameter 1 carries the
    /// caller's PC.
    TrapForGenerated,
}

impl HookPoint {
    /// The hook point declared under `requester`, if any.
    pub fn from_requester(requester: &str) -> Option<Self> {
        match requester {
            ON_TEST_START => Some(Self::OnTestStart),
            TRAP_FOR_GENERATED => Some(Self::TrapForGenerated),
            _ => None,
        }
    }

    /// The magic identifier declaring this hook point.
    pub fn requester(self) -> &'static str {
        match self {
            Self::OnTestStart => ON_TEST_START,
            Self::TrapForGenerated => TRAP_FOR_GENERATED,
        }
    }
}

/// Replaces a hook point's body with a call to `target`.
pub struct RuntimeCallRewrite {
    /// Which hook point is rewritten.
    pub hook: HookPoint,
    /// The runtime function called.
    pub target: Ident,
    /// Argument passing for [`HookPoint::OnTestStart`].
    pub conversion: ArgConversion,
    /// Interned [`GET_CALLER_PC`].
    pub caller_pc: Ident,
}

impl RuntimeCallRewrite {
    /// Builds and installs the replacement body, marking `func` rewritten.
    ///
    /// Returns the installed body, or `None` if `func` was already
    /// rewritten. The previous body is dropped before the new one is built.
    pub fn apply(&self, func: &mut Func, interner: &Interner) -> Result<Option<Vec<Stmt>>, InjectError> {
        if func.rewritten {
            return Ok(None);
        }

        let params = &func.sig.params;
        let mut args: Vec<Expr> = match self.hook {
            HookPoint::OnTestStart => params
                .iter()
                .map(|p| self.conversion.apply(Expr::Name(p.name), &p.ty))
                .collect(),
            HookPoint::TrapForGenerated => params.iter().map(|p| Expr::Name(p.name)).collect(),
        };
        if self.hook == HookPoint::TrapForGenerated {
            let Some(slot) = args.get_mut(1) else {
                return Err(InjectError::MissingPcSlot {
                    func: interner.resolve(func.name).to_string(),
                    found: params.len(),
                });
            };
            *slot = Expr::Call {
                callee: Callee::Runtime(self.caller_pc),
                args: Vec::new(),
            };
        }

        let call = Expr::Call {
            callee: Callee::Runtime(self.target),
            args,
        };
        let stmt = if func.sig.results.is_empty() {
            Stmt::Expr(call)
        } else {
            Stmt::Return(vec![call])
        };

        drop(func.body.take());
        let body = vec![stmt];
        func.body = Some(body.clone());
        func.rewritten = true;
        Ok(Some(body))
    }
}
