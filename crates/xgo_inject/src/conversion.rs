//! Version-dependent argument passing for the test-start hook.

use xgo_common::GoVersion;

use crate::ir::{Expr, Type};

/// How parameters are passed to the runtime's test-start hook.
///
/// From go1.20 the runtime side of that hook takes `interface{}` values, so
/// every argument is boxed first. Older toolchains pass them through as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgConversion {
    /// Arguments are passed unchanged.
    Direct,
    /// Arguments are converted to `interface{}`.
    BoxToInterface,
}

impl ArgConversion {
    /// Picks the strategy for a toolchain version.
    pub fn for_version(version: GoVersion) -> Self {
        if version.at_least(1, 20) {
            Self::BoxToInterface
        } else {
            Self::Direct
        }
    }

    /// Converts one argument of static type `ty`.
    pub fn apply(self, arg: Expr, ty: &Type) -> Expr {
        match self {
            Self::Direct => arg,
            Self::BoxToInterface => Expr::ConvIface {
                expr: Box::new(arg),
                from: ty.clone(),
            },
        }
    }
}
