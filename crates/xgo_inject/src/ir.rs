//! The slice of the compiler's IR that call injection reads and writes.
//!
//! Only what the rewrite needs is modeled: function signatures, a body as a
//! statement list, call and conversion expressions, and opaque statements
//! standing in for everything else a body may contain.

use serde::{Deserialize, Serialize};
use xgo_common::{Ident, Interner};

use crate::funcs::{FuncId, FuncTable};

/// Source position of a declaration.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct Pos {
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub col: u32,
}

impl Pos {
    /// Position used for compiler-synthesized code.
    pub const AUTOGENERATED: Pos = Pos { line: 1, col: 1 };
}

/// A parameter or result type.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Type {
    /// A named type such as `string` or `*testing.T`.
    Named(Ident),
    /// `uintptr`, the type of a program counter.
    Uintptr,
    /// The empty interface, `interface{}`.
    EmptyInterface,
}

/// A named parameter or result.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Field {
    /// The field name; compiler-assigned for unnamed fields.
    pub name: Ident,
    /// The field type.
    pub ty: Type,
}

/// Parameter and result lists of a function.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Signature {
    /// Parameters, in declaration order.
    pub params: Vec<Field>,
    /// Results, in declaration order.
    pub results: Vec<Field>,
}

/// What a call expression invokes.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Callee {
    /// A function of the runtime package, looked up by name.
    Runtime(Ident),
    /// A function of the package being compiled.
    Local(Ident),
}

/// An expression.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Expr {
    /// A reference to a parameter or local.
    Name(Ident),
    /// A call.
    Call {
        /// The function called.
        callee: Callee,
        /// Arguments, positionally.
        args: Vec<Expr>,
    },
    /// Conversion of a value to `interface{}`.
    ConvIface {
        /// The converted value.
        expr: Box<Expr>,
        /// Static type of the value before boxing.
        from: Type,
    },
}

/// A statement.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Stmt {
    /// An expression evaluated for its effects.
    Expr(Expr),
    /// `return` with zero or more values.
    Return(Vec<Expr>),
    /// A statement the engine does not inspect, kept as its source text.
    Opaque(String),
}

/// A function declaration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Func {
    /// The declared name.
    pub name: Ident,
    /// The signature.
    pub sig: Signature,
    /// The body, `None` for a body-less declaration.
    pub body: Option<Vec<Stmt>>,
    /// Runtime symbol a permitted link bound this declaration to.
    pub binding: Option<Ident>,
    /// Set once the body has been replaced; the rewrite never runs twice.
    pub rewritten: bool,
    /// Declaration position.
    pub pos: Pos,
}

impl Func {
    /// A body-less declaration, the shape of a link request.
    pub fn declaration(name: Ident, sig: Signature, pos: Pos) -> Self {
        Self {
            name,
            sig,
            body: None,
            binding: None,
            rewritten: false,
            pos,
        }
    }

    /// A function with a body.
    pub fn with_body(name: Ident, sig: Signature, body: Vec<Stmt>, pos: Pos) -> Self {
        Self {
            body: Some(body),
            ..Self::declaration(name, sig, pos)
        }
    }
}

/// The functions of one compiled package.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Package {
    /// Import path, e.g. `testing` or `github.com/xhd2015/xgo/runtime/trap`.
    pub path: String,
    /// Function declarations.
    pub funcs: FuncTable,
}

impl Package {
    /// An empty package with the given import path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            funcs: FuncTable::new(),
        }
    }

    /// Adds a function declaration.
    pub fn add(&mut self, func: Func) -> FuncId {
        self.funcs.push(func)
    }
}

impl Expr {
    /// Renders the expression as Go source text.
    pub fn render(&self, interner: &Interner) -> String {
        match self {
            Expr::Name(name) => interner.resolve(*name).to_string(),
            Expr::Call { callee, args } => {
                let callee = match callee {
                    Callee::Runtime(name) => format!("runtime.{}", interner.resolve(*name)),
                    Callee::Local(name) => interner.resolve(*name).to_string(),
                };
                let args: Vec<String> = args.iter().map(|a| a.render(interner)).collect();
                format!("{callee}({})", args.join(", "))
            }
            Expr::ConvIface { expr, .. } => format!("interface{{}}({})", expr.render(interner)),
        }
    }
}

impl Stmt {
    /// Renders the statement as Go source text.
    pub fn render(&self, interner: &Interner) -> String {
        match self {
            Stmt::Expr(expr) => expr.render(interner),
            Stmt::Return(values) if values.is_empty() => "return".to_string(),
            Stmt::Return(values) => {
                let values: Vec<String> = values.iter().map(|v| v.render(interner)).collect();
                format!("return {}", values.join(", "))
            }
            Stmt::Opaque(text) => text.clone(),
        }
    }
}
