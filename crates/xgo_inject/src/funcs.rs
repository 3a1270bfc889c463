//! Declaration-ordered storage for the functions of a package.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

use crate::ir::Func;

/// Position of a function declaration in its [`Package`](crate::ir::Package).
///
/// Handed out by [`FuncTable::push`] and valid for as long as the table
/// lives; functions are never removed.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct FuncId(u32);

impl FuncId {
    /// Declaration index of this function.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Function declarations in source order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FuncTable {
    funcs: Vec<Func>,
}

impl FuncTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a declaration.
    pub fn push(&mut self, func: Func) -> FuncId {
        let id = FuncId(self.funcs.len() as u32);
        self.funcs.push(func);
        id
    }

    /// The declaration at `id`, if any.
    pub fn get(&self, id: FuncId) -> Option<&Func> {
        self.funcs.get(id.index())
    }

    /// The declaration at `id` for rewriting, if any.
    pub fn get_mut(&mut self, id: FuncId) -> Option<&mut Func> {
        self.funcs.get_mut(id.index())
    }

    /// Number of declarations.
    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    /// Whether the package declares no functions.
    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    /// Declarations in source order.
    pub fn iter(&self) -> impl Iterator<Item = (FuncId, &Func)> {
        self.funcs
            .iter()
            .enumerate()
            .map(|(i, func)| (FuncId(i as u32), func))
    }

    /// Declarations in source order, for rewriting.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (FuncId, &mut Func)> {
        self.funcs
            .iter_mut()
            .enumerate()
            .map(|(i, func)| (FuncId(i as u32), func))
    }
}

impl Index<FuncId> for FuncTable {
    type Output = Func;

    fn index(&self, id: FuncId) -> &Func {
        &self.funcs[id.index()]
    }
}

impl IndexMut<FuncId> for FuncTable {
    fn index_mut(&mut self, id: FuncId) -> &mut Func {
        &mut self.funcs[id.index()]
    }
}
