//! Interned Go symbol names for the injection engine's IR.

use lasso::ThreadedRodeo;
use serde::{Deserialize, Serialize};

/// An interned Go identifier: a function, parameter or runtime symbol name.
///
/// Resolve it back to text through the [`Interner`] that produced it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Ident(u32);

// SAFETY: `try_from_usize` only accepts indices that fit in the wrapped u32,
// and `into_usize` returns exactly that index.
unsafe impl lasso::Key for Ident {
    fn into_usize(self) -> usize {
        self.0 as usize
    }

    fn try_from_usize(int: usize) -> Option<Self> {
        u32::try_from(int).ok().map(Ident)
    }
}

/// Symbol table of one compilation unit, shareable across threads.
pub struct Interner {
    rodeo: ThreadedRodeo<Ident>,
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl Interner {
    /// An empty table.
    pub fn new() -> Self {
        Self {
            rodeo: ThreadedRodeo::new(),
        }
    }

    /// The identifier for `name`, interning it on first use.
    pub fn intern(&self, name: &str) -> Ident {
        self.rodeo.get_or_intern(name)
    }

    /// The identifier for `name` if it was interned before.
    pub fn lookup(&self, name: &str) -> Option<Ident> {
        self.rodeo.get(name)
    }

    /// The text of `ident`.
    ///
    /// # Panics
    ///
    /// Panics if `ident` came from a different interner.
    pub fn resolve(&self, ident: Ident) -> &str {
        self.rodeo.resolve(&ident)
    }
}
