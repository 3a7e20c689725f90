//! The zipper-like focus the walker traverses (SPEC_FULL.md §4.5/§9).
//!
//! A [`Context`] is cheap to clone (an `Rc` bump plus two integers), so
//! backtracking can snapshot it on every `try` without walking the
//! tree.

use std::rc::Rc;

use crate::atom::Atom;

/// One level of ancestry: the atoms (and our position within them) we
/// left behind when descending into a container, plus the structural
/// tag name of that container (used by `inGrpChoice`/error messages).
#[derive(Clone)]
pub struct ParentFrame {
    pub(crate) atoms: Rc<[Atom]>,
    pub(crate) idx: usize,
    pub(crate) tag: String,
}

/// Current position in the atom tree: the atoms ahead at this level,
/// how far into them we are, and the stack of ancestor levels.
#[derive(Clone)]
pub struct Context {
    pub(crate) atoms: Rc<[Atom]>,
    pub(crate) idx: usize,
    pub(crate) parents: Vec<ParentFrame>,
}

impl Context {
    /// Build a context rooted at `atoms`, with no ancestry.
    pub fn new(atoms: Vec<Atom>) -> Context {
        Context {
            atoms: Rc::from(atoms),
            idx: 0,
            parents: Vec::new(),
        }
    }

    /// The atom immediately ahead, if any remain at this level.
    pub fn peek(&self) -> Option<&Atom> {
        self.atoms.get(self.idx)
    }

    /// `true` if the current level is exhausted (end-of-group).
    pub fn at_eog(&self) -> bool {
        self.idx >= self.atoms.len()
    }

    /// `true` if the current level is exhausted and there is no parent
    /// to return to (end of the whole document).
    pub fn at_eof(&self) -> bool {
        self.at_eog() && self.parents.is_empty()
    }

    /// Nesting depth (0 at the document root).
    pub fn depth(&self) -> usize {
        self.parents.len()
    }
}
