//! Backtracking parser combinators over an atom tree (SPEC_FULL.md §4.5).
//!
//! A [`Walker`] threads a [`Context`] zipper together with caller-owned
//! user state (document meta, for the reader in [`crate::document`]).
//! Every combinator that can fail restores *both* on failure — see
//! [`Walker::attempt`].

pub mod context;

use std::rc::Rc;

use crate::atom::{Arg, Atom, MathType};
use context::{Context, ParentFrame};

/// Why a parser failed. These are ordinary backtracking signals, not
/// fatal errors — see SPEC_FULL.md §7 tier 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkError {
    /// The current level ran out of atoms.
    EndOfGroup,
    /// A predicate rejected the atom actually found.
    Unexpected(Atom),
    /// A semantic check inside a parser failed for a domain reason.
    UserError(String),
}

/// Result type for every walker parser.
pub type WResult<T> = Result<T, WalkError>;

/// The walker: atom-tree zipper plus threaded user state `S`.
pub struct Walker<S> {
    pub ctx: Context,
    pub state: S,
}

impl<S: Clone> Walker<S> {
    /// Start walking `atoms` with initial user state `state`.
    pub fn new(atoms: Vec<Atom>, state: S) -> Walker<S> {
        Walker {
            ctx: Context::new(atoms),
            state,
        }
    }

    /// Run `f`; on failure, restore both context and state to their
    /// pre-attempt values (SPEC_FULL.md §4.5: "a failing alternative
    /// restores focus *and* user state").
    pub fn attempt<T>(&mut self, f: impl FnOnce(&mut Self) -> WResult<T>) -> WResult<T> {
        let ctx = self.ctx.clone();
        let state = self.state.clone();
        match f(self) {
            Ok(v) => Ok(v),
            Err(e) => {
                self.ctx = ctx;
                self.state = state;
                Err(e)
            }
        }
    }

    // -- primitives -------------------------------------------------------

    /// Consume one atom from the focus; fails with `EndOfGroup` if empty.
    pub fn item(&mut self) -> WResult<Atom> {
        match self.ctx.peek().cloned() {
            Some(atom) => {
                self.ctx.idx += 1;
                Ok(atom)
            }
            None => Err(WalkError::EndOfGroup),
        }
    }

    /// Check the next atom without consuming it.
    pub fn peek(&self, p: impl Fn(&Atom) -> bool) -> bool {
        self.ctx.peek().map(p).unwrap_or(false)
    }

    /// Consume the next atom only if `p` accepts it.
    pub fn satisfy(&mut self, p: impl Fn(&Atom) -> bool) -> WResult<Atom> {
        match self.ctx.peek() {
            Some(atom) if p(atom) => self.item(),
            Some(atom) => Err(WalkError::Unexpected(atom.clone())),
            None => Err(WalkError::EndOfGroup),
        }
    }

    /// `true` when the current level has no atoms left.
    pub fn eog(&self) -> bool {
        self.ctx.at_eog()
    }

    /// `true` when the whole document has been consumed.
    pub fn eof(&self) -> bool {
        self.ctx.at_eof()
    }

    /// Descend into the container atom immediately ahead (`Group`,
    /// `MathGroup`, `SupScript`, `SubScript`); fails if the head is not
    /// one of those or the level is exhausted. Consumes the container
    /// from the parent level so `goUp` resumes just past it.
    pub fn go_down(&mut self) -> WResult<()> {
        let (body, tag) = match self.ctx.peek() {
            Some(Atom::Group(name, _, body)) => (body.clone(), name.clone()),
            Some(Atom::MathGroup(t, body)) => {
                (body.clone(), if *t == MathType::Inline { "$".to_string() } else { "$$".to_string() })
            }
            Some(Atom::SupScript(body)) => (body.clone(), "^".to_string()),
            Some(Atom::SubScript(body)) => (body.clone(), "_".to_string()),
            Some(other) => return Err(WalkError::Unexpected(other.clone())),
            None => return Err(WalkError::EndOfGroup),
        };
        let parent = ParentFrame {
            atoms: Rc::clone(&self.ctx.atoms),
            idx: self.ctx.idx + 1,
            tag,
        };
        self.ctx.parents.push(parent);
        self.ctx.atoms = Rc::from(body);
        self.ctx.idx = 0;
        Ok(())
    }

    /// Return to the parent context, discarding anything left at the
    /// current level.
    pub fn go_up(&mut self) -> WResult<()> {
        let parent = self.ctx.parents.pop().ok_or(WalkError::EndOfGroup)?;
        self.ctx.atoms = parent.atoms;
        self.ctx.idx = parent.idx;
        Ok(())
    }

    /// Like [`Walker::go_up`] but requires the current level to be fully
    /// consumed first.
    pub fn safe_up(&mut self) -> WResult<()> {
        if !self.eog() {
            return Err(WalkError::Unexpected(self.ctx.peek().cloned().unwrap()));
        }
        self.go_up()
    }

    // -- command/group combinators -----------------------------------------

    /// Match a `Command` atom by name, giving `f` its argument list.
    pub fn in_cmd<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self, &[Arg]) -> WResult<T>,
    ) -> WResult<T> {
        self.attempt(|w| {
            let atom = w.item()?;
            match atom {
                Atom::Command(n, args) if n == name => f(w, &args),
                other => Err(WalkError::Unexpected(other)),
            }
        })
    }

    /// Run `p` fully over the body of a command's `n`th argument
    /// (0-indexed, counting both mandatory and optional slots in order),
    /// requiring `p` to consume that body exhaustively.
    pub fn in_cmd_arg<T>(
        &mut self,
        args: &[Arg],
        n: usize,
        p: impl FnOnce(&mut Walker<S>) -> WResult<T>,
    ) -> WResult<T> {
        let body = args.get(n).map(Arg::body).unwrap_or(&[]).to_vec();
        let mut sub = Walker::new(body, self.state.clone());
        let result = p(&mut sub)?;
        if !sub.eof() {
            return Err(WalkError::Unexpected(sub.ctx.peek().cloned().unwrap()));
        }
        self.state = sub.state;
        Ok(result)
    }

    /// Match a named `Group` atom, descending into its body for `f`,
    /// then requiring `f` to exhaust it and ascending back out.
    pub fn in_grp<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> WResult<T>,
    ) -> WResult<T> {
        self.attempt(|w| {
            match w.ctx.peek() {
                Some(Atom::Group(n, ..)) if n == name => {}
                Some(other) => return Err(WalkError::Unexpected(other.clone())),
                None => return Err(WalkError::EndOfGroup),
            }
            w.go_down()?;
            let result = f(w)?;
            w.safe_up()?;
            Ok(result)
        })
    }

    /// Like [`Walker::in_grp`] but accepts any of `names`, returning
    /// which one matched alongside the result.
    pub fn in_grp_choice<T>(
        &mut self,
        names: &[&str],
        mut f: impl FnMut(&mut Self, &str) -> WResult<T>,
    ) -> WResult<T> {
        for name in names {
            if let Ok(v) = self.attempt(|w| {
                match w.ctx.peek() {
                    Some(Atom::Group(n, ..)) if n == *name => {}
                    Some(other) => return Err(WalkError::Unexpected(other.clone())),
                    None => return Err(WalkError::EndOfGroup),
                }
                w.go_down()?;
                let result = f(w, name)?;
                w.safe_up()?;
                Ok(result)
            }) {
                return Ok(v);
            }
        }
        Err(match self.ctx.peek() {
            Some(a) => WalkError::Unexpected(a.clone()),
            None => WalkError::EndOfGroup,
        })
    }

    /// Descend into the next atom if it is a `MathGroup`.
    pub fn in_math_grp<T>(
        &mut self,
        f: impl FnOnce(&mut Self, MathType) -> WResult<T>,
    ) -> WResult<T> {
        self.attempt(|w| {
            let math_type = match w.ctx.peek() {
                Some(Atom::MathGroup(t, _)) => *t,
                Some(other) => return Err(WalkError::Unexpected(other.clone())),
                None => return Err(WalkError::EndOfGroup),
            };
            w.go_down()?;
            let result = f(w, math_type)?;
            w.safe_up()?;
            Ok(result)
        })
    }

    /// Descend into the next atom if it is a `SubScript`.
    pub fn in_sub_script<T>(&mut self, f: impl FnOnce(&mut Self) -> WResult<T>) -> WResult<T> {
        self.attempt(|w| {
            match w.ctx.peek() {
                Some(Atom::SubScript(_)) => {}
                Some(other) => return Err(WalkError::Unexpected(other.clone())),
                None => return Err(WalkError::EndOfGroup),
            }
            w.go_down()?;
            let result = f(w)?;
            w.safe_up()?;
            Ok(result)
        })
    }

    /// Descend into the next atom if it is a `SupScript`.
    pub fn in_sup_script<T>(&mut self, f: impl FnOnce(&mut Self) -> WResult<T>) -> WResult<T> {
        self.attempt(|w| {
            match w.ctx.peek() {
                Some(Atom::SupScript(_)) => {}
                Some(other) => return Err(WalkError::Unexpected(other.clone())),
                None => return Err(WalkError::EndOfGroup),
            }
            w.go_down()?;
            let result = f(w)?;
            w.safe_up()?;
            Ok(result)
        })
    }

    /// Try `p` at the current level; on failure, descend into the next
    /// container and retry inside it (used for forms that may or may
    /// not be wrapped in a `\centering`/`center` group, e.g. figures).
    pub fn opt_nested<T>(&mut self, mut p: impl FnMut(&mut Self) -> WResult<T>) -> WResult<T> {
        if let Ok(v) = self.attempt(|w| p(w)) {
            return Ok(v);
        }
        self.attempt(|w| {
            w.go_down()?;
            let result = p(w)?;
            w.go_up()?;
            Ok(result)
        })
    }

    // -- generic combinators ------------------------------------------------

    /// Try each parser in `choices` in order, returning the first success.
    pub fn choice<T>(&mut self, choices: &mut [&mut dyn FnMut(&mut Self) -> WResult<T>]) -> WResult<T> {
        let mut last_err = WalkError::EndOfGroup;
        for f in choices.iter_mut() {
            match self.attempt(|w| f(w)) {
                Ok(v) => return Ok(v),
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    /// Run `p` exactly `n` times, failing if any attempt fails.
    pub fn count<T>(&mut self, n: usize, mut p: impl FnMut(&mut Self) -> WResult<T>) -> WResult<Vec<T>> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(p(self)?);
        }
        Ok(out)
    }

    /// Run `p` as many times as it succeeds (zero or more), stopping on
    /// the first failure without propagating it.
    pub fn many<T>(&mut self, mut p: impl FnMut(&mut Self) -> WResult<T>) -> Vec<T> {
        let mut out = Vec::new();
        while let Ok(v) = self.attempt(|w| p(w)) {
            out.push(v);
        }
        out
    }

    /// `p` separated by `sep`, requiring at least one `p`.
    pub fn sep_by<T, U>(
        &mut self,
        mut p: impl FnMut(&mut Self) -> WResult<T>,
        mut sep: impl FnMut(&mut Self) -> WResult<U>,
    ) -> WResult<Vec<T>> {
        let mut out = vec![p(self)?];
        while self.attempt(|w| sep(w)).is_ok() {
            out.push(p(self)?);
        }
        Ok(out)
    }

    /// Like [`Walker::sep_by`], tolerating (and discarding) a trailing
    /// separator with nothing after it.
    pub fn sep_end_by<T, U>(
        &mut self,
        mut p: impl FnMut(&mut Self) -> WResult<T>,
        mut sep: impl FnMut(&mut Self) -> WResult<U>,
    ) -> WResult<Vec<T>> {
        let mut out = Vec::new();
        loop {
            match self.attempt(|w| p(w)) {
                Ok(v) => out.push(v),
                Err(_) => break,
            }
            if self.attempt(|w| sep(w)).is_err() {
                break;
            }
        }
        Ok(out)
    }

    /// Repeatedly match `bullet` then run `p`, collecting each result —
    /// the shape of `\item`-delimited list parsing.
    pub fn list<B, T>(
        &mut self,
        mut bullet: impl FnMut(&mut Self) -> WResult<B>,
        mut p: impl FnMut(&mut Self) -> WResult<T>,
    ) -> Vec<T> {
        let mut out = Vec::new();
        while self.attempt(|w| bullet(w)).is_ok() {
            if let Ok(v) = p(self) {
                out.push(v);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default, PartialEq, Debug)]
    struct Counter(u32);

    #[test]
    fn item_consumes_in_order() {
        let mut w = Walker::new(
            vec![Atom::Plain("a".into()), Atom::Plain("b".into())],
            Counter::default(),
        );
        assert_eq!(w.item(), Ok(Atom::Plain("a".into())));
        assert_eq!(w.item(), Ok(Atom::Plain("b".into())));
        assert_eq!(w.item(), Err(WalkError::EndOfGroup));
    }

    #[test]
    fn attempt_restores_context_and_state_on_failure() {
        let mut w = Walker::new(vec![Atom::Plain("a".into())], Counter(0));
        let result: WResult<()> = w.attempt(|w| {
            w.item()?;
            w.state.0 = 42;
            Err(WalkError::UserError("nope".into()))
        });
        assert!(result.is_err());
        assert_eq!(w.state, Counter(0));
        assert_eq!(w.item(), Ok(Atom::Plain("a".into())));
    }

    #[test]
    fn go_down_and_safe_up_round_trip() {
        let mut w = Walker::new(
            vec![Atom::Group("foo".into(), vec![], vec![Atom::Plain("x".into())])],
            Counter::default(),
        );
        w.go_down().unwrap();
        assert_eq!(w.item(), Ok(Atom::Plain("x".into())));
        w.safe_up().unwrap();
        assert!(w.eof());
    }

    #[test]
    fn in_cmd_matches_by_name() {
        let mut w = Walker::new(
            vec![Atom::Command("section".into(), vec![Arg::Obligatory(vec![Atom::Plain("Hi".into())])])],
            Counter::default(),
        );
        let title = w
            .in_cmd("section", |_, args| Ok(args[0].body().to_vec()))
            .unwrap();
        assert_eq!(title, vec![Atom::Plain("Hi".into())]);
    }

    #[test]
    fn many_collects_zero_or_more() {
        let mut w = Walker::new(
            vec![Atom::Plain("a".into()), Atom::Plain("b".into())],
            Counter::default(),
        );
        let all = w.many(|w| w.satisfy(|a| matches!(a, Atom::Plain(_))));
        assert_eq!(all.len(), 2);
        assert!(w.eof());
    }
}
