//! The lexer's mutable state: catcode table, macro/environment tables,
//! group stack, conditional stack and push-back buffer.
//!
//! Per the design notes (SPEC_FULL.md §9), this is modelled as a plain
//! object mutated in place rather than threaded through a monad stack —
//! [`crate::lexer::Lexer::next_token`] simply calls into it.

use std::collections::VecDeque;

use crate::catcode::{Catcode, CatcodeTable};
use crate::error::{Error, Result, SourcePos};
use crate::macros::{EnvironmentTable, MacroCommand, MacroEnvironment, MacroKey, MacroTable};
use crate::token::Token;

/// Configurable limits guarding against ill-formed recursive input, per
/// SPEC_FULL.md §5/§10.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexerLimits {
    /// Maximum nesting depth of `{`/`}` groups (and environments, which
    /// also push a group).
    pub max_group_depth: usize,
    /// Maximum nesting depth of macro expansion: how many expansions may
    /// be in flight (an expansion whose body references another macro)
    /// before we consider the input a runaway recursive definition.
    pub max_expansion_depth: usize,
}

impl Default for LexerLimits {
    fn default() -> Self {
        LexerLimits {
            max_group_depth: 256,
            max_expansion_depth: 2_000,
        }
    }
}

/// One level of `{`/`}` (or `\begingroup`/`\endgroup`, or a user
/// environment's implicit group) nesting.
///
/// Rather than snapshotting the whole catcode/macro/environment tables
/// on every group open (which would be correct but wasteful), each scope
/// keeps an undo log of only the bindings it actually shadowed; popping
/// the scope replays the log in reverse.
#[derive(Debug, Default)]
pub struct GroupScope {
    catcode_undo: Vec<(char, Option<Catcode>)>,
    macro_undo: Vec<(MacroKey, Option<MacroCommand>)>,
    env_undo: Vec<(Vec<Token>, Option<MacroEnvironment>)>,
}

/// One level of `\iftrue`/`\iffalse` nesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionalFrame {
    /// Whether we are currently in the branch that should be read
    /// (as opposed to skipped until `\else`/`\fi`).
    pub active: bool,
}

/// The lexer's entire mutable state for one document.
pub struct LexerState {
    pub catcodes: CatcodeTable,
    pub macros: MacroTable,
    pub environments: EnvironmentTable,
    groups: Vec<GroupScope>,
    conditionals: Vec<ConditionalFrame>,
    pushback: VecDeque<Token>,
    pub limits: LexerLimits,
    expansion_depth: usize,
    pub pos: SourcePos,
    pub escape: char,
}

impl LexerState {
    /// Build the state a fresh document starts with: plain TeX
    /// catcodes, the primitive table (see
    /// [`crate::lexer::primitives::install_primitives`]), no
    /// user macros, no open groups.
    pub fn new(limits: LexerLimits) -> LexerState {
        let mut state = LexerState {
            catcodes: CatcodeTable::plain_tex(),
            macros: MacroTable::new(),
            environments: EnvironmentTable::new(),
            groups: Vec::new(),
            conditionals: Vec::new(),
            pushback: VecDeque::new(),
            limits,
            expansion_depth: 0,
            pos: SourcePos::START,
            escape: '\\',
        };
        crate::lexer::primitives::install_primitives(&mut state.macros);
        state
    }

    // -- push-back buffer ---------------------------------------------

    /// Push a single token to the *front* of the push-back buffer, so it
    /// is the very next token returned.
    pub fn push_front(&mut self, tok: Token) {
        self.pushback.push_front(tok);
    }

    /// Splice `tokens` onto the front of the push-back buffer, preserving
    /// their relative order (this is how macro expansion and environment
    /// start/end code are "executed": by enqueuing their body ahead of
    /// whatever was already pending).
    pub fn splice_front(&mut self, tokens: Vec<Token>) {
        for tok in tokens.into_iter().rev() {
            self.pushback.push_front(tok);
        }
    }

    /// Pop the next already-produced token, if any are pending.
    pub fn pop_pushback(&mut self) -> Option<Token> {
        self.pushback.pop_front()
    }

    /// `true` if a re-read is buffered and character input need not be consulted.
    pub fn has_pushback(&self) -> bool {
        !self.pushback.is_empty()
    }

    // -- group scoping --------------------------------------------------

    /// Open a new group scope. Corresponds to a `{`/`\begingroup`/`\begin{env}`.
    pub fn push_group(&mut self) -> Result<()> {
        if self.groups.len() >= self.limits.max_group_depth {
            return Err(Error::UnterminatedGroup(self.pos));
        }
        self.groups.push(GroupScope::default());
        Ok(())
    }

    /// Close the innermost group scope, restoring every catcode, macro
    /// and environment binding it shadowed. Fails if no group is open.
    pub fn pop_group(&mut self) -> Result<()> {
        let mut scope = self.groups.pop().ok_or(Error::UnterminatedGroup(self.pos))?;
        for (key, prior) in scope.macro_undo.drain(..).rev() {
            match prior {
                Some(cmd) => {
                    self.macros.insert(key, cmd);
                }
                None => {
                    self.macros.remove(&key);
                }
            }
        }
        for (name, prior) in scope.env_undo.drain(..).rev() {
            match prior {
                Some(env) => {
                    self.environments.insert(name, env);
                }
                None => {
                    self.environments.remove(&name);
                }
            }
        }
        for (c, prior) in scope.catcode_undo.drain(..).rev() {
            self.catcodes.restore(c, prior);
        }
        Ok(())
    }

    /// Depth of currently-open groups.
    pub fn group_depth(&self) -> usize {
        self.groups.len()
    }

    /// Assign `cat` to `c`, recording the prior value in the innermost
    /// open group's undo log (if any group is open; at top level the
    /// change is permanent).
    pub fn set_catcode(&mut self, c: char, cat: Catcode) {
        if let Some(scope) = self.groups.last_mut() {
            if !scope.catcode_undo.iter().any(|(k, _)| *k == c) {
                scope.catcode_undo.push((c, self.catcodes.raw(c)));
            }
        }
        self.catcodes.set_catcode(c, cat);
    }

    /// Bind `key` to `cmd`, recording the prior binding in the innermost
    /// open group's undo log.
    pub fn define_macro(&mut self, key: MacroKey, cmd: MacroCommand) {
        if let Some(scope) = self.groups.last_mut() {
            if !scope.macro_undo.iter().any(|(k, _)| *k == key) {
                scope.macro_undo.push((key.clone(), self.macros.get(&key).cloned()));
            }
        }
        self.macros.insert(key, cmd);
    }

    /// Bind an environment name to its definition, scoped like macros.
    pub fn define_environment(&mut self, name: Vec<Token>, env: MacroEnvironment) {
        if let Some(scope) = self.groups.last_mut() {
            if !scope.env_undo.iter().any(|(k, _)| *k == name) {
                scope
                    .env_undo
                    .push((name.clone(), self.environments.get(&name).cloned()));
            }
        }
        self.environments.insert(name, env);
    }

    // -- conditionals -----------------------------------------------------

    /// Push a new `\if...` frame.
    pub fn push_conditional(&mut self, active: bool) {
        self.conditionals.push(ConditionalFrame { active });
    }

    /// Flip the innermost conditional frame's active branch (`\else`).
    pub fn flip_conditional(&mut self) -> Result<bool> {
        let frame = self
            .conditionals
            .last_mut()
            .ok_or(Error::ConditionalImbalance(self.pos))?;
        frame.active = !frame.active;
        Ok(frame.active)
    }

    /// Pop the innermost conditional frame (`\fi`).
    pub fn pop_conditional(&mut self) -> Result<()> {
        self.conditionals
            .pop()
            .map(|_| ())
            .ok_or(Error::ConditionalImbalance(self.pos))
    }

    /// Depth of currently-open conditionals.
    pub fn conditional_depth(&self) -> usize {
        self.conditionals.len()
    }

    // -- recursion guard --------------------------------------------------

    /// Enter one level of macro expansion, failing if the configured
    /// depth limit is exceeded.
    pub fn enter_expansion(&mut self) -> Result<()> {
        if self.expansion_depth >= self.limits.max_expansion_depth {
            return Err(Error::RecursionLimitExceeded(
                self.pos,
                self.limits.max_expansion_depth,
            ));
        }
        self.expansion_depth += 1;
        Ok(())
    }

    /// Leave one level of macro expansion.
    pub fn leave_expansion(&mut self) {
        self.expansion_depth = self.expansion_depth.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catcode_change_is_scoped_to_group() {
        let mut state = LexerState::new(LexerLimits::default());
        assert_eq!(state.catcodes.catcode_of('@'), Catcode::Other);
        state.push_group().unwrap();
        state.set_catcode('@', Catcode::Letter);
        assert_eq!(state.catcodes.catcode_of('@'), Catcode::Letter);
        state.pop_group().unwrap();
        assert_eq!(state.catcodes.catcode_of('@'), Catcode::Other);
    }

    #[test]
    fn macro_definition_is_scoped_to_group() {
        let mut state = LexerState::new(LexerLimits::default());
        state.push_group().unwrap();
        state.define_macro(
            ("foo".to_string(), false),
            MacroCommand::UserMacro {
                name: "foo".to_string(),
                active: false,
                args: vec![],
                body: vec![],
            },
        );
        assert!(state.macros.contains_key(&("foo".to_string(), false)));
        state.pop_group().unwrap();
        assert!(!state.macros.contains_key(&("foo".to_string(), false)));
    }

    #[test]
    fn pop_group_without_push_is_an_error() {
        let mut state = LexerState::new(LexerLimits::default());
        assert!(state.pop_group().is_err());
    }

    #[test]
    fn conditional_stack_imbalance_errors() {
        let mut state = LexerState::new(LexerLimits::default());
        assert!(state.pop_conditional().is_err());
        assert!(state.flip_conditional().is_err());
    }

    #[test]
    fn recursion_guard_trips_past_limit() {
        let mut state = LexerState::new(LexerLimits {
            max_group_depth: 10,
            max_expansion_depth: 2,
        });
        state.enter_expansion().unwrap();
        state.enter_expansion().unwrap();
        assert!(state.enter_expansion().is_err());
    }
}
