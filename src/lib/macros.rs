//! Macro commands, environments and argument specifications.
//!
//! These types are the complete contract between `\def`/`\newcommand`
//! definitions (and the xparse family) and the call sites the lexer
//! parses arguments against. None of this executes anything by itself —
//! see [`crate::lexer::primitives`] for the interpreter that builds and
//! consults these tables.

use std::collections::HashMap;

use crate::catcode::Catcode;
use crate::token::Token;

/// One argument slot in a macro or environment's argument specification.
///
/// Ordering in a `Vec<ArgSpec>` matters: arguments are parsed in that
/// order against the call-site token stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgSpec {
    /// A braced group or a single token (`\def\foo#1{...}`, xparse `m`).
    Mandatory,
    /// Read tokens until the delimiting sequence is seen (xparse `u{...}`).
    Until(Vec<Token>),
    /// Read tokens until one of the given catcode is seen.
    UntilCatcode(Catcode),
    /// Read a balanced run between two delimiter tokens; if no default is
    /// given and the argument is absent, parsing fails.
    Delimited(Token, Token, Option<Vec<Token>>),
    /// `[...]`-style optional group with an explicit open/close pair and
    /// optional default value substituted when the group is absent.
    OptionalGroup(Token, Token, Option<Vec<Token>>),
    /// Like [`ArgSpec::OptionalGroup`], but the opening delimiter is
    /// identified by catcode (e.g. any `Bgroup`-catcode char) rather than
    /// a fixed token.
    OptionalGroupByCatcode,
    /// `\IfBooleanTF`-style star/flag argument: presence of `tok` yields
    /// a boolean marker rather than consuming content.
    OptionalToken(Token),
    /// Require and consume exactly this token, contributing nothing to
    /// the macro's argument list.
    LiteralToken(Token),
}

/// The result of parsing one [`ArgSpec`] slot against the call-site
/// stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    /// A token list captured for a content-bearing argument.
    Tokens(Vec<Token>),
    /// The sentinel produced by [`ArgSpec::OptionalToken`]: present/absent.
    Boolean(bool),
    /// The xparse "no value supplied" sentinel, substituted when an
    /// optional argument with no default is omitted at the call site.
    NoValue,
}

impl ArgValue {
    /// Convenience accessor for content-bearing arguments; panics if
    /// called on a [`ArgValue::Boolean`] or [`ArgValue::NoValue`], which
    /// the caller should have already distinguished via the `ArgSpec`.
    pub fn tokens(&self) -> &[Token] {
        match self {
            ArgValue::Tokens(t) => t,
            ArgValue::Boolean(_) | ArgValue::NoValue => &[],
        }
    }
}

/// Definition mode of a `\newcommand`-family primitive, governing clash
/// behaviour when the name is already (or not yet) bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionMode {
    /// `\newcommand`/`\newenvironment`/`\NewDocumentCommand`: error if
    /// already defined.
    New,
    /// `\renewcommand`/`\renewenvironment`/`\RenewDocumentCommand`: error
    /// if not already defined.
    Renew,
    /// `\providecommand`/`\ProvideDocumentCommand`: silently skip if
    /// already defined.
    Provide,
    /// `\DeclareRobustCommand`/`\DeclareDocumentCommand`: define
    /// unconditionally, clobbering any previous binding.
    Declare,
}

/// A user-defined macro, a built-in primitive, or a `\let`-style alias
/// to a single implicit character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroCommand {
    /// `\def`/`\newcommand`-defined macro.
    UserMacro {
        /// Control sequence name (without the escape character), or the
        /// single active character if `active` is set.
        name: String,
        /// Whether this binding is for an active character.
        active: bool,
        /// Ordered argument specification consulted at call sites.
        args: Vec<ArgSpec>,
        /// Body token list, with `Param` tokens marking substitution
        /// points (see [`crate::lexer::substitute_params`]).
        body: Vec<Token>,
    },
    /// A built-in control sequence whose behaviour is hard-coded in the
    /// lexer/expander (see [`crate::lexer::primitives`]).
    Primitive {
        /// Primitive identifier, e.g. `"def"`, `"catcode"`, `"input"`.
        identifier: String,
    },
    /// The result of `\let\foo=x` where `x` is a plain character token:
    /// `\foo` now behaves exactly as if `x` had been typed.
    ImplicitChar(char, Catcode),
}

impl MacroCommand {
    /// Build a primitive binding for `identifier`.
    pub fn primitive(identifier: impl Into<String>) -> MacroCommand {
        MacroCommand::Primitive {
            identifier: identifier.into(),
        }
    }
}

/// A `\newenvironment`-defined environment: `\begin{name}` splices
/// `start_code` (after parsing `args` against the call site);
/// `\end{name}` splices `end_code` and pops the group opened at
/// `\begin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroEnvironment {
    /// The token sequence spelling the environment's name, so renaming
    /// the binding (e.g. via an active character) does not lose the
    /// environment.
    pub name_tokens: Vec<Token>,
    /// Argument specification parsed once, at `\begin`.
    pub args: Vec<ArgSpec>,
    /// Tokens spliced into the input when the environment opens.
    pub start_code: Vec<Token>,
    /// Tokens spliced into the input when the environment closes.
    pub end_code: Vec<Token>,
}

/// Key type for the macro-command table: a control sequence's spelling
/// together with its active-character flag.
pub type MacroKey = (String, bool);

/// Mapping from macro key to its current binding, shadowed per group by
/// [`crate::lexer::state::LexerState`].
pub type MacroTable = HashMap<MacroKey, MacroCommand>;

/// Mapping from an environment's name spelling to its definition.
pub type EnvironmentTable = HashMap<Vec<Token>, MacroEnvironment>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arg_value_tokens_is_empty_for_non_content_variants() {
        assert!(ArgValue::NoValue.tokens().is_empty());
        assert!(ArgValue::Boolean(true).tokens().is_empty());
    }

    #[test]
    fn primitive_builder_sets_identifier() {
        match MacroCommand::primitive("def") {
            MacroCommand::Primitive { identifier } => assert_eq!(identifier, "def"),
            _ => panic!("expected primitive"),
        }
    }
}
