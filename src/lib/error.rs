//! Error and Result structures used all across this crate.
//!
//! Errors are split along the three tiers described by the conversion
//! pipeline: lexer-fatal conditions abort the whole conversion, walker
//! conditions are normally absorbed as backtracking failures and only
//! surface here when no alternative production succeeds, and semantic
//! warnings never stop anything — they are reported through
//! [`crate::diagnostics`] instead of this error type.

use std::fmt;

/// A position in a source file, tracked by the character stream.
///
/// Lines and columns are both 1-indexed, matching how editors and
/// `rustc` itself report positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct SourcePos {
    /// 1-indexed line number.
    pub line: usize,
    /// 1-indexed column within `line`.
    pub column: usize,
}

impl SourcePos {
    /// The position at the very start of a file.
    pub const START: SourcePos = SourcePos { line: 1, column: 1 };

    /// Advance this position by one character, handling newlines.
    pub fn advance(&mut self, c: char) {
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Enumeration of all possible error types.
///
/// Every variant that can be attributed to a location in the source
/// carries a [`SourcePos`]; variants from transparent IO failures do not.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error from reading and writing to IO (see [`std::io::Error`]).
    #[error(transparent)]
    IO(#[from] std::io::Error),

    /// A `{` (or environment) was never closed before the input ended.
    #[error("{0}: unterminated group (opened with no matching close)")]
    UnterminatedGroup(SourcePos),

    /// An `\if...` was never closed with a matching `\fi`.
    #[error("{0}: unterminated conditional (missing \\fi)")]
    UnterminatedConditional(SourcePos),

    /// `\fi` or `\else` seen with no matching `\if...`.
    #[error("{0}: conditional stack is empty, nothing to close")]
    ConditionalImbalance(SourcePos),

    /// A mandatory macro argument was required but the input ended first.
    #[error("{0}: expected a mandatory argument, found end of input")]
    MissingMandatoryArgument(SourcePos),

    /// A delimited argument's closing delimiter was never found.
    #[error("{0}: delimiter not found while parsing argument")]
    DelimiterNotFound(SourcePos),

    /// Macro expansion recursed past the configured [`crate::lexer::state::LexerLimits`].
    #[error("{0}: macro expansion exceeded the configured recursion depth ({1})")]
    RecursionLimitExceeded(SourcePos, usize),

    /// `\catcode` was given a value outside `0..=15`.
    #[error("{0}: invalid category code (got '{1}', must be between 0 and 15 included)")]
    InvalidCategoryCode(SourcePos, String),

    /// A `\newcommand`-family definition clashed with an existing one
    /// (or, for `\renewcommand`, failed to find one to replace).
    #[error("{0}: command '{1}' {2}")]
    DefinitionClash(SourcePos, String, DefinitionClashKind),

    /// `\input`/`\include` could not resolve or read the named file.
    #[error("{0}: could not read included file '{1}': {2}")]
    IncludeFailed(SourcePos, String, String),

    /// The walker could not produce a top-level production and had no
    /// fallback; carries the innermost backtracking failure.
    #[error("{0}: {1}")]
    WalkFailed(SourcePos, String),

    /// Checking if `directory` exists and is actually a directory failed.
    #[error("invalid directory (got '{0}', does not exist or is not a directory)")]
    InvalidDirectory(String),

    /// Checking if `filename` exists and is actually a file failed.
    #[error("invalid filename (got '{0}', does not exist or is not a file)")]
    InvalidFilename(String),
}

/// Why a `\newcommand`-family definition was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionClashKind {
    /// `\newcommand`/`\newenvironment`: the name was already defined.
    AlreadyDefined,
    /// `\renewcommand`/`\renewenvironment`: the name was not yet defined.
    NotYetDefined,
}

impl fmt::Display for DefinitionClashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyDefined => write!(f, "is already defined"),
            Self::NotYetDefined => write!(f, "is not yet defined"),
        }
    }
}

/// Result type alias with error type defined above (see [`Error`]).
pub type Result<T> = std::result::Result<T, Error>;
