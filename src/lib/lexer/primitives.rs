//! The definitional/control primitive set (SPEC_FULL.md §4.2.2).
//!
//! Primitive *names* form a small closed vocabulary, so classifying a
//! control sequence's spelling into a [`PrimitiveId`] is exactly the
//! kind of static, finite-alphabet problem `logos` is built for — unlike
//! the catcode table (see [`crate::catcode`]), which is genuinely
//! mutable at run time and so is hand-rolled instead.

use logos::Logos;

use crate::error::{DefinitionClashKind, Error, Result};
use crate::macros::{ArgSpec, DefinitionMode, MacroCommand, MacroTable};

/// Closed enumeration of every primitive this front end implements.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveId {
    #[token("begingroup")]
    BeginGroup,
    #[token("endgroup")]
    EndGroup,
    #[token("bgroup")]
    Bgroup,
    #[token("egroup")]
    Egroup,
    #[token("begin")]
    Begin,
    #[token("end")]
    End,
    #[token("def")]
    Def,
    #[token("let")]
    Let,
    #[token("catcode")]
    Catcode,
    #[token("newcommand")]
    NewCommand,
    #[token("renewcommand")]
    RenewCommand,
    #[token("providecommand")]
    ProvideCommand,
    #[token("DeclareRobustCommand")]
    DeclareRobustCommand,
    #[token("newenvironment")]
    NewEnvironment,
    #[token("renewenvironment")]
    RenewEnvironment,
    #[token("NewDocumentCommand")]
    NewDocumentCommand,
    #[token("RenewDocumentCommand")]
    RenewDocumentCommand,
    #[token("ProvideDocumentCommand")]
    ProvideDocumentCommand,
    #[token("DeclareDocumentCommand")]
    DeclareDocumentCommand,
    #[token("NewDocumentEnvironment")]
    NewDocumentEnvironment,
    #[token("RenewDocumentEnvironment")]
    RenewDocumentEnvironment,
    #[token("ProvideDocumentEnvironment")]
    ProvideDocumentEnvironment,
    #[token("DeclareDocumentEnvironment")]
    DeclareDocumentEnvironment,
    #[token("iftrue")]
    IfTrue,
    #[token("iffalse")]
    IfFalse,
    #[token("else")]
    Else,
    #[token("fi")]
    Fi,
    #[token("IfBooleanTF")]
    IfBooleanTF,
    #[token("IfNoValueTF")]
    IfNoValueTF,
    #[token("input")]
    Input,
    #[token("include")]
    Include,
    #[token("year")]
    Year,
    #[token("month")]
    Month,
    #[token("day")]
    Day,
    #[token("time")]
    Time,
    #[token("meaning")]
    Meaning,
    #[token("char")]
    Char,
    #[token("number")]
    Number,
    #[token("undefined")]
    Undefined,
    #[token("(")]
    InlineMathOpen,
    #[token(")")]
    InlineMathClose,
    #[token("[")]
    DisplayMathOpen,
    #[token("]")]
    DisplayMathClose,
    #[error]
    Unknown,
}

impl PrimitiveId {
    /// Classify a control sequence's bare name (without the escape
    /// character), returning `None` if it is not one of our primitives.
    pub fn from_name(name: &str) -> Option<PrimitiveId> {
        let mut lex = PrimitiveId::lexer(name);
        match lex.next() {
            Some(id) if id != PrimitiveId::Unknown && lex.slice().len() == name.len() => Some(id),
            _ => None,
        }
    }

    /// The definition mode implied by a `\new`/`\renew`/`\provide`/`\declare`
    /// command or environment primitive; `None` for every other primitive.
    pub fn definition_mode(self) -> Option<DefinitionMode> {
        use PrimitiveId::*;
        Some(match self {
            NewCommand | NewEnvironment | NewDocumentCommand | NewDocumentEnvironment => {
                DefinitionMode::New
            }
            RenewCommand | RenewEnvironment | RenewDocumentCommand | RenewDocumentEnvironment => {
                DefinitionMode::Renew
            }
            ProvideCommand | ProvideDocumentCommand | ProvideDocumentEnvironment => {
                DefinitionMode::Provide
            }
            DeclareRobustCommand | DeclareDocumentCommand | DeclareDocumentEnvironment => {
                DefinitionMode::Declare
            }
            _ => return None,
        })
    }
}

/// Populate `table` with every primitive, as `\begingroup` et al. are
/// bound from the very first character of a document, long before any
/// user `\def` runs.
pub fn install_primitives(table: &mut MacroTable) {
    const NAMES: &[&str] = &[
        "begingroup",
        "endgroup",
        "bgroup",
        "egroup",
        "begin",
        "end",
        "def",
        "let",
        "catcode",
        "newcommand",
        "renewcommand",
        "providecommand",
        "DeclareRobustCommand",
        "newenvironment",
        "renewenvironment",
        "NewDocumentCommand",
        "RenewDocumentCommand",
        "ProvideDocumentCommand",
        "DeclareDocumentCommand",
        "NewDocumentEnvironment",
        "RenewDocumentEnvironment",
        "ProvideDocumentEnvironment",
        "DeclareDocumentEnvironment",
        "iftrue",
        "iffalse",
        "else",
        "fi",
        "IfBooleanTF",
        "IfNoValueTF",
        "input",
        "include",
        "year",
        "month",
        "day",
        "time",
        "meaning",
        "char",
        "number",
        "undefined",
        "(",
        ")",
        "[",
        "]",
    ];
    for name in NAMES {
        table.insert(
            (name.to_string(), false),
            MacroCommand::primitive(*name),
        );
    }
}

/// Apply the clash policy for a `\new`/`\renew`/`\provide`/`\declare`
/// definition. Returns `Ok(true)` if the definition should proceed,
/// `Ok(false)` if it should be silently skipped (the `Provide` case),
/// or an error for an outright clash.
pub fn check_definition_clash(
    mode: DefinitionMode,
    name: &str,
    already_defined: bool,
    pos: crate::error::SourcePos,
) -> Result<bool> {
    match (mode, already_defined) {
        (DefinitionMode::New, true) => Err(Error::DefinitionClash(
            pos,
            name.to_string(),
            DefinitionClashKind::AlreadyDefined,
        )),
        (DefinitionMode::Renew, false) => Err(Error::DefinitionClash(
            pos,
            name.to_string(),
            DefinitionClashKind::NotYetDefined,
        )),
        (DefinitionMode::Provide, true) => Ok(false),
        _ => Ok(true),
    }
}

/// Build the xparse-style argument specification implied by a bracketed
/// arg-count shorthand (`\newcommand{\foo}[2][default]{...}`), which is
/// the only argument-spec *syntax* LaTeX's classic `\newcommand` family
/// supports: `n` mandatory arguments, the first optionally defaulted.
pub fn simple_argspec(num_args: u8, default: Option<Vec<crate::token::Token>>) -> Vec<ArgSpec> {
    let mut specs = Vec::new();
    if num_args == 0 {
        return specs;
    }
    if let Some(default) = default {
        specs.push(ArgSpec::OptionalGroup(
            crate::token::Token::char('[', crate::catcode::Catcode::Other),
            crate::token::Token::char(']', crate::catcode::Catcode::Other),
            Some(default),
        ));
        for _ in 1..num_args {
            specs.push(ArgSpec::Mandatory);
        }
    } else {
        for _ in 0..num_args {
            specs.push(ArgSpec::Mandatory);
        }
    }
    specs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_primitives() {
        assert_eq!(PrimitiveId::from_name("def"), Some(PrimitiveId::Def));
        assert_eq!(
            PrimitiveId::from_name("NewDocumentCommand"),
            Some(PrimitiveId::NewDocumentCommand)
        );
    }

    #[test]
    fn rejects_unknown_names_and_partial_matches() {
        assert_eq!(PrimitiveId::from_name("foobar"), None);
        // "definitely" starts with "def" but must not be misclassified.
        assert_eq!(PrimitiveId::from_name("definitely"), None);
    }

    #[test]
    fn install_primitives_binds_every_name() {
        let mut table = MacroTable::new();
        install_primitives(&mut table);
        assert!(table.contains_key(&("def".to_string(), false)));
        assert!(table.contains_key(&("NewDocumentCommand".to_string(), false)));
        assert!(!table.contains_key(&("definitely".to_string(), false)));
    }

    #[test]
    fn definition_mode_clash_policy() {
        let pos = crate::error::SourcePos::START;
        assert!(check_definition_clash(DefinitionMode::New, "foo", true, pos).is_err());
        assert!(check_definition_clash(DefinitionMode::Renew, "foo", false, pos).is_err());
        assert_eq!(
            check_definition_clash(DefinitionMode::Provide, "foo", true, pos).unwrap(),
            false
        );
        assert_eq!(
            check_definition_clash(DefinitionMode::Declare, "foo", true, pos).unwrap(),
            true
        );
    }
}
