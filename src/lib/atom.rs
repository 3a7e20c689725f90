//! TeX atoms: the structural parser's output type (SPEC_FULL.md §3/§4.3).
//!
//! An atom tree is the midpoint between the flat token stream and the
//! semantic document: groups are nested, commands carry their argument
//! lists, but nothing here yet knows what a section or a citation is —
//! that is the walker's job.

use crate::token::Token;

/// One argument slot of a [`Atom::Command`] or [`Atom::Group`], already
/// folded from the call-site braces/brackets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// `{...}`
    Obligatory(Vec<Atom>),
    /// `[...]`
    Optional(Vec<Atom>),
    /// A bare `*` immediately following the command name.
    Star,
}

impl Arg {
    /// The atoms carried by an [`Arg::Obligatory`] or [`Arg::Optional`];
    /// empty for [`Arg::Star`].
    pub fn body(&self) -> &[Atom] {
        match self {
            Arg::Obligatory(b) | Arg::Optional(b) => b,
            Arg::Star => &[],
        }
    }
}

/// Whether a [`Atom::MathGroup`] was opened with a single or doubled
/// math-shift token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathType {
    /// `\(...\)` or single `$...$`.
    Inline,
    /// `\[...\]` or doubled `$$...$$`.
    Display,
}

/// A node of the TeX intermediate tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    /// Coalesced run of Letter/Other characters.
    Plain(String),
    /// A control sequence with its resolved argument list.
    Command(String, Vec<Arg>),
    /// A `{...}` group, optionally named (environments fold their name
    /// in here; a bare brace group has an empty name).
    Group(String, Vec<Arg>, Vec<Atom>),
    /// A math formula.
    MathGroup(MathType, Vec<Atom>),
    /// `^{...}` or `^x`.
    SupScript(Vec<Atom>),
    /// `_{...}` or `_x`.
    SubScript(Vec<Atom>),
    /// `&` in a tabular/align context.
    AlignMark,
    /// A (possibly collapsed) run of space tokens.
    White,
    /// An explicit, non-paragraph-breaking newline.
    Newline,
    /// `\par` or a blank-line run.
    Par,
}

impl Atom {
    /// `true` for the atoms the syntactic filter treats as blank-like
    /// when normalising whitespace.
    pub fn is_whitespace_like(&self) -> bool {
        matches!(self, Atom::White | Atom::Newline)
    }
}

/// A token list, already folded into a flat sequence of atoms — the
/// complete output of [`crate::parser::parse`].
pub type TeXDocument = Vec<Atom>;

/// A static fact about a command's calling convention, consulted by the
/// structural parser while folding a [`crate::token::Token::ControlSequence`]
/// into an [`Atom::Command`]. Commands absent from the registry default
/// to zero arguments, matching §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgSlot {
    /// `true` for an optional (`[...]`) slot, `false` for obligatory (`{...}`).
    pub optional: bool,
    /// `true` for a trailing obligatory slot that stops being consumed,
    /// rather than erroring, once no more `{...}` groups follow — how
    /// `\cites`/`\parencites` accept a variable number of key groups.
    pub repeatable: bool,
}

/// Look up how many, and what kind of, argument groups immediately
/// follow `name` at the token level (before the reader attaches any
/// domain meaning to them).
pub fn registered_argspec(name: &str) -> &'static [ArgSlot] {
    const OBLIGATORY: ArgSlot = ArgSlot { optional: false, repeatable: false };
    const OPTIONAL: ArgSlot = ArgSlot { optional: true, repeatable: false };
    const KEY_GROUP: ArgSlot = ArgSlot { optional: false, repeatable: true };
    // `\cites{k1}{k2}...`/`\parencites{k1}{k2}...`: up to this many
    // `{key}` groups. Per-key pre/postnotes (real biblatex's
    // `\cites(p)(q)[r][s]{k1}...`) are not modeled — see DESIGN.md.
    const CITES_SPEC: [ArgSlot; 8] = [KEY_GROUP; 8];
    match name {
        "part" | "chapter" | "section" | "subsection" | "subsubsection" | "paragraph"
        | "subparagraph" | "caption" | "label" | "ref" | "pageref" | "autoref" | "footnote"
        | "emph" | "textbf" | "textit" | "textsc" | "includegraphics" | "cite" | "citeauthor"
        | "citeyear" | "url" | "bibitem" | "bibliography" | "title" | "subtitle" | "author"
        | "date" => &[OBLIGATORY],
        "multicolumn" => &[OBLIGATORY, OBLIGATORY, OBLIGATORY],
        "href" => &[OBLIGATORY, OBLIGATORY],
        "parencite" | "textcite" => &[OPTIONAL, OPTIONAL, OBLIGATORY],
        "cites" | "parencites" => &CITES_SPEC,
        "documentclass" | "usepackage" => &[OPTIONAL, OBLIGATORY],
        "item" => &[OPTIONAL],
        _ => &[],
    }
}
