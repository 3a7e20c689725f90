//! Category codes.
//!
//! This module provides the alphabet TeX's lexer reads against: a
//! mutable mapping from character to [`Catcode`]. Unlike a conventional
//! lexer grammar, this classification is *not* fixed at compile time —
//! `\catcode` can rewrite it at any point during a run, which is exactly
//! why the table below is a plain runtime value rather than a
//! `#[derive(Logos)]` enum.
//!
//! The documentation of each variant is adapted from "TeX by Topic",
//! section 2.3.

use std::collections::HashMap;
use std::fmt;

use strum_macros::{Display, EnumIter};

/// One of the 16 category codes TeX assigns to every character.
#[derive(Debug, Display, EnumIter, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Catcode {
    /// Signals the start of a control sequence. Plain TeX uses `\`.
    Escape = 0,
    /// Opens a new level of grouping. Plain TeX uses `{`.
    Bgroup = 1,
    /// Closes the current level of grouping. Plain TeX uses `}`.
    Egroup = 2,
    /// Opens/closes a math formula. Plain TeX uses `$`.
    MathShift = 3,
    /// Column/row separator in `\halign`/`\valign` constructs. Plain TeX uses `&`.
    AlignTab = 4,
    /// Signals the end of an input line.
    Eol = 5,
    /// Indicates a macro parameter. Plain TeX uses `#`.
    ParamPrefix = 6,
    /// Precedes superscript expressions in math mode. Plain TeX uses `^`.
    Supscript = 7,
    /// Precedes subscript expressions in math mode. Plain TeX uses `_`.
    Subscript = 8,
    /// Removed from the input with no effect on further processing.
    Ignored = 9,
    /// Space characters, collapsed and otherwise treated specially.
    Space = 10,
    /// Only `a..z`, `A..Z` in IniTeX; macro packages often add more (`@`).
    Letter = 11,
    /// Everything not covered by the other categories (digits, punctuation).
    Other = 12,
    /// Behaves like a control sequence without a preceding escape character.
    Active = 13,
    /// Begins a comment running to the end of the current line.
    Comment = 14,
    /// Should not appear in well-formed input; raises a warning when seen.
    Invalid = 15,
}

impl Catcode {
    /// Numeric category code, as used by `\catcode<char>=<n>`.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a numeric catcode, failing for anything outside `0..=15`.
    pub fn try_from_u8(n: u8) -> Option<Catcode> {
        use Catcode::*;
        Some(match n {
            0 => Escape,
            1 => Bgroup,
            2 => Egroup,
            3 => MathShift,
            4 => AlignTab,
            5 => Eol,
            6 => ParamPrefix,
            7 => Supscript,
            8 => Subscript,
            9 => Ignored,
            10 => Space,
            11 => Letter,
            12 => Other,
            13 => Active,
            14 => Comment,
            15 => Invalid,
            _ => return None,
        })
    }
}

/// A scoped mapping from character to [`Catcode`], with a default for
/// characters nobody has ever assigned explicitly.
///
/// `CatcodeTable` on its own is not group-aware; scoping is the
/// responsibility of [`crate::lexer::state::LexerState`], which snapshots
/// and restores whole tables across `{`/`}`.
#[derive(Debug, Clone)]
pub struct CatcodeTable {
    map: HashMap<char, Catcode>,
}

impl CatcodeTable {
    /// Build the table plain TeX starts with.
    pub fn plain_tex() -> CatcodeTable {
        let mut map = HashMap::new();
        for c in ('a'..='z').chain('A'..='Z') {
            map.insert(c, Catcode::Letter);
        }
        map.insert('\\', Catcode::Escape);
        map.insert('{', Catcode::Bgroup);
        map.insert('}', Catcode::Egroup);
        map.insert('$', Catcode::MathShift);
        map.insert('&', Catcode::AlignTab);
        map.insert('\n', Catcode::Eol);
        map.insert('\r', Catcode::Eol);
        map.insert('#', Catcode::ParamPrefix);
        map.insert('^', Catcode::Supscript);
        map.insert('_', Catcode::Subscript);
        map.insert('\u{0}', Catcode::Ignored);
        map.insert(' ', Catcode::Space);
        map.insert('\t', Catcode::Space);
        map.insert('%', Catcode::Comment);
        map.insert('\u{7f}', Catcode::Invalid);
        // `~` is not universally fixed in TeX by Topic; we make it Active
        // by default, matching plain TeX's `\def~{\penalty\@M\ }` usage
        // (see SPEC_FULL.md open question).
        map.insert('~', Catcode::Active);
        CatcodeTable { map }
    }

    /// Look up the catcode of `c`, falling back to [`Catcode::Other`] for
    /// characters nobody has classified.
    pub fn catcode_of(&self, c: char) -> Catcode {
        self.map.get(&c).copied().unwrap_or(Catcode::Other)
    }

    /// Assign a new catcode to `c`, overriding any previous assignment.
    pub fn set_catcode(&mut self, c: char, cat: Catcode) {
        self.map.insert(c, cat);
    }

    /// The raw, possibly-absent entry for `c` (before the [`Catcode::Other`]
    /// default is applied). Used by group-scope undo logs, which must
    /// distinguish "was Other by default" from "was never assigned".
    pub fn raw(&self, c: char) -> Option<Catcode> {
        self.map.get(&c).copied()
    }

    /// Remove any explicit assignment for `c`, reverting it to the
    /// [`Catcode::Other`] default.
    pub fn unset(&mut self, c: char) {
        self.map.remove(&c);
    }

    /// Restore a raw entry previously returned by [`CatcodeTable::raw`].
    pub fn restore(&mut self, c: char, prior: Option<Catcode>) {
        match prior {
            Some(cat) => {
                self.map.insert(c, cat);
            }
            None => {
                self.map.remove(&c);
            }
        }
    }
}

impl Default for CatcodeTable {
    fn default() -> Self {
        Self::plain_tex()
    }
}

impl fmt::Display for CatcodeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<_> = self.map.iter().collect();
        entries.sort_by_key(|(c, _)| **c);
        for (c, cat) in entries {
            writeln!(f, "{c:?} -> {cat} ({})", cat.as_u8())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_tex_matches_the_book() {
        let table = CatcodeTable::plain_tex();
        assert_eq!(table.catcode_of('\\'), Catcode::Escape);
        assert_eq!(table.catcode_of('{'), Catcode::Bgroup);
        assert_eq!(table.catcode_of('}'), Catcode::Egroup);
        assert_eq!(table.catcode_of('$'), Catcode::MathShift);
        assert_eq!(table.catcode_of('&'), Catcode::AlignTab);
        assert_eq!(table.catcode_of('#'), Catcode::ParamPrefix);
        assert_eq!(table.catcode_of('^'), Catcode::Supscript);
        assert_eq!(table.catcode_of('_'), Catcode::Subscript);
        assert_eq!(table.catcode_of(' '), Catcode::Space);
        assert_eq!(table.catcode_of('%'), Catcode::Comment);
        assert_eq!(table.catcode_of('~'), Catcode::Active);
        assert_eq!(table.catcode_of('a'), Catcode::Letter);
        assert_eq!(table.catcode_of('Z'), Catcode::Letter);
        assert_eq!(table.catcode_of('9'), Catcode::Other);
    }

    #[test]
    fn unassigned_defaults_to_other() {
        let table = CatcodeTable::plain_tex();
        assert_eq!(table.catcode_of('*'), Catcode::Other);
    }

    #[test]
    fn set_catcode_overrides() {
        let mut table = CatcodeTable::plain_tex();
        table.set_catcode('@', Catcode::Letter);
        assert_eq!(table.catcode_of('@'), Catcode::Letter);
    }

    #[test]
    fn numeric_round_trip() {
        for n in 0u8..=15 {
            let cat = Catcode::try_from_u8(n).unwrap();
            assert_eq!(cat.as_u8(), n);
        }
        assert!(Catcode::try_from_u8(16).is_none());
    }
}
