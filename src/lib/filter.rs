//! Syntactic filter: whitespace normalisation and symbol/diacritic/
//! ligature resolution over an atom tree (SPEC_FULL.md §4.4).
//!
//! Runs after the structural parser and before the walker. Both passes
//! are structural, not semantic — they never look at what a command
//! *means* to the document (sectioning, citations, ...), only at its
//! name and argument shape.

use std::collections::HashMap;

use itertools::Itertools;

use crate::atom::{Arg, Atom};

/// Normalise whitespace, then resolve symbols/diacritics/ligatures.
pub fn normalize(atoms: &[Atom]) -> Vec<Atom> {
    resolve_symbols(&normalize_whitespace(atoms))
}

/// Pass 1: within one level, collapse adjacent `White`, let an `Eol`
/// immediately following `White` absorb it, and let a `Par` absorb
/// every surrounding `White`/`Newline`/`Par`. Recurses into every
/// container but never reaches across a structural boundary.
pub fn normalize_whitespace(atoms: &[Atom]) -> Vec<Atom> {
    let mut out: Vec<Atom> = Vec::with_capacity(atoms.len());
    for atom in atoms {
        let recursed = recurse_whitespace(atom);
        match &recursed {
            Atom::White => {
                if matches!(out.last(), Some(Atom::White) | Some(Atom::Par)) {
                    continue;
                }
                out.push(Atom::White);
            }
            Atom::Newline => {
                if matches!(out.last(), Some(Atom::White)) {
                    out.pop();
                }
                if matches!(out.last(), Some(Atom::Newline) | Some(Atom::Par)) {
                    continue;
                }
                out.push(Atom::Newline);
            }
            Atom::Par => {
                while matches!(out.last(), Some(Atom::White) | Some(Atom::Newline) | Some(Atom::Par)) {
                    out.pop();
                }
                out.push(Atom::Par);
            }
            other => out.push(other.clone()),
        }
    }
    out
}

fn recurse_whitespace(atom: &Atom) -> Atom {
    match atom {
        Atom::Group(name, args, body) => Atom::Group(
            name.clone(),
            args.iter().map(recurse_whitespace_arg).collect(),
            normalize_whitespace(body),
        ),
        Atom::Command(name, args) => {
            Atom::Command(name.clone(), args.iter().map(recurse_whitespace_arg).collect())
        }
        Atom::MathGroup(t, body) => Atom::MathGroup(*t, normalize_whitespace(body)),
        Atom::SupScript(body) => Atom::SupScript(normalize_whitespace(body)),
        Atom::SubScript(body) => Atom::SubScript(normalize_whitespace(body)),
        other => other.clone(),
    }
}

fn recurse_whitespace_arg(arg: &Arg) -> Arg {
    match arg {
        Arg::Obligatory(b) => Arg::Obligatory(normalize_whitespace(b)),
        Arg::Optional(b) => Arg::Optional(normalize_whitespace(b)),
        Arg::Star => Arg::Star,
    }
}

/// Zero-argument command → literal Unicode replacement.
pub fn symbol_table() -> HashMap<&'static str, &'static str> {
    [
        ("alpha", "\u{03B1}"),
        ("beta", "\u{03B2}"),
        ("gamma", "\u{03B3}"),
        ("delta", "\u{03B4}"),
        ("epsilon", "\u{03B5}"),
        ("pi", "\u{03C0}"),
        ("sigma", "\u{03C3}"),
        ("omega", "\u{03C9}"),
        ("times", "\u{00D7}"),
        ("infty", "\u{221E}"),
        ("ldots", "\u{2026}"),
        ("dots", "\u{2026}"),
        ("textemdash", "\u{2014}"),
        ("textendash", "\u{2013}"),
        ("S", "\u{00A7}"),
        ("P", "\u{00B6}"),
        ("copyright", "\u{00A9}"),
        ("pounds", "\u{00A3}"),
    ]
    .into_iter()
    .collect()
}

/// One-argument command → combining mark inserted after the argument's
/// first character.
pub fn diacritic_table() -> HashMap<&'static str, char> {
    [
        ("'", '\u{0301}'),
        ("`", '\u{0300}'),
        ("^", '\u{0302}'),
        ("\"", '\u{0308}'),
        ("~", '\u{0303}'),
        ("c", '\u{0327}'),
        ("v", '\u{030C}'),
    ]
    .into_iter()
    .collect()
}

/// Two-argument diacritic commands (e.g. `\t{oo}` the tie-bar accent).
pub fn double_diacritic_table() -> HashMap<&'static str, char> {
    [("t", '\u{0361}')].into_iter().collect()
}

/// Longest-match-first literal substring replacement over `Plain`
/// content.
pub fn ligature_table() -> Vec<(&'static str, &'static str)> {
    [
        ("``", "\u{201C}"),
        ("''", "\u{201D}"),
        ("---", "\u{2014}"),
        ("--", "\u{2013}"),
        ("?`", "\u{00BF}"),
        ("!`", "\u{00A1}"),
    ]
    .into_iter()
    .sorted_by_key(|(k, _)| std::cmp::Reverse(k.len()))
    .collect()
}

fn apply_ligatures(s: &str) -> String {
    let table = ligature_table();
    let mut out = String::with_capacity(s.len());
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    'outer: while i < chars.len() {
        for (key, repl) in &table {
            let key_chars: Vec<char> = key.chars().collect();
            if chars[i..].starts_with(&key_chars[..]) {
                out.push_str(repl);
                i += key_chars.len();
                continue 'outer;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Pass 2: resolve symbol/diacritic commands and apply ligatures to
/// every `Plain` atom. Unknown commands are left untouched.
pub fn resolve_symbols(atoms: &[Atom]) -> Vec<Atom> {
    let symbols = symbol_table();
    let diacritics = diacritic_table();
    let double_diacritics = double_diacritic_table();
    let mut out = Vec::with_capacity(atoms.len());
    for atom in atoms {
        match atom {
            Atom::Plain(s) => out.push(Atom::Plain(apply_ligatures(s))),
            Atom::Command(name, args) if args.is_empty() && symbols.contains_key(name.as_str()) => {
                out.push(Atom::Plain(symbols[name.as_str()].to_string()));
            }
            Atom::Command(name, args) if args.len() == 1 && diacritics.contains_key(name.as_str()) => {
                let mark = diacritics[name.as_str()];
                out.push(Atom::Plain(apply_diacritic(args[0].body(), mark)));
            }
            Atom::Command(name, args)
                if args.len() == 2 && double_diacritics.contains_key(name.as_str()) =>
            {
                let mark = double_diacritics[name.as_str()];
                let mut combined = flatten_plain(args[0].body());
                combined.push_str(&flatten_plain(args[1].body()));
                out.push(Atom::Plain(apply_diacritic_str(&combined, mark)));
            }
            Atom::Command(name, args) => {
                out.push(Atom::Command(name.clone(), resolve_symbols_in_args(args)))
            }
            Atom::Group(name, args, body) => out.push(Atom::Group(
                name.clone(),
                resolve_symbols_in_args(args),
                resolve_symbols(body),
            )),
            Atom::MathGroup(t, body) => out.push(Atom::MathGroup(*t, resolve_symbols(body))),
            Atom::SupScript(body) => out.push(Atom::SupScript(resolve_symbols(body))),
            Atom::SubScript(body) => out.push(Atom::SubScript(resolve_symbols(body))),
            other => out.push(other.clone()),
        }
    }
    out
}

fn resolve_symbols_in_args(args: &[Arg]) -> Vec<Arg> {
    args.iter()
        .map(|a| match a {
            Arg::Obligatory(b) => Arg::Obligatory(resolve_symbols(b)),
            Arg::Optional(b) => Arg::Optional(resolve_symbols(b)),
            Arg::Star => Arg::Star,
        })
        .collect()
}

fn flatten_plain(atoms: &[Atom]) -> String {
    atoms
        .iter()
        .filter_map(|a| match a {
            Atom::Plain(s) => Some(s.clone()),
            _ => None,
        })
        .collect()
}

fn apply_diacritic(body: &[Atom], mark: char) -> String {
    apply_diacritic_str(&flatten_plain(body), mark)
}

fn apply_diacritic_str(s: &str, mark: char) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => {
            let mut out = String::new();
            out.push(first);
            out.push(mark);
            out.extend(chars.take_while(|c| is_combining_mark(*c)));
            out
        }
        None => String::new(),
    }
}

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacent_whites_collapse() {
        let atoms = vec![Atom::White, Atom::White, Atom::Plain("x".into())];
        assert_eq!(
            normalize_whitespace(&atoms),
            vec![Atom::White, Atom::Plain("x".into())]
        );
    }

    #[test]
    fn par_absorbs_surrounding_whitespace() {
        let atoms = vec![Atom::White, Atom::Newline, Atom::Par, Atom::White];
        assert_eq!(normalize_whitespace(&atoms), vec![Atom::Par]);
    }

    #[test]
    fn idempotent_normalization() {
        let atoms = vec![Atom::White, Atom::White, Atom::Newline, Atom::Plain("a".into())];
        let once = normalize_whitespace(&atoms);
        let twice = normalize_whitespace(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn symbol_command_resolves() {
        let atoms = vec![Atom::Command("alpha".into(), vec![])];
        assert_eq!(resolve_symbols(&atoms), vec![Atom::Plain("\u{03B1}".into())]);
    }

    #[test]
    fn ligature_quotes_resolve() {
        let atoms = vec![Atom::Plain("``hi''".into())];
        assert_eq!(
            resolve_symbols(&atoms),
            vec![Atom::Plain("\u{201C}hi\u{201D}".into())]
        );
    }

    #[test]
    fn unknown_command_left_intact() {
        let atoms = vec![Atom::Command("frobnicate".into(), vec![])];
        assert_eq!(resolve_symbols(&atoms), atoms);
    }
}
