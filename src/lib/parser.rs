//! Structural parser: token list → atom list (SPEC_FULL.md §4.3).
//!
//! Pure and stateless — it only needs [`crate::atom::registered_argspec`]
//! to know how many argument groups immediately follow a command name.
//! Commands outside the registry get zero arguments; any braces that
//! follow them are parsed as their own, unrelated [`Atom::Group`].

use crate::atom::{Arg, ArgSlot, Atom, TeXDocument};
use crate::catcode::Catcode;
use crate::error::{Error, Result, SourcePos};
use crate::token::Token;

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

/// Parse a full token stream into a flat atom list.
pub fn parse(tokens: &[Token]) -> Result<TeXDocument> {
    let mut p = Parser { tokens, pos: 0 };
    let atoms = p.parse_until(None)?;
    if p.pos != p.tokens.len() {
        // An unmatched Egroup surfaced at top level.
        return Err(Error::UnterminatedGroup(SourcePos::START));
    }
    Ok(atoms)
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    /// Parse atoms until EOF, a bare Egroup (returned to caller, not
    /// consumed), or a closing math-shift run, depending on `stop`.
    fn parse_until(&mut self, stop: Option<Stop>) -> Result<Vec<Atom>> {
        let mut out: Vec<Atom> = Vec::new();
        let mut plain = String::new();
        loop {
            let flush = |plain: &mut String, out: &mut Vec<Atom>| {
                if !plain.is_empty() {
                    out.push(Atom::Plain(std::mem::take(plain)));
                }
            };
            match self.peek() {
                None => {
                    flush(&mut plain, &mut out);
                    return Ok(out);
                }
                Some(Token::Char(_, Catcode::Egroup)) if stop == Some(Stop::Egroup) => {
                    flush(&mut plain, &mut out);
                    return Ok(out);
                }
                Some(Token::Char(_, Catcode::MathShift)) if stop == Some(Stop::MathInline) => {
                    flush(&mut plain, &mut out);
                    self.bump();
                    return Ok(out);
                }
                Some(Token::Char(_, Catcode::MathShift))
                    if stop == Some(Stop::MathDisplay)
                        && self.double_math_shift_ahead() =>
                {
                    flush(&mut plain, &mut out);
                    self.bump();
                    self.bump();
                    return Ok(out);
                }
                Some(Token::Char(c, cat)) => {
                    let c = *c;
                    let cat = *cat;
                    match cat {
                        Catcode::Letter | Catcode::Other => {
                            plain.push(c);
                            self.bump();
                        }
                        Catcode::Space => {
                            flush(&mut plain, &mut out);
                            while matches!(self.peek(), Some(Token::Char(_, Catcode::Space))) {
                                self.bump();
                            }
                            out.push(Atom::White);
                        }
                        Catcode::Eol => {
                            flush(&mut plain, &mut out);
                            self.bump();
                            out.push(Atom::Newline);
                        }
                        Catcode::Bgroup => {
                            flush(&mut plain, &mut out);
                            self.bump();
                            let body = self.parse_until(Some(Stop::Egroup))?;
                            self.expect_egroup()?;
                            out.push(Atom::Group(String::new(), Vec::new(), body));
                        }
                        Catcode::Egroup => {
                            return Err(Error::UnterminatedGroup(SourcePos::START));
                        }
                        Catcode::MathShift => {
                            flush(&mut plain, &mut out);
                            self.bump();
                            let display = matches!(self.peek(), Some(Token::Char(_, Catcode::MathShift)));
                            if display {
                                self.bump();
                                let body = self.parse_until(Some(Stop::MathDisplay))?;
                                out.push(Atom::MathGroup(crate::atom::MathType::Display, body));
                            } else {
                                let body = self.parse_until(Some(Stop::MathInline))?;
                                out.push(Atom::MathGroup(crate::atom::MathType::Inline, body));
                            }
                        }
                        Catcode::Supscript => {
                            flush(&mut plain, &mut out);
                            self.bump();
                            out.push(Atom::SupScript(self.parse_script_body()?));
                        }
                        Catcode::Subscript => {
                            flush(&mut plain, &mut out);
                            self.bump();
                            out.push(Atom::SubScript(self.parse_script_body()?));
                        }
                        Catcode::AlignTab => {
                            flush(&mut plain, &mut out);
                            self.bump();
                            out.push(Atom::AlignMark);
                        }
                        _ => {
                            self.bump();
                        }
                    }
                }
                Some(Token::ControlSequence { name, .. }) if name == "par" => {
                    flush(&mut plain, &mut out);
                    self.bump();
                    out.push(Atom::Par);
                }
                Some(Token::ControlSequence { name, active: false }) if name.starts_with("begin:") => {
                    flush(&mut plain, &mut out);
                    let env_name = name["begin:".len()..].to_string();
                    self.bump();
                    let end_marker = format!("end:{env_name}");
                    let body = self.parse_until(Some(Stop::Env(end_marker)))?;
                    self.bump(); // consume the end:<name> sentinel
                    out.push(Atom::Group(env_name, Vec::new(), body));
                }
                Some(Token::ControlSequence { name, .. }) if stop.as_ref().map_or(false, |s| matches!(s, Stop::Env(m) if m == name)) => {
                    flush(&mut plain, &mut out);
                    return Ok(out);
                }
                Some(Token::ControlSequence { name, active: false }) => {
                    flush(&mut plain, &mut out);
                    let name = name.clone();
                    self.bump();
                    let args = self.parse_command_args(&name)?;
                    out.push(Atom::Command(name, args));
                }
                Some(Token::ControlSequence { name, active: true }) => {
                    flush(&mut plain, &mut out);
                    plain.push(name.chars().next().unwrap_or_default());
                    self.bump();
                }
                Some(Token::Param { index, .. }) => {
                    flush(&mut plain, &mut out);
                    plain.push_str(&format!("#{index}"));
                    self.bump();
                }
            }
        }
    }

    fn double_math_shift_ahead(&self) -> bool {
        matches!(self.tokens.get(self.pos + 1), Some(Token::Char(_, Catcode::MathShift)))
    }

    fn expect_egroup(&mut self) -> Result<()> {
        match self.bump() {
            Some(Token::Char(_, Catcode::Egroup)) => Ok(()),
            _ => Err(Error::UnterminatedGroup(SourcePos::START)),
        }
    }

    fn parse_script_body(&mut self) -> Result<Vec<Atom>> {
        match self.peek() {
            Some(Token::Char(_, Catcode::Bgroup)) => {
                self.bump();
                let body = self.parse_until(Some(Stop::Egroup))?;
                self.expect_egroup()?;
                Ok(body)
            }
            Some(_) => self.parse_single_atom(),
            None => Ok(Vec::new()),
        }
    }

    /// Read exactly one token's worth of content, per §4.2's "Mandatory:
    /// ... else return the single token" rule (used whenever an argument
    /// or script body is not introduced by `{`).
    fn parse_single_atom(&mut self) -> Result<Vec<Atom>> {
        match self.bump().cloned() {
            Some(Token::Char(c, Catcode::Letter)) | Some(Token::Char(c, Catcode::Other)) => {
                Ok(vec![Atom::Plain(c.to_string())])
            }
            Some(Token::Char(_, Catcode::Space)) => Ok(vec![Atom::White]),
            Some(Token::ControlSequence { name, active: false }) if name == "par" => {
                Ok(vec![Atom::Par])
            }
            Some(Token::ControlSequence { name, active: false }) => {
                Ok(vec![Atom::Command(name, Vec::new())])
            }
            Some(Token::ControlSequence { name, active: true }) => Ok(vec![Atom::Plain(name)]),
            Some(Token::Param { index, .. }) => Ok(vec![Atom::Plain(format!("#{index}"))]),
            Some(_) => Ok(Vec::new()),
            None => Err(Error::MissingMandatoryArgument(SourcePos::START)),
        }
    }

    fn parse_command_args(&mut self, name: &str) -> Result<Vec<Arg>> {
        let mut args = Vec::new();
        if matches!(self.peek(), Some(Token::Char('*', Catcode::Other))) {
            self.bump();
            args.push(Arg::Star);
        }
        for slot in crate::atom::registered_argspec(name) {
            match self.parse_one_arg(*slot)? {
                Some(arg) => args.push(arg),
                None if slot.repeatable => break,
                None => continue,
            }
        }
        Ok(args)
    }

    fn parse_one_arg(&mut self, slot: ArgSlot) -> Result<Option<Arg>> {
        while matches!(self.peek(), Some(Token::Char(_, Catcode::Space))) {
            self.bump();
        }
        if slot.optional {
            if matches!(self.peek(), Some(Token::Char('[', Catcode::Other))) {
                self.bump();
                let body = self.parse_bracket_body()?;
                return Ok(Some(Arg::Optional(body)));
            }
            return Ok(None);
        }
        if slot.repeatable && !matches!(self.peek(), Some(Token::Char(_, Catcode::Bgroup))) {
            return Ok(None);
        }
        match self.peek() {
            Some(Token::Char(_, Catcode::Bgroup)) => {
                self.bump();
                let body = self.parse_until(Some(Stop::Egroup))?;
                self.expect_egroup()?;
                Ok(Some(Arg::Obligatory(body)))
            }
            Some(_) => {
                let body = self.parse_single_atom()?;
                Ok(Some(Arg::Obligatory(body)))
            }
            None => Err(Error::MissingMandatoryArgument(SourcePos::START)),
        }
    }

    /// Scan a `[...]` run, tracking bracket nesting depth so a caption
    /// or title containing its own `[`/`]` does not terminate early.
    fn parse_bracket_body(&mut self) -> Result<Vec<Atom>> {
        let mut depth = 1usize;
        let start = self.pos;
        loop {
            match self.peek() {
                Some(Token::Char('[', Catcode::Other)) => {
                    depth += 1;
                    self.bump();
                }
                Some(Token::Char(']', Catcode::Other)) => {
                    depth -= 1;
                    self.bump();
                    if depth == 0 {
                        break;
                    }
                }
                Some(_) => {
                    self.bump();
                }
                None => return Err(Error::DelimiterNotFound(SourcePos::START)),
            }
        }
        let inner = &self.tokens[start..self.pos - 1];
        parse(inner)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Stop {
    Egroup,
    MathInline,
    MathDisplay,
    Env(String),
}
