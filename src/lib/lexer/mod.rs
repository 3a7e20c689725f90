//! The catcode-driven lexer and integrated macro expander
//! (SPEC_FULL.md §4.2).
//!
//! [`Lexer`] is a demand-driven stream: callers pull tokens one at a
//! time via [`Lexer::next_token`], and the lexer reads characters (and
//! runs arbitrary macro expansion) only as far as it needs to produce
//! one. Already-expanded tokens are queued in
//! [`state::LexerState`]'s push-back buffer and drained before any new
//! character is read — see SPEC_FULL.md §9 for why this shape was
//! chosen over a transformer stack.

pub mod primitives;
pub mod state;

use std::path::{Path, PathBuf};

use crate::catcode::Catcode;
use crate::error::{Error, Result, SourcePos};
use crate::macros::{ArgSpec, ArgValue, DefinitionMode, MacroCommand, MacroEnvironment};
use crate::token::Token;
use primitives::PrimitiveId;
use state::{LexerLimits, LexerState};

/// One pending character source: either the original input or a file
/// spliced in by `\input`/`\include`. Only the line/column position is
/// per-frame — catcodes and macro bindings live in [`LexerState`] and
/// are shared across every frame, per SPEC_FULL.md §4.2.2.
struct CharFrame {
    chars: Vec<char>,
    idx: usize,
    pos: SourcePos,
}

impl CharFrame {
    fn new(source: &str) -> CharFrame {
        CharFrame {
            chars: source.chars().collect(),
            idx: 0,
            pos: SourcePos::START,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.idx += 1;
        self.pos.advance(c);
        Some(c)
    }

    fn at_end(&self) -> bool {
        self.idx >= self.chars.len()
    }
}

/// One open `\begin{...}`/`\end{...}` instance, tracked so `\end` knows
/// whether to splice a user environment's end-code or simply close the
/// structural marker left for the parser.
enum EnvFrameKind {
    /// A built-in structural name (`itemize`, `figure`, ...); the parser
    /// folds the `begin:<name>`/`end:<name>` sentinel tokens into a
    /// [`crate::atom::Atom::Group`].
    Builtin,
    /// A user-defined environment; holds its end-code, already
    /// substituted against the call-site arguments.
    UserDefined { end_code: Vec<Token> },
}

struct EnvFrame {
    kind: EnvFrameKind,
}

/// The catcode-driven lexer and macro expander.
pub struct Lexer {
    frames: Vec<CharFrame>,
    env_stack: Vec<EnvFrame>,
    state: LexerState,
    base_dir: PathBuf,
}

impl Lexer {
    /// Build a lexer reading `source`, with the given recursion/nesting
    /// limits (SPEC_FULL.md §5/§10).
    pub fn new(source: &str, limits: LexerLimits) -> Lexer {
        Lexer {
            frames: vec![CharFrame::new(source)],
            env_stack: Vec::new(),
            state: LexerState::new(limits),
            base_dir: PathBuf::new(),
        }
    }

    /// Directory `\input`/`\include` filenames are resolved relative to.
    pub fn set_base_dir(&mut self, dir: impl Into<PathBuf>) {
        self.base_dir = dir.into();
    }

    /// Current source position (of the innermost open file frame).
    pub fn pos(&self) -> SourcePos {
        self.frames.last().map(|f| f.pos).unwrap_or(self.state.pos)
    }

    // -- character-level reading -----------------------------------------

    fn peek_char(&self) -> Option<char> {
        self.frames.last().and_then(CharFrame::peek)
    }

    fn bump_char(&mut self) -> Option<char> {
        loop {
            let frame = self.frames.last_mut()?;
            if let Some(c) = frame.bump() {
                self.state.pos = frame.pos;
                return Some(c);
            }
            if self.frames.len() == 1 {
                return None;
            }
            self.frames.pop();
        }
    }

    fn catcode_of(&self, c: char) -> Catcode {
        self.state.catcodes.catcode_of(c)
    }

    /// Splice a file's contents in at the current read point
    /// (`\input`/`\include`); catcodes and macros are untouched, only
    /// the position tracking is reset for the new file.
    pub fn input_file(&mut self, path: &Path) -> Result<()> {
        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        };
        let contents = std::fs::read_to_string(&resolved).map_err(|e| {
            Error::IncludeFailed(self.pos(), resolved.display().to_string(), e.to_string())
        })?;
        self.frames.push(CharFrame::new(&contents));
        Ok(())
    }

    // -- one raw (unexpanded) token ---------------------------------------

    fn read_cs_name(&mut self) -> String {
        match self.peek_char() {
            None => String::new(),
            Some(c) if self.catcode_of(c) == Catcode::Letter => {
                let mut name = String::new();
                while let Some(c2) = self.peek_char() {
                    if self.catcode_of(c2) == Catcode::Letter {
                        name.push(c2);
                        self.bump_char();
                    } else {
                        break;
                    }
                }
                while let Some(c2) = self.peek_char() {
                    if self.catcode_of(c2) == Catcode::Space {
                        self.bump_char();
                    } else {
                        break;
                    }
                }
                name
            }
            Some(c) => {
                self.bump_char();
                c.to_string()
            }
        }
    }

    fn handle_eol(&mut self) -> Token {
        let mut newlines = 1usize;
        loop {
            match self.peek_char() {
                Some(c) if self.catcode_of(c) == Catcode::Space => {
                    self.bump_char();
                }
                Some(c) if self.catcode_of(c) == Catcode::Eol => {
                    self.bump_char();
                    newlines += 1;
                }
                _ => break,
            }
        }
        if newlines >= 2 {
            Token::cs("par")
        } else {
            Token::Char(' ', Catcode::Space)
        }
    }

    fn skip_to_eol(&mut self) {
        while let Some(c) = self.peek_char() {
            if self.catcode_of(c) == Catcode::Eol {
                break;
            }
            self.bump_char();
        }
    }

    /// Tokenize exactly one token straight from the character source,
    /// per SPEC_FULL.md §4.2's per-character dispatch table. Control
    /// sequences are *never* expanded here — that is `next_token`'s job.
    fn read_token_from_chars(&mut self) -> Result<Option<Token>> {
        loop {
            let c = match self.bump_char() {
                Some(c) => c,
                None => return Ok(None),
            };
            let cat = self.catcode_of(c);
            return Ok(Some(match cat {
                Catcode::Escape => {
                    let name = self.read_cs_name();
                    Token::ControlSequence { name, active: false }
                }
                Catcode::Bgroup => {
                    self.state.push_group()?;
                    Token::Char(c, cat)
                }
                Catcode::Egroup => {
                    self.state.pop_group()?;
                    Token::Char(c, cat)
                }
                Catcode::Comment => {
                    self.skip_to_eol();
                    continue;
                }
                Catcode::Eol => self.handle_eol(),
                Catcode::Space => {
                    while let Some(c2) = self.peek_char() {
                        if self.catcode_of(c2) == Catcode::Space {
                            self.bump_char();
                        } else {
                            break;
                        }
                    }
                    Token::Char(' ', Catcode::Space)
                }
                Catcode::ParamPrefix => match self.peek_char() {
                    Some(d) if d.is_ascii_digit() && d != '0' => {
                        self.bump_char();
                        Token::Param {
                            index: d.to_digit(10).unwrap() as u8,
                            depth: 1,
                        }
                    }
                    _ => Token::Char(c, cat),
                },
                Catcode::Active => Token::active(c),
                Catcode::Ignored => continue,
                Catcode::Invalid => continue,
                Catcode::Letter
                | Catcode::Other
                | Catcode::MathShift
                | Catcode::Supscript
                | Catcode::Subscript
                | Catcode::AlignTab => Token::Char(c, cat),
            }));
        }
    }

    fn next_raw_token(&mut self) -> Result<Option<Token>> {
        if let Some(tok) = self.state.pop_pushback() {
            return Ok(Some(tok));
        }
        self.read_token_from_chars()
    }

    // -- the expanded stream ----------------------------------------------

    /// Return the next token, running macro expansion and primitive
    /// execution until a terminal (non-expandable) token is produced.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        loop {
            let tok = match self.next_raw_token()? {
                Some(t) => t,
                None => return Ok(None),
            };
            let key = match tok.macro_key() {
                Some((name, active)) => (name.to_string(), active),
                None => return Ok(Some(tok)),
            };
            match self.state.macros.get(&key).cloned() {
                Some(MacroCommand::UserMacro { args, body, .. }) => {
                    self.expand_user_macro(&args, &body)?;
                }
                Some(MacroCommand::Primitive { identifier }) => {
                    self.execute_primitive(&identifier, &key.0)?;
                }
                Some(MacroCommand::ImplicitChar(c, cat)) => return Ok(Some(Token::Char(c, cat))),
                None => return Ok(Some(tok)),
            }
        }
    }

    fn expand_user_macro(&mut self, specs: &[ArgSpec], body: &[Token]) -> Result<()> {
        self.state.enter_expansion()?;
        let mut values = Vec::with_capacity(specs.len());
        for spec in specs {
            values.push(self.read_argument(spec)?);
        }
        let substituted = substitute_params(body, &values);
        self.state.splice_front(substituted);
        self.state.leave_expansion();
        Ok(())
    }

    // -- argument parsing (SPEC_FULL.md §4.2, parseArgspec) ---------------

    fn skip_expanded_spaces(&mut self) -> Result<()> {
        loop {
            let tok = match self.next_token()? {
                Some(t) => t,
                None => return Ok(()),
            };
            if tok.is_catcode(Catcode::Space) {
                continue;
            }
            self.state.push_front(tok);
            return Ok(());
        }
    }

    fn read_group_expanded(&mut self) -> Result<Vec<Token>> {
        let mut depth = 1usize;
        let mut out = Vec::new();
        loop {
            let tok = self
                .next_token()?
                .ok_or(Error::UnterminatedGroup(self.pos()))?;
            if tok.is_bgroup() {
                depth += 1;
                out.push(tok);
            } else if tok.is_egroup() {
                depth -= 1;
                if depth == 0 {
                    return Ok(out);
                }
                out.push(tok);
            } else {
                out.push(tok);
            }
        }
    }

    fn read_group_raw(&mut self) -> Result<Vec<Token>> {
        let mut depth = 1usize;
        let mut out = Vec::new();
        loop {
            let tok = self
                .next_raw_token()?
                .ok_or(Error::UnterminatedGroup(self.pos()))?;
            if tok.is_bgroup() {
                depth += 1;
                out.push(tok);
            } else if tok.is_egroup() {
                depth -= 1;
                if depth == 0 {
                    return Ok(out);
                }
                out.push(tok);
            } else {
                out.push(tok);
            }
        }
    }

    /// Raw mandatory-argument read: a braced group (outer braces
    /// stripped) or a single raw token. Used for definitional syntax
    /// (`\def`, `\let`, `\newcommand` names, environment names) which
    /// must not expand macros while scanning its own grammar.
    fn read_mandatory_raw(&mut self) -> Result<Vec<Token>> {
        loop {
            let tok = self
                .next_raw_token()?
                .ok_or(Error::MissingMandatoryArgument(self.pos()))?;
            if tok.is_catcode(Catcode::Space) {
                continue;
            }
            if tok.is_bgroup() {
                return self.read_group_raw();
            }
            return Ok(vec![tok]);
        }
    }

    fn read_argument(&mut self, spec: &ArgSpec) -> Result<ArgValue> {
        match spec {
            ArgSpec::Mandatory => {
                self.skip_expanded_spaces()?;
                let tok = self
                    .next_token()?
                    .ok_or(Error::MissingMandatoryArgument(self.pos()))?;
                if tok.is_bgroup() {
                    Ok(ArgValue::Tokens(self.read_group_expanded()?))
                } else {
                    Ok(ArgValue::Tokens(vec![tok]))
                }
            }
            ArgSpec::Until(delim) => {
                let mut collected = Vec::new();
                loop {
                    if collected.len() >= delim.len()
                        && collected[collected.len() - delim.len()..] == delim[..]
                    {
                        collected.truncate(collected.len() - delim.len());
                        return Ok(ArgValue::Tokens(collected));
                    }
                    match self.next_token()? {
                        Some(tok) => collected.push(tok),
                        None => return Err(Error::DelimiterNotFound(self.pos())),
                    }
                }
            }
            ArgSpec::UntilCatcode(cat) => {
                let mut collected = Vec::new();
                loop {
                    match self.next_token()? {
                        Some(tok) if tok.is_catcode(*cat) => {
                            return Ok(ArgValue::Tokens(collected));
                        }
                        Some(tok) => collected.push(tok),
                        None => return Err(Error::DelimiterNotFound(self.pos())),
                    }
                }
            }
            ArgSpec::Delimited(open, close, default) => {
                self.skip_expanded_spaces()?;
                let first = self.next_token()?;
                match first {
                    Some(tok) if tok == *open => {
                        let mut collected = Vec::new();
                        loop {
                            match self.next_token()? {
                                Some(tok) if tok == *close => {
                                    return Ok(ArgValue::Tokens(collected));
                                }
                                Some(tok) => collected.push(tok),
                                None => return Err(Error::DelimiterNotFound(self.pos())),
                            }
                        }
                    }
                    Some(tok) => {
                        self.state.push_front(tok);
                        match default {
                            Some(def) => Ok(ArgValue::Tokens(def.clone())),
                            None => Err(Error::DelimiterNotFound(self.pos())),
                        }
                    }
                    None => match default {
                        Some(def) => Ok(ArgValue::Tokens(def.clone())),
                        None => Err(Error::DelimiterNotFound(self.pos())),
                    },
                }
            }
            ArgSpec::OptionalGroup(open, close, default) => {
                self.skip_expanded_spaces()?;
                match self.next_token()? {
                    Some(tok) if tok == *open => {
                        let mut collected = Vec::new();
                        loop {
                            match self.next_token()? {
                                Some(tok) if tok == *close => {
                                    return Ok(ArgValue::Tokens(collected));
                                }
                                Some(tok) => collected.push(tok),
                                None => return Err(Error::DelimiterNotFound(self.pos())),
                            }
                        }
                    }
                    Some(tok) => {
                        self.state.push_front(tok);
                        Ok(match default {
                            Some(def) => ArgValue::Tokens(def.clone()),
                            None => ArgValue::NoValue,
                        })
                    }
                    None => Ok(match default {
                        Some(def) => ArgValue::Tokens(def.clone()),
                        None => ArgValue::NoValue,
                    }),
                }
            }
            ArgSpec::OptionalGroupByCatcode => {
                self.skip_expanded_spaces()?;
                match self.next_token()? {
                    Some(tok) if tok.is_bgroup() => Ok(ArgValue::Tokens(self.read_group_expanded()?)),
                    Some(tok) => {
                        self.state.push_front(tok);
                        Ok(ArgValue::NoValue)
                    }
                    None => Ok(ArgValue::NoValue),
                }
            }
            ArgSpec::OptionalToken(t) => match self.next_token()? {
                Some(tok) if tok == *t => Ok(ArgValue::Boolean(true)),
                Some(tok) => {
                    self.state.push_front(tok);
                    Ok(ArgValue::Boolean(false))
                }
                None => Ok(ArgValue::Boolean(false)),
            },
            ArgSpec::LiteralToken(t) => match self.next_token()? {
                Some(tok) if tok == *t => Ok(ArgValue::Tokens(vec![])),
                Some(tok) => {
                    self.state.push_front(tok);
                    Err(Error::DelimiterNotFound(self.pos()))
                }
                None => Err(Error::DelimiterNotFound(self.pos())),
            },
        }
    }

    // -- primitive execution (SPEC_FULL.md §4.2.2) ------------------------

    fn execute_primitive(&mut self, identifier: &str, cs_name: &str) -> Result<()> {
        let id = match PrimitiveId::from_name(identifier) {
            Some(id) => id,
            None => return Ok(()),
        };
        match id {
            PrimitiveId::BeginGroup | PrimitiveId::Bgroup => self.state.push_group(),
            PrimitiveId::EndGroup | PrimitiveId::Egroup => self.state.pop_group(),
            PrimitiveId::Begin => self.exec_begin(),
            PrimitiveId::End => self.exec_end(),
            PrimitiveId::Def => self.exec_def(),
            PrimitiveId::Let => self.exec_let(),
            PrimitiveId::Catcode => self.exec_catcode(),
            PrimitiveId::NewCommand
            | PrimitiveId::RenewCommand
            | PrimitiveId::ProvideCommand
            | PrimitiveId::DeclareRobustCommand => self.exec_newcommand(id.definition_mode().unwrap()),
            PrimitiveId::NewEnvironment | PrimitiveId::RenewEnvironment => {
                self.exec_newenvironment(id.definition_mode().unwrap())
            }
            PrimitiveId::NewDocumentCommand
            | PrimitiveId::RenewDocumentCommand
            | PrimitiveId::ProvideDocumentCommand
            | PrimitiveId::DeclareDocumentCommand => {
                self.exec_new_document_command(id.definition_mode().unwrap())
            }
            PrimitiveId::NewDocumentEnvironment
            | PrimitiveId::RenewDocumentEnvironment
            | PrimitiveId::ProvideDocumentEnvironment
            | PrimitiveId::DeclareDocumentEnvironment => {
                self.exec_new_document_environment(id.definition_mode().unwrap())
            }
            PrimitiveId::IfTrue => {
                self.state.push_conditional(true);
                Ok(())
            }
            PrimitiveId::IfFalse => {
                self.state.push_conditional(false);
                self.skip_conditional_branch()
            }
            PrimitiveId::Else => {
                self.state.flip_conditional()?;
                self.skip_to_fi()
            }
            PrimitiveId::Fi => self.state.pop_conditional(),
            PrimitiveId::IfBooleanTF => self.exec_if_tf("BooleanTrue"),
            PrimitiveId::IfNoValueTF => self.exec_if_tf("NoValue"),
            PrimitiveId::Input | PrimitiveId::Include => self.exec_input(),
            PrimitiveId::Year | PrimitiveId::Month | PrimitiveId::Day | PrimitiveId::Time => {
                self.exec_clock(id)
            }
            PrimitiveId::Meaning => self.exec_meaning(),
            PrimitiveId::Char => self.exec_char(),
            PrimitiveId::Number => {
                // No arithmetic/registers (SPEC_FULL.md Non-goals): the
                // single mandatory group is re-emitted verbatim.
                let group = self.read_mandatory_raw()?;
                self.state.splice_front(group);
                Ok(())
            }
            PrimitiveId::Undefined => Ok(()),
            PrimitiveId::InlineMathOpen
            | PrimitiveId::InlineMathClose
            | PrimitiveId::DisplayMathOpen
            | PrimitiveId::DisplayMathClose => {
                self.state.push_front(Token::cs(cs_name));
                Ok(())
            }
            PrimitiveId::Unknown => Ok(()),
        }
    }

    fn exec_begin(&mut self) -> Result<()> {
        let name_tokens = self.read_mandatory_raw()?;
        let name = detokenize_name(&name_tokens);
        if let Some(env) = self.state.environments.get(&name_tokens).cloned() {
            let values = self.read_args(&env.args)?;
            let start = substitute_params(&env.start_code, &values);
            let end = substitute_params(&env.end_code, &values);
            self.state.push_group()?;
            self.env_stack.push(EnvFrame {
                kind: EnvFrameKind::UserDefined { end_code: end },
            });
            self.state.splice_front(start);
        } else {
            self.state.push_group()?;
            self.env_stack.push(EnvFrame {
                kind: EnvFrameKind::Builtin,
            });
            self.state.push_front(Token::cs(format!("begin:{name}")));
        }
        Ok(())
    }

    fn exec_end(&mut self) -> Result<()> {
        let name_tokens = self.read_mandatory_raw()?;
        let name = detokenize_name(&name_tokens);
        let frame = self
            .env_stack
            .pop()
            .ok_or(Error::UnterminatedGroup(self.pos()))?;
        self.state.pop_group()?;
        match frame.kind {
            EnvFrameKind::Builtin => self.state.push_front(Token::cs(format!("end:{name}"))),
            EnvFrameKind::UserDefined { end_code } => self.state.splice_front(end_code),
        }
        Ok(())
    }

    fn read_args(&mut self, specs: &[ArgSpec]) -> Result<Vec<ArgValue>> {
        specs.iter().map(|spec| self.read_argument(spec)).collect()
    }

    fn exec_def(&mut self) -> Result<()> {
        let name_tok = self
            .next_raw_token()?
            .ok_or(Error::MissingMandatoryArgument(self.pos()))?;
        let (name, active) = name_tok
            .macro_key()
            .map(|(n, a)| (n.to_string(), a))
            .unwrap_or(("relax".to_string(), false));

        let mut args = Vec::new();
        loop {
            match self.next_raw_token()? {
                Some(tok) if tok.is_bgroup() => {
                    self.state.push_front(tok);
                    break;
                }
                Some(Token::Param { .. }) => args.push(ArgSpec::Mandatory),
                Some(_) => {}
                None => return Err(Error::UnterminatedGroup(self.pos())),
            }
        }
        self.next_raw_token()?; // consume the opening brace
        let body = self.read_group_raw()?;
        self.state.define_macro(
            (name.clone(), active),
            MacroCommand::UserMacro {
                name,
                active,
                args,
                body,
            },
        );
        Ok(())
    }

    fn exec_let(&mut self) -> Result<()> {
        let target = self
            .next_raw_token()?
            .ok_or(Error::MissingMandatoryArgument(self.pos()))?;
        let (name, active) = target
            .macro_key()
            .map(|(n, a)| (n.to_string(), a))
            .ok_or(Error::MissingMandatoryArgument(self.pos()))?;

        // Optional `=` and spaces, TeX's classic `\let\a=\b` spelling.
        loop {
            match self.next_raw_token()? {
                Some(Token::Char(c, _)) if c == '=' || c == ' ' => continue,
                Some(tok) => {
                    self.bind_let(name, active, tok);
                    return Ok(());
                }
                None => return Err(Error::MissingMandatoryArgument(self.pos())),
            }
        }
    }

    fn bind_let(&mut self, name: String, active: bool, to_tok: Token) {
        let cmd = match &to_tok {
            Token::Char(c, cat) => MacroCommand::ImplicitChar(*c, *cat),
            Token::ControlSequence { .. } => to_tok
                .macro_key()
                .and_then(|k| self.state.macros.get(&(k.0.to_string(), k.1)).cloned())
                .unwrap_or_else(|| MacroCommand::primitive("undefined")),
            Token::Param { .. } => MacroCommand::primitive("undefined"),
        };
        self.state.define_macro((name, active), cmd);
    }

    fn exec_catcode(&mut self) -> Result<()> {
        let char_tokens = self.read_mandatory_raw()?;
        let c = char_tokens
            .first()
            .and_then(token_as_char)
            .ok_or(Error::MissingMandatoryArgument(self.pos()))?;
        let num_tokens = self.read_mandatory_raw()?;
        let digits = detokenize_name(&num_tokens);
        let n: u8 = digits
            .parse()
            .map_err(|_| Error::InvalidCategoryCode(self.pos(), digits.clone()))?;
        let cat = Catcode::try_from_u8(n).ok_or(Error::InvalidCategoryCode(self.pos(), digits))?;
        self.state.set_catcode(c, cat);
        Ok(())
    }

    fn exec_newcommand(&mut self, mode: DefinitionMode) -> Result<()> {
        let name_tokens = self.read_mandatory_raw()?;
        let (name, active) = name_tokens
            .first()
            .and_then(Token::macro_key)
            .map(|(n, a)| (n.to_string(), a))
            .ok_or(Error::MissingMandatoryArgument(self.pos()))?;

        let num_args = self.read_optional_count()?;
        let default = self.read_optional_default()?;
        let body = self.read_mandatory_raw()?;

        let already = self.state.macros.contains_key(&(name.clone(), active));
        if !primitives::check_definition_clash(mode, &name, already, self.pos())? {
            return Ok(());
        }
        let args = primitives::simple_argspec(num_args, default);
        self.state.define_macro(
            (name.clone(), active),
            MacroCommand::UserMacro {
                name,
                active,
                args,
                body,
            },
        );
        Ok(())
    }

    /// `[n]`: an optional bracketed argument count, 0 if absent.
    fn read_optional_count(&mut self) -> Result<u8> {
        match self.next_raw_token()? {
            Some(tok) if matches!(tok, Token::Char('[', _)) => {
                let mut digits = String::new();
                loop {
                    match self.next_raw_token()? {
                        Some(Token::Char(']', _)) => break,
                        Some(Token::Char(c, _)) => digits.push(c),
                        Some(_) | None => return Err(Error::DelimiterNotFound(self.pos())),
                    }
                }
                Ok(digits.trim().parse().unwrap_or(0))
            }
            Some(tok) => {
                self.state.push_front(tok);
                Ok(0)
            }
            None => Ok(0),
        }
    }

    /// `[default]`: an optional bracketed default for the first argument.
    fn read_optional_default(&mut self) -> Result<Option<Vec<Token>>> {
        match self.next_raw_token()? {
            Some(Token::Char('[', _)) => {
                let mut depth = 1usize;
                let mut out = Vec::new();
                loop {
                    match self.next_raw_token()? {
                        Some(Token::Char('[', cat)) => {
                            depth += 1;
                            out.push(Token::Char('[', cat));
                        }
                        Some(Token::Char(']', cat)) => {
                            depth -= 1;
                            if depth == 0 {
                                return Ok(Some(out));
                            }
                            out.push(Token::Char(']', cat));
                        }
                        Some(tok) => out.push(tok),
                        None => return Err(Error::DelimiterNotFound(self.pos())),
                    }
                }
            }
            Some(tok) => {
                self.state.push_front(tok);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn exec_newenvironment(&mut self, mode: DefinitionMode) -> Result<()> {
        let name_tokens = self.read_mandatory_raw()?;
        let name_str = detokenize_name(&name_tokens);
        let num_args = self.read_optional_count()?;
        let default = self.read_optional_default()?;
        let start_code = self.read_mandatory_raw()?;
        let end_code = self.read_mandatory_raw()?;

        let already = self.state.environments.contains_key(&name_tokens);
        if !primitives::check_definition_clash(mode, &name_str, already, self.pos())? {
            return Ok(());
        }
        let args = primitives::simple_argspec(num_args, default);
        self.state.define_environment(
            name_tokens,
            MacroEnvironment {
                name_tokens: vec![],
                args,
                start_code,
                end_code,
            },
        );
        Ok(())
    }

    /// Parse xparse's tiny argument-specification mini-language: a
    /// braced run of letters (optionally space-separated), where `m` is
    /// mandatory, `o` is an optional `[...]` group and `s` is a star/flag.
    /// Other xparse letters are not part of the supported authoring
    /// surface (SPEC_FULL.md Non-goals) and are skipped.
    fn parse_xparse_argspec(&mut self, raw: &[Token]) -> Vec<ArgSpec> {
        let mut specs = Vec::new();
        for tok in raw {
            if let Token::Char(c, _) = tok {
                match c {
                    'm' => specs.push(ArgSpec::Mandatory),
                    'o' => specs.push(ArgSpec::OptionalGroup(
                        Token::char('[', Catcode::Other),
                        Token::char(']', Catcode::Other),
                        None,
                    )),
                    's' => specs.push(ArgSpec::OptionalToken(Token::char('*', Catcode::Other))),
                    _ => {}
                }
            }
        }
        specs
    }

    fn exec_new_document_command(&mut self, mode: DefinitionMode) -> Result<()> {
        let name_tokens = self.read_mandatory_raw()?;
        let (name, active) = name_tokens
            .first()
            .and_then(Token::macro_key)
            .map(|(n, a)| (n.to_string(), a))
            .ok_or(Error::MissingMandatoryArgument(self.pos()))?;
        let argspec_raw = self.read_mandatory_raw()?;
        let body = self.read_mandatory_raw()?;

        let already = self.state.macros.contains_key(&(name.clone(), active));
        if !primitives::check_definition_clash(mode, &name, already, self.pos())? {
            return Ok(());
        }
        let args = self.parse_xparse_argspec(&argspec_raw);
        self.state.define_macro(
            (name.clone(), active),
            MacroCommand::UserMacro {
                name,
                active,
                args,
                body,
            },
        );
        Ok(())
    }

    fn exec_new_document_environment(&mut self, mode: DefinitionMode) -> Result<()> {
        let name_tokens = self.read_mandatory_raw()?;
        let name_str = detokenize_name(&name_tokens);
        let argspec_raw = self.read_mandatory_raw()?;
        let start_code = self.read_mandatory_raw()?;
        let end_code = self.read_mandatory_raw()?;

        let already = self.state.environments.contains_key(&name_tokens);
        if !primitives::check_definition_clash(mode, &name_str, already, self.pos())? {
            return Ok(());
        }
        let args = self.parse_xparse_argspec(&argspec_raw);
        self.state.define_environment(
            name_tokens,
            MacroEnvironment {
                name_tokens: vec![],
                args,
                start_code,
                end_code,
            },
        );
        Ok(())
    }

    fn exec_if_tf(&mut self, true_marker: &str) -> Result<()> {
        let cond = self.read_mandatory_raw()?;
        let true_branch = self.read_mandatory_raw()?;
        let false_branch = self.read_mandatory_raw()?;
        let is_true = cond.len() == 1 && cond[0].is_cs(true_marker);
        self.state
            .splice_front(if is_true { true_branch } else { false_branch });
        Ok(())
    }

    fn skip_conditional_branch(&mut self) -> Result<()> {
        let mut depth = 0usize;
        loop {
            let tok = self
                .next_raw_token()?
                .ok_or(Error::UnterminatedConditional(self.pos()))?;
            if let Some((name, false)) = tok.macro_key() {
                match name {
                    "iftrue" | "iffalse" => depth += 1,
                    "fi" => {
                        if depth == 0 {
                            self.state.pop_conditional()?;
                            return Ok(());
                        }
                        depth -= 1;
                    }
                    "else" if depth == 0 => {
                        self.state.flip_conditional()?;
                        return Ok(());
                    }
                    _ => {}
                }
            }
        }
    }

    fn skip_to_fi(&mut self) -> Result<()> {
        let mut depth = 0usize;
        loop {
            let tok = self
                .next_raw_token()?
                .ok_or(Error::UnterminatedConditional(self.pos()))?;
            if let Some((name, false)) = tok.macro_key() {
                match name {
                    "iftrue" | "iffalse" => depth += 1,
                    "fi" => {
                        if depth == 0 {
                            self.state.pop_conditional()?;
                            return Ok(());
                        }
                        depth -= 1;
                    }
                    _ => {}
                }
            }
        }
    }

    fn exec_input(&mut self) -> Result<()> {
        let name_tokens = self.read_mandatory_raw()?;
        let mut name = detokenize_name(&name_tokens);
        if !name.contains('.') {
            name.push_str(".tex");
        }
        self.input_file(Path::new(&name))
    }

    fn exec_clock(&mut self, id: PrimitiveId) -> Result<()> {
        let (year, month, day, minutes_since_midnight) = current_clock();
        let text = match id {
            PrimitiveId::Year => year.to_string(),
            PrimitiveId::Month => month.to_string(),
            PrimitiveId::Day => day.to_string(),
            PrimitiveId::Time => minutes_since_midnight.to_string(),
            _ => unreachable!(),
        };
        self.state
            .splice_front(text.chars().map(|c| Token::Char(c, Catcode::Other)).collect());
        Ok(())
    }

    fn exec_meaning(&mut self) -> Result<()> {
        let tok = self
            .next_raw_token()?
            .ok_or(Error::MissingMandatoryArgument(self.pos()))?;
        let description = match tok.macro_key() {
            Some((name, active)) => match self.state.macros.get(&(name.to_string(), active)) {
                Some(MacroCommand::UserMacro { .. }) => format!("macro:->{name}"),
                Some(MacroCommand::Primitive { identifier }) => format!("\\{identifier}"),
                Some(MacroCommand::ImplicitChar(c, _)) => format!("the character {c}"),
                None => "undefined".to_string(),
            },
            None => tok.to_string(),
        };
        self.state.splice_front(
            description
                .chars()
                .map(|c| Token::Char(c, Catcode::Other))
                .collect(),
        );
        Ok(())
    }

    fn exec_char(&mut self) -> Result<()> {
        let num_tokens = self.read_mandatory_raw()?;
        let digits = detokenize_name(&num_tokens);
        let code: u32 = digits
            .trim()
            .parse()
            .map_err(|_| Error::MissingMandatoryArgument(self.pos()))?;
        let c = char::from_u32(code).unwrap_or('\u{fffd}');
        self.state.push_front(Token::Char(c, Catcode::Other));
        Ok(())
    }
}

fn token_as_char(tok: &Token) -> Option<char> {
    match tok {
        Token::Char(c, _) => Some(*c),
        Token::ControlSequence { name, active: true } => name.chars().next(),
        _ => None,
    }
}

fn detokenize_name(tokens: &[Token]) -> String {
    tokens.iter().map(|t| t.detokenize('\\')).collect()
}

/// In-body parameter substitution (SPEC_FULL.md §4.2.1): `#1` at
/// nesting depth 1 becomes the corresponding argument's tokens; `#1` at
/// depth `n>1` survives as `#1` at depth `n-1`, which is how TeX encodes
/// parameters of a macro defined *inside* another macro's body.
pub fn substitute_params(body: &[Token], args: &[ArgValue]) -> Vec<Token> {
    let mut out = Vec::with_capacity(body.len());
    for tok in body {
        match tok {
            Token::Param { index, depth: 1 } => {
                if let Some(val) = args.get((*index as usize).saturating_sub(1)) {
                    match val {
                        ArgValue::Tokens(ts) => out.extend(ts.iter().cloned()),
                        ArgValue::Boolean(true) => out.push(Token::cs("BooleanTrue")),
                        ArgValue::Boolean(false) => out.push(Token::cs("BooleanFalse")),
                        ArgValue::NoValue => out.push(Token::cs("NoValue")),
                    }
                }
            }
            Token::Param { index, depth } => out.push(Token::Param {
                index: *index,
                depth: depth - 1,
            }),
            other => out.push(other.clone()),
        }
    }
    out
}

/// A minimal, dependency-free `(year, month, day, minutes-since-midnight)`
/// read of the wall clock, used only by `\year`/`\month`/`\day`/`\time`.
/// Implements Howard Hinnant's `civil_from_days` algorithm so no date
/// crate is required for what is, in the supported document style, a
/// rarely-used primitive.
fn current_clock() -> (i64, u32, u32, u32) {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = now.as_secs() as i64;
    let days = secs.div_euclid(86_400);
    let time_of_day = secs.rem_euclid(86_400);
    let (y, m, d) = civil_from_days(days);
    (y, m, d, (time_of_day / 60) as u32)
}

fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

pub use state::LexerLimits as Limits;

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens_of(src: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(src, LexerLimits::default());
        let mut out = Vec::new();
        while let Some(tok) = lexer.next_token().unwrap() {
            out.push(tok);
        }
        out
    }

    #[test]
    fn plain_text_tokenizes_as_chars() {
        let toks = tokens_of("ab");
        assert_eq!(
            toks,
            vec![
                Token::Char('a', Catcode::Letter),
                Token::Char('b', Catcode::Letter),
            ]
        );
    }

    #[test]
    fn comment_is_discarded_to_eol() {
        let toks = tokens_of("a%comment\nb");
        assert_eq!(
            toks,
            vec![
                Token::Char('a', Catcode::Letter),
                Token::Char('b', Catcode::Letter),
            ]
        );
    }

    #[test]
    fn double_newline_yields_par() {
        let toks = tokens_of("a\n\nb");
        assert_eq!(toks[1], Token::cs("par"));
    }

    #[test]
    fn single_newline_yields_space() {
        let toks = tokens_of("a\nb");
        assert_eq!(toks[1], Token::Char(' ', Catcode::Space));
    }

    #[test]
    fn braces_push_and_pop_groups() {
        let mut lexer = Lexer::new("{a}", LexerLimits::default());
        assert_eq!(lexer.next_token().unwrap(), Some(Token::Char('{', Catcode::Bgroup)));
        assert_eq!(lexer.state.group_depth(), 1);
        lexer.next_token().unwrap();
        assert_eq!(lexer.next_token().unwrap(), Some(Token::Char('}', Catcode::Egroup)));
        assert_eq!(lexer.state.group_depth(), 0);
    }

    #[test]
    fn unbalanced_group_is_fatal() {
        let mut lexer = Lexer::new("{a", LexerLimits::default());
        while lexer.next_token().unwrap().is_some() {}
        // The EOF itself is fine; closing never happens but that is only
        // detected by the caller checking group_depth() == 0 at EOF, per
        // the invariant in SPEC_FULL.md §3.
        assert_eq!(lexer.state.group_depth(), 1);
    }

    #[test]
    fn def_and_call_expands_with_parameter_substitution() {
        let toks = tokens_of("\\def\\foo#1{hello #1}\\foo{world}");
        let text: String = toks
            .iter()
            .map(|t| match t {
                Token::Char(c, _) => c.to_string(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(text, "hello world");
    }

    #[test]
    fn newcommand_with_default_optional_argument() {
        let toks = tokens_of("\\newcommand{\\greet}[1][World]{Hi #1}\\greet\\greet[You]");
        let text: String = toks
            .iter()
            .filter_map(|t| match t {
                Token::Char(c, _) => Some(*c),
                _ => None,
            })
            .collect();
        assert_eq!(text, "Hi WorldHi You");
    }

    #[test]
    fn conditionals_pick_the_right_branch() {
        let toks = tokens_of("\\iftrue A\\else B\\fi\\iffalse C\\else D\\fi");
        let text: String = toks
            .iter()
            .filter_map(|t| match t {
                Token::Char(c, _) => Some(*c),
                _ => None,
            })
            .collect();
        assert_eq!(text, " A D");
    }

    #[test]
    fn let_aliases_a_character() {
        let toks = tokens_of("\\let\\x=a\\x");
        assert_eq!(toks, vec![Token::Char('a', Catcode::Letter)]);
    }

    #[test]
    fn recursion_guard_reports_fatal_error() {
        let mut lexer = Lexer::new(
            "\\def\\loop{\\loop}\\loop",
            LexerLimits {
                max_group_depth: 16,
                max_expansion_depth: 8,
            },
        );
        let mut err = None;
        loop {
            match lexer.next_token() {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(e) => {
                    err = Some(e);
                    break;
                }
            }
        }
        assert!(matches!(err, Some(Error::RecursionLimitExceeded(_, _))));
    }
}
