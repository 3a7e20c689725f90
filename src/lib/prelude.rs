//! Re-exports most useful components from this crate.

pub use crate::atom::{Arg, Atom, MathType, TeXDocument};
pub use crate::catcode::Catcode;
pub use crate::document::{read_document, Anchor, Block, BookRegion, Inline};
pub use crate::document::meta::{BibDatabase, DocumentMeta};
pub use crate::error::{Error, Result, SourcePos};
pub use crate::lexer::{Lexer, LexerLimits};
pub use crate::token::Token;
