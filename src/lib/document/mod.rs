//! The document layer: state, semantic model, and the reader grammar
//! built on top of the [`crate::walker`] combinators (SPEC_FULL.md §3, §4.6).

pub mod meta;
pub mod model;
pub mod reader;

pub use meta::{BibDatabase, DocumentMeta};
pub use model::{Anchor, Block, BookRegion, Inline};
pub use reader::read_document;
