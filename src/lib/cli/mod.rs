//! Command line surface (SPEC_FULL.md §6, §10).
//!
//! Gated behind the `cli` feature so the library itself never pulls in
//! `clap`/`wild`. This module only wires the pipeline (lexer → parser →
//! filter → document reader) together and hands the result to a
//! [`Renderer`]; an HTML/XML emitter is out of scope (spec.md
//! Non-goals), so both [`Target`]s currently go through [`DebugRenderer`].

pub mod color;
pub mod io;

use std::path::PathBuf;

use clap::Parser;

use crate::diagnostics::DiagnosticSink;
use crate::document::meta::BibDatabase;
use crate::document::model::Block;
use crate::error::Result;
use crate::lexer::{Lexer, LexerLimits};

/// Output target. Both currently render identically; the flag is kept
/// stable for when a real emitter lands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Target {
    Xml,
    Html,
}

/// `texfront`'s command line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about = "Convert a TeX/LaTeX document into its semantic document model.")]
pub struct Cli {
    /// TeX source file(s). Reads standard input if none are given.
    pub filenames: Vec<PathBuf>,

    /// Output representation.
    #[arg(short, long, value_enum, default_value_t = Target::Html)]
    pub target: Target,

    /// Pre-rendered bibliography file (`key = text` per line).
    #[arg(short, long)]
    pub bibfile: Option<PathBuf>,

    /// Write to this file instead of standard output.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print warnings collected while reading the document.
    #[arg(short, long)]
    pub verbose: bool,

    /// When to colorize diagnostic output.
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: clap::ColorChoice,
}

/// Something that can turn a read document into final output text.
pub trait Renderer {
    fn render(&self, blocks: &[Block]) -> String;
}

/// Stand-in renderer used for both [`Target`]s until a real HTML/XML
/// emitter exists.
pub struct DebugRenderer;

impl Renderer for DebugRenderer {
    fn render(&self, blocks: &[Block]) -> String {
        format!("{blocks:#?}")
    }
}

pub fn renderer_for(_target: Target) -> Box<dyn Renderer> {
    Box::new(DebugRenderer)
}

/// Run the whole pipeline over one source string.
pub fn convert(source: &str, bib: BibDatabase, target: Target) -> Result<(String, DiagnosticSink)> {
    let mut lexer = Lexer::new(source, LexerLimits::default());
    let mut tokens = Vec::new();
    while let Some(tok) = lexer.next_token()? {
        tokens.push(tok);
    }
    let atoms = crate::parser::parse(&tokens)?;
    let atoms = crate::filter::normalize(&atoms);
    let (blocks, meta) = crate::document::read_document(&atoms, bib);
    let mut sink = DiagnosticSink::new();
    sink.extend_from_reader(&meta.warnings);
    let rendered = renderer_for(target).render(&blocks);
    Ok((rendered, sink))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
