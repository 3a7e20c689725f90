//! End-to-end scenarios driving the whole pipeline: lexer → parser →
//! filter → document reader (SPEC_FULL.md §8).

use texfront::document::meta::BibDatabase;
use texfront::document::model::{Anchor, Block, Inline, PointerTarget};
use texfront::{Lexer, LexerLimits};

fn read(source: &str) -> (Vec<Block>, texfront::document::meta::DocumentMeta) {
    let mut lexer = Lexer::new(source, LexerLimits::default());
    let mut tokens = Vec::new();
    while let Some(tok) = lexer.next_token().expect("lexing should not fail") {
        tokens.push(tok);
    }
    let atoms = texfront::parser::parse(&tokens).expect("parsing should not fail");
    let atoms = texfront::filter::normalize(&atoms);
    texfront::read_document(&atoms, BibDatabase::new())
}

#[test]
fn empty_input_reads_to_nothing() {
    let (blocks, _) = read("");
    assert!(blocks.is_empty());
}

#[test]
fn comment_only_input_reads_to_nothing() {
    let (blocks, _) = read("% just a comment\n% another one\n");
    assert!(blocks.is_empty());
}

#[test]
fn bare_par_produces_no_empty_paragraph() {
    let (blocks, _) = read("\\par\\par\n\n");
    assert!(blocks.is_empty());
}

#[test]
fn double_newline_splits_paragraphs() {
    let (blocks, _) = read("first paragraph\n\nsecond paragraph");
    assert_eq!(blocks.len(), 2);
    assert!(matches!(&blocks[0], Block::Paragraph(_)));
    assert!(matches!(&blocks[1], Block::Paragraph(_)));
}

#[test]
fn section_with_macro_expansion_and_emphasis() {
    let source = "\\newcommand{\\who}{World}\n\\section{Hello \\who}\n\nSome \\emph{important} text.";
    let (blocks, meta) = read(source);
    match &blocks[0] {
        Block::Header(_, anchor, title) => {
            assert_eq!(anchor.id(), "sec-1");
            assert_eq!(
                title,
                &vec![
                    Inline::Str("Hello".into()),
                    Inline::Space,
                    Inline::Str("World".into()),
                ]
            );
        }
        other => panic!("expected a header, got {other:?}"),
    }
    match &blocks[1] {
        Block::Paragraph(inlines) => {
            assert!(inlines.iter().any(|i| matches!(
                i,
                Inline::FontStyle(texfront::document::model::FontStyle::Emph, _)
            )));
        }
        other => panic!("expected a paragraph, got {other:?}"),
    }
    assert_eq!(meta.counters.section[2], 1);
}

#[test]
fn label_before_any_heading_binds_to_document_root() {
    let (blocks, meta) = read("\\label{top}\n\\ref{top}");
    let anchor = meta.resolve_label("top").expect("label should resolve");
    assert_eq!(*anchor, Anchor::Document);
    match &blocks[0] {
        Block::Paragraph(inlines) => {
            assert!(inlines
                .iter()
                .any(|i| matches!(i, Inline::Pointer(_, Some(PointerTarget::Internal(Anchor::Document))))));
        }
        other => panic!("expected a paragraph, got {other:?}"),
    }
}

#[test]
fn label_inside_figure_resolves_to_the_figure_anchor() {
    let source = "\\chapter{A}\n\\begin{figure}\\includegraphics{p.png}\\caption{c}\\label{f}\\end{figure}\n\\ref{f}";
    let (blocks, _) = read(source);
    match &blocks[1] {
        Block::Figure(anchor, media, caption) => {
            assert_eq!(anchor.id(), "figure-1-1");
            assert_eq!(*media, 1);
            assert_eq!(caption, &vec![Inline::Str("c".into())]);
        }
        other => panic!("expected a figure, got {other:?}"),
    }
    match &blocks[2] {
        Block::Paragraph(inlines) => {
            assert!(inlines.iter().any(|i| matches!(
                i,
                Inline::Pointer(_, Some(PointerTarget::Internal(a))) if a.id() == "figure-1-1"
            )));
        }
        other => panic!("expected a paragraph, got {other:?}"),
    }
}

#[test]
fn itemize_environment_numbers_items() {
    let source = "\\begin{itemize}\n\\item one\n\\item two\n\\end{itemize}";
    let (blocks, _) = read(source);
    match &blocks[0] {
        Block::AnchorList(_, items) => {
            assert_eq!(items.len(), 2);
            assert_eq!(items[0].0.id(), "item-1");
            assert_eq!(items[1].0.id(), "item-2");
        }
        other => panic!("expected an anchor list, got {other:?}"),
    }
}

#[test]
fn conditional_picks_the_true_branch_in_context() {
    let source = "\\newcommand{\\flag}{\\iftrue true\\else false\\fi}\n\\section{\\flag}";
    let (blocks, _) = read(source);
    match &blocks[0] {
        Block::Header(_, _, title) => assert_eq!(title, &vec![Inline::Str("true".into())]),
        other => panic!("expected a header, got {other:?}"),
    }
}
