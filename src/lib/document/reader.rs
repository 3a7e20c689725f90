//! The document reader: a grammar for the supported LaTeX authoring
//! style, built entirely on [`crate::walker::Walker`] (SPEC_FULL.md §4.6).
//!
//! This is the one place in the crate that knows what a section, a
//! figure, or a citation *means*. Everything below it (lexer, parser,
//! filter) only ever sees tokens, atoms, and argument shapes.

use itertools::Itertools;

use crate::atom::{Arg, Atom};
use crate::document::meta::{BibDatabase, DocumentMeta, LEVEL_CHAPTER};
use crate::document::model::{
    Anchor, Block, BookRegion, Cell, CiteMode, FontStyle, Inline, ListType, MultiCite,
    PointerTarget,
};
use crate::walker::{WResult, WalkError, Walker};

const HEADINGS: &[(&str, usize)] = &[
    ("part", 0),
    ("chapter", 1),
    ("section", 2),
    ("subsection", 3),
    ("subsubsection", 4),
    ("paragraph", 5),
    ("subparagraph", 6),
];

const FONT_COMMANDS: &[(&str, FontStyle)] = &[
    ("emph", FontStyle::Emph),
    ("textbf", FontStyle::Bold),
    ("textit", FontStyle::Italic),
    ("textsc", FontStyle::SmallCaps),
];

const CITE_COMMANDS: &[(&str, CiteMode)] = &[
    ("cite", CiteMode::Cite),
    ("citeauthor", CiteMode::Citeauthor),
    ("citeyear", CiteMode::Citeyear),
    ("parencite", CiteMode::Parencite),
    ("textcite", CiteMode::Textcite),
];

const LIST_ENVS: &[&str] = &["itemize", "enumerate", "description"];
const QUOTE_ENVS: &[&str] = &["quote", "quotation"];

/// Read a parsed, filtered atom tree into a semantic document.
pub fn read_document(atoms: &[Atom], bib: BibDatabase) -> (Vec<Block>, DocumentMeta) {
    let mut meta = DocumentMeta::new(bib);
    let body = extract_document_body(atoms);
    let mut w = Walker::new(body, meta.clone());
    let mut blocks = parse_block_list(&mut w);
    meta = w.state;
    if !meta.hoisted_notes.is_empty() {
        let notes = std::mem::take(&mut meta.hoisted_notes);
        blocks.extend(notes.into_iter().map(|n| Block::Paragraph(vec![n])));
    }
    (blocks, meta)
}

/// `\begin{document}...\end{document}` is the only top-level container
/// this reader cares about; anything before it (`\documentclass`,
/// `\usepackage`, ...) carries no semantic content and is dropped.
/// Inputs with no such wrapper (as in unit tests) are read as-is.
fn extract_document_body(atoms: &[Atom]) -> Vec<Atom> {
    for atom in atoms {
        if let Atom::Group(name, _, inner) = atom {
            if name == "document" {
                return inner.clone();
            }
        }
    }
    atoms.to_vec()
}

// -- block level --------------------------------------------------------

fn parse_block_list(w: &mut Walker<DocumentMeta>) -> Vec<Block> {
    let mut out = Vec::new();
    loop {
        skip_trivia(w);
        while consume_noise(w) {
            skip_trivia(w);
        }
        if w.eog() {
            break;
        }
        match parse_block(w) {
            Ok(b) => out.push(b),
            Err(_) => {
                if w.item().is_ok() {
                    w.state.warn("dropped an unrecognized top-level construct");
                } else {
                    break;
                }
            }
        }
    }
    out
}

fn parse_block(w: &mut Walker<DocumentMeta>) -> WResult<Block> {
    if let Ok(b) = w.attempt(parse_heading) {
        return Ok(b);
    }
    if let Ok(b) = w.attempt(parse_list_block) {
        return Ok(b);
    }
    if let Ok(b) = w.attempt(parse_figure_block) {
        return Ok(b);
    }
    if let Ok(b) = w.attempt(parse_table_block) {
        return Ok(b);
    }
    if let Ok(b) = w.attempt(parse_quotation_block) {
        return Ok(b);
    }
    if let Ok(b) = w.attempt(parse_bibliography_env_block) {
        return Ok(b);
    }
    if let Ok(b) = w.attempt(parse_bibliography_command_block) {
        return Ok(b);
    }
    parse_paragraph(w)
}

fn skip_trivia(w: &mut Walker<DocumentMeta>) {
    while w.satisfy(|a| matches!(a, Atom::White | Atom::Par | Atom::Newline)).is_ok() {}
}

/// Preamble/structural declarations with no block of their own: consumed
/// (and, where meaningful, folded into [`DocumentMeta`]) without ever
/// reaching [`parse_block`].
fn consume_noise(w: &mut Walker<DocumentMeta>) -> bool {
    if w.attempt(|w| w.in_cmd("documentclass", |_, _| Ok(()))).is_ok() {
        return true;
    }
    if w.attempt(|w| w.in_cmd("usepackage", |_, _| Ok(()))).is_ok() {
        return true;
    }
    if w
        .attempt(|w| {
            w.in_cmd("title", |w, args| {
                w.state.title = Some(inlines_of(w, args[0].body()));
                Ok(())
            })
        })
        .is_ok()
    {
        return true;
    }
    if w
        .attempt(|w| {
            w.in_cmd("subtitle", |w, args| {
                w.state.subtitle = Some(inlines_of(w, args[0].body()));
                Ok(())
            })
        })
        .is_ok()
    {
        return true;
    }
    if w
        .attempt(|w| {
            w.in_cmd("author", |w, args| {
                w.state.authors.push(inlines_of(w, args[0].body()));
                Ok(())
            })
        })
        .is_ok()
    {
        return true;
    }
    if w
        .attempt(|w| {
            w.in_cmd("date", |w, args| {
                w.state.date = Some(inlines_of(w, args[0].body()));
                Ok(())
            })
        })
        .is_ok()
    {
        return true;
    }
    const SILENT: &[&str] = &[
        "maketitle",
        "tableofcontents",
        "newpage",
        "clearpage",
        "noindent",
        "bibliographystyle",
        "appendix",
        "backmatter",
        "frontmatter",
        "mainmatter",
    ];
    for name in SILENT {
        if w
            .attempt(|w| w.satisfy(|a| matches!(a, Atom::Command(n, _) if n == name)))
            .is_ok()
        {
            match *name {
                // `\appendix` and `\backmatter` are kept identical on
                // purpose — see DESIGN.md.
                "appendix" | "backmatter" => w.state.region = BookRegion::Back,
                "frontmatter" => w.state.region = BookRegion::Front,
                "mainmatter" => w.state.region = BookRegion::Main,
                _ => {}
            }
            return true;
        }
    }
    false
}

fn parse_heading(w: &mut Walker<DocumentMeta>) -> WResult<Block> {
    for (name, level) in HEADINGS {
        if let Ok(b) = w.attempt(|w| heading_at(w, name, *level)) {
            return Ok(b);
        }
    }
    Err(WalkError::EndOfGroup)
}

fn heading_at(w: &mut Walker<DocumentMeta>, name: &str, level: usize) -> WResult<Block> {
    w.in_cmd(name, |w, args| {
        let starred = matches!(args.first(), Some(Arg::Star));
        let title_idx = args.len() - 1;
        let title = w.in_cmd_arg(args, title_idx, |w| Ok(parse_inline_list(w)))?;
        let anchor = if starred {
            let n = w.state.next_phantom_section();
            Anchor::PhantomSection(w.state.region, n)
        } else {
            let path = w.state.bump_section(level);
            Anchor::Section(w.state.region, path)
        };
        w.state.current_anchor = anchor.clone();
        Ok(Block::Header((level as u8) + 1, anchor, title))
    })
}

fn parse_list_block(w: &mut Walker<DocumentMeta>) -> WResult<Block> {
    w.in_grp_choice(LIST_ENVS, |w, name| {
        let list_type = if name == "enumerate" {
            ListType::Ordered
        } else {
            ListType::Unordered
        };
        w.state.counters.item.push(0);
        skip_trivia(w);
        let mut items = Vec::new();
        loop {
            skip_trivia(w);
            let args = match w.attempt(|w| {
                w.satisfy(|a| matches!(a, Atom::Command(n, _) if n == "item"))
                    .map(|a| match a {
                        Atom::Command(_, args) => args,
                        _ => unreachable!(),
                    })
            }) {
                Ok(a) => a,
                Err(_) => break,
            };
            *w.state.counters.item.last_mut().unwrap() += 1;
            let anchor = Anchor::Item(w.state.counters.item.clone());
            let content_atoms = take_until(w, |a| matches!(a, Atom::Command(n, _) if n == "item"));
            let mut blocks = Vec::new();
            if let Some(Arg::Optional(term)) = args.first() {
                let term_inlines = inlines_of(w, term);
                blocks.push(Block::Paragraph(vec![Inline::FontStyle(
                    FontStyle::Bold,
                    term_inlines,
                )]));
            }
            blocks.extend(run_in_body(w, &content_atoms, parse_block_list));
            items.push((anchor, blocks));
        }
        w.state.counters.item.pop();
        Ok(Block::AnchorList(list_type, items))
    })
}

fn parse_quotation_block(w: &mut Walker<DocumentMeta>) -> WResult<Block> {
    w.in_grp_choice(QUOTE_ENVS, |w, _| {
        let blocks = parse_block_list(w);
        Ok(Block::QuotationBlock(blocks))
    })
}

fn parse_figure_block(w: &mut Walker<DocumentMeta>) -> WResult<Block> {
    w.opt_nested(|w| {
        w.in_grp("figure", |w| {
            // The anchor is fixed the moment the float is entered, before
            // its contents (including a possible \label) are scanned —
            // otherwise \label inside the figure would bind to whatever
            // anchor preceded it instead of the figure itself.
            let n = w.state.next_figure();
            let anchor = Anchor::Figure(w.state.counters.section[LEVEL_CHAPTER], n);
            w.state.current_anchor = anchor.clone();
            let mut media_id = None;
            let mut caption = Vec::new();
            loop {
                skip_trivia(w);
                if w.eog() {
                    break;
                }
                if w
                    .attempt(|w| w.satisfy(|a| matches!(a, Atom::Command(n, _) if n == "centering")))
                    .is_ok()
                {
                    continue;
                }
                if let Ok(path) = w.attempt(parse_includegraphics) {
                    media_id = Some(w.state.register_media(path));
                    continue;
                }
                if let Ok(c) = w.attempt(parse_caption) {
                    caption = c;
                    continue;
                }
                if let Ok(key) = w.attempt(parse_label_key) {
                    let anchor = w.state.current_anchor.clone();
                    w.state.register_label(key, anchor);
                    continue;
                }
                if w.item().is_ok() {
                    w.state.warn("dropped unrecognized content inside a figure");
                } else {
                    break;
                }
            }
            match media_id {
                Some(id) => Ok(Block::Figure(anchor, id, caption)),
                None => {
                    w.state.warn("figure has no \\includegraphics, skipped");
                    Err(WalkError::UserError("malformed figure".into()))
                }
            }
        })
    })
}

fn parse_includegraphics(w: &mut Walker<DocumentMeta>) -> WResult<String> {
    w.in_cmd("includegraphics", |_, args| Ok(flatten_to_text(args[0].body())))
}

fn parse_caption(w: &mut Walker<DocumentMeta>) -> WResult<Vec<Inline>> {
    w.in_cmd("caption", |w, args| Ok(inlines_of(w, args[0].body())))
}

fn parse_label_key(w: &mut Walker<DocumentMeta>) -> WResult<String> {
    w.in_cmd("label", |_, args| Ok(flatten_to_text(args[0].body())))
}

fn parse_table_block(w: &mut Walker<DocumentMeta>) -> WResult<Block> {
    if let Ok(b) = w.attempt(parse_table_float) {
        return Ok(b);
    }
    w.in_grp("tabular", |w| Ok(Block::SimpleTable(parse_table_rows(w))))
}

fn parse_table_float(w: &mut Walker<DocumentMeta>) -> WResult<Block> {
    w.opt_nested(|w| {
        w.in_grp("table", |w| {
            // See parse_figure_block: the anchor must be fixed before the
            // body (and any \label within it) is scanned.
            let n = w.state.next_table();
            let anchor = Anchor::Table(w.state.counters.section[LEVEL_CHAPTER], n);
            w.state.current_anchor = anchor.clone();
            let mut caption = Vec::new();
            let mut rows = None;
            loop {
                skip_trivia(w);
                if w.eog() {
                    break;
                }
                if w
                    .attempt(|w| w.satisfy(|a| matches!(a, Atom::Command(n, _) if n == "centering")))
                    .is_ok()
                {
                    continue;
                }
                if let Ok(c) = w.attempt(parse_caption) {
                    caption = c;
                    continue;
                }
                if let Ok(key) = w.attempt(parse_label_key) {
                    let anchor = w.state.current_anchor.clone();
                    w.state.register_label(key, anchor);
                    continue;
                }
                if rows.is_none() {
                    if let Ok(r) = w.attempt(|w| w.in_grp("tabular", |w| Ok(parse_table_rows(w)))) {
                        rows = Some(r);
                        continue;
                    }
                }
                if w.item().is_ok() {
                    w.state.warn("dropped unrecognized content inside a table");
                } else {
                    break;
                }
            }
            match rows {
                Some(rows) => Ok(Block::Table(anchor, caption, rows)),
                None => {
                    w.state.warn("table has no tabular body, skipped");
                    Err(WalkError::UserError("malformed table".into()))
                }
            }
        })
    })
}

fn parse_table_rows(w: &mut Walker<DocumentMeta>) -> Vec<Vec<Cell>> {
    skip_trivia(w);
    // a leading `{c|c|c}` column spec folds in as an unnamed group; drop it.
    let _ = w.attempt(|w| w.satisfy(|a| matches!(a, Atom::Group(n, _, _) if n.is_empty())));
    let mut rows = Vec::new();
    loop {
        skip_trivia(w);
        if w.eog() {
            break;
        }
        let row_atoms = take_until(w, |a| matches!(a, Atom::Command(n, _) if n == "\\\\"));
        let had_sep = w
            .attempt(|w| w.satisfy(|a| matches!(a, Atom::Command(n, _) if n == "\\\\")))
            .is_ok();
        if !row_atoms.is_empty() || had_sep {
            rows.push(parse_row_cells(w, &row_atoms));
        }
        if !had_sep {
            break;
        }
    }
    rows
}

fn parse_row_cells(w: &mut Walker<DocumentMeta>, atoms: &[Atom]) -> Vec<Cell> {
    let mut cells: Vec<Vec<Atom>> = vec![Vec::new()];
    for atom in atoms {
        match atom {
            Atom::AlignMark => cells.push(Vec::new()),
            other => cells.last_mut().unwrap().push(other.clone()),
        }
    }
    cells.iter().map(|cell_atoms| cell_to_cell(w, cell_atoms)).collect()
}

fn cell_to_cell(w: &mut Walker<DocumentMeta>, cell_atoms: &[Atom]) -> Cell {
    if let [Atom::Command(name, args)] = cell_atoms {
        if name == "multicolumn" && args.len() == 3 {
            if let Ok(n) = flatten_to_text(args[0].body()).trim().parse::<u32>() {
                return Cell {
                    span: n,
                    content: inlines_of(w, args[2].body()),
                };
            }
        }
    }
    Cell {
        span: 1,
        content: inlines_of(w, cell_atoms),
    }
}

fn parse_bibliography_env_block(w: &mut Walker<DocumentMeta>) -> WResult<Block> {
    w.in_grp("thebibliography", |w| {
        let _ = w.attempt(|w| w.satisfy(|a| matches!(a, Atom::Group(n, _, _) if n.is_empty())));
        let mut entries = Vec::new();
        loop {
            skip_trivia(w);
            let args = match w.attempt(|w| {
                w.satisfy(|a| matches!(a, Atom::Command(n, _) if n == "bibitem"))
                    .map(|a| match a {
                        Atom::Command(_, args) => args,
                        _ => unreachable!(),
                    })
            }) {
                Ok(a) => a,
                Err(_) => break,
            };
            let key = args.first().map(|a| flatten_to_text(a.body())).unwrap_or_default();
            let content_atoms = take_until(w, |a| matches!(a, Atom::Command(n, _) if n == "bibitem"));
            let rendered = match w.state.bib.get(&key) {
                Some(text) => vec![Inline::Str(text.to_string())],
                None => inlines_of(w, &content_atoms),
            };
            w.state.register_citation(&key);
            entries.push(crate::document::model::BibEntry { key, rendered });
        }
        Ok(Block::BibList(entries))
    })
}

fn parse_bibliography_command_block(w: &mut Walker<DocumentMeta>) -> WResult<Block> {
    if w.attempt(|w| w.in_cmd("bibliography", |_, _| Ok(()))).is_ok() {
        return Ok(build_bib_list(w));
    }
    w.attempt(|w| w.satisfy(|a| matches!(a, Atom::Command(n, _) if n == "printbibliography")))?;
    Ok(build_bib_list(w))
}

fn build_bib_list(w: &mut Walker<DocumentMeta>) -> Block {
    let entries = w
        .state
        .citation_order
        .clone()
        .iter()
        .filter_map(|k| {
            w.state.bib.get(k).map(|text| crate::document::model::BibEntry {
                key: k.clone(),
                rendered: vec![Inline::Str(text.to_string())],
            })
        })
        .collect();
    Block::BibList(entries)
}

fn parse_paragraph(w: &mut Walker<DocumentMeta>) -> WResult<Block> {
    let mut inlines = Vec::new();
    loop {
        if w.eog() {
            break;
        }
        if w.peek(|a| matches!(a, Atom::Par)) {
            break;
        }
        if w.peek(is_block_start) {
            break;
        }
        match parse_inline(w) {
            Ok(i) => inlines.push(i),
            Err(_) => break,
        }
    }
    if inlines.is_empty() {
        return Err(WalkError::EndOfGroup);
    }
    Ok(Block::Paragraph(inlines))
}

fn is_block_start(a: &Atom) -> bool {
    match a {
        Atom::Command(n, _) => {
            HEADINGS.iter().any(|(h, _)| h == n) || matches!(n.as_str(), "bibliography" | "printbibliography")
        }
        Atom::Group(n, ..) => matches!(
            n.as_str(),
            "itemize" | "enumerate" | "description" | "figure" | "table" | "tabular" | "quote"
                | "quotation" | "thebibliography" | "center"
        ),
        _ => false,
    }
}

// -- inline level ---------------------------------------------------------

fn parse_inline_list(w: &mut Walker<DocumentMeta>) -> Vec<Inline> {
    let mut out = Vec::new();
    loop {
        if w.eog() {
            break;
        }
        if let Ok(style) = w.attempt(parse_font_declaration_marker) {
            let rest = parse_inline_list(w);
            out.push(Inline::FontStyle(style, rest));
            break;
        }
        match parse_inline(w) {
            Ok(i) => out.push(i),
            Err(_) => break,
        }
    }
    out
}

fn parse_font_declaration_marker(w: &mut Walker<DocumentMeta>) -> WResult<FontStyle> {
    w.satisfy(|a| {
        matches!(a, Atom::Command(n, args) if args.is_empty()
            && matches!(n.as_str(), "bfseries" | "itshape" | "scshape" | "em" | "normalfont"))
    })
    .map(|a| match a {
        Atom::Command(n, _) => match n.as_str() {
            "bfseries" => FontStyle::Bold,
            "itshape" => FontStyle::Italic,
            "scshape" => FontStyle::SmallCaps,
            "em" => FontStyle::Emph,
            _ => FontStyle::Normal,
        },
        _ => unreachable!(),
    })
}

fn parse_inline(w: &mut Walker<DocumentMeta>) -> WResult<Inline> {
    if let Ok(i) = w.attempt(parse_footnote) {
        return Ok(i);
    }
    if let Ok(i) = w.attempt(parse_citation) {
        return Ok(i);
    }
    if let Ok(i) = w.attempt(parse_label_inline) {
        return Ok(i);
    }
    if let Ok(i) = w.attempt(parse_pointer) {
        return Ok(i);
    }
    if let Ok(i) = w.attempt(parse_hyperlink) {
        return Ok(i);
    }
    if let Ok(i) = w.attempt(parse_font_style) {
        return Ok(i);
    }
    if let Ok(i) = w.attempt(parse_math) {
        return Ok(i);
    }
    if let Ok(i) = w.attempt(parse_plain_or_space) {
        return Ok(i);
    }
    parse_unknown_inline(w)
}

fn parse_plain_or_space(w: &mut Walker<DocumentMeta>) -> WResult<Inline> {
    let atom = w.satisfy(|a| matches!(a, Atom::Plain(_) | Atom::White | Atom::Newline))?;
    Ok(match atom {
        Atom::Plain(s) => Inline::Str(s),
        _ => Inline::Space,
    })
}

fn parse_font_style(w: &mut Walker<DocumentMeta>) -> WResult<Inline> {
    for (name, style) in FONT_COMMANDS {
        if let Ok(i) = w.attempt(|w| font_style_at(w, name, *style)) {
            return Ok(i);
        }
    }
    Err(WalkError::EndOfGroup)
}

fn font_style_at(w: &mut Walker<DocumentMeta>, name: &str, style: FontStyle) -> WResult<Inline> {
    w.in_cmd(name, |w, args| {
        let inlines = w.in_cmd_arg(args, 0, |w| Ok(parse_inline_list(w)))?;
        Ok(Inline::FontStyle(style, inlines))
    })
}

fn parse_math(w: &mut Walker<DocumentMeta>) -> WResult<Inline> {
    w.in_math_grp(|w, t| Ok(Inline::Math(t, w.many(parse_inline))))
}

fn parse_footnote(w: &mut Walker<DocumentMeta>) -> WResult<Inline> {
    w.in_cmd("footnote", |w, args| {
        let body = args[0].body().to_vec();
        w.state.footnote_depth += 1;
        let is_top = w.state.footnote_depth == 1;
        let blocks = run_in_body(w, &body, parse_block_list);
        w.state.footnote_depth -= 1;
        let n = w.state.next_note();
        let chapter = w.state.counters.section[LEVEL_CHAPTER];
        let anchor = Anchor::Note(chapter, n);
        let note = Inline::Note(anchor.clone(), blocks);
        if is_top {
            Ok(note)
        } else {
            w.state.hoisted_notes.push(note);
            Ok(Inline::Pointer(String::new(), Some(PointerTarget::Internal(anchor))))
        }
    })
}

fn parse_citation(w: &mut Walker<DocumentMeta>) -> WResult<Inline> {
    for (name, mode) in CITE_COMMANDS {
        if let Ok(i) = w.attempt(|w| citation_at(w, name, *mode)) {
            return Ok(i);
        }
    }
    if let Ok(i) = w.attempt(|w| multi_citation_at(w, "cites", CiteMode::Cites)) {
        return Ok(i);
    }
    if let Ok(i) = w.attempt(|w| multi_citation_at(w, "parencites", CiteMode::Parencites)) {
        return Ok(i);
    }
    Err(WalkError::EndOfGroup)
}

/// `\cites{k1}{k2}...`/`\parencites{k1}{k2}...`: each `{...}` group
/// registered via [`crate::atom::registered_argspec`]'s repeatable key
/// slots is its own comma-separated key list, folded into one
/// [`MultiCite`] with no per-key pre/postnote (see DESIGN.md).
fn multi_citation_at(w: &mut Walker<DocumentMeta>, name: &str, mode: CiteMode) -> WResult<Inline> {
    w.in_cmd(name, |w, args| {
        let keys: Vec<String> = args
            .iter()
            .flat_map(|arg| {
                flatten_to_text(arg.body())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect::<Vec<_>>()
            })
            .filter(|s| !s.is_empty())
            .unique()
            .collect();
        if keys.is_empty() {
            return Err(WalkError::UserError("empty citation key list".into()));
        }
        for k in &keys {
            w.state.register_citation(k);
        }
        Ok(Inline::Citation(MultiCite {
            mode,
            prenote: None,
            postnote: None,
            keys,
        }))
    })
}

fn citation_at(w: &mut Walker<DocumentMeta>, name: &str, mode: CiteMode) -> WResult<Inline> {
    w.in_cmd(name, |w, args| {
        let (pre, post, keys_arg) = match args.len() {
            3 => {
                let pre = match &args[0] {
                    Arg::Optional(b) if !b.is_empty() => Some(inlines_of(w, b)),
                    _ => None,
                };
                let post = match &args[1] {
                    Arg::Optional(b) if !b.is_empty() => Some(inlines_of(w, b)),
                    _ => None,
                };
                (pre, post, &args[2])
            }
            _ => (None, None, args.last().ok_or(WalkError::EndOfGroup)?),
        };
        let keys: Vec<String> = flatten_to_text(keys_arg.body())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        for k in &keys {
            w.state.register_citation(k);
        }
        Ok(Inline::Citation(MultiCite {
            mode,
            prenote: pre,
            postnote: post,
            keys,
        }))
    })
}

fn parse_label_inline(w: &mut Walker<DocumentMeta>) -> WResult<Inline> {
    w.in_cmd("label", |w, args| {
        let key = flatten_to_text(args[0].body());
        let anchor = w.state.current_anchor.clone();
        w.state.register_label(key, anchor);
        Ok(Inline::Str(String::new()))
    })
}

fn parse_pointer(w: &mut Walker<DocumentMeta>) -> WResult<Inline> {
    for name in ["ref", "pageref", "autoref"] {
        if let Ok(i) = w.attempt(|w| pointer_at(w, name)) {
            return Ok(i);
        }
    }
    Err(WalkError::EndOfGroup)
}

fn pointer_at(w: &mut Walker<DocumentMeta>, name: &str) -> WResult<Inline> {
    w.in_cmd(name, |w, args| {
        let key = flatten_to_text(args[0].body());
        let target = w.state.resolve_label(&key).cloned();
        if target.is_none() {
            w.state.warn(format!("unresolved cross-reference to label '{key}'"));
        }
        Ok(Inline::Pointer(key, target.map(PointerTarget::Internal)))
    })
}

fn parse_hyperlink(w: &mut Walker<DocumentMeta>) -> WResult<Inline> {
    if let Ok(i) = w.attempt(parse_href) {
        return Ok(i);
    }
    parse_url(w)
}

fn parse_href(w: &mut Walker<DocumentMeta>) -> WResult<Inline> {
    w.in_cmd("href", |_, args| {
        let url = flatten_to_text(args[0].body());
        let text = flatten_to_text(args[1].body());
        Ok(Inline::Pointer(String::new(), Some(PointerTarget::External { text, url })))
    })
}

fn parse_url(w: &mut Walker<DocumentMeta>) -> WResult<Inline> {
    w.in_cmd("url", |_, args| {
        let url = flatten_to_text(args[0].body());
        Ok(Inline::Pointer(
            String::new(),
            Some(PointerTarget::External { text: url.clone(), url }),
        ))
    })
}

/// Last-resort inline production: drop the atom itself but recurse into
/// anything it carries (§4.6 error policy: unknown commands "recursed
/// into" at inline level, as opposed to the block-level policy of a
/// full drop).
fn parse_unknown_inline(w: &mut Walker<DocumentMeta>) -> WResult<Inline> {
    let atom = w.item()?;
    match atom {
        Atom::Command(name, args) => {
            w.state.warn(format!("dropped unrecognized command '\\{name}'"));
            let mut collected = Vec::new();
            for arg in &args {
                collected.extend(run_in_body(w, arg.body(), parse_inline_list));
            }
            Ok(Inline::FontStyle(FontStyle::Normal, collected))
        }
        Atom::Group(_, _, body) => Ok(Inline::FontStyle(FontStyle::Normal, run_in_body(w, &body, parse_inline_list))),
        Atom::SupScript(body) | Atom::SubScript(body) => {
            Ok(Inline::FontStyle(FontStyle::Normal, run_in_body(w, &body, parse_inline_list)))
        }
        Atom::AlignMark => Ok(Inline::Str("&".to_string())),
        Atom::Par => Ok(Inline::Space),
        other => Ok(Inline::Str(format!("{other:?}"))),
    }
}

// -- shared helpers ---------------------------------------------------------

fn take_until(w: &mut Walker<DocumentMeta>, stop: impl Fn(&Atom) -> bool) -> Vec<Atom> {
    let mut out = Vec::new();
    while !w.eog() && !w.peek(&stop) {
        out.push(w.item().unwrap());
    }
    out
}

fn flatten_to_text(atoms: &[Atom]) -> String {
    atoms
        .iter()
        .filter_map(|a| match a {
            Atom::Plain(s) => Some(s.clone()),
            _ => None,
        })
        .collect()
}

/// Run `f` over a cloned sub-document rooted at `atoms`, threading
/// [`DocumentMeta`] through and merging it back when `f` returns.
fn run_in_body<T>(w: &mut Walker<DocumentMeta>, atoms: &[Atom], f: impl FnOnce(&mut Walker<DocumentMeta>) -> T) -> T {
    let mut sub = Walker::new(atoms.to_vec(), w.state.clone());
    let result = f(&mut sub);
    w.state = sub.state;
    result
}

fn inlines_of(w: &mut Walker<DocumentMeta>, atoms: &[Atom]) -> Vec<Inline> {
    run_in_body(w, atoms, parse_inline_list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::meta::BibDatabase;

    fn read(atoms: Vec<Atom>) -> (Vec<Block>, DocumentMeta) {
        read_document(&atoms, BibDatabase::new())
    }

    #[test]
    fn plain_paragraph_is_read() {
        let (blocks, _) = read(vec![Atom::Plain("hi".into())]);
        assert_eq!(blocks, vec![Block::Paragraph(vec![Inline::Str("hi".into())])]);
    }

    #[test]
    fn section_bumps_counter_and_builds_anchor() {
        let atoms = vec![Atom::Command(
            "section".into(),
            vec![Arg::Obligatory(vec![Atom::Plain("Intro".into())])],
        )];
        let (blocks, meta) = read(atoms);
        match &blocks[0] {
            Block::Header(level, anchor, title) => {
                assert_eq!(*level, 3);
                assert_eq!(anchor.id(), "sec-1");
                assert_eq!(title, &vec![Inline::Str("Intro".into())]);
            }
            other => panic!("expected a header, got {other:?}"),
        }
        assert_eq!(meta.counters.section[2], 1);
    }

    #[test]
    fn starred_section_is_a_phantom_section() {
        let atoms = vec![Atom::Command(
            "section".into(),
            vec![Arg::Star, Arg::Obligatory(vec![Atom::Plain("Intro".into())])],
        )];
        let (blocks, _) = read(atoms);
        match &blocks[0] {
            Block::Header(_, anchor, _) => assert_eq!(anchor.id(), "sec-unnumbered-1"),
            other => panic!("expected a header, got {other:?}"),
        }
    }

    #[test]
    fn itemize_collects_items_with_nested_anchors() {
        let atoms = vec![Atom::Group(
            "itemize".into(),
            vec![],
            vec![
                Atom::Command("item".into(), vec![]),
                Atom::Plain("first".into()),
                Atom::Command("item".into(), vec![]),
                Atom::Plain("second".into()),
            ],
        )];
        let (blocks, _) = read(atoms);
        match &blocks[0] {
            Block::AnchorList(ListType::Unordered, items) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0].0.id(), "item-1");
                assert_eq!(items[1].0.id(), "item-2");
            }
            other => panic!("expected an anchor list, got {other:?}"),
        }
    }

    #[test]
    fn label_then_ref_resolves() {
        let atoms = vec![
            Atom::Command(
                "section".into(),
                vec![Arg::Obligatory(vec![Atom::Plain("Intro".into())])],
            ),
            Atom::Command("label".into(), vec![Arg::Obligatory(vec![Atom::Plain("sec:intro".into())])]),
            Atom::Command("ref".into(), vec![Arg::Obligatory(vec![Atom::Plain("sec:intro".into())])]),
        ];
        let (blocks, _) = read(atoms);
        // header, then a paragraph containing the resolved pointer
        match &blocks[1] {
            Block::Paragraph(inlines) => match &inlines[0] {
                Inline::Pointer(_, Some(PointerTarget::Internal(anchor))) => {
                    assert_eq!(anchor.id(), "sec-1")
                }
                other => panic!("expected a resolved pointer, got {other:?}"),
            },
            other => panic!("expected a paragraph, got {other:?}"),
        }
    }

    #[test]
    fn unresolved_ref_warns_and_carries_no_target() {
        let atoms = vec![Atom::Command(
            "ref".into(),
            vec![Arg::Obligatory(vec![Atom::Plain("nowhere".into())])],
        )];
        let (blocks, meta) = read(atoms);
        match &blocks[0] {
            Block::Paragraph(inlines) => assert_eq!(inlines, &vec![Inline::Pointer("nowhere".into(), None)]),
            other => panic!("expected a paragraph, got {other:?}"),
        }
        assert!(meta.warnings.iter().any(|w| w.contains("nowhere")));
    }

    #[test]
    fn nested_footnote_hoists_to_top_level() {
        let inner_footnote = Atom::Command(
            "footnote".into(),
            vec![Arg::Obligatory(vec![Atom::Plain("inner".into())])],
        );
        let outer = Atom::Command(
            "footnote".into(),
            vec![Arg::Obligatory(vec![Atom::Plain("outer ".into()), inner_footnote])],
        );
        let (blocks, meta) = read(vec![outer]);
        assert_eq!(meta.warnings.len(), 0);
        // the outer note lives inline...
        match &blocks[0] {
            Block::Paragraph(inlines) => assert!(matches!(inlines[0], Inline::Note(..))),
            other => panic!("expected a paragraph, got {other:?}"),
        }
        // ...and the inner one was hoisted to a trailing top-level block.
        assert!(blocks.iter().any(|b| matches!(
            b,
            Block::Paragraph(inlines) if matches!(inlines.first(), Some(Inline::Note(..)))
        )));
    }

    #[test]
    fn cite_registers_citation_order_once() {
        let atoms = vec![
            Atom::Command("cite".into(), vec![Arg::Obligatory(vec![Atom::Plain("knuth84".into())])]),
            Atom::Par,
            Atom::Command("cite".into(), vec![Arg::Obligatory(vec![Atom::Plain("knuth84".into())])]),
        ];
        let (_, meta) = read(atoms);
        assert_eq!(meta.citation_order, vec!["knuth84".to_string()]);
    }

    #[test]
    fn cites_collects_keys_from_each_group() {
        let atoms = vec![Atom::Command(
            "cites".into(),
            vec![
                Arg::Obligatory(vec![Atom::Plain("knuth84".into())]),
                Arg::Obligatory(vec![Atom::Plain("lamport94".into())]),
            ],
        )];
        let (blocks, meta) = read(atoms);
        match &blocks[0] {
            Block::Paragraph(inlines) => match &inlines[0] {
                Inline::Citation(c) => {
                    assert_eq!(c.mode, CiteMode::Cites);
                    assert_eq!(c.keys, vec!["knuth84".to_string(), "lamport94".to_string()]);
                }
                other => panic!("expected a citation, got {other:?}"),
            },
            other => panic!("expected a paragraph, got {other:?}"),
        }
        assert_eq!(meta.citation_order, vec!["knuth84".to_string(), "lamport94".to_string()]);
    }

    #[test]
    fn label_inside_figure_binds_to_the_figure_anchor() {
        let atoms = vec![
            Atom::Command(
                "chapter".into(),
                vec![Arg::Obligatory(vec![Atom::Plain("A".into())])],
            ),
            Atom::Group(
                "figure".into(),
                vec![],
                vec![
                    Atom::Command(
                        "includegraphics".into(),
                        vec![Arg::Obligatory(vec![Atom::Plain("img.png".into())])],
                    ),
                    Atom::Command("label".into(), vec![Arg::Obligatory(vec![Atom::Plain("f".into())])]),
                ],
            ),
            Atom::Command("ref".into(), vec![Arg::Obligatory(vec![Atom::Plain("f".into())])]),
        ];
        let (blocks, _) = read(atoms);
        match &blocks[2] {
            Block::Paragraph(inlines) => match &inlines[0] {
                Inline::Pointer(_, Some(PointerTarget::Internal(anchor))) => {
                    assert_eq!(anchor.id(), "figure-1-1")
                }
                other => panic!("expected a resolved pointer, got {other:?}"),
            },
            other => panic!("expected a paragraph, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_label_keeps_first_binding_and_warns() {
        let atoms = vec![
            Atom::Command(
                "section".into(),
                vec![Arg::Obligatory(vec![Atom::Plain("First".into())])],
            ),
            Atom::Command("label".into(), vec![Arg::Obligatory(vec![Atom::Plain("x".into())])]),
            Atom::Command(
                "section".into(),
                vec![Arg::Obligatory(vec![Atom::Plain("Second".into())])],
            ),
            Atom::Command("label".into(), vec![Arg::Obligatory(vec![Atom::Plain("x".into())])]),
            Atom::Command("ref".into(), vec![Arg::Obligatory(vec![Atom::Plain("x".into())])]),
        ];
        let (blocks, meta) = read(atoms);
        match blocks.last().unwrap() {
            Block::Paragraph(inlines) => match &inlines[0] {
                Inline::Pointer(_, Some(PointerTarget::Internal(anchor))) => {
                    assert_eq!(anchor.id(), "sec-1")
                }
                other => panic!("expected a resolved pointer, got {other:?}"),
            },
            other => panic!("expected a paragraph, got {other:?}"),
        }
        assert!(meta.warnings.iter().any(|w| w.contains("duplicate label")));
    }

    #[test]
    fn tabular_splits_rows_and_cells() {
        let atoms = vec![Atom::Group(
            "tabular".into(),
            vec![],
            vec![
                Atom::Plain("a".into()),
                Atom::AlignMark,
                Atom::Plain("b".into()),
                Atom::Command("\\\\".into(), vec![]),
                Atom::Plain("c".into()),
                Atom::AlignMark,
                Atom::Plain("d".into()),
            ],
        )];
        let (blocks, _) = read(atoms);
        match &blocks[0] {
            Block::SimpleTable(rows) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0][0].content, vec![Inline::Str("a".into())]);
                assert_eq!(rows[1][1].content, vec![Inline::Str("d".into())]);
            }
            other => panic!("expected a simple table, got {other:?}"),
        }
    }
}
