//! The semantic document model: the walker's output type
//! (SPEC_FULL.md §3, §4.6).

/// Which part of the book an element belongs to (§4.6: `\frontmatter`/
/// `\mainmatter`/`\appendix`/`\backmatter`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookRegion {
    Front,
    Main,
    /// `\appendix` and `\backmatter` both map here — see DESIGN.md for
    /// why that is preserved rather than split (§9 open question).
    Back,
}

/// A stable identity for a referenceable element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    Document,
    Section(BookRegion, Vec<u32>),
    PhantomSection(BookRegion, u32),
    Figure(u32, u32),
    Table(u32, u32),
    Note(u32, u32),
    NoteText(u32, u32),
    Item(Vec<u32>),
    Bib(u32),
}

impl Anchor {
    /// Render the bit-exact identifier scheme of SPEC_FULL.md §6.
    pub fn id(&self) -> String {
        match self {
            Anchor::Document => String::new(),
            Anchor::Section(region, path) => {
                let prefix = match region {
                    BookRegion::Front => "front-",
                    BookRegion::Back => "back-",
                    BookRegion::Main => "",
                };
                // `path` runs part..=level; strip the unused outer levels
                // (e.g. part/chapter when only \section was used) rather
                // than any trailing zero, since the last entry is always
                // the level just bumped and so never zero itself.
                let mut trimmed: Vec<u32> = path.clone();
                while trimmed.len() > 1 && trimmed[0] == 0 {
                    trimmed.remove(0);
                }
                let digits: Vec<String> = trimmed.iter().map(u32::to_string).collect();
                format!("sec-{prefix}{}", digits.join("-"))
            }
            Anchor::PhantomSection(region, n) => {
                let prefix = match region {
                    BookRegion::Front => "front-",
                    BookRegion::Back => "back-",
                    BookRegion::Main => "",
                };
                format!("sec-{prefix}unnumbered-{n}")
            }
            Anchor::Figure(c, n) => format!("figure-{c}-{n}"),
            Anchor::Table(c, n) => format!("table-{c}-{n}"),
            Anchor::Note(c, n) => format!("note-{c}-{n}"),
            Anchor::NoteText(c, n) => format!("notetext-{c}-{n}"),
            Anchor::Item(path) => {
                let digits: Vec<String> = path.iter().map(u32::to_string).collect();
                format!("item-{}", digits.join("-"))
            }
            Anchor::Bib(n) => format!("bib-{n}"),
        }
    }
}

/// `\em`/`\textbf`/... switches, including the implicit `Normal` used
/// when a nested font switch inverts an enclosing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Emph,
    Bold,
    Italic,
    SmallCaps,
}

/// One ordered/unordered list's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListType {
    Unordered,
    Ordered,
}

/// `\href`/`\url` target, or a resolved `\ref`/`\pageref`/`\autoref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerTarget {
    Internal(Anchor),
    External { text: String, url: String },
}

/// `\cite` and friends: mode, optional pre/postnote, and the cited keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiteMode {
    Cite,
    Parencite,
    Textcite,
    Citeauthor,
    Citeyear,
    /// `\cites{k1}{k2}...`
    Cites,
    /// `\parencites{k1}{k2}...`
    Parencites,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiCite {
    pub mode: CiteMode,
    pub prenote: Option<Vec<Inline>>,
    pub postnote: Option<Vec<Inline>>,
    pub keys: Vec<String>,
}

/// One table cell, possibly spanning multiple columns (`\multicolumn`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub span: u32,
    pub content: Vec<Inline>,
}

/// A pre-parsed bibliography entry, as delivered by the (out-of-scope)
/// BibTeX subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibEntry {
    pub key: String,
    pub rendered: Vec<Inline>,
}

/// Inline-level semantic content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Str(String),
    FontStyle(FontStyle, Vec<Inline>),
    Math(crate::atom::MathType, Vec<Inline>),
    Space,
    Citation(MultiCite),
    Pointer(String, Option<PointerTarget>),
    Note(Anchor, Vec<Block>),
}

/// Block-level semantic content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Vec<Inline>),
    Header(u8, Anchor, Vec<Inline>),
    List(ListType, Vec<Vec<Block>>),
    AnchorList(ListType, Vec<(Anchor, Vec<Block>)>),
    BibList(Vec<BibEntry>),
    QuotationBlock(Vec<Block>),
    Figure(Anchor, u32, Vec<Inline>),
    Table(Anchor, Vec<Inline>, Vec<Vec<Cell>>),
    SimpleTable(Vec<Vec<Cell>>),
}
