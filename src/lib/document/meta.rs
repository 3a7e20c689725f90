//! Document-wide state threaded through the reader's walk (SPEC_FULL.md
//! §3 "Document meta", §4.6).
//!
//! [`DocumentMeta`] is the `S` in `Walker<S>` for the whole reader: it is
//! cloned on every backtracking [`crate::walker::Walker::attempt`], so a
//! failed production never leaks a counter bump or a label registration.

use std::collections::HashMap;

use crate::document::model::{Anchor, BookRegion};

/// A pre-parsed bibliography, handed in from outside this crate. Parsing
/// `.bib` files is out of scope; this only holds what the caller already
/// rendered per key.
#[derive(Debug, Clone, Default)]
pub struct BibDatabase {
    entries: HashMap<String, String>,
}

impl BibDatabase {
    /// An empty database, for documents without a `\bibliography`.
    pub fn new() -> BibDatabase {
        BibDatabase::default()
    }

    /// Build a database from already-rendered `key -> text` pairs.
    pub fn from_entries(entries: HashMap<String, String>) -> BibDatabase {
        BibDatabase { entries }
    }

    /// The rendered text for `key`, if known.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// `true` if `key` exists in the database.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

/// Section/figure/table/... running counters (§3, §6).
///
/// `section` holds one entry per heading level (`part` through
/// `subparagraph`); bumping a level resets every deeper one to zero.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub section: [u32; 7],
    pub figure: u32,
    pub table: u32,
    pub note: u32,
    pub item: Vec<u32>,
    pub phantom_section: u32,
    pub citation_order: u32,
    pub media: u32,
}

/// All state a document reader accumulates while walking the atom tree.
#[derive(Debug, Clone)]
pub struct DocumentMeta {
    pub title: Option<Vec<crate::document::model::Inline>>,
    pub subtitle: Option<Vec<crate::document::model::Inline>>,
    pub authors: Vec<Vec<crate::document::model::Inline>>,
    pub date: Option<Vec<crate::document::model::Inline>>,
    pub bib: BibDatabase,
    pub citation_order: Vec<String>,
    pub labels: HashMap<String, Anchor>,
    pub current_anchor: Anchor,
    pub media: HashMap<u32, String>,
    pub counters: Counters,
    pub region: BookRegion,
    pub warnings: Vec<String>,
    /// Depth of `\footnote` nesting currently being read; only the
    /// outermost call returns its [`crate::document::model::Inline::Note`]
    /// in place, deeper ones hoist into [`DocumentMeta::hoisted_notes`]
    /// (§4.6 boundary case: nested footnotes flatten to top level).
    pub footnote_depth: u32,
    pub hoisted_notes: Vec<crate::document::model::Inline>,
}

/// Heading levels, `part` outermost: matches the index into
/// [`Counters::section`].
pub const LEVEL_PART: usize = 0;
pub const LEVEL_CHAPTER: usize = 1;
pub const LEVEL_SECTION: usize = 2;
pub const LEVEL_SUBSECTION: usize = 3;
pub const LEVEL_SUBSUBSECTION: usize = 4;
pub const LEVEL_PARAGRAPH: usize = 5;
pub const LEVEL_SUBPARAGRAPH: usize = 6;

impl DocumentMeta {
    pub fn new(bib: BibDatabase) -> DocumentMeta {
        DocumentMeta {
            title: None,
            subtitle: None,
            authors: Vec::new(),
            date: None,
            bib,
            citation_order: Vec::new(),
            labels: HashMap::new(),
            current_anchor: Anchor::Document,
            media: HashMap::new(),
            counters: Counters::default(),
            region: BookRegion::Main,
            warnings: Vec::new(),
            footnote_depth: 0,
            hoisted_notes: Vec::new(),
        }
    }

    /// Bump `level`'s counter, zero every deeper level, and return the
    /// path up to `level` as the new section anchor's numbering — see
    /// [`Anchor::id`] for how unused outer levels get stripped from it.
    pub fn bump_section(&mut self, level: usize) -> Vec<u32> {
        self.counters.section[level] += 1;
        for deeper in &mut self.counters.section[level + 1..] {
            *deeper = 0;
        }
        self.counters.section[..=level].to_vec()
    }

    pub fn next_phantom_section(&mut self) -> u32 {
        self.counters.phantom_section += 1;
        self.counters.phantom_section
    }

    pub fn next_figure(&mut self) -> u32 {
        self.counters.figure += 1;
        self.counters.figure
    }

    pub fn next_table(&mut self) -> u32 {
        self.counters.table += 1;
        self.counters.table
    }

    pub fn next_note(&mut self) -> u32 {
        self.counters.note += 1;
        self.counters.note
    }

    /// `\cite`-family registration: a key's citation-order index is fixed
    /// at its first occurrence (§4.6).
    pub fn register_citation(&mut self, key: &str) {
        if !self.citation_order.iter().any(|k| k == key) {
            self.citation_order.push(key.to_string());
        }
    }

    /// Labels are globally unique: a re-used key keeps its first binding
    /// and the second definition is silently ignored (§3), surfaced only
    /// as a warning here.
    pub fn register_label(&mut self, key: String, anchor: Anchor) {
        if !self.labels.contains_key(&key) {
            self.labels.insert(key, anchor);
        } else {
            self.warn(format!("duplicate label '{key}', keeping its first definition"));
        }
    }

    pub fn resolve_label(&self, key: &str) -> Option<&Anchor> {
        self.labels.get(key)
    }

    /// Register a `\includegraphics` target, returning a stable media id.
    pub fn register_media(&mut self, path: String) -> u32 {
        self.counters.media += 1;
        let id = self.counters.media;
        self.media.insert(id, path);
        id
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}
