//! Input/output helpers for the CLI binary.

use std::io::Read;
use std::path::Path;

use crate::document::meta::BibDatabase;

/// Read one or more TeX sources: one per filename, or a single source
/// from standard input if none were given.
pub fn read_sources(filenames: &[std::path::PathBuf]) -> std::io::Result<Vec<String>> {
    if filenames.is_empty() {
        let mut source = String::new();
        std::io::stdin().read_to_string(&mut source)?;
        Ok(vec![source])
    } else {
        filenames.iter().map(std::fs::read_to_string).collect()
    }
}

/// Parse a pre-rendered bibliography file: one `key = rendered text`
/// entry per line, blank lines and `#`-led lines ignored. This crate
/// does not implement BibTeX's own grammar (see DESIGN.md); callers
/// who need real `.bib` parsing are expected to pre-render it.
pub fn read_bibfile(path: &Path) -> std::io::Result<BibDatabase> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = std::collections::HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, text)) = line.split_once('=') {
            entries.insert(key.trim().to_string(), text.trim().to_string());
        }
    }
    Ok(BibDatabase::from_entries(entries))
}
