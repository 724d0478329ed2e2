//! Lenient reader and writer for the `odbc.ini` / `odbcinst.ini` format.
//!
//! The format is a flat list of `[Section]` headers followed by
//! `Key = Value` lines. Parsing never aborts on bad input: every section is
//! returned as a [`ParsedSection`], either `Valid` or `Malformed` with the
//! first error found and its raw lines, so the caller can report every bad
//! section and still use the rest of the file.

use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{OdbcAdminError, Result};

/// Why a line could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseReason {
    /// Neither a header, a comment, nor `Key = Value`
    MissingSeparator,
    /// A `Key = Value` line before any `[Section]` header
    EntryOutsideSection,
    /// `= Value` with nothing before the separator
    EmptyKey,
    /// `[Name` without the closing bracket
    UnterminatedHeader,
}

impl std::fmt::Display for ParseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSeparator => f.write_str("expected 'Key = Value'"),
            Self::EntryOutsideSection => f.write_str("entry appears before any [Section] header"),
            Self::EmptyKey => f.write_str("empty key"),
            Self::UnterminatedHeader => f.write_str("section header is missing ']'"),
        }
    }
}

/// A malformed line, 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    pub line: usize,
    pub reason: ParseReason,
}

/// A named section with its entries in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub entries: Vec<(String, String)>,
}

impl Section {
    /// Creates an empty section.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Builder form of [`Section::set`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Value for `key` (exact match).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value for `key`, ignoring ASCII case.
    pub fn get_ignore_case(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Inserts or replaces `key`; a replaced key keeps its position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Whether `key` is present (exact match).
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }
}

/// One section of a parsed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedSection {
    /// A section whose every line parsed
    Valid(Section),
    /// A section containing at least one bad line; skipped by loaders
    Malformed {
        /// Header name, `None` for lines preceding the first header
        name: Option<String>,
        /// First error found in the section
        error: ParseError,
        /// Original non-blank, non-comment lines, kept for rewriting
        raw_lines: Vec<String>,
    },
}

impl ParsedSection {
    /// Section name, if the section has a header.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Valid(section) => Some(section.name.as_str()),
            Self::Malformed { name, .. } => name.as_deref(),
        }
    }
}

/// In-progress section while scanning lines.
struct Pending {
    name: Option<String>,
    entries: Vec<(String, String)>,
    error: Option<ParseError>,
    raw_lines: Vec<String>,
}

impl Pending {
    fn new(name: Option<String>) -> Self {
        Self {
            name,
            entries: Vec::new(),
            error: None,
            raw_lines: Vec::new(),
        }
    }

    fn fail(&mut self, line: usize, reason: ParseReason) {
        if self.error.is_none() {
            self.error = Some(ParseError { line, reason });
        }
    }

    fn finish(self) -> Option<ParsedSection> {
        match (self.error, self.name) {
            (Some(error), name) => Some(ParsedSection::Malformed {
                name,
                error,
                raw_lines: self.raw_lines,
            }),
            (None, Some(name)) => Some(ParsedSection::Valid(Section {
                name,
                entries: self.entries,
            })),
            // Blank preamble
            (None, None) => None,
        }
    }
}

/// Parses file contents into sections.
pub fn parse_str(contents: &str) -> Vec<ParsedSection> {
    let mut sections = Vec::new();
    let mut current = Pending::new(None);

    for (idx, raw) in contents.lines().enumerate() {
        let line_no = idx.saturating_add(1);
        let line = raw.trim();

        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix('[') {
            if let Some(name) = rest.strip_suffix(']') {
                let finished = std::mem::replace(
                    &mut current,
                    Pending::new(Some(name.trim().to_string())),
                );
                sections.extend(finished.finish());
                current.raw_lines.push(line.to_string());
            } else {
                // Still a header attempt: start a new (already broken) section
                let finished = std::mem::replace(
                    &mut current,
                    Pending::new(Some(rest.trim().to_string())),
                );
                sections.extend(finished.finish());
                current.raw_lines.push(line.to_string());
                current.fail(line_no, ParseReason::UnterminatedHeader);
            }
            continue;
        }

        current.raw_lines.push(line.to_string());

        if current.name.is_none() {
            current.fail(line_no, ParseReason::EntryOutsideSection);
            continue;
        }

        match line.split_once('=') {
            Some((key, value)) => {
                let key = key.trim();
                if key.is_empty() {
                    current.fail(line_no, ParseReason::EmptyKey);
                    continue;
                }
                let value = value.trim().to_string();
                match current.entries.iter_mut().find(|(k, _)| k == key) {
                    Some(existing) => existing.1 = value,
                    None => current.entries.push((key.to_string(), value)),
                }
            }
            None => current.fail(line_no, ParseReason::MissingSeparator),
        }
    }

    sections.extend(current.finish());
    sections
}

/// Reads and parses a configuration file.
///
/// A missing file parses as empty.
///
/// # Errors
/// Returns an I/O error for any failure other than the file not existing.
pub fn parse(path: &Path) -> Result<Vec<ParsedSection>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let sections = parse_str(&contents);
            for section in &sections {
                if let ParsedSection::Malformed { name, error, .. } = section {
                    warn!(
                        "{}: skipping section {}: {}",
                        path.display(),
                        name.as_deref().unwrap_or("<preamble>"),
                        error
                    );
                }
            }
            debug!("Parsed {} sections from {}", sections.len(), path.display());
            Ok(sections)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("{} does not exist yet; treating as empty", path.display());
            Ok(Vec::new())
        }
        Err(e) => Err(OdbcAdminError::io("read", path, e)),
    }
}

/// Renders sections as file contents.
pub fn render(sections: &[Section]) -> String {
    let mut out = String::new();
    for section in sections {
        push_section(&mut out, section);
    }
    out
}

/// Renders a parsed document; malformed blocks are emitted verbatim.
pub fn render_document(sections: &[ParsedSection]) -> String {
    let mut out = String::new();
    for section in sections {
        match section {
            ParsedSection::Valid(section) => push_section(&mut out, section),
            ParsedSection::Malformed { raw_lines, .. } => {
                if !out.is_empty() {
                    out.push('\n');
                }
                for line in raw_lines {
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
    }
    out
}

fn push_section(out: &mut String, section: &Section) {
    if !out.is_empty() {
        out.push('\n');
    }
    out.push('[');
    out.push_str(&section.name);
    out.push_str("]\n");
    for (key, value) in &section.entries {
        out.push_str(key);
        out.push_str(" = ");
        out.push_str(value);
        out.push('\n');
    }
}

/// Writes sections to `path`, creating parent directories.
///
/// # Errors
/// Returns an I/O error if the directory or file cannot be written.
pub fn write(path: &Path, sections: &[Section]) -> Result<()> {
    write_contents(path, &render(sections))
}

/// Writes a parsed document, keeping malformed blocks intact.
///
/// # Errors
/// Returns an I/O error if the directory or file cannot be written.
pub fn write_document(path: &Path, sections: &[ParsedSection]) -> Result<()> {
    write_contents(path, &render_document(sections))
}

fn write_contents(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| OdbcAdminError::io("create directory", parent, e))?;
    }
    std::fs::write(path, contents).map_err(|e| OdbcAdminError::io("write", path, e))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    fn valid(sections: &[ParsedSection]) -> Vec<&Section> {
        sections
            .iter()
            .filter_map(|s| match s {
                ParsedSection::Valid(section) => Some(section),
                ParsedSection::Malformed { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_parse_sections_and_entries() {
        let parsed = parse_str(
            "; comment\n\n[Prod]\nDriver=MySQL\nServer = db.local\n\n[Dev]\nPort= 3306\n",
        );
        let sections = valid(&parsed);

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].name, "Prod");
        assert_eq!(sections[0].get("Driver"), Some("MySQL"));
        assert_eq!(sections[0].get("Server"), Some("db.local"));
        assert_eq!(sections[1].get("Port"), Some("3306"));
    }

    #[test]
    fn test_last_duplicate_key_wins() {
        let parsed = parse_str("[A]\nPort=1\nHost=h\nPort=2\n");
        let sections = valid(&parsed);

        assert_eq!(
            sections[0].entries,
            vec![
                ("Port".to_string(), "2".to_string()),
                ("Host".to_string(), "h".to_string()),
            ]
        );
    }

    #[test]
    fn test_value_may_contain_separator() {
        let parsed = parse_str("[A]\nOptions = a=b;c=d\n");
        assert_eq!(valid(&parsed)[0].get("Options"), Some("a=b;c=d"));
    }

    #[test]
    fn test_hash_comments_are_discarded() {
        let parsed = parse_str("# leading\n[A]\n# inner\nKey=1\n");
        assert_eq!(parsed.len(), 1);
        assert_eq!(valid(&parsed)[0].entries.len(), 1);
    }

    #[test]
    fn test_malformed_section_is_skipped_and_reported() {
        let parsed = parse_str("[Good]\nA=1\n[Bad]\nB=2\nnot a pair\nC=3\n[Also]\nD=4\n");

        assert_eq!(parsed.len(), 3);
        assert_eq!(valid(&parsed).len(), 2);
        match &parsed[1] {
            ParsedSection::Malformed {
                name,
                error,
                raw_lines,
            } => {
                assert_eq!(name.as_deref(), Some("Bad"));
                assert_eq!(error.line, 5);
                assert_eq!(error.reason, ParseReason::MissingSeparator);
                assert_eq!(raw_lines.len(), 4);
            }
            other => panic!("expected malformed section, got {:?}", other),
        }
    }

    #[test]
    fn test_entry_before_header() {
        let parsed = parse_str("Stray=1\n[A]\nKey=1\n");

        assert_eq!(parsed.len(), 2);
        match &parsed[0] {
            ParsedSection::Malformed { name, error, .. } => {
                assert!(name.is_none());
                assert_eq!(error.reason, ParseReason::EntryOutsideSection);
                assert_eq!(error.line, 1);
            }
            other => panic!("expected malformed preamble, got {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_header_and_empty_key() {
        let parsed = parse_str("[Broken\nA=1\n[Empty]\n=value\n");

        assert!(matches!(
            &parsed[0],
            ParsedSection::Malformed { error, .. } if error.reason == ParseReason::UnterminatedHeader
        ));
        assert!(matches!(
            &parsed[1],
            ParsedSection::Malformed { error, .. } if error.reason == ParseReason::EmptyKey
        ));
    }

    #[test]
    fn test_render_format() {
        let sections = vec![
            Section::new("MySQL").with("Driver", "/usr/lib/libmyodbc8.so"),
            Section::new("PG").with("Driver", "/usr/lib/psqlodbcw.so"),
        ];
        assert_eq!(
            render(&sections),
            "[MySQL]\nDriver = /usr/lib/libmyodbc8.so\n\n[PG]\nDriver = /usr/lib/psqlodbcw.so\n"
        );
    }

    #[test]
    fn test_render_document_keeps_malformed_lines() {
        let parsed = parse_str("[Good]\nA=1\n[Bad]\noops\n");
        let rendered = render_document(&parsed);

        assert!(rendered.contains("[Bad]\noops\n"));
        let reparsed = parse_str(&rendered);
        assert_eq!(reparsed.len(), 2);
        assert_eq!(reparsed[0], parsed[0]);
        assert!(matches!(
            &reparsed[1],
            ParsedSection::Malformed { name, .. } if name.as_deref() == Some("Bad")
        ));
    }

    #[test]
    fn test_parse_missing_file_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let parsed = parse(&dir.path().join("absent.ini")).expect("missing is empty");
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_write_then_parse() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("etc/odbcinst.ini");
        let sections = vec![Section::new("PG").with("Driver", "/no/such/file.so")];

        write(&path, &sections).expect("write");
        let parsed = parse(&path).expect("parse");

        assert_eq!(parsed, vec![ParsedSection::Valid(sections[0].clone())]);
    }
}
