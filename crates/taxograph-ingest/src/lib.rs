//! Delimited taxonomy source readers
//!
//! Turns one hierarchy file into an ordered list of [`TaxonRecord`]s and an
//! optional synonym file into a [`SynonymTable`]:
//! - **tab-pipe** hierarchies: `localId | [parentLocalId |] name`
//! - **tab-pipe** synonym lists: `localId | synonymName | synonymType`
//! - **GBIF-style** tab-separated tables (accepted rows become records,
//!   rows with an accepted-name id become synonyms)
//!
//! Reading is a pure function of the input bytes. Readers accept any
//! [`BufRead`]; the `*_file` helpers wrap opening and hashing files.

pub mod gbif;
pub mod tab_pipe;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

/// Default delimiter character set (the `\t|\t` convention).
pub const DEFAULT_DELIMITERS: &[char] = &['\t', '|'];

// ============================================================================
// Records
// ============================================================================

/// One hierarchy line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonRecord {
    pub local_id: String,
    /// `None` for a root record.
    pub parent_id: Option<String>,
    pub name: String,
    /// Extra attributes carried onto the node (e.g. `gbif_taxonRank`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<(String, String)>,
}

impl TaxonRecord {
    pub fn root(local_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            parent_id: None,
            name: name.into(),
            attrs: Vec::new(),
        }
    }

    pub fn child(
        local_id: impl Into<String>,
        parent_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            local_id: local_id.into(),
            parent_id: Some(parent_id.into()),
            name: name.into(),
            attrs: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymEntry {
    pub name: String,
    pub name_type: String,
    /// Extra attributes (`gbif_ID` for GBIF-style synonyms).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<(String, String)>,
}

impl SynonymEntry {
    pub fn new(name: impl Into<String>, name_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            name_type: name_type.into(),
            attrs: Vec::new(),
        }
    }
}

/// Synonyms keyed by the local id of their accepted record, entries in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymTable {
    entries: BTreeMap<String, Vec<SynonymEntry>>,
}

impl SynonymTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, local_id: impl Into<String>, entry: SynonymEntry) {
        self.entries.entry(local_id.into()).or_default().push(entry);
    }

    pub fn get(&self, local_id: &str) -> &[SynonymEntry] {
        self.entries
            .get(local_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[SynonymEntry])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Merge another table in; for a shared id, `self`'s entries come first.
    pub fn extend(&mut self, other: SynonymTable) {
        for (id, list) in other.entries {
            self.entries.entry(id).or_default().extend(list);
        }
    }

    /// Number of synonym entries (not ids).
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything read from one source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSource {
    pub records: Vec<TaxonRecord>,
    pub synonyms: SynonymTable,
    /// 1-based line numbers dropped under [`MalformedLinePolicy::Skip`].
    pub skipped_lines: Vec<usize>,
}

// ============================================================================
// Options
// ============================================================================

/// What to do with a hierarchy line of the wrong shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedLinePolicy {
    /// The whole read fails with [`ReadError::MalformedRecordFormat`].
    #[default]
    Abort,
    /// The line is dropped and reported in [`ParsedSource::skipped_lines`].
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    #[default]
    TabPipe,
    Gbif,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: expected {expected} fields, found {found}: {content:?}")]
    MalformedRecordFormat {
        line: usize,
        found: usize,
        expected: &'static str,
        content: String,
    },
    #[error("synonym line {line}: expected 3 fields, found {found}: {content:?}")]
    MalformedSynonymRecord {
        line: usize,
        found: usize,
        content: String,
    },
}

pub(crate) fn stream_error(source: std::io::Error) -> ReadError {
    ReadError::Io {
        path: PathBuf::from("<stream>"),
        source,
    }
}

/// Apply the policy to one malformed hierarchy line.
pub(crate) fn malformed(
    policy: MalformedLinePolicy,
    err: ReadError,
    line: usize,
    parsed: &mut ParsedSource,
) -> Result<(), ReadError> {
    match policy {
        MalformedLinePolicy::Abort => Err(err),
        MalformedLinePolicy::Skip => {
            tracing::warn!(line, error = %err, "skipping malformed line");
            parsed.skipped_lines.push(line);
            Ok(())
        }
    }
}

// ============================================================================
// File helpers
// ============================================================================

fn open(path: &Path) -> Result<BufReader<File>, ReadError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| ReadError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn with_path(path: &Path, err: ReadError) -> ReadError {
    match err {
        ReadError::Io { source, .. } => ReadError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    }
}

/// Read a hierarchy file in the given format.
pub fn read_source_file(
    path: &Path,
    format: SourceFormat,
    policy: MalformedLinePolicy,
) -> Result<ParsedSource, ReadError> {
    let reader = open(path)?;
    let parsed = match format {
        SourceFormat::TabPipe => tab_pipe::read_hierarchy(reader, DEFAULT_DELIMITERS, policy),
        SourceFormat::Gbif => gbif::read_gbif(reader, policy),
    }
    .map_err(|e| with_path(path, e))?;

    tracing::info!(
        path = %path.display(),
        records = parsed.records.len(),
        synonyms = parsed.synonyms.len(),
        skipped = parsed.skipped_lines.len(),
        "read taxonomy source"
    );
    Ok(parsed)
}

/// Read a tab-pipe synonym file.
pub fn read_synonym_file(path: &Path) -> Result<SynonymTable, ReadError> {
    let reader = open(path)?;
    let table = tab_pipe::read_synonyms(reader, DEFAULT_DELIMITERS).map_err(|e| with_path(path, e))?;
    tracing::info!(path = %path.display(), synonyms = table.len(), "read synonym file");
    Ok(table)
}

/// Hex sha256 of a file's bytes (recorded on the source metadata node).
pub fn file_digest(path: &Path) -> Result<String, ReadError> {
    let mut reader = open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf).map_err(|source| ReadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    Ok(out)
}

/// Lines of a reader, 1-based, with I/O errors mapped.
pub(crate) fn numbered_lines<R: BufRead>(
    reader: R,
) -> impl Iterator<Item = Result<(usize, String), ReadError>> {
    reader
        .lines()
        .enumerate()
        .map(|(i, line)| line.map(|l| (i + 1, l)).map_err(stream_error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_synonym_table_keeps_file_order_per_id() {
        let mut table = SynonymTable::new();
        table.push("1", SynonymEntry::new("b", "t"));
        table.push("2", SynonymEntry::new("c", "t"));
        table.push("1", SynonymEntry::new("a", "t"));

        let names: Vec<_> = table.get("1").iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(table.len(), 3);
        assert!(table.get("3").is_empty());
    }

    #[test]
    fn test_file_digest_is_sha256_hex() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();
        let digest = file_digest(file.path()).unwrap();
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = read_source_file(
            Path::new("/definitely/not/here.tsv"),
            SourceFormat::TabPipe,
            MalformedLinePolicy::Abort,
        )
        .unwrap_err();
        match err {
            ReadError::Io { path, .. } => assert!(path.ends_with("here.tsv")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
