//! Tab-pipe hierarchy and synonym files.
//!
//! Fields are separated by any run of delimiter characters; empty tokens
//! collapse and tokens are trimmed, so `1\t|\t\t|\tlife` reads as the two
//! fields `1`, `life`.

use std::io::BufRead;

use crate::{
    malformed, numbered_lines, MalformedLinePolicy, ParsedSource, ReadError, SynonymEntry,
    SynonymTable, TaxonRecord,
};

/// Split on the delimiter set, trim, drop empty tokens.
pub fn tokenize<'a>(line: &'a str, delimiters: &'a [char]) -> Vec<&'a str> {
    line.split(|c: char| delimiters.contains(&c))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Read a hierarchy: 3 fields are `(localId, parentLocalId, name)`, 2 fields
/// a root `(localId, name)`.
pub fn read_hierarchy<R: BufRead>(
    reader: R,
    delimiters: &[char],
    policy: MalformedLinePolicy,
) -> Result<ParsedSource, ReadError> {
    let mut parsed = ParsedSource::default();

    for line in numbered_lines(reader) {
        let (line_no, text) = line?;
        if text.trim().is_empty() {
            continue;
        }

        let fields = tokenize(&text, delimiters);
        match fields.as_slice() {
            [id, parent, name] => parsed.records.push(TaxonRecord::child(*id, *parent, *name)),
            [id, name] => parsed.records.push(TaxonRecord::root(*id, *name)),
            other => {
                let err = ReadError::MalformedRecordFormat {
                    line: line_no,
                    found: other.len(),
                    expected: "2 or 3",
                    content: text.clone(),
                };
                malformed(policy, err, line_no, &mut parsed)?;
            }
        }
    }

    Ok(parsed)
}

/// Read a synonym list: exactly `(localId, synonymName, synonymType)` per line.
pub fn read_synonyms<R: BufRead>(reader: R, delimiters: &[char]) -> Result<SynonymTable, ReadError> {
    let mut table = SynonymTable::new();

    for line in numbered_lines(reader) {
        let (line_no, text) = line?;
        if text.trim().is_empty() {
            continue;
        }

        match tokenize(&text, delimiters).as_slice() {
            [id, name, name_type] => table.push(*id, SynonymEntry::new(*name, *name_type)),
            other => {
                return Err(ReadError::MalformedSynonymRecord {
                    line: line_no,
                    found: other.len(),
                    content: text.clone(),
                })
            }
        }
    }

    Ok(table)
}
