//! GBIF-style backbone tables.
//!
//! Tab separated, empty fields preserved, at least 18 columns. Rows with an
//! `acceptedNameUsageID` are synonyms of that id; every other row is a taxon
//! record named by its `canonicalName`.

use std::io::BufRead;

use crate::{
    malformed, numbered_lines, MalformedLinePolicy, ParsedSource, ReadError, SynonymEntry,
    TaxonRecord,
};

pub const COLUMNS: [&str; 18] = [
    "ID",
    "parentNameUsageID",
    "acceptedNameUsageID",
    "scientificName",
    "canonicalName",
    "taxonRank",
    "taxonomicStatus",
    "nomenclaturalStatus",
    "genus",
    "specificEpithet",
    "infraspecificEpithet",
    "namePublishedIn",
    "nameAccordingTo",
    "kingdom",
    "phylum",
    "class",
    "order",
    "family",
];

const ID: usize = 0;
const PARENT: usize = 1;
const ACCEPTED: usize = 2;
const CANONICAL_NAME: usize = 4;
const TAXONOMIC_STATUS: usize = 6;

pub fn read_gbif<R: BufRead>(reader: R, policy: MalformedLinePolicy) -> Result<ParsedSource, ReadError> {
    let mut parsed = ParsedSource::default();

    for line in numbered_lines(reader) {
        let (line_no, text) = line?;
        if text.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = text.split('\t').collect();
        if fields.len() < COLUMNS.len() {
            let err = ReadError::MalformedRecordFormat {
                line: line_no,
                found: fields.len(),
                expected: "at least 18",
                content: text.clone(),
            };
            malformed(policy, err, line_no, &mut parsed)?;
            continue;
        }

        let accepted = fields[ACCEPTED];
        if !accepted.is_empty() {
            let mut entry = SynonymEntry::new(fields[CANONICAL_NAME], fields[TAXONOMIC_STATUS]);
            entry.attrs.push(("gbif_ID".to_string(), fields[ID].to_string()));
            parsed.synonyms.push(accepted, entry);
            continue;
        }

        let attrs = COLUMNS
            .iter()
            .zip(&fields)
            .filter(|(_, value)| !value.is_empty())
            .map(|(column, value)| (format!("gbif_{column}"), value.to_string()))
            .collect();
        let parent = fields[PARENT];
        parsed.records.push(TaxonRecord {
            local_id: fields[ID].to_string(),
            parent_id: (!parent.is_empty()).then(|| parent.to_string()),
            name: fields[CANONICAL_NAME].to_string(),
            attrs,
        });
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cols: &[(usize, &str)]) -> String {
        let mut fields = vec![""; COLUMNS.len()];
        for &(i, v) in cols {
            fields[i] = v;
        }
        fields.join("\t")
    }

    #[test]
    fn test_accepted_rows_become_records() {
        let input = [
            row(&[(0, "6"), (4, "Plantae"), (5, "kingdom")]),
            row(&[(0, "3990"), (1, "6"), (4, "Rosa"), (5, "genus"), (13, "Plantae")]),
        ]
        .join("\n");

        let parsed = read_gbif(input.as_bytes(), MalformedLinePolicy::Abort).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert!(parsed.records[0].is_root());

        let rosa = &parsed.records[1];
        assert_eq!(rosa.name, "Rosa");
        assert_eq!(rosa.parent_id.as_deref(), Some("6"));
        assert!(rosa
            .attrs
            .contains(&("gbif_taxonRank".to_string(), "genus".to_string())));
        assert!(rosa
            .attrs
            .contains(&("gbif_kingdom".to_string(), "Plantae".to_string())));
        // empty columns are not carried
        assert!(!rosa.attrs.iter().any(|(k, _)| k == "gbif_family"));
    }

    #[test]
    fn test_synonym_rows_keyed_by_accepted_id() {
        let input = row(&[(0, "77"), (2, "3990"), (4, "Rhodon"), (6, "synonym")]);
        let parsed = read_gbif(input.as_bytes(), MalformedLinePolicy::Abort).unwrap();

        assert!(parsed.records.is_empty());
        let syns = parsed.synonyms.get("3990");
        assert_eq!(syns.len(), 1);
        assert_eq!(syns[0].name, "Rhodon");
        assert_eq!(syns[0].name_type, "synonym");
        assert_eq!(syns[0].attrs, vec![("gbif_ID".to_string(), "77".to_string())]);
    }

    #[test]
    fn test_short_rows_follow_policy() {
        let input = format!("1\t\t\tRosa\n{}", row(&[(0, "2"), (4, "Bellis")]));
        assert!(matches!(
            read_gbif(input.as_bytes(), MalformedLinePolicy::Abort),
            Err(ReadError::MalformedRecordFormat { line: 1, found: 4, .. })
        ));

        let parsed = read_gbif(input.as_bytes(), MalformedLinePolicy::Skip).unwrap();
        assert_eq!(parsed.skipped_lines, vec![1]);
        assert_eq!(parsed.records.len(), 1);
    }
}
