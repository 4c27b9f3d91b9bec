use proptest::prelude::*;
use std::io::Write;
use taxograph_ingest::*;

fn token() -> impl Strategy<Value = String> {
    "[A-Za-z0-9][A-Za-z0-9 .]{0,12}[A-Za-z0-9]"
}

fn line_strategy() -> impl Strategy<Value = (String, Option<String>, String)> {
    (token(), prop::option::of(token()), token())
}

fn render(lines: &[(String, Option<String>, String)]) -> String {
    lines
        .iter()
        .map(|(id, parent, name)| match parent {
            Some(p) => format!("{id}\t|\t{p}\t|\t{name}\t|\t\n"),
            None => format!("{id}\t|\t\t|\t{name}\t|\t\n"),
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn hierarchy_read_is_deterministic_and_ordered(lines in prop::collection::vec(line_strategy(), 0..40)) {
        let input = render(&lines);
        let first = tab_pipe::read_hierarchy(input.as_bytes(), DEFAULT_DELIMITERS, MalformedLinePolicy::Abort).unwrap();
        let second = tab_pipe::read_hierarchy(input.as_bytes(), DEFAULT_DELIMITERS, MalformedLinePolicy::Abort).unwrap();
        prop_assert_eq!(&first, &second);

        prop_assert_eq!(first.records.len(), lines.len());
        for (record, (id, parent, name)) in first.records.iter().zip(&lines) {
            prop_assert_eq!(&record.local_id, id);
            prop_assert_eq!(&record.parent_id, parent);
            prop_assert_eq!(&record.name, name);
        }
    }

    #[test]
    fn skip_policy_keeps_every_well_formed_line(lines in prop::collection::vec(line_strategy(), 1..20), junk_at in 0usize..20) {
        let clean = render(&lines);
        let junk_line = junk_at.min(lines.len());
        let mut split: Vec<&str> = clean.lines().collect();
        split.insert(junk_line, "a|b|c|d|e");
        let input = split.join("\n");

        let parsed = tab_pipe::read_hierarchy(input.as_bytes(), DEFAULT_DELIMITERS, MalformedLinePolicy::Skip).unwrap();
        prop_assert_eq!(parsed.records.len(), lines.len());
        prop_assert_eq!(parsed.skipped_lines, vec![junk_line + 1]);
    }
}

#[test]
fn test_read_source_file_roundtrip_through_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "1\t|\t\t|\tlife\t|\t\n2\t|\t1\t|\tPlantae\t|\t\n").unwrap();

    let parsed = read_source_file(file.path(), SourceFormat::TabPipe, MalformedLinePolicy::Abort).unwrap();
    assert_eq!(parsed.records[0], TaxonRecord::root("1", "life"));
    assert_eq!(parsed.records[1], TaxonRecord::child("2", "1", "Plantae"));

    let digest = file_digest(file.path()).unwrap();
    assert_eq!(digest.len(), 64);
    assert_eq!(digest, file_digest(file.path()).unwrap());
}

#[test]
fn test_read_synonym_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "1\t|\tRosa canina\t|\thomotypic").unwrap();

    let table = read_synonym_file(file.path()).unwrap();
    assert_eq!(table.get("1"), &[SynonymEntry::new("Rosa canina", "homotypic")]);
}
