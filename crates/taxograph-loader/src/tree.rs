//! In-memory view of one source's hierarchy, built once per merge.

use ahash::{AHashMap, AHashSet};

use taxograph_ingest::TaxonRecord;

use crate::report::{Anomaly, LoadReport};

pub(crate) struct SourceTree<'r> {
    /// Records in file order, first occurrence of each local id only.
    pub(crate) records: Vec<&'r TaxonRecord>,
    pub(crate) by_id: AHashMap<&'r str, &'r TaxonRecord>,
    /// parent local id -> children, file order.
    pub(crate) children: AHashMap<&'r str, Vec<&'r TaxonRecord>>,
    pub(crate) roots: Vec<&'r TaxonRecord>,
}

/// Why an ancestor chain could not be walked to a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChainBreak<'r> {
    /// Parent id not defined anywhere in the source.
    Missing(&'r str),
    /// The chain loops back on itself at this id.
    Cycle(&'r str),
}

impl<'r> ChainBreak<'r> {
    pub(crate) fn id(&self) -> &'r str {
        match self {
            ChainBreak::Missing(id) | ChainBreak::Cycle(id) => *id,
        }
    }
}

impl<'r> SourceTree<'r> {
    pub(crate) fn build(records: &'r [TaxonRecord], report: &mut LoadReport) -> Self {
        let mut tree = SourceTree {
            records: Vec::with_capacity(records.len()),
            by_id: AHashMap::with_capacity(records.len()),
            children: AHashMap::new(),
            roots: Vec::new(),
        };

        for record in records {
            if tree.by_id.contains_key(record.local_id.as_str()) {
                report.note(Anomaly::DuplicateLocalId {
                    local_id: record.local_id.clone(),
                    name: record.name.clone(),
                });
                continue;
            }
            tree.by_id.insert(&record.local_id, record);
            tree.records.push(record);
            match record.parent_id.as_deref() {
                Some(parent) => tree.children.entry(parent).or_default().push(record),
                None => tree.roots.push(record),
            }
        }
        tree
    }

    pub(crate) fn children_of(&self, local_id: &str) -> &[&'r TaxonRecord] {
        self.children
            .get(local_id)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    /// Names of every ancestor, nearest first, through the topmost root.
    pub(crate) fn ancestor_path(&self, record: &'r TaxonRecord) -> Result<Vec<&'r str>, ChainBreak<'r>> {
        let mut path = Vec::new();
        let mut seen: AHashSet<&str> = AHashSet::new();
        seen.insert(record.local_id.as_str());
        let mut cursor = record.parent_id.as_deref();

        while let Some(parent_id) = cursor {
            let Some(parent) = self.by_id.get(parent_id) else {
                return Err(ChainBreak::Missing(parent_id));
            };
            if !seen.insert(parent_id) {
                return Err(ChainBreak::Cycle(parent_id));
            }
            path.push(parent.name.as_str());
            cursor = parent.parent_id.as_deref();
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::LoadMode;

    fn report() -> LoadReport {
        LoadReport::new("t", LoadMode::Initial, 10)
    }

    #[test]
    fn test_ancestor_path_reaches_root_name() {
        let records = vec![
            TaxonRecord::root("1", "life"),
            TaxonRecord::child("2", "1", "Plantae"),
            TaxonRecord::child("3", "2", "Rosaceae"),
            TaxonRecord::child("4", "3", "Rosa"),
        ];
        let mut r = report();
        let tree = SourceTree::build(&records, &mut r);
        assert_eq!(
            tree.ancestor_path(&records[3]).unwrap(),
            vec!["Rosaceae", "Plantae", "life"]
        );
        assert!(tree.ancestor_path(&records[0]).unwrap().is_empty());
        assert_eq!(tree.children_of("1").len(), 1);
    }

    #[test]
    fn test_missing_parent_breaks_chain() {
        let records = vec![
            TaxonRecord::child("2", "9", "Plantae"),
            TaxonRecord::child("3", "2", "Rosa"),
        ];
        let mut r = report();
        let tree = SourceTree::build(&records, &mut r);
        assert_eq!(tree.ancestor_path(&records[1]), Err(ChainBreak::Missing("9")));
    }

    #[test]
    fn test_cycle_breaks_chain() {
        let records = vec![
            TaxonRecord::child("1", "2", "A"),
            TaxonRecord::child("2", "1", "B"),
        ];
        let mut r = report();
        let tree = SourceTree::build(&records, &mut r);
        assert_eq!(tree.ancestor_path(&records[0]), Err(ChainBreak::Cycle("1")));
    }

    #[test]
    fn test_duplicate_local_ids_keep_first() {
        let records = vec![TaxonRecord::root("1", "life"), TaxonRecord::root("1", "other")];
        let mut r = report();
        let tree = SourceTree::build(&records, &mut r);
        assert_eq!(tree.records.len(), 1);
        assert_eq!(tree.by_id["1"].name, "life");
        assert_eq!(r.duplicate_local_ids, 1);
    }
}
