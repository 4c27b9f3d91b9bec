//! Initial (bulk) load tests

use proptest::prelude::*;
use taxograph_ingest::{SynonymEntry, SynonymTable, TaxonRecord};
use taxograph_loader::*;
use taxograph_pathdb::*;

fn load(graph: &mut TaxonGraph, records: &[TaxonRecord], synonyms: &SynonymTable) -> LoadReport {
    TaxonomyLoader::new(graph, LoaderConfig::default())
        .load_initial(&SourceDescriptor::named("a"), records, synonyms)
        .unwrap()
}

fn metadata_targets(graph: &TaxonGraph, report: &LoadReport) -> Vec<NodeId> {
    graph.neighbors(
        report.metadata_node.unwrap(),
        EdgeKind::MetadataFor,
        Direction::Outgoing,
    )
}

// ============================================================================
// Structure
// ============================================================================

#[test]
fn test_one_node_per_record_and_metadata_per_root() {
    let mut graph = TaxonGraph::new();
    let records = vec![
        TaxonRecord::root("1", "life"),
        TaxonRecord::child("2", "1", "Plantae"),
        TaxonRecord::child("3", "2", "Rosa"),
        TaxonRecord::root("4", "Viruses"),
    ];
    let report = load(&mut graph, &records, &SynonymTable::new());

    assert_eq!(report.nodes_created, 4);
    assert_eq!(graph.node_count(), 5);
    assert_eq!(report.roots_linked, 2);
    assert_eq!(metadata_targets(&graph, &report).len(), 2);

    let rosa = graph.index_by_name(NameIndex::Accepted, "Rosa")[0];
    let plantae = graph.index_by_name(NameIndex::Accepted, "Plantae")[0];
    let edges = graph.edges(rosa, EdgeKind::ChildOf, Direction::Outgoing);
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].to, plantae);
    assert_eq!(edges[0].attr("source"), Some("a"));
    assert_eq!(edges[0].attr("childid"), Some("3"));
    assert_eq!(edges[0].attr("parentid"), Some("2"));
}

#[test]
fn test_metadata_node_is_indexed_by_source() {
    let mut graph = TaxonGraph::new();
    let mut source = SourceDescriptor::named("ncbi");
    source.version = Some("2024-01".to_string());
    let report = TaxonomyLoader::new(&mut graph, LoaderConfig::default())
        .load_initial(&source, &[TaxonRecord::root("1", "life")], &SynonymTable::new())
        .unwrap();

    let meta = report.metadata_node.unwrap();
    assert_eq!(graph.index_by_name(NameIndex::Source, "ncbi"), vec![meta]);
    let view = graph.node(meta).unwrap();
    assert_eq!(view.kind, NodeKind::SourceMetadata);
    assert_eq!(view.attr("author"), Some("no one"));
    assert_eq!(view.attr("version"), Some("2024-01"));
}

// ============================================================================
// Anomalies
// ============================================================================

#[test]
fn test_dangling_parent_is_reported_not_linked() {
    let mut graph = TaxonGraph::new();
    let report = load(
        &mut graph,
        &[TaxonRecord::child("5", "99", "Foo")],
        &SynonymTable::new(),
    );

    let foo = graph.index_by_name(NameIndex::Accepted, "Foo")[0];
    assert!(graph.edges(foo, EdgeKind::ChildOf, Direction::Outgoing).is_empty());
    assert_eq!(report.dangling_parents, 1);
    assert!(matches!(
        &report.anomalies[0],
        Anomaly::DanglingParentReference { parent_id, .. } if parent_id == "99"
    ));
    assert_eq!(report.roots_linked, 0);
}

#[test]
fn test_self_parent_is_skipped() {
    let mut graph = TaxonGraph::new();
    let report = load(
        &mut graph,
        &[TaxonRecord::child("1", "1", "Loop")],
        &SynonymTable::new(),
    );
    let node = graph.index_by_name(NameIndex::Accepted, "Loop")[0];
    assert_eq!(report.self_parents, 1);
    assert_eq!(graph.edge_count(node), 0);
}

#[test]
fn test_repeated_local_id_creates_one_node() {
    let mut graph = TaxonGraph::new();
    let report = load(
        &mut graph,
        &[TaxonRecord::root("1", "life"), TaxonRecord::root("1", "other")],
        &SynonymTable::new(),
    );
    assert_eq!(report.nodes_created, 1);
    assert_eq!(report.duplicate_local_ids, 1);
    assert!(graph.index_by_name(NameIndex::Accepted, "other").is_empty());
}

// ============================================================================
// Synonyms
// ============================================================================

#[test]
fn test_synonym_attached_to_accepted_taxon() {
    let mut graph = TaxonGraph::new();
    let mut synonyms = SynonymTable::new();
    synonyms.push("1", SynonymEntry::new("Rosa canina", "homotypic"));
    synonyms.push("42", SynonymEntry::new("Nobody", "homotypic"));

    let report = load(&mut graph, &[TaxonRecord::root("1", "Rosa")], &synonyms);

    let rosa = graph.index_by_name(NameIndex::Accepted, "Rosa")[0];
    let syn = graph.index_by_name(NameIndex::Synonym, "Rosa canina");
    assert_eq!(syn.len(), 1);
    assert_eq!(graph.synonym_targets(syn[0]), vec![rosa]);
    assert_eq!(graph.attr(syn[0], "nametype").as_deref(), Some("homotypic"));
    assert_eq!(graph.attr(syn[0], "source").as_deref(), Some("a"));
    // Synonyms never enter the accepted index.
    assert!(graph.index_by_name(NameIndex::Accepted, "Rosa canina").is_empty());
    assert_eq!(report.synonyms_attached, 1);
    assert_eq!(report.synonyms_unmatched, 1);
}

// ============================================================================
// Commit windows
// ============================================================================

#[test]
fn test_small_window_commits_repeatedly() {
    let mut graph = TaxonGraph::new();
    let records: Vec<TaxonRecord> = std::iter::once(TaxonRecord::root("0", "life"))
        .chain((1..10).map(|i| TaxonRecord::child(i.to_string(), "0", format!("t{i}"))))
        .collect();
    let config = LoaderConfig {
        commit_window: 3,
        ..LoaderConfig::default()
    };
    let report = TaxonomyLoader::new(&mut graph, config)
        .load_initial(&SourceDescriptor::named("a"), &records, &SynonymTable::new())
        .unwrap();

    assert!(report.commits >= 6);
    assert_eq!(graph.sequence(), report.commits as u64);
    assert!(!graph.in_batch());
    assert_eq!(report.edges_created, 10);
}

#[test]
fn test_open_batch_is_a_store_error() {
    let mut graph = TaxonGraph::new();
    graph.begin_batch().unwrap();
    let err = TaxonomyLoader::new(&mut graph, LoaderConfig::default())
        .load_initial(
            &SourceDescriptor::named("a"),
            &[TaxonRecord::root("1", "life")],
            &SynonymTable::new(),
        )
        .unwrap_err();
    assert!(matches!(err, LoadError::Store(StoreError::BatchAlreadyOpen)));
}

// ============================================================================
// Properties
// ============================================================================

fn forest_strategy() -> impl Strategy<Value = Vec<TaxonRecord>> {
    prop::collection::vec((any::<prop::sample::Index>(), any::<bool>(), 0usize..6), 1..40).prop_map(
        |shape| {
            let names = ["Rosa", "Bellis", "Aster", "Felis", "Canis", "Pinus"];
            shape.iter()
                .enumerate()
                .map(|(i, (parent, is_root, name))| {
                    let name = names[*name];
                    if i == 0 || *is_root {
                        TaxonRecord::root(i.to_string(), name)
                    } else {
                        TaxonRecord::child(i.to_string(), parent.index(i).to_string(), name)
                    }
                })
                .collect()
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn bulk_load_indexes_every_record(records in forest_strategy(), window in 1usize..8) {
        let mut graph = TaxonGraph::new();
        let config = LoaderConfig { commit_window: window, ..LoaderConfig::default() };
        let report = TaxonomyLoader::new(&mut graph, config)
            .load_initial(&SourceDescriptor::named("p"), &records, &SynonymTable::new())
            .unwrap();

        let roots = records.iter().filter(|r| r.is_root()).count();
        prop_assert_eq!(report.nodes_created, records.len());
        prop_assert_eq!(graph.node_count(), records.len() + 1);
        prop_assert_eq!(metadata_targets(&graph, &report).len(), roots);
        prop_assert_eq!(report.edges_created, records.len());

        // Node ids follow file order after the metadata node.
        for (i, record) in records.iter().enumerate() {
            let node = i as NodeId + 1;
            prop_assert!(graph.index_by_name(NameIndex::Accepted, &record.name).contains(&node));
            let parents = graph.neighbors(node, EdgeKind::ChildOf, Direction::Outgoing);
            prop_assert!(parents.iter().all(|&p| p != node));
        }
    }
}

// ============================================================================
// Files
// ============================================================================

#[test]
fn test_load_files_records_digest_and_synonyms() {
    let dir = tempfile::tempdir().unwrap();
    let taxonomy = dir.path().join("nodes.tsv");
    let synonyms = dir.path().join("synonyms.tsv");
    std::fs::write(&taxonomy, "1\t|\t\t|\tRosa\n").unwrap();
    std::fs::write(&synonyms, "1\t|\tRosa canina\t|\thomotypic\n").unwrap();

    let mut graph = TaxonGraph::new();
    let report = TaxonomyLoader::new(&mut graph, LoaderConfig::default())
        .load_files(
            MergeStrategy::Initial,
            &SourceDescriptor::named("files"),
            &taxonomy,
            Some(&synonyms),
        )
        .unwrap();

    assert_eq!(report.nodes_created, 1);
    assert_eq!(report.synonyms_attached, 1);
    let digest = graph.attr(report.metadata_node.unwrap(), "digest").unwrap();
    assert_eq!(digest, taxograph_ingest::file_digest(&taxonomy).unwrap());
    assert_eq!(digest.len(), 64);
}

#[test]
fn test_missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut graph = TaxonGraph::new();
    let err = TaxonomyLoader::new(&mut graph, LoaderConfig::default())
        .load_files(
            MergeStrategy::Initial,
            &SourceDescriptor::named("files"),
            &dir.path().join("absent.tsv"),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, LoadError::Read(_)));
    assert_eq!(graph.node_count(), 0);
}
