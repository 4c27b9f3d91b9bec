//! First-time ingestion of a source: one TaxonNode per distinct local id,
//! ChildOfEdges from the source's own parent links, no name matching.

use ahash::AHashMap;

use taxograph_ingest::{SynonymTable, TaxonRecord};
use taxograph_pathdb::{GraphWriter, NodeId};

use crate::batch::CommitWindow;
use crate::config::{LoaderConfig, SourceDescriptor};
use crate::error::LoadError;
use crate::report::{Anomaly, LoadMode, LoadReport};
use crate::writes::{attach_synonyms, create_metadata_node, create_taxon, link_child, link_metadata};

pub(crate) fn load_initial<G: GraphWriter + ?Sized>(
    graph: &mut G,
    config: &LoaderConfig,
    source: &SourceDescriptor,
    records: &[TaxonRecord],
    synonyms: &SynonymTable,
) -> Result<LoadReport, LoadError> {
    let mut report = LoadReport::new(&source.name, LoadMode::Initial, config.max_recorded_anomalies);
    report.records_read = records.len();

    let mut window = CommitWindow::open(graph, config.commit_window, "bulk")?;
    let metadata = create_metadata_node(&mut window, source)?;
    report.metadata_node = Some(metadata);

    // Nodes
    let mut nodes: AHashMap<&str, NodeId> = AHashMap::with_capacity(records.len());
    let mut linked: Vec<(&TaxonRecord, NodeId)> = Vec::new();
    let mut roots: Vec<NodeId> = Vec::new();
    for record in records {
        if nodes.contains_key(record.local_id.as_str()) {
            report.note(Anomaly::DuplicateLocalId {
                local_id: record.local_id.clone(),
                name: record.name.clone(),
            });
            continue;
        }
        let id = create_taxon(&mut window, record)?;
        report.nodes_created += 1;
        nodes.insert(&record.local_id, id);
        if record.is_root() {
            roots.push(id);
        } else {
            linked.push((record, id));
        }
        window.step()?;
    }
    window.flush()?;
    tracing::info!(source = %source.name, nodes = report.nodes_created, "taxon nodes created");

    // Synonyms
    attach_synonyms(
        &mut window,
        &source.name,
        synonyms,
        |_, local_id| nodes.get(local_id).copied(),
        &mut report,
    )?;

    // Parent links
    for (record, child) in linked {
        let parent_id = record.parent_id.as_deref().unwrap_or_default();
        if parent_id == record.local_id {
            report.note(Anomaly::SelfParentReference {
                local_id: record.local_id.clone(),
                name: record.name.clone(),
            });
            continue;
        }
        let Some(&parent) = nodes.get(parent_id) else {
            report.note(Anomaly::DanglingParentReference {
                local_id: record.local_id.clone(),
                parent_id: parent_id.to_string(),
                name: record.name.clone(),
            });
            continue;
        };
        link_child(&mut window, &source.name, child, parent, record, &mut report)?;
        window.step()?;
    }

    for root in roots {
        link_metadata(&mut window, &source.name, metadata, root, &mut report)?;
    }

    report.commits = window.finish()?;
    tracing::info!(
        source = %source.name,
        nodes = report.nodes_created,
        edges = report.edges_created,
        synonyms = report.synonyms_attached,
        anomalies = report.anomaly_count(),
        "initial load complete"
    );
    Ok(report)
}
