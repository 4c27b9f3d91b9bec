//! Node and edge shapes shared by every load mode.

use taxograph_ingest::{SynonymTable, TaxonRecord};
use taxograph_pathdb::{
    EdgeKind, GraphWriter, NameIndex, NodeId, NodeKind, ATTR_NAME, ATTR_SOURCE,
};

use crate::batch::CommitWindow;
use crate::config::SourceDescriptor;
use crate::error::LoadError;
use crate::report::LoadReport;

pub(crate) const ATTR_AUTHOR: &str = "author";
pub(crate) const ATTR_VERSION: &str = "version";
pub(crate) const ATTR_DIGEST: &str = "digest";
pub(crate) const ATTR_NAMETYPE: &str = "nametype";
pub(crate) const ATTR_CHILD_ID: &str = "childid";
pub(crate) const ATTR_PARENT_ID: &str = "parentid";

/// One SourceMetadataNode, indexed by source name.
pub(crate) fn create_metadata_node<G: GraphWriter + ?Sized>(
    window: &mut CommitWindow<'_, G>,
    source: &SourceDescriptor,
) -> Result<NodeId, LoadError> {
    let mut attrs = vec![
        (ATTR_SOURCE, source.name.as_str()),
        (ATTR_AUTHOR, source.author.as_str()),
    ];
    if let Some(version) = &source.version {
        attrs.push((ATTR_VERSION, version.as_str()));
    }
    if let Some(digest) = &source.digest {
        attrs.push((ATTR_DIGEST, digest.as_str()));
    }

    let graph = window.graph();
    let id = graph.create_node(NodeKind::SourceMetadata, &attrs)?;
    graph.add_to_index(NameIndex::Source, &source.name, id)?;
    window.step()?;
    Ok(id)
}

/// A TaxonNode named after `record` (plus its extra attributes), indexed.
pub(crate) fn create_taxon<G: GraphWriter + ?Sized>(
    window: &mut CommitWindow<'_, G>,
    record: &TaxonRecord,
) -> Result<NodeId, LoadError> {
    let mut attrs: Vec<(&str, &str)> = Vec::with_capacity(record.attrs.len() + 1);
    attrs.push((ATTR_NAME, record.name.as_str()));
    attrs.extend(record.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    let graph = window.graph();
    let id = graph.create_node(NodeKind::Taxon, &attrs)?;
    graph.add_to_index(NameIndex::Accepted, &record.name, id)?;
    Ok(id)
}

/// ChildOfEdge tagged with the source and the source-local ids.
pub(crate) fn link_child<G: GraphWriter + ?Sized>(
    window: &mut CommitWindow<'_, G>,
    source: &str,
    child: NodeId,
    parent: NodeId,
    record: &TaxonRecord,
    report: &mut LoadReport,
) -> Result<(), LoadError> {
    let parent_id = record.parent_id.as_deref().unwrap_or_default();
    window.graph().create_edge(
        child,
        parent,
        EdgeKind::ChildOf,
        &[
            (ATTR_SOURCE, source),
            (ATTR_CHILD_ID, record.local_id.as_str()),
            (ATTR_PARENT_ID, parent_id),
        ],
    )?;
    report.edges_created += 1;
    Ok(())
}

pub(crate) fn link_metadata<G: GraphWriter + ?Sized>(
    window: &mut CommitWindow<'_, G>,
    source: &str,
    metadata: NodeId,
    root: NodeId,
    report: &mut LoadReport,
) -> Result<(), LoadError> {
    window
        .graph()
        .create_edge(metadata, root, EdgeKind::MetadataFor, &[(ATTR_SOURCE, source)])?;
    report.edges_created += 1;
    report.roots_linked += 1;
    Ok(())
}

/// Create a SynonymNode + SynonymOfEdge for every entry whose local id
/// resolves to a node; count the rest as unmatched.
pub(crate) fn attach_synonyms<G, F>(
    window: &mut CommitWindow<'_, G>,
    source: &str,
    synonyms: &SynonymTable,
    mut resolve: F,
    report: &mut LoadReport,
) -> Result<(), LoadError>
where
    G: GraphWriter + ?Sized,
    F: FnMut(&G, &str) -> Option<NodeId>,
{
    for (local_id, entries) in synonyms.iter() {
        let Some(target) = resolve(window.reader(), local_id) else {
            tracing::debug!(source, local_id, entries = entries.len(), "synonyms for unknown id");
            report.synonyms_unmatched += entries.len();
            continue;
        };

        for entry in entries {
            let mut attrs = vec![
                (ATTR_NAME, entry.name.as_str()),
                (ATTR_NAMETYPE, entry.name_type.as_str()),
                (ATTR_SOURCE, source),
            ];
            attrs.extend(entry.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())));

            let graph = window.graph();
            let node = graph.create_node(NodeKind::Synonym, &attrs)?;
            graph.add_to_index(NameIndex::Synonym, &entry.name, node)?;
            graph.create_edge(node, target, EdgeKind::SynonymOf, &[(ATTR_SOURCE, source)])?;
            report.synonyms_attached += 1;
            report.edges_created += 1;
            window.step()?;
        }
    }
    window.flush()
}
