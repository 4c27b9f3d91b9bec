//! Path-scoring merge: resolve name collisions by comparing ancestor chains.
//!
//! For a record whose name already exists, each existing candidate is
//! scored by how soon the record's own ancestor names (nearest first) show
//! up among the candidate's graph ancestors. The lowest score wins; ties
//! keep the lower node id. Candidates sharing no ancestor name never win.

use ahash::AHashMap;

use taxograph_ingest::{SynonymTable, TaxonRecord};
use taxograph_pathdb::{EdgeKind, GraphReader, GraphWriter, NameIndex, NodeId};

use crate::batch::CommitWindow;
use crate::config::{LoaderConfig, SourceDescriptor};
use crate::error::LoadError;
use crate::report::{Anomaly, LoadMode, LoadReport};
use crate::tree::SourceTree;
use crate::writes::{attach_synonyms, create_metadata_node, create_taxon, link_child, link_metadata};

/// Sentinel returned by [`steps_to_match`] for disjoint paths.
pub const INFINITE: usize = 100_000_000;

/// `(i, j)`: 1-based position of the first `record_path` name present in
/// `candidate_path`, and the first position in `candidate_path` holding it.
/// `(INFINITE, INFINITE)` when the paths share no name.
pub fn steps_to_match<A: AsRef<str>, B: AsRef<str>>(record_path: &[A], candidate_path: &[B]) -> (usize, usize) {
    for (i, wanted) in record_path.iter().enumerate() {
        if let Some(j) = candidate_path
            .iter()
            .position(|name| name.as_ref() == wanted.as_ref())
        {
            return (i + 1, j + 1);
        }
    }
    (INFINITE, INFINITE)
}

/// Graph ancestors of a candidate (depth-first, edge-creation order),
/// excluding nodes named `queried`.
pub fn candidate_path<G: GraphReader + ?Sized>(graph: &G, hit: NodeId, queried: &str) -> Vec<(NodeId, String)> {
    graph
        .ancestors_depth_first(hit, EdgeKind::ChildOf)
        .into_iter()
        .filter_map(|node| graph.name_of(node).map(|name| (node, name)))
        .filter(|(_, name)| name != queried)
        .collect()
}

/// Lowest finite score among `hits`, ties to the lower id.
fn best_candidate<G: GraphReader + ?Sized>(
    graph: &G,
    hits: &[NodeId],
    record_path: &[&str],
    queried: &str,
) -> Option<(NodeId, Vec<(NodeId, String)>)> {
    let mut best: Option<(usize, NodeId, Vec<(NodeId, String)>)> = None;
    for &hit in hits {
        let path = candidate_path(graph, hit, queried);
        let names: Vec<&str> = path.iter().map(|(_, name)| name.as_str()).collect();
        let (score, _) = steps_to_match(record_path, names.as_slice());
        if score == INFINITE {
            continue;
        }
        if best.as_ref().map_or(true, |(current, _, _)| score < *current) {
            best = Some((score, hit, path));
        }
    }
    best.map(|(_, hit, path)| (hit, path))
}

struct ScoringSession<'r> {
    /// local id -> node resolved in this run
    resolved: AHashMap<&'r str, NodeId>,
}

impl<'r> ScoringSession<'r> {
    fn resolved_live<G: GraphReader + ?Sized>(&self, graph: &G, local_id: &str) -> Option<NodeId> {
        self.resolved
            .get(local_id)
            .copied()
            .filter(|&node| graph.contains_node(node))
    }
}

pub(crate) fn merge_flat<G: GraphWriter + ?Sized>(
    graph: &mut G,
    config: &LoaderConfig,
    source: &SourceDescriptor,
    records: &[TaxonRecord],
    synonyms: &SynonymTable,
) -> Result<LoadReport, LoadError> {
    let mut report = LoadReport::new(&source.name, LoadMode::PathScoring, config.max_recorded_anomalies);
    report.records_read = records.len();
    let tree = SourceTree::build(records, &mut report);

    // Novelty is judged against the index as it was before this merge.
    let novel: Vec<&TaxonRecord> = tree
        .records
        .iter()
        .copied()
        .filter(|r| graph.index_by_name(NameIndex::Accepted, &r.name).is_empty())
        .collect();

    let mut window = CommitWindow::open(graph, config.commit_window, "path-scoring")?;
    let metadata = create_metadata_node(&mut window, source)?;
    report.metadata_node = Some(metadata);

    let mut session = ScoringSession {
        resolved: AHashMap::with_capacity(tree.records.len()),
    };
    for record in novel {
        let id = create_taxon(&mut window, record)?;
        report.nodes_created += 1;
        session.resolved.insert(&record.local_id, id);
        window.step()?;
    }
    window.flush()?;
    tracing::info!(source = %source.name, novel = report.nodes_created, "novel names created");

    for &record in &tree.records {
        let Some(parent_id) = record.parent_id.as_deref() else {
            continue;
        };
        if parent_id == record.local_id {
            report.note(Anomaly::SelfParentReference {
                local_id: record.local_id.clone(),
                name: record.name.clone(),
            });
            continue;
        }

        let path = match tree.ancestor_path(record) {
            Ok(path) => path,
            Err(brk) => {
                report.note(Anomaly::BrokenAncestorChain {
                    local_id: record.local_id.clone(),
                    name: record.name.clone(),
                    missing_id: brk.id().to_string(),
                });
                remove_orphans(&mut window, &record.name, &mut report)?;
                continue;
            }
        };
        // The chain is intact, so the parent record exists.
        let Some(parent) = tree.by_id.get(parent_id).copied() else {
            continue;
        };

        // Own node
        let (own, winning_path) = match session.resolved_live(window.reader(), &record.local_id) {
            Some(node) => (node, Vec::new()),
            None => {
                let hits = window.reader().index_by_name(NameIndex::Accepted, &record.name);
                match best_candidate(window.reader(), &hits, &path, &record.name) {
                    Some((node, candidate)) => {
                        report.nodes_matched += 1;
                        (node, candidate)
                    }
                    None => {
                        let node = create_taxon(&mut window, record)?;
                        report.nodes_created += 1;
                        if !hits.is_empty() {
                            report.note(Anomaly::UnconfirmedNameCollision {
                                local_id: record.local_id.clone(),
                                name: record.name.clone(),
                                candidates: hits.len(),
                                created: node,
                            });
                        }
                        (node, Vec::new())
                    }
                }
            }
        };
        session.resolved.insert(&record.local_id, own);

        // Parent node: the farthest same-named ancestor on the winning path
        let mut parent_node = winning_path
            .iter()
            .rev()
            .find(|(_, name)| *name == parent.name)
            .map(|(node, _)| *node)
            .or_else(|| session.resolved_live(window.reader(), parent_id));

        if parent_node.is_none() {
            let hits = window.reader().index_by_name(NameIndex::Accepted, &parent.name);
            parent_node = if parent.name == config.universal_root_name {
                if hits.len() > 1 {
                    report.note(Anomaly::AmbiguousRootSentinel {
                        name: parent.name.clone(),
                        hits: hits.len(),
                        chosen: hits[0],
                    });
                }
                hits.first().copied()
            } else {
                best_candidate(window.reader(), &hits, &path[1..], &parent.name).map(|(node, _)| node)
            };

            parent_node = match parent_node {
                Some(node) => Some(node),
                None => {
                    let node = create_taxon(&mut window, parent)?;
                    report.nodes_created += 1;
                    report.note(Anomaly::UnconfirmedNameCollision {
                        local_id: parent.local_id.clone(),
                        name: parent.name.clone(),
                        candidates: hits.len(),
                        created: node,
                    });
                    session.resolved.insert(&parent.local_id, node);
                    Some(node)
                }
            };
        }

        let Some(parent_node) = parent_node else {
            continue;
        };
        // A root record is only ever resolved through its children.
        if parent.is_root() {
            session.resolved.entry(&parent.local_id).or_insert(parent_node);
        }
        if parent_node == own {
            tracing::debug!(name = %record.name, node = own, "parent resolved to the record itself; no edge");
        } else {
            link_child(&mut window, &source.name, own, parent_node, record, &mut report)?;
        }
        window.step()?;
    }
    window.flush()?;

    for root in &tree.roots {
        if let Some(node) = session.resolved_live(window.reader(), &root.local_id) {
            link_metadata(&mut window, &source.name, metadata, node, &mut report)?;
        }
    }

    attach_synonyms(
        &mut window,
        &source.name,
        synonyms,
        |graph, local_id| session.resolved_live(graph, local_id),
        &mut report,
    )?;

    report.commits = window.finish()?;
    tracing::info!(
        source = %source.name,
        created = report.nodes_created,
        matched = report.nodes_matched,
        duplicates = report.duplicates_created,
        broken = report.broken_chains,
        orphans = report.orphans_removed,
        "path-scoring merge complete"
    );
    Ok(report)
}

/// Delete every accepted node under `name` that has no edges at all.
fn remove_orphans<G: GraphWriter + ?Sized>(
    window: &mut CommitWindow<'_, G>,
    name: &str,
    report: &mut LoadReport,
) -> Result<(), LoadError> {
    let hits = window.reader().index_by_name(NameIndex::Accepted, name);
    for hit in hits {
        if window.reader().edge_count(hit) == 0 {
            window.graph().delete_node(hit)?;
            report.orphans_removed += 1;
            tracing::debug!(name, node = hit, "removed orphan node");
        }
    }
    Ok(())
}
