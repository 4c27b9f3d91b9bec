//! Preorder merge: graft a source onto an existing root node.
//!
//! The source tree is walked in preorder carrying the last confidently
//! matched ancestor. A name hit is accepted only when a directed ChildOf
//! path leads from the hit to that ancestor (or to one of the ancestors
//! remembered for it in the confirmation memo), so a homonym in another
//! part of the graph is never mistaken for the source's taxon.

use ahash::AHashMap;

use taxograph_ingest::{SynonymTable, TaxonRecord};
use taxograph_pathdb::{EdgeKind, GraphReader, GraphWriter, NameIndex, NodeId, NodeKind};

use crate::batch::CommitWindow;
use crate::config::{LoaderConfig, SourceDescriptor};
use crate::error::LoadError;
use crate::report::{Anomaly, LoadMode, LoadReport};
use crate::tree::{ChainBreak, SourceTree};
use crate::writes::{attach_synonyms, create_metadata_node, create_taxon, link_child, link_metadata};

/// One pending preorder step.
#[derive(Debug, Clone, Copy)]
struct Frame<'r> {
    record: &'r TaxonRecord,
    last_confident: NodeId,
    attachment: NodeId,
}

/// State owned by one merge call.
#[derive(Debug, Default)]
pub(crate) struct MergeSession<'r> {
    /// match -> the last confident ancestor it was confirmed under
    memo: AHashMap<NodeId, NodeId>,
    /// local id -> node the record was matched to or created as
    resolved: AHashMap<&'r str, NodeId>,
}

impl<'r> MergeSession<'r> {
    /// First hit (ascending id) with a path of at least one hop to the last
    /// confident ancestor or an ancestor reachable through the memo chain.
    pub(crate) fn confirm<G: GraphReader + ?Sized>(
        &self,
        graph: &G,
        hits: &[NodeId],
        last_confident: NodeId,
        attachment: NodeId,
        hop_limit: usize,
    ) -> Option<NodeId> {
        for &hit in hits {
            if hit == attachment {
                continue;
            }
            let mut cursor = Some(last_confident);
            let mut visited: Vec<NodeId> = Vec::new();
            while let Some(cur) = cursor {
                if visited.contains(&cur) {
                    break;
                }
                visited.push(cur);
                if hit != cur
                    && graph
                        .shortest_path(hit, cur, EdgeKind::ChildOf, hop_limit)
                        .is_some()
                {
                    return Some(hit);
                }
                cursor = self.memo.get(&cur).copied();
            }
        }
        None
    }
}

pub(crate) fn merge_onto<G: GraphWriter + ?Sized>(
    graph: &mut G,
    config: &LoaderConfig,
    source: &SourceDescriptor,
    existing_root: NodeId,
    records: &[TaxonRecord],
    synonyms: &SynonymTable,
) -> Result<LoadReport, LoadError> {
    if graph.node_kind(existing_root) != Some(NodeKind::Taxon) {
        return Err(LoadError::UnknownRoot(existing_root));
    }

    let mut report = LoadReport::new(&source.name, LoadMode::Preorder, config.max_recorded_anomalies);
    report.records_read = records.len();
    let tree = SourceTree::build(records, &mut report);
    if tree.roots.is_empty() {
        return Err(LoadError::NoHierarchyRoot {
            source_name: source.name.clone(),
        });
    }

    let mut window = CommitWindow::open(graph, config.preorder_window(), "preorder")?;
    let metadata = create_metadata_node(&mut window, source)?;
    report.metadata_node = Some(metadata);
    link_metadata(&mut window, &source.name, metadata, existing_root, &mut report)?;

    let mut session = MergeSession::default();
    for root in &tree.roots {
        session.resolved.insert(root.local_id.as_str(), existing_root);
        report.nodes_matched += 1;

        let mut stack: Vec<Frame> = tree
            .children_of(&root.local_id)
            .iter()
            .rev()
            .map(|&record| Frame {
                record,
                last_confident: existing_root,
                attachment: existing_root,
            })
            .collect();

        while let Some(frame) = stack.pop() {
            let record = frame.record;
            let hits = window.reader().index_by_name(NameIndex::Accepted, &record.name);
            let matched = if hits.is_empty() {
                let id = create_taxon(&mut window, record)?;
                report.nodes_created += 1;
                id
            } else {
                match session.confirm(
                    window.reader(),
                    &hits,
                    frame.last_confident,
                    frame.attachment,
                    config.path_hop_limit,
                ) {
                    Some(hit) => {
                        tracing::debug!(name = %record.name, node = hit, "confirmed existing taxon");
                        report.nodes_matched += 1;
                        hit
                    }
                    None => {
                        let id = create_taxon(&mut window, record)?;
                        report.nodes_created += 1;
                        report.note(Anomaly::UnconfirmedNameCollision {
                            local_id: record.local_id.clone(),
                            name: record.name.clone(),
                            candidates: hits.len(),
                            created: id,
                        });
                        id
                    }
                }
            };

            session.memo.insert(matched, frame.last_confident);
            session.resolved.insert(record.local_id.as_str(), matched);
            link_child(&mut window, &source.name, matched, frame.attachment, record, &mut report)?;

            for &child in tree.children_of(&record.local_id).iter().rev() {
                stack.push(Frame {
                    record: child,
                    last_confident: matched,
                    attachment: matched,
                });
            }
            window.step()?;
        }
    }
    window.flush()?;

    report_unreached(&tree, &session, &mut report);

    attach_synonyms(
        &mut window,
        &source.name,
        synonyms,
        |_, local_id| session.resolved.get(local_id).copied(),
        &mut report,
    )?;

    report.commits = window.finish()?;
    tracing::info!(
        source = %source.name,
        root = existing_root,
        created = report.nodes_created,
        matched = report.nodes_matched,
        duplicates = report.duplicates_created,
        "preorder merge complete"
    );
    Ok(report)
}

/// Records the walk never reached: self-parents, dangling parents, cycles.
fn report_unreached(tree: &SourceTree<'_>, session: &MergeSession<'_>, report: &mut LoadReport) {
    for record in &tree.records {
        if session.resolved.contains_key(record.local_id.as_str()) {
            continue;
        }
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
        match tree.ancestor_path(record) {
            Err(ChainBreak::Missing(missing)) if missing == parent_id => {
                report.note(Anomaly::DanglingParentReference {
                    local_id: record.local_id.clone(),
                    parent_id: parent_id.to_string(),
                    name: record.name.clone(),
                })
            }
            Err(brk) => report.note(Anomaly::BrokenAncestorChain {
                local_id: record.local_id.clone(),
                name: record.name.clone(),
                missing_id: brk.id().to_string(),
            }),
            Ok(_) => {}
        }
    }
}
