//! Read-only name lookup over a loaded graph.

use serde::Serialize;

use taxograph_pathdb::{GraphReader, NameIndex, NodeId, ATTR_SOURCE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameMatch {
    /// The node that carries the queried name (taxon or synonym).
    pub node: NodeId,
    /// The accepted taxon the name resolves to.
    pub accepted: NodeId,
    pub accepted_name: Option<String>,
    pub is_synonym: bool,
    /// More than one distinct accepted taxon answers to this name.
    pub is_homonym: bool,
    /// Contributing source of a synonym.
    pub source: Option<String>,
}

pub struct NameResolver<'g, G: GraphReader + ?Sized> {
    graph: &'g G,
}

impl<'g, G: GraphReader + ?Sized> NameResolver<'g, G> {
    pub fn new(graph: &'g G) -> Self {
        Self { graph }
    }

    /// Accepted matches first (ascending id), then synonym matches.
    pub fn lookup(&self, name: &str) -> Vec<NameMatch> {
        let mut matches: Vec<NameMatch> = self
            .graph
            .index_by_name(NameIndex::Accepted, name)
            .into_iter()
            .map(|node| NameMatch {
                node,
                accepted: node,
                accepted_name: self.graph.name_of(node),
                is_synonym: false,
                is_homonym: false,
                source: None,
            })
            .collect();

        for synonym in self.graph.index_by_name(NameIndex::Synonym, name) {
            let source = self.graph.attr(synonym, ATTR_SOURCE);
            for accepted in self.graph.synonym_targets(synonym) {
                matches.push(NameMatch {
                    node: synonym,
                    accepted,
                    accepted_name: self.graph.name_of(accepted),
                    is_synonym: true,
                    is_homonym: false,
                    source: source.clone(),
                });
            }
        }

        let mut distinct: Vec<NodeId> = matches.iter().map(|m| m.accepted).collect();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() > 1 {
            for m in &mut matches {
                m.is_homonym = true;
            }
        }
        matches
    }

    pub fn is_accepted(&self, name: &str) -> bool {
        !self.graph.index_by_name(NameIndex::Accepted, name).is_empty()
    }
}
