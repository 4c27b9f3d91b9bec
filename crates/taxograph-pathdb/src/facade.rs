//! Graph Write Facade
//!
//! The loader never talks to a concrete store. Everything it needs from the
//! graph is expressed by two traits:
//!
//! - [`GraphReader`]: the read-only surface (node/edge views, name-index
//!   lookups, traversal by direction, bounded path search). This is also the
//!   surface exposed to downstream consumers (export, name resolution).
//! - [`GraphWriter`]: node/edge creation, index inserts, orphan deletion and
//!   commit batches.
//!
//! Mutations are only accepted inside an open batch. A batch is made durable
//! by `commit_batch` and discarded by `abort_batch`; reads always observe the
//! batch's own uncommitted writes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::search;

/// Node identity (dense, assigned in creation order).
pub type NodeId = u32;

/// Edge identity (dense, assigned in creation order).
pub type EdgeId = u32;

/// Attribute holding a node's name (taxon, synonym).
pub const ATTR_NAME: &str = "name";
/// Attribute holding the contributing source name.
pub const ATTR_SOURCE: &str = "source";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Taxon,
    Synonym,
    SourceMetadata,
}

impl NodeKind {
    pub const ALL: [NodeKind; 3] = [NodeKind::Taxon, NodeKind::Synonym, NodeKind::SourceMetadata];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Taxon => "taxon",
            NodeKind::Synonym => "synonym",
            NodeKind::SourceMetadata => "source_metadata",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeKind {
    /// child -> parent, tagged with the classifying source
    ChildOf,
    /// synonym -> accepted taxon
    SynonymOf,
    /// source metadata -> root taxon
    MetadataFor,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 3] = [EdgeKind::ChildOf, EdgeKind::SynonymOf, EdgeKind::MetadataFor];

    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::ChildOf => "taxchildof",
            EdgeKind::SynonymOf => "synonymof",
            EdgeKind::MetadataFor => "metadatafor",
        }
    }
}

/// The three name indexes. Accepted names and synonyms are never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NameIndex {
    Accepted,
    Synonym,
    Source,
}

impl NameIndex {
    pub const ALL: [NameIndex; 3] = [NameIndex::Accepted, NameIndex::Synonym, NameIndex::Source];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Edges leaving the node (for `ChildOf`: towards the parent).
    Outgoing,
    /// Edges arriving at the node (for `ChildOf`: from the children).
    Incoming,
}

/// Resolved, owned view of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeView {
    pub id: NodeId,
    pub kind: NodeKind,
    pub attrs: BTreeMap<String, String>,
}

impl NodeView {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.attr(ATTR_NAME)
    }
}

/// Resolved, owned view of an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeView {
    pub id: EdgeId,
    pub kind: EdgeKind,
    pub from: NodeId,
    pub to: NodeId,
    pub attrs: BTreeMap<String, String>,
}

impl EdgeView {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }
}

/// Outcome of a successful `commit_batch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitSummary {
    /// Sequence number of this commit (1-based, monotonically increasing).
    pub sequence: u64,
    /// Number of mutations made durable.
    pub mutations: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("no batch is open")]
    NoOpenBatch,
    #[error("a batch is already open")]
    BatchAlreadyOpen,
    #[error("node {node} still has {edges} edge(s) and cannot be deleted")]
    NodeHasEdges { node: NodeId, edges: usize },
    #[error("replayed mutation does not line up with the store: {0}")]
    Replay(String),
    #[error("commit log failure: {0}")]
    CommitLog(String),
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

/// Read-only access to the taxonomy graph.
pub trait GraphReader {
    /// Kind of a live node.
    fn node_kind(&self, id: NodeId) -> Option<NodeKind>;

    /// Single attribute of a live node.
    fn attr(&self, id: NodeId, key: &str) -> Option<String>;

    /// Full view of a live node.
    fn node(&self, id: NodeId) -> Option<NodeView>;

    /// Name-index lookup. Hits are returned in ascending node-id order.
    fn index_by_name(&self, index: NameIndex, name: &str) -> Vec<NodeId>;

    /// Edges of `kind` touching `node` in the given direction, in creation order.
    fn edges(&self, node: NodeId, kind: EdgeKind, dir: Direction) -> Vec<EdgeView>;

    /// Far endpoints of [`GraphReader::edges`], in creation order.
    fn neighbors(&self, node: NodeId, kind: EdgeKind, dir: Direction) -> Vec<NodeId>;

    /// Number of edges of any kind, in either direction.
    fn edge_count(&self, node: NodeId) -> usize;

    /// Number of live nodes.
    fn node_count(&self) -> usize;

    /// Number of edges.
    fn edge_total(&self) -> usize;

    fn contains_node(&self, id: NodeId) -> bool {
        self.node_kind(id).is_some()
    }

    fn name_of(&self, id: NodeId) -> Option<String> {
        self.attr(id, ATTR_NAME)
    }

    /// Shortest directed path `from -> to` over `kind` edges (outgoing
    /// direction) with at most `max_hops` edges. `None` when no such path
    /// exists within the bound.
    fn shortest_path(
        &self,
        from: NodeId,
        to: NodeId,
        kind: EdgeKind,
        max_hops: usize,
    ) -> Option<Vec<NodeId>> {
        search::shortest_path(self, from, to, kind, max_hops)
    }

    /// Every node reachable from `start` over outgoing `kind` edges, in
    /// depth-first preorder (start first, edge-creation order).
    fn ancestors_depth_first(&self, start: NodeId, kind: EdgeKind) -> Vec<NodeId> {
        search::depth_first(self, start, kind)
    }

    /// Accepted taxa a synonym node points at.
    fn synonym_targets(&self, synonym: NodeId) -> Vec<NodeId> {
        self.neighbors(synonym, EdgeKind::SynonymOf, Direction::Outgoing)
    }
}

/// Mutating access to the taxonomy graph.
pub trait GraphWriter: GraphReader {
    fn begin_batch(&mut self) -> Result<(), StoreError>;

    fn commit_batch(&mut self) -> Result<CommitSummary, StoreError>;

    fn abort_batch(&mut self) -> Result<(), StoreError>;

    fn in_batch(&self) -> bool;

    fn create_node(&mut self, kind: NodeKind, attrs: &[(&str, &str)]) -> Result<NodeId, StoreError>;

    fn create_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        kind: EdgeKind,
        attrs: &[(&str, &str)],
    ) -> Result<EdgeId, StoreError>;

    fn add_to_index(&mut self, index: NameIndex, name: &str, node: NodeId) -> Result<(), StoreError>;

    /// Delete a node that has no edges, removing it from every name index.
    fn delete_node(&mut self, node: NodeId) -> Result<(), StoreError>;
}
