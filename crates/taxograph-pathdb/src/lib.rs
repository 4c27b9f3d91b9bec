//! Taxograph PathDB: in-memory taxonomy graph store
//!
//! The store behind the Graph Write Facade ([`GraphReader`] / [`GraphWriter`]).
//!
//! Layout:
//! 1. **String Interning**: names and attribute keys/values are stored once,
//!    referenced by `StrId`
//! 2. **Columnar Nodes**: kind column + one attribute column per key
//! 3. **Indexed Edges**: forward/backward adjacency keyed by `(node, kind)`
//! 4. **Name Indexes**: `name -> RoaringBitmap` per index (accepted names,
//!    synonyms, sources); bitmap iteration gives ascending node ids, the total
//!    order every first-found tie break relies on
//! 5. **Commit Batches**: mutations are journaled per batch, committed to a
//!    [`CommitLog`] or undone on abort
//!
//! Snapshots use a `TXPD` magic + version header followed by bincode payloads.

pub mod facade;
pub mod journal;
pub mod search;

use dashmap::DashMap;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};

pub use facade::{
    CommitSummary, Direction, EdgeId, EdgeKind, EdgeView, GraphReader, GraphWriter, NameIndex,
    NodeId, NodeKind, NodeView, StoreError, ATTR_NAME, ATTR_SOURCE,
};
pub use journal::{CommitLog, MemoryCommitLog, Mutation, NullCommitLog};

const SNAPSHOT_MAGIC: &[u8; 4] = b"TXPD";
const SNAPSHOT_VERSION: u32 = 1;

// ============================================================================
// String Interning (Compact String Storage)
// ============================================================================

/// Interned string ID (4 bytes instead of 24+ for String)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct StrId(u32);

impl StrId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// String interner: maps strings to compact IDs
pub struct StringInterner {
    str_to_id: DashMap<String, StrId>,
    id_to_str: DashMap<StrId, String>,
    next_id: AtomicU32,
}

impl StringInterner {
    pub fn new() -> Self {
        Self {
            str_to_id: DashMap::new(),
            id_to_str: DashMap::new(),
            next_id: AtomicU32::new(0),
        }
    }

    /// Intern a string, returning its ID
    pub fn intern(&self, s: &str) -> StrId {
        if let Some(id) = self.str_to_id.get(s) {
            return *id;
        }

        let id = StrId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.str_to_id.insert(s.to_string(), id);
        self.id_to_str.insert(id, s.to_string());
        id
    }

    /// Look up an existing ID for a string without inserting.
    pub fn id_of(&self, s: &str) -> Option<StrId> {
        self.str_to_id.get(s).map(|id| *id)
    }

    /// Look up string by ID
    pub fn lookup(&self, id: StrId) -> Option<String> {
        self.id_to_str.get(&id).map(|s| s.clone())
    }

    pub fn len(&self) -> usize {
        self.next_id.load(Ordering::SeqCst) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        let strings: Vec<String> = (0..self.next_id.load(Ordering::SeqCst))
            .filter_map(|i| self.id_to_str.get(&StrId(i)).map(|s| s.clone()))
            .collect();
        bincode::serialize(&strings)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        let strings: Vec<String> = bincode::deserialize(bytes)?;
        let interner = Self::new();
        for s in strings {
            interner.intern(&s);
        }
        Ok(interner)
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Node Storage (Columnar)
// ============================================================================

/// Columnar node storage. Ids are dense; deleted ids are tombstoned.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NodeStore {
    /// Kind column: node_id -> kind
    kinds: Vec<NodeKind>,
    /// Attribute columns: attr_name -> (node_id -> value)
    attrs: HashMap<StrId, HashMap<u32, StrId>>,
    /// Kind index: kind -> bitmap of live node IDs
    kind_index: HashMap<NodeKind, RoaringBitmap>,
    /// Tombstones left by orphan cleanup
    deleted: RoaringBitmap,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ids ever allocated (including tombstoned ones).
    pub fn allocated(&self) -> usize {
        self.kinds.len()
    }

    pub fn live_count(&self) -> usize {
        self.kinds.len() - self.deleted.len() as usize
    }

    pub fn is_live(&self, id: u32) -> bool {
        (id as usize) < self.kinds.len() && !self.deleted.contains(id)
    }

    pub fn add(&mut self, kind: NodeKind, attrs: Vec<(StrId, StrId)>) -> u32 {
        let id = self.kinds.len() as u32;
        self.kinds.push(kind);
        self.kind_index.entry(kind).or_default().insert(id);
        for (attr_name, attr_value) in attrs {
            self.attrs.entry(attr_name).or_default().insert(id, attr_value);
        }
        id
    }

    pub fn get_kind(&self, id: u32) -> Option<NodeKind> {
        if !self.is_live(id) {
            return None;
        }
        self.kinds.get(id as usize).copied()
    }

    pub fn get_attr(&self, id: u32, attr_name: StrId) -> Option<StrId> {
        if !self.is_live(id) {
            return None;
        }
        self.attrs.get(&attr_name)?.get(&id).copied()
    }

    pub fn attrs_of(&self, id: u32) -> Vec<(StrId, StrId)> {
        self.attrs
            .iter()
            .filter_map(|(name, col)| col.get(&id).map(|value| (*name, *value)))
            .collect()
    }

    /// Live nodes of a kind.
    pub fn by_kind(&self, kind: NodeKind) -> Option<&RoaringBitmap> {
        self.kind_index.get(&kind)
    }

    fn mark_deleted(&mut self, id: u32) {
        self.deleted.insert(id);
        if let Some(kind) = self.kinds.get(id as usize) {
            if let Some(bm) = self.kind_index.get_mut(kind) {
                bm.remove(id);
            }
        }
    }

    fn unmark_deleted(&mut self, id: u32) {
        if self.deleted.remove(id) {
            if let Some(kind) = self.kinds.get(id as usize).copied() {
                self.kind_index.entry(kind).or_default().insert(id);
            }
        }
    }

    /// Drop the most recently allocated node (batch rollback).
    fn remove_last(&mut self, id: u32) -> bool {
        if id as usize + 1 != self.kinds.len() {
            return false;
        }
        if let Some(kind) = self.kinds.pop() {
            if let Some(bm) = self.kind_index.get_mut(&kind) {
                bm.remove(id);
            }
        }
        for col in self.attrs.values_mut() {
            col.remove(&id);
        }
        self.deleted.remove(id);
        true
    }
}

// ============================================================================
// Edge Storage (Edge-List with Indexes)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub kind: EdgeKind,
    pub from: u32,
    pub to: u32,
    pub attrs: Vec<(StrId, StrId)>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EdgeStore {
    relations: Vec<Relation>,
    /// Forward index: (from, kind) -> relation IDs
    forward_index: HashMap<(u32, EdgeKind), Vec<u32>>,
    /// Backward index: (to, kind) -> relation IDs
    backward_index: HashMap<(u32, EdgeKind), Vec<u32>>,
}

impl EdgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    pub fn add(&mut self, rel: Relation) -> u32 {
        let id = self.relations.len() as u32;
        self.forward_index
            .entry((rel.from, rel.kind))
            .or_default()
            .push(id);
        self.backward_index
            .entry((rel.to, rel.kind))
            .or_default()
            .push(id);
        self.relations.push(rel);
        id
    }

    pub fn get(&self, id: u32) -> Option<&Relation> {
        self.relations.get(id as usize)
    }

    pub fn ids(&self, node: u32, kind: EdgeKind, dir: Direction) -> &[u32] {
        let index = match dir {
            Direction::Outgoing => &self.forward_index,
            Direction::Incoming => &self.backward_index,
        };
        index
            .get(&(node, kind))
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn degree(&self, node: u32) -> usize {
        EdgeKind::ALL
            .iter()
            .map(|&kind| {
                self.ids(node, kind, Direction::Outgoing).len()
                    + self.ids(node, kind, Direction::Incoming).len()
            })
            .sum()
    }

    /// Drop the most recently created relation (batch rollback).
    fn remove_last(&mut self, id: u32) -> bool {
        if id as usize + 1 != self.relations.len() {
            return false;
        }
        let Some(rel) = self.relations.pop() else {
            return false;
        };
        for (index, key) in [
            (&mut self.forward_index, (rel.from, rel.kind)),
            (&mut self.backward_index, (rel.to, rel.kind)),
        ] {
            if let Some(ids) = index.get_mut(&key) {
                if ids.last() == Some(&id) {
                    ids.pop();
                }
                if ids.is_empty() {
                    index.remove(&key);
                }
            }
        }
        true
    }
}

// ============================================================================
// Name Indexes
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NameIndexes {
    entries: HashMap<NameIndex, HashMap<StrId, RoaringBitmap>>,
    /// Reverse map so deletion can unindex a node without scanning.
    indexed_under: HashMap<u32, Vec<(NameIndex, StrId)>>,
}

impl NameIndexes {
    fn insert(&mut self, index: NameIndex, name: StrId, node: u32) -> bool {
        let inserted = self
            .entries
            .entry(index)
            .or_default()
            .entry(name)
            .or_default()
            .insert(node);
        if inserted {
            self.indexed_under
                .entry(node)
                .or_default()
                .push((index, name));
        }
        inserted
    }

    fn remove(&mut self, index: NameIndex, name: StrId, node: u32) -> bool {
        let Some(by_name) = self.entries.get_mut(&index) else {
            return false;
        };
        let Some(bm) = by_name.get_mut(&name) else {
            return false;
        };
        let removed = bm.remove(node);
        if bm.is_empty() {
            by_name.remove(&name);
        }
        if removed {
            if let Some(list) = self.indexed_under.get_mut(&node) {
                list.retain(|entry| *entry != (index, name));
                if list.is_empty() {
                    self.indexed_under.remove(&node);
                }
            }
        }
        removed
    }

    fn lookup(&self, index: NameIndex, name: StrId) -> Vec<u32> {
        self.entries
            .get(&index)
            .and_then(|by_name| by_name.get(&name))
            .map(|bm| bm.iter().collect())
            .unwrap_or_default()
    }

    fn entries_for(&self, node: u32) -> Vec<(NameIndex, StrId)> {
        self.indexed_under.get(&node).cloned().unwrap_or_default()
    }

    /// Number of distinct names held by an index.
    pub fn distinct_names(&self, index: NameIndex) -> usize {
        self.entries.get(&index).map(|m| m.len()).unwrap_or(0)
    }
}

// ============================================================================
// TaxonGraph: The Complete Store
// ============================================================================

pub struct TaxonGraph {
    interner: StringInterner,
    nodes: NodeStore,
    edges: EdgeStore,
    names: NameIndexes,
    /// Journal of the open batch, if any.
    batch: Option<Vec<Mutation>>,
    /// Sequence number of the last committed batch.
    sequence: u64,
}

impl TaxonGraph {
    pub fn new() -> Self {
        Self {
            interner: StringInterner::new(),
            nodes: NodeStore::new(),
            edges: EdgeStore::new(),
            names: NameIndexes::default(),
            batch: None,
            sequence: 0,
        }
    }

    /// Sequence number of the last committed batch (0 when nothing committed).
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> RoaringBitmap {
        self.nodes.by_kind(kind).cloned().unwrap_or_default()
    }

    pub fn distinct_names(&self, index: NameIndex) -> usize {
        self.names.distinct_names(index)
    }

    /// Commit the open batch into `log`. When the log rejects the batch it
    /// stays open, so the caller can still abort it.
    pub fn commit_batch_into(&mut self, log: &mut dyn CommitLog) -> Result<CommitSummary, StoreError> {
        let Some(mutations) = self.batch.as_ref() else {
            return Err(StoreError::NoOpenBatch);
        };
        if mutations.is_empty() {
            self.batch = None;
            return Ok(CommitSummary {
                sequence: self.sequence,
                mutations: 0,
            });
        }

        let sequence = self.sequence + 1;
        log.append(sequence, mutations)?;
        let count = mutations.len();
        self.batch = None;
        self.sequence = sequence;
        Ok(CommitSummary {
            sequence,
            mutations: count,
        })
    }

    /// Re-apply a committed batch (WAL replay). Ids must line up exactly.
    pub fn apply_committed(&mut self, sequence: u64, mutations: &[Mutation]) -> Result<(), StoreError> {
        if self.batch.is_some() {
            return Err(StoreError::BatchAlreadyOpen);
        }
        if sequence <= self.sequence {
            return Err(StoreError::Replay(format!(
                "batch {sequence} is not newer than store sequence {}",
                self.sequence
            )));
        }
        for m in mutations {
            self.replay_one(m)?;
        }
        self.sequence = sequence;
        Ok(())
    }

    fn replay_one(&mut self, m: &Mutation) -> Result<(), StoreError> {
        match m {
            Mutation::CreateNode { id, kind, attrs } => {
                if *id as usize != self.nodes.allocated() {
                    return Err(StoreError::Replay(format!(
                        "expected node id {}, log has {id}",
                        self.nodes.allocated()
                    )));
                }
                let interned = self.intern_attrs(attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
                self.nodes.add(*kind, interned);
            }
            Mutation::CreateEdge {
                id,
                kind,
                from,
                to,
                attrs,
            } => {
                if *id as usize != self.edges.len() {
                    return Err(StoreError::Replay(format!(
                        "expected edge id {}, log has {id}",
                        self.edges.len()
                    )));
                }
                self.require_live(*from)?;
                self.require_live(*to)?;
                let interned = self.intern_attrs(attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
                self.edges.add(Relation {
                    kind: *kind,
                    from: *from,
                    to: *to,
                    attrs: interned,
                });
            }
            Mutation::IndexName { index, name, node } => {
                self.require_live(*node)?;
                let name_id = self.interner.intern(name);
                self.names.insert(*index, name_id, *node);
            }
            Mutation::DeleteNode { id, .. } => {
                self.require_live(*id)?;
                for (index, name) in self.names.entries_for(*id) {
                    self.names.remove(index, name, *id);
                }
                self.nodes.mark_deleted(*id);
            }
        }
        Ok(())
    }

    fn undo(&mut self, m: &Mutation) -> Result<(), StoreError> {
        let ok = match m {
            Mutation::CreateNode { id, .. } => self.nodes.remove_last(*id),
            Mutation::CreateEdge { id, .. } => self.edges.remove_last(*id),
            Mutation::IndexName { index, name, node } => match self.interner.id_of(name) {
                Some(name_id) => self.names.remove(*index, name_id, *node),
                None => false,
            },
            Mutation::DeleteNode { id, unindexed } => {
                self.nodes.unmark_deleted(*id);
                for (index, name) in unindexed {
                    let name_id = self.interner.intern(name);
                    self.names.insert(*index, name_id, *id);
                }
                true
            }
        };
        if ok {
            Ok(())
        } else {
            Err(StoreError::Replay(format!("rollback could not undo {m:?}")))
        }
    }

    fn intern_attrs<'a>(&self, attrs: impl Iterator<Item = (&'a str, &'a str)>) -> Vec<(StrId, StrId)> {
        attrs
            .map(|(k, v)| (self.interner.intern(k), self.interner.intern(v)))
            .collect()
    }

    fn require_batch(&self) -> Result<(), StoreError> {
        if self.batch.is_none() {
            return Err(StoreError::NoOpenBatch);
        }
        Ok(())
    }

    fn require_live(&self, id: NodeId) -> Result<(), StoreError> {
        if !self.nodes.is_live(id) {
            return Err(StoreError::UnknownNode(id));
        }
        Ok(())
    }

    fn record(&mut self, m: Mutation) {
        if let Some(journal) = self.batch.as_mut() {
            journal.push(m);
        }
    }

    fn resolve_attrs(&self, attrs: impl IntoIterator<Item = (StrId, StrId)>) -> BTreeMap<String, String> {
        attrs
            .into_iter()
            .filter_map(|(k, v)| Some((self.interner.lookup(k)?, self.interner.lookup(v)?)))
            .collect()
    }

    fn edge_view(&self, id: u32) -> Option<EdgeView> {
        let rel = self.edges.get(id)?;
        Some(EdgeView {
            id,
            kind: rel.kind,
            from: rel.from,
            to: rel.to,
            attrs: self.resolve_attrs(rel.attrs.iter().copied()),
        })
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        if self.batch.is_some() {
            return Err(StoreError::Snapshot(
                "cannot snapshot while a batch is open".to_string(),
            ));
        }
        let interner_bytes = self
            .interner
            .to_bytes()
            .map_err(|e| StoreError::Snapshot(e.to_string()))?;
        let db_bytes = bincode::serialize(&(&self.nodes, &self.edges, &self.names, self.sequence))
            .map_err(|e| StoreError::Snapshot(e.to_string()))?;

        let mut result = Vec::with_capacity(24 + interner_bytes.len() + db_bytes.len());
        result.extend_from_slice(SNAPSHOT_MAGIC);
        result.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());

        result.extend_from_slice(&(interner_bytes.len() as u64).to_le_bytes());
        result.extend_from_slice(&interner_bytes);

        result.extend_from_slice(&(db_bytes.len() as u64).to_le_bytes());
        result.extend_from_slice(&db_bytes);

        Ok(result)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        if bytes.len() < 8 || &bytes[0..4] != SNAPSHOT_MAGIC {
            return Err(StoreError::Snapshot("not a taxograph snapshot".to_string()));
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != SNAPSHOT_VERSION {
            return Err(StoreError::Snapshot(format!(
                "unsupported snapshot version {version}"
            )));
        }

        let mut offset = 8;
        let interner_bytes = read_section(bytes, &mut offset)?;
        let interner = StringInterner::from_bytes(interner_bytes)
            .map_err(|e| StoreError::Snapshot(e.to_string()))?;
        let db_bytes = read_section(bytes, &mut offset)?;
        let (nodes, edges, names, sequence): (NodeStore, EdgeStore, NameIndexes, u64) =
            bincode::deserialize(db_bytes).map_err(|e| StoreError::Snapshot(e.to_string()))?;

        Ok(Self {
            interner,
            nodes,
            edges,
            names,
            batch: None,
            sequence,
        })
    }
}

fn read_section<'a>(bytes: &'a [u8], offset: &mut usize) -> Result<&'a [u8], StoreError> {
    let truncated = || StoreError::Snapshot("truncated snapshot".to_string());
    let len_end = offset.checked_add(8).ok_or_else(truncated)?;
    let len_bytes: [u8; 8] = bytes
        .get(*offset..len_end)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(truncated)?;
    let len = u64::from_le_bytes(len_bytes) as usize;
    let end = len_end.checked_add(len).ok_or_else(truncated)?;
    let section = bytes.get(len_end..end).ok_or_else(truncated)?;
    *offset = end;
    Ok(section)
}

impl Default for TaxonGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphReader for TaxonGraph {
    fn node_kind(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes.get_kind(id)
    }

    fn attr(&self, id: NodeId, key: &str) -> Option<String> {
        let key_id = self.interner.id_of(key)?;
        let value_id = self.nodes.get_attr(id, key_id)?;
        self.interner.lookup(value_id)
    }

    fn node(&self, id: NodeId) -> Option<NodeView> {
        let kind = self.nodes.get_kind(id)?;
        Some(NodeView {
            id,
            kind,
            attrs: self.resolve_attrs(self.nodes.attrs_of(id)),
        })
    }

    fn index_by_name(&self, index: NameIndex, name: &str) -> Vec<NodeId> {
        match self.interner.id_of(name) {
            Some(name_id) => self.names.lookup(index, name_id),
            None => Vec::new(),
        }
    }

    fn edges(&self, node: NodeId, kind: EdgeKind, dir: Direction) -> Vec<EdgeView> {
        self.edges
            .ids(node, kind, dir)
            .iter()
            .filter_map(|&id| self.edge_view(id))
            .collect()
    }

    fn neighbors(&self, node: NodeId, kind: EdgeKind, dir: Direction) -> Vec<NodeId> {
        self.edges
            .ids(node, kind, dir)
            .iter()
            .filter_map(|&id| self.edges.get(id))
            .map(|rel| match dir {
                Direction::Outgoing => rel.to,
                Direction::Incoming => rel.from,
            })
            .collect()
    }

    fn edge_count(&self, node: NodeId) -> usize {
        self.edges.degree(node)
    }

    fn node_count(&self) -> usize {
        self.nodes.live_count()
    }

    fn edge_total(&self) -> usize {
        self.edges.len()
    }
}

impl GraphWriter for TaxonGraph {
    fn begin_batch(&mut self) -> Result<(), StoreError> {
        if self.batch.is_some() {
            return Err(StoreError::BatchAlreadyOpen);
        }
        self.batch = Some(Vec::new());
        Ok(())
    }

    fn commit_batch(&mut self) -> Result<CommitSummary, StoreError> {
        self.commit_batch_into(&mut NullCommitLog)
    }

    fn abort_batch(&mut self) -> Result<(), StoreError> {
        let Some(journal) = self.batch.take() else {
            return Err(StoreError::NoOpenBatch);
        };
        for m in journal.iter().rev() {
            self.undo(m)?;
        }
        Ok(())
    }

    fn in_batch(&self) -> bool {
        self.batch.is_some()
    }

    fn create_node(&mut self, kind: NodeKind, attrs: &[(&str, &str)]) -> Result<NodeId, StoreError> {
        self.require_batch()?;
        let interned = self.intern_attrs(attrs.iter().copied());
        let id = self.nodes.add(kind, interned);
        self.record(Mutation::CreateNode {
            id,
            kind,
            attrs: owned(attrs),
        });
        Ok(id)
    }

    fn create_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        kind: EdgeKind,
        attrs: &[(&str, &str)],
    ) -> Result<EdgeId, StoreError> {
        self.require_batch()?;
        self.require_live(from)?;
        self.require_live(to)?;
        let interned = self.intern_attrs(attrs.iter().copied());
        let id = self.edges.add(Relation {
            kind,
            from,
            to,
            attrs: interned,
        });
        self.record(Mutation::CreateEdge {
            id,
            kind,
            from,
            to,
            attrs: owned(attrs),
        });
        Ok(id)
    }

    fn add_to_index(&mut self, index: NameIndex, name: &str, node: NodeId) -> Result<(), StoreError> {
        self.require_batch()?;
        self.require_live(node)?;
        let name_id = self.interner.intern(name);
        if self.names.insert(index, name_id, node) {
            self.record(Mutation::IndexName {
                index,
                name: name.to_string(),
                node,
            });
        }
        Ok(())
    }

    fn delete_node(&mut self, node: NodeId) -> Result<(), StoreError> {
        self.require_batch()?;
        self.require_live(node)?;
        let edges = self.edges.degree(node);
        if edges > 0 {
            return Err(StoreError::NodeHasEdges { node, edges });
        }

        let mut unindexed = Vec::new();
        for (index, name_id) in self.names.entries_for(node) {
            self.names.remove(index, name_id, node);
            if let Some(name) = self.interner.lookup(name_id) {
                unindexed.push((index, name));
            }
        }
        self.nodes.mark_deleted(node);
        self.record(Mutation::DeleteNode {
            id: node,
            unindexed,
        });
        Ok(())
    }
}

fn owned(attrs: &[(&str, &str)]) -> Vec<(String, String)> {
    attrs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taxon(db: &mut TaxonGraph, name: &str) -> NodeId {
        let id = db.create_node(NodeKind::Taxon, &[(ATTR_NAME, name)]).unwrap();
        db.add_to_index(NameIndex::Accepted, name, id).unwrap();
        id
    }

    #[test]
    fn test_mutation_requires_open_batch() {
        let mut db = TaxonGraph::new();
        let err = db.create_node(NodeKind::Taxon, &[(ATTR_NAME, "Rosa")]);
        assert!(matches!(err, Err(StoreError::NoOpenBatch)));
        assert!(matches!(db.commit_batch(), Err(StoreError::NoOpenBatch)));
    }

    #[test]
    fn test_abort_restores_previous_state() {
        let mut db = TaxonGraph::new();
        db.begin_batch().unwrap();
        let plantae = taxon(&mut db, "Plantae");
        db.commit_batch().unwrap();

        db.begin_batch().unwrap();
        let rosa = taxon(&mut db, "Rosa");
        db.create_edge(rosa, plantae, EdgeKind::ChildOf, &[(ATTR_SOURCE, "a")])
            .unwrap();
        db.abort_batch().unwrap();

        assert_eq!(db.node_count(), 1);
        assert_eq!(db.edge_total(), 0);
        assert!(db.index_by_name(NameIndex::Accepted, "Rosa").is_empty());
        assert_eq!(db.edge_count(plantae), 0);

        // Ids are reused after a rollback.
        db.begin_batch().unwrap();
        let again = taxon(&mut db, "Rosa");
        db.commit_batch().unwrap();
        assert_eq!(again, rosa);
    }

    #[test]
    fn test_index_hits_are_ascending() {
        let mut db = TaxonGraph::new();
        db.begin_batch().unwrap();
        let a = taxon(&mut db, "Aster");
        let _other = taxon(&mut db, "Bellis");
        let b = taxon(&mut db, "Aster");
        db.commit_batch().unwrap();

        assert_eq!(db.index_by_name(NameIndex::Accepted, "Aster"), vec![a, b]);
        assert!(db.index_by_name(NameIndex::Synonym, "Aster").is_empty());
    }

    #[test]
    fn test_delete_refuses_connected_nodes() {
        let mut db = TaxonGraph::new();
        db.begin_batch().unwrap();
        let a = taxon(&mut db, "A");
        let b = taxon(&mut db, "B");
        let orphan = taxon(&mut db, "C");
        db.create_edge(b, a, EdgeKind::ChildOf, &[]).unwrap();

        assert!(matches!(
            db.delete_node(a),
            Err(StoreError::NodeHasEdges { edges: 1, .. })
        ));
        db.delete_node(orphan).unwrap();
        db.commit_batch().unwrap();

        assert!(!db.contains_node(orphan));
        assert!(db.index_by_name(NameIndex::Accepted, "C").is_empty());
        assert_eq!(db.node_count(), 2);
    }

    #[test]
    fn test_abort_undoes_deletion() {
        let mut db = TaxonGraph::new();
        db.begin_batch().unwrap();
        let orphan = taxon(&mut db, "C");
        db.commit_batch().unwrap();

        db.begin_batch().unwrap();
        db.delete_node(orphan).unwrap();
        db.abort_batch().unwrap();

        assert!(db.contains_node(orphan));
        assert_eq!(db.index_by_name(NameIndex::Accepted, "C"), vec![orphan]);
    }

    #[test]
    fn test_commit_log_receives_journal() {
        let mut db = TaxonGraph::new();
        let mut log = MemoryCommitLog::default();
        db.begin_batch().unwrap();
        taxon(&mut db, "Rosa");
        let summary = db.commit_batch_into(&mut log).unwrap();

        assert_eq!(summary.sequence, 1);
        assert_eq!(summary.mutations, 2);
        assert_eq!(log.frames.len(), 1);
        assert!(matches!(log.frames[0].1[0], Mutation::CreateNode { id: 0, .. }));
    }

    #[test]
    fn test_replay_rebuilds_identical_store() {
        let mut db = TaxonGraph::new();
        let mut log = MemoryCommitLog::default();
        db.begin_batch().unwrap();
        let a = taxon(&mut db, "Plantae");
        let b = taxon(&mut db, "Rosa");
        db.create_edge(b, a, EdgeKind::ChildOf, &[(ATTR_SOURCE, "s")])
            .unwrap();
        db.commit_batch_into(&mut log).unwrap();

        let mut replayed = TaxonGraph::new();
        for (seq, mutations) in &log.frames {
            replayed.apply_committed(*seq, mutations).unwrap();
        }
        assert_eq!(replayed.node(b), db.node(b));
        assert_eq!(replayed.neighbors(b, EdgeKind::ChildOf, Direction::Outgoing), vec![a]);
        assert_eq!(replayed.sequence(), 1);

        // Out-of-order replay is rejected.
        assert!(replayed.apply_committed(1, &log.frames[0].1).is_err());
    }
}
