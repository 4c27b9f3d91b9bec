//! Taxograph durable storage
//!
//! Wraps the in-memory [`TaxonGraph`] with a write-ahead log so that every
//! committed batch survives a crash:
//!
//! ```text
//!   loader ──► DurableGraph ──► TaxonGraph (in memory)
//!                   │
//!                   ├──► graph.wal   (one fsynced frame per commit)
//!                   └──► graph.txpd  (snapshot written by checkpoint)
//! ```
//!
//! Opening a database loads the latest snapshot and replays the WAL frames
//! committed after it. `checkpoint` writes a fresh snapshot (temp file +
//! rename) and truncates the WAL.

pub mod persistence;


use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use taxograph_pathdb::{
    CommitSummary, Direction, EdgeId, EdgeKind, EdgeView, GraphReader, GraphWriter, NameIndex,
    NodeId, NodeKind, NodeView, StoreError, TaxonGraph,
};

pub use persistence::{WalError, WalFrame, WriteAheadLog};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database directory
    pub db_dir: PathBuf,
    /// Snapshot file name inside `db_dir`
    pub snapshot_file: String,
    /// WAL file name inside `db_dir`
    pub wal_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_dir: PathBuf::from("./taxograph-db"),
            snapshot_file: "graph.txpd".to_string(),
            wal_file: "graph.wal".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            db_dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.db_dir.join(&self.snapshot_file)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.db_dir.join(&self.wal_file)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Wal(#[from] WalError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// What `open` found on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    pub snapshot_loaded: bool,
    pub frames_replayed: usize,
    /// Frames already contained in the snapshot (crash between snapshot and truncate).
    pub frames_skipped: usize,
}

// ============================================================================
// Durable Graph
// ============================================================================

pub struct DurableGraph {
    config: StorageConfig,
    graph: TaxonGraph,
    wal: WriteAheadLog,
    recovery: RecoveryStats,
}

impl DurableGraph {
    /// Open (or create) the database in `config.db_dir`.
    pub fn open(config: StorageConfig) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&config.db_dir).map_err(io_err(&config.db_dir))?;

        let snapshot_path = config.snapshot_path();
        let mut recovery = RecoveryStats::default();
        let mut graph = if snapshot_path.exists() {
            let bytes = std::fs::read(&snapshot_path).map_err(io_err(&snapshot_path))?;
            recovery.snapshot_loaded = true;
            TaxonGraph::from_bytes(&bytes)?
        } else {
            TaxonGraph::new()
        };

        let wal = WriteAheadLog::open(&config.wal_path())?;
        for frame in wal.replay()? {
            if frame.sequence <= graph.sequence() {
                recovery.frames_skipped += 1;
                continue;
            }
            graph.apply_committed(frame.sequence, &frame.mutations)?;
            recovery.frames_replayed += 1;
        }

        tracing::info!(
            db = %config.db_dir.display(),
            nodes = graph.node_count(),
            edges = graph.edge_total(),
            sequence = graph.sequence(),
            snapshot = recovery.snapshot_loaded,
            replayed = recovery.frames_replayed,
            "opened taxonomy graph"
        );

        Ok(Self {
            config,
            graph,
            wal,
            recovery,
        })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn recovery(&self) -> RecoveryStats {
        self.recovery
    }

    pub fn graph(&self) -> &TaxonGraph {
        &self.graph
    }

    /// Write a snapshot of every committed batch and truncate the WAL.
    /// Returns the snapshot size in bytes.
    pub fn checkpoint(&mut self) -> Result<u64, StorageError> {
        let bytes = self.graph.to_bytes()?;
        let target = self.config.snapshot_path();
        let tmp = target.with_extension("txpd.tmp");

        std::fs::write(&tmp, &bytes).map_err(io_err(&tmp))?;
        std::fs::File::open(&tmp)
            .and_then(|f| f.sync_all())
            .map_err(io_err(&tmp))?;
        std::fs::rename(&tmp, &target).map_err(io_err(&target))?;
        self.wal.truncate()?;

        tracing::info!(
            path = %target.display(),
            bytes = bytes.len(),
            sequence = self.graph.sequence(),
            "checkpoint written"
        );
        Ok(bytes.len() as u64)
    }
}

impl GraphReader for DurableGraph {
    fn node_kind(&self, id: NodeId) -> Option<NodeKind> {
        self.graph.node_kind(id)
    }

    fn attr(&self, id: NodeId, key: &str) -> Option<String> {
        self.graph.attr(id, key)
    }

    fn node(&self, id: NodeId) -> Option<NodeView> {
        self.graph.node(id)
    }

    fn index_by_name(&self, index: NameIndex, name: &str) -> Vec<NodeId> {
        self.graph.index_by_name(index, name)
    }

    fn edges(&self, node: NodeId, kind: EdgeKind, dir: Direction) -> Vec<EdgeView> {
        self.graph.edges(node, kind, dir)
    }

    fn neighbors(&self, node: NodeId, kind: EdgeKind, dir: Direction) -> Vec<NodeId> {
        self.graph.neighbors(node, kind, dir)
    }

    fn edge_count(&self, node: NodeId) -> usize {
        self.graph.edge_count(node)
    }

    fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    fn edge_total(&self) -> usize {
        self.graph.edge_total()
    }
}

impl GraphWriter for DurableGraph {
    fn begin_batch(&mut self) -> Result<(), StoreError> {
        self.graph.begin_batch()
    }

    fn commit_batch(&mut self) -> Result<CommitSummary, StoreError> {
        self.graph.commit_batch_into(&mut self.wal)
    }

    fn abort_batch(&mut self) -> Result<(), StoreError> {
        self.graph.abort_batch()
    }

    fn in_batch(&self) -> bool {
        self.graph.in_batch()
    }

    fn create_node(&mut self, kind: NodeKind, attrs: &[(&str, &str)]) -> Result<NodeId, StoreError> {
        self.graph.create_node(kind, attrs)
    }

    fn create_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        kind: EdgeKind,
        attrs: &[(&str, &str)],
    ) -> Result<EdgeId, StoreError> {
        self.graph.create_edge(from, to, kind, attrs)
    }

    fn add_to_index(&mut self, index: NameIndex, name: &str, node: NodeId) -> Result<(), StoreError> {
        self.graph.add_to_index(index, name, node)
    }

    fn delete_node(&mut self, node: NodeId) -> Result<(), StoreError> {
        self.graph.delete_node(node)
    }
}
