//! Mutation journal for commit batches.
//!
//! Every mutation made inside a batch is recorded here. On commit the journal
//! is handed to a [`CommitLog`] (the durable store appends it to its WAL); on
//! abort it is undone in reverse order. Replaying committed journals in order
//! onto an empty store reproduces the same ids.

use serde::{Deserialize, Serialize};

use crate::facade::{EdgeId, EdgeKind, NameIndex, NodeId, NodeKind, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    CreateNode {
        id: NodeId,
        kind: NodeKind,
        attrs: Vec<(String, String)>,
    },
    CreateEdge {
        id: EdgeId,
        kind: EdgeKind,
        from: NodeId,
        to: NodeId,
        attrs: Vec<(String, String)>,
    },
    IndexName {
        index: NameIndex,
        name: String,
        node: NodeId,
    },
    /// `unindexed` lists the index entries the deletion removed, so an abort
    /// can restore them.
    DeleteNode {
        id: NodeId,
        unindexed: Vec<(NameIndex, String)>,
    },
}

/// Destination for committed batches.
pub trait CommitLog {
    fn append(&mut self, sequence: u64, mutations: &[Mutation]) -> Result<(), StoreError>;
}

/// Commit log that keeps nothing (pure in-memory store).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCommitLog;

impl CommitLog for NullCommitLog {
    fn append(&mut self, _sequence: u64, _mutations: &[Mutation]) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Commit log that retains every committed batch in memory (tests, dry runs).
#[derive(Debug, Default, Clone)]
pub struct MemoryCommitLog {
    pub frames: Vec<(u64, Vec<Mutation>)>,
}

impl CommitLog for MemoryCommitLog {
    fn append(&mut self, sequence: u64, mutations: &[Mutation]) -> Result<(), StoreError> {
        self.frames.push((sequence, mutations.to_vec()));
        Ok(())
    }
}
