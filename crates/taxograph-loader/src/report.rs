//! Load reports and the recoverable anomalies they record.

use serde::Serialize;

use taxograph_pathdb::NodeId;

/// Recoverable problems: recorded, counted, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    #[error("record {local_id} ({name}) names parent {parent_id}, which the source never defines")]
    DanglingParentReference {
        local_id: String,
        parent_id: String,
        name: String,
    },
    #[error("record {local_id} ({name}) names itself as its parent")]
    SelfParentReference { local_id: String, name: String },
    #[error("record {local_id} ({name}) has no ancestor chain to a root (stops at {missing_id})")]
    BrokenAncestorChain {
        local_id: String,
        name: String,
        missing_id: String,
    },
    #[error("no existing {name} could be confirmed among {candidates} candidate(s); created node {created}")]
    UnconfirmedNameCollision {
        local_id: String,
        name: String,
        candidates: usize,
        created: NodeId,
    },
    #[error("root sentinel {name} matches {hits} nodes; attached to {chosen}")]
    AmbiguousRootSentinel {
        name: String,
        hits: usize,
        chosen: NodeId,
    },
    #[error("local id {local_id} ({name}) repeats an earlier record and was skipped")]
    DuplicateLocalId { local_id: String, name: String },
}

impl Anomaly {
    /// Duplicates, broken chains and ambiguous roots are surfaced as
    /// warnings; the rest is per-record detail.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Anomaly::UnconfirmedNameCollision { .. }
                | Anomaly::BrokenAncestorChain { .. }
                | Anomaly::AmbiguousRootSentinel { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    #[default]
    Initial,
    Preorder,
    PathScoring,
}

impl LoadMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadMode::Initial => "initial",
            LoadMode::Preorder => "preorder",
            LoadMode::PathScoring => "path_scoring",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub source: String,
    pub mode: LoadMode,
    pub records_read: usize,
    pub nodes_created: usize,
    pub nodes_matched: usize,
    pub edges_created: usize,
    pub synonyms_attached: usize,
    pub synonyms_unmatched: usize,
    pub duplicates_created: usize,
    pub dangling_parents: usize,
    pub self_parents: usize,
    pub broken_chains: usize,
    pub orphans_removed: usize,
    pub ambiguous_root_sentinels: usize,
    pub duplicate_local_ids: usize,
    pub roots_linked: usize,
    pub commits: usize,
    pub metadata_node: Option<NodeId>,
    pub anomalies: Vec<Anomaly>,
    /// Anomalies counted but not kept in `anomalies`.
    pub anomalies_dropped: usize,
    #[serde(skip)]
    max_recorded: usize,
}

impl LoadReport {
    pub fn new(source: impl Into<String>, mode: LoadMode, max_recorded: usize) -> Self {
        Self {
            source: source.into(),
            mode,
            max_recorded,
            ..Self::default()
        }
    }

    /// Count an anomaly and keep it if the sample still has room.
    pub fn note(&mut self, anomaly: Anomaly) {
        match &anomaly {
            Anomaly::DanglingParentReference { .. } => self.dangling_parents += 1,
            Anomaly::SelfParentReference { .. } => self.self_parents += 1,
            Anomaly::BrokenAncestorChain { .. } => self.broken_chains += 1,
            Anomaly::UnconfirmedNameCollision { .. } => self.duplicates_created += 1,
            Anomaly::AmbiguousRootSentinel { .. } => self.ambiguous_root_sentinels += 1,
            Anomaly::DuplicateLocalId { .. } => self.duplicate_local_ids += 1,
        }
        if anomaly.is_warning() {
            tracing::warn!(source = %self.source, "{anomaly}");
        } else {
            tracing::debug!(source = %self.source, "{anomaly}");
        }

        if self.anomalies.len() < self.max_recorded {
            self.anomalies.push(anomaly);
        } else {
            self.anomalies_dropped += 1;
        }
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomalies.len() + self.anomalies_dropped
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
