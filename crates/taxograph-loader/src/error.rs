use std::path::PathBuf;

use taxograph_ingest::ReadError;
use taxograph_pathdb::{NodeId, StoreError};

/// Fatal loader failures. Windows committed before the failure stay durable.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("graph store failure: {0}")]
    Store(#[from] StoreError),
    #[error("merge root {0} does not exist or is not a taxon")]
    UnknownRoot(NodeId),
    #[error("source {source_name} has no parentless record to anchor")]
    NoHierarchyRoot { source_name: String },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("cannot read configuration {}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
