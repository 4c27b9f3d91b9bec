//! Taxograph loader
//!
//! Builds and incrementally merges the taxonomy graph from independently
//! produced sources:
//!
//! - [`TaxonomyLoader::load_initial`]: first-time ingestion, no matching
//! - [`TaxonomyLoader::merge_onto`]: preorder merge grafted onto a known root,
//!   matches confirmed by bounded ChildOf path search
//! - [`TaxonomyLoader::merge_flat`]: collisions resolved by ancestor-path
//!   scoring when no attachment root is known
//!
//! All writes go through [`GraphWriter`] in commit windows; every call
//! returns a [`LoadReport`] with counters and a bounded anomaly sample.

pub mod config;
pub mod error;
pub mod names;
pub mod path_scoring;
pub mod report;

mod batch;
mod bulk;
mod preorder;
mod tree;
mod writes;

use std::path::Path;

use taxograph_ingest::{ParsedSource, SynonymTable, TaxonRecord};
use taxograph_pathdb::{GraphWriter, NodeId};

pub use config::{LoaderConfig, SourceDescriptor};
pub use error::LoadError;
pub use names::{NameMatch, NameResolver};
pub use path_scoring::{steps_to_match, INFINITE};
pub use report::{Anomaly, LoadMode, LoadReport};

/// How a source is added to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    Initial,
    /// Preorder merge anchored at this existing taxon.
    Onto(NodeId),
    /// Path-scoring merge.
    Flat,
}

pub struct TaxonomyLoader<'g, G: GraphWriter + ?Sized> {
    graph: &'g mut G,
    config: LoaderConfig,
}

impl<'g, G: GraphWriter + ?Sized> TaxonomyLoader<'g, G> {
    pub fn new(graph: &'g mut G, config: LoaderConfig) -> Self {
        Self { graph, config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn graph(&self) -> &G {
        &*self.graph
    }

    pub fn load_initial(
        &mut self,
        source: &SourceDescriptor,
        records: &[TaxonRecord],
        synonyms: &SynonymTable,
    ) -> Result<LoadReport, LoadError> {
        bulk::load_initial(&mut *self.graph, &self.config, source, records, synonyms)
    }

    pub fn merge_onto(
        &mut self,
        source: &SourceDescriptor,
        existing_root: NodeId,
        records: &[TaxonRecord],
        synonyms: &SynonymTable,
    ) -> Result<LoadReport, LoadError> {
        preorder::merge_onto(
            &mut *self.graph,
            &self.config,
            source,
            existing_root,
            records,
            synonyms,
        )
    }

    pub fn merge_flat(
        &mut self,
        source: &SourceDescriptor,
        records: &[TaxonRecord],
        synonyms: &SynonymTable,
    ) -> Result<LoadReport, LoadError> {
        path_scoring::merge_flat(&mut *self.graph, &self.config, source, records, synonyms)
    }

    pub fn load(
        &mut self,
        strategy: MergeStrategy,
        source: &SourceDescriptor,
        parsed: &ParsedSource,
    ) -> Result<LoadReport, LoadError> {
        match strategy {
            MergeStrategy::Initial => self.load_initial(source, &parsed.records, &parsed.synonyms),
            MergeStrategy::Onto(root) => {
                self.merge_onto(source, root, &parsed.records, &parsed.synonyms)
            }
            MergeStrategy::Flat => self.merge_flat(source, &parsed.records, &parsed.synonyms),
        }
    }

    /// Read a hierarchy file (plus an optional tab-pipe synonym file) and load
    /// it with `strategy`. The file digest is recorded on the metadata node.
    pub fn load_files(
        &mut self,
        strategy: MergeStrategy,
        source: &SourceDescriptor,
        taxonomy: &Path,
        synonyms: Option<&Path>,
    ) -> Result<LoadReport, LoadError> {
        let mut parsed =
            taxograph_ingest::read_source_file(taxonomy, source.format, self.config.malformed_lines)?;
        if let Some(path) = synonyms {
            parsed.synonyms.extend(taxograph_ingest::read_synonym_file(path)?);
        }

        let mut source = source.clone();
        if source.digest.is_none() {
            source.digest = Some(taxograph_ingest::file_digest(taxonomy)?);
        }
        self.load(strategy, &source, &parsed)
    }
}
