//! Commit windows: every `size` steps the open batch is committed and a new
//! one begun. A window dropped before `finish` aborts its open batch, so a
//! failed load never leaves half a window behind.

use taxograph_pathdb::GraphWriter;

use crate::error::LoadError;

pub(crate) struct CommitWindow<'g, G: GraphWriter + ?Sized> {
    graph: &'g mut G,
    size: usize,
    pending: usize,
    commits: usize,
    finished: bool,
    label: &'static str,
}

impl<'g, G: GraphWriter + ?Sized> CommitWindow<'g, G> {
    pub(crate) fn open(graph: &'g mut G, size: usize, label: &'static str) -> Result<Self, LoadError> {
        graph.begin_batch()?;
        Ok(Self {
            graph,
            size: size.max(1),
            pending: 0,
            commits: 0,
            finished: false,
            label,
        })
    }

    pub(crate) fn graph(&mut self) -> &mut G {
        &mut *self.graph
    }

    pub(crate) fn reader(&self) -> &G {
        &*self.graph
    }

    /// Count one unit of work, committing when the window is full.
    pub(crate) fn step(&mut self) -> Result<(), LoadError> {
        self.pending += 1;
        if self.pending >= self.size {
            self.flush()?;
        }
        Ok(())
    }

    /// Commit whatever is pending and open the next batch.
    pub(crate) fn flush(&mut self) -> Result<(), LoadError> {
        if self.pending == 0 {
            return Ok(());
        }
        self.commit()?;
        self.graph.begin_batch()?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), LoadError> {
        let summary = self.graph.commit_batch()?;
        if summary.mutations > 0 {
            self.commits += 1;
            tracing::info!(
                phase = self.label,
                steps = self.pending,
                mutations = summary.mutations,
                sequence = summary.sequence,
                "committed window"
            );
        }
        self.pending = 0;
        Ok(())
    }

    /// Commit the last window. Returns the number of commits made.
    pub(crate) fn finish(mut self) -> Result<usize, LoadError> {
        self.commit()?;
        self.finished = true;
        Ok(self.commits)
    }
}

impl<G: GraphWriter + ?Sized> Drop for CommitWindow<'_, G> {
    fn drop(&mut self) {
        if self.finished || !self.graph.in_batch() {
            return;
        }
        if let Err(err) = self.graph.abort_batch() {
            tracing::warn!(phase = self.label, error = %err, "failed to abort open batch");
        }
    }
}
