use crate::artifacts::graph::CommitGraph;
use crate::artifacts::objects::commit::SlimCommit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::ShoalError;
use std::collections::{BinaryHeap, HashSet};
use tokio_util::sync::CancellationToken;

/// Lazy ancestor walk
///
/// Yields the start commit and then its ancestors, newest commit timestamp
/// first with equal timestamps in ascending id order. Shallow roots are
/// yielded but never expanded. A parent that cannot be loaded under a `Full`
/// commit is reported as an error right after that commit, and ends the walk.
pub struct RevList<'g, 'r> {
    graph: &'g CommitGraph<'r>,
    queue: BinaryHeap<SlimCommit>,
    seen: HashSet<ObjectId>,
    pending_error: Option<anyhow::Error>,
    cancellation: Option<CancellationToken>,
    done: bool,
}

impl<'g, 'r> RevList<'g, 'r> {
    pub(crate) fn new(graph: &'g CommitGraph<'r>, start: ObjectId) -> Self {
        let mut rev_list = RevList {
            graph,
            queue: BinaryHeap::new(),
            seen: HashSet::from([start]),
            pending_error: None,
            cancellation: None,
            done: false,
        };

        match graph.commit(&start) {
            Ok(commit) => rev_list.queue.push(commit),
            Err(error) => rev_list.pending_error = Some(error),
        }

        rev_list
    }

    /// Abort with [`ShoalError::Cancelled`] once `token` fires
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn enqueue_parents(&mut self, commit: &SlimCommit) -> anyhow::Result<()> {
        for parent in commit.walkable_parents() {
            if self.seen.insert(*parent) {
                self.queue.push(self.graph.commit(parent)?);
            }
        }

        Ok(())
    }
}

impl Iterator for RevList<'_, '_> {
    type Item = anyhow::Result<SlimCommit>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Some(error) = self.pending_error.take() {
            self.done = true;
            return Some(Err(error));
        }

        if self
            .cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
        {
            self.done = true;
            return Some(Err(ShoalError::Cancelled.into()));
        }

        let commit = self.queue.pop()?;
        if let Err(error) = self.enqueue_parents(&commit) {
            self.pending_error = Some(error);
        }

        Some(Ok(commit))
    }
}
