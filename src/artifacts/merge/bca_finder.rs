//! Best common ancestor (merge base) finder
//!
//! ## Algorithm Overview
//!
//! ### Phase 1: Find All Common Ancestors
//!
//! A bidirectional, timestamp-ordered traversal explores the history of both
//! input commits:
//! - Process commits newest first
//! - Mark commits as visited from the source or the target side
//! - When a commit is visited from both sides, mark it as a common ancestor
//! - Mark ancestors of common ancestors as STALE to prune the search space
//!
//! ### Phase 2: Filter to Best Common Ancestors
//!
//! > A best common ancestor of commits X and Y is any common ancestor of X and Y
//! > that is not an ancestor of any other common ancestor.
//!
//! ## Shallow histories
//!
//! The loader hands out [`SlimCommit`]s tagged with their [`Boundary`]; the
//! traversal only descends into [`SlimCommit::walkable_parents`], so it stops
//! at shallow roots instead of probing for parents that were never fetched.
//! Two commits whose only common history lies beyond a shallow root have no
//! merge base as far as this repository can tell.
//!
//! [`Boundary`]: crate::artifacts::objects::commit::Boundary

use crate::artifacts::objects::commit::SlimCommit;
use crate::artifacts::objects::object_id::ObjectId;
use bitflags::bitflags;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fmt;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash)]
    struct VisitState: u8 {
        const NONE = 0b00;
        const VISITED_FROM_SOURCE = 0b01;
        const VISITED_FROM_TARGET = 0b10;
        const VISITED_FROM_BOTH = Self::VISITED_FROM_SOURCE.bits() | Self::VISITED_FROM_TARGET.bits();
        const STALE = 0b100;
        const RESULT = 0b1000;
    }
}

impl fmt::Debug for VisitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flags = Vec::new();
        if self.contains(VisitState::VISITED_FROM_SOURCE) {
            flags.push("SOURCE");
        }
        if self.contains(VisitState::VISITED_FROM_TARGET) {
            flags.push("TARGET");
        }
        if self.contains(VisitState::STALE) {
            flags.push("STALE");
        }
        if self.contains(VisitState::RESULT) {
            flags.push("RESULT");
        }
        if flags.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", flags.join("|"))
        }
    }
}

/// Finds common ancestors given a fallible commit loader
///
/// The loader is expected to apply the caller's shallow view: it returns a
/// `ShallowRoot`-tagged commit for boundary commits and fails with
/// `ObjectNotFound` when a commit that should be present is missing.
#[derive(Debug, Clone)]
struct CommonAncestorsFinder<CommitLoaderFn>
where
    CommitLoaderFn: Fn(&ObjectId) -> anyhow::Result<SlimCommit>,
{
    commit_loader: CommitLoaderFn,
}

impl<CommitLoaderFn> CommonAncestorsFinder<CommitLoaderFn>
where
    CommitLoaderFn: Fn(&ObjectId) -> anyhow::Result<SlimCommit>,
{
    fn new(commit_loader: CommitLoaderFn) -> Self {
        Self { commit_loader }
    }

    /// Common ancestors of `source_commit_id` and every target, with their states
    ///
    /// Stale entries are filtered out; the remaining ones carry RESULT.
    fn find_common_ancestors(
        &self,
        source_commit_id: &ObjectId,
        target_commit_ids: HashSet<&ObjectId>,
    ) -> anyhow::Result<HashMap<ObjectId, VisitState>> {
        if target_commit_ids.contains(source_commit_id) {
            return Ok(HashMap::from([(*source_commit_id, VisitState::RESULT)]));
        }

        let mut ancestors_states = HashMap::<ObjectId, VisitState>::new();
        // newest first; equal timestamps pop the smaller id first
        let mut priority_queue = BinaryHeap::new();

        let source_commit = (self.commit_loader)(source_commit_id)?;
        ancestors_states.insert(source_commit.oid, VisitState::VISITED_FROM_SOURCE);
        priority_queue.push((source_commit.timestamp, Reverse(source_commit.oid)));

        for &target_commit_id in target_commit_ids.iter() {
            ancestors_states.insert(*target_commit_id, VisitState::VISITED_FROM_TARGET);

            let target_commit = (self.commit_loader)(target_commit_id)?;
            priority_queue.push((target_commit.timestamp, Reverse(target_commit.oid)));
        }

        while let Some((_, Reverse(commit_id))) = priority_queue.pop() {
            let current_state = ancestors_states
                .get(&commit_id)
                .copied()
                .unwrap_or(VisitState::NONE);

            tracing::trace!(commit = %commit_id, state = ?current_state, "merge-base step");

            if current_state.contains(VisitState::STALE) {
                continue;
            }

            let is_common_ancestor = if current_state.contains(VisitState::VISITED_FROM_BOTH) {
                ancestors_states
                    .entry(commit_id)
                    .and_modify(|state| *state |= VisitState::RESULT);
                true
            } else {
                false
            };

            let current_commit = (self.commit_loader)(&commit_id)?;

            for parent_id in current_commit.walkable_parents() {
                let parent_state = ancestors_states
                    .get(parent_id)
                    .copied()
                    .unwrap_or(VisitState::NONE);

                let mut new_state = parent_state | current_state;
                if is_common_ancestor {
                    new_state |= VisitState::STALE;
                }

                if !parent_state.contains(current_state) || new_state != parent_state {
                    let parent_commit = (self.commit_loader)(parent_id)?;
                    ancestors_states.insert(*parent_id, new_state);
                    priority_queue.push((parent_commit.timestamp, Reverse(*parent_id)));
                }
            }
        }

        Ok(ancestors_states
            .into_iter()
            .filter(|(_, state)| {
                !state.contains(VisitState::STALE) && state.contains(VisitState::RESULT)
            })
            .collect())
    }
}

pub struct BCAFinder<CommitLoaderFn>
where
    CommitLoaderFn: Fn(&ObjectId) -> anyhow::Result<SlimCommit>,
{
    inner: CommonAncestorsFinder<CommitLoaderFn>,
}

impl<CommitLoaderFn> BCAFinder<CommitLoaderFn>
where
    CommitLoaderFn: Fn(&ObjectId) -> anyhow::Result<SlimCommit>,
{
    pub fn new(commit_loader: CommitLoaderFn) -> Self {
        Self {
            inner: CommonAncestorsFinder::new(commit_loader),
        }
    }

    /// Finds the best common ancestor between two commits
    ///
    /// Returns `None` when the histories share no commit within the
    /// shallow-bounded graph. When several best common ancestors exist (for
    /// example after a criss-cross merge) the newest one is returned, ties
    /// broken by the smaller id.
    ///
    /// ```text
    ///     A
    ///    / \
    ///   B   C       merge base of B and C is A
    /// ```
    pub fn find_best_common_ancestor(
        &self,
        source_commit_id: &ObjectId,
        target_commit_id: &ObjectId,
    ) -> anyhow::Result<Option<ObjectId>> {
        let common_ancestors = self
            .inner
            .find_common_ancestors(source_commit_id, HashSet::from([target_commit_id]))?
            .into_keys()
            .collect::<HashSet<_>>();

        if common_ancestors.is_empty() {
            return Ok(None);
        }

        tracing::trace!(count = common_ancestors.len(), "found common ancestors");

        let mut redundant_ancestors = HashSet::<ObjectId>::new();
        for commit in &common_ancestors {
            if redundant_ancestors.contains(commit) {
                continue;
            }

            let others = common_ancestors
                .iter()
                .filter(|other| *other != commit && !redundant_ancestors.contains(*other))
                .collect::<HashSet<_>>();
            if others.is_empty() {
                continue;
            }
            let common_states = self.inner.find_common_ancestors(commit, others.clone())?;

            if common_states
                .get(commit)
                .unwrap_or(&VisitState::NONE)
                .contains(VisitState::VISITED_FROM_TARGET)
            {
                redundant_ancestors.insert(*commit);
            }

            for other in others {
                if common_states
                    .get(other)
                    .unwrap_or(&VisitState::NONE)
                    .contains(VisitState::VISITED_FROM_SOURCE)
                {
                    redundant_ancestors.insert(*other);
                }
            }
        }

        let mut best_common_ancestors = Vec::new();
        for commit in common_ancestors
            .into_iter()
            .filter(|commit| !redundant_ancestors.contains(commit))
        {
            best_common_ancestors.push((self.inner.commit_loader)(&commit)?);
        }

        Ok(best_common_ancestors.into_iter().max().map(|commit| commit.oid))
    }
}
