//! Push negotiation
//!
//! Given the local tip of a ref and a fresh [`RemoteAdvertisement`], decide
//! which commits the remote lacks and which objects must travel with them.
//!
//! ## Algorithm
//!
//! A timestamp-ordered colored walk over the local, shallow-bounded graph:
//!
//! - the local tip is colored LOCAL
//! - every advertised tip and every remote shallow root that is stored
//!   locally is colored REMOTE
//! - colors flow from a commit to its parents
//! - the walk ends once every queued commit carries REMOTE and no shallow
//!   root is left LOCAL-only while REMOTE commits are still queued
//!
//! Commits colored LOCAL but not REMOTE are the ones to send. A shallow root
//! is never expanded: its parents are not stored and the remote's knowledge of
//! them cannot be probed locally. If such a root is left LOCAL-only, the
//! remote is not known to hold the history beneath it and the push fails with
//! [`ShoalError::InsufficientHistory`] instead of looking up the absent
//! parent.

use crate::artifacts::branch::branch_name::RefName;
use crate::artifacts::graph::CommitGraph;
use crate::artifacts::objects::commit::SlimCommit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::transfer::advertisement::RemoteAdvertisement;
use crate::artifacts::transfer::object_set::ObjectSet;
use crate::errors::{ShoalError, ShoalResult};
use bitflags::bitflags;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};
use tokio_util::sync::CancellationToken;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct Color: u8 {
        const NONE = 0b00;
        const LOCAL = 0b01;
        const REMOTE = 0b10;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushOptions {
    /// Overwrite a remote tip that is not an ancestor of the local tip
    pub force: bool,
    /// Create the ref on the remote when it does not exist yet
    pub allow_create: bool,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            force: false,
            allow_create: true,
        }
    }
}

/// Outcome of a push negotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushPlan {
    pub ref_name: RefName,
    pub old_tip: Option<ObjectId>,
    pub new_tip: ObjectId,
    /// Commits the remote lacks, newest first
    pub commits: Vec<ObjectId>,
    /// Every object to send: each commit followed by its new trees and blobs
    pub objects: Vec<ObjectId>,
}

impl PushPlan {
    pub fn is_up_to_date(&self) -> bool {
        self.old_tip == Some(self.new_tip)
    }
}

pub struct PushNegotiator<'g, 'r> {
    graph: &'g CommitGraph<'r>,
    cancellation: CancellationToken,
}

/// Walk bookkeeping
struct ColoredWalk {
    colors: HashMap<ObjectId, Color>,
    commits: HashMap<ObjectId, SlimCommit>,
    queue: BinaryHeap<SlimCommit>,
    queued: HashSet<ObjectId>,
    /// Queued commits not (yet) colored REMOTE
    unresolved: usize,
    stranded_roots: BTreeSet<ObjectId>,
}

impl ColoredWalk {
    fn new() -> Self {
        Self {
            colors: HashMap::new(),
            commits: HashMap::new(),
            queue: BinaryHeap::new(),
            queued: HashSet::new(),
            unresolved: 0,
            stranded_roots: BTreeSet::new(),
        }
    }

    fn color(&self, oid: &ObjectId) -> Color {
        self.colors.get(oid).copied().unwrap_or(Color::NONE)
    }

    /// Add `color` to `commit`, queueing it again if that changed anything
    fn paint(&mut self, commit: SlimCommit, color: Color) {
        let previous = self.color(&commit.oid);
        let painted = previous | color;
        if painted == previous {
            return;
        }
        self.colors.insert(commit.oid, painted);

        if self.queued.contains(&commit.oid) {
            if !previous.contains(Color::REMOTE) && painted.contains(Color::REMOTE) {
                self.unresolved -= 1;
            }
            return;
        }

        if !painted.contains(Color::REMOTE) {
            self.unresolved += 1;
        }
        self.queued.insert(commit.oid);
        self.commits.insert(commit.oid, commit.clone());
        self.queue.push(commit);
    }

    /// Whether a shallow root was left LOCAL-only so far
    fn has_stranded_roots(&self) -> bool {
        self.stranded_roots
            .iter()
            .any(|oid| !self.color(oid).contains(Color::REMOTE))
    }

    fn pop(&mut self) -> Option<(SlimCommit, Color)> {
        let commit = self.queue.pop()?;
        self.queued.remove(&commit.oid);
        let color = self.color(&commit.oid);
        if !color.contains(Color::REMOTE) {
            self.unresolved -= 1;
        }

        Some((commit, color))
    }
}

impl<'g, 'r> PushNegotiator<'g, 'r> {
    pub fn new(graph: &'g CommitGraph<'r>, cancellation: CancellationToken) -> Self {
        Self {
            graph,
            cancellation,
        }
    }

    /// Compute what pushing `local_tip` to `ref_name` on the remote must send
    ///
    /// Negotiation only reads the local store; nothing is mutated on any path.
    pub fn negotiate(
        &self,
        ref_name: &RefName,
        local_tip: ObjectId,
        advertisement: &RemoteAdvertisement,
        options: PushOptions,
    ) -> ShoalResult<PushPlan> {
        let remote_tip = advertisement.tip(ref_name);
        tracing::debug!(
            ref_name = %ref_name,
            local = %local_tip,
            remote = ?remote_tip,
            remote_shallow = advertisement.shallow.len(),
            "negotiating push"
        );

        if remote_tip == Some(local_tip) {
            return Ok(PushPlan {
                ref_name: ref_name.clone(),
                old_tip: remote_tip,
                new_tip: local_tip,
                commits: Vec::new(),
                objects: Vec::new(),
            });
        }

        match remote_tip {
            None if !options.allow_create => {
                return Err(ShoalError::RefNotFound {
                    ref_name: ref_name.to_string(),
                });
            }
            Some(remote_tip) if !options.force => {
                if !self.reaches(&local_tip, &remote_tip)? {
                    return Err(ShoalError::DivergedHistory {
                        ref_name: ref_name.to_string(),
                        local: local_tip,
                        remote: Some(remote_tip),
                    });
                }
            }
            _ => {}
        }

        let walk = self.colored_walk(local_tip, advertisement)?;

        if let Some(shallow_root) = walk.stranded_roots.iter().next() {
            tracing::warn!(
                ref_name = %ref_name,
                shallow_root = %shallow_root,
                "shallow root is not known to the remote"
            );
            return Err(ShoalError::InsufficientHistory {
                ref_name: ref_name.to_string(),
                shallow_root: *shallow_root,
            });
        }

        let mut outgoing = walk
            .colors
            .iter()
            .filter(|(_, color)| color.contains(Color::LOCAL) && !color.contains(Color::REMOTE))
            .filter_map(|(oid, _)| walk.commits.get(oid))
            .collect::<Vec<_>>();
        outgoing.sort_by(|a, b| b.cmp(a));

        let objects = self.expand_objects(&outgoing, &walk)?;
        let commits = outgoing.iter().map(|commit| commit.oid).collect::<Vec<_>>();

        tracing::info!(
            ref_name = %ref_name,
            commits = commits.len(),
            objects = objects.len(),
            "push negotiated"
        );

        Ok(PushPlan {
            ref_name: ref_name.clone(),
            old_tip: remote_tip,
            new_tip: local_tip,
            commits,
            objects,
        })
    }

    /// Whether `target` is `from` or one of its ancestors, as far as the
    /// local history goes; a target that is not stored is never reached
    fn reaches(&self, from: &ObjectId, target: &ObjectId) -> ShoalResult<bool> {
        if !self.graph.database().contains(target) {
            return Ok(false);
        }

        for commit in self
            .graph
            .ancestors(*from)
            .with_cancellation(self.cancellation.clone())
        {
            if commit?.oid == *target {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn colored_walk(
        &self,
        local_tip: ObjectId,
        advertisement: &RemoteAdvertisement,
    ) -> ShoalResult<ColoredWalk> {
        let mut walk = ColoredWalk::new();

        walk.paint(self.graph.commit(&local_tip)?, Color::LOCAL);
        let remote_seeds = advertisement
            .tips()
            .chain(advertisement.shallow.iter().copied())
            .collect::<BTreeSet<_>>();
        for seed in remote_seeds {
            if self.graph.database().contains(&seed) {
                walk.paint(self.graph.commit(&seed)?, Color::REMOTE);
            }
        }

        // REMOTE commits still queued may reach a root examined before them
        while walk.unresolved > 0 || (walk.has_stranded_roots() && !walk.queue.is_empty()) {
            if self.cancellation.is_cancelled() {
                tracing::debug!("push negotiation cancelled");
                return Err(ShoalError::Cancelled);
            }
            let Some((commit, color)) = walk.pop() else {
                break;
            };

            tracing::trace!(commit = %commit.oid, color = ?color, "negotiation step");

            if commit.is_shallow_root() {
                if color.contains(Color::REMOTE) {
                    walk.stranded_roots.remove(&commit.oid);
                } else {
                    walk.stranded_roots.insert(commit.oid);
                }
                continue;
            }

            for parent in commit.walkable_parents() {
                let parent = self.graph.commit(parent)?;
                walk.paint(parent, color);
            }
        }

        // a root painted REMOTE after it was examined is resolved after all
        walk.stranded_roots
            .retain(|oid| !walk.colors.get(oid).is_some_and(|c| c.contains(Color::REMOTE)));

        Ok(walk)
    }

    fn expand_objects(
        &self,
        outgoing: &[&SlimCommit],
        walk: &ColoredWalk,
    ) -> ShoalResult<Vec<ObjectId>> {
        let mut objects = ObjectSet::new(self.graph.database());

        let edges = outgoing
            .iter()
            .flat_map(|commit| commit.parents.iter())
            .filter(|parent| walk.color(parent).contains(Color::REMOTE))
            .copied()
            .collect::<BTreeSet<_>>();
        for edge in edges {
            let edge_commit = self.graph.commit(&edge)?;
            objects.mark_known_tree(edge_commit.tree_oid)?;
        }

        for commit in outgoing {
            if self.cancellation.is_cancelled() {
                return Err(ShoalError::Cancelled);
            }
            objects.add_commit(commit.oid, commit.tree_oid)?;
        }

        Ok(objects.into_ordered())
    }
}
