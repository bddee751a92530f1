//! Shallow-bounded commit graph queries
//!
//! A [`CommitGraph`] is a read-only view over the object store together with
//! a set of shallow roots. Every commit it hands out carries a
//! [`Boundary`] tag taken from that set, so walks terminate at the roots and
//! history held beyond a root is treated as absent.
//!
//! The same store can be viewed through different root sets: a repository
//! walks its own history bounded by its own roots, while the serving side of
//! a fetch bounds the client's history by the client's roots.

use crate::areas::database::{CommitCache, Database};
use crate::artifacts::log::rev_list::RevList;
use crate::artifacts::merge::bca_finder::BCAFinder;
use crate::artifacts::objects::commit::{Boundary, SlimCommit};
use crate::artifacts::objects::object_id::ObjectId;
use std::collections::BTreeSet;

#[derive(Debug)]
pub struct CommitGraph<'r> {
    database: &'r Database,
    shallow_roots: BTreeSet<ObjectId>,
    cache: CommitCache,
}

impl<'r> CommitGraph<'r> {
    pub fn new(database: &'r Database, shallow_roots: impl IntoIterator<Item = ObjectId>) -> Self {
        Self {
            database,
            shallow_roots: shallow_roots.into_iter().collect(),
            cache: CommitCache::new(),
        }
    }

    pub fn database(&self) -> &'r Database {
        self.database
    }

    pub fn shallow_roots(&self) -> &BTreeSet<ObjectId> {
        &self.shallow_roots
    }

    pub fn is_shallow_root(&self, oid: &ObjectId) -> bool {
        self.shallow_roots.contains(oid)
    }

    /// Load a commit tagged with its boundary in this view
    pub fn commit(&self, oid: &ObjectId) -> anyhow::Result<SlimCommit> {
        let mut commit = self.cache.get_or_load_slim_commit(self.database, oid)?;
        if self.is_shallow_root(oid) {
            commit.boundary = Boundary::ShallowRoot;
        }

        Ok(commit)
    }

    /// Lazy walk over `start` and its ancestors
    pub fn ancestors(&self, start: ObjectId) -> RevList<'_, 'r> {
        RevList::new(self, start)
    }

    /// Whether `ancestor` is reachable from `descendant` (inclusive)
    ///
    /// A commit that is not stored, or only stored beyond a shallow root, is
    /// not an ancestor.
    pub fn is_ancestor(&self, ancestor: &ObjectId, descendant: &ObjectId) -> anyhow::Result<bool> {
        if ancestor == descendant {
            return Ok(self.database.contains(ancestor));
        }
        if !self.database.contains(ancestor) {
            return Ok(false);
        }

        for commit in self.ancestors(*descendant) {
            if commit?.oid == *ancestor {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Nearest common ancestor of `a` and `b` within the bounded graph
    pub fn merge_base(&self, a: &ObjectId, b: &ObjectId) -> anyhow::Result<Option<ObjectId>> {
        BCAFinder::new(|oid| self.commit(oid)).find_best_common_ancestor(a, b)
    }
}
