//! Expansion of commits into the objects a peer is missing
//!
//! The peer is assumed to hold every tree and blob reachable from the trees
//! of its edge commits (the commits the negotiation proved it has, adjacent
//! to the commits being sent). Everything else reachable from a sent commit
//! is emitted once, right after the commit, in pre-order.

use crate::areas::database::Database;
use crate::artifacts::objects::object_id::ObjectId;
use std::collections::HashSet;

#[derive(Debug)]
pub struct ObjectSet<'d> {
    database: &'d Database,
    known: HashSet<ObjectId>,
    emitted: HashSet<ObjectId>,
    order: Vec<ObjectId>,
}

impl<'d> ObjectSet<'d> {
    pub fn new(database: &'d Database) -> Self {
        Self {
            database,
            known: HashSet::new(),
            emitted: HashSet::new(),
            order: Vec::new(),
        }
    }

    /// Record that the peer holds `tree_oid` and everything below it
    ///
    /// A tree missing from the local store cannot be walked; it is skipped
    /// with a warning, which at worst makes the transfer send more than needed.
    pub fn mark_known_tree(&mut self, tree_oid: ObjectId) -> anyhow::Result<()> {
        let mut pending = vec![tree_oid];

        while let Some(tree_oid) = pending.pop() {
            if !self.known.insert(tree_oid) {
                continue;
            }
            if !self.database.contains(&tree_oid) {
                tracing::warn!(tree = %tree_oid, "edge tree is not stored locally, skipping");
                continue;
            }

            for (_, entry) in self.database.load_tree(&tree_oid)?.entries() {
                if entry.is_tree() {
                    pending.push(entry.oid);
                } else {
                    self.known.insert(entry.oid);
                }
            }
        }

        Ok(())
    }

    /// Emit a commit followed by the parts of its tree the peer lacks
    pub fn add_commit(&mut self, commit_oid: ObjectId, tree_oid: ObjectId) -> anyhow::Result<()> {
        if self.emit(commit_oid) {
            self.add_tree(tree_oid)?;
        }

        Ok(())
    }

    fn add_tree(&mut self, tree_oid: ObjectId) -> anyhow::Result<()> {
        if !self.emit(tree_oid) {
            return Ok(());
        }

        let tree = self.database.load_tree(&tree_oid)?;
        for (_, entry) in tree.entries() {
            if entry.is_tree() {
                self.add_tree(entry.oid)?;
            } else {
                self.emit(entry.oid);
            }
        }

        Ok(())
    }

    fn emit(&mut self, oid: ObjectId) -> bool {
        if self.known.contains(&oid) || !self.emitted.insert(oid) {
            return false;
        }

        self.order.push(oid);
        true
    }

    pub fn into_ordered(self) -> Vec<ObjectId> {
        self.order
    }
}
