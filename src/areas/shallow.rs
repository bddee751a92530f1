//! Shallow boundary tracking
//!
//! A shallow clone holds only the most recent generations of history. The
//! commits at the cut are *shallow roots*: they are stored, but their parents
//! are intentionally absent. The tracker is the single authority on which
//! commits are roots; graph walks ask it for a [`Boundary`] tag instead of
//! guessing from whether a parent happens to resolve.
//!
//! ## File Format
//!
//! `.git/shallow` holds one 40-character hex id per line, sorted. The file is
//! absent when the repository has complete history.

use crate::areas::database::Database;
use crate::artifacts::objects::commit::Boundary;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::ShoalError;
use anyhow::Context;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Shallow {
    path: Box<Path>,
    roots: BTreeSet<ObjectId>,
}

impl Shallow {
    /// Load the root set persisted at `path`; a missing file is an empty set
    pub fn load(path: Box<Path>) -> anyhow::Result<Self> {
        let mut roots = BTreeSet::new();

        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read shallow file at {:?}", path))?;
            for line in content.lines().map(str::trim).filter(|line| !line.is_empty()) {
                roots.insert(
                    ObjectId::try_parse(line)
                        .with_context(|| format!("invalid shallow root in {:?}", path))?,
                );
            }
        }

        Ok(Shallow { path, roots })
    }

    pub fn roots(&self) -> &BTreeSet<ObjectId> {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn is_shallow_root(&self, oid: &ObjectId) -> bool {
        self.roots.contains(oid)
    }

    pub fn boundary_of(&self, oid: &ObjectId) -> Boundary {
        if self.is_shallow_root(oid) {
            Boundary::ShallowRoot
        } else {
            Boundary::Full
        }
    }

    /// Record `oid` as a shallow root
    ///
    /// The commit itself must be stored; only its parents may be missing.
    /// Returns whether the set changed.
    pub fn mark_shallow(&mut self, database: &Database, oid: ObjectId) -> anyhow::Result<bool> {
        self.mark_shallow_in(|oid| database.contains(oid), oid)
    }

    /// [`Shallow::mark_shallow`] against any view of the store, such as one
    /// that includes objects about to be written
    pub fn mark_shallow_in(
        &mut self,
        contains: impl Fn(&ObjectId) -> bool,
        oid: ObjectId,
    ) -> anyhow::Result<bool> {
        if !contains(&oid) {
            return Err(ShoalError::ObjectNotFound(oid).into());
        }

        Ok(self.roots.insert(oid))
    }

    /// Forget `oid` as a shallow root, once its parents have been fetched.
    /// Returns whether the set changed.
    pub fn unmark_shallow(&mut self, oid: &ObjectId) -> bool {
        self.roots.remove(oid)
    }

    /// Persist the root set atomically, removing the file when it is empty
    pub fn write(&self) -> anyhow::Result<()> {
        if self.roots.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path)
                    .with_context(|| format!("failed to remove shallow file at {:?}", self.path))?;
            }
            return Ok(());
        }

        let temp_path = self.path.with_extension("lock");
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .with_context(|| format!("failed to open shallow lock file at {:?}", temp_path))?;
        for root in &self.roots {
            writeln!(file, "{root}")?;
        }
        file.sync_all()?;

        std::fs::rename(&temp_path, &self.path)
            .with_context(|| format!("failed to replace shallow file at {:?}", self.path))?;

        tracing::debug!(roots = self.roots.len(), "wrote shallow file");
        Ok(())
    }
}
