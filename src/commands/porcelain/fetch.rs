//! Fetch: bring a remote branch and its history into this repository
//!
//! ## Shallow boundary
//!
//! The boundary only moves deeper. A commit already held with full ancestry
//! never becomes a shallow root again, and a root is only dropped once all
//! of its parents are stored.
//!
//! ## Ordering
//!
//! Every received object is verified and the received history is checked for
//! completeness down to the new boundary before anything is written. Then the
//! objects are stored, the remote-tracking ref moves and the shallow file is
//! rewritten. If the shallow file cannot be written, the ref move is rolled
//! back.

use crate::areas::database::Database;
use crate::areas::repository::Repository;
use crate::areas::shallow::Shallow;
use crate::artifacts::branch::branch_name::{BranchName, RefName};
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::transfer::advertisement::RemoteAdvertisement;
use crate::artifacts::transfer::request::{FetchRequest, FetchResponse};
use crate::artifacts::transfer::summary::TransferSummary;
use crate::artifacts::transport::{self, Transport};
use crate::errors::{ShoalError, ShoalResult};
use std::collections::{BTreeSet, HashMap, HashSet};

/// The local store as it would look with the received objects added
struct Staged<'d> {
    database: &'d Database,
    received: HashMap<ObjectId, ObjectBox>,
}

impl Staged<'_> {
    fn contains(&self, oid: &ObjectId) -> bool {
        self.received.contains_key(oid) || self.database.contains(oid)
    }

    fn is_received(&self, oid: &ObjectId) -> bool {
        self.received.contains_key(oid)
    }

    fn commit(&self, oid: &ObjectId) -> ShoalResult<Commit> {
        match self.received.get(oid) {
            Some(ObjectBox::Commit(commit)) => Ok(commit.as_ref().clone()),
            Some(_) => Err(ShoalError::CorruptObject {
                oid: *oid,
                reason: "expected a commit".to_string(),
            }),
            None if self.database.contains(oid) => Ok(self.database.load_commit(oid)?),
            None => Err(ShoalError::ObjectNotFound(*oid)),
        }
    }
}

struct BoundaryUpdate {
    shallow: Shallow,
    added: Vec<ObjectId>,
    removed: Vec<ObjectId>,
}

impl Repository {
    /// Fetch `branch` from the configured `remote` into
    /// `refs/remotes/<remote>/<branch>`
    ///
    /// `depth`: `None` fetches what is new and keeps the current boundary,
    /// `Some(0)` completes the history and `Some(n)` keeps `n` commits.
    pub fn fetch(
        &mut self,
        remote: &str,
        branch: &BranchName,
        depth: Option<u32>,
    ) -> ShoalResult<TransferSummary> {
        let url = self.config().remote_url(remote)?.to_string();
        let transport = transport::connect(&url)?;

        let summary = self.fetch_with(transport.as_ref(), remote, branch, depth)?;

        writeln!(self.writer(), "From {url}")?;
        writeln!(self.writer(), "{}", summary.display(branch.as_ref()))?;
        Ok(summary)
    }

    pub fn fetch_with(
        &mut self,
        transport: &dyn Transport,
        remote: &str,
        branch: &BranchName,
        depth: Option<u32>,
    ) -> ShoalResult<TransferSummary> {
        let _lock = self.lock()?;
        let advertisement = transport.advertise_refs()?;

        self.fetch_advertised(transport, &advertisement, remote, branch, depth)
    }

    /// The fetch proper; the caller holds the repository lock
    pub(crate) fn fetch_advertised(
        &mut self,
        transport: &dyn Transport,
        advertisement: &RemoteAdvertisement,
        remote: &str,
        branch: &BranchName,
        depth: Option<u32>,
    ) -> ShoalResult<TransferSummary> {
        let remote_ref = RefName::branch(branch);
        let tip = advertisement
            .tip(&remote_ref)
            .ok_or_else(|| ShoalError::RefNotFound {
                ref_name: remote_ref.to_string(),
            })?;
        let tracking = RefName::remote_tracking(remote, branch);
        let old_tip = self.refs().read_ref(&tracking)?;

        let request = FetchRequest {
            wants: vec![tip],
            haves: self.local_tips()?,
            shallows: self.shallow().roots().iter().copied().collect(),
            depth,
        };
        tracing::debug!(
            remote,
            ref_name = %remote_ref,
            tip = %tip,
            haves = request.haves.len(),
            depth = ?depth,
            "requesting objects"
        );
        let response = transport.fetch_objects(&request)?;

        // decided before anything new is stored
        let held_with_ancestry = response
            .shallow
            .iter()
            .filter(|oid| self.database().contains(oid) && !self.shallow().is_shallow_root(oid))
            .copied()
            .collect::<HashSet<_>>();

        let received = response
            .objects
            .iter()
            .map(|packed| Ok((packed.oid, packed.verify()?)))
            .collect::<ShoalResult<HashMap<_, _>>>()?;
        let staged = Staged {
            database: self.database(),
            received,
        };

        let BoundaryUpdate {
            shallow,
            added,
            removed,
        } = self.next_boundary(&staged, &response, &held_with_ancestry)?;
        check_complete(&staged, tip, shallow.roots())?;

        for packed in &response.objects {
            self.database().store_packed(packed)?;
        }

        if old_tip != Some(tip) {
            self.refs()
                .advance(&tracking, old_tip, tip, &format!("fetch: {remote}/{branch}"))?;
        }
        if !added.is_empty() || !removed.is_empty() {
            if let Err(error) = shallow.write() {
                if old_tip != Some(tip) {
                    self.refs().rollback(&tracking)?;
                }
                return Err(error.into());
            }
            tracing::info!(added = added.len(), removed = removed.len(), "moved shallow boundary");
        }
        *self.shallow_mut() = shallow;

        Ok(TransferSummary {
            ref_name: tracking,
            old_tip,
            new_tip: tip,
            objects: response.objects.iter().map(|packed| packed.oid).collect(),
            shallow_added: added,
            shallow_removed: removed,
        })
    }

    /// Every ref target, as the haves of a fetch request
    fn local_tips(&self) -> ShoalResult<Vec<ObjectId>> {
        Ok(self
            .refs()
            .list_refs("refs")?
            .into_values()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }

    fn next_boundary(
        &self,
        staged: &Staged<'_>,
        response: &FetchResponse,
        held_with_ancestry: &HashSet<ObjectId>,
    ) -> ShoalResult<BoundaryUpdate> {
        let mut shallow = self.shallow().clone();
        let mut added = Vec::new();
        let mut removed = Vec::new();

        for root in &response.shallow {
            if held_with_ancestry.contains(root) {
                tracing::debug!(commit = %root, "keeping full history, not marking shallow");
                continue;
            }
            if shallow.mark_shallow_in(|oid| staged.contains(oid), *root)? {
                added.push(*root);
            }
        }
        for root in &response.unshallow {
            let commit = staged.commit(root)?;
            let complete = commit.parents().iter().all(|parent| staged.contains(parent));
            if complete && shallow.unmark_shallow(root) {
                removed.push(*root);
            }
        }

        Ok(BoundaryUpdate {
            shallow,
            added,
            removed,
        })
    }
}

/// Walk from `tip` down to `roots`, failing on the first missing commit or
/// missing tree of a received commit
fn check_complete(staged: &Staged<'_>, tip: ObjectId, roots: &BTreeSet<ObjectId>) -> ShoalResult<()> {
    let mut pending = vec![tip];
    let mut seen = HashSet::from([tip]);

    while let Some(oid) = pending.pop() {
        let commit = staged.commit(&oid)?;
        if staged.is_received(&oid) && !staged.contains(commit.tree_oid()) {
            return Err(ShoalError::ObjectNotFound(*commit.tree_oid()));
        }
        if roots.contains(&oid) {
            continue;
        }

        for parent in commit.parents() {
            if seen.insert(*parent) {
                pending.push(*parent);
            }
        }
    }

    Ok(())
}
