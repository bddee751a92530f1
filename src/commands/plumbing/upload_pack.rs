//! Serving side of clone and fetch
//!
//! Runs on the remote repository. Works out which commits the client lacks,
//! where the client's new shallow boundary falls, and which trees and blobs
//! have to travel with the commits.
//!
//! ## Depth
//!
//! A want counts as generation 1. With a depth limit, commits at the limit
//! that have parents become shallow roots on the client. Commits the client
//! already holds with full ancestry are walked through but never sent and
//! never reported as roots, so a fetch can only move the boundary deeper.

use crate::areas::repository::Repository;
use crate::artifacts::branch::HEADS_PREFIX;
use crate::artifacts::database::packed_object::PackedObject;
use crate::artifacts::graph::CommitGraph;
use crate::artifacts::objects::commit::SlimCommit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::transfer::advertisement::RemoteAdvertisement;
use crate::artifacts::transfer::object_set::ObjectSet;
use crate::artifacts::transfer::request::{FetchRequest, FetchResponse};
use crate::errors::{ShoalError, ShoalResult};
use std::collections::{BTreeSet, HashSet, VecDeque};

impl Repository {
    /// Branch refs, the branch HEAD points at, and this repository's shallow roots
    pub fn advertise_refs(&self) -> ShoalResult<RemoteAdvertisement> {
        let refs = self.refs().list_refs(HEADS_PREFIX.trim_end_matches('/'))?;
        let current = self.refs().current_ref()?;
        let head = current.branch_name().map(|_| current);

        Ok(RemoteAdvertisement {
            refs,
            shallow: self.shallow().roots().clone(),
            head,
        })
    }

    pub fn upload_pack(&self, request: &FetchRequest) -> ShoalResult<FetchResponse> {
        for want in &request.wants {
            if !self.database().contains(want) {
                return Err(ShoalError::ObjectNotFound(*want));
            }
        }

        let client_roots = request.shallows.iter().copied().collect::<BTreeSet<_>>();
        let client_known = self.client_known_commits(request, &client_roots)?;
        let graph = self.graph();

        let mut sent = Vec::new();
        let mut new_roots = BTreeSet::new();
        let mut unshallow = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut queue = request
            .wants
            .iter()
            .map(|want| (*want, 1u32))
            .collect::<VecDeque<_>>();

        while let Some((oid, generation)) = queue.pop_front() {
            if !visited.insert(oid) {
                continue;
            }
            let known = client_known.contains(&oid);
            if known && !request.deepens() {
                continue;
            }

            let commit = graph.commit(&oid)?;
            if !known {
                sent.push(commit.clone());
            }

            let at_limit = request
                .depth_limit()
                .is_some_and(|limit| generation >= limit);
            if at_limit || commit.is_shallow_root() {
                let client_has_full_ancestry = known && !client_roots.contains(&oid);
                if !commit.parents.is_empty() && !client_has_full_ancestry {
                    new_roots.insert(oid);
                }
                continue;
            }

            if client_roots.contains(&oid) && !commit.parents.is_empty() {
                unshallow.insert(oid);
            }
            for parent in commit.walkable_parents() {
                queue.push_back((*parent, generation + 1));
            }
        }

        sent.sort_by(|a, b| b.cmp(a));
        let objects = self.pack_for_client(&sent, &client_known)?;

        tracing::info!(
            commits = sent.len(),
            objects = objects.len(),
            shallow = new_roots.len(),
            unshallow = unshallow.len(),
            "serving fetch"
        );

        Ok(FetchResponse {
            objects,
            shallow: new_roots.into_iter().collect(),
            unshallow: unshallow.into_iter().collect(),
        })
    }

    /// Commits the client holds: the ancestry of its haves, cut at its roots
    fn client_known_commits(
        &self,
        request: &FetchRequest,
        client_roots: &BTreeSet<ObjectId>,
    ) -> ShoalResult<HashSet<ObjectId>> {
        let bounds = client_roots
            .iter()
            .chain(self.shallow().roots().iter())
            .copied();
        let client_graph = CommitGraph::new(self.database(), bounds);

        let mut known = HashSet::new();
        for have in &request.haves {
            if !self.database().contains(have) || known.contains(have) {
                continue;
            }
            for commit in client_graph.ancestors(*have) {
                known.insert(commit?.oid);
            }
        }
        known.extend(
            client_roots
                .iter()
                .filter(|root| self.database().contains(root)),
        );

        Ok(known)
    }

    fn pack_for_client(
        &self,
        sent: &[SlimCommit],
        client_known: &HashSet<ObjectId>,
    ) -> ShoalResult<Vec<PackedObject>> {
        let mut objects = ObjectSet::new(self.database());

        let edges = sent
            .iter()
            .flat_map(|commit| commit.parents.iter())
            .filter(|parent| client_known.contains(parent))
            .copied()
            .collect::<BTreeSet<_>>();
        for edge in edges {
            let edge = self.database().load_commit(&edge)?;
            objects.mark_known_tree(*edge.tree_oid())?;
        }
        for commit in sent {
            objects.add_commit(commit.oid, commit.tree_oid)?;
        }

        objects
            .into_ordered()
            .iter()
            .map(|oid| Ok(self.database().load_packed(oid)?))
            .collect()
    }
}
