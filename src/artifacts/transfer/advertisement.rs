use crate::artifacts::branch::branch_name::RefName;
use crate::artifacts::objects::object_id::ObjectId;
use std::collections::{BTreeMap, BTreeSet};

/// Snapshot of a remote's refs and shallow roots
///
/// Taken fresh for every push or fetch and never cached: a negotiation that
/// runs against a stale advertisement is caught by the remote's
/// compare-and-swap on the updated ref.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteAdvertisement {
    pub refs: BTreeMap<RefName, ObjectId>,
    pub shallow: BTreeSet<ObjectId>,
    /// Branch the remote's HEAD points at, if any
    pub head: Option<RefName>,
}

impl RemoteAdvertisement {
    pub fn tip(&self, ref_name: &RefName) -> Option<ObjectId> {
        self.refs.get(ref_name).copied()
    }

    pub fn tips(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.refs.values().copied()
    }
}
