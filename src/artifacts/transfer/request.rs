use crate::artifacts::branch::branch_name::RefName;
use crate::artifacts::database::packed_object::PackedObject;
use crate::artifacts::objects::object_id::ObjectId;
use derive_new::new;

/// Ref update a push asks the remote to apply
///
/// `old` is the value the remote must still hold; `None` creates the ref.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct RefUpdate {
    pub ref_name: RefName,
    pub old: Option<ObjectId>,
    pub new: ObjectId,
}

/// What a fetching client asks the serving side for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    /// Tips the client wants
    pub wants: Vec<ObjectId>,
    /// Tips the client already holds, with their ancestry down to its shallow roots
    pub haves: Vec<ObjectId>,
    /// The client's shallow roots
    pub shallows: Vec<ObjectId>,
    /// `None` fetches what is new and keeps the client's boundary, `Some(0)`
    /// fetches complete history and `Some(n)` keeps `n` commits per want
    pub depth: Option<u32>,
}

impl FetchRequest {
    pub fn deepens(&self) -> bool {
        self.depth.is_some()
    }

    /// Generation limit, counting a want as generation 1
    pub fn depth_limit(&self) -> Option<u32> {
        self.depth.filter(|depth| *depth > 0)
    }
}

/// Objects the serving side sends back, plus boundary changes
#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    pub objects: Vec<PackedObject>,
    /// Commits that become shallow roots on the client
    pub shallow: Vec<ObjectId>,
    /// Client shallow roots whose parents are now included
    pub unshallow: Vec<ObjectId>,
}
