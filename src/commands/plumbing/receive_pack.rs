//! Receiving side of push
//!
//! Applied on the remote repository under its writer lock, in this order:
//!
//! 1. the ref must still hold the value the pusher based its work on
//! 2. every object must hash to its claimed id and decode
//! 3. every reference out of a received object must resolve, in the store or
//!    among the received objects
//! 4. objects are written, then the ref is advanced
//!
//! Nothing is written before all checks pass, and the ref is the last thing
//! to change, so a failed push never leaves the ref pointing at missing data.

use crate::areas::repository::Repository;
use crate::artifacts::database::packed_object::PackedObject;
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::transfer::request::RefUpdate;
use crate::errors::{ShoalError, ShoalResult};
use std::collections::HashMap;

impl Repository {
    pub fn receive_pack(&mut self, update: &RefUpdate, objects: Vec<PackedObject>) -> ShoalResult<()> {
        let _lock = self.lock()?;

        let actual = self.refs().read_ref(&update.ref_name)?;
        if actual != update.old {
            tracing::warn!(
                ref_name = %update.ref_name,
                expected = ?update.old,
                actual = ?actual,
                "rejecting push based on a stale ref"
            );
            return Err(ShoalError::StaleRef {
                ref_name: update.ref_name.to_string(),
                expected: update.old,
                actual,
            });
        }

        let received = objects
            .iter()
            .map(|packed| Ok((packed.oid, packed.verify()?)))
            .collect::<ShoalResult<HashMap<_, _>>>()?;
        self.check_connectivity(update, &received)?;

        for packed in &objects {
            self.database().store_packed(packed)?;
        }
        self.refs()
            .advance(&update.ref_name, update.old, update.new, "push")?;

        tracing::info!(
            ref_name = %update.ref_name,
            new = %update.new,
            objects = objects.len(),
            "accepted push"
        );
        Ok(())
    }

    fn check_connectivity(
        &self,
        update: &RefUpdate,
        received: &HashMap<ObjectId, ObjectBox>,
    ) -> ShoalResult<()> {
        let resolves = |oid: &ObjectId| received.contains_key(oid) || self.database().contains(oid);

        let tip_type = match received.get(&update.new) {
            Some(object) => object.object_type(),
            None if self.database().contains(&update.new) => {
                self.database().get_object_type(&update.new)?
            }
            None => return Err(ShoalError::ObjectNotFound(update.new)),
        };
        if tip_type != ObjectType::Commit {
            return Err(ShoalError::CorruptObject {
                oid: update.new,
                reason: format!("ref {} must point at a commit", update.ref_name),
            });
        }

        for object in received.values() {
            let references = match object {
                ObjectBox::Blob(_) => Vec::new(),
                ObjectBox::Tree(tree) => tree.entries().map(|(_, entry)| entry.oid).collect(),
                ObjectBox::Commit(commit) => std::iter::once(*commit.tree_oid())
                    .chain(commit.parents().iter().copied())
                    .collect(),
            };
            if let Some(missing) = references.into_iter().find(|oid| !resolves(oid)) {
                return Err(ShoalError::ObjectNotFound(missing));
            }
        }

        Ok(())
    }
}
