use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::{ObjectBox, Unpackable, hash_object_bytes};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use crate::errors::ShoalError;
use bytes::Bytes;
use derive_new::new;
use std::io::Cursor;

/// An object in its canonical encoding, paired with the id it claims
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct PackedObject {
    pub oid: ObjectId,
    pub data: Bytes,
}

impl PackedObject {
    /// Re-hash the payload and decode it, rejecting anything that does not
    /// match its claimed id or is not a well-formed object
    pub fn verify(&self) -> Result<ObjectBox, ShoalError> {
        let actual = hash_object_bytes(&self.data);
        if actual != self.oid {
            return Err(ShoalError::CorruptObject {
                oid: self.oid,
                reason: format!("content hashes to {actual}"),
            });
        }

        self.decode().map_err(|error| ShoalError::CorruptObject {
            oid: self.oid,
            reason: error.to_string(),
        })
    }

    fn decode(&self) -> anyhow::Result<ObjectBox> {
        let mut reader = Cursor::new(self.data.clone());
        let (object_type, size) = ObjectType::parse_header(&mut reader)?;

        let body_len = self.data.len() - reader.position() as usize;
        if body_len != size {
            anyhow::bail!("declared size {size} but body has {body_len} bytes");
        }

        Ok(match object_type {
            ObjectType::Blob => ObjectBox::Blob(Box::new(Blob::deserialize(reader)?)),
            ObjectType::Tree => ObjectBox::Tree(Box::new(Tree::deserialize(reader)?)),
            ObjectType::Commit => ObjectBox::Commit(Box::new(Commit::deserialize(reader)?)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::object::Object;

    #[test]
    fn accepts_matching_payload() {
        let blob = Blob::from("payload");
        let packed = PackedObject::new(blob.object_id().unwrap(), blob.serialize().unwrap());

        assert_eq!(packed.verify().unwrap(), ObjectBox::Blob(Box::new(blob)));
    }

    #[test]
    fn rejects_payload_under_wrong_id() {
        let blob = Blob::from("payload");
        let other = Blob::from("other").object_id().unwrap();
        let packed = PackedObject::new(other, blob.serialize().unwrap());

        assert!(matches!(
            packed.verify(),
            Err(ShoalError::CorruptObject { oid, .. }) if oid == other
        ));
    }

    #[test]
    fn rejects_size_mismatch() {
        let data = Bytes::from_static(b"blob 10\0short");
        let packed = PackedObject::new(hash_object_bytes(&data), data);

        assert!(matches!(packed.verify(), Err(ShoalError::CorruptObject { .. })));
    }

    #[test]
    fn rejects_commit_with_malformed_author() {
        let body = format!(
            "tree {}\nauthor Ada <ada@example.com> 1700000000 +aé1\ncommitter Ada <ada@example.com> 1700000000 +aé1\n\nmessage\n",
            ObjectId::from_bytes([1; 20])
        );
        let data = Bytes::from(format!("commit {}\0{body}", body.len()).into_bytes());
        let packed = PackedObject::new(hash_object_bytes(&data), data);

        assert!(matches!(packed.verify(), Err(ShoalError::CorruptObject { .. })));
    }
}
