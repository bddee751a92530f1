use crate::artifacts::objects::OBJECT_ID_BYTES;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use anyhow::Result;
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::io::{BufRead, Write};
use std::path::PathBuf;

pub trait Packable {
    /// Encode the object body (everything after the `<type> <size>\0` header)
    fn serialize_body(&self) -> Result<Bytes>;
}

pub trait Unpackable {
    /// Decode an object body; the header has already been consumed
    fn deserialize(reader: impl BufRead) -> Result<Self>
    where
        Self: Sized;
}

pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    fn display(&self) -> String;

    /// Canonical encoding: `<type> <size>\0<body>`
    fn serialize(&self) -> Result<Bytes> {
        let body = self.serialize_body()?;

        let mut object_bytes = Vec::with_capacity(body.len() + 16);
        write!(object_bytes, "{} {}\0", self.object_type().as_str(), body.len())?;
        object_bytes.write_all(&body)?;

        Ok(Bytes::from(object_bytes))
    }

    fn object_id(&self) -> Result<ObjectId> {
        Ok(hash_object_bytes(&self.serialize()?))
    }

    fn object_path(&self) -> Result<PathBuf> {
        Ok(self.object_id()?.to_path())
    }
}

/// Hash an already-encoded object
pub fn hash_object_bytes(content: &[u8]) -> ObjectId {
    let mut hasher = Sha1::new();
    hasher.update(content);

    let mut digest = [0u8; OBJECT_ID_BYTES];
    digest.copy_from_slice(&hasher.finalize());
    ObjectId::from_bytes(digest)
}

/// Any object loaded back from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectBox {
    Blob(Box<Blob>),
    Tree(Box<Tree>),
    Commit(Box<Commit>),
}

impl ObjectBox {
    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectBox::Blob(_) => ObjectType::Blob,
            ObjectBox::Tree(_) => ObjectType::Tree,
            ObjectBox::Commit(_) => ObjectType::Commit,
        }
    }

    pub fn display(&self) -> String {
        match self {
            ObjectBox::Blob(blob) => blob.display(),
            ObjectBox::Tree(tree) => tree.display(),
            ObjectBox::Commit(commit) => commit.display(),
        }
    }

    pub fn object_id(&self) -> Result<ObjectId> {
        match self {
            ObjectBox::Blob(blob) => blob.object_id(),
            ObjectBox::Tree(tree) => tree.object_id(),
            ObjectBox::Commit(commit) => commit.object_id(),
        }
    }
}
