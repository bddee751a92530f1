//! Object types and their canonical encoding
//!
//! All content is stored as immutable objects identified by the SHA-1 hash of
//! their canonical encoding. There are three kinds:
//!
//! - **Blob**: opaque file content
//! - **Tree**: directory listing (names, modes and object ids)
//! - **Commit**: snapshot with metadata (tree, parents, author, message)
//!
//! Every object serializes to `<type> <size>\0<content>`; the id is the hash
//! of exactly those bytes, so equal encodings always share one id.

pub mod blob;
pub mod commit;
pub mod entry_mode;
pub mod object;
pub mod object_id;
pub mod object_type;
pub mod tree;

/// Length of a SHA-1 hash in hexadecimal format
pub const OBJECT_ID_LENGTH: usize = 40;

/// Length of a SHA-1 hash in raw bytes
pub const OBJECT_ID_BYTES: usize = 20;
