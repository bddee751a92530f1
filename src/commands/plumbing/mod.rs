//! Plumbing commands (low-level operations)
//!
//! Building blocks for scripting and for the porcelain commands.
//!
//! ## Commands
//!
//! - `cat-file`: Print a stored object
//! - `hash-object`: Compute a blob id and optionally store the blob
//! - `merge-base`: Best common ancestor of two commits
//! - `upload-pack`: Serve a fetch from this repository
//! - `receive-pack`: Apply a push to this repository

pub mod cat_file;
pub mod hash_object;
pub mod merge_base;
pub mod receive_pack;
pub mod upload_pack;
