//! Command implementations
//!
//! Commands are organized into two categories:
//!
//! - `plumbing`: Low-level commands over objects and the two sides of a
//!   transfer (hash-object, cat-file, merge-base, upload-pack, receive-pack)
//! - `porcelain`: User-facing workflows (init, clone, commit, fetch, push, log)
//!
//! Plumbing commands provide building blocks, while porcelain commands compose
//! them into higher-level operations.

pub mod plumbing;
pub mod porcelain;
