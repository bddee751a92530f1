//! Commit history traversal
//!
//! - `rev_list`: lazy, timestamp-ordered ancestor walk bounded by shallow roots
//!
//! ## Algorithm
//!
//! The traversal uses a priority queue ordered by commit timestamp (newest
//! first, ties by ascending id), so merges interleave their branches the way
//! `git log` presents them. Each commit is yielded once.

pub mod rev_list;
