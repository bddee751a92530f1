//! Core repository components
//!
//! - `database`: content-addressable object store for blobs, trees and commits
//! - `shallow`: the set of shallow roots of a depth-limited clone
//! - `refs`: branches, remote-tracking refs and HEAD, with compare-and-swap updates
//! - `config`: repository configuration (default branch, remotes)
//! - `repository`: ties the above together and owns the writer lock

pub mod config;
pub mod database;
pub mod refs;
pub mod repository;
pub mod shallow;
