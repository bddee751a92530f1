//! Push and fetch negotiation
//!
//! - `advertisement`: the remote's refs and shallow roots, captured per call
//! - `negotiator`: decides which commits and objects a push must send
//! - `object_set`: expands commits into trees and blobs the peer lacks
//! - `request`: the messages exchanged with a transport
//! - `summary`: what a completed push or fetch changed

pub mod advertisement;
pub mod negotiator;
pub mod object_set;
pub mod request;
pub mod summary;
