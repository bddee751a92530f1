//! Data structures and algorithms behind the repository operations
//!
//! - `branch`: Branch and ref names
//! - `database`: Objects in transferable, canonical form
//! - `graph`: Shallow-bounded commit graph queries
//! - `log`: Commit history traversal
//! - `merge`: Best common ancestor search
//! - `objects`: Object types (blob, tree, commit)
//! - `transfer`: Push and fetch negotiation
//! - `transport`: How a repository talks to its remotes

pub mod branch;
pub mod database;
pub mod graph;
pub mod log;
pub mod merge;
pub mod objects;
pub mod transfer;
pub mod transport;
