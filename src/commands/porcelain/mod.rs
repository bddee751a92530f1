//! Porcelain commands (user-facing operations)
//!
//! Porcelain commands compose the object store, refs, shallow boundary and
//! transfer machinery into the workflows a user runs.
//!
//! ## Commands
//!
//! - `init`: Initialize a new repository
//! - `clone`: Copy a remote branch, optionally truncated to a depth
//! - `commit`: Append a commit, optionally advancing a branch
//! - `fetch`: Bring a remote branch up to date, deepening if asked
//! - `push`: Publish a local branch to a remote
//! - `log`: Show commit history down to the shallow boundary

pub mod clone;
pub mod commit;
pub mod fetch;
pub mod init;
pub mod log;
pub mod push;
