//! shoal: a content-addressed commit store with shallow history support
//!
//! Repositories keep loose objects, refs with compare-and-swap updates and a
//! set of shallow roots. Clone, fetch and push run over a [`Transport`] and
//! never look past a shallow root while negotiating what to send.
//!
//! [`Transport`]: artifacts::transport::Transport

pub mod areas;
pub mod artifacts;
pub mod commands;
pub mod errors;
