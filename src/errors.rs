//! Typed failures surfaced by the store and by push/fetch negotiation
//!
//! Storage internals propagate `anyhow::Error` with context, the same way the
//! object database always has. Anything that crosses a repository operation
//! boundary is converted into a [`ShoalError`], recovering the typed variant
//! when one was raised deeper in the call stack.
//!
//! ```text
//!                      ShoalError
//!                          |
//!   +-----------+----------+----------+-----------+----------+
//!   |           |          |          |           |          |
//! ObjectNot  Insufficient Diverged  RefNotFound StaleRef  Cancelled
//! Found      History      History
//!   (corruption) (deepen + retry) (force)  (create)  (refresh + retry)
//! ```

use crate::artifacts::objects::object_id::ObjectId;
use thiserror::Error;

/// Result type using [`ShoalError`].
pub type ShoalResult<T> = std::result::Result<T, ShoalError>;

#[derive(Debug, Error)]
pub enum ShoalError {
    /// The object store has no entry for the given id.
    ///
    /// Escaping a push negotiation this always means a corrupt store: the
    /// negotiator never asks for objects it knows are absent.
    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),

    /// A local shallow root cuts off ancestry the negotiation would need.
    #[error(
        "cannot push {ref_name}: shallow root {shallow_root} is not known to the remote, \
         deepen the clone and retry"
    )]
    InsufficientHistory {
        ref_name: String,
        shallow_root: ObjectId,
    },

    /// The remote tip is not an ancestor of the pushed commit.
    #[error("cannot push {ref_name}: remote tip {} is not an ancestor of {local}", display_tip(.remote))]
    DivergedHistory {
        ref_name: String,
        local: ObjectId,
        remote: Option<ObjectId>,
    },

    #[error("ref {ref_name} not found")]
    RefNotFound { ref_name: String },

    /// Compare-and-swap on a ref lost a race.
    #[error("ref {ref_name} is stale: expected {}, found {}", display_tip(.expected), display_tip(.actual))]
    StaleRef {
        ref_name: String,
        expected: Option<ObjectId>,
        actual: Option<ObjectId>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("corrupt object {oid}: {reason}")]
    CorruptObject { oid: ObjectId, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(anyhow::Error),
}

fn display_tip(tip: &Option<ObjectId>) -> String {
    match tip {
        Some(oid) => oid.to_short_oid(),
        None => "(none)".to_string(),
    }
}

impl ShoalError {
    /// Whether deepening the local history and retrying could succeed.
    pub fn needs_more_history(&self) -> bool {
        matches!(self, ShoalError::InsufficientHistory { .. })
    }

    /// Whether refreshing the remote-tracking refs and retrying could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ShoalError::StaleRef { .. })
    }
}

impl From<anyhow::Error> for ShoalError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<ShoalError>() {
            Ok(typed) => typed,
            Err(error) => match error.downcast::<std::io::Error>() {
                Ok(io) => ShoalError::Io(io),
                Err(error) => ShoalError::Other(error),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn oid(byte: u8) -> ObjectId {
        ObjectId::from_bytes([byte; 20])
    }

    #[test]
    fn typed_error_survives_anyhow_round_trip() {
        let wrapped = anyhow::Error::new(ShoalError::ObjectNotFound(oid(1)))
            .context("Unable to load parent commit");

        let recovered = ShoalError::from(wrapped);

        assert!(matches!(recovered, ShoalError::ObjectNotFound(found) if found == oid(1)));
    }

    #[test]
    fn untyped_error_becomes_other() {
        let recovered = ShoalError::from(anyhow::anyhow!("disk on fire"));

        assert!(matches!(recovered, ShoalError::Other(_)));
    }

    #[test]
    fn stale_ref_message_names_both_tips() {
        let error = ShoalError::StaleRef {
            ref_name: "refs/remotes/origin/master".to_string(),
            expected: Some(oid(0xab)),
            actual: None,
        };

        assert_eq!(
            error.to_string(),
            "ref refs/remotes/origin/master is stale: expected abababa, found (none)"
        );
        assert!(error.is_retryable());
        assert!(!error.needs_more_history());
    }
}
