//! How a repository talks to its remotes
//!
//! ```text
//! Transport (trait) --> LocalTransport (repository directory on this machine)
//! ```
//!
//! A transport moves ref advertisements, fetch requests and packed objects. It
//! never negotiates: deciding what to send happens on either end, and the
//! remote applies a push atomically or not at all.

pub mod local;

use crate::artifacts::database::packed_object::PackedObject;
use crate::artifacts::transfer::advertisement::RemoteAdvertisement;
use crate::artifacts::transfer::request::{FetchRequest, FetchResponse, RefUpdate};
use crate::errors::{ShoalError, ShoalResult};
use local::LocalTransport;
use std::path::PathBuf;

const FILE_SCHEME: &str = "file://";

pub trait Transport {
    /// Snapshot the remote's branch refs and shallow roots
    fn advertise_refs(&self) -> ShoalResult<RemoteAdvertisement>;

    /// Store `objects` on the remote and apply `update` with compare-and-swap
    ///
    /// # Errors
    ///
    /// [`ShoalError::StaleRef`] when the remote ref no longer holds
    /// `update.old`; the remote is left unchanged on every error.
    fn send_objects(&self, update: &RefUpdate, objects: Vec<PackedObject>) -> ShoalResult<()>;

    /// Ask the remote for the objects answering `request`
    fn fetch_objects(&self, request: &FetchRequest) -> ShoalResult<FetchResponse>;
}

/// Open a transport for `url`
///
/// Plain paths and `file://` URLs are served by [`LocalTransport`].
pub fn connect(url: &str) -> ShoalResult<Box<dyn Transport>> {
    if url.contains("://") && !url.starts_with(FILE_SCHEME) {
        return Err(ShoalError::Other(anyhow::anyhow!(
            "unsupported remote url: {url}"
        )));
    }

    let path = PathBuf::from(url.trim_start_matches(FILE_SCHEME));
    Ok(Box::new(LocalTransport::new(path.into_boxed_path())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_urls_other_than_files_are_rejected() {
        let error = connect("https://example.com/repo").err().unwrap();

        assert!(matches!(error, ShoalError::Other(_)));
    }

    #[test]
    fn plain_paths_and_file_urls_connect() {
        assert!(connect("/srv/repo").is_ok());
        assert!(connect("file:///srv/repo").is_ok());
    }
}
