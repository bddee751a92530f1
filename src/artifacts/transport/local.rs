use crate::areas::repository::Repository;
use crate::artifacts::database::packed_object::PackedObject;
use crate::artifacts::transfer::advertisement::RemoteAdvertisement;
use crate::artifacts::transfer::request::{FetchRequest, FetchResponse, RefUpdate};
use crate::artifacts::transport::Transport;
use crate::errors::ShoalResult;
use derive_new::new;
use std::path::Path;

/// Transport to a repository directory on the same machine
///
/// The remote repository is opened afresh on every call, so each call sees
/// the remote's current state and takes the remote's own lock for writes.
#[derive(Debug, Clone, new)]
pub struct LocalTransport {
    path: Box<Path>,
}

impl LocalTransport {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> ShoalResult<Repository> {
        Ok(Repository::open(&self.path, Box::new(std::io::sink()))?)
    }
}

impl Transport for LocalTransport {
    fn advertise_refs(&self) -> ShoalResult<RemoteAdvertisement> {
        self.open()?.advertise_refs()
    }

    fn send_objects(&self, update: &RefUpdate, objects: Vec<PackedObject>) -> ShoalResult<()> {
        tracing::debug!(
            remote = %self.path.display(),
            ref_name = %update.ref_name,
            objects = objects.len(),
            "sending objects"
        );
        self.open()?.receive_pack(update, objects)
    }

    fn fetch_objects(&self, request: &FetchRequest) -> ShoalResult<FetchResponse> {
        tracing::debug!(
            remote = %self.path.display(),
            wants = request.wants.len(),
            haves = request.haves.len(),
            depth = ?request.depth,
            "fetching objects"
        );
        self.open()?.upload_pack(request)
    }
}
