use pretty_assertions::assert_eq;
use rstest::rstest;
use shoal::areas::config::DEFAULT_REMOTE;
use shoal::artifacts::branch::branch_name::{BranchName, RefName};
use bytes::Bytes;
use shoal::artifacts::database::packed_object::PackedObject;
use shoal::artifacts::objects::object_id::ObjectId;
use shoal::artifacts::transfer::advertisement::RemoteAdvertisement;
use shoal::artifacts::transfer::request::{FetchRequest, FetchResponse, RefUpdate};
use shoal::artifacts::transport::Transport;
use shoal::artifacts::transport::local::LocalTransport;
use shoal::errors::{ShoalError, ShoalResult};
use std::collections::BTreeSet;

mod common;
use common::sandbox::{Sandbox, commit_file, history, introduced, master, master_ref, sandbox, tip};

fn tracking() -> RefName {
    RefName::remote_tracking(DEFAULT_REMOTE, &master())
}

/// Serves a real repository but appends an object whose payload does not
/// hash to its id
struct TamperingTransport {
    inner: LocalTransport,
}

impl Transport for TamperingTransport {
    fn advertise_refs(&self) -> ShoalResult<RemoteAdvertisement> {
        self.inner.advertise_refs()
    }

    fn send_objects(&self, update: &RefUpdate, objects: Vec<PackedObject>) -> ShoalResult<()> {
        self.inner.send_objects(update, objects)
    }

    fn fetch_objects(&self, request: &FetchRequest) -> ShoalResult<FetchResponse> {
        let mut response = self.inner.fetch_objects(request)?;
        response.objects.push(PackedObject::new(
            ObjectId::from_bytes([7; 20]),
            Bytes::from_static(b"blob 3\0bye"),
        ));
        Ok(response)
    }
}

#[rstest]
fn shallow_clone_keeps_only_the_requested_generations(sandbox: Sandbox) {
    let (_, upstream) = sandbox.upstream("upstream", 5);

    let local = sandbox.clone("upstream", "local", Some(2));

    assert_eq!(local.shallow().roots(), &BTreeSet::from([upstream[3]]));
    assert_eq!(history(&local, upstream[4]), vec![upstream[4], upstream[3]]);
    assert!(!local.database().contains(&upstream[2]));
    assert_eq!(tip(&local, &master_ref()), Some(upstream[4]));
    assert_eq!(tip(&local, &tracking()), Some(upstream[4]));
}

#[rstest]
fn linear_deepening_moves_the_single_root_down(sandbox: Sandbox) {
    let (_, upstream) = sandbox.upstream("upstream", 5);
    let mut local = sandbox.clone("upstream", "local", Some(1));

    for depth in 2..=4u32 {
        let summary = local.fetch(DEFAULT_REMOTE, &master(), Some(depth)).unwrap();

        let expected_root = upstream[5 - depth as usize];
        assert_eq!(local.shallow().roots(), &BTreeSet::from([expected_root]));
        assert_eq!(summary.shallow_added, vec![expected_root]);
        assert_eq!(summary.shallow_removed.len(), 1);
        assert!(local.database().contains(&expected_root));
    }
}

#[rstest]
fn full_depth_fetch_empties_the_root_set(sandbox: Sandbox) {
    let (_, upstream) = sandbox.upstream("upstream", 4);
    let mut local = sandbox.clone("upstream", "local", Some(1));

    let summary = local.fetch(DEFAULT_REMOTE, &master(), Some(0)).unwrap();

    assert!(local.shallow().is_empty());
    assert!(summary.shallow_added.is_empty());
    assert_eq!(summary.shallow_removed, vec![upstream[3]]);
    assert_eq!(history(&local, upstream[3]).len(), 4);
    assert!(!local.path().join(".git").join("shallow").exists());
}

#[rstest]
fn commits_held_with_full_ancestry_never_become_roots(sandbox: Sandbox) {
    let (_, upstream) = sandbox.upstream("upstream", 4);
    let mut local = sandbox.clone("upstream", "local", None);

    let summary = local.fetch(DEFAULT_REMOTE, &master(), Some(1)).unwrap();

    assert!(local.shallow().is_empty());
    assert!(summary.shallow_added.is_empty());
    assert_eq!(history(&local, upstream[3]).len(), 4);
}

#[rstest]
fn plain_fetch_keeps_the_boundary(sandbox: Sandbox) {
    let (mut upstream_repository, upstream) = sandbox.upstream("upstream", 3);
    let mut local = sandbox.clone("upstream", "local", Some(1));
    let c4 = commit_file(&mut upstream_repository, "c4.txt", "content 4", 4);

    let summary = local.fetch(DEFAULT_REMOTE, &master(), None).unwrap();

    assert_eq!(summary.old_tip, Some(upstream[2]));
    assert_eq!(summary.new_tip, c4);
    assert_eq!(local.shallow().roots(), &BTreeSet::from([upstream[2]]));
    assert_eq!(tip(&local, &tracking()), Some(c4));
    // the local branch only moves by commit or clone
    assert_eq!(tip(&local, &master_ref()), Some(upstream[2]));
}

#[rstest]
fn refetching_an_unchanged_branch_is_up_to_date(sandbox: Sandbox) {
    sandbox.upstream("upstream", 2);
    let mut local = sandbox.clone("upstream", "local", Some(1));

    let summary = local.fetch(DEFAULT_REMOTE, &master(), None).unwrap();

    assert!(summary.is_up_to_date());
}

#[rstest]
fn fetching_an_unknown_branch_fails(sandbox: Sandbox) {
    sandbox.upstream("upstream", 1);
    let mut local = sandbox.clone("upstream", "local", None);
    let missing = BranchName::try_parse("missing").unwrap();

    let error = local.fetch(DEFAULT_REMOTE, &missing, None).unwrap_err();

    assert!(matches!(error, ShoalError::RefNotFound { .. }));
    assert_eq!(
        local.refs().read_ref(&RefName::remote_tracking(DEFAULT_REMOTE, &missing)).unwrap(),
        None
    );
}

#[rstest]
fn cloning_an_empty_repository_leaves_an_unborn_branch(sandbox: Sandbox) {
    sandbox.init("upstream");
    let mut local = shoal::areas::repository::Repository::new(
        &sandbox.path("local"),
        Box::new(std::io::sink()),
    )
    .unwrap();

    let summary = local
        .clone_repository(&sandbox.path("upstream").display().to_string(), None, None)
        .unwrap();

    assert!(summary.is_none());
    assert_eq!(local.refs().current_ref().unwrap(), master_ref());
    assert_eq!(tip(&local, &master_ref()), None);
}

#[rstest]
fn corrupt_response_leaves_the_store_untouched(sandbox: Sandbox) {
    let (mut upstream_repository, upstream) = sandbox.upstream("upstream", 2);
    let mut local = sandbox.clone("upstream", "local", Some(1));
    let c3 = commit_file(&mut upstream_repository, "c3.txt", "content 3", 3);
    let transport = TamperingTransport {
        inner: LocalTransport::new(sandbox.path("upstream").into_boxed_path()),
    };

    let error = local
        .fetch_with(&transport, DEFAULT_REMOTE, &master(), Some(2))
        .unwrap_err();

    assert!(matches!(error, ShoalError::CorruptObject { .. }));
    for oid in introduced(&upstream_repository, c3, "c3.txt") {
        assert!(!local.database().contains(&oid));
    }
    assert!(!local.database().contains(&upstream[0]));
    assert_eq!(tip(&local, &tracking()), Some(upstream[1]));
    assert_eq!(local.shallow().roots(), &BTreeSet::from([upstream[1]]));
}
