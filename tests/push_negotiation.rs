use pretty_assertions::assert_eq;
use rstest::rstest;
use shoal::areas::config::DEFAULT_REMOTE;
use shoal::artifacts::branch::branch_name::RefName;
use shoal::artifacts::transfer::negotiator::PushOptions;
use shoal::artifacts::transfer::request::RefUpdate;
use shoal::artifacts::transport::Transport;
use shoal::artifacts::transport::local::LocalTransport;
use shoal::commands::porcelain::push::Refspec;
use shoal::errors::ShoalError;
use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;

mod common;
use common::sandbox::{Sandbox, commit_file, history, introduced, master, master_ref, sandbox, tip};

fn refspec() -> Refspec {
    Refspec::try_parse("master").unwrap()
}

fn tracking() -> RefName {
    RefName::remote_tracking(DEFAULT_REMOTE, &master())
}

#[rstest]
fn shallow_clone_of_single_commit_pushes_only_the_new_commit(sandbox: Sandbox) {
    let (_, upstream) = sandbox.upstream("upstream", 1);
    let mut local = sandbox.clone("upstream", "local", Some(1));
    assert_eq!(local.shallow().roots(), &BTreeSet::from([upstream[0]]));

    let c2 = commit_file(&mut local, "c2.txt", "content 2", 2);
    let summary = local
        .push(DEFAULT_REMOTE, &refspec(), PushOptions::default(), CancellationToken::new())
        .unwrap();

    assert_eq!(
        summary.objects.iter().copied().collect::<BTreeSet<_>>(),
        introduced(&local, c2, "c2.txt")
    );
    assert_eq!(summary.objects[0], c2);
    assert_eq!(tip(&sandbox.open("upstream"), &master_ref()), Some(c2));
    assert_eq!(tip(&local, &tracking()), Some(c2));
}

#[rstest]
fn shallow_clone_push_never_resolves_history_beyond_the_root(sandbox: Sandbox) {
    let (_, upstream) = sandbox.upstream("upstream", 2);
    let (c1, c2) = (upstream[0], upstream[1]);
    let mut local = sandbox.clone("upstream", "local", Some(1));
    assert!(!local.database().contains(&c1));
    assert!(local.shallow().is_shallow_root(&c2));

    let c3 = commit_file(&mut local, "c3.txt", "content 3", 3);
    let summary = local
        .push(DEFAULT_REMOTE, &refspec(), PushOptions::default(), CancellationToken::new())
        .unwrap();

    assert_eq!(
        summary.objects.iter().copied().collect::<BTreeSet<_>>(),
        introduced(&local, c3, "c3.txt")
    );
    assert!(!local.database().contains(&c1));
    assert_eq!(tip(&sandbox.open("upstream"), &master_ref()), Some(c3));
}

#[rstest]
fn full_clone_push_sends_the_same_objects_as_a_shallow_clone(sandbox: Sandbox) {
    sandbox.upstream("upstream", 2);
    sandbox.upstream("twin", 2);
    let mut full = sandbox.clone("upstream", "full", None);
    let mut shallow = sandbox.clone("twin", "shallow", Some(1));

    let from_full = commit_file(&mut full, "c3.txt", "content 3", 3);
    let from_shallow = commit_file(&mut shallow, "c3.txt", "content 3", 3);
    let full_summary = full
        .push(DEFAULT_REMOTE, &refspec(), PushOptions::default(), CancellationToken::new())
        .unwrap();
    let shallow_summary = shallow
        .push(DEFAULT_REMOTE, &refspec(), PushOptions::default(), CancellationToken::new())
        .unwrap();

    assert_eq!(from_full, from_shallow);
    assert_eq!(full_summary.objects, shallow_summary.objects);
    assert!(full.shallow().is_empty());
}

#[rstest]
fn pushing_shallow_history_to_an_empty_remote_needs_more_history(sandbox: Sandbox) {
    let (_, upstream) = sandbox.upstream("upstream", 2);
    sandbox.init("empty");
    let mut local = sandbox.clone("upstream", "local", Some(1));
    local
        .config_mut()
        .set_remote("empty", sandbox.path("empty").display().to_string());
    commit_file(&mut local, "c3.txt", "content 3", 3);

    let error = local
        .push("empty", &refspec(), PushOptions::default(), CancellationToken::new())
        .unwrap_err();

    assert!(error.needs_more_history());
    assert!(matches!(
        error,
        ShoalError::InsufficientHistory { shallow_root, .. } if shallow_root == upstream[1]
    ));
    assert_eq!(tip(&sandbox.open("empty"), &master_ref()), None);
}

#[rstest]
fn diverged_history_is_refused_unless_forced(sandbox: Sandbox) {
    let (mut upstream, _) = sandbox.upstream("upstream", 2);
    let mut local = sandbox.clone("upstream", "local", None);
    let theirs = commit_file(&mut upstream, "theirs.txt", "theirs", 3);
    let ours = commit_file(&mut local, "ours.txt", "ours", 4);
    local.fetch(DEFAULT_REMOTE, &master(), None).unwrap();

    let error = local
        .push(DEFAULT_REMOTE, &refspec(), PushOptions::default(), CancellationToken::new())
        .unwrap_err();
    assert!(matches!(
        error,
        ShoalError::DivergedHistory { local, remote, .. } if local == ours && remote == Some(theirs)
    ));
    assert_eq!(tip(&sandbox.open("upstream"), &master_ref()), Some(theirs));

    let forced = PushOptions {
        force: true,
        ..PushOptions::default()
    };
    local
        .push(DEFAULT_REMOTE, &refspec(), forced, CancellationToken::new())
        .unwrap();
    assert_eq!(tip(&sandbox.open("upstream"), &master_ref()), Some(ours));
}

#[rstest]
fn creating_a_branch_can_be_disallowed(sandbox: Sandbox) {
    sandbox.upstream("upstream", 1);
    let mut local = sandbox.clone("upstream", "local", None);
    commit_file(&mut local, "c2.txt", "content 2", 2);
    let topic = Refspec::try_parse("refs/heads/master:refs/heads/topic").unwrap();
    let options = PushOptions {
        allow_create: false,
        ..PushOptions::default()
    };

    let error = local
        .push(DEFAULT_REMOTE, &topic, options, CancellationToken::new())
        .unwrap_err();

    assert!(matches!(error, ShoalError::RefNotFound { .. }));
}

#[rstest]
fn cancelled_push_leaves_both_sides_unchanged(sandbox: Sandbox) {
    let (_, upstream) = sandbox.upstream("upstream", 1);
    let mut local = sandbox.clone("upstream", "local", Some(1));
    commit_file(&mut local, "c2.txt", "content 2", 2);
    let cancellation = CancellationToken::new();
    cancellation.cancel();

    let error = local
        .push(DEFAULT_REMOTE, &refspec(), PushOptions::default(), cancellation)
        .unwrap_err();

    assert!(matches!(error, ShoalError::Cancelled));
    assert_eq!(tip(&sandbox.open("upstream"), &master_ref()), Some(upstream[0]));
    assert_eq!(tip(&local, &tracking()), Some(upstream[0]));
}

#[rstest]
fn push_racing_a_remote_update_succeeds_after_fetching(sandbox: Sandbox) {
    let (_, upstream) = sandbox.upstream("upstream", 1);
    let c1 = upstream[0];
    let mut local = sandbox.clone("upstream", "local", Some(1));

    // C2 reaches the remote behind the local tracking ref's back
    let c2 = commit_file(&mut local, "c2.txt", "content 2", 2);
    let transport = LocalTransport::new(sandbox.path("upstream").into_boxed_path());
    let packed = introduced(&local, c2, "c2.txt")
        .iter()
        .map(|oid| local.database().load_packed(oid).unwrap())
        .collect();
    transport
        .send_objects(&RefUpdate::new(master_ref(), Some(c1), c2), packed)
        .unwrap();

    let c3 = commit_file(&mut local, "c3.txt", "content 3", 3);
    let error = local
        .push(DEFAULT_REMOTE, &refspec(), PushOptions::default(), CancellationToken::new())
        .unwrap_err();
    assert!(error.is_retryable());
    assert!(matches!(
        error,
        ShoalError::StaleRef { expected, actual, .. } if expected == Some(c1) && actual == Some(c2)
    ));

    local.fetch(DEFAULT_REMOTE, &master(), None).unwrap();
    let summary = local
        .push(DEFAULT_REMOTE, &refspec(), PushOptions::default(), CancellationToken::new())
        .unwrap();

    assert_eq!(
        summary.objects.iter().copied().collect::<BTreeSet<_>>(),
        introduced(&local, c3, "c3.txt")
    );
    assert_eq!(tip(&sandbox.open("upstream"), &master_ref()), Some(c3));
}

#[rstest]
fn remote_compare_and_swap_rejects_a_stale_update(sandbox: Sandbox) {
    let (_, upstream) = sandbox.upstream("upstream", 2);
    let transport = LocalTransport::new(sandbox.path("upstream").into_boxed_path());

    let error = transport
        .send_objects(&RefUpdate::new(master_ref(), Some(upstream[0]), upstream[0]), Vec::new())
        .unwrap_err();

    assert!(matches!(error, ShoalError::StaleRef { .. }));
    assert_eq!(tip(&sandbox.open("upstream"), &master_ref()), Some(upstream[1]));
}

#[rstest]
fn pushed_history_is_reconstructed_by_a_fresh_clone(sandbox: Sandbox) {
    sandbox.upstream("upstream", 3);
    let mut local = sandbox.clone("upstream", "local", Some(1));
    commit_file(&mut local, "c4.txt", "content 4", 4);
    let c5 = commit_file(&mut local, "c5.txt", "content 5", 5);
    local
        .push(DEFAULT_REMOTE, &refspec(), PushOptions::default(), CancellationToken::new())
        .unwrap();

    let fresh = sandbox.clone("upstream", "fresh", None);
    let upstream = sandbox.open("upstream");

    assert_eq!(tip(&fresh, &master_ref()), Some(c5));
    assert!(fresh.shallow().is_empty());
    let commits = history(&fresh, c5);
    assert_eq!(commits, history(&upstream, c5));
    assert_eq!(commits.len(), 5);
    for oid in &commits {
        assert_eq!(
            fresh.database().load_packed(oid).unwrap(),
            upstream.database().load_packed(oid).unwrap()
        );
    }
}
