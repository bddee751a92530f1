//! Library-level helpers: repositories side by side in one temp dir

use crate::common::file::{FileSpec, write_file};
use crate::common::redirect_temp_dir;
use assert_fs::TempDir;
use rstest::fixture;
use shoal::areas::repository::Repository;
use shoal::artifacts::branch::branch_name::{BranchName, RefName};
use shoal::artifacts::objects::commit::Author;
use shoal::artifacts::objects::object_id::ObjectId;
use shoal::commands::porcelain::commit::CommitMetadata;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const EPOCH: i64 = 1_700_000_000;

pub struct Sandbox {
    pub dir: TempDir,
}

#[fixture]
pub fn sandbox() -> Sandbox {
    redirect_temp_dir();
    Sandbox {
        dir: TempDir::new().expect("Failed to create temp dir"),
    }
}

impl Sandbox {
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn init(&self, name: &str) -> Repository {
        let mut repository = Repository::new(&self.path(name), Box::new(std::io::sink()))
            .expect("Failed to create repository");
        repository.init().expect("Failed to init repository");
        repository
    }

    pub fn open(&self, name: &str) -> Repository {
        Repository::open(&self.path(name), Box::new(std::io::sink()))
            .expect("Failed to open repository")
    }

    /// Clone `upstream` into `name`; `depth` of `None` clones everything
    pub fn clone(&self, upstream: &str, name: &str, depth: Option<u32>) -> Repository {
        let mut repository = Repository::new(&self.path(name), Box::new(std::io::sink()))
            .expect("Failed to create repository");
        let url = self.path(upstream).display().to_string();
        repository
            .clone_repository(&url, None, depth)
            .expect("Failed to clone");
        repository
    }

    /// `init` plus `count` commits on master, returned oldest first
    pub fn upstream(&self, name: &str, count: usize) -> (Repository, Vec<ObjectId>) {
        let mut repository = self.init(name);
        let commits = (1..=count)
            .map(|n| commit_file(&mut repository, &format!("c{n}.txt"), &format!("content {n}"), n as i64))
            .collect();
        (repository, commits)
    }
}

pub fn author(minutes: i64) -> Author {
    let line = format!("Ada Lovelace <ada@example.com> {} +0000", EPOCH + minutes * 60);
    Author::try_from(line.as_str()).expect("Failed to parse author")
}

/// Write `name` into the working directory and commit it on the current branch,
/// dated `minutes` after a fixed epoch
pub fn commit_file(repository: &mut Repository, name: &str, content: &str, minutes: i64) -> ObjectId {
    write_file(FileSpec::new(repository.path().join(name), content.to_string()));
    let metadata = CommitMetadata::new(author(minutes), format!("add {name}"));

    repository
        .commit_files(&[Path::new(name)], metadata)
        .expect("Failed to commit")
}

pub fn master() -> BranchName {
    BranchName::try_parse("master").expect("valid branch name")
}

pub fn master_ref() -> RefName {
    RefName::branch(&master())
}

pub fn tip(repository: &Repository, ref_name: &RefName) -> Option<ObjectId> {
    repository.refs().read_ref(ref_name).expect("Failed to read ref")
}

/// The objects `commit` adds on top of its first parent: itself, its root
/// tree and the blob of `file`
pub fn introduced(repository: &Repository, commit: ObjectId, file: &str) -> BTreeSet<ObjectId> {
    let loaded = repository.database().load_commit(&commit).expect("commit");
    let tree = repository.database().load_tree(loaded.tree_oid()).expect("tree");
    let blob = tree.get(file).expect("file in tree").oid;

    BTreeSet::from([commit, *loaded.tree_oid(), blob])
}

/// Every commit reachable from `start` in `repository`'s shallow-bounded graph
pub fn history(repository: &Repository, start: ObjectId) -> Vec<ObjectId> {
    repository
        .graph()
        .ancestors(start)
        .map(|commit| commit.expect("walkable").oid)
        .collect()
}
