use crate::areas::config::RepositoryConfig;
use crate::areas::database::Database;
use crate::areas::refs::Refs;
use crate::areas::shallow::Shallow;
use crate::artifacts::graph::CommitGraph;
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use file_guard::{FileGuard, Lock};
use std::cell::{RefCell, RefMut};
use std::fs::File;
use std::path::Path;

pub const GIT_DIR: &str = ".git";
const LOCK_FILE: &str = "shoal.lock";
const CONFIG_FILE: &str = "config.toml";
const SHALLOW_FILE: &str = "shallow";

/// A repository rooted at `path`, with its metadata under `path/.git`
///
/// Mutating operations take `&mut self` and hold [`RepositoryLock`] for
/// their whole duration; readers never take the lock.
pub struct Repository {
    path: Box<Path>,
    writer: RefCell<Box<dyn std::io::Write + Send>>,
    database: Database,
    refs: Refs,
    shallow: Shallow,
    config: RepositoryConfig,
}

/// Exclusive single-writer lock on a repository, released on drop
pub struct RepositoryLock {
    _guard: FileGuard<Box<File>>,
}

impl Repository {
    pub fn new(path: &Path, writer: Box<dyn std::io::Write + Send>) -> anyhow::Result<Self> {
        if !path.exists() {
            std::fs::create_dir_all(path)
                .with_context(|| format!("failed to create repository directory {:?}", path))?;
        }
        let path = path.canonicalize()?;
        let git_path = path.join(GIT_DIR);

        let database = Database::new(git_path.join("objects").into_boxed_path());
        let refs = Refs::new(git_path.clone().into_boxed_path());
        let shallow = Shallow::load(git_path.join(SHALLOW_FILE).into_boxed_path())?;
        let config = RepositoryConfig::load(&git_path.join(CONFIG_FILE))?;

        Ok(Repository {
            path: path.into_boxed_path(),
            writer: RefCell::new(writer),
            database,
            refs,
            shallow,
            config,
        })
    }

    /// Open an existing repository, failing if `path` has not been initialized
    pub fn open(path: &Path, writer: Box<dyn std::io::Write + Send>) -> anyhow::Result<Self> {
        if !path.join(GIT_DIR).is_dir() {
            anyhow::bail!("not a repository: {}", path.display());
        }

        Self::new(path, writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git_path(&self) -> Box<Path> {
        self.path.join(GIT_DIR).into_boxed_path()
    }

    pub fn is_initialized(&self) -> bool {
        self.git_path().is_dir()
    }

    pub fn writer(&'_ self) -> RefMut<'_, Box<dyn std::io::Write + Send>> {
        self.writer.borrow_mut()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    pub fn shallow(&self) -> &Shallow {
        &self.shallow
    }

    pub fn shallow_mut(&mut self) -> &mut Shallow {
        &mut self.shallow
    }

    /// Record `oid` as a shallow root in memory; see [`Shallow::mark_shallow`]
    pub fn mark_shallow(&mut self, oid: ObjectId) -> anyhow::Result<bool> {
        self.shallow.mark_shallow(&self.database, oid)
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut RepositoryConfig {
        &mut self.config
    }

    pub fn save_config(&self) -> anyhow::Result<()> {
        self.config.save(&self.git_path().join(CONFIG_FILE))
    }

    /// Shallow-bounded view of this repository's history
    pub fn graph(&self) -> CommitGraph<'_> {
        CommitGraph::new(&self.database, self.shallow.roots().iter().copied())
    }

    /// Block until this process holds the repository's writer lock
    pub fn lock(&self) -> anyhow::Result<RepositoryLock> {
        let lock_path = self.git_path().join(LOCK_FILE);
        let lock_file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("failed to open repository lock at {:?}", lock_path))?;

        let guard = file_guard::lock(Box::new(lock_file), Lock::Exclusive, 0, 1)
            .with_context(|| format!("failed to lock repository at {:?}", self.path))?;

        Ok(RepositoryLock { _guard: guard })
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("path", &self.path)
            .field("shallow_roots", &self.shallow.roots().len())
            .finish_non_exhaustive()
    }
}
