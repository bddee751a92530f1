use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::RefName;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::{Author, Commit};
use crate::artifacts::objects::entry_mode::{EntryMode, FileMode};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::{Tree, TreeEntry};
use crate::errors::{ShoalError, ShoalResult};
use anyhow::Context;
use std::path::{Component, Path};

/// Who made a commit and why
#[derive(Debug, Clone)]
pub struct CommitMetadata {
    pub author: Author,
    /// Defaults to the author
    pub committer: Option<Author>,
    pub message: String,
}

impl CommitMetadata {
    pub fn new(author: Author, message: impl Into<String>) -> Self {
        Self {
            author,
            committer: None,
            message: message.into(),
        }
    }

    pub fn load_from_env(message: impl Into<String>) -> ShoalResult<Self> {
        Ok(Self::new(Author::load_from_env()?, message))
    }
}

impl Repository {
    /// Store a commit of `tree` on top of the current tip of `parent_ref`
    ///
    /// Only appends to the object store; no ref moves. An unborn
    /// `parent_ref` yields a root commit.
    pub fn commit(
        &self,
        parent_ref: &RefName,
        tree: ObjectId,
        metadata: CommitMetadata,
    ) -> ShoalResult<ObjectId> {
        if !self.database().contains(&tree) {
            return Err(ShoalError::ObjectNotFound(tree));
        }
        let parents = self.refs().read_ref(parent_ref)?.into_iter().collect();

        let mut commit = Commit::new(
            parents,
            tree,
            metadata.author,
            metadata.message.trim().to_string(),
        );
        if let Some(committer) = metadata.committer {
            commit = commit.with_committer(committer);
        }

        Ok(self.database().store(&commit)?)
    }

    /// Commit on top of `branch` and move `branch` to the new commit
    ///
    /// Fails with [`ShoalError::StaleRef`] if `branch` moved while the commit
    /// was being written; the commit object stays behind unreferenced.
    pub fn commit_on_branch(
        &mut self,
        branch: &RefName,
        tree: ObjectId,
        metadata: CommitMetadata,
    ) -> ShoalResult<ObjectId> {
        let _lock = self.lock()?;

        let parent = self.refs().read_ref(branch)?;
        let summary = metadata.message.lines().next().unwrap_or_default().to_string();
        let commit = self.commit(branch, tree, metadata)?;
        self.refs()
            .advance(branch, parent, commit, &format!("commit: {summary}"))?;

        Ok(commit)
    }

    /// Commit `files` (relative to the repository root) on the current branch
    ///
    /// The tree is the current tip's tree with each file's content layered on
    /// top, so unlisted files carry over unchanged.
    pub fn commit_files(
        &mut self,
        files: &[impl AsRef<Path>],
        metadata: CommitMetadata,
    ) -> ShoalResult<ObjectId> {
        let branch = self.refs().current_ref()?;
        let mut tree = match self.refs().read_ref(&branch)? {
            Some(tip) => {
                let tip = self.database().load_commit(&tip)?;
                self.database().load_tree(tip.tree_oid())?
            }
            None => Tree::new(),
        };

        for file in files {
            let (components, entry) = self.store_file(file.as_ref())?;
            let (root, _) = self.insert_path(tree, &components, entry)?;
            tree = root;
        }
        let tree_oid = self.database().store(&tree)?;

        let summary = metadata.message.lines().next().unwrap_or_default().trim().to_string();
        let is_root = self.refs().read_ref(&branch)?.is_none();
        let commit = self.commit_on_branch(&branch, tree_oid, metadata)?;

        writeln!(
            self.writer(),
            "[{} {}{}] {}",
            branch.short_name(),
            if is_root { "(root-commit) " } else { "" },
            commit.to_short_oid(),
            summary
        )?;

        Ok(commit)
    }

    fn store_file(&self, file: &Path) -> ShoalResult<(Vec<String>, TreeEntry)> {
        let relative = match file.is_absolute() {
            true => file
                .strip_prefix(self.path())
                .with_context(|| format!("{} is outside the repository", file.display()))?,
            false => file,
        };
        let components = relative
            .components()
            .map(|component| match component {
                Component::Normal(name) => Ok(name.to_string_lossy().into_owned()),
                _ => Err(anyhow::anyhow!("unsupported path: {}", file.display())),
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        if components.is_empty() {
            return Err(anyhow::anyhow!("empty path").into());
        }

        let absolute = self.path().join(relative);
        let content = std::fs::read(&absolute)
            .with_context(|| format!("failed to read {}", absolute.display()))?;
        let blob = self.database().store(&Blob::new(content.into()))?;

        Ok((components, TreeEntry::new(Self::file_mode(&absolute)?, blob)))
    }

    #[cfg(unix)]
    fn file_mode(path: &Path) -> anyhow::Result<EntryMode> {
        use std::os::unix::fs::PermissionsExt;

        let mode = std::fs::metadata(path)?.permissions().mode();
        Ok(match mode & 0o111 {
            0 => EntryMode::File(FileMode::Regular),
            _ => EntryMode::File(FileMode::Executable),
        })
    }

    #[cfg(not(unix))]
    fn file_mode(_path: &Path) -> anyhow::Result<EntryMode> {
        Ok(EntryMode::File(FileMode::Regular))
    }

    /// Insert `entry` at `components` below `tree`, storing every rewritten
    /// subtree on the way back up
    fn insert_path(
        &self,
        mut tree: Tree,
        components: &[String],
        entry: TreeEntry,
    ) -> anyhow::Result<(Tree, ObjectId)> {
        let Some((name, rest)) = components.split_first() else {
            anyhow::bail!("empty path");
        };

        if rest.is_empty() {
            tree.insert(name.as_str(), entry);
        } else {
            let subtree = match tree.get(name) {
                Some(existing) if existing.is_tree() => self.database().load_tree(&existing.oid)?,
                _ => Tree::new(),
            };
            let (_, subtree_oid) = self.insert_path(subtree, rest, entry)?;
            tree.insert(name.as_str(), TreeEntry::new(EntryMode::Directory, subtree_oid));
        }

        let oid = self.database().store(&tree)?;
        Ok((tree, oid))
    }
}
