//! References (local branches, remote-tracking refs, HEAD)
//!
//! References are human-readable names pointing to commits. They can be:
//! - Direct: containing a commit id
//! - Symbolic: pointing to another reference (HEAD -> refs/heads/master)
//!
//! Every update goes through [`Refs::advance`], a compare-and-swap under an
//! exclusive lock on the ref file, and is recorded in the ref's update log.
//!
//! ## File Format
//!
//! Ref files contain either a 40-character hex id or `ref: <name>`.
//! Update logs live at `.git/logs/<ref>`, one `<old> <new> <unix-ts> <message>`
//! line per update, with the all-zero id standing for "absent".

use crate::artifacts::branch::branch_name::RefName;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::ShoalError;
use anyhow::Context;
use derive_new::new;
use file_guard::Lock;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::DerefMut;
use std::path::Path;
use walkdir::WalkDir;

/// Regex pattern for parsing symbolic references
const SYMREF_REGEX: &str = r"^ref: (.+)$";

const NULL_OID: &str = "0000000000000000000000000000000000000000";

#[derive(Debug, new)]
pub struct Refs {
    /// Path to the `.git` directory
    path: Box<Path>,
}

#[derive(Debug, Clone)]
enum SymRefOrOid {
    SymRef { target: RefName },
    Oid(ObjectId),
}

impl SymRefOrOid {
    fn parse(content: &str) -> anyhow::Result<Option<SymRefOrOid>> {
        let content = content.trim();

        if content.is_empty() {
            return Ok(None);
        }

        let symref_match = regex::Regex::new(SYMREF_REGEX)?.captures(content);
        if let Some(symref_match) = symref_match {
            Ok(Some(SymRefOrOid::SymRef {
                target: RefName::try_parse(&symref_match[1])?,
            }))
        } else {
            Ok(Some(SymRefOrOid::Oid(ObjectId::try_parse(content)?)))
        }
    }

    fn read(path: &Path) -> anyhow::Result<Option<SymRefOrOid>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read ref file at {:?}", path))?;
        Self::parse(&content)
    }
}

/// One line of a ref's update log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefLogEntry {
    pub old: Option<ObjectId>,
    pub new: Option<ObjectId>,
    pub timestamp: i64,
    pub message: String,
}

impl RefLogEntry {
    fn to_line(&self) -> String {
        format!(
            "{} {} {} {}\n",
            Self::format_oid(self.old),
            Self::format_oid(self.new),
            self.timestamp,
            self.message.replace('\n', " ")
        )
    }

    fn parse_line(line: &str) -> anyhow::Result<Self> {
        let mut parts = line.splitn(4, ' ');
        let mut next = |field: &str| {
            parts
                .next()
                .with_context(|| format!("ref log line is missing {field}: {line}"))
        };

        let old = Self::parse_oid(next("old id")?)?;
        let new = Self::parse_oid(next("new id")?)?;
        let timestamp = next("timestamp")?
            .parse()
            .with_context(|| format!("invalid ref log timestamp: {line}"))?;
        let message = parts.next().unwrap_or_default().to_string();

        Ok(Self {
            old,
            new,
            timestamp,
            message,
        })
    }

    fn format_oid(oid: Option<ObjectId>) -> String {
        oid.map(|oid| oid.to_string())
            .unwrap_or_else(|| NULL_OID.to_string())
    }

    fn parse_oid(raw: &str) -> anyhow::Result<Option<ObjectId>> {
        if raw == NULL_OID {
            Ok(None)
        } else {
            Ok(Some(ObjectId::try_parse(raw)?))
        }
    }
}

impl Refs {
    /// Read the commit a ref points to, following symbolic refs
    pub fn read_ref(&self, name: &RefName) -> anyhow::Result<Option<ObjectId>> {
        let target = self.resolve_symbolic(name)?;
        match SymRefOrOid::read(&self.ref_path(&target))? {
            Some(SymRefOrOid::Oid(oid)) => Ok(Some(oid)),
            Some(SymRefOrOid::SymRef { .. }) | None => Ok(None),
        }
    }

    pub fn read_head(&self) -> anyhow::Result<Option<ObjectId>> {
        self.read_ref(&RefName::head())
    }

    /// Follow symbolic refs until reaching a direct (or absent) ref
    ///
    /// For example, if HEAD points to refs/heads/main, returns refs/heads/main.
    pub fn resolve_symbolic(&self, name: &RefName) -> anyhow::Result<RefName> {
        let mut current = name.clone();
        // a symref chain longer than this is a cycle
        for _ in 0..8 {
            match SymRefOrOid::read(&self.ref_path(&current))? {
                Some(SymRefOrOid::SymRef { target }) => current = target,
                Some(SymRefOrOid::Oid(_)) | None => return Ok(current),
            }
        }

        anyhow::bail!("symbolic ref {} is too deeply nested", name)
    }

    /// The ref HEAD currently designates
    pub fn current_ref(&self) -> anyhow::Result<RefName> {
        self.resolve_symbolic(&RefName::head())
    }

    /// Point HEAD at `target` symbolically
    pub fn set_head(&self, target: &RefName) -> anyhow::Result<()> {
        self.write_ref_file(&self.head_path(), &format!("ref: {}", target))
    }

    /// Compare-and-swap `name` from `expected` to `new`
    ///
    /// `expected = None` means the ref must not exist yet. On mismatch the ref
    /// is left untouched and the error carries [`ShoalError::StaleRef`].
    pub fn advance(
        &self,
        name: &RefName,
        expected: Option<ObjectId>,
        new: ObjectId,
        message: &str,
    ) -> anyhow::Result<()> {
        let target = self.resolve_symbolic(name)?;
        self.swap(&target, expected, Some(new), message)?;

        tracing::debug!(
            ref_name = %target,
            old = ?expected,
            new = %new,
            "advanced ref"
        );
        Ok(())
    }

    /// Undo the most recent logged update of `name`
    ///
    /// Restores the previous value (removing the ref if it did not exist) and
    /// drops the log line. Returns the restored value.
    pub fn rollback(&self, name: &RefName) -> anyhow::Result<Option<ObjectId>> {
        let target = self.resolve_symbolic(name)?;
        let mut history = self.history(&target)?;
        let last = history
            .pop()
            .with_context(|| format!("ref {} has no update to roll back", target))?;

        let path = self.ref_path(&target);
        let mut ref_file = Self::open_for_update(&path)?;
        let mut lock = file_guard::lock(&mut ref_file, Lock::Exclusive, 0, 1)?;
        let file: &mut File = lock.deref_mut();

        let actual = Self::read_locked(file)?;
        if actual != last.new {
            return Err(ShoalError::StaleRef {
                ref_name: target.to_string(),
                expected: last.new,
                actual,
            }
            .into());
        }

        match last.old {
            Some(old) => Self::write_locked(file, &old.to_string())?,
            None => {
                drop(lock);
                std::fs::remove_file(&path)
                    .with_context(|| format!("failed to remove ref file at {:?}", path))?;
            }
        }

        let log = history.iter().map(RefLogEntry::to_line).collect::<String>();
        std::fs::write(self.log_path(&target), log)
            .with_context(|| format!("failed to rewrite ref log for {}", target))?;

        tracing::debug!(ref_name = %target, restored = ?last.old, "rolled back ref");
        Ok(last.old)
    }

    /// Logged updates of `name`, oldest first
    pub fn history(&self, name: &RefName) -> anyhow::Result<Vec<RefLogEntry>> {
        let path = self.log_path(name);
        if !path.exists() {
            return Ok(Vec::new());
        }

        std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read ref log at {:?}", path))?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(RefLogEntry::parse_line)
            .collect()
    }

    /// Direct refs under `prefix` (e.g. `refs/heads`) with their targets
    pub fn list_refs(&self, prefix: &str) -> anyhow::Result<BTreeMap<RefName, ObjectId>> {
        let root = self.path.join(prefix);
        if !root.exists() {
            return Ok(BTreeMap::new());
        }

        let mut refs = BTreeMap::new();
        for entry in WalkDir::new(&root).into_iter().filter_map(|entry| entry.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative_path) = entry.path().strip_prefix(self.path.as_ref()) else {
                continue;
            };
            let Ok(name) = RefName::try_parse(relative_path.to_string_lossy()) else {
                continue;
            };
            if let Some(SymRefOrOid::Oid(oid)) = SymRefOrOid::read(entry.path())? {
                refs.insert(name, oid);
            }
        }

        Ok(refs)
    }

    /// Refs grouped by the commit they point to, for log decoration
    pub fn reverse_refs(&self) -> anyhow::Result<HashMap<ObjectId, Vec<RefName>>> {
        Ok(self
            .list_refs("refs")?
            .into_iter()
            .fold(HashMap::new(), |mut acc, (name, oid)| {
                acc.entry(oid).or_insert_with(Vec::new).push(name);
                acc
            }))
    }

    fn swap(
        &self,
        target: &RefName,
        expected: Option<ObjectId>,
        new: Option<ObjectId>,
        message: &str,
    ) -> anyhow::Result<()> {
        let path = self.ref_path(target);
        let existed = path.exists();
        let mut ref_file = Self::open_for_update(&path)?;
        let mut lock = file_guard::lock(&mut ref_file, Lock::Exclusive, 0, 1)?;
        let file: &mut File = lock.deref_mut();

        let actual = Self::read_locked(file)?;
        if actual != expected {
            if !existed {
                drop(lock);
                // do not leave behind the empty file opened for locking
                let _ = std::fs::remove_file(&path);
            }
            return Err(ShoalError::StaleRef {
                ref_name: target.to_string(),
                expected,
                actual,
            }
            .into());
        }

        if let Some(new) = new {
            Self::write_locked(file, &new.to_string())?;
        }
        drop(lock);

        self.append_log(
            target,
            &RefLogEntry {
                old: actual,
                new,
                timestamp: chrono::Utc::now().timestamp(),
                message: message.to_string(),
            },
        )
    }

    fn open_for_update(path: &Path) -> anyhow::Result<File> {
        std::fs::create_dir_all(path.parent().with_context(|| {
            format!("failed to create parent directories for ref file at {:?}", path)
        })?)?;

        std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("failed to open ref file at {:?}", path))
    }

    fn read_locked(file: &mut File) -> anyhow::Result<Option<ObjectId>> {
        let mut content = String::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_to_string(&mut content)?;

        match SymRefOrOid::parse(&content)? {
            Some(SymRefOrOid::Oid(oid)) => Ok(Some(oid)),
            Some(SymRefOrOid::SymRef { target }) => {
                anyhow::bail!("unexpected symbolic ref to {} during update", target)
            }
            None => Ok(None),
        }
    }

    fn write_locked(file: &mut File, raw_ref: &str) -> anyhow::Result<()> {
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(raw_ref.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        Ok(())
    }

    fn write_ref_file(&self, path: &Path, raw_ref: &str) -> anyhow::Result<()> {
        let mut ref_file = Self::open_for_update(path)?;
        let mut lock = file_guard::lock(&mut ref_file, Lock::Exclusive, 0, 1)?;
        Self::write_locked(lock.deref_mut(), raw_ref)
    }

    fn append_log(&self, name: &RefName, entry: &RefLogEntry) -> anyhow::Result<()> {
        let path = self.log_path(name);
        std::fs::create_dir_all(path.parent().with_context(|| {
            format!("failed to create parent directories for ref log at {:?}", path)
        })?)?;

        let mut log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open ref log at {:?}", path))?;
        log_file.write_all(entry.to_line().as_bytes())?;

        Ok(())
    }

    fn ref_path(&self, name: &RefName) -> Box<Path> {
        self.path.join(name.as_ref_path()).into_boxed_path()
    }

    fn log_path(&self, name: &RefName) -> Box<Path> {
        self.logs_path().join(name.as_ref_path()).into_boxed_path()
    }

    pub fn head_path(&self) -> Box<Path> {
        self.path.join("HEAD").into_boxed_path()
    }

    pub fn refs_path(&self) -> Box<Path> {
        self.path.join("refs").into_boxed_path()
    }

    pub fn heads_path(&self) -> Box<Path> {
        self.refs_path().join("heads").into_boxed_path()
    }

    pub fn remotes_path(&self) -> Box<Path> {
        self.refs_path().join("remotes").into_boxed_path()
    }

    pub fn logs_path(&self) -> Box<Path> {
        self.path.join("logs").into_boxed_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::branch::branch_name::BranchName;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn refs() -> (TempDir, Refs) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let refs = Refs::new(dir.path().to_path_buf().into_boxed_path());
        (dir, refs)
    }

    fn oid(byte: u8) -> ObjectId {
        ObjectId::from_bytes([byte; 20])
    }

    fn master() -> RefName {
        RefName::branch(&BranchName::try_parse("master").unwrap())
    }

    #[rstest]
    fn advance_creates_then_swaps(refs: (TempDir, Refs)) {
        let (_dir, refs) = refs;

        refs.advance(&master(), None, oid(1), "commit (initial)").unwrap();
        refs.advance(&master(), Some(oid(1)), oid(2), "commit").unwrap();

        assert_eq!(refs.read_ref(&master()).unwrap(), Some(oid(2)));
        let history = refs.history(&master()).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].old, None);
        assert_eq!(history[1].old, Some(oid(1)));
        assert_eq!(history[1].new, Some(oid(2)));
        assert_eq!(history[1].message, "commit");
    }

    #[rstest]
    fn stale_expectation_leaves_ref_untouched(refs: (TempDir, Refs)) {
        let (_dir, refs) = refs;
        refs.advance(&master(), None, oid(1), "first").unwrap();

        let error = ShoalError::from(
            refs.advance(&master(), Some(oid(9)), oid(2), "racy")
                .unwrap_err(),
        );

        assert!(matches!(
            error,
            ShoalError::StaleRef { expected, actual, .. }
                if expected == Some(oid(9)) && actual == Some(oid(1))
        ));
        assert_eq!(refs.read_ref(&master()).unwrap(), Some(oid(1)));
        assert_eq!(refs.history(&master()).unwrap().len(), 1);
    }

    #[rstest]
    fn creating_an_existing_ref_is_stale(refs: (TempDir, Refs)) {
        let (_dir, refs) = refs;
        refs.advance(&master(), None, oid(1), "first").unwrap();

        let error = ShoalError::from(refs.advance(&master(), None, oid(2), "again").unwrap_err());

        assert!(error.is_retryable());
    }

    #[rstest]
    fn failed_creation_does_not_leave_an_empty_ref(refs: (TempDir, Refs)) {
        let (dir, refs) = refs;

        assert!(refs.advance(&master(), Some(oid(1)), oid(2), "x").is_err());

        assert!(!dir.path().join("refs/heads/master").exists());
        assert!(refs.list_refs("refs/heads").unwrap().is_empty());
    }

    #[rstest]
    fn head_follows_symbolic_target(refs: (TempDir, Refs)) {
        let (_dir, refs) = refs;
        refs.set_head(&master()).unwrap();

        assert_eq!(refs.current_ref().unwrap(), master());
        assert_eq!(refs.read_head().unwrap(), None);

        refs.advance(&RefName::head(), None, oid(3), "through HEAD").unwrap();

        assert_eq!(refs.read_ref(&master()).unwrap(), Some(oid(3)));
        assert_eq!(refs.history(&master()).unwrap().len(), 1);
    }

    #[rstest]
    fn rollback_restores_previous_value(refs: (TempDir, Refs)) {
        let (_dir, refs) = refs;
        refs.advance(&master(), None, oid(1), "first").unwrap();
        refs.advance(&master(), Some(oid(1)), oid(2), "second").unwrap();

        assert_eq!(refs.rollback(&master()).unwrap(), Some(oid(1)));
        assert_eq!(refs.read_ref(&master()).unwrap(), Some(oid(1)));

        assert_eq!(refs.rollback(&master()).unwrap(), None);
        assert_eq!(refs.read_ref(&master()).unwrap(), None);
        assert!(refs.history(&master()).unwrap().is_empty());
        assert!(refs.rollback(&master()).is_err());
    }

    #[rstest]
    fn list_refs_reports_tracking_refs(refs: (TempDir, Refs)) {
        let (_dir, refs) = refs;
        let branch = BranchName::try_parse("master").unwrap();
        let tracking = RefName::remote_tracking("origin", &branch);
        refs.advance(&master(), None, oid(1), "local").unwrap();
        refs.advance(&tracking, None, oid(2), "fetch").unwrap();

        let remotes = refs.list_refs("refs/remotes").unwrap();
        let all = refs.reverse_refs().unwrap();

        assert_eq!(remotes.into_iter().collect::<Vec<_>>(), vec![(tracking, oid(2))]);
        assert_eq!(all.get(&oid(1)), Some(&vec![master()]));
    }
}
