use crate::artifacts::database::packed_object::PackedObject;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::{Boundary, Commit, SlimCommit};
use crate::artifacts::objects::object::{Object, ObjectBox, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use crate::errors::ShoalError;
use anyhow::Context;
use bytes::Bytes;
use fake::rand;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Content-addressable object store
///
/// Objects are kept as zlib-compressed loose files keyed by their id. `store`
/// is the only mutator and is idempotent: an object that already exists is
/// never rewritten, so the store only grows.
#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
}

// TODO: implement packfiles for better performance and storage efficiency
impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Database { path }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    /// Whether an object with this id is stored; never fails
    pub fn contains(&self, object_id: &ObjectId) -> bool {
        self.path.join(object_id.to_path()).is_file()
    }

    /// Store an object, returning its id
    pub fn store(&self, object: &impl Object) -> anyhow::Result<ObjectId> {
        let object_id = object.object_id()?;

        if !self.contains(&object_id) {
            self.write_object(&object_id, object.serialize()?)?;
        }

        Ok(object_id)
    }

    /// Store an object received in canonical form after verifying it
    pub fn store_packed(&self, packed: &PackedObject) -> anyhow::Result<ObjectId> {
        packed.verify()?;

        if !self.contains(&packed.oid) {
            self.write_object(&packed.oid, packed.data.clone())?;
        }

        Ok(packed.oid)
    }

    /// Load an object's canonical bytes for transfer
    pub fn load_packed(&self, object_id: &ObjectId) -> anyhow::Result<PackedObject> {
        Ok(PackedObject::new(*object_id, self.load(object_id)?))
    }

    /// Load the raw (decompressed) canonical encoding of an object
    ///
    /// Fails with [`ShoalError::ObjectNotFound`] when the object is absent.
    pub fn load(&self, object_id: &ObjectId) -> anyhow::Result<Bytes> {
        if !self.contains(object_id) {
            return Err(ShoalError::ObjectNotFound(*object_id).into());
        }

        self.read_object(self.path.join(object_id.to_path()))
    }

    pub fn parse_object(&self, object_id: &ObjectId) -> anyhow::Result<ObjectBox> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Blob => Ok(ObjectBox::Blob(Box::new(Blob::deserialize(object_reader)?))),
            ObjectType::Tree => Ok(ObjectBox::Tree(Box::new(Tree::deserialize(object_reader)?))),
            ObjectType::Commit => Ok(ObjectBox::Commit(Box::new(Commit::deserialize(
                object_reader,
            )?))),
        }
    }

    pub fn parse_object_as_blob(&self, object_id: &ObjectId) -> anyhow::Result<Option<Blob>> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Blob => Ok(Some(Blob::deserialize(object_reader)?)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_tree(&self, object_id: &ObjectId) -> anyhow::Result<Option<Tree>> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Tree => Ok(Some(Tree::deserialize(object_reader)?)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_commit(&self, object_id: &ObjectId) -> anyhow::Result<Option<Commit>> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Commit => Ok(Some(Commit::deserialize(object_reader)?)),
            _ => Ok(None),
        }
    }

    /// Load a commit, failing when the id names something else
    pub fn load_commit(&self, object_id: &ObjectId) -> anyhow::Result<Commit> {
        self.parse_object_as_commit(object_id)?
            .with_context(|| format!("object {object_id} is not a commit"))
    }

    /// Load a tree, failing when the id names something else
    pub fn load_tree(&self, object_id: &ObjectId) -> anyhow::Result<Tree> {
        self.parse_object_as_tree(object_id)?
            .with_context(|| format!("object {object_id} is not a tree"))
    }

    pub fn get_object_type(&self, object_id: &ObjectId) -> anyhow::Result<ObjectType> {
        let (object_type, _) = self.parse_object_as_bytes(object_id)?;
        Ok(object_type)
    }

    fn parse_object_as_bytes(
        &self,
        object_id: &ObjectId,
    ) -> anyhow::Result<(ObjectType, Cursor<Bytes>)> {
        let object_content = self.load(object_id)?;
        let mut object_reader = Cursor::new(object_content);

        let (object_type, _) = ObjectType::parse_header(&mut object_reader)
            .with_context(|| format!("Invalid header in object {object_id}"))?;

        Ok((object_type, object_reader))
    }

    /// Every stored object id, in no particular order
    pub fn object_ids(&self) -> anyhow::Result<Vec<ObjectId>> {
        let mut object_ids = Vec::new();
        if !self.path.is_dir() {
            return Ok(object_ids);
        }

        for entry in WalkDir::new(&self.path).min_depth(2).max_depth(2) {
            let entry = entry.context("Unable to list object directory")?;
            if !entry.file_type().is_file() {
                continue;
            }

            let dir_name = entry
                .path()
                .parent()
                .and_then(Path::file_name)
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();
            let file_name = entry.file_name().to_string_lossy();

            // temp files share the fan-out directories
            if let Ok(oid) = ObjectId::try_parse(format!("{dir_name}{file_name}")) {
                object_ids.push(oid);
            }
        }

        Ok(object_ids)
    }

    /// Find all objects whose id starts with the given hex prefix
    ///
    /// Used to resolve abbreviated ids; more than one match means the prefix
    /// is ambiguous.
    pub fn find_objects_by_prefix(&self, prefix: &str) -> anyhow::Result<Vec<ObjectId>> {
        if !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(Vec::new());
        }
        let prefix = prefix.to_ascii_lowercase();
        let prefix = prefix.as_str();

        if prefix.len() >= 2 {
            let dir_path = self.path.join(&prefix[..2]);
            if !dir_path.is_dir() {
                return Ok(Vec::new());
            }

            let mut matches = Vec::new();
            for entry in std::fs::read_dir(&dir_path)? {
                let entry = entry?;
                let full_oid = format!("{}{}", &prefix[..2], entry.file_name().to_string_lossy());
                if let Ok(oid) = ObjectId::try_parse(full_oid)
                    && oid.starts_with_hex(prefix)
                {
                    matches.push(oid);
                }
            }
            return Ok(matches);
        }

        Ok(self
            .object_ids()?
            .into_iter()
            .filter(|oid| oid.starts_with_hex(prefix))
            .collect())
    }

    fn read_object(&self, object_path: PathBuf) -> anyhow::Result<Bytes> {
        let object_content = std::fs::read(&object_path).context(format!(
            "Unable to read object file {}",
            object_path.display()
        ))?;

        Self::decompress(object_content.into())
    }

    fn write_object(&self, object_id: &ObjectId, object_content: Bytes) -> anyhow::Result<()> {
        let object_path = self.path.join(object_id.to_path());
        let object_dir = object_path
            .parent()
            .context(format!("Invalid object path {}", object_path.display()))?;
        std::fs::create_dir_all(object_dir).context(format!(
            "Unable to create object directory {}",
            object_dir.display()
        ))?;

        let temp_object_path = object_dir.join(Self::generate_temp_name());
        let object_content = Self::compress(object_content)?;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_object_path)
            .context(format!(
                "Unable to open object file {}",
                temp_object_path.display()
            ))?;

        file.write_all(&object_content).context(format!(
            "Unable to write object file {}",
            temp_object_path.display()
        ))?;

        // rename the temp file to the object file to make it atomic
        std::fs::rename(&temp_object_path, &object_path).context(format!(
            "Unable to rename object file to {}",
            object_path.display()
        ))?;

        tracing::trace!(oid = %object_id, "stored object");
        Ok(())
    }

    fn compress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(&data)
            .context("Unable to compress object content")?;

        encoder
            .finish()
            .map(|compressed_content| compressed_content.into())
            .context("Unable to finish compressing object content")
    }

    fn decompress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(&*data);
        let mut decompressed_content = Vec::new();
        decoder
            .read_to_end(&mut decompressed_content)
            .context("Unable to decompress object content")?;

        Ok(decompressed_content.into())
    }

    fn generate_temp_name() -> String {
        format!("tmp-obj-{}", rand::random::<u32>())
    }
}

/// Memoised slim commits for graph walks
///
/// Walks revisit the same commits from several directions; decoding each
/// commit once keeps them proportional to the number of distinct commits.
/// Entries are cached untagged (`Boundary::Full`); the caller applies its own
/// shallow view.
#[derive(Debug, Default)]
pub struct CommitCache {
    commits: RefCell<HashMap<ObjectId, SlimCommit>>,
}

impl CommitCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load_slim_commit(
        &self,
        database: &Database,
        oid: &ObjectId,
    ) -> anyhow::Result<SlimCommit> {
        if let Some(commit) = self.commits.borrow().get(oid) {
            return Ok(commit.clone());
        }

        let slim_commit = database.load_commit(oid)?.to_slim(*oid, Boundary::Full);
        self.commits
            .borrow_mut()
            .insert(*oid, slim_commit.clone());

        Ok(slim_commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::commit::Author;
    use crate::artifacts::objects::entry_mode::FileMode;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn database() -> (TempDir, Database) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let database = Database::new(dir.path().join("objects").into_boxed_path());
        (dir, database)
    }

    #[rstest]
    fn missing_object_is_typed_not_found(database: (TempDir, Database)) {
        let (_dir, database) = database;
        let oid = Blob::from("never stored").object_id().unwrap();

        assert!(!database.contains(&oid));
        let error = ShoalError::from(database.parse_object(&oid).unwrap_err());
        assert!(matches!(error, ShoalError::ObjectNotFound(missing) if missing == oid));
    }

    #[rstest]
    fn stored_commit_loads_back(database: (TempDir, Database)) {
        let (_dir, database) = database;
        let blob_oid = database.store(&Blob::from("hello\n")).unwrap();
        let tree = Tree::new().with_entry("hello.txt", FileMode::Regular.into(), blob_oid);
        let tree_oid = database.store(&tree).unwrap();
        let author = Author::try_from("A U Thor <author@example.com> 1700000000 +0000").unwrap();
        let commit = Commit::new(vec![], tree_oid, author, "Initial".to_string());

        let commit_oid = database.store(&commit).unwrap();

        assert_eq!(database.load_commit(&commit_oid).unwrap(), commit);
        assert_eq!(database.load_tree(&tree_oid).unwrap(), tree);
        assert!(database.load_tree(&commit_oid).is_err());
        assert_eq!(database.get_object_type(&blob_oid).unwrap(), ObjectType::Blob);

        let mut stored = database.object_ids().unwrap();
        stored.sort();
        let mut expected = vec![blob_oid, tree_oid, commit_oid];
        expected.sort();
        assert_eq!(stored, expected);
    }

    #[rstest]
    fn prefix_lookup_finds_unique_match(database: (TempDir, Database)) {
        let (_dir, database) = database;
        let oid = database.store(&Blob::from("hello\n")).unwrap();

        assert_eq!(database.find_objects_by_prefix("ce0136").unwrap(), vec![oid]);
        assert_eq!(database.find_objects_by_prefix("c").unwrap(), vec![oid]);
        assert!(database.find_objects_by_prefix("ffff").unwrap().is_empty());
    }

    #[rstest]
    fn packed_round_trip_rejects_tampering(database: (TempDir, Database)) {
        let (_dir, database) = database;
        let oid = database.store(&Blob::from("original")).unwrap();
        let packed = database.load_packed(&oid).unwrap();

        let tampered = PackedObject::new(oid, Bytes::from_static(b"blob 8\0tampered"));

        assert!(database.store_packed(&tampered).is_err());
        assert_eq!(database.store_packed(&packed).unwrap(), oid);
    }

    #[rstest]
    fn commit_cache_decodes_once(database: (TempDir, Database)) {
        let (_dir, database) = database;
        let tree_oid = database.store(&Tree::new()).unwrap();
        let author = Author::try_from("A <a@b> 1700000000 +0000").unwrap();
        let commit_oid = database
            .store(&Commit::new(vec![], tree_oid, author, "root".to_string()))
            .unwrap();
        let cache = CommitCache::new();

        let first = cache.get_or_load_slim_commit(&database, &commit_oid).unwrap();
        std::fs::remove_file(database.objects_path().join(commit_oid.to_path())).unwrap();
        let second = cache.get_or_load_slim_commit(&database, &commit_oid).unwrap();

        assert_eq!(first, second);
        assert_eq!(second.tree_oid, tree_oid);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn identical_content_is_stored_once(content in proptest::collection::vec(any::<u8>(), 0..256)) {
            let (_dir, database) = database();

            let first = database.store(&Blob::new(Bytes::from(content.clone()))).unwrap();
            let second = database.store(&Blob::new(Bytes::from(content))).unwrap();

            prop_assert_eq!(first, second);
            prop_assert_eq!(database.object_ids().unwrap(), vec![first]);
        }
    }
}
