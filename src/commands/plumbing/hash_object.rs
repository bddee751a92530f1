use crate::areas::repository::Repository;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Object;
use crate::errors::ShoalResult;
use anyhow::Context;
use std::path::Path;

impl Repository {
    pub fn hash_object(&self, file: &Path, write: bool) -> ShoalResult<()> {
        let content = std::fs::read(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let object = Blob::new(content.into());

        let object_id = match write {
            true => self.database().store(&object)?,
            false => object.object_id()?,
        };
        writeln!(self.writer(), "{}", object_id)?;

        Ok(())
    }
}
