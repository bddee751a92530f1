use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::objects::OBJECT_ID_LENGTH;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::ShoalResult;

impl Repository {
    /// Pretty-print any stored object, named by id or by revision
    pub fn cat_file(&self, object: &str) -> ShoalResult<()> {
        let object_id = match object.len() {
            OBJECT_ID_LENGTH => ObjectId::try_parse(object)?,
            _ => Revision::try_parse(object)?.resolve(self)?,
        };

        let object = self.database().parse_object(&object_id)?;
        write!(self.writer(), "{}", object.display())?;

        Ok(())
    }
}
