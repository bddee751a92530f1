use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::ShoalResult;

impl Repository {
    /// Print the best common ancestor of two revisions within the local,
    /// shallow-bounded history. Prints nothing when there is none.
    pub fn merge_base(&self, a: &str, b: &str) -> ShoalResult<Option<ObjectId>> {
        let a = Revision::try_parse(a)?.resolve(self)?;
        let b = Revision::try_parse(b)?.resolve(self)?;

        let base = self.graph().merge_base(&a, &b)?;
        if let Some(base) = base {
            writeln!(self.writer(), "{}", base)?;
        }

        Ok(base)
    }
}
