use crate::artifacts::branch::branch_name::RefName;
use crate::artifacts::objects::object_id::ObjectId;
use colored::Colorize;

/// What a push or fetch changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSummary {
    pub ref_name: RefName,
    pub old_tip: Option<ObjectId>,
    pub new_tip: ObjectId,
    /// Transferred object ids in transfer order
    pub objects: Vec<ObjectId>,
    pub shallow_added: Vec<ObjectId>,
    pub shallow_removed: Vec<ObjectId>,
}

impl TransferSummary {
    pub fn is_up_to_date(&self) -> bool {
        self.old_tip == Some(self.new_tip) && self.objects.is_empty()
    }

    /// One-line report such as ` abc1234..def5678  master -> origin/master`
    pub fn display(&self, source: &str) -> String {
        let range = match self.old_tip {
            Some(old) if old == self.new_tip => return format!(" = [up to date]      {source}"),
            Some(old) => format!("{}..{}", old.to_short_oid(), self.new_tip.to_short_oid()),
            None => "* [new branch]".green().to_string(),
        };

        let mut line = format!(
            " {:<17} {} -> {}",
            range,
            source,
            self.ref_name.short_name()
        );
        if !self.objects.is_empty() {
            line.push_str(&format!(" ({} objects)", self.objects.len()));
        }
        if !self.shallow_added.is_empty() || !self.shallow_removed.is_empty() {
            line.push_str(&format!(
                " [shallow +{} -{}]",
                self.shallow_added.len(),
                self.shallow_removed.len()
            ));
        }

        line
    }
}
