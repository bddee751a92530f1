use crate::areas::repository::Repository;
use crate::artifacts::branch::REMOTES_PREFIX;
use crate::artifacts::branch::branch_name::RefName;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::objects::commit::SlimCommit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::ShoalResult;
use colored::Colorize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub oneline: bool,
    pub max_count: Option<usize>,
    /// Revision to start from; HEAD when absent
    pub start: Option<String>,
}

impl Repository {
    /// Show history newest first, stopping at shallow roots (marked `grafted`)
    pub fn log(&self, options: &LogOptions) -> ShoalResult<()> {
        let start = match &options.start {
            Some(revision) => Some(Revision::try_parse(revision)?.resolve(self)?),
            None => self.refs().read_head()?,
        };
        let Some(start) = start else {
            let current = self.refs().current_ref()?;
            writeln!(
                self.writer(),
                "fatal: your current branch '{}' does not have any commits yet",
                current.short_name()
            )?;
            return Ok(());
        };

        let reverse_refs = self.refs().reverse_refs()?;
        let current = self.refs().current_ref()?;
        let graph = self.graph();

        for commit in graph
            .ancestors(start)
            .take(options.max_count.unwrap_or(usize::MAX))
        {
            let commit = commit?;
            let decoration = Self::decoration(&commit, &reverse_refs, &current);
            if options.oneline {
                self.show_commit_oneline(&commit, &decoration)?;
            } else {
                self.show_commit_medium(&commit, &decoration)?;
            }
        }

        Ok(())
    }

    fn show_commit_medium(&self, commit: &SlimCommit, decoration: &str) -> ShoalResult<()> {
        let full = self.database().load_commit(&commit.oid)?;

        writeln!(
            self.writer(),
            "{}{}",
            format!("commit {}", commit.oid).yellow(),
            decoration
        )?;
        writeln!(self.writer(), "Author: {}", full.author().display_name())?;
        writeln!(self.writer(), "Date:   {}", full.author().readable_timestamp())?;
        writeln!(self.writer())?;
        for message_line in full.message().lines() {
            writeln!(self.writer(), "    {}", message_line)?;
        }
        writeln!(self.writer())?;

        Ok(())
    }

    fn show_commit_oneline(&self, commit: &SlimCommit, decoration: &str) -> ShoalResult<()> {
        let full = self.database().load_commit(&commit.oid)?;

        writeln!(
            self.writer(),
            "{}{} {}",
            commit.oid.to_short_oid().yellow(),
            decoration,
            full.short_message()
        )?;

        Ok(())
    }

    /// ` (grafted, HEAD -> master, origin/master)`
    fn decoration(
        commit: &SlimCommit,
        reverse_refs: &HashMap<ObjectId, Vec<RefName>>,
        current: &RefName,
    ) -> String {
        let mut names = Vec::new();
        if commit.is_shallow_root() {
            names.push("grafted".yellow().bold().to_string());
        }
        for ref_name in reverse_refs.get(&commit.oid).into_iter().flatten() {
            let short = ref_name.short_name();
            let name = if ref_name == current {
                format!("{} -> {}", "HEAD".cyan().bold(), short.green().bold())
            } else if ref_name.as_ref_path().starts_with(REMOTES_PREFIX) {
                short.red().bold().to_string()
            } else {
                short.green().bold().to_string()
            };
            names.push(name);
        }

        match names.is_empty() {
            true => String::new(),
            false => format!(" ({})", names.join(", ")),
        }
    }
}
