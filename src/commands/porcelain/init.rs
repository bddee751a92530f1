use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::{BranchName, RefName};
use crate::errors::ShoalResult;
use anyhow::Context;
use std::fs;

impl Repository {
    /// Create the repository layout, pointing HEAD at the default branch
    ///
    /// Re-running on an existing repository keeps its objects, refs and
    /// configuration.
    pub fn init(&mut self) -> ShoalResult<()> {
        let reinitialized = self.is_initialized();

        fs::create_dir_all(self.database().objects_path())
            .context("Failed to create .git/objects directory")?;
        fs::create_dir_all(self.refs().heads_path())
            .context("Failed to create .git/refs/heads directory")?;
        fs::create_dir_all(self.refs().remotes_path())
            .context("Failed to create .git/refs/remotes directory")?;
        fs::create_dir_all(self.refs().logs_path())
            .context("Failed to create .git/logs directory")?;

        if !self.refs().head_path().exists() {
            let default_branch = BranchName::try_parse(self.config().default_branch.clone())?;
            self.refs()
                .set_head(&RefName::branch(&default_branch))
                .context("Failed to create initial HEAD reference")?;
        }
        self.save_config()?;

        tracing::debug!(path = %self.path().display(), reinitialized, "initialized repository");
        writeln!(
            self.writer(),
            "{} empty repository in {}",
            if reinitialized { "Reinitialized" } else { "Initialized" },
            self.path().display()
        )?;

        Ok(())
    }
}
