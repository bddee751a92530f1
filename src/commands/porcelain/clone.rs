use crate::areas::config::DEFAULT_REMOTE;
use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::{BranchName, RefName};
use crate::artifacts::transfer::summary::TransferSummary;
use crate::artifacts::transport::{self, Transport};
use crate::errors::{ShoalError, ShoalResult};

impl Repository {
    /// Initialize this repository as a single-branch clone of `url`
    ///
    /// `branch` defaults to the branch the remote's HEAD points at. `depth`
    /// of `None` or `Some(0)` clones the complete history, `Some(n)` the
    /// newest `n` commits. Returns `None` when the remote has no commits yet.
    pub fn clone_repository(
        &mut self,
        url: &str,
        branch: Option<&BranchName>,
        depth: Option<u32>,
    ) -> ShoalResult<Option<TransferSummary>> {
        writeln!(self.writer(), "Cloning into '{}'...", self.path().display())?;
        let transport = transport::connect(url)?;

        self.clone_with(transport.as_ref(), url, branch, depth)
    }

    pub fn clone_with(
        &mut self,
        transport: &dyn Transport,
        url: &str,
        branch: Option<&BranchName>,
        depth: Option<u32>,
    ) -> ShoalResult<Option<TransferSummary>> {
        self.init_quietly()?;
        let _lock = self.lock()?;
        self.config_mut().set_remote(DEFAULT_REMOTE, url);
        self.save_config()?;

        let advertisement = transport.advertise_refs()?;
        let branch = match branch {
            Some(branch) => branch.clone(),
            None => match advertisement.head.as_ref().and_then(RefName::branch_name) {
                Some(branch) => branch,
                None => BranchName::try_parse(self.config().default_branch.clone())?,
            },
        };
        let local_ref = RefName::branch(&branch);

        if advertisement.tip(&local_ref).is_none() {
            if !advertisement.refs.is_empty() {
                return Err(ShoalError::RefNotFound {
                    ref_name: local_ref.to_string(),
                });
            }
            self.refs().set_head(&local_ref)?;
            tracing::warn!(url, "cloned an empty repository");
            writeln!(self.writer(), "warning: You appear to have cloned an empty repository.")?;
            return Ok(None);
        }

        let summary = self.fetch_advertised(
            transport,
            &advertisement,
            DEFAULT_REMOTE,
            &branch,
            depth.filter(|depth| *depth > 0),
        )?;
        self.refs()
            .advance(&local_ref, None, summary.new_tip, &format!("clone: from {url}"))?;
        self.refs().set_head(&local_ref)?;

        tracing::info!(
            url,
            branch = %branch,
            objects = summary.objects.len(),
            shallow_roots = self.shallow().roots().len(),
            "cloned"
        );
        Ok(Some(summary))
    }

    fn init_quietly(&mut self) -> ShoalResult<()> {
        let writer = std::mem::replace(&mut *self.writer(), Box::new(std::io::sink()));
        let result = self.init();
        *self.writer() = writer;

        result
    }
}
