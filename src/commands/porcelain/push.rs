//! Push: publish a local branch to a remote
//!
//! The remote-tracking ref is the lease: a push is based on what was last
//! fetched, and if the remote moved since then the push is refused with
//! [`ShoalError::StaleRef`] until the caller fetches again (or forces).
//! The remote applies the update with its own compare-and-swap, so a race
//! between two pushers is caught there too.

use crate::areas::repository::Repository;
use crate::artifacts::branch::HEADS_PREFIX;
use crate::artifacts::branch::branch_name::RefName;
use crate::artifacts::transfer::negotiator::{PushNegotiator, PushOptions};
use crate::artifacts::transfer::request::RefUpdate;
use crate::artifacts::transfer::summary::TransferSummary;
use crate::artifacts::transport::{self, Transport};
use crate::errors::{ShoalError, ShoalResult};
use anyhow::Context;
use tokio_util::sync::CancellationToken;

/// `<src>:<dst>`, or a single ref used for both sides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refspec {
    pub src: RefName,
    pub dst: RefName,
}

impl Refspec {
    pub fn try_parse(refspec: &str) -> anyhow::Result<Self> {
        let (src, dst) = refspec.split_once(':').unwrap_or((refspec, refspec));
        let src = RefName::try_parse(src).with_context(|| format!("invalid refspec: {refspec}"))?;
        let dst = RefName::try_parse(dst).with_context(|| format!("invalid refspec: {refspec}"))?;
        if !dst.as_ref_path().starts_with(HEADS_PREFIX) {
            anyhow::bail!("push destination must be a branch: {refspec}");
        }

        Ok(Self { src, dst })
    }

    /// The current branch pushed to the branch of the same name
    pub fn current(repository: &Repository) -> anyhow::Result<Self> {
        let current = repository.refs().current_ref()?;
        Self::try_parse(current.as_ref_path())
    }
}

impl Repository {
    pub fn push(
        &mut self,
        remote: &str,
        refspec: &Refspec,
        options: PushOptions,
        cancellation: CancellationToken,
    ) -> ShoalResult<TransferSummary> {
        let url = self.config().remote_url(remote)?.to_string();
        let transport = transport::connect(&url)?;

        let summary = self.push_with(transport.as_ref(), remote, refspec, options, cancellation)?;

        writeln!(self.writer(), "To {url}")?;
        writeln!(
            self.writer(),
            "{}",
            summary.display(refspec.src.short_name())
        )?;
        Ok(summary)
    }

    pub fn push_with(
        &mut self,
        transport: &dyn Transport,
        remote: &str,
        refspec: &Refspec,
        options: PushOptions,
        cancellation: CancellationToken,
    ) -> ShoalResult<TransferSummary> {
        let _lock = self.lock()?;

        let local_tip = self
            .refs()
            .read_ref(&refspec.src)?
            .ok_or_else(|| ShoalError::RefNotFound {
                ref_name: refspec.src.to_string(),
            })?;
        let advertisement = transport.advertise_refs()?;
        let remote_tip = advertisement.tip(&refspec.dst);

        let branch = refspec
            .dst
            .branch_name()
            .context("push destination must be a branch")?;
        let tracking = RefName::remote_tracking(remote, &branch);
        let leased = self.refs().read_ref(&tracking)?;
        if leased != remote_tip && !options.force {
            tracing::warn!(
                ref_name = %tracking,
                leased = ?leased,
                advertised = ?remote_tip,
                "remote moved since the last fetch"
            );
            return Err(ShoalError::StaleRef {
                ref_name: tracking.to_string(),
                expected: leased,
                actual: remote_tip,
            });
        }

        let graph = self.graph();
        let plan = PushNegotiator::new(&graph, cancellation.clone()).negotiate(
            &refspec.dst,
            local_tip,
            &advertisement,
            options,
        )?;

        if !plan.is_up_to_date() {
            let objects = plan
                .objects
                .iter()
                .map(|oid| self.database().load_packed(oid))
                .collect::<anyhow::Result<Vec<_>>>()?;
            if cancellation.is_cancelled() {
                return Err(ShoalError::Cancelled);
            }
            transport.send_objects(&RefUpdate::new(refspec.dst.clone(), remote_tip, local_tip), objects)?;
        }

        if leased != Some(local_tip) {
            self.refs()
                .advance(&tracking, leased, local_tip, &format!("update by push: {}", refspec.dst))?;
        }

        tracing::info!(
            ref_name = %refspec.dst,
            commits = plan.commits.len(),
            objects = plan.objects.len(),
            "pushed"
        );
        Ok(TransferSummary {
            ref_name: tracking,
            old_tip: remote_tip,
            new_tip: local_tip,
            objects: plan.objects,
            shallow_added: Vec::new(),
            shallow_removed: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_ref_pushes_to_itself() {
        let refspec = Refspec::try_parse("master").unwrap();

        assert_eq!(refspec.src.to_string(), "refs/heads/master");
        assert_eq!(refspec.dst, refspec.src);
    }

    #[test]
    fn explicit_source_and_destination() {
        let refspec = Refspec::try_parse("refs/heads/topic:refs/heads/master").unwrap();

        assert_eq!(refspec.src.to_string(), "refs/heads/topic");
        assert_eq!(refspec.dst.to_string(), "refs/heads/master");
    }

    #[test]
    fn destination_must_be_a_local_branch() {
        assert!(Refspec::try_parse("master:refs/remotes/origin/master").is_err());
        assert!(Refspec::try_parse("master:HEAD").is_err());
    }
}
