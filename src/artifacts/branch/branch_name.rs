use crate::artifacts::branch::{HEADS_PREFIX, INVALID_BRANCH_NAME_REGEX, REMOTES_PREFIX};
use anyhow::Context;

pub const HEAD_REF_NAME: &str = "HEAD";

/// Short branch name, e.g. `master` or `feature/shallow-push`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct BranchName(String);

impl BranchName {
    pub fn try_parse(name: impl Into<String>) -> anyhow::Result<Self> {
        let name = name.into();
        if name.is_empty() {
            anyhow::bail!("branch name cannot be empty");
        }

        let re = regex::Regex::new(INVALID_BRANCH_NAME_REGEX)
            .with_context(|| format!("invalid branch name regex: {INVALID_BRANCH_NAME_REGEX}"))?;

        if re.is_match(&name) {
            anyhow::bail!("invalid branch name: {}", name);
        } else {
            Ok(Self(name))
        }
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fully qualified ref name
///
/// Either `HEAD`, a local branch `refs/heads/<branch>`, or a remote-tracking
/// ref `refs/remotes/<remote>/<branch>`. Doubles as the ref's path relative
/// to the `.git` directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefName(String);

impl RefName {
    pub fn head() -> Self {
        Self(HEAD_REF_NAME.to_string())
    }

    pub fn branch(branch: &BranchName) -> Self {
        Self(format!("{HEADS_PREFIX}{branch}"))
    }

    pub fn remote_tracking(remote: &str, branch: &BranchName) -> Self {
        Self(format!("{REMOTES_PREFIX}{remote}/{branch}"))
    }

    /// Parse a full ref name, or qualify a bare branch name as `refs/heads/<name>`
    pub fn try_parse(name: impl AsRef<str>) -> anyhow::Result<Self> {
        let name = name.as_ref();
        if name == HEAD_REF_NAME {
            return Ok(Self::head());
        }

        match name.strip_prefix("refs/") {
            Some(rest) => {
                BranchName::try_parse(rest)
                    .with_context(|| format!("invalid ref name: {name}"))?;
                if !name.starts_with(HEADS_PREFIX) && !name.starts_with(REMOTES_PREFIX) {
                    anyhow::bail!("unsupported ref namespace: {name}");
                }
                Ok(Self(name.to_string()))
            }
            None => Ok(Self::branch(&BranchName::try_parse(name)?)),
        }
    }

    pub fn is_head(&self) -> bool {
        self.0 == HEAD_REF_NAME
    }

    pub fn as_ref_path(&self) -> &str {
        &self.0
    }

    /// Branch part of a `refs/heads/*` or `refs/remotes/<remote>/*` ref
    pub fn branch_name(&self) -> Option<BranchName> {
        let short = match self.0.strip_prefix(HEADS_PREFIX) {
            Some(branch) => branch,
            None => self.0.strip_prefix(REMOTES_PREFIX)?.split_once('/')?.1,
        };

        BranchName::try_parse(short).ok()
    }

    /// Name for display: `master` or `origin/master`
    pub fn short_name(&self) -> &str {
        self.0
            .strip_prefix(HEADS_PREFIX)
            .or_else(|| self.0.strip_prefix(REMOTES_PREFIX))
            .unwrap_or(&self.0)
    }
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
