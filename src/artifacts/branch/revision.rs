use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::{HEAD_REF_NAME, RefName};
use crate::artifacts::branch::{ANCESTOR_REGEX, PARENT_REGEX, REMOTES_PREFIX};
use crate::artifacts::objects::OBJECT_ID_LENGTH;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;

const HEAD_ALIAS: &str = "@";
const MIN_ABBREV_LENGTH: usize = 4;

/// A revision expression naming a commit
///
/// Supports:
/// - Ref names: `HEAD`, `@`, `master`, `origin/master`, `refs/heads/master`
/// - Full and abbreviated (4+ hex chars) object ids, tried after refs
/// - Parent notation: `<revision>^`
/// - Ancestor notation: `<revision>~<n>`
///
/// Parent steps stop at shallow roots: asking for the parent of a shallow
/// root is an error, since that commit is not part of the local history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revision {
    Ref(String),
    Ancestor(Box<Revision>, usize),
    Parent(Box<Revision>),
}

impl Revision {
    pub fn try_parse(revision: &str) -> anyhow::Result<Revision> {
        if revision.is_empty() {
            anyhow::bail!("empty revision");
        }

        let parent_regex = regex::Regex::new(PARENT_REGEX)
            .with_context(|| format!("invalid parent regex: {PARENT_REGEX}"))?;
        if let Some(caps) = parent_regex.captures(revision) {
            return Ok(Revision::Parent(Box::new(Self::try_parse(&caps[1])?)));
        }

        let ancestor_regex = regex::Regex::new(ANCESTOR_REGEX)
            .with_context(|| format!("invalid ancestor regex: {ANCESTOR_REGEX}"))?;
        if let Some(caps) = ancestor_regex.captures(revision) {
            let generations = caps[2]
                .parse::<usize>()
                .with_context(|| format!("failed to parse generations in revision: {revision}"))?;
            return Ok(Revision::Ancestor(
                Box::new(Self::try_parse(&caps[1])?),
                generations,
            ));
        }

        let name = if revision == HEAD_ALIAS {
            HEAD_REF_NAME
        } else {
            revision
        };
        // validates the name; resolution decides between ref and object id
        RefName::try_parse(name)?;

        Ok(Revision::Ref(name.to_string()))
    }

    pub fn resolve(&self, repository: &Repository) -> anyhow::Result<ObjectId> {
        match self {
            Revision::Ref(name) => Self::resolve_name(name, repository),
            Revision::Parent(base) => Self::parent_of(base.resolve(repository)?, repository),
            Revision::Ancestor(base, generations) => {
                let mut oid = base.resolve(repository)?;
                for _ in 0..*generations {
                    oid = Self::parent_of(oid, repository)?;
                }

                Ok(oid)
            }
        }
    }

    fn resolve_name(name: &str, repository: &Repository) -> anyhow::Result<ObjectId> {
        for candidate in Self::ref_candidates(name) {
            if let Some(oid) = repository.refs().read_ref(&candidate)? {
                return Ok(oid);
            }
        }

        if Self::looks_like_oid(name) {
            return Self::resolve_oid(name, repository);
        }

        anyhow::bail!("unknown revision: {name}")
    }

    /// `name` as given (bare names qualify to a branch), then as a
    /// remote-tracking ref
    fn ref_candidates(name: &str) -> Vec<RefName> {
        let mut candidates = Vec::new();
        if let Ok(ref_name) = RefName::try_parse(name) {
            candidates.push(ref_name);
        }
        if !name.starts_with("refs/")
            && name != HEAD_REF_NAME
            && let Ok(ref_name) = RefName::try_parse(format!("{REMOTES_PREFIX}{name}"))
        {
            candidates.push(ref_name);
        }

        candidates
    }

    fn parent_of(oid: ObjectId, repository: &Repository) -> anyhow::Result<ObjectId> {
        let commit = repository.graph().commit(&oid)?;
        if commit.is_shallow_root() {
            anyhow::bail!(
                "{} is a shallow root, its parent is not available locally",
                oid.to_short_oid()
            );
        }

        commit
            .parents
            .first()
            .copied()
            .with_context(|| format!("{} has no parent", oid.to_short_oid()))
    }

    fn resolve_oid(oid_str: &str, repository: &Repository) -> anyhow::Result<ObjectId> {
        if oid_str.len() == OBJECT_ID_LENGTH {
            let oid = ObjectId::try_parse(oid_str)?;
            Self::validate_oid_is_commit(&oid, repository)?;
            return Ok(oid);
        }

        let commit_matches = repository
            .database()
            .find_objects_by_prefix(oid_str)?
            .into_iter()
            .filter(|oid| {
                repository
                    .database()
                    .get_object_type(oid)
                    .is_ok_and(|object_type| object_type == ObjectType::Commit)
            })
            .collect::<Vec<_>>();

        match commit_matches.as_slice() {
            [] => anyhow::bail!("unknown revision: {oid_str}"),
            [oid] => Ok(*oid),
            candidates => {
                let mut error_msg = format!(
                    "short object id {} is ambiguous\nhint: The candidates are:",
                    oid_str
                );
                for oid in candidates {
                    error_msg.push_str(&format!("\nhint:   {} commit", oid.to_short_oid()));
                }
                anyhow::bail!(error_msg)
            }
        }
    }

    fn validate_oid_is_commit(oid: &ObjectId, repository: &Repository) -> anyhow::Result<()> {
        let obj_type = repository
            .database()
            .get_object_type(oid)
            .with_context(|| format!("object {} not found", oid))?;

        if obj_type != ObjectType::Commit {
            anyhow::bail!(
                "object {} is a {}, not a commit",
                oid.to_short_oid(),
                obj_type
            );
        }

        Ok(())
    }

    fn looks_like_oid(s: &str) -> bool {
        s.len() >= MIN_ABBREV_LENGTH
            && s.len() <= OBJECT_ID_LENGTH
            && s.chars().all(|c| c.is_ascii_hexdigit())
    }
}
