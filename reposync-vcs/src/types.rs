use std::fmt;

/// A git object id, stored as its lowercase hex string form.
///
/// Kept as a plain `String` rather than `gix::ObjectId` at this boundary so
/// callers that only ever invoke the `git` binary don't need to link against
/// `gix`'s binary OID representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(String);

impl Oid {
    pub fn new(hex: impl Into<String>) -> Self {
        Oid(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<gix::ObjectId> for Oid {
    fn from(id: gix::ObjectId) -> Self {
        Oid(id.to_hex().to_string())
    }
}

/// A fully-qualified ref name, e.g. `refs/heads/main`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefName(String);

impl RefName {
    pub fn new(name: impl Into<String>) -> Self {
        RefName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_head(&self) -> bool {
        self.0 == "HEAD"
    }

    pub fn short_branch_name(&self) -> Option<&str> {
        self.0.strip_prefix("refs/heads/")
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a fetch actually changed, enough for the sync scheduler and
/// reconciler to decide whether local work (checkout, rebase) is needed.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub updated_refs: Vec<(RefName, Oid)>,
    /// True when the remote advertised no new objects at all — lets the
    /// scheduler skip this project on the next pass's "still dirty" check.
    pub no_op: bool,
}

/// Options controlling how a project's network half is fetched, mirroring
/// the manifest-derived and command-line knobs (`repo.depth`, `--current-branch`,
/// reference/mirror dirs).
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub depth: Option<u32>,
    pub current_branch_only: Option<RefName>,
    pub tags: bool,
    pub reference_dir: Option<std::path::PathBuf>,
    pub prune: bool,
    pub force_sync: bool,
}

/// The state of the working tree as reported by `git status --porcelain`,
/// condensed to what the reconciler needs.
#[derive(Debug, Clone, Default)]
pub struct WorkingTreeStatus {
    pub dirty_paths: Vec<String>,
}

impl WorkingTreeStatus {
    pub fn is_clean(&self) -> bool {
        self.dirty_paths.is_empty()
    }
}

/// The result of resolving HEAD: either attached to a branch, or detached at
/// a raw commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadState {
    Branch(RefName),
    Detached(Oid),
    Unborn,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_name_recognizes_head() {
        assert!(RefName::new("HEAD").is_head());
        assert!(!RefName::new("refs/heads/main").is_head());
    }

    #[test]
    fn ref_name_strips_heads_prefix() {
        assert_eq!(RefName::new("refs/heads/main").short_branch_name(), Some("main"));
        assert_eq!(RefName::new("refs/tags/v1").short_branch_name(), None);
    }

    #[test]
    fn working_tree_status_is_clean_when_no_dirty_paths() {
        assert!(WorkingTreeStatus::default().is_clean());
        assert!(!WorkingTreeStatus { dirty_paths: vec!["a.txt".to_owned()] }.is_clean());
    }

    #[test]
    fn oid_roundtrips_as_str() {
        let oid = Oid::new("deadbeef");
        assert_eq!(oid.as_str(), "deadbeef");
        assert_eq!(oid.to_string(), "deadbeef");
    }
}
