use std::path::Path;

use crate::error::VcsError;
use crate::types::{FetchOptions, FetchOutcome, HeadState, Oid, RefName, WorkingTreeStatus};

/// Everything the synchronization engine needs from a single repository's
/// on-disk git directory. One object per project, constructed against that
/// project's `.git` (or project-objects dir, for the mirror case).
///
/// Object-safe by construction — no generic methods, no associated types —
/// so the scheduler can hold a `Vec<Box<dyn VcsDriver>>` rather than a
/// monomorphized-per-project type, and tests can substitute a fake driver
/// without touching the filesystem.
pub trait VcsDriver: Send + Sync {
    /// The working directory (or bare repo root) this driver operates on.
    fn root(&self) -> &Path;

    /// `git init`, optionally bare (used for the object-store/mirror half of
    /// a project before the first fetch).
    fn init(&self, bare: bool) -> Result<(), VcsError>;

    /// Fetch `refspecs` from `remote_url`, returning which refs moved.
    fn fetch(
        &self,
        remote_url: &str,
        refspecs: &[String],
        options: &FetchOptions,
    ) -> Result<FetchOutcome, VcsError>;

    /// Clone-as-fetch: populate an empty repository from `remote_url`.
    fn clone_from(&self, remote_url: &str, options: &FetchOptions) -> Result<FetchOutcome, VcsError>;

    /// `git ls-remote`, used by the ref index to decide whether a fetch is
    /// even necessary before paying for one.
    fn ls_remote(&self, remote_url: &str) -> Result<Vec<(RefName, Oid)>, VcsError>;

    /// Resolve `rev` (branch, tag, or partial SHA) to a full object id.
    fn rev_parse(&self, rev: &str) -> Result<Oid, VcsError>;

    /// Resolve HEAD to either an attached branch or a detached commit.
    fn head_state(&self) -> Result<HeadState, VcsError>;

    /// `git symbolic-ref`: point `name` (usually `HEAD`) at `target`.
    fn symbolic_ref(&self, name: &str, target: &RefName) -> Result<(), VcsError>;

    /// `git update-ref`.
    fn update_ref(&self, name: &RefName, oid: &Oid) -> Result<(), VcsError>;

    /// `git checkout`, either to a branch (creating a tracking branch if
    /// `create_branch` is true) or to a detached commit.
    fn checkout(&self, target: &str, create_branch: Option<&str>) -> Result<(), VcsError>;

    /// `git reset --hard <oid>`.
    fn reset_hard(&self, oid: &Oid) -> Result<(), VcsError>;

    /// `git rebase <upstream>` onto the given ref, returning `Ok(false)` on
    /// conflict (left for the caller to report, not resolved automatically).
    fn rebase(&self, upstream: &RefName) -> Result<bool, VcsError>;

    /// `git merge --ff-only <oid>` (or a real merge if `ff_only` is false).
    fn merge(&self, oid: &Oid, ff_only: bool) -> Result<bool, VcsError>;

    /// `git cherry-pick <oid>`.
    fn cherry_pick(&self, oid: &Oid) -> Result<bool, VcsError>;

    /// `git status --porcelain`, condensed.
    fn status(&self) -> Result<WorkingTreeStatus, VcsError>;

    /// `git diff --name-only <a> <b>` (or working tree vs `a` when `b` is `None`).
    fn diff_names(&self, a: &Oid, b: Option<&Oid>) -> Result<Vec<String>, VcsError>;

    /// `git rev-list --count <range>`.
    fn rev_list_count(&self, range: &str) -> Result<u32, VcsError>;

    /// `git log --format=%H%x09%ae <range>`: every commit in `range` paired
    /// with its committer email, the input the reconciler needs to tell the
    /// user's own commits apart from someone else's when a branch has
    /// diverged from its upstream.
    fn rev_list_with_committers(&self, range: &str) -> Result<Vec<(Oid, String)>, VcsError>;

    /// `git config --get <key>` scoped to this repository.
    fn read_config(&self, key: &str) -> Result<Option<String>, VcsError>;

    /// `git config <key> <value>` scoped to this repository.
    fn write_config(&self, key: &str, value: &str) -> Result<(), VcsError>;

    /// `git pack-refs --all`.
    fn pack_refs(&self) -> Result<(), VcsError>;

    /// `git gc --auto` (or a full gc when `aggressive` is set), configuring
    /// `pack.threads` to `pack_threads` for the duration of the call.
    fn gc(&self, aggressive: bool, pack_threads: usize) -> Result<(), VcsError>;

    /// `git push`, used by `repo upload`/`repo push`-style commands.
    fn push(&self, remote_url: &str, refspec: &str) -> Result<(), VcsError>;

    /// List submodule gitlinks recorded in the tree at `rev`, as
    /// (path, recorded commit) pairs — the seed for submodule discovery.
    fn ls_tree_gitlinks(&self, rev: &str) -> Result<Vec<(String, Oid)>, VcsError>;

    /// Parse the `.gitmodules` blob at `rev`, returning each declared
    /// submodule as (name, path, url). Returns an empty list if the blob
    /// does not exist at that revision.
    fn read_gitmodules(&self, rev: &str) -> Result<Vec<(String, String, String)>, VcsError>;
}
