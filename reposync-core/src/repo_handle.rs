//! C2: the operations one project exposes to the scheduler and reconciler,
//! built on top of a [`VcsDriver`] (§4.2).

use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;
use reposync_vcs::{FetchOptions, FetchOutcome, ProcessGitDriver, VcsDriver, VcsError};
use tracing::{debug, warn};

use crate::project::Project;
use crate::ref_index::RefIndex;

/// Options controlling a single project's network half, mirroring the
/// scheduler's per-project fetch contract (§4.4).
#[derive(Debug, Clone, Default)]
pub struct FetchHalfOptions {
    pub quiet: bool,
    pub current_branch_only: bool,
    pub no_tags: bool,
    pub clone_bundle_allowed: bool,
    pub optimized_fetch: bool,
    pub force_sync: bool,
    pub depth: Option<u32>,
}

const MAX_FETCH_ATTEMPTS: usize = 2;

/// One logical project's handle to its git-dir/object-dir/worktree, wired
/// to a concrete [`VcsDriver`].
pub struct RepoHandle {
    pub name: String,
    pub gitdir: PathBuf,
    pub objdir: PathBuf,
    pub worktree: Option<PathBuf>,
    pub remote_url: String,
    pub revision_expr: String,
    driver: Box<dyn VcsDriver>,
}

impl RepoHandle {
    pub fn new(
        name: impl Into<String>,
        gitdir: PathBuf,
        objdir: PathBuf,
        worktree: Option<PathBuf>,
        remote_url: impl Into<String>,
        revision_expr: impl Into<String>,
        driver: Box<dyn VcsDriver>,
    ) -> Self {
        RepoHandle {
            name: name.into(),
            gitdir,
            objdir,
            worktree,
            remote_url: remote_url.into(),
            revision_expr: revision_expr.into(),
            driver,
        }
    }

    /// Build the handle for `project`, rooting its driver at the git-dir
    /// with the worktree attached when one exists (mirror projects have
    /// none); the object-dir is wired in separately by [`Self::ensure_layout`]
    /// rather than through the driver.
    pub fn for_project(project: &Project) -> Self {
        let driver: Box<dyn VcsDriver> = match &project.worktree {
            Some(worktree) => Box::new(ProcessGitDriver::with_worktree(&project.gitdir, worktree)),
            None => Box::new(ProcessGitDriver::new(&project.gitdir)),
        };
        RepoHandle::new(
            project.name.clone(),
            project.gitdir.clone(),
            project.objdir.clone(),
            project.worktree.clone(),
            project.remote_url.clone(),
            project.revision_id.clone().unwrap_or_else(|| project.revision_expr.clone()),
            driver,
        )
    }

    pub fn exists(&self) -> bool {
        self.gitdir.is_dir() && self.objdir.is_dir()
    }

    fn is_sha_pin(&self) -> bool {
        self.revision_expr.len() == 40
            && self.revision_expr.bytes().all(|b| b.is_ascii_hexdigit())
    }

    /// Init-or-update the git-dir and wire it to the shared object-dir
    /// (§4.4 step 1, and the manifest-format alternates shim this replaces
    /// Google's `repo`'s `objdir != gitdir` clone-then-relink dance with).
    ///
    /// When `objdir` differs from `gitdir` (the common case: one object
    /// store per project name, shared across every checkout of it), a bare
    /// repository lives at `objdir` and `gitdir` points at it via
    /// `objects/info/alternates` rather than duplicating history. The first
    /// project to touch a given `objdir` creates it; every later one just
    /// links against it.
    fn ensure_layout(&self) -> Result<(), VcsError> {
        let shares_objdir = self.objdir != self.gitdir;

        if shares_objdir && !self.objdir.is_dir() {
            std::fs::create_dir_all(&self.objdir).map_err(|source| VcsError::Spawn {
                dir: self.objdir.display().to_string(),
                source,
            })?;
            ProcessGitDriver::new(&self.objdir).init(true)?;
        }

        if !self.gitdir.is_dir() {
            self.driver.init(self.worktree.is_none())?;
            if shares_objdir {
                self.link_alternates()?;
                self.share_reference_files()?;
            }
        } else if shares_objdir {
            // Re-assert the alternates link; a hand-pruned or re-created
            // gitdir should not silently lose its shared object store.
            self.link_alternates()?;
        }

        Ok(())
    }

    fn link_alternates(&self) -> Result<(), VcsError> {
        let info_dir = self.gitdir.join("objects").join("info");
        std::fs::create_dir_all(&info_dir).map_err(|source| VcsError::Spawn {
            dir: info_dir.display().to_string(),
            source,
        })?;
        let alternates_path = info_dir.join("alternates");
        let target = self.objdir.join("objects");
        std::fs::write(&alternates_path, format!("{}\n", target.display())).map_err(|source| {
            VcsError::Spawn { dir: alternates_path.display().to_string(), source }
        })
    }

    /// Share `description`/`info`/`hooks`/`rr-cache` from the object-dir so
    /// every worktree pointed at it picks up the same hooks and merge
    /// conflict cache without re-copying history.
    fn share_reference_files(&self) -> Result<(), VcsError> {
        for name in ["description", "info", "hooks", "rr-cache"] {
            let source = self.objdir.join(name);
            if !source.exists() {
                continue;
            }
            let dest = self.gitdir.join(name);
            if dest.exists() {
                continue;
            }
            #[cfg(unix)]
            {
                if std::os::unix::fs::symlink(&source, &dest).is_ok() {
                    continue;
                }
            }
            if source.is_dir() {
                copy_dir_recursive(&source, &dest).ok();
            } else {
                std::fs::copy(&source, &dest).ok();
            }
        }
        Ok(())
    }

    /// The network phase (§4.4's "inner fetch algorithm"): init-or-update
    /// the git-dir, pick a fetch mode, retry on transient failure, and seal
    /// refs on success.
    pub fn fetch_network_half(&self, opts: &FetchHalfOptions) -> Result<FetchOutcome, VcsError> {
        self.ensure_layout()?;

        if opts.optimized_fetch && self.is_sha_pin() {
            if self.driver.rev_parse(&self.revision_expr).is_ok() {
                debug!(project = %self.name, "pinned object already present, skipping network");
                return Ok(FetchOutcome { no_op: true, updated_refs: Vec::new() });
            }
        }

        let refspecs = self.refspecs_for(opts);
        let fetch_opts = FetchOptions {
            depth: opts.depth,
            current_branch_only: None,
            tags: !opts.no_tags,
            reference_dir: None,
            prune: false,
            force_sync: opts.force_sync,
        };

        self.fetch_with_retry(&refspecs, &fetch_opts)
    }

    fn refspecs_for(&self, opts: &FetchHalfOptions) -> Vec<String> {
        if self.is_sha_pin() {
            return vec![self.revision_expr.clone()];
        }
        if let Some(tag) = self.revision_expr.strip_prefix("refs/tags/") {
            return vec![format!("tag {tag}")];
        }
        if opts.current_branch_only {
            let branch = self.revision_expr.trim_start_matches("refs/heads/");
            return vec![format!("+refs/heads/{branch}:refs/remotes/origin/{branch}")];
        }
        vec!["+refs/heads/*:refs/remotes/origin/*".to_owned()]
    }

    fn fetch_with_retry(
        &self,
        refspecs: &[String],
        opts: &FetchOptions,
    ) -> Result<FetchOutcome, VcsError> {
        let mut last_err = None;
        for attempt in 1..=MAX_FETCH_ATTEMPTS {
            match self.driver.fetch(&self.remote_url, refspecs, opts) {
                Ok(outcome) => {
                    self.seal()?;
                    return Ok(outcome);
                }
                Err(err) => {
                    warn!(project = %self.name, attempt, %err, "fetch failed");
                    last_err = Some(err);
                    if attempt < MAX_FETCH_ATTEMPTS {
                        let backoff = rand::rng().random_range(30..=45);
                        std::thread::sleep(Duration::from_secs(backoff));
                    }
                }
            }
        }
        Err(last_err.expect("loop runs at least once"))
    }

    /// Re-pack refs after a fetch completes (§4.4 step 7 "seal").
    fn seal(&self) -> Result<(), VcsError> {
        self.driver.pack_refs()
    }

    pub fn uncommitted_files(&self) -> Result<Vec<String>, VcsError> {
        let status = self.driver.status()?;
        Ok(status.dirty_paths)
    }

    pub fn driver(&self) -> &dyn VcsDriver {
        self.driver.as_ref()
    }

    /// Load a fresh C1 ref index for this project's git-dir (§4.1), used in
    /// place of spawning a `git` subprocess for plain named-ref lookups
    /// (HEAD's symref target, `refs/published/<branch>`) during
    /// reconciliation.
    pub fn ref_index(&self) -> std::io::Result<RefIndex> {
        RefIndex::load(&self.gitdir)
    }

    pub fn gc(&self, pack_threads: usize) -> Result<(), VcsError> {
        self.driver.gc(false, pack_threads)
    }

    pub fn start_branch(&self, name: &str, revision: &str) -> Result<(), VcsError> {
        self.driver.checkout(revision, Some(name))
    }

    pub fn checkout_branch(&self, name: &str) -> Result<(), VcsError> {
        self.driver.checkout(name, None)
    }

    pub fn push(&self, dest_refspec: &str) -> Result<(), VcsError> {
        self.driver.push(&self.remote_url, dest_refspec)
    }
}

fn copy_dir_recursive(source: &std::path::Path, dest: &std::path::Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let dest_path = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &dest_path)?;
        } else {
            std::fs::copy(entry.path(), &dest_path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use reposync_vcs::{FetchOptions, FetchOutcome, HeadState, RefName, WorkingTreeStatus};

    use super::*;

    /// Only `init` is exercised by [`RepoHandle::ensure_layout`]; every other
    /// method panics so a test fails loudly if the code path under test ever
    /// grows a new dependency on the driver. Delegates to a real
    /// [`ProcessGitDriver`] built the same way [`RepoHandle::for_project`]
    /// builds one, so `--separate-git-dir` actually lands the git-dir where
    /// `ensure_layout` expects it.
    struct InitOnlyDriver {
        gitdir: PathBuf,
        worktree: Option<PathBuf>,
    }

    impl VcsDriver for InitOnlyDriver {
        fn root(&self) -> &std::path::Path {
            &self.gitdir
        }
        fn init(&self, bare: bool) -> Result<(), VcsError> {
            match &self.worktree {
                Some(worktree) => ProcessGitDriver::with_worktree(&self.gitdir, worktree).init(bare),
                None => ProcessGitDriver::new(&self.gitdir).init(bare),
            }
        }
        fn fetch(&self, _: &str, _: &[String], _: &FetchOptions) -> Result<FetchOutcome, VcsError> {
            unimplemented!()
        }
        fn clone_from(&self, _: &str, _: &FetchOptions) -> Result<FetchOutcome, VcsError> {
            unimplemented!()
        }
        fn ls_remote(&self, _: &str) -> Result<Vec<(RefName, reposync_vcs::Oid)>, VcsError> {
            unimplemented!()
        }
        fn rev_parse(&self, _: &str) -> Result<reposync_vcs::Oid, VcsError> {
            unimplemented!()
        }
        fn head_state(&self) -> Result<HeadState, VcsError> {
            unimplemented!()
        }
        fn symbolic_ref(&self, _: &str, _: &RefName) -> Result<(), VcsError> {
            unimplemented!()
        }
        fn update_ref(&self, _: &RefName, _: &reposync_vcs::Oid) -> Result<(), VcsError> {
            unimplemented!()
        }
        fn checkout(&self, _: &str, _: Option<&str>) -> Result<(), VcsError> {
            unimplemented!()
        }
        fn reset_hard(&self, _: &reposync_vcs::Oid) -> Result<(), VcsError> {
            unimplemented!()
        }
        fn rebase(&self, _: &RefName) -> Result<bool, VcsError> {
            unimplemented!()
        }
        fn merge(&self, _: &reposync_vcs::Oid, _: bool) -> Result<bool, VcsError> {
            unimplemented!()
        }
        fn cherry_pick(&self, _: &reposync_vcs::Oid) -> Result<bool, VcsError> {
            unimplemented!()
        }
        fn status(&self) -> Result<WorkingTreeStatus, VcsError> {
            unimplemented!()
        }
        fn diff_names(&self, _: &reposync_vcs::Oid, _: Option<&reposync_vcs::Oid>) -> Result<Vec<String>, VcsError> {
            unimplemented!()
        }
        fn rev_list_count(&self, _: &str) -> Result<u32, VcsError> {
            unimplemented!()
        }
        fn rev_list_with_committers(&self, _: &str) -> Result<Vec<(reposync_vcs::Oid, String)>, VcsError> {
            unimplemented!()
        }
        fn read_config(&self, _: &str) -> Result<Option<String>, VcsError> {
            unimplemented!()
        }
        fn write_config(&self, _: &str, _: &str) -> Result<(), VcsError> {
            unimplemented!()
        }
        fn pack_refs(&self) -> Result<(), VcsError> {
            unimplemented!()
        }
        fn gc(&self, _: bool, _: usize) -> Result<(), VcsError> {
            unimplemented!()
        }
        fn push(&self, _: &str, _: &str) -> Result<(), VcsError> {
            unimplemented!()
        }
        fn ls_tree_gitlinks(&self, _: &str) -> Result<Vec<(String, reposync_vcs::Oid)>, VcsError> {
            unimplemented!()
        }
        fn read_gitmodules(&self, _: &str) -> Result<Vec<(String, String, String)>, VcsError> {
            unimplemented!()
        }
    }

    #[test]
    fn ensure_layout_shares_objdir_via_alternates() {
        let dir = tempfile::tempdir().unwrap();
        let gitdir = dir.path().join("projects/shared.git");
        let objdir = dir.path().join("project-objects/shared.git");
        let worktree = dir.path().join("shared");

        let handle = RepoHandle::new(
            "shared",
            gitdir.clone(),
            objdir.clone(),
            Some(worktree.clone()),
            "https://example.invalid/shared",
            "refs/heads/main",
            Box::new(InitOnlyDriver { gitdir: gitdir.clone(), worktree: Some(worktree) }),
        );

        handle.ensure_layout().unwrap();

        assert!(objdir.is_dir());
        assert!(gitdir.is_dir());
        let alternates = std::fs::read_to_string(gitdir.join("objects/info/alternates")).unwrap();
        assert_eq!(alternates.trim(), objdir.join("objects").display().to_string());
    }

    #[test]
    fn ensure_layout_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let gitdir = dir.path().join("projects/shared.git");
        let objdir = dir.path().join("project-objects/shared.git");

        let handle = RepoHandle::new(
            "shared",
            gitdir.clone(),
            objdir.clone(),
            None,
            "https://example.invalid/shared",
            "refs/heads/main",
            Box::new(InitOnlyDriver { gitdir: gitdir.clone(), worktree: None }),
        );

        handle.ensure_layout().unwrap();
        handle.ensure_layout().unwrap();
        assert!(gitdir.join("objects/info/alternates").is_file());
    }
}
