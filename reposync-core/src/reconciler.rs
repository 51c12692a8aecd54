//! C5: per-project local reconciliation — decides what to do with a
//! project's worktree once its network half has succeeded (§4.5).

use std::sync::Arc;

use reposync_vcs::{HeadState, Oid, RefName, VcsError};

use crate::error::SyncError;
use crate::project::Project;
use crate::repo_handle::RepoHandle;
use crate::sync_buffer::SyncBuffer;

/// Per-branch bookkeeping the reconciler needs beyond what the driver's
/// `head_state`/`rev_parse` already expose (§4.5's state variables).
#[derive(Debug, Clone, Default)]
pub struct BranchState {
    /// `branch.<name>.merge`, if the branch tracks an upstream at all.
    pub upstream_merge: Option<String>,
    /// The commit this branch was last pushed/published at, if known.
    pub published_id: Option<String>,
    /// Remote-tracking ref to rebase onto, when a rebase is warranted.
    pub upstream_ref: Option<RefName>,
}

pub struct ReconcileInputs<'a> {
    pub project: &'a Project,
    pub target_id: String,
    pub branch_state: BranchState,
    pub detach_requested: bool,
    pub rebase_in_progress: bool,
    pub local_only_commits: Vec<LocalCommit>,
    pub upstream_only_commits: usize,
    pub configured_user_email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LocalCommit {
    pub id: String,
    pub committer_email: String,
}

/// Reconcile one project's worktree against `inputs.target_id`, queuing
/// fast-forward work into phase 1 and rebases into phase 2 of `buffer`.
/// Copy/link file materialization intentionally happens only where §4.5's
/// source policy calls for it — including the detached-no-op path but not
/// the branch-no-op path, preserving the asymmetry flagged in §9's open
/// questions rather than silently unifying the two.
pub fn reconcile(
    handle: &Arc<RepoHandle>,
    buffer: &mut SyncBuffer,
    inputs: ReconcileInputs,
) -> Result<(), SyncError> {
    let project = inputs.project;
    let driver = handle.driver();
    let target_id = Oid::new(inputs.target_id.clone());
    let head_state = driver.head_state().map_err(to_git_error(&project.name))?;

    if inputs.detach_requested {
        let head_id = match &head_state {
            HeadState::Detached(id) => id.clone(),
            HeadState::Branch(_) => driver.rev_parse("HEAD").map_err(to_git_error(&project.name))?,
            HeadState::Unborn => {
                driver.checkout(target_id.as_str(), None).map_err(to_git_error(&project.name))?;
                return Ok(());
            }
        };
        return reconcile_detached(handle, buffer, &inputs, head_id);
    }

    match &head_state {
        HeadState::Detached(head_id) => reconcile_detached(handle, buffer, &inputs, head_id.clone()),
        HeadState::Branch(branch) => {
            reconcile_branch(handle, buffer, &inputs, branch, &target_id)
        }
        HeadState::Unborn => {
            driver.checkout(target_id.as_str(), None).map_err(to_git_error(&project.name))
        }
    }
}

fn reconcile_detached(
    handle: &Arc<RepoHandle>,
    buffer: &mut SyncBuffer,
    inputs: &ReconcileInputs,
    head_id: Oid,
) -> Result<(), SyncError> {
    let driver = handle.driver();
    let project_name = inputs.project.name.clone();
    if inputs.rebase_in_progress {
        buffer.fail(&project_name, "prior sync failed (rebase in progress)");
        return Err(SyncError::GitOperation {
            project: project_name,
            source: VcsError::Dirty { dir: inputs.project.gitdir.display().to_string() },
        });
    }

    let target_id = Oid::new(inputs.target_id.clone());
    if head_id == target_id {
        materialize_copy_link_files(inputs.project);
        return Ok(());
    }

    let discarded = driver
        .rev_list_count(&format!("{target_id}..{head_id}"))
        .unwrap_or(0);
    driver.checkout(target_id.as_str(), None).map_err(to_git_error(&project_name))?;
    buffer.info(&project_name, format!("discarding {discarded} commits"));
    materialize_copy_link_files(inputs.project);
    Ok(())
}

fn reconcile_branch(
    handle: &Arc<RepoHandle>,
    buffer: &mut SyncBuffer,
    inputs: &ReconcileInputs,
    branch: &RefName,
    target_id: &Oid,
) -> Result<(), SyncError> {
    let driver = handle.driver();
    let project_name = inputs.project.name.clone();
    let head_id = driver.rev_parse("HEAD").map_err(to_git_error(&project_name))?;

    if inputs.branch_state.upstream_merge.is_none() {
        buffer.info(&project_name, format!("leaving {branch}; does not track upstream"));
        driver.checkout(target_id.as_str(), None).map_err(to_git_error(&project_name))?;
        return Ok(());
    }

    if &head_id == target_id {
        return Ok(());
    }

    let mine: Vec<LocalCommit> = inputs
        .local_only_commits
        .iter()
        .filter(|c| Some(&c.committer_email) == inputs.configured_user_email.as_ref())
        .cloned()
        .collect();
    let non_mine_exists = mine.len() < inputs.local_only_commits.len();

    if inputs.local_only_commits.is_empty() {
        queue_fast_forward(handle, buffer, &project_name, target_id.clone());
        return Ok(());
    }

    if let Some(published) = &inputs.branch_state.published_id {
        let published_oid = Oid::new(published.clone());
        if published_oid != head_id && inputs.upstream_only_commits > 0 {
            let behind = inputs.upstream_only_commits;
            buffer.fail(
                &project_name,
                format!("branch {branch} is published (but not merged) and is now {behind} commits behind"),
            );
            return Err(SyncError::GitOperation {
                project: project_name,
                source: VcsError::Dirty { dir: inputs.project.gitdir.display().to_string() },
            });
        }
        if published_oid == head_id {
            queue_fast_forward(handle, buffer, &project_name, target_id.clone());
            return Ok(());
        }
    }

    if inputs.upstream_only_commits == 0 && !non_mine_exists {
        return Ok(());
    }

    if non_mine_exists {
        buffer.info(
            &project_name,
            format!("discarding {} commits removed from upstream", inputs.local_only_commits.len()),
        );
    }

    let status = driver.status().map_err(to_git_error(&project_name))?;
    if !status.is_clean() {
        buffer.fail(&project_name, "uncommitted changes present");
        return Err(SyncError::Dirty { project: project_name });
    }

    if !mine.is_empty() && inputs.project.rebase && inputs.branch_state.upstream_ref.is_some() {
        let upstream_ref = inputs.branch_state.upstream_ref.clone().expect("checked above");
        queue_rebase(handle, buffer, &project_name, upstream_ref);
    } else {
        driver.reset_hard(target_id).map_err(to_git_error(&project_name))?;
    }

    Ok(())
}

fn queue_fast_forward(handle: &Arc<RepoHandle>, buffer: &mut SyncBuffer, project: &str, target: Oid) {
    let handle = handle.clone();
    let project_owned = project.to_owned();
    buffer.later1(project, move || {
        handle
            .driver()
            .reset_hard(&target)
            .map_err(|source| SyncError::GitOperation { project: project_owned, source })
    });
}

fn queue_rebase(handle: &Arc<RepoHandle>, buffer: &mut SyncBuffer, project: &str, upstream: RefName) {
    let handle = handle.clone();
    let project_owned = project.to_owned();
    buffer.later2(project, move || {
        let clean = handle
            .driver()
            .rebase(&upstream)
            .map_err(|source| SyncError::GitOperation { project: project_owned.clone(), source })?;
        if !clean {
            return Err(SyncError::GitOperation {
                project: project_owned,
                source: VcsError::Dirty { dir: handle.gitdir.display().to_string() },
            });
        }
        Ok(())
    });
}

fn materialize_copy_link_files(project: &Project) {
    let Some(worktree) = &project.worktree else { return };
    for copyfile in &project.copyfiles {
        let src = worktree.join(&copyfile.src);
        let dest = worktree.join(&copyfile.dest);
        if let Some(parent) = dest.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = std::fs::copy(&src, &dest);
    }
    for linkfile in &project.linkfiles {
        let dest = worktree.join(&linkfile.dest);
        if let Some(parent) = dest.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        #[cfg(unix)]
        let _ = std::os::unix::fs::symlink(&linkfile.src, &dest);
        #[cfg(not(unix))]
        let _ = std::fs::copy(worktree.join(&linkfile.src), &dest);
    }
}

fn to_git_error(project: &str) -> impl Fn(VcsError) -> SyncError + '_ {
    move |source| SyncError::GitOperation { project: project.to_owned(), source }
}
