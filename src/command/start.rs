use clap::Args;
use miette::{Diagnostic, Result};
use reposync_core::project::ProjectArena;
use reposync_core::repo_handle::RepoHandle;
use reposync_core::selector;
use reposync_manifest::ManifestLoader;
use thiserror::Error;
use tracing::info;

/// Start a new branch for development
#[derive(Args, Debug)]
pub struct StartArgs {
    branch_name: String,
    /// projects to start the branch in (default: every project in the default group)
    projects: Option<Vec<String>>,
}

#[derive(Debug, Error, Diagnostic)]
#[diagnostic(code(reposync::command::start))]
pub enum StartError {
    #[error(transparent)]
    Engine(#[from] reposync_core::error::SyncError),

    #[error("no workspace found here (missing .repo/); run `init` first")]
    NoWorkspace,
}

/// Create `args.branch_name` in every selected project, tracking that
/// project's manifest revision, matching C2's `start_branch` (a checkout
/// with `create_branch` set, per §4.2).
pub fn run_start(args: StartArgs) -> Result<(), StartError> {
    let workspace_root = std::env::current_dir().map_err(reposync_core::error::SyncError::Io)?;
    let metadata_dir = workspace_root.join(".repo");
    if !metadata_dir.is_dir() {
        return Err(StartError::NoWorkspace);
    }

    let loader = ManifestLoader::new(metadata_dir.join("manifests"));
    let manifest = loader
        .load_with_local_manifests("default.xml", metadata_dir.join("local_manifests"))
        .map_err(reposync_core::error::SyncError::from)?;
    let mut arena = ProjectArena::from_manifest(&manifest, &workspace_root).map_err(|source| {
        reposync_core::error::SyncError::InvalidRevision { project: source.to_string() }
    })?;

    let requested = args.projects.clone().unwrap_or_default();
    let selected = selector::select(&mut arena, &workspace_root, &requested, "", true)?;

    for index in selected {
        let project = arena.get(index);
        if project.worktree.is_none() {
            continue;
        }
        let handle = RepoHandle::for_project(project);
        if !handle.exists() {
            info!(project = %project.name, "skipping; not synced yet");
            continue;
        }
        handle.start_branch(&args.branch_name, &project.revision_expr).map_err(|source| {
            reposync_core::error::SyncError::GitOperation { project: project.name.clone(), source }
        })?;
        info!(project = %project.name, branch = %args.branch_name, "branch started");
    }

    Ok(())
}
