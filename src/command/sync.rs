use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use clap::Args;
use miette::{Diagnostic, Result};
use reposync_core::config::Config;
use reposync_core::fetch_times::FetchTimes;
use reposync_core::project::ProjectArena;
use reposync_core::project_list::ProjectList;
use reposync_core::reconciler::{self, BranchState, LocalCommit, ReconcileInputs};
use reposync_core::repo_handle::{FetchHalfOptions, RepoHandle};
use reposync_core::scheduler::{self, SchedulerOptions};
use reposync_core::selector;
use reposync_core::smart_sync::SmartSyncClient;
use reposync_core::submodules::{self, SubmoduleDiscovery};
use reposync_core::sync_buffer::SyncBuffer;
use reposync_manifest::ManifestLoader;
use reposync_vcs::{ProcessGitDriver, VcsDriver};
use thiserror::Error;
use tracing::{info, warn};

/// Update working tree to the latest revision
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// projects to sync (default: every project in the default group)
    projects: Option<Vec<String>>,
    /// comma-separated list of groups to sync
    #[arg(short = 'g', long)]
    groups: Option<String>,
    /// number of jobs to run in parallel
    #[arg(short = 'j', long, default_value_t = 8)]
    jobs: usize,
    /// keep going even after an error; complete every project that can
    #[arg(long, default_value_t = false)]
    force_broken: bool,
    /// fetch only the current branch from the server
    #[arg(short = 'c', long, default_value_t = false)]
    current_branch: bool,
    /// don't fetch tags
    #[arg(long, default_value_t = false)]
    no_tags: bool,
    /// skip the network fetch; reconcile against whatever was last fetched
    #[arg(long, default_value_t = false)]
    local_only: bool,
    /// passes --force-sync to the underlying fetch
    #[arg(long, default_value_t = false)]
    force_sync: bool,
    /// smart sync: ask the manifest server for its approved manifest before fetching
    #[arg(short = 's', long, default_value_t = false)]
    smart_sync: bool,
    /// smart tag: ask the manifest server for this specific tagged manifest
    #[arg(short = 't', long)]
    smart_tag: Option<String>,
}

#[derive(Debug, Error, Diagnostic)]
#[diagnostic(code(reposync::command::sync))]
pub enum SyncError {
    #[error(transparent)]
    Engine(#[from] reposync_core::error::SyncError),

    #[error("no workspace found here (missing .repo/); run `init` first")]
    NoWorkspace,

    #[error("sync completed with errors; see log above")]
    Unclean,
}

/// Wire together C1-C9 for one `sync` invocation: load the manifest,
/// resolve it to a project arena, select the requested subset, fetch
/// everything over the network (§4.4), chase down submodules (§4.8),
/// reconcile every worktree (§4.5), and reconcile the on-disk project set
/// against the manifest (§4.6) before persisting fetch-time memory (§4.3).
pub fn run_sync(args: SyncArgs) -> Result<(), SyncError> {
    let workspace_root = std::env::current_dir().map_err(reposync_core::error::SyncError::Io)?;
    let metadata_dir = workspace_root.join(".repo");
    if !metadata_dir.is_dir() {
        return Err(SyncError::NoWorkspace);
    }

    let manifest_entry = active_manifest_entry(&metadata_dir);
    let loader = ManifestLoader::new(metadata_dir.join("manifests"));
    let manifest = loader
        .load_with_local_manifests(&manifest_entry, metadata_dir.join("local_manifests"))
        .map_err(reposync_core::error::SyncError::from)?;

    let manifest = if args.smart_sync || args.smart_tag.is_some() {
        apply_smart_sync(&metadata_dir, &manifest, &manifest_entry, args.smart_tag.as_deref())?
    } else {
        manifest
    };

    let mut arena = ProjectArena::from_manifest(&manifest, &workspace_root).map_err(|source| {
        reposync_core::error::SyncError::InvalidRevision { project: source.to_string() }
    })?;

    let group_expr = args.groups.clone().unwrap_or_default();
    let requested = args.projects.clone().unwrap_or_default();
    let selected = selector::select(&mut arena, &workspace_root, &requested, &group_expr, true)?;

    let fetch_times = Mutex::new(FetchTimes::load(&metadata_dir));
    let scheduler_options = SchedulerOptions {
        jobs: scheduler::resource_capped_jobs(args.jobs),
        force_broken: args.force_broken,
        fetch_opts: FetchHalfOptions {
            quiet: false,
            current_branch_only: args.current_branch,
            no_tags: args.no_tags,
            clone_bundle_allowed: true,
            optimized_fetch: true,
            force_sync: args.force_sync,
            depth: None,
        },
    };

    if !args.local_only {
        let handles: Vec<RepoHandle> =
            selected.iter().map(|&index| RepoHandle::for_project(arena.get(index))).collect();
        let report = scheduler::run_network_half(handles, &fetch_times, &scheduler_options);
        if report.had_errors && !args.force_broken {
            warn!("network half reported errors; reconciling only what did fetch");
        }

        let discovery = SubmoduleDiscovery {
            workspace_root: &workspace_root,
            fetch_times: &fetch_times,
            scheduler_options: &scheduler_options,
        };
        submodules::run(&mut arena, &discovery);
    }

    let mut buffer = SyncBuffer::new();
    for &index in &selected {
        let project = arena.get(index);
        if project.worktree.is_none() {
            continue;
        }
        let handle = Arc::new(RepoHandle::for_project(project));
        if !handle.exists() {
            buffer.info(&project.name, "not fetched yet; skipping local reconciliation");
            continue;
        }
        if let Err(err) = reconcile_one(&handle, project, &mut buffer) {
            buffer.fail(&project.name, &err);
        }
    }
    let outcome = buffer.finish();

    let new_relpaths: BTreeSet<String> = arena.iter().map(|(_, p)| p.relpath.clone()).collect();
    let project_list = ProjectList::new(&metadata_dir);
    project_list.reconcile(&workspace_root, &new_relpaths, |relpath| {
        arena.iter().find(|(_, p)| p.relpath == relpath).and_then(|(_, p)| {
            p.worktree.as_ref().map(|worktree| {
                Box::new(ProcessGitDriver::with_worktree(&p.gitdir, worktree)) as Box<dyn VcsDriver>
            })
        })
    })?;

    fetch_times.lock().unwrap().save().map_err(reposync_core::error::SyncError::from)?;

    if !outcome.is_clean() {
        return Err(SyncError::Unclean);
    }
    info!("sync complete");
    Ok(())
}

/// Reconcile one project's worktree, filling in the reconciler's inputs
/// from the project's own git config (§4.5's state variables) rather than
/// the arena, since branch tracking state lives in the repository, not the
/// manifest.
fn reconcile_one(
    handle: &Arc<RepoHandle>,
    project: &reposync_core::project::Project,
    buffer: &mut SyncBuffer,
) -> Result<(), reposync_core::error::SyncError> {
    let driver = handle.driver();
    let to_git_error =
        |source| reposync_core::error::SyncError::GitOperation { project: project.name.clone(), source };
    let mut config = Config::load(driver).map_err(to_git_error)?;

    let target_id = driver.rev_parse(&project.revision_expr).map_err(|source| {
        reposync_core::error::SyncError::GitOperation { project: project.name.clone(), source }
    })?;

    // C1: a ref-index read off disk is cheap compared to shelling out to
    // `git` for every project's HEAD/published-branch lookup; fall back to
    // the driver when the index can't be loaded (e.g. a gitdir permissions
    // problem) rather than failing the whole reconcile over it.
    let ref_index = handle.ref_index().ok();

    let branch_name = match &ref_index {
        Some(idx) => {
            idx.symref("HEAD").and_then(|target| target.strip_prefix("refs/heads/").map(str::to_owned))
        }
        None => {
            let head_state = driver.head_state().map_err(to_git_error)?;
            match head_state {
                reposync_vcs::HeadState::Branch(name) => name.short_branch_name().map(str::to_owned),
                _ => None,
            }
        }
    };

    let (branch_state, local_only_commits, upstream_only_commits) = match &branch_name {
        Some(branch) => {
            let branch_cfg = config.branch_for(driver, branch).map_err(to_git_error)?.clone();
            let upstream_ref = branch_cfg
                .merge
                .as_ref()
                .map(|merge| reposync_vcs::RefName::new(format!("refs/remotes/origin/{merge}")));

            let (local, upstream_count) = match &upstream_ref {
                Some(upstream) => {
                    let range = format!("{}..HEAD", upstream.as_str());
                    let commits = driver
                        .rev_list_with_committers(&range)
                        .unwrap_or_default()
                        .into_iter()
                        .map(|(id, email)| LocalCommit {
                            id: id.as_str().to_owned(),
                            committer_email: email,
                        })
                        .collect();
                    let upstream_count =
                        driver.rev_list_count(&format!("HEAD..{}", upstream.as_str())).unwrap_or(0);
                    (commits, upstream_count)
                }
                None => (Vec::new(), 0),
            };

            let published_ref = format!("refs/published/{branch}");
            let published_id = match &ref_index {
                Some(idx) => idx.get(&published_ref),
                None => driver.rev_parse(&published_ref).ok().map(|oid| oid.as_str().to_owned()),
            };

            let state = BranchState {
                upstream_merge: branch_cfg.merge.clone(),
                published_id,
                upstream_ref,
            };
            (state, local, upstream_count as usize)
        }
        None => (BranchState::default(), Vec::new(), 0),
    };

    let inputs = ReconcileInputs {
        project,
        target_id: target_id.as_str().to_owned(),
        branch_state,
        detach_requested: false,
        rebase_in_progress: false,
        local_only_commits,
        upstream_only_commits,
        configured_user_email: config.user_email.clone(),
    };

    reconciler::reconcile(handle, buffer, inputs)?;

    // §4.5 step 7: once a branch has been reconciled onto the manifest's
    // revision, point its merge config at that revision so the next sync's
    // `branch.<name>.merge` lookup reflects the manifest rather than going
    // stale.
    if let Some(branch) = &branch_name {
        if !project.is_revision_pinned() {
            let desired_merge =
                project.revision_expr.strip_prefix("refs/heads/").unwrap_or(&project.revision_expr);
            let current_merge = config.branches.get(branch).and_then(|b| b.merge.as_deref());
            if current_merge != Some(desired_merge) {
                config.set_branch_merge(driver, branch, desired_merge).map_err(to_git_error)?;
            }
        }
    }

    Ok(())
}

/// C10: ask the manifest's `<manifest-server>` for a server-approved
/// manifest, persist it to `smart_sync_override.xml`, and reload from there
/// instead of the checked-out fragment (§4.10).
fn apply_smart_sync(
    metadata_dir: &std::path::Path,
    manifest: &reposync_manifest::Manifest,
    manifest_entry: &str,
    tag: Option<&str>,
) -> Result<reposync_manifest::Manifest, reposync_core::error::SyncError> {
    let server = manifest.manifest_server.as_ref().ok_or_else(|| {
        reposync_core::error::SyncError::SmartSync {
            reason: "manifest has no <manifest-server> element".to_owned(),
        }
    })?;
    let to_smart_sync_error = |source: reposync_core::smart_sync::SmartSyncError| {
        reposync_core::error::SyncError::SmartSync { reason: source.to_string() }
    };

    let client = SmartSyncClient::new(server.url.clone()).map_err(to_smart_sync_error)?;
    let branch = manifest_entry.trim_end_matches(".xml");
    let manifest_xml = match tag {
        Some(tag) => client.get_manifest(tag).map_err(to_smart_sync_error)?,
        None => client.get_approved_manifest(branch, None).map_err(to_smart_sync_error)?,
    };
    reposync_core::smart_sync::write_override(metadata_dir, &manifest_xml).map_err(to_smart_sync_error)?;

    let override_loader = ManifestLoader::new(metadata_dir);
    override_loader
        .load_with_local_manifests(
            reposync_core::smart_sync::OVERRIDE_MANIFEST_NAME,
            metadata_dir.join("local_manifests"),
        )
        .map_err(reposync_core::error::SyncError::from)
}

fn active_manifest_entry(metadata_dir: &std::path::Path) -> String {
    std::fs::read_link(metadata_dir.join("manifest.xml"))
        .ok()
        .and_then(|target| target.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "default.xml".to_owned())
}
