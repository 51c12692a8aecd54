use clap::Args;
use miette::{Diagnostic, Result};
use reposync_vcs::{FetchOptions, ProcessGitDriver, VcsDriver, VcsError};
use thiserror::Error;
use tracing::{info, info_span};

/// Initialize a repo client checkout in the current directory
///
/// # Description
///
/// The 'repo init' command is run once to install and initialize repo. The latest
/// repo source code and manifest collection is downloaded from the server and is
/// installed in the .repo/ directory in the current working directory.
///
/// When creating a new checkout, the manifest URL is the only required setting. It
/// may be specified using the --manifest-url option, or as the first optional
/// argument.
///
/// The optional -b argument can be used to select the manifest branch to checkout
/// and use. If no branch is specified, the remote's default branch is used. This is
/// equivalent to using -b HEAD.
///
/// The optional -m argument can be used to specify an alternate manifest to be
/// used. If no manifest is specified, the manifest default.xml will be used.
///
/// `init` only sets up the manifest repository checkout under `.repo/`; it does
/// not materialize any projects. Run `sync` afterwards to fetch and check out
/// the projects the manifest declares.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// show all output
    #[arg(short = 'v', long, default_value_t = false)]
    verbose: bool,
    /// show all output
    #[arg(short = 'q', long, default_value_t = false)]
    quiet: bool,

    /// manifest repository location
    #[arg(short = 'u', long)]
    manifest_url: String,
    /// manifest branch or revision (use HEAD for default)
    #[arg(short = 'b', long, default_value = "HEAD")]
    manifest_branch: String,
    /// initial manifest file
    #[arg(short = 'm', long, default_value = "default.xml")]
    manifest_path: String,
    /// restrict manifest projects to ones with specified
    /// group(s) [default|all|G1,G2,G3|G4,-G5,-G6]
    #[arg(short = 'g', long)]
    groups: Option<Vec<String>>,
    /// create a shallow clone of the manifest repo with given
    /// depth (0 for full clone); see git clone
    #[arg(long, default_value_t = 0)]
    manifest_depth: usize,
    /// fetch all manifest branches from server
    #[arg(long, default_value_t = false)]
    no_current_branch: bool,
}

#[derive(Debug, Error, Diagnostic)]
#[diagnostic(code(reposync::command::init))]
pub enum InitError {
    #[error("could not create {dir}")]
    CreateDirectory { dir: String, #[source] source: std::io::Error },

    #[error("could not link manifest.xml")]
    Symlink(#[source] std::io::Error),

    #[error(transparent)]
    Vcs(#[from] VcsError),
}

/// Clone the manifest repository into `.repo/manifests.git` (bare mirror)
/// and `.repo/manifests` (checkout), then point `.repo/manifest.xml` at the
/// requested fragment, matching `repo init`'s split of "set up the manifest
/// repo" from "sync projects" (the latter is `sync`'s job, per C1-C9).
pub fn run_init(args: InitArgs) -> Result<(), InitError> {
    let workspace_root = std::env::current_dir().map_err(|source| InitError::CreateDirectory {
        dir: ".".to_owned(),
        source,
    })?;
    let metadata_dir = workspace_root.join(".repo");
    let manifests_git = metadata_dir.join("manifests.git");
    let manifests_checkout = metadata_dir.join("manifests");

    std::fs::create_dir_all(&manifests_checkout).map_err(|source| InitError::CreateDirectory {
        dir: manifests_checkout.display().to_string(),
        source,
    })?;

    let driver = ProcessGitDriver::with_worktree(&manifests_git, &manifests_checkout);

    let clone_span = info_span!("cloning manifest repository", url = %args.manifest_url).entered();
    let depth = (args.manifest_depth > 0).then_some(args.manifest_depth as u32);
    let fetch_opts = FetchOptions {
        depth,
        current_branch_only: None,
        tags: true,
        reference_dir: None,
        prune: false,
        force_sync: false,
    };
    driver.clone_from(&args.manifest_url, &fetch_opts)?;
    clone_span.exit();

    let target = if args.manifest_branch == "HEAD" {
        "origin/HEAD".to_owned()
    } else {
        format!("origin/{}", args.manifest_branch)
    };
    driver.checkout(&target, None)?;
    info!(branch = %args.manifest_branch, "manifest checked out");

    let manifest_xml_link = metadata_dir.join("manifest.xml");
    let _ = std::fs::remove_file(&manifest_xml_link);
    let relative_target = std::path::Path::new("manifests").join(&args.manifest_path);
    #[cfg(unix)]
    std::os::unix::fs::symlink(&relative_target, &manifest_xml_link).map_err(InitError::Symlink)?;
    #[cfg(not(unix))]
    std::fs::copy(manifests_checkout.join(&args.manifest_path), &manifest_xml_link)
        .map(|_| ())
        .map_err(InitError::Symlink)?;

    info!(
        manifest = %args.manifest_path,
        "repo client initialized; run `sync` to fetch projects"
    );
    Ok(())
}
