use thiserror::Error;

/// The error taxonomy the synchronization engine reports at its public
/// boundary. Kept as one flat enum (rather than per-component types) so the
/// top-level command loop can match on it without reaching into every
/// module; components still return their own narrower errors internally
/// (e.g. [`reposync_vcs::VcsError`]) and get wrapped here at the seam.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Manifest(#[from] reposync_manifest::error::ManifestParseError),

    #[error("project {project:?} has no resolvable revision after fetch")]
    InvalidRevision { project: String },

    #[error("no manifest found in this workspace; run `init` first")]
    NoManifest,

    #[error("no such project: {0}")]
    NoSuchProject(String),

    #[error("invalid project group expression: {0}")]
    InvalidProjectGroups(String),

    #[error("fetch failed for {project}")]
    Fetch { project: String, #[source] source: reposync_vcs::VcsError },

    #[error("git operation failed for {project}")]
    GitOperation { project: String, #[source] source: reposync_vcs::VcsError },

    #[error("upload failed for {project}")]
    Upload { project: String, #[source] source: reposync_vcs::VcsError },

    #[error("download failed for {project}")]
    Download { project: String, #[source] source: reposync_vcs::VcsError },

    #[error("hook {hook:?} failed: {reason}")]
    Hook { hook: String, reason: String },

    #[error("project {project} is dirty; commit or stash before continuing")]
    Dirty { project: String },

    #[error("smart sync failed: {reason}")]
    SmartSync { reason: String },

    #[error("{project}: {reason}")]
    Buffered { project: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// The outcome of a top-level sync run. Replaces the original tool's
/// exception-driven "restart the whole process" control flow with a plain
/// value the caller switches on.
#[derive(Debug)]
pub enum SyncOutcome {
    Clean,
    Failed { errors: Vec<SyncError> },
    /// Reserved for a future self-update path; the engine never produces
    /// this today; it exists so callers can match exhaustively against the
    /// same three-way shape the original tool used.
    Restart { extra_args: Vec<String> },
}

impl SyncOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, SyncOutcome::Clean)
    }
}
