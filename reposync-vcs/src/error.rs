use thiserror::Error;

/// Everything that can go wrong invoking the underlying version-control
/// system, whether through `gix` plumbing or the `git` binary.
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("`git {args}` failed in {dir}: {stderr}")]
    Command { dir: String, args: String, stderr: String, exit_code: Option<i32> },

    #[error("failed to spawn `git` in {dir}")]
    Spawn { dir: String, #[source] source: std::io::Error },

    #[error("git plumbing operation failed in {dir}")]
    Plumbing { dir: String, #[source] source: Box<gix::open::Error> },

    #[error("git fetch/clone failed for {url}")]
    Transport { url: String, #[source] source: Box<dyn std::error::Error + Send + Sync> },

    #[error("{dir} is not a git repository")]
    NotARepository { dir: String },

    #[error("ref {name:?} not found in {dir}")]
    RefNotFound { dir: String, name: String },

    #[error("{dir} working tree has uncommitted changes")]
    Dirty { dir: String },
}

impl VcsError {
    pub fn command(dir: impl Into<String>, args: &[&str], output: &std::process::Output) -> Self {
        VcsError::Command {
            dir: dir.into(),
            args: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            exit_code: output.status.code(),
        }
    }
}
