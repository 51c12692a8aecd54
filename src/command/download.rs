use clap::Args;

/// Download and checkout a change
#[derive(Args, Debug)]
pub struct DownloadArgs {
    project: String,
    change: String,
}
