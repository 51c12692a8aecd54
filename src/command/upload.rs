use clap::Args;

/// Upload changes for code review
#[derive(Args, Debug)]
pub struct UploadArgs {
    projects: Option<Vec<String>>,
    /// single branch to upload
    #[arg(long)]
    branch: Option<String>,
}
