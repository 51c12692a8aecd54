use clap::Args;

/// Show the working tree status
#[derive(Args, Debug)]
pub struct StatusArgs {
    projects: Option<Vec<String>>,
    /// show the status of the outer manifest
    #[arg(long, default_value_t = false)]
    orphans: bool,
}
