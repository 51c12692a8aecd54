use clap::Args;

/// Show changes between commit and working tree
#[derive(Args, Debug)]
pub struct DiffArgs {
    projects: Option<Vec<String>>,
}
