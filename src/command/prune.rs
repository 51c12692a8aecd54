use clap::Args;

/// Prune (delete) already merged topics
#[derive(Args, Debug)]
pub struct PruneArgs {
    projects: Option<Vec<String>>,
}
