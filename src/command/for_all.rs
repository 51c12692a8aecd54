use clap::Args;

/// Run a shell command in each project
#[derive(Args, Debug)]
pub struct ForAllArgs {
    projects: Option<Vec<String>>,
    #[arg(short = 'c', long)]
    command: String,
}
