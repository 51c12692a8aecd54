pub mod driver;
pub mod error;
pub mod process;
pub mod types;

pub use driver::VcsDriver;
pub use error::VcsError;
pub use process::ProcessGitDriver;
pub use types::{FetchOptions, FetchOutcome, HeadState, Oid, RefName, WorkingTreeStatus};
