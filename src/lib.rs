//! The `resync` CLI surface: argument parsing and per-subcommand glue over
//! the `reposync-core`/`reposync-manifest`/`reposync-vcs` engine.

pub mod command;
