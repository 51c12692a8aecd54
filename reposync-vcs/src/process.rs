//! A [`VcsDriver`] backed by the `git` binary for porcelain operations
//! (checkout, rebase, merge, cherry-pick — anything with conflict machinery
//! `gix` doesn't implement) and by `gix` for plumbing reads (rev-parse,
//! ls-remote, ref resolution) where a library call is cheaper than spawning
//! a process. This split is exactly the tradeoff `repo` itself makes
//! between `git` subprocess calls and direct `.git` file manipulation.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::{debug, instrument};

use crate::driver::VcsDriver;
use crate::error::VcsError;
use crate::types::{FetchOptions, FetchOutcome, HeadState, Oid, RefName, WorkingTreeStatus};

/// `git_dir` holds refs/config/objects (directly, or via `objects/info/alternates`
/// when object storage is shared); `work_tree`, when set, is the checked-out
/// project directory a non-mirror project's porcelain commands act on. Both
/// are passed explicitly as `--git-dir`/`--work-tree` on every invocation
/// rather than relied upon via `cwd`-based discovery, since repo-tool-style
/// layouts keep a project's git-dir physically apart from its worktree
/// (§3 "gitdir≠objdir means refs live separately from objects").
pub struct ProcessGitDriver {
    git_dir: PathBuf,
    work_tree: Option<PathBuf>,
}

impl ProcessGitDriver {
    /// A driver whose git-dir and working directory are the same path —
    /// the common case for a bare mirror or a simple checkout.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ProcessGitDriver { git_dir: root.into(), work_tree: None }
    }

    /// A driver for a project whose git-dir lives apart from its worktree.
    pub fn with_worktree(git_dir: impl Into<PathBuf>, work_tree: impl Into<PathBuf>) -> Self {
        ProcessGitDriver { git_dir: git_dir.into(), work_tree: Some(work_tree.into()) }
    }

    fn display_root(&self) -> String {
        self.root().display().to_string()
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("--git-dir").arg(&self.git_dir);
        if let Some(work_tree) = &self.work_tree {
            cmd.arg("--work-tree").arg(work_tree);
        }
        cmd
    }

    fn run(&self, args: &[&str]) -> Result<Output, VcsError> {
        debug!(git_dir = %self.git_dir.display(), args = %args.join(" "), "git");
        self.base_command().args(args).output().map_err(|source| VcsError::Spawn {
            dir: self.display_root(),
            source,
        })
    }

    fn run_ok(&self, args: &[&str]) -> Result<String, VcsError> {
        let output = self.run(args)?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(VcsError::command(self.display_root(), args, &output))
        }
    }

    fn gix_repo(&self) -> Result<gix::Repository, VcsError> {
        gix::open(&self.git_dir).map_err(|source| VcsError::Plumbing {
            dir: self.display_root(),
            source: Box::new(source),
        })
    }
}

impl VcsDriver for ProcessGitDriver {
    fn root(&self) -> &Path {
        self.work_tree.as_ref().unwrap_or(&self.git_dir)
    }

    #[instrument(skip(self))]
    fn init(&self, bare: bool) -> Result<(), VcsError> {
        std::fs::create_dir_all(self.root()).map_err(|source| VcsError::Spawn {
            dir: self.display_root(),
            source,
        })?;
        if bare {
            std::fs::create_dir_all(&self.git_dir).map_err(|source| VcsError::Spawn {
                dir: self.display_root(),
                source,
            })?;
        }
        // `init` is the one call that must run before `--git-dir` points at
        // anything real, so it targets the root directly rather than going
        // through `base_command`.
        let mut cmd = Command::new("git");
        cmd.arg("init");
        if bare {
            cmd.arg("--bare").arg(&self.git_dir);
        } else if let Some(work_tree) = &self.work_tree {
            cmd.arg("--separate-git-dir").arg(&self.git_dir).arg(work_tree);
        } else {
            cmd.arg(&self.git_dir);
        }
        let output = cmd.output().map_err(|source| VcsError::Spawn { dir: self.display_root(), source })?;
        if !output.status.success() {
            return Err(VcsError::command(self.display_root(), &["init"], &output));
        }
        Ok(())
    }

    #[instrument(skip(self, options))]
    fn fetch(
        &self,
        remote_url: &str,
        refspecs: &[String],
        options: &FetchOptions,
    ) -> Result<FetchOutcome, VcsError> {
        let mut args: Vec<String> = vec!["fetch".into(), remote_url.into()];
        args.extend(refspecs.iter().cloned());
        if let Some(depth) = options.depth {
            args.push("--depth".into());
            args.push(depth.to_string());
        }
        if options.tags {
            args.push("--tags".into());
        } else {
            args.push("--no-tags".into());
        }
        if options.prune {
            args.push("--prune".into());
        }
        if let Some(reference) = &options.reference_dir {
            args.push(format!("--reference={}", reference.display()));
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let before = self.current_refs()?;
        self.run_ok(&arg_refs)?;
        let after = self.current_refs()?;

        let mut updated: Vec<(RefName, Oid)> = Vec::new();
        for (name, oid) in after.iter() {
            let changed = before.get(name).map(|prior| prior != oid).unwrap_or(true);
            if changed {
                updated.push((name.clone(), oid.clone()));
            }
        }

        Ok(FetchOutcome { no_op: updated.is_empty(), updated_refs: updated })
    }

    #[instrument(skip(self, options))]
    fn clone_from(&self, remote_url: &str, options: &FetchOptions) -> Result<FetchOutcome, VcsError> {
        self.init(false)?;
        self.run_ok(&["remote", "add", "origin", remote_url])?;
        self.fetch(remote_url, &["+refs/heads/*:refs/remotes/origin/*".to_owned()], options)
    }

    #[instrument(skip(self))]
    fn ls_remote(&self, remote_url: &str) -> Result<Vec<(RefName, Oid)>, VcsError> {
        let output = self.run_ok(&["ls-remote", remote_url])?;
        Ok(parse_ls_remote(&output))
    }

    fn rev_parse(&self, rev: &str) -> Result<Oid, VcsError> {
        let repo = self.gix_repo()?;
        let id = repo.rev_parse_single(rev).map_err(|_| VcsError::RefNotFound {
            dir: self.display_root(),
            name: rev.to_owned(),
        })?;
        Ok(id.detach().into())
    }

    fn head_state(&self) -> Result<HeadState, VcsError> {
        let symbolic = self.run(&["symbolic-ref", "-q", "HEAD"])?;
        if symbolic.status.success() {
            let name = String::from_utf8_lossy(&symbolic.stdout).trim().to_owned();
            return Ok(HeadState::Branch(RefName::new(name)));
        }
        match self.rev_parse("HEAD") {
            Ok(oid) => Ok(HeadState::Detached(oid)),
            Err(_) => Ok(HeadState::Unborn),
        }
    }

    fn symbolic_ref(&self, name: &str, target: &RefName) -> Result<(), VcsError> {
        self.run_ok(&["symbolic-ref", name, target.as_str()])?;
        Ok(())
    }

    fn update_ref(&self, name: &RefName, oid: &Oid) -> Result<(), VcsError> {
        self.run_ok(&["update-ref", name.as_str(), oid.as_str()])?;
        Ok(())
    }

    fn checkout(&self, target: &str, create_branch: Option<&str>) -> Result<(), VcsError> {
        match create_branch {
            Some(branch) => self.run_ok(&["checkout", "-B", branch, target])?,
            None => self.run_ok(&["checkout", "--detach", target])?,
        };
        Ok(())
    }

    fn reset_hard(&self, oid: &Oid) -> Result<(), VcsError> {
        self.run_ok(&["reset", "--hard", oid.as_str()])?;
        Ok(())
    }

    fn rebase(&self, upstream: &RefName) -> Result<bool, VcsError> {
        let output = self.run(&["rebase", upstream.as_str()])?;
        if output.status.success() {
            Ok(true)
        } else {
            let _ = self.run(&["rebase", "--abort"]);
            Ok(false)
        }
    }

    fn merge(&self, oid: &Oid, ff_only: bool) -> Result<bool, VcsError> {
        let mut args = vec!["merge"];
        if ff_only {
            args.push("--ff-only");
        }
        args.push(oid.as_str());
        let output = self.run(&args)?;
        Ok(output.status.success())
    }

    fn cherry_pick(&self, oid: &Oid) -> Result<bool, VcsError> {
        let output = self.run(&["cherry-pick", oid.as_str()])?;
        if output.status.success() {
            Ok(true)
        } else {
            let _ = self.run(&["cherry-pick", "--abort"]);
            Ok(false)
        }
    }

    fn status(&self) -> Result<WorkingTreeStatus, VcsError> {
        let output = self.run_ok(&["status", "--porcelain"])?;
        let dirty_paths = output
            .lines()
            .filter(|l| l.len() > 3)
            .map(|l| l[3..].trim().to_owned())
            .collect();
        Ok(WorkingTreeStatus { dirty_paths })
    }

    fn diff_names(&self, a: &Oid, b: Option<&Oid>) -> Result<Vec<String>, VcsError> {
        let mut args = vec!["diff", "--name-only", a.as_str()];
        if let Some(b) = b {
            args.push(b.as_str());
        }
        let output = self.run_ok(&args)?;
        Ok(output.lines().map(str::to_owned).collect())
    }

    fn rev_list_count(&self, range: &str) -> Result<u32, VcsError> {
        let output = self.run_ok(&["rev-list", "--count", range])?;
        output.trim().parse().map_err(|_| VcsError::Command {
            dir: self.display_root(),
            args: format!("rev-list --count {range}"),
            stderr: format!("unexpected output: {output:?}"),
            exit_code: None,
        })
    }

    fn rev_list_with_committers(&self, range: &str) -> Result<Vec<(Oid, String)>, VcsError> {
        let output = self.run_ok(&["log", "--format=%H%x09%ae", range])?;
        Ok(output
            .lines()
            .filter_map(|line| {
                let (oid, email) = line.split_once('\t')?;
                Some((Oid::new(oid), email.to_owned()))
            })
            .collect())
    }

    fn read_config(&self, key: &str) -> Result<Option<String>, VcsError> {
        let output = self.run(&["config", "--get", key])?;
        if output.status.success() {
            Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_owned()))
        } else {
            Ok(None)
        }
    }

    fn write_config(&self, key: &str, value: &str) -> Result<(), VcsError> {
        self.run_ok(&["config", key, value])?;
        Ok(())
    }

    fn pack_refs(&self) -> Result<(), VcsError> {
        self.run_ok(&["pack-refs", "--all"])?;
        Ok(())
    }

    fn gc(&self, aggressive: bool, pack_threads: usize) -> Result<(), VcsError> {
        let threads_arg = format!("pack.threads={}", pack_threads.max(1));
        let mut args: Vec<&str> = vec!["-c", &threads_arg, "gc"];
        if aggressive {
            args.push("--aggressive");
        } else {
            args.push("--auto");
        }
        self.run_ok(&args)?;
        Ok(())
    }

    fn push(&self, remote_url: &str, refspec: &str) -> Result<(), VcsError> {
        self.run_ok(&["push", remote_url, refspec])?;
        Ok(())
    }

    fn ls_tree_gitlinks(&self, rev: &str) -> Result<Vec<(String, Oid)>, VcsError> {
        let output = self.run_ok(&["ls-tree", "-r", rev])?;
        Ok(output
            .lines()
            .filter_map(|line| {
                let mut fields = line.splitn(2, '\t');
                let meta = fields.next()?;
                let path = fields.next()?;
                let mut meta_fields = meta.split_whitespace();
                let mode = meta_fields.next()?;
                let kind = meta_fields.next()?;
                let oid = meta_fields.next()?;
                if mode == "160000" && kind == "commit" {
                    Some((path.to_owned(), Oid::new(oid)))
                } else {
                    None
                }
            })
            .collect())
    }

    fn read_gitmodules(&self, rev: &str) -> Result<Vec<(String, String, String)>, VcsError> {
        let object = format!("{rev}:.gitmodules");
        let output = self.run(&["config", "--blob", &object, "--list"])?;
        if !output.status.success() {
            return Ok(Vec::new());
        }
        let text = String::from_utf8_lossy(&output.stdout);
        let mut paths: std::collections::HashMap<String, String> = Default::default();
        let mut urls: std::collections::HashMap<String, String> = Default::default();
        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else { continue };
            if let Some(name) = key.strip_prefix("submodule.").and_then(|k| k.strip_suffix(".path"))
            {
                paths.insert(name.to_owned(), value.to_owned());
            } else if let Some(name) =
                key.strip_prefix("submodule.").and_then(|k| k.strip_suffix(".url"))
            {
                urls.insert(name.to_owned(), value.to_owned());
            }
        }
        Ok(paths
            .into_iter()
            .filter_map(|(name, path)| {
                let url = urls.get(&name)?.clone();
                Some((name, path, url))
            })
            .collect())
    }
}

impl ProcessGitDriver {
    fn current_refs(&self) -> Result<std::collections::HashMap<RefName, Oid>, VcsError> {
        let output = self.run_ok(&["for-each-ref", "--format=%(refname) %(objectname)"])?;
        Ok(output
            .lines()
            .filter_map(|line| {
                let (name, oid) = line.split_once(' ')?;
                Some((RefName::new(name), Oid::new(oid)))
            })
            .collect())
    }
}

fn parse_ls_remote(output: &str) -> Vec<(RefName, Oid)> {
    output
        .lines()
        .filter_map(|line| {
            let (oid, name) = line.split_once('\t')?;
            Some((RefName::new(name.trim()), Oid::new(oid.trim())))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ls_remote_output() {
        let raw = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\tHEAD\nbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb\trefs/heads/main\n";
        let refs = parse_ls_remote(raw);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1].0.as_str(), "refs/heads/main");
        assert_eq!(refs[1].1.as_str(), "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
    }

    #[test]
    fn init_and_status_on_fresh_repo() {
        let dir = tempfile::tempdir().unwrap();
        let driver = ProcessGitDriver::new(dir.path());
        driver.init(false).unwrap();
        assert!(dir.path().join(".git").exists());
        let status = driver.status().unwrap();
        assert!(status.is_clean());
    }
}
