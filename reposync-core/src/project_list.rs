//! C6: reconciles the on-disk project directories with the set declared by
//! the current manifest (§4.6), backed by the persistent `project.list`
//! file (§6).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use reposync_vcs::VcsDriver;

use crate::error::SyncError;

pub struct ProjectList {
    path: PathBuf,
}

impl ProjectList {
    pub fn new(metadata_dir: impl Into<PathBuf>) -> Self {
        ProjectList { path: metadata_dir.into().join("project.list") }
    }

    fn read_old(&self) -> BTreeSet<String> {
        std::fs::read_to_string(&self.path)
            .map(|contents| contents.lines().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    /// Reconcile `new` (the current manifest's relpaths) against the
    /// previously recorded set, removing worktrees no longer in the
    /// manifest and pruning now-empty parent directories, then persisting
    /// `new`. `status_of` reports whether the on-disk project at a path is
    /// dirty (per the working-tree status of its driver); a dirty removal
    /// aborts the whole operation per §4.6 step 3.
    pub fn reconcile(
        &self,
        workspace_root: &Path,
        new: &BTreeSet<String>,
        status_of: impl Fn(&str) -> Option<Box<dyn VcsDriver>>,
    ) -> Result<(), SyncError> {
        let old = self.read_old();

        for stale in old.difference(new) {
            let worktree = workspace_root.join(stale);
            if !worktree.exists() {
                continue;
            }
            if let Some(driver) = status_of(stale) {
                let status = driver
                    .status()
                    .map_err(|source| SyncError::GitOperation { project: stale.clone(), source })?;
                if !status.is_clean() {
                    return Err(SyncError::Dirty { project: stale.clone() });
                }
            }
            std::fs::remove_dir_all(&worktree)?;
            prune_empty_parents(workspace_root, &worktree);
        }

        self.write(new)
    }

    fn write(&self, new: &BTreeSet<String>) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut contents = String::new();
        for path in new {
            contents.push_str(path);
            contents.push('\n');
        }
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

fn prune_empty_parents(workspace_root: &Path, removed: &Path) {
    let mut current = removed.parent();
    while let Some(dir) = current {
        if dir == workspace_root {
            break;
        }
        match std::fs::read_dir(dir) {
            Ok(mut entries) if entries.next().is_none() => {
                if std::fs::remove_dir(dir).is_err() {
                    break;
                }
                current = dir.parent();
            }
            _ => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_sorted_newline_terminated_list() {
        let dir = tempfile::tempdir().unwrap();
        let list = ProjectList::new(dir.path());
        let new: BTreeSet<String> = ["b", "a"].into_iter().map(String::from).collect();
        list.reconcile(dir.path(), &new, |_| None).unwrap();
        let contents = std::fs::read_to_string(dir.path().join("project.list")).unwrap();
        assert_eq!(contents, "a\nb\n");
    }

    #[test]
    fn removes_stale_clean_project_and_prunes_empty_parent() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path();
        std::fs::create_dir_all(ws.join("sub/old")).unwrap();
        std::fs::write(ws.join("project.list"), "sub/old\n").unwrap();

        let list = ProjectList::new(ws);
        let new: BTreeSet<String> = BTreeSet::new();
        list.reconcile(ws, &new, |_| None).unwrap();

        assert!(!ws.join("sub/old").exists());
        assert!(!ws.join("sub").exists());
    }
}
