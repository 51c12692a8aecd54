//! C1: read-only snapshot of a git-dir's refs, with staleness detection.
//!
//! Mirrors `git_refs.py`: packed-refs first, then a walk of loose ref
//! files under `refs/`, then `HEAD`; symbolic refs are resolved by repeated
//! lookup up to five passes. Reloaded whole whenever any tracked file's
//! mtime changes — no partial invalidation.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const MAX_SYMREF_PASSES: usize = 5;

#[derive(Debug, Clone)]
enum Entry {
    Id(String),
    Symref(String),
}

#[derive(Debug)]
pub struct RefIndex {
    gitdir: PathBuf,
    entries: HashMap<String, Entry>,
    tracked_mtimes: HashMap<PathBuf, SystemTime>,
}

impl RefIndex {
    /// Load (or reuse, if nothing tracked has changed) the ref index for
    /// `gitdir`.
    pub fn load(gitdir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let gitdir = gitdir.into();
        let mut index =
            RefIndex { gitdir: gitdir.clone(), entries: HashMap::new(), tracked_mtimes: HashMap::new() };
        index.reload()?;
        Ok(index)
    }

    /// True if any tracked file's mtime differs from what was recorded at
    /// load time — the whole index must then be discarded and reloaded.
    pub fn is_stale(&self) -> bool {
        self.tracked_mtimes.iter().any(|(path, recorded)| mtime_of(path) != Some(*recorded))
    }

    pub fn reload_if_stale(&mut self) -> std::io::Result<()> {
        if self.is_stale() {
            self.reload()?;
        }
        Ok(())
    }

    fn reload(&mut self) -> std::io::Result<()> {
        self.entries.clear();
        self.tracked_mtimes.clear();

        let packed = self.gitdir.join("packed-refs");
        if packed.is_file() {
            let contents = fs::read_to_string(&packed)?;
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') || line.starts_with('^') {
                    continue;
                }
                if let Some((oid, name)) = line.split_once(' ') {
                    self.entries.insert(name.to_owned(), Entry::Id(oid.to_owned()));
                }
            }
            self.track(&packed);
        }

        let refs_dir = self.gitdir.join("refs");
        if refs_dir.is_dir() {
            self.walk_loose_refs(&refs_dir, "refs")?;
        }

        let head_path = self.gitdir.join("HEAD");
        if head_path.is_file() {
            if let Ok(contents) = fs::read_to_string(&head_path) {
                self.insert_loose_entry("HEAD", contents.trim());
            }
            self.track(&head_path);
        }

        self.resolve_symrefs();
        Ok(())
    }

    fn walk_loose_refs(&mut self, dir: &Path, prefix: &str) -> std::io::Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(_) => return Ok(()), // absent loose ref directories are not fatal
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = match entry.file_name().into_string() {
                Ok(n) => n,
                Err(_) => continue,
            };
            let full_name = format!("{prefix}/{name}");
            if path.is_dir() {
                self.walk_loose_refs(&path, &full_name)?;
            } else if let Ok(contents) = fs::read_to_string(&path) {
                self.insert_loose_entry(&full_name, contents.trim());
                self.track(&path);
            }
            // individual loose-ref read errors are ignored: the ref is
            // treated as absent, per §4.1's failure policy.
        }
        Ok(())
    }

    fn insert_loose_entry(&mut self, name: &str, contents: &str) {
        if let Some(target) = contents.strip_prefix("ref: ") {
            self.entries.insert(name.to_owned(), Entry::Symref(target.trim().to_owned()));
        } else {
            self.entries.insert(name.to_owned(), Entry::Id(contents.to_owned()));
        }
    }

    fn track(&mut self, path: &Path) {
        if let Some(mtime) = mtime_of(path) {
            self.tracked_mtimes.insert(path.to_path_buf(), mtime);
        }
    }

    fn resolve_symrefs(&mut self) {
        for _ in 0..MAX_SYMREF_PASSES {
            let mut changed = false;
            let names: Vec<String> = self.entries.keys().cloned().collect();
            for name in names {
                if let Some(Entry::Symref(target)) = self.entries.get(&name).cloned() {
                    if let Some(Entry::Id(id)) = self.entries.get(&target).cloned() {
                        self.entries.insert(name, Entry::Id(id));
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// All resolved entries: `ref-name -> object-id`. Unresolved symrefs
    /// (pointing at a ref this index never saw, e.g. an unborn branch) are
    /// omitted.
    pub fn all(&self) -> HashMap<String, String> {
        self.entries
            .iter()
            .filter_map(|(name, entry)| match entry {
                Entry::Id(id) => Some((name.clone(), id.clone())),
                Entry::Symref(_) => None,
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<String> {
        match self.entries.get(name)? {
            Entry::Id(id) => Some(id.clone()),
            Entry::Symref(_) => None,
        }
    }

    pub fn symref(&self, name: &str) -> Option<String> {
        match self.entries.get(name)? {
            Entry::Symref(target) => Some(target.clone()),
            Entry::Id(_) => None,
        }
    }

    pub fn deleted(&mut self, name: &str) {
        self.entries.remove(name);
    }
}

fn mtime_of(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).ok()?.modified().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_packed_and_loose_refs() {
        let dir = tempfile::tempdir().unwrap();
        let gitdir = dir.path();
        fs::write(
            gitdir.join("packed-refs"),
            "# pack-refs with: peeled fully-peeled sorted\naaaa000000000000000000000000000000000a refs/heads/packed\n",
        )
        .unwrap();
        fs::create_dir_all(gitdir.join("refs/heads")).unwrap();
        fs::write(
            gitdir.join("refs/heads/main"),
            "bbbb000000000000000000000000000000000b\n",
        )
        .unwrap();
        fs::write(gitdir.join("HEAD"), "ref: refs/heads/main\n").unwrap();

        let index = RefIndex::load(gitdir).unwrap();
        assert_eq!(index.get("refs/heads/packed").as_deref(), Some("aaaa000000000000000000000000000000000a"));
        assert_eq!(index.get("refs/heads/main").as_deref(), Some("bbbb000000000000000000000000000000000b"));
        assert_eq!(index.get("HEAD").as_deref(), Some("bbbb000000000000000000000000000000000b"));
    }

    #[test]
    fn detects_staleness_after_mtime_change() {
        let dir = tempfile::tempdir().unwrap();
        let gitdir = dir.path();
        fs::create_dir_all(gitdir.join("refs/heads")).unwrap();
        fs::write(gitdir.join("refs/heads/main"), "a".repeat(40)).unwrap();

        let index = RefIndex::load(gitdir).unwrap();
        assert!(!index.is_stale());

        std::thread::sleep(std::time::Duration::from_millis(10));
        fs::write(gitdir.join("refs/heads/main"), "b".repeat(40)).unwrap();
        assert!(index.is_stale());
    }
}
