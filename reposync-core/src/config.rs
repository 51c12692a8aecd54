//! Strongly-typed configuration store for the keys this engine actually
//! consults, replacing the original tool's dynamically-keyed config object
//! (§9 REDESIGN FLAGS). Backed by [`reposync_vcs::VcsDriver::read_config`]/
//! `write_config` against the workspace's top-level git config, the same
//! storage the underlying VCS already provides rather than a bespoke file.

use std::collections::HashMap;

use reposync_vcs::VcsDriver;

/// Per-remote settings read from the `remote.<name>.*` family.
#[derive(Debug, Clone, Default)]
pub struct RemoteConfig {
    pub url: Option<String>,
    pub push_url: Option<String>,
    pub review: Option<String>,
}

/// Per-branch settings read from the `branch.<name>.*` family.
#[derive(Debug, Clone, Default)]
pub struct BranchConfig {
    pub merge: Option<String>,
    pub remote: Option<String>,
}

/// The subset of `repo.*`/`color.*`/`user.*`/`manifest.*` keys the engine
/// reads or writes. Anything outside this set is out of scope (§1).
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub repo_depth: Option<u32>,
    pub repo_mirror: bool,
    pub repo_archive: bool,
    pub repo_reference: Option<String>,
    pub color_ui: Option<String>,
    pub manifest_groups: Option<String>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub remotes: HashMap<String, RemoteConfig>,
    pub branches: HashMap<String, BranchConfig>,
}

impl Config {
    /// Load every key this engine cares about from `driver`'s config store.
    pub fn load(driver: &dyn VcsDriver) -> Result<Self, reposync_vcs::VcsError> {
        // `git config --get` only returns one key at a time; remote/branch
        // families are looked up lazily per name via `remote_for`/`branch_for`
        // rather than enumerated here, since the underlying driver has no
        // `--get-regexp` primitive in its object-safe interface.
        Ok(Config {
            repo_depth: get_u32(driver, "repo.depth")?,
            repo_mirror: get_bool(driver, "repo.mirror")?,
            repo_archive: get_bool(driver, "repo.archive")?,
            repo_reference: driver.read_config("repo.reference")?,
            color_ui: driver.read_config("color.ui")?,
            manifest_groups: driver.read_config("manifest.groups")?,
            user_name: driver.read_config("user.name")?,
            user_email: driver.read_config("user.email")?,
            remotes: HashMap::new(),
            branches: HashMap::new(),
        })
    }

    pub fn remote_for(
        &mut self,
        driver: &dyn VcsDriver,
        name: &str,
    ) -> Result<&RemoteConfig, reposync_vcs::VcsError> {
        if !self.remotes.contains_key(name) {
            let remote = RemoteConfig {
                url: driver.read_config(&format!("remote.{name}.url"))?,
                push_url: driver.read_config(&format!("remote.{name}.pushurl"))?,
                review: driver.read_config(&format!("remote.{name}.review"))?,
            };
            self.remotes.insert(name.to_owned(), remote);
        }
        Ok(self.remotes.get(name).expect("just inserted"))
    }

    pub fn branch_for(
        &mut self,
        driver: &dyn VcsDriver,
        name: &str,
    ) -> Result<&BranchConfig, reposync_vcs::VcsError> {
        if !self.branches.contains_key(name) {
            let branch = BranchConfig {
                merge: driver.read_config(&format!("branch.{name}.merge"))?,
                remote: driver.read_config(&format!("branch.{name}.remote"))?,
            };
            self.branches.insert(name.to_owned(), branch);
        }
        Ok(self.branches.get(name).expect("just inserted"))
    }

    pub fn set_branch_merge(
        &mut self,
        driver: &dyn VcsDriver,
        branch: &str,
        merge_ref: &str,
    ) -> Result<(), reposync_vcs::VcsError> {
        driver.write_config(&format!("branch.{branch}.merge"), merge_ref)?;
        self.branches.entry(branch.to_owned()).or_default().merge = Some(merge_ref.to_owned());
        Ok(())
    }
}

fn get_bool(driver: &dyn VcsDriver, key: &str) -> Result<bool, reposync_vcs::VcsError> {
    Ok(driver.read_config(key)?.map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false))
}

fn get_u32(driver: &dyn VcsDriver, key: &str) -> Result<Option<u32>, reposync_vcs::VcsError> {
    Ok(driver.read_config(key)?.and_then(|v| v.parse().ok()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    use reposync_vcs::{FetchOptions, FetchOutcome, HeadState, Oid, RefName, VcsError, WorkingTreeStatus};

    use super::*;

    /// A [`VcsDriver`] backed by a plain key/value map, standing in for a
    /// real `git config` store.
    struct FakeConfigStore(Mutex<HashMap<String, String>>);

    impl FakeConfigStore {
        fn new(entries: &[(&str, &str)]) -> Self {
            FakeConfigStore(Mutex::new(entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()))
        }
    }

    impl VcsDriver for FakeConfigStore {
        fn root(&self) -> &Path {
            Path::new(".")
        }
        fn init(&self, _: bool) -> Result<(), VcsError> {
            unimplemented!()
        }
        fn fetch(&self, _: &str, _: &[String], _: &FetchOptions) -> Result<FetchOutcome, VcsError> {
            unimplemented!()
        }
        fn clone_from(&self, _: &str, _: &FetchOptions) -> Result<FetchOutcome, VcsError> {
            unimplemented!()
        }
        fn ls_remote(&self, _: &str) -> Result<Vec<(RefName, Oid)>, VcsError> {
            unimplemented!()
        }
        fn rev_parse(&self, _: &str) -> Result<Oid, VcsError> {
            unimplemented!()
        }
        fn head_state(&self) -> Result<HeadState, VcsError> {
            unimplemented!()
        }
        fn symbolic_ref(&self, _: &str, _: &RefName) -> Result<(), VcsError> {
            unimplemented!()
        }
        fn update_ref(&self, _: &RefName, _: &Oid) -> Result<(), VcsError> {
            unimplemented!()
        }
        fn checkout(&self, _: &str, _: Option<&str>) -> Result<(), VcsError> {
            unimplemented!()
        }
        fn reset_hard(&self, _: &Oid) -> Result<(), VcsError> {
            unimplemented!()
        }
        fn rebase(&self, _: &RefName) -> Result<bool, VcsError> {
            unimplemented!()
        }
        fn merge(&self, _: &Oid, _: bool) -> Result<bool, VcsError> {
            unimplemented!()
        }
        fn cherry_pick(&self, _: &Oid) -> Result<bool, VcsError> {
            unimplemented!()
        }
        fn status(&self) -> Result<WorkingTreeStatus, VcsError> {
            unimplemented!()
        }
        fn diff_names(&self, _: &Oid, _: Option<&Oid>) -> Result<Vec<String>, VcsError> {
            unimplemented!()
        }
        fn rev_list_count(&self, _: &str) -> Result<u32, VcsError> {
            unimplemented!()
        }
        fn rev_list_with_committers(&self, _: &str) -> Result<Vec<(Oid, String)>, VcsError> {
            unimplemented!()
        }
        fn read_config(&self, key: &str) -> Result<Option<String>, VcsError> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }
        fn write_config(&self, key: &str, value: &str) -> Result<(), VcsError> {
            self.0.lock().unwrap().insert(key.to_owned(), value.to_owned());
            Ok(())
        }
        fn pack_refs(&self) -> Result<(), VcsError> {
            unimplemented!()
        }
        fn gc(&self, _: bool, _: usize) -> Result<(), VcsError> {
            unimplemented!()
        }
        fn push(&self, _: &str, _: &str) -> Result<(), VcsError> {
            unimplemented!()
        }
        fn ls_tree_gitlinks(&self, _: &str) -> Result<Vec<(String, Oid)>, VcsError> {
            unimplemented!()
        }
        fn read_gitmodules(&self, _: &str) -> Result<Vec<(String, String, String)>, VcsError> {
            unimplemented!()
        }
    }

    #[test]
    fn load_reads_the_keys_it_consumes() {
        let store = FakeConfigStore::new(&[
            ("repo.depth", "10"),
            ("repo.mirror", "true"),
            ("user.name", "Dev"),
            ("user.email", "dev@example.invalid"),
        ]);

        let config = Config::load(&store).unwrap();
        assert_eq!(config.repo_depth, Some(10));
        assert!(config.repo_mirror);
        assert!(!config.repo_archive);
        assert_eq!(config.user_name.as_deref(), Some("Dev"));
        assert_eq!(config.user_email.as_deref(), Some("dev@example.invalid"));
    }

    #[test]
    fn remote_for_caches_after_first_lookup() {
        let store = FakeConfigStore::new(&[("remote.origin.url", "https://example.invalid/r")]);
        let mut config = Config::load(&store).unwrap();

        let remote = config.remote_for(&store, "origin").unwrap().clone();
        assert_eq!(remote.url.as_deref(), Some("https://example.invalid/r"));
        assert!(config.remotes.contains_key("origin"));
    }

    #[test]
    fn set_branch_merge_writes_through_and_caches() {
        let store = FakeConfigStore::new(&[]);
        let mut config = Config::load(&store).unwrap();

        config.set_branch_merge(&store, "work", "refs/heads/main").unwrap();

        assert_eq!(config.branches.get("work").unwrap().merge.as_deref(), Some("refs/heads/main"));
        assert_eq!(store.read_config("branch.work.merge").unwrap().as_deref(), Some("refs/heads/main"));
    }
}
