use serde::Deserialize;

/// See [Google's documentation](https://gerrit.googlesource.com/git-repo/+/master/docs/manifest-format.md#Element-repo-hooks)
#[derive(Debug, Clone, Deserialize)]
pub struct RepoHooks {
    #[serde(rename = "@in-project")]
    pub in_project: String,
    #[serde(rename = "@enabled-list")]
    pub enabled_list: String,
}

impl RepoHooks {
    /// The hook names enabled for this manifest, whitespace-split.
    pub fn enabled_hooks(&self) -> Vec<&str> {
        self.enabled_list.split_whitespace().collect()
    }
}
