use serde::Deserialize;

/// See [Google's documentation](https://gerrit.googlesource.com/git-repo/+/master/docs/manifest-format.md#Element-remove_project)
#[derive(Debug, Clone, Deserialize)]
pub struct RemoveProject {
    #[serde(rename = "@name")]
    pub name: String,
}
