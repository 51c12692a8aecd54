use serde::Deserialize;

/// See [Google's documentation](https://gerrit.googlesource.com/git-repo/+/master/docs/manifest-format.md#Element-extend_project)
#[derive(Debug, Clone, Deserialize)]
pub struct ExtendProject {
    #[serde(rename = "@name")]
    pub name: String,

    /// If specified, limit the change to projects checked out at the specified path, rather than all projects with the given name.
    #[serde(rename = "@path")]
    pub path: Option<String>,

    /// List of additional groups to which this project belongs.
    /// Same syntax as the corresponding element of project.
    #[serde(rename = "@groups")]
    pub groups: Option<String>,

    /// If specified, overrides the revision of the original project.
    /// Same syntax as the corresponding element of project.
    #[serde(rename = "@revision")]
    pub revision: Option<String>,

    /// If specified, overrides the remote of the original project.
    /// Same syntax as the corresponding element of project.
    #[serde(rename = "@remote")]
    pub remote: Option<String>,
}

impl ExtendProject {
    pub fn additional_groups(&self) -> Vec<String> {
        self.groups
            .as_deref()
            .map(super::project::split_groups)
            .unwrap_or_default()
    }
}
