use serde::Deserialize;

/// See [Google's documentation](https://gerrit.googlesource.com/git-repo/+/master/docs/manifest-format.md#Element-remote)
#[derive(Debug, Clone, Deserialize)]
pub struct Remote {
    /// A short name unique to this manifest file.
    /// The name specified here is used as the remote name in each project's .git/config,
    ///     and is therefore automatically available to commands like git fetch, git remote, git pull and git push.
    #[serde(rename = "@name")]
    pub name: String,

    /// The alias, if specified, is used to override name to be set as the remote name in each project's .git/config.
    /// Its value can be duplicated while attribute name has to be unique in the manifest file.
    /// This helps each project to be able to have same remote name which actually points to different remote url.
    #[serde(rename = "@alias")]
    pub alias: Option<String>,

    /// The Git URL prefix for all projects which use this remote.
    /// Each project's name is appended to this prefix to form the actual URL used to clone the project.
    #[serde(rename = "@fetch")]
    pub fetch: String,

    /// The Git "push" URL prefix for all projects which use this remote.
    /// Each project's name is appended to this prefix to form the actual URL used to "git push" the project.
    /// This attribute is optional; if not specified then "git push" will use the same URL as the fetch attribute.
    #[serde(rename = "@pushurl")]
    pub pushurl: Option<String>,

    /// Hostname of the Gerrit server where reviews are uploaded to by repo upload.
    /// This attribute is optional; if not specified then repo upload will not function.
    #[serde(rename = "@review")]
    pub review: Option<String>,

    /// Name of a Git branch (e.g. master or refs/heads/master).
    /// Remotes with their own revision will override the default revision.
    #[serde(rename = "@revision")]
    pub revision: Option<String>,
}

impl Remote {
    /// The name each project's `.git/config` remote section is written under:
    /// `alias` if present, else `name`.
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// The fetch URL for a project with the given manifest name.
    pub fn fetch_url_for(&self, project_name: &str) -> String {
        format!("{}/{}.git", self.fetch.trim_end_matches('/'), project_name)
    }

    /// The push URL for a project, falling back to the fetch URL.
    pub fn push_url_for(&self, project_name: &str) -> String {
        match &self.pushurl {
            Some(pushurl) => format!("{}/{}.git", pushurl.trim_end_matches('/'), project_name),
            None => self.fetch_url_for(project_name),
        }
    }
}
