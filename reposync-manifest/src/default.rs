use serde::Deserialize;

/// See [Google's documentation](https://gerrit.googlesource.com/git-repo/+/master/docs/manifest-format.md#Element-default)
#[derive(Debug, Clone, Deserialize)]
pub struct Default {
    /// Name of a previously defined remote element.
    /// Project elements lacking a remote attribute of their own will use this remote.
    #[serde(rename = "@remote")]
    pub remote: Option<String>,

    /// Name of a Git branch (e.g. master or refs/heads/master).
    /// Project elements lacking their own revision attribute will use this revision.
    #[serde(rename = "@revision")]
    pub revision: Option<String>,

    /// Name of a Git branch (e.g. master).
    /// Project elements not setting their own dest-branch will inherit this value.
    /// If this value is not set, projects will use revision by default instead.
    #[serde(rename = "@dest-branch")]
    pub dest_branch: Option<String>,

    /// Name of the Git ref in which a sha1 can be found.
    /// Used when syncing a revision locked manifest in -c mode to avoid having to sync the entire ref space.
    /// Project elements not setting their own upstream will inherit this value.
    #[serde(rename = "@upstream")]
    pub upstream: Option<String>,

    /// Number of parallel jobs to use when synching.
    #[serde(rename = "@sync-j")]
    pub sync_j: Option<String>,

    /// Set to true to only sync the given Git branch (specified in the revision attribute) rather than the whole ref space.
    /// Project elements lacking a sync-c element of their own will use this value.
    #[serde(rename = "@sync-c")]
    pub sync_c: Option<String>,

    /// Set to true to also sync sub-projects.
    #[serde(rename = "@sync-s")]
    pub sync_s: Option<String>,

    /// Set to false to only sync the given Git branch (specified in the revision attribute) rather than the other ref tags.
    #[serde(rename = "@sync-tags")]
    pub sync_tags: Option<String>,
}

impl Default {
    /// A default element with every attribute unset.
    pub fn empty() -> Self {
        Default {
            remote: None,
            revision: None,
            dest_branch: None,
            upstream: None,
            sync_j: None,
            sync_c: None,
            sync_s: None,
            sync_tags: None,
        }
    }

    /// True when every attribute is unset — the value a `<default/>` element
    /// with no attributes deserializes to. Used when checking that the same
    /// (trivial) default can be merged across `<include>` fragments.
    pub fn is_empty(&self) -> bool {
        self.remote.is_none()
            && self.revision.is_none()
            && self.dest_branch.is_none()
            && self.upstream.is_none()
            && self.sync_j.is_none()
            && self.sync_c.is_none()
            && self.sync_s.is_none()
            && self.sync_tags.is_none()
    }
}
