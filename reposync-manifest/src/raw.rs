//! The direct `quick-xml` deserialization target for a single manifest
//! fragment, before `<include>` resolution or any cross-fragment merging.
//! [`crate::loader::ManifestLoader`] is the only consumer of this type;
//! everything else in the crate works with the merged [`crate::Manifest`].

use serde::Deserialize;

use crate::default::Default as ManifestDefault;
use crate::extend_project::ExtendProject;
use crate::include::Include;
use crate::manifest_server::ManifestServer;
use crate::notice::Notice;
use crate::project::Project;
use crate::remote::Remote;
use crate::remove_project::RemoveProject;
use crate::repo_hooks::RepoHooks;

#[derive(Debug, Clone, Deserialize)]
pub struct RawManifest {
    pub notice: Option<Notice>,

    pub remote: Option<Vec<Remote>>,

    pub default: Option<ManifestDefault>,

    #[serde(rename = "manifest-server")]
    pub manifest_server: Option<ManifestServer>,

    #[serde(rename = "remove-project")]
    pub remove_project: Option<Vec<RemoveProject>>,

    pub project: Option<Vec<Project>>,

    #[serde(rename = "extend-project")]
    pub extend_project: Option<Vec<ExtendProject>>,

    #[serde(rename = "repo-hooks")]
    pub repo_hooks: Option<RepoHooks>,

    pub include: Option<Vec<Include>>,
}
