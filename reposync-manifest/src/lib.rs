pub mod default;
pub mod error;
pub mod extend_project;
pub mod include;
pub mod loader;
pub mod manifest_server;
pub mod notice;
pub mod project;
mod raw;
pub mod remote;
pub mod remove_project;
pub mod repo_hooks;

pub use self::default::Default;
pub use self::loader::ManifestLoader;

use self::{
    manifest_server::ManifestServer, notice::Notice, project::Project, remote::Remote,
    remove_project::RemoveProject,
};

/// A fully resolved manifest: every `<include>` has been pulled in and every
/// `<remove-project>`/`<extend-project>` already applied.
///
/// See [Google's documentation](https://gerrit.googlesource.com/git-repo/+/master/docs/manifest-format.md#Element-manifest)
/// for the source element this is merged from.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub notice: Option<Notice>,

    /// One or more remote elements may be specified.
    /// Each remote element specifies a Git URL shared by one or more projects and (optionally) the Gerrit review server those projects upload changes through.
    pub remote: Option<Vec<Remote>>,

    /// At most one default element may be specified.
    /// Its remote and revision attributes are used when a project element does not specify its own remote or revision attribute.
    pub default: Option<self::default::Default>,

    /// At most one manifest-server may be specified.
    /// The url attribute is used to specify the URL of a manifest server, which is an XML RPC service used by `--smart-sync`/`--smart-tag`.
    pub manifest_server: Option<ManifestServer>,

    /// Always `None` on a merged `Manifest` — remove-project has already been
    /// applied by the loader. Kept so the field layout mirrors the raw
    /// element for documentation purposes.
    pub remove_project: Option<Vec<RemoveProject>>,

    /// One or more project elements may be specified.
    /// Each element describes a single Git repository to be cloned into the repo client workspace.
    pub project: Option<Vec<Project>>,

    /// Always `None` on a merged `Manifest` — extend-project mutations have
    /// already been folded into the matching `project` entries.
    pub extend_project: Option<Vec<crate::extend_project::ExtendProject>>,

    pub repo_hooks: Option<crate::repo_hooks::RepoHooks>,

    /// Always `None` on a merged `Manifest` — includes have already been
    /// flattened by the loader.
    pub include: Option<Vec<crate::include::Include>>,
}

impl Manifest {
    pub fn projects(&self) -> Vec<Project> {
        self.project.clone().unwrap_or_default()
    }

    pub fn remotes(&self) -> Vec<Remote> {
        self.remote.clone().unwrap_or_default()
    }

    /// Look up a previously defined `<remote>` by name.
    pub fn remote_named(&self, name: &str) -> Option<&Remote> {
        self.remote.as_deref().unwrap_or_default().iter().find(|r| r.name == name)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use insta::assert_debug_snapshot;
    use tempfile::tempdir;

    use crate::loader::ManifestLoader;

    const DEFAULT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest>
  <remote name="aosp" fetch="https://android.googlesource.com/" review="android-review.googlesource.com" />
  <default remote="aosp" revision="refs/heads/main" sync-j="4" />
  <project name="platform/build" path="build" groups="core,pdk" />
  <project name="platform/frameworks/base" path="frameworks/base" revision="refs/heads/release" />
</manifest>
"#;

    const LOCAL_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest>
  <remove-project name="platform/frameworks/base" />
  <project name="platform/frameworks/base" path="frameworks/base" revision="refs/heads/experimental" />
  <extend-project name="platform/build" groups="notdefault" />
</manifest>
"#;

    fn write(dir: &std::path::Path, name: &str, contents: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn loads_single_fragment() {
        let dir = tempdir().unwrap();
        write(dir.path(), "default.xml", DEFAULT_XML);

        let manifest = ManifestLoader::new(dir.path()).load("default.xml").unwrap();

        assert_eq!(manifest.projects().len(), 2);
        assert_eq!(manifest.remotes().len(), 1);
        assert_debug_snapshot!(manifest.default);
    }

    #[test]
    fn local_manifest_replaces_and_extends() {
        let dir = tempdir().unwrap();
        write(dir.path(), "default.xml", DEFAULT_XML);
        let local_dir = dir.path().join("local_manifests");
        std::fs::create_dir(&local_dir).unwrap();
        write(&local_dir, "override.xml", LOCAL_XML);

        let manifest = ManifestLoader::new(dir.path())
            .load_with_local_manifests("default.xml", &local_dir)
            .unwrap();

        let projects = manifest.projects();
        assert_eq!(projects.len(), 2);

        let base = projects.iter().find(|p| p.name == "platform/frameworks/base").unwrap();
        assert_eq!(base.revision.as_deref(), Some("refs/heads/experimental"));

        let build = projects.iter().find(|p| p.name == "platform/build").unwrap();
        assert_eq!(build.explicit_groups(), vec!["core", "pdk", "notdefault"]);
    }

    #[test]
    fn conflicting_defaults_across_includes_is_an_error() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "top.xml",
            r#"<manifest>
                 <include name="a.xml" />
                 <include name="b.xml" />
               </manifest>"#,
        );
        write(
            dir.path(),
            "a.xml",
            r#"<manifest><default remote="aosp" revision="main" /></manifest>"#,
        );
        write(
            dir.path(),
            "b.xml",
            r#"<manifest><default remote="aosp" revision="other" /></manifest>"#,
        );

        let result = ManifestLoader::new(dir.path()).load("top.xml");
        assert!(result.is_err());
    }
}
