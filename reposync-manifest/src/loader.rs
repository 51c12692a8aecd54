//! The manifest loader — out of scope per the specification (§1), but its
//! interface is what the synchronization engine consumes, so a minimal,
//! correct implementation lives here: reading one manifest fragment,
//! resolving `<include>` recursively, and merging `local_manifests/*.xml`
//! fragments in the same way repo's Python `XmlManifest._ParseManifest`
//! does (remove-project then project then extend-project, per fragment, in
//! the order fragments are visited).

use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::de::from_str;

use crate::error::ManifestParseError;
use crate::project::Project;
use crate::raw::RawManifest;
use crate::{Default as ManifestDefault, Manifest, Remote};

/// Loads and merges a tree of manifest fragments rooted at a directory
/// (the manifest repository's working tree, e.g. `.repo/manifests/`).
pub struct ManifestLoader {
    root_dir: PathBuf,
}

impl ManifestLoader {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        ManifestLoader { root_dir: root_dir.into() }
    }

    /// Load `entry_file` (a path relative to `root_dir`, e.g. `default.xml`)
    /// and merge every `<include>` it transitively pulls in.
    pub fn load(&self, entry_file: impl AsRef<Path>) -> Result<Manifest, ManifestParseError> {
        let mut builder = MergeBuilder::default();
        self.merge_fragment(entry_file.as_ref(), &mut builder)?;
        builder.finish()
    }

    /// Load the main manifest and then merge additional fragments found in
    /// `local_manifests_dir` (sorted by file name), matching §6's
    /// `local_manifests/*.xml`.
    pub fn load_with_local_manifests(
        &self,
        entry_file: impl AsRef<Path>,
        local_manifests_dir: impl AsRef<Path>,
    ) -> Result<Manifest, ManifestParseError> {
        let mut builder = MergeBuilder::default();
        self.merge_fragment(entry_file.as_ref(), &mut builder)?;

        let dir = local_manifests_dir.as_ref();
        if dir.is_dir() {
            let mut entries: Vec<PathBuf> = fs::read_dir(dir)
                .map_err(|source| ManifestParseError::Read {
                    path: dir.display().to_string(),
                    source,
                })?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("xml"))
                .collect();
            entries.sort();
            for path in entries {
                self.merge_fragment_absolute(&path, &mut builder)?;
            }
        }

        builder.finish()
    }

    fn merge_fragment(
        &self,
        relative_path: &Path,
        builder: &mut MergeBuilder,
    ) -> Result<(), ManifestParseError> {
        let absolute = self.root_dir.join(relative_path);
        self.merge_fragment_absolute(&absolute, builder)
    }

    fn merge_fragment_absolute(
        &self,
        absolute: &Path,
        builder: &mut MergeBuilder,
    ) -> Result<(), ManifestParseError> {
        let contents = fs::read_to_string(absolute).map_err(|source| ManifestParseError::Read {
            path: absolute.display().to_string(),
            source,
        })?;
        let raw: RawManifest = from_str(&contents).map_err(|source| ManifestParseError::Xml {
            path: absolute.display().to_string(),
            source,
        })?;

        for include in raw.include.into_iter().flatten() {
            let include_path = Path::new(&include.name);
            self.merge_fragment(include_path, builder).map_err(|source| {
                ManifestParseError::UnresolvedInclude {
                    name: include.name.clone(),
                    from_path: absolute.display().to_string(),
                    reason: source.to_string(),
                }
            })?;
        }

        if let Some(notice) = raw.notice {
            builder.notice = Some(notice);
        }

        if let Some(default) = raw.default {
            builder.merge_default(default, &absolute.display().to_string())?;
        }

        if let Some(manifest_server) = raw.manifest_server {
            builder.manifest_server = Some(manifest_server);
        }

        if let Some(repo_hooks) = raw.repo_hooks {
            builder.repo_hooks = Some(repo_hooks);
        }

        for remote in raw.remote.into_iter().flatten() {
            builder.upsert_remote(remote);
        }

        for remove in raw.remove_project.into_iter().flatten() {
            builder.remove_project(&remove.name);
        }

        for project in raw.project.into_iter().flatten() {
            builder.upsert_project(project);
        }

        for extend in raw.extend_project.into_iter().flatten() {
            builder.apply_extend(extend)?;
        }

        Ok(())
    }
}

#[derive(Default)]
struct MergeBuilder {
    notice: Option<crate::notice::Notice>,
    default: Option<(ManifestDefault, String)>,
    manifest_server: Option<crate::manifest_server::ManifestServer>,
    repo_hooks: Option<crate::repo_hooks::RepoHooks>,
    remotes: Vec<Remote>,
    projects: Vec<Project>,
}

impl MergeBuilder {
    fn merge_default(
        &mut self,
        default: ManifestDefault,
        path: &str,
    ) -> Result<(), ManifestParseError> {
        if default.is_empty() {
            return Ok(());
        }
        match &self.default {
            None => {
                self.default = Some((default, path.to_owned()));
                Ok(())
            }
            Some((existing, first_path)) => {
                if defaults_equivalent(existing, &default) {
                    Ok(())
                } else {
                    Err(ManifestParseError::ConflictingDefaults {
                        first_path: first_path.clone(),
                        second_path: path.to_owned(),
                    })
                }
            }
        }
    }

    fn upsert_remote(&mut self, remote: Remote) {
        if let Some(existing) = self.remotes.iter_mut().find(|r| r.name == remote.name) {
            *existing = remote;
        } else {
            self.remotes.push(remote);
        }
    }

    fn upsert_project(&mut self, project: Project) {
        if let Some(existing) = self.projects.iter_mut().find(|p| p.name == project.name) {
            *existing = project;
        } else {
            self.projects.push(project);
        }
    }

    fn remove_project(&mut self, name: &str) {
        self.projects.retain(|p| p.name != name);
    }

    fn apply_extend(
        &mut self,
        extend: crate::extend_project::ExtendProject,
    ) -> Result<(), ManifestParseError> {
        let additional_groups = extend.additional_groups();
        let mut matched = false;
        for project in self.projects.iter_mut().filter(|p| p.name == extend.name) {
            if let Some(path_filter) = &extend.path {
                if project.relpath() != path_filter {
                    continue;
                }
            }
            matched = true;
            if !additional_groups.is_empty() {
                let mut groups = project.explicit_groups();
                groups.extend(additional_groups.iter().cloned());
                project.groups = Some(groups.join(","));
            }
            if let Some(revision) = &extend.revision {
                project.revision = Some(revision.clone());
            }
            if let Some(remote) = &extend.remote {
                project.remote = Some(remote.clone());
            }
        }
        if !matched {
            return Err(ManifestParseError::UnknownExtendTarget { name: extend.name });
        }
        Ok(())
    }

    fn finish(self) -> Result<Manifest, ManifestParseError> {
        Ok(Manifest {
            notice: self.notice,
            remote: if self.remotes.is_empty() { None } else { Some(self.remotes) },
            default: self.default.map(|(d, _)| d),
            manifest_server: self.manifest_server,
            remove_project: None,
            project: if self.projects.is_empty() { None } else { Some(self.projects) },
            extend_project: None,
            repo_hooks: self.repo_hooks,
            include: None,
        })
    }
}

fn defaults_equivalent(a: &ManifestDefault, b: &ManifestDefault) -> bool {
    a.remote == b.remote
        && a.revision == b.revision
        && a.dest_branch == b.dest_branch
        && a.upstream == b.upstream
        && a.sync_j == b.sync_j
        && a.sync_c == b.sync_c
        && a.sync_s == b.sync_s
        && a.sync_tags == b.sync_tags
}
