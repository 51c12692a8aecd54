//! Runtime project entities and the arena that owns them.
//!
//! The manifest crate's [`reposync_manifest::project::Project`] is a
//! declarative, possibly-nested XML element. This module flattens that tree
//! into a single `Vec<Project>` addressed by integer index, so `parent` and
//! `subprojects` are plain `usize`s rather than cyclic `Rc<RefCell<..>>`
//! pointers (§9 REDESIGN FLAGS — "arena of projects with integer indices").

use std::collections::HashSet;
use std::path::PathBuf;

use reposync_manifest::project::{Copyfile, LinkFile};
use reposync_manifest::{Manifest, Remote};

pub type ProjectIndex = usize;

/// One logical repository entry, resolved against its manifest defaults and
/// remote, with filesystem paths computed relative to a workspace root.
#[derive(Debug, Clone)]
pub struct Project {
    pub name: String,
    pub relpath: String,
    pub gitdir: PathBuf,
    pub objdir: PathBuf,
    pub worktree: Option<PathBuf>,

    pub remote_name: String,
    pub remote_url: String,
    pub push_url: String,
    pub review_url: Option<String>,

    pub revision_expr: String,
    pub revision_id: Option<String>,
    pub upstream: Option<String>,
    pub dest_branch: Option<String>,

    pub groups: HashSet<String>,

    pub sync_current_branch_only: bool,
    pub sync_submodules: bool,
    pub clone_depth: Option<u32>,
    pub rebase: bool,

    pub copyfiles: Vec<Copyfile>,
    pub linkfiles: Vec<LinkFile>,

    pub parent: Option<ProjectIndex>,
    pub subprojects: Vec<ProjectIndex>,
}

impl Project {
    pub fn is_mirror(&self) -> bool {
        self.worktree.is_none()
    }

    pub fn is_revision_pinned(&self) -> bool {
        self.revision_expr.len() == 40 && self.revision_expr.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

/// Owns every [`Project`] for one workspace, flat, addressed by index.
#[derive(Debug, Default)]
pub struct ProjectArena {
    projects: Vec<Project>,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("project {project:?} references unknown remote {remote:?}")]
    UnknownRemote { project: String, remote: String },
    #[error("project {project:?} has no revision: none given explicitly, by its remote, or by the manifest default")]
    MissingRevision { project: String },
    #[error("duplicate relpath {relpath:?} (projects {first:?} and {second:?})")]
    DuplicateRelpath { relpath: String, first: String, second: String },
}

impl ProjectArena {
    /// Flatten `manifest`'s (possibly nested) project list into an arena
    /// rooted at `workspace_root`, with git-dirs under
    /// `<workspace_root>/.repo/projects/<relpath>.git` and object-dirs under
    /// `<workspace_root>/.repo/project-objects/<name>.git` (shared by name,
    /// matching §6's persistent state layout).
    pub fn from_manifest(
        manifest: &Manifest,
        workspace_root: &std::path::Path,
    ) -> Result<Self, ResolveError> {
        let mut arena = ProjectArena::default();
        let mut seen_relpaths: std::collections::HashMap<String, String> = Default::default();

        for raw in manifest.projects() {
            arena.push_project(manifest, &raw, workspace_root, None, &mut seen_relpaths)?;
        }

        Ok(arena)
    }

    fn push_project(
        &mut self,
        manifest: &Manifest,
        raw: &reposync_manifest::project::Project,
        workspace_root: &std::path::Path,
        parent: Option<ProjectIndex>,
        seen_relpaths: &mut std::collections::HashMap<String, String>,
    ) -> Result<ProjectIndex, ResolveError> {
        let default = manifest.default.clone().unwrap_or_else(reposync_manifest::Default::empty);

        let remote_name = raw
            .remote
            .clone()
            .or_else(|| default.remote.clone())
            .ok_or_else(|| ResolveError::UnknownRemote {
                project: raw.name.clone(),
                remote: String::new(),
            })?;
        let remote: &Remote = manifest.remote_named(&remote_name).ok_or_else(|| {
            ResolveError::UnknownRemote { project: raw.name.clone(), remote: remote_name.clone() }
        })?;

        let revision_expr = raw
            .revision
            .clone()
            .or_else(|| remote.revision.clone())
            .or_else(|| default.revision.clone())
            .ok_or_else(|| ResolveError::MissingRevision { project: raw.name.clone() })?;

        let relpath = match parent {
            Some(parent_idx) => {
                format!("{}/{}", self.projects[parent_idx].relpath, raw.relpath())
            }
            None => raw.relpath().to_owned(),
        };

        if let Some(existing) = seen_relpaths.insert(relpath.clone(), raw.name.clone()) {
            return Err(ResolveError::DuplicateRelpath {
                relpath,
                first: existing,
                second: raw.name.clone(),
            });
        }

        let mut groups: HashSet<String> = raw.explicit_groups().into_iter().collect();
        groups.insert("all".to_owned());
        groups.insert(format!("name:{}", raw.name));
        groups.insert(format!("path:{relpath}"));

        let dest_branch = raw.dest_branch.clone().or_else(|| default.dest_branch.clone());
        let sync_current_branch_only = raw
            .sync_current_branch_only()
            .or_else(|| default.sync_c.as_deref().map(|v| v.eq_ignore_ascii_case("true")))
            .unwrap_or(false);
        let sync_submodules = raw
            .sync_submodules()
            .or_else(|| default.sync_s.as_deref().map(|v| v.eq_ignore_ascii_case("true")))
            .unwrap_or(false);

        let project = Project {
            name: raw.name.clone(),
            gitdir: workspace_root.join(".repo").join("projects").join(format!("{relpath}.git")),
            objdir: workspace_root
                .join(".repo")
                .join("project-objects")
                .join(format!("{}.git", raw.name)),
            worktree: Some(workspace_root.join(&relpath)),
            remote_name: remote.local_name().to_owned(),
            remote_url: remote.fetch_url_for(&raw.name),
            push_url: remote.push_url_for(&raw.name),
            review_url: remote.review.clone(),
            revision_expr,
            revision_id: None,
            upstream: raw.upstream.clone().or_else(|| default.upstream.clone()),
            dest_branch,
            groups,
            sync_current_branch_only,
            sync_submodules,
            clone_depth: raw.clone_depth(),
            rebase: raw.rebase(),
            copyfiles: raw.copyfiles().to_vec(),
            linkfiles: raw.linkfiles().to_vec(),
            parent,
            subprojects: Vec::new(),
            relpath,
        };

        let index = self.projects.len();
        self.projects.push(project);

        for child in raw.subprojects() {
            let child_index =
                self.push_project(manifest, child, workspace_root, Some(index), seen_relpaths)?;
            self.projects[index].subprojects.push(child_index);
        }

        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn get(&self, index: ProjectIndex) -> &Project {
        &self.projects[index]
    }

    pub fn get_mut(&mut self, index: ProjectIndex) -> &mut Project {
        &mut self.projects[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProjectIndex, &Project)> {
        self.projects.iter().enumerate()
    }

    /// Push a fully-formed root project directly, bypassing manifest
    /// resolution. Only meant for tests that need an arena populated without
    /// going through [`Self::from_manifest`].
    #[cfg(test)]
    pub(crate) fn push_root_for_test(&mut self, project: Project) -> ProjectIndex {
        let index = self.projects.len();
        self.projects.push(project);
        index
    }

    /// Register a submodule discovered at runtime (§4.8), parented under
    /// `parent`, returning its new index.
    pub fn register_submodule(&mut self, parent: ProjectIndex, submodule: Project) -> ProjectIndex {
        let index = self.projects.len();
        self.projects.push(submodule);
        self.projects[parent].subprojects.push(index);
        index
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use reposync_manifest::project::Project as RawProject;
    use reposync_manifest::remote::Remote;

    use super::*;

    fn raw_project(name: &str, path: Option<&str>, remote: Option<&str>, revision: Option<&str>) -> RawProject {
        RawProject {
            annotation: None,
            project: None,
            copyfile: None,
            linkfile: None,
            name: name.to_owned(),
            path: path.map(str::to_owned),
            remote: remote.map(str::to_owned),
            revision: revision.map(str::to_owned),
            dest_branch: None,
            groups: None,
            sync_c: None,
            sync_s: None,
            sync_tags: None,
            upstream: None,
            clone_depth: None,
            force_path: None,
            rebase: None,
        }
    }

    fn remote(name: &str) -> Remote {
        Remote {
            name: name.to_owned(),
            alias: None,
            fetch: "https://example.invalid".to_owned(),
            pushurl: None,
            review: None,
            revision: None,
        }
    }

    fn manifest(remotes: Vec<Remote>, default: Option<reposync_manifest::Default>, projects: Vec<RawProject>) -> Manifest {
        Manifest {
            notice: None,
            remote: Some(remotes),
            default,
            manifest_server: None,
            remove_project: None,
            project: Some(projects),
            extend_project: None,
            repo_hooks: None,
            include: None,
        }
    }

    #[test]
    fn resolves_paths_and_implicit_groups() {
        let m = manifest(
            vec![remote("aosp")],
            Some(reposync_manifest::Default { remote: Some("aosp".into()), revision: Some("refs/heads/main".into()), ..reposync_manifest::Default::empty() }),
            vec![raw_project("platform/build", Some("build"), None, None)],
        );

        let arena = ProjectArena::from_manifest(&m, Path::new("/workspace")).unwrap();
        assert_eq!(arena.len(), 1);
        let p = arena.get(0);
        assert_eq!(p.relpath, "build");
        assert_eq!(p.gitdir, Path::new("/workspace/.repo/projects/build.git"));
        assert_eq!(p.objdir, Path::new("/workspace/.repo/project-objects/platform/build.git"));
        assert_eq!(p.revision_expr, "refs/heads/main");
        assert!(p.groups.contains("all"));
        assert!(p.groups.contains("name:platform/build"));
        assert!(p.groups.contains("path:build"));
    }

    #[test]
    fn unknown_remote_is_an_error() {
        let m = manifest(vec![], None, vec![raw_project("p", None, Some("missing"), Some("main"))]);
        let err = ProjectArena::from_manifest(&m, Path::new("/workspace")).unwrap_err();
        assert!(matches!(err, ResolveError::UnknownRemote { .. }));
    }

    #[test]
    fn missing_revision_is_an_error() {
        let m = manifest(vec![remote("aosp")], None, vec![raw_project("p", None, Some("aosp"), None)]);
        let err = ProjectArena::from_manifest(&m, Path::new("/workspace")).unwrap_err();
        assert!(matches!(err, ResolveError::MissingRevision { .. }));
    }

    #[test]
    fn duplicate_relpath_is_an_error() {
        let m = manifest(
            vec![remote("aosp")],
            Some(reposync_manifest::Default { remote: Some("aosp".into()), revision: Some("main".into()), ..reposync_manifest::Default::empty() }),
            vec![
                raw_project("a", Some("shared"), None, None),
                raw_project("b", Some("shared"), None, None),
            ],
        );
        let err = ProjectArena::from_manifest(&m, Path::new("/workspace")).unwrap_err();
        assert!(matches!(err, ResolveError::DuplicateRelpath { .. }));
    }

    #[test]
    fn nested_project_relpath_is_prefixed_by_parent() {
        let mut parent = raw_project("parent", Some("parent"), None, None);
        parent.project = Some(vec![raw_project("child", Some("child"), None, None)]);
        let m = manifest(
            vec![remote("aosp")],
            Some(reposync_manifest::Default { remote: Some("aosp".into()), revision: Some("main".into()), ..reposync_manifest::Default::empty() }),
            vec![parent],
        );

        let arena = ProjectArena::from_manifest(&m, Path::new("/workspace")).unwrap();
        assert_eq!(arena.len(), 2);
        let child = arena.iter().find(|(_, p)| p.name == "child").unwrap().1;
        assert_eq!(child.relpath, "parent/child");
        assert_eq!(child.parent, Some(0));
        assert_eq!(arena.get(0).subprojects, vec![1]);
    }
}
