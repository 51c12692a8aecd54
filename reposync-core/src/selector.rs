//! C9: resolves a user-supplied argument list and a group expression to a
//! concrete, `relpath`-sorted project set (§4.9).

use std::path::Path;

use crate::error::SyncError;
use crate::project::{ProjectArena, ProjectIndex};
use crate::submodules;

/// Evaluate a comma/whitespace-delimited group expression against one
/// project's label set, starting from an empty matched set and left-folding
/// `-X` (remove) / `X` (add) tokens, per §4.9. `default` matches any project
/// lacking the `notdefault` label.
pub fn project_matches_groups(groups: &std::collections::HashSet<String>, expr: &str) -> bool {
    let mut matched = false;
    for token in expr.split([',', ' ', '\t']).map(str::trim).filter(|t| !t.is_empty()) {
        if let Some(label) = token.strip_prefix('-') {
            if label_matches(groups, label) {
                matched = false;
            }
        } else if label_matches(groups, token) {
            matched = true;
        }
    }
    matched
}

fn label_matches(groups: &std::collections::HashSet<String>, label: &str) -> bool {
    if label == "default" {
        !groups.contains("notdefault")
    } else {
        groups.contains(label)
    }
}

/// Resolve `args` (project names or paths) against `arena`, filtered by
/// `group_expr` (if non-empty), returning indices sorted by `relpath`.
///
/// An empty `args` list selects every project matching the group
/// expression. A non-empty list resolves each argument as a name, then as a
/// path (walking up to the workspace root); when `allow_submodules` is set
/// and both fail, derived children are expanded for every already-on-disk
/// project with `sync-s` set (mirroring `command.py`'s `GetProjects`, which
/// calls `GetDerivedSubprojects` on exactly this same retry path) and
/// resolution is retried once against the now-larger arena before giving up
/// (§4.9's third resolution attempt).
pub fn select(
    arena: &mut ProjectArena,
    workspace_root: &Path,
    args: &[String],
    group_expr: &str,
    allow_submodules: bool,
) -> Result<Vec<ProjectIndex>, SyncError> {
    let in_group_expr = |arena: &ProjectArena, index: ProjectIndex| -> bool {
        if group_expr.trim().is_empty() {
            project_matches_groups(&arena.get(index).groups, "default")
        } else {
            project_matches_groups(&arena.get(index).groups, group_expr)
        }
    };

    let mut selected: Vec<ProjectIndex> = if args.is_empty() {
        arena.iter().filter(|(index, _)| in_group_expr(arena, *index)).map(|(index, _)| index).collect()
    } else {
        let mut result = Vec::new();
        for arg in args {
            match resolve_one(arena, arg) {
                Some(index) => result.push(index),
                None if allow_submodules => {
                    expand_derived_children(arena, workspace_root);
                    match resolve_one(arena, arg) {
                        Some(index) => result.push(index),
                        None => return Err(SyncError::NoSuchProject(arg.clone())),
                    }
                }
                None => return Err(SyncError::NoSuchProject(arg.clone())),
            }
        }
        result
    };

    selected.sort_by(|a, b| arena.get(*a).relpath.cmp(&arena.get(*b).relpath));
    selected.dedup();
    Ok(selected)
}

fn resolve_one(arena: &ProjectArena, arg: &str) -> Option<ProjectIndex> {
    let by_name = arena.iter().find(|(_, p)| p.name == *arg || p.relpath == *arg);
    match by_name {
        Some((index, _)) => Some(index),
        None => resolve_path_arg(arena, arg),
    }
}

/// Discover and register derived (submodule) children for every project
/// already checked out on disk with `sync-s` set, so a subsequent
/// [`resolve_one`] retry can see them.
fn expand_derived_children(arena: &mut ProjectArena, workspace_root: &Path) {
    let candidates: Vec<ProjectIndex> = (0..arena.len())
        .filter(|&i| {
            let project = arena.get(i);
            project.sync_submodules && crate::repo_handle::RepoHandle::for_project(project).exists()
        })
        .collect();
    for index in candidates {
        submodules::discover_for_project(arena, workspace_root, index);
    }
}

fn resolve_path_arg(arena: &ProjectArena, arg: &str) -> Option<ProjectIndex> {
    let normalized = arg.trim_end_matches('/');
    let mut candidate = normalized;
    loop {
        if let Some((index, _)) = arena.iter().find(|(_, p)| p.relpath == candidate) {
            return Some(index);
        }
        match candidate.rsplit_once('/') {
            Some((parent, _)) if !parent.is_empty() => candidate = parent,
            _ => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn groups(labels: &[&str]) -> HashSet<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_excludes_notdefault() {
        assert!(project_matches_groups(&groups(&["all", "name:x"]), "default"));
        assert!(!project_matches_groups(&groups(&["all", "notdefault"]), "default"));
    }

    #[test]
    fn left_fold_add_then_remove() {
        let g = groups(&["all", "core", "vendor"]);
        assert!(!project_matches_groups(&g, "vendor,-vendor"));
        assert!(project_matches_groups(&g, "core"));
        assert!(project_matches_groups(&g, "vendor,-vendor,core"));
    }
}
