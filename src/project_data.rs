//! Captures the contents of the well-known project config files
//! (`AGENTS.md`, `CLAUDE.md`) into the workspace's data bag.

use serde_json::Map;

use crate::discovery::detect::case_insensitive_file_name_candidates;
use crate::handles::{DirectoryHandle, DirectoryHandleRegistry};
use crate::models::{
    ProjectDataFile, ProjectDataFileName, ProjectDataSnapshot, PROJECT_DATA_KEY,
};
use crate::store::WorkspaceStore;

/// Looks a file up in the workspace root, trying the fixed casing variants
/// of each candidate name in order. Returns the first readable match.
fn read_first_file_by_name(
    handle: &DirectoryHandle,
    candidates: &[&str],
) -> Option<String> {
    for candidate in candidates {
        for variant in case_insensitive_file_name_candidates(candidate) {
            let path = handle.root().join(&variant);
            if !path.is_file() {
                continue;
            }

            if let Ok(content) = std::fs::read_to_string(&path) {
                return Some(content);
            }
        }
    }

    None
}

/// Reads the well-known config files from the directory root.
pub fn read_project_data_snapshot(handle: &DirectoryHandle) -> ProjectDataSnapshot {
    let mut files = Vec::new();

    for name in ProjectDataFileName::ALL {
        if let Some(content) = read_first_file_by_name(handle, name.search_candidates()) {
            files.push(ProjectDataFile { name, content });
        }
    }

    ProjectDataSnapshot { files }
}

/// Re-reads the config files and replaces the workspace's project-data
/// snapshot. `None` when the workspace has no live directory handle.
pub fn refresh_workspace_project_data(
    store: &WorkspaceStore,
    handles: &DirectoryHandleRegistry,
    workspace_id: &str,
) -> Option<ProjectDataSnapshot> {
    let handle = handles.get(workspace_id)?;

    let snapshot = read_project_data_snapshot(&handle);
    let mut patch = Map::new();
    patch.insert(
        PROJECT_DATA_KEY.to_string(),
        serde_json::to_value(&snapshot).unwrap_or_default(),
    );
    store.update_workspace_data(workspace_id, patch);

    Some(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project_data_snapshot_for;
    use crate::store::{MemoryStorage, SystemClock};
    use std::fs;
    use tempfile::TempDir;

    fn test_store() -> WorkspaceStore {
        WorkspaceStore::new(
            Box::new(MemoryStorage::new()),
            Box::new(MemoryStorage::new()),
            Box::new(SystemClock),
        )
    }

    #[test]
    fn reads_both_well_known_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("AGENTS.md"), "# Agents").unwrap();
        fs::write(dir.path().join("CLAUDE.md"), "# Claude").unwrap();

        let snapshot = read_project_data_snapshot(&DirectoryHandle::new(dir.path()));
        assert_eq!(snapshot.files.len(), 2);
        assert_eq!(snapshot.files[0].name, ProjectDataFileName::AgentsMd);
        assert_eq!(snapshot.files[1].content, "# Claude");
    }

    #[test]
    fn agents_entry_falls_back_to_agent_md() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("AGENT.md"), "# Single agent").unwrap();

        let snapshot = read_project_data_snapshot(&DirectoryHandle::new(dir.path()));
        assert_eq!(snapshot.files.len(), 1);
        assert_eq!(snapshot.files[0].name, ProjectDataFileName::AgentsMd);
        assert_eq!(snapshot.files[0].content, "# Single agent");
    }

    #[test]
    fn lowercase_variant_is_found() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("claude.md"), "# lower").unwrap();

        let snapshot = read_project_data_snapshot(&DirectoryHandle::new(dir.path()));
        assert_eq!(snapshot.files.len(), 1);
        assert_eq!(snapshot.files[0].name, ProjectDataFileName::ClaudeMd);
    }

    #[test]
    fn refresh_without_handle_returns_none() {
        let store = test_store();
        let handles = DirectoryHandleRegistry::new();
        let workspace = store.select_workspace_by_directory_name("my-app");

        assert!(refresh_workspace_project_data(&store, &handles, &workspace.id).is_none());
    }

    #[test]
    fn refresh_writes_snapshot_into_the_data_bag() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("AGENTS.md"), "# Agents").unwrap();

        let store = test_store();
        let handles = DirectoryHandleRegistry::new();
        let workspace = store.select_workspace_by_directory_name("my-app");
        handles.register(&workspace.id, DirectoryHandle::new(dir.path()));

        refresh_workspace_project_data(&store, &handles, &workspace.id).unwrap();

        let workspace = store.get_active_workspace().unwrap();
        let stored = project_data_snapshot_for(Some(&workspace));
        assert_eq!(stored.files.len(), 1);
        assert_eq!(stored.files[0].content, "# Agents");
    }
}
