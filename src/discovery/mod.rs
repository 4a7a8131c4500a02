//! Directory discovery engine: scans a workspace's picked directory for
//! agent-definition files and writes the resulting snapshot into the
//! workspace's data bag.

pub mod detect;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use chrono::SecondsFormat;
use serde_json::Map;

use crate::handles::{DirectoryHandle, DirectoryHandleRegistry};
use crate::models::{
    AgentFinding, DiscoveredFile, DiscoverySnapshot, FileMatchRule, DIRECTORY_DISCOVERY_DATA_KEY,
};
use crate::store::{Clock, SystemClock, WorkspaceStore};
use detect::{
    add_finding_if_missing, detect_agent_by_content, detect_agent_by_path_or_file_name,
    is_likely_agent_text_file, normalize_search_value, DEFAULT_AGENT_FILE_NAMES,
    DEFAULT_AGENT_PATH_TOKENS,
};

/// Scan options. The caps are the effective bound on worst-case scan cost;
/// hitting them yields partial results, not an error.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub required_file_names: Vec<String>,
    pub path_tokens: Vec<String>,
    pub max_depth: usize,
    pub max_files: usize,
    pub max_text_file_size_bytes: u64,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            required_file_names: DEFAULT_AGENT_FILE_NAMES
                .iter()
                .map(|name| name.to_string())
                .collect(),
            path_tokens: DEFAULT_AGENT_PATH_TOKENS
                .iter()
                .map(|token| token.to_string())
                .collect(),
            max_depth: 10,
            max_files: 5000,
            max_text_file_size_bytes: 400_000,
        }
    }
}

struct TraversedFile {
    name: String,
    /// Path relative to the scan root, `/`-joined.
    relative_path: String,
    absolute_path: std::path::PathBuf,
}

pub struct DiscoveryEngine {
    store: Arc<WorkspaceStore>,
    handles: Arc<DirectoryHandleRegistry>,
    clock: Box<dyn Clock>,
}

impl DiscoveryEngine {
    pub fn new(store: Arc<WorkspaceStore>, handles: Arc<DirectoryHandleRegistry>) -> Self {
        Self {
            store,
            handles,
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Scans the workspace's directory and replaces its discovery snapshot.
    /// Returns `None` when the workspace has no live directory handle.
    pub fn discover_workspace_directory(
        &self,
        workspace_id: &str,
        options: &DiscoveryOptions,
    ) -> Option<DiscoverySnapshot> {
        let handle = self.handles.get(workspace_id)?;

        let (discovered_files, discovered_agents) = scan_directory(&handle, options);
        tracing::info!(
            workspace_id,
            files = discovered_files.len(),
            agents = discovered_agents.len(),
            "directory scan finished"
        );

        let snapshot = DiscoverySnapshot {
            scanned_at: self
                .clock
                .now()
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            discovered_files,
            discovered_agents,
        };

        let mut patch = Map::new();
        patch.insert(
            DIRECTORY_DISCOVERY_DATA_KEY.to_string(),
            serde_json::to_value(&snapshot).unwrap_or_default(),
        );
        self.store.update_workspace_data(workspace_id, patch);

        Some(snapshot)
    }

    /// Re-scans and projects the discovered files.
    pub fn find_workspace_files(
        &self,
        workspace_id: &str,
        options: &DiscoveryOptions,
    ) -> Option<Vec<DiscoveredFile>> {
        self.discover_workspace_directory(workspace_id, options)
            .map(|snapshot| snapshot.discovered_files)
    }

    /// Re-scans and projects the provider findings.
    pub fn find_workspace_agents(
        &self,
        workspace_id: &str,
        options: &DiscoveryOptions,
    ) -> Option<Vec<AgentFinding>> {
        self.discover_workspace_directory(workspace_id, options)
            .map(|snapshot| snapshot.discovered_agents)
    }
}

fn scan_directory(
    handle: &DirectoryHandle,
    options: &DiscoveryOptions,
) -> (Vec<DiscoveredFile>, Vec<AgentFinding>) {
    let required_names: Vec<String> = options
        .required_file_names
        .iter()
        .map(|name| normalize_search_value(name))
        .collect();
    let path_tokens: Vec<String> = options
        .path_tokens
        .iter()
        .map(|token| normalize_search_value(token))
        .filter(|token| !token.is_empty())
        .collect();

    let mut traversed = Vec::new();
    collect_directory_files(
        handle,
        handle.root(),
        "",
        0,
        options.max_depth,
        options.max_files,
        &mut traversed,
    );

    let mut discovered_files: Vec<DiscoveredFile> = Vec::new();
    let mut discovered_agents: Vec<AgentFinding> = Vec::new();

    for file in &traversed {
        let normalized_name = normalize_search_value(&file.name);
        let normalized_path = normalize_search_value(&file.relative_path);
        let matches_required_name = required_names.contains(&normalized_name);
        let matches_path_token = path_tokens.iter().any(|token| normalized_path.contains(token));

        let should_inspect =
            matches_required_name || matches_path_token || is_likely_agent_text_file(&file.name);
        if !should_inspect {
            continue;
        }

        // A file whose metadata cannot be read contributes nothing at all.
        let Ok(metadata) = fs::metadata(&file.absolute_path) else {
            continue;
        };

        let already_recorded = discovered_files
            .iter()
            .any(|recorded| recorded.path == file.relative_path);
        if !already_recorded && (matches_required_name || matches_path_token) {
            discovered_files.push(DiscoveredFile {
                name: file.name.clone(),
                path: file.relative_path.clone(),
                size: metadata.len(),
                last_modified: modified_epoch_millis(&metadata),
                matched_by: if matches_required_name {
                    FileMatchRule::RequiredFileName
                } else {
                    FileMatchRule::PathToken
                },
            });
        }

        for finding in detect_agent_by_path_or_file_name(&file.relative_path, &file.name) {
            add_finding_if_missing(&mut discovered_agents, finding);
        }

        if !is_likely_agent_text_file(&file.name) || metadata.len() > options.max_text_file_size_bytes
        {
            continue;
        }

        let Ok(text) = fs::read_to_string(&file.absolute_path) else {
            continue;
        };

        for finding in detect_agent_by_content(&file.relative_path, &text) {
            add_finding_if_missing(&mut discovered_agents, finding);
        }
    }

    (discovered_files, discovered_agents)
}

fn collect_directory_files(
    handle: &DirectoryHandle,
    dir: &Path,
    parent_path: &str,
    depth: usize,
    max_depth: usize,
    max_files: usize,
    files: &mut Vec<TraversedFile>,
) {
    if files.len() >= max_files || depth > max_depth {
        return;
    }

    for entry in handle.list_entries(dir) {
        // The cap stops traversal immediately, even mid-directory.
        if files.len() >= max_files {
            return;
        }

        let next_path = if parent_path.is_empty() {
            entry.name.clone()
        } else {
            format!("{}/{}", parent_path, entry.name)
        };

        if !entry.is_dir {
            files.push(TraversedFile {
                name: entry.name,
                relative_path: next_path,
                absolute_path: entry.path,
            });
            continue;
        }

        if depth < max_depth {
            collect_directory_files(
                handle,
                &entry.path,
                &next_path,
                depth + 1,
                max_depth,
                max_files,
                files,
            );
        }
    }
}

fn modified_epoch_millis(metadata: &fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0)
}
