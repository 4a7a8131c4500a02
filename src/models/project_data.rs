use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::workspace::WorkspaceRecord;

/// Data-bag key holding the captured project config files.
pub const PROJECT_DATA_KEY: &str = "projectData";

/// The two well-known config file basenames captured per workspace.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProjectDataFileName {
    #[serde(rename = "AGENTS.md")]
    AgentsMd,
    #[serde(rename = "CLAUDE.md")]
    ClaudeMd,
}

impl ProjectDataFileName {
    pub const ALL: [Self; 2] = [Self::AgentsMd, Self::ClaudeMd];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentsMd => "AGENTS.md",
            Self::ClaudeMd => "CLAUDE.md",
        }
    }

    /// File names tried, in order, when looking this entry up on disk.
    pub fn search_candidates(&self) -> &'static [&'static str] {
        match self {
            Self::AgentsMd => &["AGENTS.md", "AGENT.md"],
            Self::ClaudeMd => &["CLAUDE.md"],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectDataFile {
    pub name: ProjectDataFileName,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectDataSnapshot {
    pub files: Vec<ProjectDataFile>,
}

/// Total parser. Accepts the current list shape and the legacy shape where
/// `files` was an object keyed by file name; anything else is empty.
pub fn parse_project_data_snapshot(value: Option<&Value>) -> ProjectDataSnapshot {
    let Some(raw_files) = value.filter(|v| v.is_object()).and_then(|v| v.get("files")) else {
        return ProjectDataSnapshot::default();
    };

    if let Some(entries) = raw_files.as_array() {
        let files = entries
            .iter()
            .filter_map(|entry| serde_json::from_value::<ProjectDataFile>(entry.clone()).ok())
            .collect();
        return ProjectDataSnapshot { files };
    }

    if let Some(by_name) = raw_files.as_object() {
        let mut files = Vec::new();
        for name in ProjectDataFileName::ALL {
            let content = by_name
                .get(name.as_str())
                .and_then(|entry| entry.get("content"))
                .and_then(Value::as_str);
            if let Some(content) = content {
                files.push(ProjectDataFile {
                    name,
                    content: content.to_string(),
                });
            }
        }
        return ProjectDataSnapshot { files };
    }

    ProjectDataSnapshot::default()
}

/// Reads the project-data snapshot out of a workspace's data bag.
pub fn project_data_snapshot_for(workspace: Option<&WorkspaceRecord>) -> ProjectDataSnapshot {
    let Some(workspace) = workspace else {
        return ProjectDataSnapshot::default();
    };

    parse_project_data_snapshot(workspace.data.get(PROJECT_DATA_KEY))
}
