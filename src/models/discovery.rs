use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::provider::AgentProvider;
use crate::models::workspace::WorkspaceRecord;

/// Data-bag key holding the latest directory scan.
pub const DIRECTORY_DISCOVERY_DATA_KEY: &str = "directoryDiscovery";

/// How a file earned its place in the scan result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FileMatchRule {
    RequiredFileName,
    PathToken,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum FindingConfidence {
    High,
    Medium,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredFile {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub last_modified: i64,
    pub matched_by: FileMatchRule,
}

/// An inferred association between a file and an agent provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentFinding {
    pub provider: AgentProvider,
    pub confidence: FindingConfidence,
    pub file_path: String,
    pub reason: String,
    pub snippet: Option<String>,
}

/// The result of one directory scan, replaced wholesale on every scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverySnapshot {
    pub scanned_at: String,
    pub discovered_files: Vec<DiscoveredFile>,
    pub discovered_agents: Vec<AgentFinding>,
}

/// Total parser for the discovery sub-document: invalid entries are dropped
/// individually, anything structurally off yields the empty snapshot.
pub fn parse_discovery_snapshot(value: Option<&Value>) -> DiscoverySnapshot {
    let Some(value) = value.filter(|v| v.is_object()) else {
        return DiscoverySnapshot::default();
    };

    let discovered_files = value
        .get("discoveredFiles")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| serde_json::from_value::<DiscoveredFile>(entry.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    let discovered_agents = value
        .get("discoveredAgents")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| serde_json::from_value::<AgentFinding>(entry.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    DiscoverySnapshot {
        scanned_at: value
            .get("scannedAt")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        discovered_files,
        discovered_agents,
    }
}

/// Reads the discovery snapshot out of a workspace's data bag.
pub fn discovery_snapshot_for(workspace: Option<&WorkspaceRecord>) -> DiscoverySnapshot {
    let Some(workspace) = workspace else {
        return DiscoverySnapshot::default();
    };

    parse_discovery_snapshot(workspace.data.get(DIRECTORY_DISCOVERY_DATA_KEY))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_snapshot() {
        let value = serde_json::json!({
            "scannedAt": "2026-02-01T10:00:00.000Z",
            "discoveredFiles": [{
                "name": "AGENTS.md",
                "path": "AGENTS.md",
                "size": 120,
                "lastModified": 1700000000000i64,
                "matchedBy": "required-file-name",
            }],
            "discoveredAgents": [{
                "provider": "codex",
                "confidence": "high",
                "filePath": "AGENTS.md",
                "reason": "Path or file name indicates Codex configuration.",
                "snippet": null,
            }],
        });

        let snapshot = parse_discovery_snapshot(Some(&value));
        assert_eq!(snapshot.scanned_at, "2026-02-01T10:00:00.000Z");
        assert_eq!(snapshot.discovered_files.len(), 1);
        assert_eq!(snapshot.discovered_files[0].matched_by, FileMatchRule::RequiredFileName);
        assert_eq!(snapshot.discovered_agents[0].provider, AgentProvider::Codex);
    }

    #[test]
    fn drops_invalid_entries_individually() {
        let value = serde_json::json!({
            "scannedAt": "",
            "discoveredFiles": [
                { "name": "x" },
                {
                    "name": "CLAUDE.md",
                    "path": "CLAUDE.md",
                    "size": 1,
                    "lastModified": 0,
                    "matchedBy": "path-token",
                },
            ],
            "discoveredAgents": [
                { "provider": "gemini", "confidence": "high", "filePath": "a", "reason": "r", "snippet": null },
                { "provider": "claude-code", "confidence": "medium", "filePath": "a", "reason": "r", "snippet": "s" },
            ],
        });

        let snapshot = parse_discovery_snapshot(Some(&value));
        assert_eq!(snapshot.discovered_files.len(), 1);
        assert_eq!(snapshot.discovered_agents.len(), 1);
        assert_eq!(snapshot.discovered_agents[0].snippet.as_deref(), Some("s"));
    }

    #[test]
    fn non_object_yields_empty_snapshot() {
        assert_eq!(parse_discovery_snapshot(None), DiscoverySnapshot::default());
        let arr = serde_json::json!([1, 2]);
        assert_eq!(parse_discovery_snapshot(Some(&arr)), DiscoverySnapshot::default());
    }
}
