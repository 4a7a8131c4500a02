use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One persisted workspace: a user-selected project directory plus the
/// derived data written into it by the discovery and pipeline engines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceRecord {
    pub id: String,
    pub directory_name: String,
    /// Open-ended bag of named sub-documents (`directoryDiscovery`,
    /// `projectData`, `pipelinesData`). Each key owns its own parser.
    pub data: Map<String, Value>,
    pub created_at: String,
    pub updated_at: String,
}

/// The durable registry document stored under a single key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceStateSnapshot {
    pub version: u32,
    pub workspaces: Vec<WorkspaceRecord>,
}

impl WorkspaceStateSnapshot {
    pub fn empty() -> Self {
        Self {
            version: 1,
            workspaces: Vec::new(),
        }
    }
}

impl Default for WorkspaceStateSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

pub const UNTITLED_WORKSPACE_NAME: &str = "Untitled workspace";

pub fn sanitize_directory_name(directory_name: &str) -> String {
    let trimmed = directory_name.trim();
    if trimmed.is_empty() {
        UNTITLED_WORKSPACE_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Total parser for the durable registry document. Unparseable content or a
/// non-matching shape yields an empty registry; invalid workspace entries are
/// dropped individually while valid ones are kept.
pub fn parse_workspace_state(raw: Option<&str>) -> WorkspaceStateSnapshot {
    let Some(raw) = raw else {
        return WorkspaceStateSnapshot::empty();
    };

    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return WorkspaceStateSnapshot::empty();
    };

    let workspaces = value
        .get("workspaces")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(parse_workspace_record)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    WorkspaceStateSnapshot {
        version: 1,
        workspaces,
    }
}

fn parse_workspace_record(value: &Value) -> Option<WorkspaceRecord> {
    // `data` must be a JSON object; serde would also accept it, but the
    // whole record is rejected when any required field is missing.
    if !value.get("data").map(Value::is_object).unwrap_or(false) {
        return None;
    }

    serde_json::from_value(value.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_json(id: &str, name: &str) -> Value {
        serde_json::json!({
            "id": id,
            "directoryName": name,
            "data": {},
            "createdAt": "2026-01-01T00:00:00.000Z",
            "updatedAt": "2026-01-01T00:00:00.000Z",
        })
    }

    #[test]
    fn parses_valid_state() {
        let raw = serde_json::json!({
            "version": 1,
            "workspaces": [record_json("a", "alpha"), record_json("b", "beta")],
        })
        .to_string();

        let state = parse_workspace_state(Some(&raw));
        assert_eq!(state.workspaces.len(), 2);
        assert_eq!(state.workspaces[0].directory_name, "alpha");
    }

    #[test]
    fn missing_or_invalid_raw_yields_empty_state() {
        assert!(parse_workspace_state(None).workspaces.is_empty());
        assert!(parse_workspace_state(Some("not json")).workspaces.is_empty());
        assert!(parse_workspace_state(Some("[1, 2]")).workspaces.is_empty());
    }

    #[test]
    fn drops_invalid_entries_but_keeps_valid_ones() {
        let raw = serde_json::json!({
            "version": 1,
            "workspaces": [
                record_json("a", "alpha"),
                { "id": "b" },
                { "id": "c", "directoryName": "gamma", "data": [], "createdAt": "x", "updatedAt": "y" },
            ],
        })
        .to_string();

        let state = parse_workspace_state(Some(&raw));
        assert_eq!(state.workspaces.len(), 1);
        assert_eq!(state.workspaces[0].id, "a");
    }

    #[test]
    fn sanitize_directory_name_trims_and_substitutes_placeholder() {
        assert_eq!(sanitize_directory_name("  my-app  "), "my-app");
        assert_eq!(sanitize_directory_name("   "), UNTITLED_WORKSPACE_NAME);
    }

    #[test]
    fn round_trips_through_serde() {
        let raw = serde_json::json!({
            "version": 1,
            "workspaces": [record_json("a", "alpha")],
        })
        .to_string();

        let state = parse_workspace_state(Some(&raw));
        let reserialized = serde_json::to_string(&state).unwrap();
        let reparsed = parse_workspace_state(Some(&reserialized));
        assert_eq!(state.workspaces, reparsed.workspaces);
    }
}
