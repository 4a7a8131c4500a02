use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::provider::AgentProvider;
use crate::models::workspace::WorkspaceRecord;

/// Data-bag key holding a workspace's pipelines.
pub const PIPELINES_DATA_KEY: &str = "pipelinesData";

pub const UNTITLED_PIPELINE_NAME: &str = "Untitled pipeline";
pub const EMPTY_TASK_PLACEHOLDER: &str = "No task provided.";

/// The only status simulated runs ever produce.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
}

/// A normalized, sanitized reference to a discovered agent. Never a raw
/// discovery finding; see [`sanitize_pipeline_agent`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineAgent {
    pub id: String,
    pub label: String,
    pub provider: AgentProvider,
    pub file_path: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStep {
    pub id: String,
    pub agent: PipelineAgent,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStepRun {
    pub id: String,
    pub step_id: String,
    /// Snapshot of the agent at run time; later step edits do not rewrite it.
    pub agent: PipelineAgent,
    pub status: RunStatus,
    pub input: String,
    pub reasoning_summary: String,
    pub result: String,
    pub started_at: String,
    pub finished_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    pub id: String,
    pub pipeline_id: String,
    pub status: RunStatus,
    pub task: String,
    pub started_at: String,
    pub finished_at: String,
    pub step_runs: Vec<PipelineStepRun>,
}

/// An ordered, user-defined chain of agent references. Step order is the
/// execution order; runs are newest-first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub id: String,
    pub name: String,
    pub steps: Vec<PipelineStep>,
    pub runs: Vec<PipelineRun>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PipelinesSnapshot {
    pub pipelines: Vec<Pipeline>,
}

pub fn sanitize_pipeline_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        UNTITLED_PIPELINE_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn sanitize_task(task: &str) -> String {
    let trimmed = task.trim();
    if trimmed.is_empty() {
        EMPTY_TASK_PLACEHOLDER.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Guarantees non-empty label, file path, id, and description with
/// deterministic fallbacks. Unrecognized providers default to Codex.
pub fn sanitize_pipeline_agent(agent: &PipelineAgent) -> PipelineAgent {
    let provider = agent.provider;
    let file_path = if agent.file_path.trim().is_empty() {
        "unknown".to_string()
    } else {
        agent.file_path.trim().to_string()
    };
    let label = if agent.label.trim().is_empty() {
        file_path.clone()
    } else {
        agent.label.trim().to_string()
    };
    let id = if agent.id.trim().is_empty() {
        format!("{}:{}", provider.as_str(), file_path)
    } else {
        agent.id.trim().to_string()
    };
    let description = if agent.description.trim().is_empty() {
        format!("{} agent from project.", provider.label())
    } else {
        agent.description.trim().to_string()
    };

    PipelineAgent {
        id,
        label,
        provider,
        file_path,
        description,
    }
}

struct LegacyAgentPreset {
    id: &'static str,
    label: &'static str,
    provider: AgentProvider,
    description: &'static str,
}

/// Presets from the superseded version where steps referenced a named role
/// instead of a full agent reference.
static LEGACY_AGENT_PRESETS: [LegacyAgentPreset; 3] = [
    LegacyAgentPreset {
        id: "claude-planner",
        label: "Planner",
        provider: AgentProvider::ClaudeCode,
        description: "Legacy preset: planner role.",
    },
    LegacyAgentPreset {
        id: "codex-senior",
        label: "Senior",
        provider: AgentProvider::Codex,
        description: "Legacy preset: implementation role.",
    },
    LegacyAgentPreset {
        id: "codex-reviewer",
        label: "Reviewer",
        provider: AgentProvider::Codex,
        description: "Legacy preset: review role.",
    },
];

fn legacy_preset_by_id(preset_id: &str) -> Option<&'static LegacyAgentPreset> {
    LEGACY_AGENT_PRESETS.iter().find(|preset| preset.id == preset_id)
}

fn agent_from_legacy_preset(preset: &LegacyAgentPreset, legacy_label: &str) -> PipelineAgent {
    let label = if legacy_label.trim().is_empty() {
        preset.label
    } else {
        legacy_label
    };

    sanitize_pipeline_agent(&PipelineAgent {
        id: format!("legacy:{}", preset.id),
        label: label.to_string(),
        provider: preset.provider,
        file_path: format!("legacy/{}.md", preset.id),
        description: preset.description.to_string(),
    })
}

fn parse_agent(value: Option<&Value>) -> Option<PipelineAgent> {
    let value = value?;
    let id = value.get("id")?.as_str()?;
    let label = value.get("label")?.as_str()?;
    let file_path = value.get("filePath")?.as_str()?;
    let description = value.get("description")?.as_str()?;
    let provider = AgentProvider::from_alias(value.get("provider")?.as_str()?)?;

    Some(sanitize_pipeline_agent(&PipelineAgent {
        id: id.to_string(),
        label: label.to_string(),
        provider,
        file_path: file_path.to_string(),
        description: description.to_string(),
    }))
}

/// Resolves a step/step-run agent: either a full agent reference or the
/// legacy `{agentPresetId, agentLabel}` shape, transparently upgraded.
fn parse_step_agent(value: &Value) -> Option<PipelineAgent> {
    if let Some(agent) = parse_agent(value.get("agent")) {
        return Some(agent);
    }

    let preset_id = value.get("agentPresetId")?.as_str()?;
    let label = value.get("agentLabel")?.as_str()?;
    let preset = legacy_preset_by_id(preset_id)?;
    Some(agent_from_legacy_preset(preset, label))
}

fn parse_step(value: &Value) -> Option<PipelineStep> {
    let id = value.get("id")?.as_str()?;
    let created_at = value.get("createdAt")?.as_str()?;
    let agent = parse_step_agent(value)?;

    Some(PipelineStep {
        id: id.to_string(),
        agent,
        created_at: created_at.to_string(),
    })
}

fn parse_step_run(value: &Value) -> Option<PipelineStepRun> {
    if value.get("status")?.as_str()? != "completed" {
        return None;
    }

    Some(PipelineStepRun {
        id: value.get("id")?.as_str()?.to_string(),
        step_id: value.get("stepId")?.as_str()?.to_string(),
        agent: parse_step_agent(value)?,
        status: RunStatus::Completed,
        input: value.get("input")?.as_str()?.to_string(),
        reasoning_summary: value.get("reasoningSummary")?.as_str()?.to_string(),
        result: value.get("result")?.as_str()?.to_string(),
        started_at: value.get("startedAt")?.as_str()?.to_string(),
        finished_at: value.get("finishedAt")?.as_str()?.to_string(),
    })
}

fn parse_run(value: &Value) -> Option<PipelineRun> {
    if value.get("status")?.as_str()? != "completed" {
        return None;
    }

    let step_runs = value
        .get("stepRuns")?
        .as_array()?
        .iter()
        .filter_map(parse_step_run)
        .collect();

    Some(PipelineRun {
        id: value.get("id")?.as_str()?.to_string(),
        pipeline_id: value.get("pipelineId")?.as_str()?.to_string(),
        status: RunStatus::Completed,
        task: value.get("task")?.as_str()?.to_string(),
        started_at: value.get("startedAt")?.as_str()?.to_string(),
        finished_at: value.get("finishedAt")?.as_str()?.to_string(),
        step_runs,
    })
}

fn parse_pipeline(value: &Value) -> Option<Pipeline> {
    let steps = value
        .get("steps")?
        .as_array()?
        .iter()
        .filter_map(parse_step)
        .collect();
    let runs = value
        .get("runs")?
        .as_array()?
        .iter()
        .filter_map(parse_run)
        .collect();

    Some(Pipeline {
        id: value.get("id")?.as_str()?.to_string(),
        name: value.get("name")?.as_str()?.to_string(),
        steps,
        runs,
        created_at: value.get("createdAt")?.as_str()?.to_string(),
        updated_at: value.get("updatedAt")?.as_str()?.to_string(),
    })
}

/// Total parser for the pipelines sub-document. Invalid pipelines, steps, and
/// runs are discarded individually; never throws, never partially trusts a
/// fragment that fails its shape check.
pub fn parse_pipelines_snapshot(value: Option<&Value>) -> PipelinesSnapshot {
    let pipelines = value
        .and_then(|v| v.get("pipelines"))
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(parse_pipeline).collect())
        .unwrap_or_default();

    PipelinesSnapshot { pipelines }
}

/// Reads the pipelines snapshot out of a workspace's data bag.
pub fn pipelines_snapshot_for(workspace: Option<&WorkspaceRecord>) -> PipelinesSnapshot {
    let Some(workspace) = workspace else {
        return PipelinesSnapshot::default();
    };

    parse_pipelines_snapshot(workspace.data.get(PIPELINES_DATA_KEY))
}
