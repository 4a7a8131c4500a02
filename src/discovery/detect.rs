//! Name, path, and content heuristics for classifying agent files.

use crate::models::{AgentFinding, AgentProvider, FindingConfidence};

/// Canonical agent-definition basenames.
pub const DEFAULT_AGENT_FILE_NAMES: [&str; 4] = ["AGENT.md", "AGENTS.md", "CLAUDE.md", "CODEX.md"];

/// Provider-indicative path substrings.
pub const DEFAULT_AGENT_PATH_TOKENS: [&str; 3] = ["agents", "claude", "codex"];

pub const SNIPPET_MAX_LENGTH: usize = 220;

pub fn normalize_search_value(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Collapses whitespace and caps the result at `max_length` characters.
/// Returns `None` for effectively-empty text.
pub fn compact_text_snippet(text: &str, max_length: usize) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }

    if collapsed.chars().count() <= max_length {
        return Some(collapsed);
    }

    let truncated: String = collapsed.chars().take(max_length).collect();
    Some(format!("{}...", truncated.trim_end()))
}

/// The fixed casing variants tried when looking a file up by name: exact,
/// all-lower, all-upper, title-case.
pub fn case_insensitive_file_name_candidates(file_name: &str) -> Vec<String> {
    let title_case = match file_name.char_indices().nth(1) {
        Some((split, _)) => format!("{}{}", &file_name[..split], file_name[split..].to_lowercase()),
        None => file_name.to_string(),
    };

    let mut candidates = Vec::new();
    for candidate in [
        file_name.to_string(),
        file_name.to_lowercase(),
        file_name.to_uppercase(),
        title_case,
    ] {
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
}

/// Whether a file is worth opening for content inspection: a common text
/// extension, or a name that mentions an agent provider.
pub fn is_likely_agent_text_file(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();

    if lower.ends_with(".md") || lower.ends_with(".txt") {
        return true;
    }

    if lower.ends_with(".json") || lower.ends_with(".yaml") || lower.ends_with(".yml") {
        return true;
    }

    lower.contains("agent") || lower.contains("claude") || lower.contains("codex")
}

/// High-confidence findings from the path and file name alone.
pub fn detect_agent_by_path_or_file_name(path: &str, file_name: &str) -> Vec<AgentFinding> {
    let normalized_path = normalize_search_value(path);
    let normalized_file_name = normalize_search_value(file_name);
    let mut findings = Vec::new();

    if normalized_file_name == "claude.md"
        || normalized_path.contains("/.claude/")
        || normalized_path.contains("claude")
    {
        findings.push(AgentFinding {
            provider: AgentProvider::ClaudeCode,
            confidence: FindingConfidence::High,
            file_path: path.to_string(),
            reason: "Path or file name indicates Claude Code configuration.".to_string(),
            snippet: None,
        });
    }

    if normalized_file_name == "agent.md"
        || normalized_file_name == "agents.md"
        || normalized_file_name == "codex.md"
        || normalized_path.contains("/.codex/")
        || normalized_path.contains("codex")
    {
        findings.push(AgentFinding {
            provider: AgentProvider::Codex,
            confidence: FindingConfidence::High,
            file_path: path.to_string(),
            reason: "Path or file name indicates Codex configuration.".to_string(),
            snippet: None,
        });
    }

    findings
}

/// Medium-confidence findings from file content, each carrying a compacted
/// snippet of the text.
pub fn detect_agent_by_content(path: &str, text: &str) -> Vec<AgentFinding> {
    let normalized = text.to_lowercase();
    let mut findings = Vec::new();

    if normalized.contains("claude code") || normalized.contains("anthropic") {
        findings.push(AgentFinding {
            provider: AgentProvider::ClaudeCode,
            confidence: FindingConfidence::Medium,
            file_path: path.to_string(),
            reason: "File content references Claude Code.".to_string(),
            snippet: compact_text_snippet(text, SNIPPET_MAX_LENGTH),
        });
    }

    if normalized.contains("codex") || normalized.contains("openai") {
        findings.push(AgentFinding {
            provider: AgentProvider::Codex,
            confidence: FindingConfidence::Medium,
            file_path: path.to_string(),
            reason: "File content references Codex.".to_string(),
            snippet: compact_text_snippet(text, SNIPPET_MAX_LENGTH),
        });
    }

    findings
}

/// Dedup by `(provider, filePath, reason)`: the same provider and file with a
/// different reason is a distinct finding and is kept.
pub fn add_finding_if_missing(collection: &mut Vec<AgentFinding>, candidate: AgentFinding) {
    let duplicate = collection.iter().any(|existing| {
        existing.provider == candidate.provider
            && existing.file_path == candidate.file_path
            && existing.reason == candidate.reason
    });

    if !duplicate {
        collection.push(candidate);
    }
}
