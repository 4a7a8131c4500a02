use serde::{Deserialize, Serialize};

/// The agent ecosystem a discovered or referenced agent belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AgentProvider {
    ClaudeCode,
    Codex,
}

impl AgentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClaudeCode => "claude-code",
            Self::Codex => "codex",
        }
    }

    /// Human-facing label used in simulated run output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ClaudeCode => "Claude Code",
            Self::Codex => "Codex",
        }
    }

    /// Recognizes the canonical identifiers plus a small alias table
    /// ("claude", "claude code" => claude-code).
    pub fn from_alias(value: &str) -> Option<Self> {
        match value {
            "claude-code" => return Some(Self::ClaudeCode),
            "codex" => return Some(Self::Codex),
            _ => {}
        }

        match value.trim().to_lowercase().as_str() {
            "claude code" | "claude" => Some(Self::ClaudeCode),
            "codex" => Some(Self::Codex),
            _ => None,
        }
    }
}
