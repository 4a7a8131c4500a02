//! Injectable simulation strategy standing in for real agent execution.
//!
//! The orchestration, ordering, and persistence logic in the pipeline engine
//! never depends on how a step's output is produced, so a real execution
//! backend can replace [`TemplateSimulator`] without touching the engine.

use crate::models::PipelineAgent;

/// What one simulated step produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub reasoning_summary: String,
    pub result: String,
}

pub trait StepSimulator: Send + Sync {
    fn simulate(
        &self,
        agent: &PipelineAgent,
        task: &str,
        previous_output: Option<&str>,
    ) -> StepOutcome;
}

/// Deterministic templated composition of provider label, truncated task,
/// truncated previous output, and agent metadata. No randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateSimulator;

const NO_PRIOR_OUTPUT: &str = "No prior step output.";

fn compact_text(value: &str, max_length: usize) -> String {
    if value.chars().count() <= max_length {
        return value.to_string();
    }

    let truncated: String = value.chars().take(max_length).collect();
    format!("{}...", truncated.trim_end())
}

impl StepSimulator for TemplateSimulator {
    fn simulate(
        &self,
        agent: &PipelineAgent,
        task: &str,
        previous_output: Option<&str>,
    ) -> StepOutcome {
        let provider_label = agent.provider.label();

        let reasoning_summary = [
            format!(
                "{provider_label} agent \"{}\" analyzed task \"{}\".",
                agent.label,
                compact_text(task, 220)
            ),
            format!("Source file: {}", agent.file_path),
            format!(
                "Input context: {}",
                previous_output
                    .map(|output| compact_text(output, 180))
                    .unwrap_or_else(|| NO_PRIOR_OUTPUT.to_string())
            ),
        ]
        .join("\n");

        let result = [
            format!(
                "{provider_label} ({}) result for task: \"{}\"",
                agent.label,
                compact_text(task, 200)
            ),
            format!("Agent file: {}", agent.file_path),
            format!("Notes: {}", agent.description),
            format!(
                "Previous step output:\n{}",
                previous_output
                    .map(|output| compact_text(output, 260))
                    .unwrap_or_else(|| NO_PRIOR_OUTPUT.to_string())
            ),
            "Validation: run project checks in workspace after applying changes.".to_string(),
        ]
        .join("\n");

        StepOutcome {
            reasoning_summary,
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AgentProvider;

    fn agent() -> PipelineAgent {
        PipelineAgent {
            id: "codex:AGENTS.md".to_string(),
            label: "Project agent".to_string(),
            provider: AgentProvider::Codex,
            file_path: "AGENTS.md".to_string(),
            description: "Codex agent from project.".to_string(),
        }
    }

    #[test]
    fn first_step_reports_no_prior_output() {
        let outcome = TemplateSimulator.simulate(&agent(), "Fix the login bug", None);

        assert!(outcome.reasoning_summary.contains("Codex agent \"Project agent\""));
        assert!(outcome.reasoning_summary.contains("Fix the login bug"));
        assert!(outcome.reasoning_summary.contains(NO_PRIOR_OUTPUT));
        assert!(outcome.result.contains("Agent file: AGENTS.md"));
        assert!(outcome.result.contains(NO_PRIOR_OUTPUT));
    }

    #[test]
    fn later_steps_embed_previous_output() {
        let outcome = TemplateSimulator.simulate(&agent(), "T", Some("earlier result"));

        assert!(outcome.reasoning_summary.contains("earlier result"));
        assert!(outcome.result.contains("earlier result"));
        assert!(!outcome.result.contains(NO_PRIOR_OUTPUT));
    }

    #[test]
    fn simulation_is_deterministic() {
        let first = TemplateSimulator.simulate(&agent(), "T", Some("prev"));
        let second = TemplateSimulator.simulate(&agent(), "T", Some("prev"));
        assert_eq!(first, second);
    }

    #[test]
    fn long_tasks_are_truncated_with_ellipsis() {
        let task = "t".repeat(500);
        let outcome = TemplateSimulator.simulate(&agent(), &task, None);
        assert!(outcome.reasoning_summary.contains(&format!("{}...", "t".repeat(220))));
        assert!(outcome.result.contains(&format!("{}...", "t".repeat(200))));
    }
}
