//! Pipeline engine: CRUD over ordered step chains scoped to a workspace,
//! plus deterministic simulation of a pipeline run.
//!
//! Every mutator is all-or-nothing against the whole pipelines sub-document
//! for the workspace (read-modify-write of the full array). Not-found
//! conditions return `None`/`false`, never errors.

pub mod simulate;

use std::sync::Arc;

use chrono::SecondsFormat;
use serde_json::Map;
use uuid::Uuid;

use crate::models::{
    parse_pipelines_snapshot, sanitize_pipeline_agent, sanitize_pipeline_name, sanitize_task,
    Pipeline, PipelineAgent, PipelineRun, PipelineStep, PipelineStepRun, PipelinesSnapshot,
    RunStatus, PIPELINES_DATA_KEY,
};
use crate::store::{Clock, SystemClock, WorkspaceStore};
use simulate::{StepSimulator, TemplateSimulator};

/// Runs kept per pipeline, newest first; the oldest are evicted on overflow.
pub const MAX_PIPELINE_RUNS: usize = 20;

/// Agents materialized as steps when a pipeline is created.
pub const INITIAL_PIPELINE_STEPS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

pub struct PipelineEngine {
    store: Arc<WorkspaceStore>,
    simulator: Box<dyn StepSimulator>,
    clock: Box<dyn Clock>,
}

impl PipelineEngine {
    pub fn new(store: Arc<WorkspaceStore>) -> Self {
        Self {
            store,
            simulator: Box::new(TemplateSimulator),
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_simulator(mut self, simulator: Box<dyn StepSimulator>) -> Self {
        self.simulator = simulator;
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Creates a pipeline, materializing up to the first two supplied agents
    /// as steps so a freshly created pipeline is immediately runnable.
    pub fn create_workspace_pipeline(
        &self,
        workspace_id: &str,
        name: &str,
        initial_agents: &[PipelineAgent],
    ) -> Option<Pipeline> {
        let now = self.now_iso();
        let steps = initial_agents
            .iter()
            .take(INITIAL_PIPELINE_STEPS)
            .map(|agent| self.step_from_agent(agent))
            .collect();

        let pipeline = Pipeline {
            id: create_id(),
            name: sanitize_pipeline_name(name),
            steps,
            runs: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        };

        let created = pipeline.clone();
        self.update_pipelines(workspace_id, move |mut snapshot| {
            snapshot.pipelines.push(pipeline);
            snapshot
        })?;

        tracing::debug!(workspace_id, pipeline_id = %created.id, "created pipeline");
        Some(created)
    }

    pub fn rename_workspace_pipeline(
        &self,
        workspace_id: &str,
        pipeline_id: &str,
        name: &str,
    ) -> Option<Pipeline> {
        let normalized_name = sanitize_pipeline_name(name);
        let now = self.now_iso();

        self.mutate_pipeline(workspace_id, pipeline_id, move |pipeline| {
            pipeline.name = normalized_name;
            pipeline.updated_at = now;
        })
    }

    pub fn remove_workspace_pipeline(&self, workspace_id: &str, pipeline_id: &str) -> bool {
        let mut removed = false;
        let result = self.update_pipelines(workspace_id, |mut snapshot| {
            let before = snapshot.pipelines.len();
            snapshot
                .pipelines
                .retain(|pipeline| pipeline.id != pipeline_id);
            removed = snapshot.pipelines.len() != before;
            snapshot
        });

        result.is_some() && removed
    }

    /// Appends a step wrapping a sanitized copy of `agent`.
    pub fn add_workspace_pipeline_step(
        &self,
        workspace_id: &str,
        pipeline_id: &str,
        agent: &PipelineAgent,
    ) -> Option<Pipeline> {
        let step = self.step_from_agent(agent);
        let now = self.now_iso();

        self.mutate_pipeline(workspace_id, pipeline_id, move |pipeline| {
            pipeline.steps.push(step);
            pipeline.updated_at = now;
        })
    }

    /// Swaps the step with its immediate neighbor. A step already at the
    /// boundary, or an unknown step id, is a no-op returning the unchanged
    /// pipeline rather than an error.
    pub fn move_workspace_pipeline_step(
        &self,
        workspace_id: &str,
        pipeline_id: &str,
        step_id: &str,
        direction: MoveDirection,
    ) -> Option<Pipeline> {
        let now = self.now_iso();

        self.mutate_pipeline(workspace_id, pipeline_id, move |pipeline| {
            let Some(step_index) = pipeline.steps.iter().position(|step| step.id == step_id)
            else {
                return;
            };

            let swap_with = match direction {
                MoveDirection::Up => step_index.checked_sub(1),
                MoveDirection::Down => Some(step_index + 1).filter(|i| *i < pipeline.steps.len()),
            };
            let Some(swap_with) = swap_with else {
                return;
            };

            pipeline.steps.swap(step_index, swap_with);
            pipeline.updated_at = now;
        })
    }

    /// Removes a step by id; `None` if the workspace, pipeline, or step is
    /// unknown.
    pub fn remove_workspace_pipeline_step(
        &self,
        workspace_id: &str,
        pipeline_id: &str,
        step_id: &str,
    ) -> Option<Pipeline> {
        let now = self.now_iso();
        let mut found = false;

        let pipeline = self.mutate_pipeline(workspace_id, pipeline_id, |pipeline| {
            let before = pipeline.steps.len();
            pipeline.steps.retain(|step| step.id != step_id);
            found = pipeline.steps.len() != before;
            if found {
                pipeline.updated_at = now;
            }
        })?;

        found.then_some(pipeline)
    }

    /// Simulates one run: walks the steps in current order, synchronously and
    /// deterministically, chaining each step's result into the next step's
    /// input. `None` if the pipeline is unknown or has zero steps.
    pub fn run_workspace_pipeline(
        &self,
        workspace_id: &str,
        pipeline_id: &str,
        task: &str,
    ) -> Option<PipelineRun> {
        let normalized_task = sanitize_task(task);
        let mut next_run: Option<PipelineRun> = None;

        self.update_pipelines(workspace_id, |mut snapshot| {
            let Some(pipeline) = snapshot
                .pipelines
                .iter_mut()
                .find(|pipeline| pipeline.id == pipeline_id && !pipeline.steps.is_empty())
            else {
                return snapshot;
            };

            let run_started_at = self.now_iso();
            let mut previous_output: Option<String> = None;

            let step_runs: Vec<PipelineStepRun> = pipeline
                .steps
                .iter()
                .map(|step| {
                    let step_started_at = self.now_iso();
                    let input = previous_output
                        .clone()
                        .unwrap_or_else(|| normalized_task.clone());
                    let outcome = self.simulator.simulate(
                        &step.agent,
                        &normalized_task,
                        previous_output.as_deref(),
                    );

                    previous_output = Some(outcome.result.clone());

                    PipelineStepRun {
                        id: create_id(),
                        step_id: step.id.clone(),
                        agent: step.agent.clone(),
                        status: RunStatus::Completed,
                        input,
                        reasoning_summary: outcome.reasoning_summary,
                        result: outcome.result,
                        started_at: step_started_at,
                        finished_at: self.now_iso(),
                    }
                })
                .collect();

            let run_finished_at = self.now_iso();
            let run = PipelineRun {
                id: create_id(),
                pipeline_id: pipeline.id.clone(),
                status: RunStatus::Completed,
                task: normalized_task.clone(),
                started_at: run_started_at,
                finished_at: run_finished_at.clone(),
                step_runs,
            };

            next_run = Some(run.clone());
            pipeline.runs.insert(0, run);
            pipeline.runs.truncate(MAX_PIPELINE_RUNS);
            pipeline.updated_at = run_finished_at;

            snapshot
        });

        next_run
    }

    /// Read-modify-write of the whole pipelines sub-document. `None` if the
    /// workspace is unknown.
    fn update_pipelines(
        &self,
        workspace_id: &str,
        updater: impl FnOnce(PipelinesSnapshot) -> PipelinesSnapshot,
    ) -> Option<PipelinesSnapshot> {
        let workspace = self
            .store
            .list_workspaces()
            .into_iter()
            .find(|workspace| workspace.id == workspace_id)?;

        let current = parse_pipelines_snapshot(workspace.data.get(PIPELINES_DATA_KEY));
        let next = updater(current);

        let mut patch = Map::new();
        patch.insert(
            PIPELINES_DATA_KEY.to_string(),
            serde_json::to_value(&next).unwrap_or_default(),
        );
        self.store.update_workspace_data(workspace_id, patch);

        Some(next)
    }

    /// Applies `mutate` to the matching pipeline, returning its final state;
    /// `None` if the workspace or pipeline is unknown.
    fn mutate_pipeline(
        &self,
        workspace_id: &str,
        pipeline_id: &str,
        mutate: impl FnOnce(&mut Pipeline),
    ) -> Option<Pipeline> {
        let mut updated: Option<Pipeline> = None;

        self.update_pipelines(workspace_id, |mut snapshot| {
            if let Some(pipeline) = snapshot
                .pipelines
                .iter_mut()
                .find(|pipeline| pipeline.id == pipeline_id)
            {
                mutate(pipeline);
                updated = Some(pipeline.clone());
            }
            snapshot
        })?;

        updated
    }

    fn step_from_agent(&self, agent: &PipelineAgent) -> PipelineStep {
        PipelineStep {
            id: create_id(),
            agent: sanitize_pipeline_agent(agent),
            created_at: self.now_iso(),
        }
    }

    fn now_iso(&self) -> String {
        self.clock
            .now()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

fn create_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{pipelines_snapshot_for, AgentProvider};
    use crate::store::{MemoryStorage, SystemClock};

    fn test_setup() -> (PipelineEngine, Arc<WorkspaceStore>, String) {
        let store = Arc::new(WorkspaceStore::new(
            Box::new(MemoryStorage::new()),
            Box::new(MemoryStorage::new()),
            Box::new(SystemClock),
        ));
        let workspace = store.select_workspace_by_directory_name("my-app");
        (PipelineEngine::new(store.clone()), store, workspace.id)
    }

    fn agent(label: &str) -> PipelineAgent {
        PipelineAgent {
            id: format!("codex:{label}"),
            label: label.to_string(),
            provider: AgentProvider::Codex,
            file_path: format!("{label}.md"),
            description: "Codex agent from project.".to_string(),
        }
    }

    #[test]
    fn create_materializes_at_most_two_initial_agents() {
        let (engine, _store, workspace_id) = test_setup();

        let pipeline = engine
            .create_workspace_pipeline(
                &workspace_id,
                "  Review chain  ",
                &[agent("a"), agent("b"), agent("c")],
            )
            .unwrap();

        assert_eq!(pipeline.name, "Review chain");
        assert_eq!(pipeline.steps.len(), 2);
        assert_eq!(pipeline.steps[0].agent.label, "a");
        assert_eq!(pipeline.steps[1].agent.label, "b");
        assert!(pipeline.runs.is_empty());
    }

    #[test]
    fn create_sanitizes_empty_name_and_unknown_workspace_is_none() {
        let (engine, _store, workspace_id) = test_setup();

        let pipeline = engine
            .create_workspace_pipeline(&workspace_id, "   ", &[])
            .unwrap();
        assert_eq!(pipeline.name, "Untitled pipeline");

        assert!(engine
            .create_workspace_pipeline("nope", "x", &[])
            .is_none());
    }

    #[test]
    fn rename_updates_name_and_unknown_pipeline_is_none() {
        let (engine, _store, workspace_id) = test_setup();
        let pipeline = engine
            .create_workspace_pipeline(&workspace_id, "Old", &[])
            .unwrap();

        let renamed = engine
            .rename_workspace_pipeline(&workspace_id, &pipeline.id, "  New  ")
            .unwrap();
        assert_eq!(renamed.name, "New");

        assert!(engine
            .rename_workspace_pipeline(&workspace_id, "nope", "x")
            .is_none());
    }

    #[test]
    fn remove_pipeline_reports_whether_anything_was_deleted() {
        let (engine, store, workspace_id) = test_setup();
        let pipeline = engine
            .create_workspace_pipeline(&workspace_id, "P", &[])
            .unwrap();

        assert!(engine.remove_workspace_pipeline(&workspace_id, &pipeline.id));
        assert!(!engine.remove_workspace_pipeline(&workspace_id, &pipeline.id));

        let workspace = store.get_active_workspace().unwrap();
        assert!(pipelines_snapshot_for(Some(&workspace)).pipelines.is_empty());
    }

    #[test]
    fn add_step_appends_a_sanitized_agent() {
        let (engine, _store, workspace_id) = test_setup();
        let pipeline = engine
            .create_workspace_pipeline(&workspace_id, "P", &[])
            .unwrap();

        let mut unsanitized = agent("a");
        unsanitized.label = "  ".to_string();
        let updated = engine
            .add_workspace_pipeline_step(&workspace_id, &pipeline.id, &unsanitized)
            .unwrap();

        assert_eq!(updated.steps.len(), 1);
        // Label falls back to the file path.
        assert_eq!(updated.steps[0].agent.label, "a.md");
    }

    #[test]
    fn move_step_swaps_neighbors() {
        let (engine, _store, workspace_id) = test_setup();
        let pipeline = engine
            .create_workspace_pipeline(&workspace_id, "P", &[agent("a"), agent("b")])
            .unwrap();
        let second = pipeline.steps[1].id.clone();

        let updated = engine
            .move_workspace_pipeline_step(&workspace_id, &pipeline.id, &second, MoveDirection::Up)
            .unwrap();

        assert_eq!(updated.steps[0].id, second);
    }

    #[test]
    fn move_first_step_up_is_a_noop_returning_unchanged_pipeline() {
        let (engine, _store, workspace_id) = test_setup();
        let pipeline = engine
            .create_workspace_pipeline(&workspace_id, "P", &[agent("a"), agent("b")])
            .unwrap();
        let first = pipeline.steps[0].id.clone();

        let updated = engine
            .move_workspace_pipeline_step(&workspace_id, &pipeline.id, &first, MoveDirection::Up)
            .unwrap();

        assert_eq!(updated.steps, pipeline.steps);
        assert_eq!(updated.updated_at, pipeline.updated_at);
    }

    #[test]
    fn move_unknown_step_is_a_noop_returning_unchanged_pipeline() {
        let (engine, _store, workspace_id) = test_setup();
        let pipeline = engine
            .create_workspace_pipeline(&workspace_id, "P", &[agent("a")])
            .unwrap();

        let updated = engine
            .move_workspace_pipeline_step(&workspace_id, &pipeline.id, "nope", MoveDirection::Down)
            .unwrap();
        assert_eq!(updated.steps, pipeline.steps);
    }

    #[test]
    fn remove_step_deletes_by_id_and_unknown_step_is_none() {
        let (engine, _store, workspace_id) = test_setup();
        let pipeline = engine
            .create_workspace_pipeline(&workspace_id, "P", &[agent("a"), agent("b")])
            .unwrap();
        let first = pipeline.steps[0].id.clone();

        let updated = engine
            .remove_workspace_pipeline_step(&workspace_id, &pipeline.id, &first)
            .unwrap();
        assert_eq!(updated.steps.len(), 1);

        assert!(engine
            .remove_workspace_pipeline_step(&workspace_id, &pipeline.id, &first)
            .is_none());
    }

    #[test]
    fn run_on_pipeline_without_steps_returns_none_and_leaves_runs_unchanged() {
        let (engine, store, workspace_id) = test_setup();
        let pipeline = engine
            .create_workspace_pipeline(&workspace_id, "P", &[])
            .unwrap();

        assert!(engine
            .run_workspace_pipeline(&workspace_id, &pipeline.id, "T")
            .is_none());

        let workspace = store.get_active_workspace().unwrap();
        let snapshot = pipelines_snapshot_for(Some(&workspace));
        assert!(snapshot.pipelines[0].runs.is_empty());
    }

    #[test]
    fn run_chains_each_step_result_into_the_next_input() {
        let (engine, _store, workspace_id) = test_setup();
        let pipeline = engine
            .create_workspace_pipeline(&workspace_id, "P", &[agent("a"), agent("b")])
            .unwrap();
        engine
            .add_workspace_pipeline_step(&workspace_id, &pipeline.id, &agent("c"))
            .unwrap();

        let run = engine
            .run_workspace_pipeline(&workspace_id, &pipeline.id, "T")
            .unwrap();

        assert_eq!(run.step_runs.len(), 3);
        assert!(run.step_runs[0].input.contains("T"));
        assert_eq!(run.step_runs[1].input, run.step_runs[0].result);
        assert_eq!(run.step_runs[2].input, run.step_runs[1].result);
        assert_eq!(run.task, "T");
    }

    #[test]
    fn run_sanitizes_blank_task() {
        let (engine, _store, workspace_id) = test_setup();
        let pipeline = engine
            .create_workspace_pipeline(&workspace_id, "P", &[agent("a")])
            .unwrap();

        let run = engine
            .run_workspace_pipeline(&workspace_id, &pipeline.id, "   ")
            .unwrap();
        assert_eq!(run.task, "No task provided.");
    }

    #[test]
    fn runs_are_newest_first_and_capped_with_oldest_evicted() {
        let (engine, store, workspace_id) = test_setup();
        let pipeline = engine
            .create_workspace_pipeline(&workspace_id, "P", &[agent("a")])
            .unwrap();

        for index in 0..25 {
            engine
                .run_workspace_pipeline(&workspace_id, &pipeline.id, &format!("task {index}"))
                .unwrap();
        }

        let workspace = store.get_active_workspace().unwrap();
        let snapshot = pipelines_snapshot_for(Some(&workspace));
        let runs = &snapshot.pipelines[0].runs;

        assert_eq!(runs.len(), MAX_PIPELINE_RUNS);
        assert_eq!(runs[0].task, "task 24");
        assert_eq!(runs[MAX_PIPELINE_RUNS - 1].task, "task 5");
    }

    #[test]
    fn past_runs_keep_their_agent_snapshot_after_step_removal() {
        let (engine, _store, workspace_id) = test_setup();
        let pipeline = engine
            .create_workspace_pipeline(&workspace_id, "P", &[agent("a")])
            .unwrap();
        let step_id = pipeline.steps[0].id.clone();

        let run = engine
            .run_workspace_pipeline(&workspace_id, &pipeline.id, "T")
            .unwrap();
        engine
            .remove_workspace_pipeline_step(&workspace_id, &pipeline.id, &step_id)
            .unwrap();

        // The recorded run still mirrors the step order at run time.
        assert_eq!(run.step_runs[0].agent.label, "a");
        assert_eq!(run.step_runs[0].step_id, step_id);
    }
}
