use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_director::discovery::{DiscoveryEngine, DiscoveryOptions};
use agent_director::handles::{DirectoryHandleRegistry, DirectoryPicker, FsDirectoryPicker, PickerError};
use agent_director::models::WorkspaceRecord;
use agent_director::pipelines::{MoveDirection, PipelineEngine};
use agent_director::project_data::refresh_workspace_project_data;
use agent_director::store::WorkspaceStore;

#[derive(Parser)]
#[command(name = "agdir")]
#[command(about = "Local-only dashboard core for agent files and simulated pipelines")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List known workspaces
    List,
    /// Select a project directory as the active workspace
    Select { path: PathBuf },
    /// Remove a workspace by id
    Remove { workspace_id: String },
    /// Scan a project directory for agent files and provider findings
    Scan { path: PathBuf },
    /// Manage pipelines of a workspace
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },
}

#[derive(Subcommand)]
enum PipelineCommands {
    /// Create a pipeline, seeding up to two steps from the latest scan
    Create { path: PathBuf, name: String },
    /// List pipelines with their steps
    List { path: PathBuf },
    /// Simulate a pipeline run for a task
    Run {
        path: PathBuf,
        pipeline: String,
        task: String,
    },
    /// Move a step one position up or down
    MoveStep {
        path: PathBuf,
        pipeline: String,
        step_id: String,
        #[arg(value_parser = parse_direction)]
        direction: MoveDirection,
    },
}

fn parse_direction(value: &str) -> Result<MoveDirection, String> {
    match value {
        "up" => Ok(MoveDirection::Up),
        "down" => Ok(MoveDirection::Down),
        other => Err(format!("expected 'up' or 'down', got '{other}'")),
    }
}

/// Picks the directory, selects (or creates) its workspace, and registers the
/// live handle. Directory handles never survive a process exit, so every
/// invocation re-picks from the path argument.
fn open_workspace(
    store: &Arc<WorkspaceStore>,
    handles: &Arc<DirectoryHandleRegistry>,
    path: &PathBuf,
) -> anyhow::Result<Option<WorkspaceRecord>> {
    let picker = FsDirectoryPicker::new(path);
    let handle = match picker.pick_directory() {
        Ok(Some(handle)) => handle,
        Ok(None) => {
            // User-cancelled: silent no-op.
            return Ok(None);
        }
        Err(PickerError::Unsupported) => {
            bail!("directory picking is not supported in this environment")
        }
        Err(error) => return Err(error.into()),
    };

    let workspace = store.select_workspace_by_directory_name(handle.name());
    handles.register(&workspace.id, handle);
    Ok(Some(workspace))
}

fn resolve_pipeline_id(
    store: &WorkspaceStore,
    workspace: &WorkspaceRecord,
    name_or_id: &str,
) -> Option<String> {
    let workspace = store
        .list_workspaces()
        .into_iter()
        .find(|candidate| candidate.id == workspace.id)?;
    let snapshot = agent_director::models::pipelines_snapshot_for(Some(&workspace));

    snapshot
        .pipelines
        .iter()
        .find(|pipeline| pipeline.id == name_or_id || pipeline.name == name_or_id)
        .map(|pipeline| pipeline.id.clone())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "agent_director=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let store = Arc::new(WorkspaceStore::open_default()?);
    let handles = Arc::new(DirectoryHandleRegistry::new());

    match cli.command {
        Commands::List => {
            let workspaces = store.list_workspaces();
            if workspaces.is_empty() {
                println!("No workspaces yet. Run 'agdir select <path>' first.");
            }
            for workspace in workspaces {
                println!(
                    "{}  {}  (updated {})",
                    workspace.id, workspace.directory_name, workspace.updated_at
                );
            }
        }
        Commands::Select { path } => {
            if let Some(workspace) = open_workspace(&store, &handles, &path)? {
                println!("Selected workspace '{}' ({})", workspace.directory_name, workspace.id);
            }
        }
        Commands::Remove { workspace_id } => {
            if store.remove_workspace(&workspace_id) {
                println!("Removed workspace {workspace_id}");
            } else {
                bail!("no workspace with id {workspace_id}");
            }
        }
        Commands::Scan { path } => {
            let Some(workspace) = open_workspace(&store, &handles, &path)? else {
                return Ok(());
            };

            let engine = DiscoveryEngine::new(store.clone(), handles.clone());
            let Some(snapshot) =
                engine.discover_workspace_directory(&workspace.id, &DiscoveryOptions::default())
            else {
                bail!("workspace '{}' has no live directory handle", workspace.directory_name);
            };
            let project_data = refresh_workspace_project_data(&store, &handles, &workspace.id);

            println!("Scanned {} at {}", workspace.directory_name, snapshot.scanned_at);
            if let Some(project_data) = project_data {
                for file in &project_data.files {
                    println!("  config {}  ({} bytes)", file.name.as_str(), file.content.len());
                }
            }
            for file in &snapshot.discovered_files {
                println!("  file   {}  ({:?})", file.path, file.matched_by);
            }
            for finding in &snapshot.discovered_agents {
                println!(
                    "  agent  {}  {:?}/{:?}  {}",
                    finding.file_path, finding.provider, finding.confidence, finding.reason
                );
            }
        }
        Commands::Pipeline { command } => run_pipeline_command(store, handles, command)?,
    }

    Ok(())
}

fn run_pipeline_command(
    store: Arc<WorkspaceStore>,
    handles: Arc<DirectoryHandleRegistry>,
    command: PipelineCommands,
) -> anyhow::Result<()> {
    match command {
        PipelineCommands::Create { path, name } => {
            let Some(workspace) = open_workspace(&store, &handles, &path)? else {
                return Ok(());
            };

            // Seed steps from a fresh scan so the pipeline is runnable.
            let discovery = DiscoveryEngine::new(store.clone(), handles.clone());
            let findings = discovery
                .find_workspace_agents(&workspace.id, &DiscoveryOptions::default())
                .unwrap_or_default();
            let agents: Vec<_> = findings
                .iter()
                .map(|finding| agent_director::models::PipelineAgent {
                    id: String::new(),
                    label: String::new(),
                    provider: finding.provider,
                    file_path: finding.file_path.clone(),
                    description: finding.reason.clone(),
                })
                .collect();

            let engine = PipelineEngine::new(store.clone());
            let Some(pipeline) = engine.create_workspace_pipeline(&workspace.id, &name, &agents)
            else {
                bail!("workspace disappeared while creating pipeline");
            };
            println!(
                "Created pipeline '{}' with {} step(s)",
                pipeline.name,
                pipeline.steps.len()
            );
        }
        PipelineCommands::List { path } => {
            let Some(workspace) = open_workspace(&store, &handles, &path)? else {
                return Ok(());
            };
            let workspace = store.get_active_workspace().unwrap_or(workspace);
            let snapshot = agent_director::models::pipelines_snapshot_for(Some(&workspace));

            if snapshot.pipelines.is_empty() {
                println!("No pipelines in '{}'.", workspace.directory_name);
            }
            for pipeline in &snapshot.pipelines {
                println!("{}  {}  ({} run(s))", pipeline.id, pipeline.name, pipeline.runs.len());
                for (index, step) in pipeline.steps.iter().enumerate() {
                    println!(
                        "  {}. [{}] {}  <{}>",
                        index + 1,
                        step.agent.provider.label(),
                        step.agent.label,
                        step.id
                    );
                }
            }
        }
        PipelineCommands::Run { path, pipeline, task } => {
            let Some(workspace) = open_workspace(&store, &handles, &path)? else {
                return Ok(());
            };
            let engine = PipelineEngine::new(store.clone());
            let Some(pipeline_id) = resolve_pipeline_id(&store, &workspace, &pipeline) else {
                bail!("no pipeline named '{pipeline}'");
            };
            let Some(run) = engine.run_workspace_pipeline(&workspace.id, &pipeline_id, &task)
            else {
                bail!("pipeline '{pipeline}' has no steps to run");
            };

            println!("Run {} completed for task: {}", run.id, run.task);
            for (index, step_run) in run.step_runs.iter().enumerate() {
                println!(
                    "--- step {} [{}] {} ---",
                    index + 1,
                    step_run.agent.provider.label(),
                    step_run.agent.label
                );
                println!("{}", step_run.result);
            }
        }
        PipelineCommands::MoveStep { path, pipeline, step_id, direction } => {
            let Some(workspace) = open_workspace(&store, &handles, &path)? else {
                return Ok(());
            };
            let engine = PipelineEngine::new(store.clone());
            let Some(pipeline_id) = resolve_pipeline_id(&store, &workspace, &pipeline) else {
                bail!("no pipeline named '{pipeline}'");
            };
            let Some(updated) =
                engine.move_workspace_pipeline_step(&workspace.id, &pipeline_id, &step_id, direction)
            else {
                bail!("no pipeline named '{pipeline}'");
            };
            println!(
                "Steps: {}",
                updated
                    .steps
                    .iter()
                    .map(|step| step.agent.label.as_str())
                    .collect::<Vec<_>>()
                    .join(" -> ")
            );
        }
    }

    Ok(())
}
