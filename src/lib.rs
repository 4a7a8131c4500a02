//! Core library for Agent Director.
//!
//! This crate provides the workspace state store, directory-discovery engine,
//! and pipeline orchestration engine behind the Agent Director dashboard,
//! independent of any presentation layer. Agents are never executed for real;
//! pipeline runs are deterministic simulations chaining each step's output
//! into the next step's input.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use agent_director::handles::{DirectoryHandle, DirectoryHandleRegistry};
//! use agent_director::discovery::{DiscoveryEngine, DiscoveryOptions};
//! use agent_director::store::WorkspaceStore;
//!
//! let store = Arc::new(WorkspaceStore::open_default()?);
//! let handles = Arc::new(DirectoryHandleRegistry::new());
//!
//! let workspace = store.select_workspace_by_directory_name("my-app");
//! handles.register(&workspace.id, DirectoryHandle::new("/path/to/my-app"));
//!
//! let engine = DiscoveryEngine::new(store.clone(), handles.clone());
//! let snapshot = engine.discover_workspace_directory(&workspace.id, &DiscoveryOptions::default());
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod discovery;
pub mod handles;
pub mod models;
pub mod pipelines;
pub mod project_data;
pub mod store;

// Re-export commonly used types at crate root
pub use pipelines::PipelineEngine;
pub use store::WorkspaceStore;
