//! Durable keyed registry of workspace records plus the volatile
//! active-workspace pointer and change notification.
//!
//! One registry document lives under a single durable key; every mutation is
//! a full read-modify-write of that document (last-writer-wins). The active
//! pointer lives in the session scope so "no active workspace" stays
//! representable independent of "zero workspaces".

mod storage;

pub use storage::{Clock, FileStorage, KeyValueStorage, ManualClock, MemoryStorage, SystemClock};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::SecondsFormat;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::{
    parse_workspace_state, sanitize_directory_name, WorkspaceRecord, WorkspaceStateSnapshot,
};

pub const WORKSPACE_STATE_STORAGE_KEY: &str = "agent-director:workspace-state:v1";
pub const ACTIVE_WORKSPACE_ID_SESSION_KEY: &str = "agent-director:active-workspace-id:v1";
pub const LEGACY_SELECTED_DIRECTORY_STORAGE_KEY: &str = "agent-director:selected-directory";

/// Handle returned by [`WorkspaceStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type ChangeListener = Arc<dyn Fn() + Send + Sync>;

pub struct WorkspaceStore {
    durable: Mutex<Box<dyn KeyValueStorage>>,
    session: Mutex<Box<dyn KeyValueStorage>>,
    clock: Box<dyn Clock>,
    migration_checked: AtomicBool,
    listeners: Mutex<HashMap<SubscriptionId, ChangeListener>>,
    next_subscription: AtomicU64,
}

impl WorkspaceStore {
    pub fn new(
        durable: Box<dyn KeyValueStorage>,
        session: Box<dyn KeyValueStorage>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            durable: Mutex::new(durable),
            session: Mutex::new(session),
            clock,
            migration_checked: AtomicBool::new(false),
            listeners: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(0),
        }
    }

    /// File-backed durable scope under the platform data directory, in-memory
    /// session scope, system clock.
    pub fn open_default() -> anyhow::Result<Self> {
        let durable = FileStorage::open_default().context("could not determine data directory")?;
        Ok(Self::new(
            Box::new(durable),
            Box::new(MemoryStorage::new()),
            Box::new(SystemClock),
        ))
    }

    /// Snapshot copy of the registry; never the live structure.
    pub fn list_workspaces(&self) -> Vec<WorkspaceRecord> {
        self.read_state().workspaces
    }

    /// Resolves the active pointer; `None` if unset or dangling.
    pub fn get_active_workspace(&self) -> Option<WorkspaceRecord> {
        let active_id = self.read_active_workspace_id()?;
        self.read_state()
            .workspaces
            .into_iter()
            .find(|workspace| workspace.id == active_id)
    }

    /// The sole creation path: finds the first record matching the sanitized
    /// name, else creates one; sets it active; persists; notifies.
    pub fn select_workspace_by_directory_name(&self, directory_name: &str) -> WorkspaceRecord {
        let mut state = self.read_state();
        let normalized_name = sanitize_directory_name(directory_name);
        let now = self.now_iso();

        let workspace = match state
            .workspaces
            .iter_mut()
            .find(|workspace| workspace.directory_name == normalized_name)
        {
            Some(existing) => {
                existing.updated_at = now;
                existing.clone()
            }
            None => {
                let workspace = WorkspaceRecord {
                    id: create_id(),
                    directory_name: normalized_name,
                    data: Map::new(),
                    created_at: now.clone(),
                    updated_at: now,
                };
                tracing::debug!(workspace_id = %workspace.id, name = %workspace.directory_name, "created workspace");
                state.workspaces.push(workspace.clone());
                workspace
            }
        };

        self.write_state(&state);
        self.write_active_workspace_id(&workspace.id);
        self.notify_changed();
        workspace
    }

    /// Sets the pointer only if `workspace_id` exists; else no-op `None`.
    pub fn set_active_workspace(&self, workspace_id: &str) -> Option<WorkspaceRecord> {
        let workspace = self
            .read_state()
            .workspaces
            .into_iter()
            .find(|workspace| workspace.id == workspace_id)?;

        self.write_active_workspace_id(&workspace.id);
        self.notify_changed();
        Some(workspace)
    }

    pub fn clear_active_workspace(&self) {
        self.session
            .lock()
            .unwrap()
            .remove(ACTIVE_WORKSPACE_ID_SESSION_KEY);
        self.notify_changed();
    }

    /// Deletes the record. The active pointer is intentionally left dangling
    /// if it pointed here; it resolves to `None` on the next read.
    pub fn remove_workspace(&self, workspace_id: &str) -> bool {
        let mut state = self.read_state();
        let before = state.workspaces.len();
        state.workspaces.retain(|workspace| workspace.id != workspace_id);
        let removed = state.workspaces.len() != before;

        if removed {
            self.write_state(&state);
            self.notify_changed();
        }
        removed
    }

    /// Shallow-merges `patch` into the workspace's data bag and bumps
    /// `updatedAt`; no-op `None` if the id is unknown.
    pub fn update_workspace_data(
        &self,
        workspace_id: &str,
        patch: Map<String, Value>,
    ) -> Option<WorkspaceRecord> {
        let mut state = self.read_state();
        let workspace = state
            .workspaces
            .iter_mut()
            .find(|workspace| workspace.id == workspace_id)?;

        for (key, value) in patch {
            workspace.data.insert(key, value);
        }
        workspace.updated_at = self.now_iso();
        let updated = workspace.clone();

        self.write_state(&state);
        self.notify_changed();
        Some(updated)
    }

    /// Registers a listener on the union of the local post-mutation channel
    /// and the external-change feed.
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().unwrap().insert(id, Arc::new(listener));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.lock().unwrap().remove(&id);
    }

    /// Entry point for a host-provided external change feed (another process
    /// or tab mutated the shared substrate). Keys outside the store's known
    /// set are ignored.
    pub fn handle_external_change(&self, key: &str) {
        let known = matches!(
            key,
            WORKSPACE_STATE_STORAGE_KEY
                | ACTIVE_WORKSPACE_ID_SESSION_KEY
                | LEGACY_SELECTED_DIRECTORY_STORAGE_KEY
        );
        if known {
            self.notify_changed();
        }
    }

    fn read_state(&self) -> WorkspaceStateSnapshot {
        self.migrate_legacy_selection_if_needed();

        let raw = self.durable.lock().unwrap().get(WORKSPACE_STATE_STORAGE_KEY);
        parse_workspace_state(raw.as_deref())
    }

    fn write_state(&self, state: &WorkspaceStateSnapshot) {
        let json = serde_json::to_string(state).unwrap_or_else(|_| "{}".to_string());
        self.durable
            .lock()
            .unwrap()
            .set(WORKSPACE_STATE_STORAGE_KEY, &json);
    }

    fn read_active_workspace_id(&self) -> Option<String> {
        self.session
            .lock()
            .unwrap()
            .get(ACTIVE_WORKSPACE_ID_SESSION_KEY)
    }

    fn write_active_workspace_id(&self, workspace_id: &str) {
        self.session
            .lock()
            .unwrap()
            .set(ACTIVE_WORKSPACE_ID_SESSION_KEY, workspace_id);
    }

    /// Converts a retired single-directory-name value into a workspace record.
    /// Runs at most once per process lifetime, however many reads occur.
    fn migrate_legacy_selection_if_needed(&self) {
        if self.migration_checked.swap(true, Ordering::SeqCst) {
            return;
        }

        let legacy_directory_name = self
            .durable
            .lock()
            .unwrap()
            .get(LEGACY_SELECTED_DIRECTORY_STORAGE_KEY);
        let Some(legacy_directory_name) = legacy_directory_name else {
            return;
        };

        tracing::info!(name = %legacy_directory_name, "migrating legacy directory selection");
        self.select_workspace_by_directory_name(&legacy_directory_name);
        self.durable
            .lock()
            .unwrap()
            .remove(LEGACY_SELECTED_DIRECTORY_STORAGE_KEY);
    }

    fn notify_changed(&self) {
        let listeners: Vec<ChangeListener> =
            self.listeners.lock().unwrap().values().cloned().collect();
        for listener in listeners {
            listener();
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
