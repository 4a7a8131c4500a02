//! Directory capabilities held outside the persisted domain model.
//!
//! A [`DirectoryHandle`] is obtained from a picker at selection time and kept
//! only in an in-memory registry for the life of the process; it is never
//! serialized. Operations against a workspace whose handle is absent must
//! treat the capability as unavailable, not retry or crash.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

/// One entry seen while listing a directory.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Opaque capability over a picked directory root.
#[derive(Debug, Clone)]
pub struct DirectoryHandle {
    root: PathBuf,
    name: String,
}

impl DirectoryHandle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { root, name }
    }

    /// The directory's display name (its basename).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Entries of a subdirectory, sorted by name so traversal order is
    /// deterministic. Unreadable directories read as empty.
    pub fn list_entries(&self, dir: &Path) -> Vec<DirectoryEntry> {
        let Ok(read_dir) = fs::read_dir(dir) else {
            return Vec::new();
        };

        let mut entries: Vec<DirectoryEntry> = read_dir
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let file_type = entry.file_type().ok()?;
                Some(DirectoryEntry {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    path: entry.path(),
                    is_dir: file_type.is_dir(),
                })
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }
}

/// In-memory association from workspace id to its directory capability.
/// Explicitly allowed to be incomplete; never persisted.
#[derive(Default)]
pub struct DirectoryHandleRegistry {
    handles: Mutex<HashMap<String, DirectoryHandle>>,
}

impl DirectoryHandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, workspace_id: &str, handle: DirectoryHandle) {
        self.handles
            .lock()
            .unwrap()
            .insert(workspace_id.to_string(), handle);
    }

    pub fn get(&self, workspace_id: &str) -> Option<DirectoryHandle> {
        self.handles.lock().unwrap().get(workspace_id).cloned()
    }

    pub fn remove(&self, workspace_id: &str) {
        self.handles.lock().unwrap().remove(workspace_id);
    }
}

#[derive(Debug, Error)]
pub enum PickerError {
    /// The runtime offers no way to pick a directory. Callers surface a
    /// capability-unsupported message, not a generic failure.
    #[error("directory picking is not supported in this environment")]
    Unsupported,
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("could not access directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Source of directory capabilities. `Ok(None)` means the user cancelled,
/// which is a silent no-op everywhere, distinct from every error.
pub trait DirectoryPicker {
    fn pick_directory(&self) -> Result<Option<DirectoryHandle>, PickerError>;
}

/// Non-interactive picker over a caller-supplied path. An empty path reads as
/// a cancelled pick.
pub struct FsDirectoryPicker {
    path: PathBuf,
}

impl FsDirectoryPicker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DirectoryPicker for FsDirectoryPicker {
    fn pick_directory(&self) -> Result<Option<DirectoryHandle>, PickerError> {
        if self.path.as_os_str().is_empty() {
            return Ok(None);
        }

        let metadata = fs::metadata(&self.path).map_err(|source| PickerError::Io {
            path: self.path.clone(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(PickerError::NotADirectory(self.path.clone()));
        }

        Ok(Some(DirectoryHandle::new(&self.path)))
    }
}
