//! Registry of open reaction windows
//!
//! Windows live in a `DashMap` keyed by id, each behind its own mutex.
//! Terminal transitions lock only the window they touch, so work on
//! different windows never serializes on a global lock.
//!
//! Iteration goes through [`WindowRegistry::handles`], which clones the
//! handles out of the map first. Holding a `DashMap` iterator while removing
//! an entry from the same shard would deadlock; the snapshot lets the monitor
//! remove windows mid-sweep without skipping or revisiting any.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::EngineError;

use super::state::{ReactionWindow, WindowSnapshot};
use super::{SubjectId, WindowId};

/// Shared, individually locked window.
pub type WindowHandle = Arc<Mutex<ReactionWindow>>;

/// Locks a window handle, recovering the data if a holder panicked.
///
/// Window mutations are single assignments, so a poisoned lock still guards
/// consistent state.
pub fn lock(handle: &WindowHandle) -> MutexGuard<'_, ReactionWindow> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Concurrent store of currently open windows.
#[derive(Debug, Default)]
pub struct WindowRegistry {
    windows: DashMap<WindowId, WindowHandle>,
}

impl WindowRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new window.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DuplicateWindowId`] if a window with the same
    /// id is already present. The existing window is left untouched.
    pub fn open(&self, window: ReactionWindow) -> Result<WindowSnapshot, EngineError> {
        match self.windows.entry(window.id().clone()) {
            Entry::Occupied(entry) => Err(EngineError::DuplicateWindowId {
                id: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                let snapshot = window.snapshot();
                entry.insert(Arc::new(Mutex::new(window)));
                Ok(snapshot)
            }
        }
    }

    /// Returns the handle for `id`, if present.
    #[must_use]
    pub fn handle(&self, id: &WindowId) -> Option<WindowHandle> {
        // Clone out so the shard guard is released before anyone locks the window.
        self.windows.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns a snapshot of the window for `id`, if present.
    #[must_use]
    pub fn get(&self, id: &WindowId) -> Option<WindowSnapshot> {
        self.handle(id).map(|handle| lock(&handle).snapshot())
    }

    /// Removes the window for `id`. Removing an absent id is a no-op.
    ///
    /// Returns whether an entry was removed.
    pub fn remove(&self, id: &WindowId) -> bool {
        self.windows.remove(id).is_some()
    }

    /// Removes `handle` only if it is still the entry stored under its id.
    ///
    /// Resolution paths use this so a window that was finalized and then
    /// replaced by a new one under the same id never evicts its successor.
    pub fn remove_handle(&self, id: &WindowId, handle: &WindowHandle) -> bool {
        self.windows
            .remove_if(id, |_, stored| Arc::ptr_eq(stored, handle))
            .is_some()
    }

    /// Clones out every current handle.
    ///
    /// The returned list is independent of the map, so callers may remove
    /// entries while walking it.
    #[must_use]
    pub fn handles(&self) -> Vec<WindowHandle> {
        self.windows
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Snapshots of all windows currently stored.
    #[must_use]
    pub fn all(&self) -> Vec<WindowSnapshot> {
        self.handles()
            .iter()
            .map(|handle| lock(handle).snapshot())
            .collect()
    }

    /// Returns the waiting window for `subject`, if it has one.
    ///
    /// When a subject faces several attacks at once, the one closing
    /// soonest is returned.
    #[must_use]
    pub fn find_by_subject(&self, subject: &SubjectId) -> Option<WindowSnapshot> {
        self.handles()
            .iter()
            .filter_map(|handle| {
                let window = lock(handle);
                (window.subject_id() == subject && !window.status().is_terminal())
                    .then(|| window.snapshot())
            })
            .min_by_key(|snapshot| snapshot.deadline)
    }

    /// Number of stored windows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Returns whether no window is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
