//! Client-side note cache.
//!
//! Holds the signed-in user's notes as last seen by the client, including
//! optimistic changes the server has not confirmed yet. Notes are unique by
//! id and always ordered by `updated_at`, newest first.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::models::{Note, NoteStatus};

/// Outcome of the most recent full refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// No refresh has completed yet.
    Loading,
    Loaded,
    /// The last refresh failed; cached notes are whatever was there before.
    Failed(String),
}

/// Permission to publish the result of one background refresh.
///
/// A ticket goes stale as soon as [`NoteCache::cancel_pending_refresh`] runs,
/// so a slow list fetch can never overwrite a newer optimistic write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    epoch: u64,
}

#[derive(Debug)]
struct CacheState {
    notes: Vec<Note>,
    epoch: u64,
    refreshing: bool,
    stale: bool,
    load_state: LoadState,
}

impl Default for CacheState {
    fn default() -> Self {
        Self {
            notes: Vec::new(),
            epoch: 0,
            refreshing: false,
            stale: true,
            load_state: LoadState::Loading,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoteCache {
    state: Arc<Mutex<CacheState>>,
}

impl NoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current notes, newest first. Never waits on the network.
    pub fn get_all(&self) -> Vec<Note> {
        self.lock().notes.clone()
    }

    pub fn get(&self, id: &str) -> Option<Note> {
        self.lock().notes.iter().find(|n| n.id == id).cloned()
    }

    /// The "my notes" list.
    pub fn active(&self) -> Vec<Note> {
        self.with_status(NoteStatus::Active)
    }

    /// The trash list.
    pub fn trashed(&self) -> Vec<Note> {
        self.with_status(NoteStatus::Trashed)
    }

    fn with_status(&self, status: NoteStatus) -> Vec<Note> {
        self.lock()
            .notes
            .iter()
            .filter(|n| n.status == status)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn load_state(&self) -> LoadState {
        self.lock().load_state.clone()
    }

    pub fn is_stale(&self) -> bool {
        self.lock().stale
    }

    /// Replace the whole collection with an authoritative list.
    pub fn replace_all(&self, notes: Vec<Note>) {
        let mut state = self.lock();
        state.notes = notes;
        normalize(&mut state.notes);
        state.stale = false;
        state.load_state = LoadState::Loaded;
    }

    /// Transform the collection in place before the server has confirmed
    /// anything. The result is re-sorted before the lock is released, so no
    /// reader ever observes an unordered list.
    pub fn apply_optimistic<R>(&self, updater: impl FnOnce(&mut Vec<Note>) -> R) -> R {
        let mut state = self.lock();
        let result = updater(&mut state.notes);
        normalize(&mut state.notes);
        result
    }

    /// Invalidate every refresh that is currently in flight. Returns whether
    /// one was in flight, i.e. whether a refresh is now owed.
    pub fn cancel_pending_refresh(&self) -> bool {
        let mut state = self.lock();
        state.epoch += 1;
        let was_refreshing = std::mem::replace(&mut state.refreshing, false);
        if was_refreshing {
            tracing::debug!(epoch = state.epoch, "pending refresh cancelled");
        }
        was_refreshing
    }

    /// Mark the cache stale. The returned ticket lets the caller's background
    /// refresh publish its result.
    pub fn invalidate(&self) -> RefreshTicket {
        let mut state = self.lock();
        state.stale = true;
        state.refreshing = true;
        RefreshTicket { epoch: state.epoch }
    }

    pub fn begin_refresh(&self) -> RefreshTicket {
        let mut state = self.lock();
        state.refreshing = true;
        RefreshTicket { epoch: state.epoch }
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    /// Publish a refresh result. Returns false when the ticket was superseded
    /// and the result was discarded.
    pub fn complete_refresh(&self, ticket: RefreshTicket, result: Result<Vec<Note>, String>) -> bool {
        let mut state = self.lock();
        if ticket.epoch != state.epoch {
            tracing::debug!(
                ticket = ticket.epoch,
                current = state.epoch,
                "discarding superseded refresh"
            );
            return false;
        }

        state.refreshing = false;
        match result {
            Ok(notes) => {
                state.notes = notes;
                normalize(&mut state.notes);
                state.stale = false;
                state.load_state = LoadState::Loaded;
            }
            Err(message) => {
                state.load_state = LoadState::Failed(message);
            }
        }
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().expect("note cache lock poisoned")
    }
}

// Newest first; ties keep their current relative order. Later duplicates of
// an id are dropped.
fn normalize(notes: &mut Vec<Note>) {
    let mut seen = HashSet::with_capacity(notes.len());
    notes.retain(|n| seen.insert(n.id.clone()));
    notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}
