//! What to do with the cache once a remote call settles.
//!
//! The coordinator applies every change optimistically and then hands the
//! outcome of the remote call to a [`Reconciler`]. Swapping the reconciler
//! changes the failure policy without touching any call site.

use crate::client::ClientError;
use crate::models::Note;

use super::cache::NoteCache;

/// A remote call issued on behalf of one optimistic change.
#[derive(Debug, Clone)]
pub enum Mutation {
    Create { note: Note },
    Update { id: String },
    Trash { id: String },
    DeleteTrashed { id: String },
    EmptyTrash,
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Trash { .. } => "trash",
            Self::DeleteTrashed { .. } => "delete_one_trashed",
            Self::EmptyTrash => "delete_all_trashed",
        }
    }
}

/// What the coordinator should do after a failure was reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// The optimistic state stays as it is.
    Kept,
    /// The cache was restored locally.
    RolledBack,
    /// The local outcome can't be predicted; refetch from the server.
    NeedsRefresh,
}

pub trait Reconciler: Send + Sync {
    /// The server accepted the change. `response` is the note it returned,
    /// when the call returns one.
    fn confirmed(&self, _cache: &NoteCache, mutation: &Mutation, _response: Option<&Note>) {
        tracing::trace!(mutation = mutation.name(), "remote write confirmed");
    }

    /// The server rejected the change or could not be reached. `previous` is
    /// the cached note as it was before the optimistic write, if known.
    fn failed(
        &self,
        cache: &NoteCache,
        mutation: &Mutation,
        previous: Option<&Note>,
        error: &ClientError,
    ) -> Reconciled;
}

/// Trust the optimistic state: failures are logged and otherwise ignored.
/// The local view may diverge from the server until the next full refresh.
#[derive(Debug, Clone, Copy, Default)]
pub struct FireAndForget;

impl Reconciler for FireAndForget {
    fn failed(
        &self,
        _cache: &NoteCache,
        mutation: &Mutation,
        _previous: Option<&Note>,
        error: &ClientError,
    ) -> Reconciled {
        tracing::warn!(mutation = mutation.name(), "remote write failed: {}", error);
        Reconciled::Kept
    }
}

/// Undo the optimistic change when the server call fails.
///
/// Creates are removed again and trashed or deleted notes are put back.
/// Debounced updates and bulk deletes fall back to a full refresh, since the
/// pre-edit state of a burst of edits is not tracked.
#[derive(Debug, Clone, Copy, Default)]
pub struct RollbackOnError;

impl Reconciler for RollbackOnError {
    fn failed(
        &self,
        cache: &NoteCache,
        mutation: &Mutation,
        previous: Option<&Note>,
        error: &ClientError,
    ) -> Reconciled {
        tracing::warn!(
            mutation = mutation.name(),
            "remote write failed, rolling back: {}",
            error
        );

        match (mutation, previous) {
            (Mutation::Create { note }, _) => {
                cache.apply_optimistic(|notes| notes.retain(|n| n.id != note.id));
                Reconciled::RolledBack
            }
            (Mutation::Trash { id } | Mutation::DeleteTrashed { id }, Some(previous)) => {
                cache.apply_optimistic(|notes| {
                    notes.retain(|n| n.id != *id);
                    notes.push(previous.clone());
                });
                Reconciled::RolledBack
            }
            _ => Reconciled::NeedsRefresh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NoteStatus, OwnerId};

    fn cache_with(note: &Note) -> NoteCache {
        let cache = NoteCache::new();
        cache.replace_all(vec![note.clone()]);
        cache
    }

    #[test]
    fn fire_and_forget_keeps_optimistic_state() {
        let note = Note::draft(OwnerId::new("owner"));
        let cache = cache_with(&note);

        let outcome = FireAndForget.failed(
            &cache,
            &Mutation::Create { note: note.clone() },
            None,
            &ClientError::Server("boom".to_string()),
        );

        assert_eq!(outcome, Reconciled::Kept);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn rollback_removes_failed_create() {
        let note = Note::draft(OwnerId::new("owner"));
        let cache = cache_with(&note);

        let outcome = RollbackOnError.failed(
            &cache,
            &Mutation::Create { note },
            None,
            &ClientError::Unauthorized,
        );

        assert_eq!(outcome, Reconciled::RolledBack);
        assert!(cache.is_empty());
    }

    #[test]
    fn rollback_restores_trashed_note() {
        let note = Note::draft(OwnerId::new("owner"));
        let cache = cache_with(&Note {
            status: NoteStatus::Trashed,
            ..note.clone()
        });

        let outcome = RollbackOnError.failed(
            &cache,
            &Mutation::Trash {
                id: note.id.clone(),
            },
            Some(&note),
            &ClientError::NotFound("gone".to_string()),
        );

        assert_eq!(outcome, Reconciled::RolledBack);
        assert_eq!(cache.get(&note.id).unwrap().status, NoteStatus::Active);
    }

    #[test]
    fn rollback_refreshes_failed_updates() {
        let cache = NoteCache::new();
        let outcome = RollbackOnError.failed(
            &cache,
            &Mutation::Update {
                id: "n1".to_string(),
            },
            None,
            &ClientError::BadRequest("bad color".to_string()),
        );
        assert_eq!(outcome, Reconciled::NeedsRefresh);
    }
}
