//! Optimistic mutation coordinator.
//!
//! Every user intent is applied to the [`NoteCache`] synchronously, before any
//! request leaves the client, then sent to the [`RemoteNoteService`] in the
//! background. Title, description and color edits go through the
//! [`Debouncer`] so a burst of keystrokes costs one request. Once a request
//! settles, the configured [`Reconciler`] decides what happens to the cache.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::client::{ClientError, NoteClient, RemoteNoteService};
use crate::config::{ClientConfig, DEFAULT_DEBOUNCE};
use crate::models::*;

use super::cache::{NoteCache, RefreshTicket};
use super::debounce::{Debouncer, EditKey, FieldGroup};
use super::reconcile::{FireAndForget, Mutation, Reconciled, Reconciler};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("authentication required")]
    Unauthorized,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("note not found: {0}")]
    NotFound(String),

    #[error("note {id} is {actual:?}, expected {expected:?}")]
    InvalidState {
        id: String,
        expected: NoteStatus,
        actual: NoteStatus,
    },

    #[error("no note is open")]
    NothingOpen,

    #[error(transparent)]
    Remote(#[from] ClientError),
}

/// Tunables for [`NoteSync`].
#[derive(Clone)]
pub struct SyncOptions {
    /// Quiet period for text and color edits.
    pub debounce: Duration,
    pub reconciler: Arc<dyn Reconciler>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            reconciler: Arc::new(FireAndForget),
        }
    }
}

struct Inner {
    cache: NoteCache,
    remote: Arc<dyn RemoteNoteService>,
    reconciler: Arc<dyn Reconciler>,
    debouncer: Debouncer<EditKey>,
    owner: Option<OwnerId>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
    // Latest unanswered create, trash or delete per note. The next request
    // for that note waits for it.
    landing: Mutex<HashMap<String, watch::Receiver<bool>>>,
    // A mutation cancelled a refresh that still has to happen.
    refresh_owed: AtomicBool,
}

/// Client-side entry point for reading and changing notes.
///
/// Cheap to clone; clones share the cache, timers and in-flight requests.
#[derive(Clone)]
pub struct NoteSync {
    inner: Arc<Inner>,
}

impl NoteSync {
    pub fn new(remote: Arc<dyn RemoteNoteService>, owner: Option<OwnerId>) -> Self {
        Self::with_options(remote, owner, SyncOptions::default())
    }

    pub fn with_options(
        remote: Arc<dyn RemoteNoteService>,
        owner: Option<OwnerId>,
        options: SyncOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache: NoteCache::new(),
                remote,
                reconciler: options.reconciler,
                debouncer: Debouncer::new(options.debounce),
                owner,
                in_flight: Mutex::new(Vec::new()),
                landing: Mutex::new(HashMap::new()),
                refresh_owed: AtomicBool::new(false),
            }),
        }
    }

    /// HTTP-backed instance built from client configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::with_options(
            Arc::new(NoteClient::from_config(config)),
            config.owner.clone(),
            SyncOptions {
                debounce: config.debounce,
                ..SyncOptions::default()
            },
        )
    }

    pub fn cache(&self) -> &NoteCache {
        &self.inner.cache
    }

    pub fn owner(&self) -> Result<&OwnerId, SyncError> {
        self.inner.owner.as_ref().ok_or(SyncError::Unauthorized)
    }

    /// Shorthand for `cache().get_all()`.
    pub fn notes(&self) -> Vec<Note> {
        self.inner.cache.get_all()
    }

    // ============================================================
    // Refresh
    // ============================================================

    /// Fetch the full list and publish it, unless a mutation supersedes the
    /// fetch while it is in flight.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let ticket = self.inner.cache.begin_refresh();
        self.run_refresh(ticket).await
    }

    /// Refetch in the background. Use [`settled`](Self::settled) to wait.
    pub fn spawn_refresh(&self) {
        let ticket = self.inner.cache.begin_refresh();
        self.spawn_with_ticket(ticket);
    }

    /// Mark the cache stale and refetch in the background.
    pub fn invalidate(&self) {
        let ticket = self.inner.cache.invalidate();
        self.spawn_with_ticket(ticket);
    }

    fn spawn_with_ticket(&self, ticket: RefreshTicket) {
        let this = self.clone();
        self.track(tokio::spawn(async move {
            let _ = this.run_refresh(ticket).await;
        }));
    }

    async fn run_refresh(&self, ticket: RefreshTicket) -> Result<(), SyncError> {
        match self.inner.remote.get_all().await {
            Ok(notes) => {
                if self.inner.cache.complete_refresh(ticket, Ok(notes)) {
                    tracing::debug!(count = self.inner.cache.len(), "notes refreshed");
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!("failed to load notes: {}", e);
                self.inner.cache.complete_refresh(ticket, Err(e.to_string()));
                Err(e.into())
            }
        }
    }

    // ============================================================
    // Mutations
    // ============================================================

    /// Create a new active note at the head of the list.
    pub fn create(&self) -> Result<Note, SyncError> {
        let owner = self.owner()?.clone();
        let note = Note::draft(owner);

        self.begin_mutation();
        self.inner
            .cache
            .apply_optimistic(|notes| notes.insert(0, note.clone()));

        let (landed, _) = self.enqueue(&note.id);
        let input = CreateNoteInput::from(&note);
        let mutation = Mutation::Create { note: note.clone() };
        let this = self.clone();
        self.track(tokio::spawn(async move {
            let result = this.inner.remote.create(&input).await.map(Some);
            this.settle(&mutation, None, result).await;
            this.land(&input.id, landed);
        }));

        tracing::debug!(note_id = %note.id, "note created locally");
        Ok(note)
    }

    pub fn edit_title(&self, id: &str, title: impl Into<String>) -> Result<(), SyncError> {
        let title = title.into();
        self.edit(id, FieldGroup::Text, |note| note.title = Some(title))
    }

    pub fn edit_description(
        &self,
        id: &str,
        description: impl Into<String>,
    ) -> Result<(), SyncError> {
        let description = description.into();
        self.edit(id, FieldGroup::Text, |note| {
            note.description = Some(description)
        })
    }

    /// Set both text fields at once.
    pub fn edit_text(
        &self,
        id: &str,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<(), SyncError> {
        let (title, description) = (title.into(), description.into());
        self.edit(id, FieldGroup::Text, |note| {
            note.title = Some(title);
            note.description = Some(description);
        })
    }

    /// Change a note's color. Malformed colors are rejected before anything
    /// is touched.
    pub fn recolor(&self, id: &str, color: impl Into<String>) -> Result<(), SyncError> {
        let color = color.into();
        self.owner()?;
        if !is_valid_hex_color(&color) {
            return Err(ValidationError::InvalidColor(color).into());
        }
        self.edit(id, FieldGroup::Color, |note| note.color = color)
    }

    fn edit(
        &self,
        id: &str,
        group: FieldGroup,
        apply: impl FnOnce(&mut Note),
    ) -> Result<(), SyncError> {
        self.owner()?;
        self.require(id)?;

        self.begin_mutation();
        let found = self.inner.cache.apply_optimistic(|notes| {
            match notes.iter_mut().find(|n| n.id == id) {
                Some(note) => {
                    apply(note);
                    note.updated_at = Utc::now();
                    true
                }
                None => false,
            }
        });
        if !found {
            return Err(SyncError::NotFound(id.to_string()));
        }

        let this = self.clone();
        let note_id = id.to_string();
        self.inner
            .debouncer
            .schedule((note_id.clone(), group), async move {
                this.write_fields(note_id, group).await;
            });
        Ok(())
    }

    /// Send the group's fields as they are in the cache right now.
    async fn write_fields(&self, id: String, group: FieldGroup) {
        let ahead = self.landing().get(&id).cloned();
        wait_landed(&id, ahead).await;
        let Some(note) = self.inner.cache.get(&id) else {
            tracing::debug!(note_id = %id, "note no longer cached, skipping write");
            return;
        };

        let input = match group {
            FieldGroup::Text => UpdateNoteInput {
                title: Some(note.title),
                description: Some(note.description),
                color: None,
            },
            FieldGroup::Color => UpdateNoteInput {
                color: Some(note.color),
                ..UpdateNoteInput::default()
            },
        };

        let result = self.inner.remote.update(&id, &input).await.map(Some);
        self.settle(&Mutation::Update { id }, None, result).await;
    }

    /// Move an active note to the trash.
    pub fn trash(&self, id: &str) -> Result<(), SyncError> {
        self.owner()?;
        let previous = self.require_status(id, NoteStatus::Active)?;

        self.begin_mutation();
        self.inner.cache.apply_optimistic(|notes| {
            if let Some(note) = notes.iter_mut().find(|n| n.id == id) {
                note.status = NoteStatus::Trashed;
            }
        });

        let note_id = id.to_string();
        self.spawn_remote(
            Mutation::Trash { id: note_id.clone() },
            Some(previous),
            |remote| async move { remote.trash(&note_id).await.map(Some) },
        );
        Ok(())
    }

    /// Permanently delete a note that is already in the trash.
    pub fn delete_trashed(&self, id: &str) -> Result<(), SyncError> {
        self.owner()?;
        let previous = self.require_status(id, NoteStatus::Trashed)?;

        self.begin_mutation();
        self.discard_pending(id);
        self.inner
            .cache
            .apply_optimistic(|notes| notes.retain(|n| n.id != id));

        let note_id = id.to_string();
        self.spawn_remote(
            Mutation::DeleteTrashed { id: note_id.clone() },
            Some(previous),
            |remote| async move { remote.delete_one_trashed(&note_id).await.map(|_| None) },
        );
        Ok(())
    }

    /// Delete everything in the trash, then refetch: the server's resulting
    /// set is not predicted locally.
    pub fn empty_trash(&self) -> Result<(), SyncError> {
        self.owner()?;

        self.begin_mutation();
        let removed: Vec<String> = self.inner.cache.apply_optimistic(|notes| {
            let removed = notes
                .iter()
                .filter(|n| n.is_trashed())
                .map(|n| n.id.clone())
                .collect();
            notes.retain(|n| !n.is_trashed());
            removed
        });
        for id in &removed {
            self.discard_pending(id);
        }
        tracing::debug!(count = removed.len(), "trash emptied locally");

        let ahead: Vec<_> = self.landing().values().cloned().collect();
        let this = self.clone();
        self.track(tokio::spawn(async move {
            for pending in ahead {
                let _ = wait_for_true(pending).await;
            }
            let result = this.inner.remote.delete_all_trashed().await.map(|count| {
                tracing::debug!(count, "trash emptied remotely");
                None
            });
            if !this.settle(&Mutation::EmptyTrash, None, result).await {
                let ticket = this.inner.cache.invalidate();
                let _ = this.run_refresh(ticket).await;
            }
        }));
        Ok(())
    }

    // ============================================================
    // Pending writes
    // ============================================================

    /// Send every debounced write now and wait until all requests settle.
    pub async fn flush(&self) {
        self.inner.debouncer.flush_all().await;
        self.settled().await;
    }

    /// Send the debounced writes of one note now.
    pub async fn flush_note(&self, id: &str) {
        self.inner
            .debouncer
            .flush_matching(|(note_id, _)| note_id == id)
            .await;
    }

    /// Drop the debounced writes of one note without sending them.
    pub fn discard_pending(&self, id: &str) -> usize {
        self.inner
            .debouncer
            .cancel_matching(|(note_id, _)| note_id == id)
    }

    pub fn has_pending_write(&self, id: &str, group: FieldGroup) -> bool {
        self.inner.debouncer.is_pending(&(id.to_string(), group))
    }

    pub fn pending_writes(&self) -> usize {
        self.inner.debouncer.pending_count()
    }

    /// Wait for every spawned request, including follow-up refreshes.
    pub async fn settled(&self) {
        loop {
            let handles = std::mem::take(
                &mut *self.inner.in_flight.lock().expect("in-flight lock poisoned"),
            );
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    if e.is_panic() {
                        tracing::error!("note request panicked: {}", e);
                    }
                }
            }
        }
    }

    // ============================================================
    // Internals
    // ============================================================

    fn require(&self, id: &str) -> Result<Note, SyncError> {
        self.inner
            .cache
            .get(id)
            .ok_or_else(|| SyncError::NotFound(id.to_string()))
    }

    fn require_status(&self, id: &str, expected: NoteStatus) -> Result<Note, SyncError> {
        let note = self.require(id)?;
        if note.status != expected {
            return Err(SyncError::InvalidState {
                id: id.to_string(),
                expected,
                actual: note.status,
            });
        }
        Ok(note)
    }

    fn begin_mutation(&self) {
        if self.inner.cache.cancel_pending_refresh() {
            self.inner.refresh_owed.store(true, Ordering::SeqCst);
        }
    }

    fn spawn_remote<F, Fut>(&self, mutation: Mutation, previous: Option<Note>, call: F)
    where
        F: FnOnce(Arc<dyn RemoteNoteService>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<Note>, ClientError>> + Send + 'static,
    {
        let queued = match &mutation {
            Mutation::Trash { id } | Mutation::DeleteTrashed { id } => {
                let (landed, ahead) = self.enqueue(id);
                Some((id.clone(), landed, ahead))
            }
            _ => None,
        };

        let this = self.clone();
        self.track(tokio::spawn(async move {
            let landed = match queued {
                Some((id, landed, ahead)) => {
                    wait_landed(&id, ahead).await;
                    Some((id, landed))
                }
                None => None,
            };
            let result = call(this.inner.remote.clone()).await;
            this.settle(&mutation, previous.as_ref(), result).await;
            if let Some((id, landed)) = landed {
                this.land(&id, landed);
            }
        }));
    }

    fn landing(&self) -> std::sync::MutexGuard<'_, HashMap<String, watch::Receiver<bool>>> {
        self.inner.landing.lock().expect("landing lock poisoned")
    }

    /// Register a request for `id`. Returns its completion signal and the
    /// request it has to wait for, if one is still unanswered.
    fn enqueue(&self, id: &str) -> (watch::Sender<bool>, Option<watch::Receiver<bool>>) {
        let (landed, pending) = watch::channel(false);
        let ahead = self.landing().insert(id.to_string(), pending);
        (landed, ahead)
    }

    fn land(&self, id: &str, landed: watch::Sender<bool>) {
        landed.send_replace(true);
        let mut landing = self.landing();
        // A later request may have replaced the entry and still be running.
        if landing.get(id).is_some_and(|pending| *pending.borrow()) {
            landing.remove(id);
        }
    }

    /// Apply the reconciler to a finished request. Returns whether it refetched.
    async fn settle(
        &self,
        mutation: &Mutation,
        previous: Option<&Note>,
        result: Result<Option<Note>, ClientError>,
    ) -> bool {
        let cache = &self.inner.cache;
        let needs_refresh = match result {
            Ok(response) => {
                self.inner
                    .reconciler
                    .confirmed(cache, mutation, response.as_ref());
                false
            }
            Err(e) => {
                self.inner.reconciler.failed(cache, mutation, previous, &e)
                    == Reconciled::NeedsRefresh
            }
        };

        // Refetching while edits are still queued would show the server's
        // older text until those edits land.
        let owed = self.inner.debouncer.pending_count() == 0
            && self.inner.refresh_owed.swap(false, Ordering::SeqCst);

        if needs_refresh || owed {
            let ticket = cache.invalidate();
            let _ = self.run_refresh(ticket).await;
        }
        needs_refresh || owed
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut in_flight = self.inner.in_flight.lock().expect("in-flight lock poisoned");
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(handle);
    }
}

async fn wait_landed(id: &str, ahead: Option<watch::Receiver<bool>>) {
    if let Some(pending) = ahead {
        tracing::debug!(note_id = %id, "waiting for earlier request to settle");
        let _ = wait_for_true(pending).await;
    }
}

async fn wait_for_true(mut pending: watch::Receiver<bool>) -> Result<(), watch::error::RecvError> {
    pending.wait_for(|done| *done).await.map(|_| ())
}
