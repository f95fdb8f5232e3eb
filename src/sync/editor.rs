//! Single-note editing session.
//!
//! Tracks which note is open and routes field edits to [`NoteSync`]. When the
//! user switches to another note, the outgoing note's debounced writes are
//! either sent immediately or dropped, depending on [`SwitchPolicy`].

use crate::models::{Note, NoteStatus, COLOR_PALETTE};

use super::coordinator::{NoteSync, SyncError};

/// What happens to unsent edits of the note being switched away from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SwitchPolicy {
    /// Send them right away.
    #[default]
    Flush,
    /// Discard them; the server keeps its last confirmed text.
    Drop,
}

pub struct Editor {
    sync: NoteSync,
    open: Option<String>,
    policy: SwitchPolicy,
}

impl Editor {
    pub fn new(sync: NoteSync) -> Self {
        Self::with_policy(sync, SwitchPolicy::default())
    }

    pub fn with_policy(sync: NoteSync, policy: SwitchPolicy) -> Self {
        Self {
            sync,
            open: None,
            policy,
        }
    }

    pub fn policy(&self) -> SwitchPolicy {
        self.policy
    }

    pub fn open_id(&self) -> Option<&str> {
        self.open.as_deref()
    }

    /// The open note as currently cached.
    pub fn note(&self) -> Option<Note> {
        self.open.as_deref().and_then(|id| self.sync.cache().get(id))
    }

    /// Open `id`, releasing the previously open note first.
    pub async fn open(&mut self, id: &str) -> Result<Note, SyncError> {
        let note = self
            .sync
            .cache()
            .get(id)
            .ok_or_else(|| SyncError::NotFound(id.to_string()))?;

        if self.open.as_deref() != Some(id) {
            self.release().await;
            self.open = Some(id.to_string());
            tracing::debug!(note_id = %id, "note opened");
        }
        Ok(note)
    }

    pub async fn close(&mut self) {
        self.release().await;
    }

    async fn release(&mut self) {
        let Some(id) = self.open.take() else {
            return;
        };
        match self.policy {
            SwitchPolicy::Flush => self.sync.flush_note(&id).await,
            SwitchPolicy::Drop => {
                self.sync.discard_pending(&id);
            }
        }
    }

    fn current(&self) -> Result<&str, SyncError> {
        self.open.as_deref().ok_or(SyncError::NothingOpen)
    }

    pub fn set_title(&self, title: impl Into<String>) -> Result<(), SyncError> {
        self.sync.edit_title(self.current()?, title)
    }

    pub fn set_description(&self, description: impl Into<String>) -> Result<(), SyncError> {
        self.sync.edit_description(self.current()?, description)
    }

    pub fn set_color(&self, color: impl Into<String>) -> Result<(), SyncError> {
        self.sync.recolor(self.current()?, color)
    }

    /// Pick one of the palette swatches by position.
    pub fn pick_swatch(&self, index: usize) -> Result<(), SyncError> {
        let color = COLOR_PALETTE
            .get(index)
            .ok_or_else(|| SyncError::NotFound(format!("swatch {}", index)))?;
        self.set_color(*color)
    }

    /// Trash the open note if it is active, delete it for good if it is
    /// already trashed. Either way the editor closes.
    pub async fn remove(&mut self) -> Result<(), SyncError> {
        let note = self.note().ok_or(SyncError::NothingOpen)?;
        match note.status {
            NoteStatus::Active => self.sync.trash(&note.id)?,
            NoteStatus::Trashed => self.sync.delete_trashed(&note.id)?,
        }
        self.open = None;
        Ok(())
    }
}
