use async_trait::async_trait;

use super::{ClientError, RemoteNoteService};
use crate::db::{is_duplicate_id, Database};
use crate::models::*;

/// In-process note service bound to one owner.
///
/// Mirrors the HTTP API's semantics (validation, owner scoping, not-found
/// handling) without a network hop.
#[derive(Clone)]
pub struct LocalNoteService {
    db: Database,
    owner: OwnerId,
}

impl LocalNoteService {
    pub fn new(db: Database, owner: OwnerId) -> Self {
        Self { db, owner }
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }
}

fn store_error(e: anyhow::Error) -> ClientError {
    tracing::error!("Note store error: {:#}", e);
    ClientError::Server(e.to_string())
}

#[async_trait]
impl RemoteNoteService for LocalNoteService {
    async fn get_all(&self) -> Result<Vec<Note>, ClientError> {
        self.db.get_notes(&self.owner).map_err(store_error)
    }

    async fn create(&self, input: &CreateNoteInput) -> Result<Note, ClientError> {
        input
            .validate()
            .map_err(|e| ClientError::BadRequest(e.to_string()))?;
        self.db
            .create_note(&self.owner, input.clone())
            .map_err(|e| {
                if is_duplicate_id(&e) {
                    ClientError::Conflict("Note id already exists".to_string())
                } else {
                    store_error(e)
                }
            })
    }

    async fn update(&self, id: &str, input: &UpdateNoteInput) -> Result<Note, ClientError> {
        input
            .validate()
            .map_err(|e| ClientError::BadRequest(e.to_string()))?;
        self.db
            .update_note(&self.owner, id, input.clone())
            .map_err(store_error)?
            .ok_or_else(|| ClientError::NotFound("Note not found".to_string()))
    }

    async fn trash(&self, id: &str) -> Result<Note, ClientError> {
        self.db
            .trash_note(&self.owner, id)
            .map_err(store_error)?
            .ok_or_else(|| ClientError::NotFound("Note not found".to_string()))
    }

    async fn delete_one_trashed(&self, id: &str) -> Result<(), ClientError> {
        if self
            .db
            .delete_trashed_note(&self.owner, id)
            .map_err(store_error)?
        {
            Ok(())
        } else {
            Err(ClientError::NotFound("Trashed note not found".to_string()))
        }
    }

    async fn delete_all_trashed(&self) -> Result<usize, ClientError> {
        self.db.delete_all_trashed(&self.owner).map_err(store_error)
    }
}
