//! Access to the remote note service.
//!
//! The sync layer only depends on [`RemoteNoteService`]. [`NoteClient`] talks
//! to a running server over HTTP; [`LocalNoteService`] calls a [`Database`]
//! in-process and backs tests and single-binary setups.
//!
//! [`Database`]: crate::db::Database

mod http;
mod local;

pub use http::NoteClient;
pub use local::LocalNoteService;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::*;

/// Remote note service errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: session required or expired")]
    Unauthorized,

    #[error("Server error: {0}")]
    Server(String),
}

/// The CRUD contract of the notes API, scoped to the caller's session.
#[async_trait]
pub trait RemoteNoteService: Send + Sync {
    /// All notes of the session's owner, most recently updated first.
    async fn get_all(&self) -> Result<Vec<Note>, ClientError>;

    async fn create(&self, input: &CreateNoteInput) -> Result<Note, ClientError>;

    async fn update(&self, id: &str, input: &UpdateNoteInput) -> Result<Note, ClientError>;

    async fn trash(&self, id: &str) -> Result<Note, ClientError>;

    async fn delete_one_trashed(&self, id: &str) -> Result<(), ClientError>;

    /// Returns the number of notes removed.
    async fn delete_all_trashed(&self) -> Result<usize, ClientError>;
}
