use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{is_valid_hex_color, OwnerId, DEFAULT_NOTE_COLOR};

/// Title given to notes created from the "new note" action.
pub const DEFAULT_NOTE_TITLE: &str = "New Note";

const MAX_NOTE_ID_LEN: usize = 64;

/// A short text note.
///
/// The `id` is generated by the client before the note is ever sent to the
/// server, so the note can be shown immediately. `updated_at` is the sort key
/// for every note list (most recently touched first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub owner_id: OwnerId,
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: String,
    pub status: NoteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Build a fresh active note for `owner` with a newly generated id.
    pub fn draft(owner: OwnerId) -> Self {
        let now = Utc::now();
        Self {
            id: new_note_id(),
            owner_id: owner,
            title: Some(DEFAULT_NOTE_TITLE.to_string()),
            description: Some(String::new()),
            color: DEFAULT_NOTE_COLOR.to_string(),
            status: NoteStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_trashed(&self) -> bool {
        self.status == NoteStatus::Trashed
    }
}

/// Which list a note shows up in.
///
/// There is no way back from `Trashed`: a trashed note can only be deleted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteStatus {
    #[serde(alias = "IN_PROGRESS")]
    Active,
    Trashed,
}

impl NoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Trashed => "TRASHED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" | "IN_PROGRESS" => Some(Self::Active),
            "TRASHED" => Some(Self::Trashed),
            _ => None,
        }
    }
}

/// Generate a collision-resistant note id without a server round trip.
pub fn new_note_id() -> String {
    Uuid::new_v4().to_string()
}

/// Note ids are 1-64 characters of `[A-Za-z0-9_-]`.
pub fn is_valid_note_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_NOTE_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Rejected note payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid note id: {0:?}")]
    InvalidId(String),
    #[error("invalid color {0:?}: expected #RGB or #RRGGBB")]
    InvalidColor(String),
}

/// Input for creating a note. The owner always comes from the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNoteInput {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Defaults to [`DEFAULT_NOTE_COLOR`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Defaults to `Active`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NoteStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CreateNoteInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !is_valid_note_id(&self.id) {
            return Err(ValidationError::InvalidId(self.id.clone()));
        }
        validate_color(self.color.as_deref())
    }
}

impl From<&Note> for CreateNoteInput {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id.clone(),
            title: note.title.clone(),
            description: note.description.clone(),
            color: Some(note.color.clone()),
            status: Some(note.status),
            created_at: Some(note.created_at),
            updated_at: Some(note.updated_at),
        }
    }
}

/// Partial update. Absent fields are left unchanged; an explicit `null`
/// clears `title` or `description`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateNoteInput {
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl UpdateNoteInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_color(self.color.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.color.is_none()
    }
}

/// Response of the empty-trash operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedCount {
    pub count: usize,
}

fn validate_color(color: Option<&str>) -> Result<(), ValidationError> {
    match color {
        Some(c) if !is_valid_hex_color(c) => Err(ValidationError::InvalidColor(c.to_string())),
        _ => Ok(()),
    }
}

// A present key (even `null`) becomes `Some(..)`; `#[serde(default)]` covers
// the absent case.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
