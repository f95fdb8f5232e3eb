mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{Connection, OptionalExtension, Row};

use crate::models::*;

const NOTE_COLUMNS: &str =
    "id, owner_id, title, description, color, status, created_at, updated_at";

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "notebox")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Self::open(dirs.data_dir().join("notebox.db"))
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Note operations
    // ============================================================
    //
    // Every statement is scoped by owner: a note belonging to someone else
    // behaves exactly like a note that does not exist.

    /// All of the owner's notes, most recently updated first.
    pub fn get_notes(&self, owner: &OwnerId) -> Result<Vec<Note>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE owner_id = ? ORDER BY updated_at DESC, id"
        ))?;

        let notes = stmt
            .query_map([owner.as_str()], note_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(notes)
    }

    pub fn get_note(&self, owner: &OwnerId, id: &str) -> Result<Option<Note>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        find_note(&conn, owner, id)
    }

    /// Insert a note with a client-generated id. Callers validate the input
    /// first. An id that is already taken, by any owner, fails with an error
    /// that [`is_duplicate_id`] recognizes.
    pub fn create_note(&self, owner: &OwnerId, input: CreateNoteInput) -> Result<Note> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = current_time();

        let note = Note {
            id: input.id,
            owner_id: owner.clone(),
            title: input.title,
            description: input.description,
            color: input.color.unwrap_or_else(|| DEFAULT_NOTE_COLOR.to_string()),
            status: input.status.unwrap_or(NoteStatus::Active),
            created_at: input.created_at.unwrap_or(now).trunc_subsecs(6),
            updated_at: input.updated_at.unwrap_or(now).trunc_subsecs(6),
        };

        conn.execute(
            "INSERT INTO notes (id, owner_id, title, description, color, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            (
                &note.id,
                note.owner_id.as_str(),
                &note.title,
                &note.description,
                &note.color,
                note.status.as_str(),
                format_datetime(note.created_at),
                format_datetime(note.updated_at),
            ),
        )?;

        Ok(note)
    }

    /// Apply a partial update. Returns `None` when the owner has no such note.
    pub fn update_note(
        &self,
        owner: &OwnerId,
        id: &str,
        input: UpdateNoteInput,
    ) -> Result<Option<Note>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let Some(existing) = find_note(&conn, owner, id)? else {
            return Ok(None);
        };

        let now = current_time();
        let title = input.title.unwrap_or(existing.title);
        let description = input.description.unwrap_or(existing.description);
        let color = input.color.unwrap_or(existing.color);

        let rows = conn.execute(
            "UPDATE notes SET title = ?, description = ?, color = ?, updated_at = ?
             WHERE id = ? AND owner_id = ?",
            (
                &title,
                &description,
                &color,
                format_datetime(now),
                id,
                owner.as_str(),
            ),
        )?;
        if rows == 0 {
            return Ok(None);
        }

        Ok(Some(Note {
            title,
            description,
            color,
            updated_at: now,
            ..existing
        }))
    }

    pub fn trash_note(&self, owner: &OwnerId, id: &str) -> Result<Option<Note>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let Some(existing) = find_note(&conn, owner, id)? else {
            return Ok(None);
        };

        let now = current_time();
        let rows = conn.execute(
            "UPDATE notes SET status = ?, updated_at = ? WHERE id = ? AND owner_id = ?",
            (
                NoteStatus::Trashed.as_str(),
                format_datetime(now),
                id,
                owner.as_str(),
            ),
        )?;
        if rows == 0 {
            return Ok(None);
        }

        Ok(Some(Note {
            status: NoteStatus::Trashed,
            updated_at: now,
            ..existing
        }))
    }

    /// Hard-delete a single trashed note. Active notes are left alone.
    pub fn delete_trashed_note(&self, owner: &OwnerId, id: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "DELETE FROM notes WHERE id = ? AND owner_id = ? AND status = ?",
            (id, owner.as_str(), NoteStatus::Trashed.as_str()),
        )?;
        Ok(rows > 0)
    }

    /// Hard-delete every trashed note of the owner, returning how many went.
    pub fn delete_all_trashed(&self, owner: &OwnerId) -> Result<usize> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "DELETE FROM notes WHERE owner_id = ? AND status = ?",
            (owner.as_str(), NoteStatus::Trashed.as_str()),
        )?;
        Ok(rows)
    }

    // ============================================================
    // Session operations
    // ============================================================

    /// Record a session issued by the identity provider.
    pub fn put_session(
        &self,
        token: &str,
        owner: &OwnerId,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "INSERT INTO sessions (session_token, owner_id, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(session_token) DO UPDATE SET owner_id = excluded.owner_id,
                 expires_at = excluded.expires_at",
            (token, owner.as_str(), format_datetime(expires_at)),
        )?;
        Ok(())
    }

    /// Resolve a session token to its owner. Expired sessions resolve to `None`.
    pub fn find_session_owner(&self, token: &str) -> Result<Option<OwnerId>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let found = conn
            .query_row(
                "SELECT owner_id, expires_at FROM sessions WHERE session_token = ?",
                [token],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        Ok(found.and_then(|(owner, expires_at)| {
            match DateTime::parse_from_rfc3339(&expires_at) {
                Ok(expires_at) if expires_at.with_timezone(&Utc) > Utc::now() => {
                    Some(OwnerId::new(owner))
                }
                _ => None,
            }
        }))
    }

    pub fn delete_session(&self, token: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute("DELETE FROM sessions WHERE session_token = ?", [token])?;
        Ok(rows > 0)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

/// Whether `err` came from inserting a note whose id is already taken.
pub fn is_duplicate_id(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn find_note(conn: &Connection, owner: &OwnerId, id: &str) -> Result<Option<Note>> {
    let note = conn
        .query_row(
            &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ? AND owner_id = ?"),
            (id, owner.as_str()),
            note_from_row,
        )
        .optional()?;
    Ok(note)
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        owner_id: OwnerId::new(row.get::<_, String>(1)?),
        title: row.get(2)?,
        description: row.get(3)?,
        color: row.get(4)?,
        status: NoteStatus::from_str(&row.get::<_, String>(5)?).unwrap_or(NoteStatus::Active),
        created_at: parse_datetime(row.get::<_, String>(6)?),
        updated_at: parse_datetime(row.get::<_, String>(7)?),
    })
}

// Timestamps are stored with microsecond precision.
fn current_time() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

// Fixed precision keeps the stored strings lexically ordered by time.
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
