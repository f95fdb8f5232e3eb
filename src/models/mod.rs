//! Domain models for notebox.
//!
//! # Core Concepts
//!
//! - [`Note`]: A short text note owned by exactly one user. Notes start out
//!   [`NoteStatus::Active`], can be moved to the trash, and are only ever
//!   hard-deleted from there.
//! - [`OwnerId`]: Opaque identity handed over by the identity provider. The
//!   server derives it from the caller's session, never from the payload.
//! - Colors are `#RGB` or `#RRGGBB` hex codes, see [`is_valid_hex_color`].

mod color;
mod note;
mod owner;

pub use color::*;
pub use note::*;
pub use owner::*;
