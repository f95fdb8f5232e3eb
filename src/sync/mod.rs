//! Client-side sync layer: local cache, optimistic mutations and debounced
//! writes to the note service.

pub mod cache;
pub mod coordinator;
pub mod debounce;
pub mod editor;
pub mod reconcile;

pub use cache::{LoadState, NoteCache, RefreshTicket};
pub use coordinator::{NoteSync, SyncError, SyncOptions};
pub use debounce::{Debouncer, EditKey, FieldGroup};
pub use editor::{Editor, SwitchPolicy};
pub use reconcile::{FireAndForget, Mutation, Reconciled, Reconciler, RollbackOnError};
