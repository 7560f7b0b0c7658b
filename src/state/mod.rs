mod note_sync;

pub use note_sync::{ClearOptions, CommitOptions, NoteSynchronizer, SyncParts, SyncState};
