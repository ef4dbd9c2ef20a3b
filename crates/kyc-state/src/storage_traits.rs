//! Storage trait definitions for KYC Verify
//!
//! `SessionStore` is the durable mapping `session_id -> Session` the
//! orchestrator reads and writes. It is async and backend-agnostic; an
//! in-memory fake lives in the `fakes` module and a directory of JSON
//! documents in `json_store`.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::schema::{Session, SessionId};

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// In-place edit applied by [`SessionStore::update_with`]. Returning an
/// error (usually [`StorageError::rejected`]) aborts the write.
pub type SessionMutation = Box<dyn FnOnce(&mut Session) -> StorageResult<()> + Send>;

/// Durable session snapshot store.
///
/// Guarantees:
/// - `create` never overwrites: a second `create` with the same id fails
///   with `SessionExists`.
/// - `get` returns the last snapshot written by `create` or `update`.
/// - `update` replaces the stored snapshot in a single step (readers see
///   either the old or the new snapshot, never a mix). Fails with
///   `SessionNotFound` and writes nothing when the id is unknown.
/// - `update_with` loads, edits and persists one session while holding that
///   session's exclusive lock. Two `update_with` calls on the same id never
///   interleave, whether they come from one store handle, two handles on
///   the same backing storage, or two processes. When the mutation fails
///   nothing is written.
/// - `list` enumerates every stored session in no particular order.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a brand new session.
    async fn create(&self, session: &Session) -> StorageResult<()>;

    /// Fetch the snapshot for `session_id`.
    async fn get(&self, session_id: &SessionId) -> StorageResult<Session>;

    /// Replace the snapshot of an existing session.
    async fn update(&self, session: &Session) -> StorageResult<()>;

    /// Atomically read, edit and persist `session_id`. Returns the stored
    /// snapshot.
    async fn update_with(
        &self,
        session_id: &SessionId,
        mutation: SessionMutation,
    ) -> StorageResult<Session>;

    /// Enumerate all known sessions.
    async fn list(&self) -> StorageResult<Vec<Session>>;
}
