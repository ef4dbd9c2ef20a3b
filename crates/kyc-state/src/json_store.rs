use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use fs2::FileExt;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::schema::{Session, SessionId};
use crate::storage_traits::{SessionMutation, SessionStore, StorageResult};

/// Directory-backed session store: one pretty-printed JSON document per
/// session.
///
/// Layout: `<root>/sessions/<session_id>.json`, plus a `<session_id>.lock`
/// beside it once the session has been updated.
///
/// Every write goes to a temp file in the same directory and is renamed into
/// place, so a reader never observes a half-written snapshot. Updates hold
/// an exclusive advisory lock on the session's lock file for the whole
/// read-modify-write, which serialises writers across store handles and
/// processes sharing the directory. Lock files are never removed: a waiter
/// may already hold the old inode open.
#[derive(Debug, Clone)]
pub struct JsonDirSessionStore {
    sessions_dir: Arc<PathBuf>,
}

impl JsonDirSessionStore {
    /// Create a store rooted at `root`. Creates `root/sessions/` if needed.
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let sessions_dir = root.as_ref().join("sessions");
        fs::create_dir_all(&sessions_dir)?;
        Ok(Self {
            sessions_dir: Arc::new(sessions_dir),
        })
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    /// Ids are generated as hex/uuid strings; anything that could escape the
    /// sessions directory is rejected.
    fn is_safe_id(session_id: &SessionId) -> bool {
        let id = session_id.as_str();
        !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    fn session_path(dir: &Path, session_id: &SessionId) -> PathBuf {
        dir.join(format!("{}.json", session_id.as_str()))
    }

    fn lock_path(dir: &Path, session_id: &SessionId) -> PathBuf {
        dir.join(format!("{}.lock", session_id.as_str()))
    }

    /// Block until this process holds the session's exclusive lock. The lock
    /// is released when the returned handle is dropped.
    fn lock_session(dir: &Path, session_id: &SessionId) -> StorageResult<File> {
        if !Self::is_safe_id(session_id) || !Self::session_path(dir, session_id).exists() {
            return Err(StorageError::not_found(session_id));
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(Self::lock_path(dir, session_id))?;
        FileExt::lock_exclusive(&file)?;
        Ok(file)
    }

    fn write_atomic(dir: &Path, session: &Session, clobber: bool) -> StorageResult<()> {
        let path = Self::session_path(dir, &session.session_id);
        let bytes = serde_json::to_vec_pretty(session)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;

        if clobber {
            tmp.persist(&path).map_err(|e| e.error)?;
        } else {
            tmp.persist_noclobber(&path).map_err(|e| {
                if e.error.kind() == ErrorKind::AlreadyExists {
                    StorageError::SessionExists {
                        session_id: session.session_id.to_string(),
                    }
                } else {
                    StorageError::Io(e.error)
                }
            })?;
        }
        Ok(())
    }

    fn read_session(dir: &Path, session_id: &SessionId) -> StorageResult<Session> {
        if !Self::is_safe_id(session_id) {
            return Err(StorageError::not_found(session_id));
        }
        let path = Self::session_path(dir, session_id);
        let bytes = fs::read(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::not_found(session_id)
            } else {
                StorageError::Io(e)
            }
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn read_all(dir: &Path) -> StorageResult<Vec<Session>> {
        let mut sessions = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = fs::read(&path)
                .map_err(StorageError::from)
                .and_then(|bytes| serde_json::from_slice::<Session>(&bytes).map_err(Into::into));
            match parsed {
                Ok(session) => sessions.push(session),
                Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable session file"),
            }
        }
        Ok(sessions)
    }

    /// Run blocking filesystem work off the async executor.
    async fn blocking<T, F>(&self, work: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> StorageResult<T> + Send + 'static,
    {
        let dir = Arc::clone(&self.sessions_dir);
        tokio::task::spawn_blocking(move || work(&dir))
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
    }
}

#[async_trait]
impl SessionStore for JsonDirSessionStore {
    async fn create(&self, session: &Session) -> StorageResult<()> {
        if !Self::is_safe_id(&session.session_id) {
            return Err(StorageError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid session id: {}", session.session_id),
            )));
        }
        let session = session.clone();
        self.blocking(move |dir| {
            Self::write_atomic(dir, &session, false)?;
            debug!(session_id = %session.session_id, "session file created");
            Ok(())
        })
        .await
    }

    async fn get(&self, session_id: &SessionId) -> StorageResult<Session> {
        let session_id = session_id.clone();
        self.blocking(move |dir| Self::read_session(dir, &session_id)).await
    }

    async fn update(&self, session: &Session) -> StorageResult<()> {
        let session = session.clone();
        self.blocking(move |dir| {
            let _lock = Self::lock_session(dir, &session.session_id)?;
            Self::write_atomic(dir, &session, true)
        })
        .await
    }

    async fn update_with(
        &self,
        session_id: &SessionId,
        mutation: SessionMutation,
    ) -> StorageResult<Session> {
        let session_id = session_id.clone();
        self.blocking(move |dir| {
            let _lock = Self::lock_session(dir, &session_id)?;
            let mut session = Self::read_session(dir, &session_id)?;
            mutation(&mut session)?;
            Self::write_atomic(dir, &session, true)?;
            debug!(session_id = %session_id, "session file updated");
            Ok(session)
        })
        .await
    }

    async fn list(&self) -> StorageResult<Vec<Session>> {
        self.blocking(Self::read_all).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SessionStatus;

    fn make_store() -> (tempfile::TempDir, JsonDirSessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirSessionStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn create_then_get_roundtrip() {
        let (_dir, store) = make_store();
        let session = Session::new();
        store.create(&session).await.unwrap();

        let loaded = store.get(&session.session_id).await.unwrap();
        assert_eq!(loaded, session);
    }

    #[tokio::test]
    async fn file_lands_under_sessions_dir() {
        let (dir, store) = make_store();
        let session = Session::new();
        store.create(&session).await.unwrap();

        let expected = dir
            .path()
            .join("sessions")
            .join(format!("{}.json", session.session_id));
        assert!(expected.exists());
    }

    #[tokio::test]
    async fn create_does_not_clobber() {
        let (_dir, store) = make_store();
        let session = Session::new();
        store.create(&session).await.unwrap();

        let mut changed = session.clone();
        changed.status = SessionStatus::Completed;
        let err = store.create(&changed).await.unwrap_err();
        assert!(matches!(err, StorageError::SessionExists { .. }));

        let loaded = store.get(&session.session_id).await.unwrap();
        assert_eq!(loaded.status, SessionStatus::InProgress);
    }

    #[tokio::test]
    async fn update_missing_writes_nothing() {
        let (_dir, store) = make_store();
        let err = store.update(&Session::new()).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_mutation_leaves_file_untouched() {
        let (_dir, store) = make_store();
        let session = Session::new();
        store.create(&session).await.unwrap();

        let err = store
            .update_with(
                &session.session_id,
                Box::new(|s: &mut Session| {
                    s.status = SessionStatus::Completed;
                    Err(StorageError::rejected(std::io::Error::other("no")))
                }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Rejected(_)));
        assert_eq!(store.get(&session.session_id).await.unwrap(), session);
    }

    #[tokio::test]
    async fn update_with_unknown_id_creates_no_lock_file() {
        let (_dir, store) = make_store();
        let ghost = SessionId::new();
        let err = store
            .update_with(&ghost, Box::new(|_| Ok(())))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(fs::read_dir(store.sessions_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn path_traversal_ids_are_not_found() {
        let (_dir, store) = make_store();
        let err = store.get(&SessionId::from("../outside")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn list_skips_corrupt_and_foreign_files() {
        let (_dir, store) = make_store();
        let session = Session::new();
        store.create(&session).await.unwrap();

        fs::write(store.sessions_dir().join("broken.json"), b"{not json").unwrap();
        fs::write(store.sessions_dir().join("notes.txt"), b"hello").unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].session_id, session.session_id);
    }

    #[tokio::test]
    async fn reopen_sees_existing_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new();
        {
            let store = JsonDirSessionStore::new(dir.path()).unwrap();
            store.create(&session).await.unwrap();
        }
        let reopened = JsonDirSessionStore::new(dir.path()).unwrap();
        assert_eq!(reopened.get(&session.session_id).await.unwrap(), session);
    }
}
