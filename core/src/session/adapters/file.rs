use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::session::store::{Session, SessionStore, SessionStoreError};

/// SessionStore that keeps the current session as a JSON file
///
/// Used by the CLI so a login survives between invocations.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn current_session(&self) -> Result<Option<Session>, SessionStoreError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SessionStoreError::StorageError(format!(
                    "Failed to read session file {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        let session = serde_json::from_str(&content).map_err(|e| {
            SessionStoreError::Corrupt(format!("{}: {}", self.path.display(), e))
        })?;
        Ok(Some(session))
    }

    async fn save_session(&self, session: Session) -> Result<(), SessionStoreError> {
        let content = serde_json::to_string_pretty(&session).map_err(|e| {
            SessionStoreError::StorageError(format!("Failed to serialize session: {}", e))
        })?;

        // Ensure the directory exists
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                SessionStoreError::StorageError(format!(
                    "Failed to create session directory: {}",
                    e
                ))
            })?;
        }

        fs::write(&self.path, content).await.map_err(|e| {
            SessionStoreError::StorageError(format!("Failed to write session file: {}", e))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| {
                    SessionStoreError::StorageError(format!(
                        "Failed to restrict session file permissions: {}",
                        e
                    ))
                })?;
        }

        debug!(
            "Saved session for user {} to {}",
            session.user_id,
            self.path.display()
        );
        Ok(())
    }

    async fn clear_session(&self) -> Result<(), SessionStoreError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!("Removed session file {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionStoreError::StorageError(format!(
                "Failed to remove session file: {}",
                e
            ))),
        }
    }
}
