use anyhow::{anyhow, Context, Result};
use lms_admin_core::{
    AdminApi, AdminConfig, ApiEnvelope, CredentialExchange, Credentials, Dispatcher,
    ExecutionContext, FileSessionStore, ProfileChanges, Session, SessionStore, SessionStoreRef,
    TokenResolver,
};
use std::sync::Arc;

use crate::logging::log_info;

/// Owns the on-disk session and hands out clients bound to it
pub struct SessionManager {
    store: Arc<FileSessionStore>,
    backend_url: String,
    context: ExecutionContext,
}

impl SessionManager {
    pub fn new(config: &AdminConfig) -> Result<Self> {
        let path = config
            .session_file_path()
            .context("Failed to resolve the session file path")?;

        Ok(Self {
            store: Arc::new(FileSessionStore::new(path)),
            backend_url: config.base_url().to_string(),
            context: config.context(),
        })
    }

    pub fn store(&self) -> &FileSessionStore {
        &self.store
    }

    fn backend_url(&self) -> Result<&str> {
        if self.backend_url.is_empty() {
            return Err(anyhow!(
                "No backend URL configured. Pass --backend-url or set LMS_ADMIN_BACKEND_URL"
            ));
        }
        Ok(&self.backend_url)
    }

    /// Admin client whose bearer token is read from the stored session on every call.
    ///
    /// The CLI has no browser-side accessor, so a browser context falls back
    /// to the session file as well.
    pub fn admin(&self) -> Result<AdminApi> {
        let server: SessionStoreRef = self.store.clone();
        let resolver = TokenResolver::new(self.context, server, None);
        Ok(AdminApi::new(Dispatcher::authenticated(
            self.backend_url()?,
            resolver,
        )))
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<Session> {
        let exchange = CredentialExchange::new(self.backend_url()?);
        let session = exchange.sign_in(credentials, self.store.as_ref()).await?;
        log_info(&format!(
            "Session saved to {}",
            self.store.path().display()
        ));
        Ok(session)
    }

    /// Returns whether there was a session to forget
    pub async fn logout(&self) -> Result<bool> {
        let had_session = self.current().await?.is_some();
        CredentialExchange::sign_out(self.store.as_ref()).await?;
        Ok(had_session)
    }

    pub async fn current(&self) -> Result<Option<Session>> {
        self.store
            .current_session()
            .await
            .context("Failed to read the stored session")
    }

    pub async fn require_session(&self) -> Result<Session> {
        self.current()
            .await?
            .ok_or_else(|| anyhow!("Not signed in. Run `lms-admin login` first"))
    }

    /// Replace the stored session with one reflecting a profile edit
    pub async fn apply_profile(&self, changes: ProfileChanges) -> Result<()> {
        if let Some(session) = self.current().await? {
            self.store
                .save_session(session.with_profile(changes))
                .await
                .context("Failed to update the stored session")?;
        }
        Ok(())
    }

    /// Drop the stored session after the backend refused a call, when no
    /// usable access token remains.
    ///
    /// A missing, empty or expired token counts as unusable. Returns whether
    /// the session was cleared.
    pub async fn invalidate_if_rejected<T>(&self, envelope: &ApiEnvelope<T>) -> Result<bool> {
        if !envelope.is_not_authorized() {
            return Ok(false);
        }

        let usable = self
            .current()
            .await?
            .map(|session| session.has_token() && !session.is_access_token_expired())
            .unwrap_or(false);
        if usable {
            return Ok(false);
        }

        CredentialExchange::sign_out(self.store.as_ref()).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const EXPIRED_TOKEN: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJleHAiOjF9.c2ln";
    const LIVE_TOKEN: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJleHAiOjQxMDI0NDQ4MDB9.c2ln";

    fn manager(dir: &TempDir) -> SessionManager {
        let config = AdminConfig {
            session_file: Some(dir.path().join("session.json")),
            ..Default::default()
        };
        SessionManager::new(&config).unwrap()
    }

    fn session(token: &str) -> Session {
        Session::new("1", "ada", "ada@example.com", token, "refresh")
    }

    #[tokio::test]
    async fn test_rejection_with_expired_token_signs_out() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        manager.store().save_session(session(EXPIRED_TOKEN)).await.unwrap();

        let rejected = ApiEnvelope::<()>::failure("Not Authorized", 401);
        assert!(manager.invalidate_if_rejected(&rejected).await.unwrap());
        assert!(manager.current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejection_with_live_token_keeps_session() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        manager.store().save_session(session(LIVE_TOKEN)).await.unwrap();

        let forbidden = ApiEnvelope::<()>::failure("Forbidden", 403);
        assert!(!manager.invalidate_if_rejected(&forbidden).await.unwrap());
        assert!(manager.current().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_other_failures_are_ignored() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        manager.store().save_session(session(EXPIRED_TOKEN)).await.unwrap();

        let failure = ApiEnvelope::<()>::failure("Validation failed", 422);
        assert!(!manager.invalidate_if_rejected(&failure).await.unwrap());
        assert!(manager.current().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_apply_profile_replaces_session() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        manager.store().save_session(session(LIVE_TOKEN)).await.unwrap();

        manager
            .apply_profile(ProfileChanges {
                profile_picture: Some("https://cdn.example.com/a.png".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let stored = manager.require_session().await.unwrap();
        assert_eq!(
            stored.profile_picture.as_deref(),
            Some("https://cdn.example.com/a.png")
        );
        assert_eq!(stored.access_token, LIVE_TOKEN);
    }

    #[tokio::test]
    async fn test_admin_requires_backend_url() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        assert!(manager.admin().is_err());
        assert!(!manager.logout().await.unwrap());
    }
}
