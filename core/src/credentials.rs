use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::dispatcher::{Dispatcher, RequestAuth};
use crate::envelope::ApiEnvelope;
use crate::errors::{AdminError, AdminResult};
use crate::session::{Session, SessionStore};

pub const SIGN_IN_PATH: &str = "/auth/signin";

/// Login form submission
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// User record returned by the sign-in endpoint
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: u64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub display_name: String,
    pub email: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub user_roles: Vec<String>,
    #[serde(default)]
    pub is_email_verified: bool,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl AuthUser {
    /// Map the backend user record onto a session.
    ///
    /// The numeric id becomes the session's textual `user_id`.
    pub fn into_session(self) -> Session {
        let created_at = self
            .created_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|ts| ts.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        let mut roles: BTreeSet<String> = self.user_roles.into_iter().collect();
        if let Some(role) = self.role.filter(|role| !role.is_empty()) {
            roles.insert(role);
        }

        let non_empty = |value: String| if value.is_empty() { None } else { Some(value) };

        Session {
            user_id: self.id.to_string(),
            display_name: self.display_name,
            email: self.email,
            roles,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            created_at,
            first_name: non_empty(self.first_name),
            last_name: non_empty(self.last_name),
            profile_picture: self.profile_picture.filter(|url| !url.is_empty()),
            is_email_verified: self.is_email_verified,
        }
    }
}

#[derive(Deserialize)]
struct SignInData {
    user: AuthUser,
}

/// Turns an email/password pair into a `Session` via the backend sign-in endpoint
#[derive(Debug, Clone)]
pub struct CredentialExchange {
    dispatcher: Dispatcher,
}

impl CredentialExchange {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            dispatcher: Dispatcher::anonymous(base_url),
        }
    }

    /// Reuse the backend and HTTP client of an existing dispatcher, without its credentials
    pub fn from_dispatcher(dispatcher: &Dispatcher) -> Self {
        Self {
            dispatcher: dispatcher.with_auth(RequestAuth::Anonymous),
        }
    }

    /// Exchange credentials for a session without storing it
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn authorize(&self, credentials: &Credentials) -> AdminResult<Session> {
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(AdminError::Authentication(
                "Email and password are required".to_string(),
            ));
        }

        let envelope: ApiEnvelope<SignInData> =
            self.dispatcher.post(SIGN_IN_PATH, credentials, None).await?;

        match (envelope.success, envelope.data) {
            (true, Some(SignInData { user })) => {
                info!(user_id = user.id, "Sign-in accepted");
                Ok(user.into_session())
            }
            _ => {
                warn!(status = envelope.status_code, "Sign-in rejected");
                let message = if envelope.message.is_empty() {
                    "Sign-in failed".to_string()
                } else {
                    envelope.message
                };
                Err(AdminError::Authentication(message))
            }
        }
    }

    /// Exchange credentials for a session and make it the store's current session
    pub async fn sign_in(
        &self,
        credentials: &Credentials,
        store: &dyn SessionStore,
    ) -> AdminResult<Session> {
        let session = self.authorize(credentials).await?;
        store.save_session(session.clone()).await?;
        Ok(session)
    }

    /// Destroy the store's current session
    pub async fn sign_out(store: &dyn SessionStore) -> AdminResult<()> {
        store.clear_session().await?;
        info!("Signed out");
        Ok(())
    }
}
