use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Debug, Display};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Error type for session store operations
#[derive(Debug)]
pub enum SessionStoreError {
    /// The stored session could not be decoded
    Corrupt(String),
    /// Error occurred during a store operation
    StorageError(String),
}

impl Display for SessionStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStoreError::Corrupt(msg) => write!(f, "Corrupt session: {}", msg),
            SessionStoreError::StorageError(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl Error for SessionStoreError {}

/// Session data structure
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Backend user id, kept in textual form
    pub user_id: String,
    pub display_name: String,
    pub email: String,
    pub roles: BTreeSet<String>,
    pub access_token: String,
    pub refresh_token: String,
    /// When the account behind the session was created
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub is_email_verified: bool,
}

impl Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("display_name", &self.display_name)
            .field("email", &self.email)
            .field("roles", &self.roles)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Profile fields that can change while a session is alive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileChanges {
    pub display_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(Deserialize)]
struct ExpiryClaims {
    exp: Option<i64>,
}

impl Session {
    /// Create a new session for the given user and token pair
    pub fn new(
        user_id: impl Into<String>,
        display_name: impl Into<String>,
        email: impl Into<String>,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            email: email.into(),
            roles: BTreeSet::new(),
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            created_at: Utc::now(),
            first_name: None,
            last_name: None,
            profile_picture: None,
            is_email_verified: false,
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Produce the session that results from a token rotation.
    ///
    /// The original value is consumed; requests already holding the old token
    /// keep it.
    pub fn with_tokens(self, access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            ..self
        }
    }

    /// Produce the session that results from a profile edit
    pub fn with_profile(self, changes: ProfileChanges) -> Self {
        Self {
            display_name: changes.display_name.unwrap_or(self.display_name),
            email: changes.email.unwrap_or(self.email),
            first_name: changes.first_name.or(self.first_name),
            last_name: changes.last_name.or(self.last_name),
            profile_picture: changes.profile_picture.or(self.profile_picture),
            ..self
        }
    }

    /// Whether the session carries a usable access token
    pub fn has_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Expiry of the access token, read from its `exp` claim.
    ///
    /// The signature is not checked; the backend remains the authority on
    /// whether a token is valid.
    pub fn access_token_expiry(&self) -> Option<DateTime<Utc>> {
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<ExpiryClaims>(
            &self.access_token,
            &DecodingKey::from_secret(&[]),
            &validation,
        )
        .ok()?;
        Utc.timestamp_opt(data.claims.exp?, 0).single()
    }

    /// Whether the access token's `exp` claim lies in the past
    pub fn is_access_token_expired(&self) -> bool {
        self.access_token_expiry()
            .map(|expiry| expiry <= Utc::now())
            .unwrap_or(false)
    }
}

/// Trait defining the interface for session stores
///
/// A store holds at most one current session for the context it serves.
#[async_trait]
pub trait SessionStore: Send + Sync + Debug {
    /// Read the current session, if any
    async fn current_session(&self) -> Result<Option<Session>, SessionStoreError>;

    /// Replace the current session
    async fn save_session(&self, session: Session) -> Result<(), SessionStoreError>;

    /// Drop the current session
    async fn clear_session(&self) -> Result<(), SessionStoreError>;

    /// Read the access token of the current session, treating an empty token as absent
    async fn access_token(&self) -> Result<Option<String>, SessionStoreError> {
        Ok(self
            .current_session()
            .await?
            .filter(Session::has_token)
            .map(|session| session.access_token))
    }
}

/// Type alias for Arc-wrapped SessionStore trait objects
pub type SessionStoreRef = Arc<dyn SessionStore>;
