use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{AdminError, AdminResult};
use crate::session::SessionStoreRef;

const UNAUTHORIZED_MESSAGE: &str = "Unauthorized access";

/// Where the calling code runs, which decides the session accessor consulted first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionContext {
    #[default]
    Server,
    Browser,
}

/// Resolves the bearer token for one outbound request.
///
/// The session accessors are injected; the resolver holds no token itself and
/// reads the stores on every call.
#[derive(Debug, Clone)]
pub struct TokenResolver {
    context: ExecutionContext,
    server: SessionStoreRef,
    browser: Option<SessionStoreRef>,
}

impl TokenResolver {
    pub fn new(
        context: ExecutionContext,
        server: SessionStoreRef,
        browser: Option<SessionStoreRef>,
    ) -> Self {
        Self {
            context,
            server,
            browser,
        }
    }

    /// Resolver for code running in the server context
    pub fn server(server: SessionStoreRef) -> Self {
        Self::new(ExecutionContext::Server, server, None)
    }

    /// Resolver for code running in the browser context, with the server accessor as fallback
    pub fn browser(browser: SessionStoreRef, server: SessionStoreRef) -> Self {
        Self::new(ExecutionContext::Browser, server, Some(browser))
    }

    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    /// Find the access token for the current call.
    ///
    /// The context's own accessor is read first; when it yields no token the
    /// server accessor is read again regardless of context. Failing both,
    /// the call is `Unauthorized` and must not be retried.
    pub async fn resolve(&self) -> AdminResult<String> {
        let primary = match self.context {
            ExecutionContext::Server => &self.server,
            ExecutionContext::Browser => self.browser.as_ref().unwrap_or(&self.server),
        };

        let token = match primary.access_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(context = ?self.context, error = %e, "Failed to read session");
                None
            }
        };
        if let Some(token) = token {
            return Ok(token);
        }

        debug!(context = ?self.context, "No access token found, falling back to server session");
        match self.server.access_token().await {
            Ok(Some(token)) => Ok(token),
            Ok(None) => Err(AdminError::Unauthorized(UNAUTHORIZED_MESSAGE.to_string())),
            Err(e) => Err(AdminError::Unauthorized(format!(
                "{}: {}",
                UNAUTHORIZED_MESSAGE, e
            ))),
        }
    }
}
