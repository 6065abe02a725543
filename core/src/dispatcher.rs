use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::Form;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::envelope::ApiEnvelope;
use crate::errors::{AdminError, AdminResult};
use crate::token::TokenResolver;

/// Status reported on synthesized envelopes when no HTTP response exists
pub const NO_RESPONSE_STATUS: u16 = 0;

/// How outbound requests are authenticated
#[derive(Debug, Clone)]
pub enum RequestAuth {
    /// Attach `Authorization: Bearer <token>` resolved per call
    Bearer(TokenResolver),
    /// Send requests without credentials (sign-in, sign-up)
    Anonymous,
}

/// Query parameters, kept in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter; numbers and strings are both written in their display form
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.push((key.into(), value.to_string()));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.push(key, value);
        }
        params
    }
}

/// Per-call header overrides
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    headers: HeaderMap,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header override, rejecting names or values HTTP cannot carry
    pub fn header(mut self, name: &str, value: &str) -> AdminResult<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AdminError::Request(format!("Invalid header name {:?}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| AdminError::Request(format!("Invalid value for header {}: {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

enum Payload {
    Empty,
    Json(Vec<u8>),
    Multipart(Form),
    Unserializable(String),
}

impl Payload {
    fn json<D: Serialize + ?Sized>(data: &D) -> Self {
        match serde_json::to_vec(data) {
            Ok(bytes) => Payload::Json(bytes),
            Err(e) => Payload::Unserializable(e.to_string()),
        }
    }
}

/// Issues HTTP calls against the backend and normalizes every answer into an
/// `ApiEnvelope`.
///
/// The dispatcher keeps no state between calls: the token is resolved fresh
/// for each request and nothing is retried or cached.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Client,
    base_url: String,
    auth: RequestAuth,
}

impl Dispatcher {
    /// Create a dispatcher with its own HTTP client
    pub fn new(base_url: impl Into<String>, auth: RequestAuth) -> Self {
        Self::with_client(Client::new(), base_url, auth)
    }

    /// Create a dispatcher that shares an existing HTTP client
    pub fn with_client(client: Client, base_url: impl Into<String>, auth: RequestAuth) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            auth,
        }
    }

    /// Dispatcher that attaches a bearer token to every call
    pub fn authenticated(base_url: impl Into<String>, resolver: TokenResolver) -> Self {
        Self::new(base_url, RequestAuth::Bearer(resolver))
    }

    /// Dispatcher that sends no credentials
    pub fn anonymous(base_url: impl Into<String>) -> Self {
        Self::new(base_url, RequestAuth::Anonymous)
    }

    /// A dispatcher for the same backend and HTTP client with different authentication
    pub fn with_auth(&self, auth: RequestAuth) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            auth,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.auth, RequestAuth::Bearer(_))
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&QueryParams>,
    ) -> AdminResult<ApiEnvelope<T>> {
        self.dispatch(Method::GET, path, query, Payload::Empty, None)
            .await
    }

    pub async fn post<T: DeserializeOwned, D: Serialize + ?Sized>(
        &self,
        path: &str,
        data: &D,
        options: Option<&RequestOptions>,
    ) -> AdminResult<ApiEnvelope<T>> {
        self.dispatch(Method::POST, path, None, Payload::json(data), options)
            .await
    }

    pub async fn put<T: DeserializeOwned, D: Serialize + ?Sized>(
        &self,
        path: &str,
        data: &D,
        options: Option<&RequestOptions>,
    ) -> AdminResult<ApiEnvelope<T>> {
        self.dispatch(Method::PUT, path, None, Payload::json(data), options)
            .await
    }

    pub async fn patch<T: DeserializeOwned, D: Serialize + ?Sized>(
        &self,
        path: &str,
        data: &D,
        options: Option<&RequestOptions>,
    ) -> AdminResult<ApiEnvelope<T>> {
        self.dispatch(Method::PATCH, path, None, Payload::json(data), options)
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> AdminResult<ApiEnvelope<T>> {
        self.dispatch(Method::DELETE, path, None, Payload::Empty, None)
            .await
    }

    /// POST a multipart form. No content-type is set here so the transport
    /// can add its boundary-aware value.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
        options: Option<&RequestOptions>,
    ) -> AdminResult<ApiEnvelope<T>> {
        self.dispatch(Method::POST, path, None, Payload::Multipart(form), options)
            .await
    }

    async fn bearer_token(&self) -> AdminResult<Option<String>> {
        match &self.auth {
            RequestAuth::Bearer(resolver) => resolver.resolve().await.map(Some),
            RequestAuth::Anonymous => Ok(None),
        }
    }

    #[instrument(skip(self, query, payload, options), fields(base_url = %self.base_url))]
    async fn dispatch<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: Option<&QueryParams>,
        payload: Payload,
        options: Option<&RequestOptions>,
    ) -> AdminResult<ApiEnvelope<T>> {
        // Resolve the token before anything touches the network
        let token = self.bearer_token().await?;

        if let Payload::Unserializable(e) = &payload {
            return Ok(ApiEnvelope::failure(
                format!("Failed to serialize request body: {}", e),
                NO_RESPONSE_STATUS,
            ));
        }

        let multipart = matches!(payload, Payload::Multipart(_));
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(options) = options {
            headers.extend(options.headers().clone());
        }
        if multipart {
            headers.remove(CONTENT_TYPE);
        }
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                AdminError::Unauthorized("Access token is not a valid header value".to_string())
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method.clone(), &url).headers(headers);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            request = request.query(query.pairs());
        }
        request = match payload {
            Payload::Json(bytes) => request.body(bytes),
            Payload::Multipart(form) => request.multipart(form),
            Payload::Empty | Payload::Unserializable(_) => request,
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(%method, path, error = %e, "Request failed before a response arrived");
                let status = e
                    .status()
                    .map(|s| s.as_u16())
                    .unwrap_or(NO_RESPONSE_STATUS);
                return Ok(ApiEnvelope::failure(e.to_string(), status));
            }
        };

        let status = response.status().as_u16();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                warn!(%method, path, status, error = %e, "Failed to read response body");
                return Ok(ApiEnvelope::failure(e.to_string(), status));
            }
        };

        let envelope = ApiEnvelope::from_body(status, &body);
        if envelope.success {
            debug!(%method, path, status, "Request succeeded");
        } else {
            debug!(%method, path, status, message = %envelope.message, "Backend reported failure");
        }
        Ok(envelope)
    }
}
