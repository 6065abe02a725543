use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::{AdminError, AdminResult};

/// Message the backend uses when it rejects a bearer token outright
const NOT_AUTHORIZED_MESSAGE: &str = "Not Authorized";

/// One entry of the envelope's `errors` list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Pagination block attached to list responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub count: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

/// Uniform wrapper returned by every backend endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub message: String,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ApiErrorDetail>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_data: Option<ResponseMetadata>,
}

/// Envelope as it arrives on the wire, before the HTTP status is folded in
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope<T> {
    success: bool,
    message: Option<String>,
    status_code: Option<u16>,
    data: Option<T>,
    errors: Option<Vec<ApiErrorDetail>>,
    meta_data: Option<ResponseMetadata>,
}

impl<T> ApiEnvelope<T> {
    /// Synthesize a failure envelope for a call that produced no usable body
    pub fn failure(message: impl Into<String>, status_code: u16) -> Self {
        Self {
            success: false,
            message: message.into(),
            status_code,
            data: None,
            errors: None,
            meta_data: None,
        }
    }

    /// Parse a response body into an envelope.
    ///
    /// Never fails: a body that is not a valid envelope becomes a failure
    /// envelope carrying the parse error text and the HTTP status.
    pub fn from_body(http_status: u16, body: &[u8]) -> Self
    where
        T: DeserializeOwned,
    {
        match serde_json::from_slice::<WireEnvelope<T>>(body) {
            Ok(wire) => Self {
                success: wire.success,
                message: wire.message.unwrap_or_default(),
                status_code: wire.status_code.unwrap_or(http_status),
                data: wire.data,
                errors: wire.errors,
                meta_data: wire.meta_data,
            },
            Err(e) => Self::failure(e.to_string(), http_status),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// Total number of records reported by the pagination block
    pub fn total_count(&self) -> Option<u64> {
        self.meta_data.map(|meta| meta.count)
    }

    /// Whether the backend refused the bearer token
    pub fn is_not_authorized(&self) -> bool {
        matches!(self.status_code, 401 | 403) || self.message == NOT_AUTHORIZED_MESSAGE
    }

    /// Convert into the payload, treating a failure or a missing payload as an error
    pub fn into_data(self) -> AdminResult<T> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(AdminError::Api {
                status_code: self.status_code,
                message: self.message,
            }),
        }
    }

    /// Check for success on endpoints that carry no payload
    pub fn ensure_success(self) -> AdminResult<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(AdminError::Api {
                status_code: self.status_code,
                message: self.message,
            })
        }
    }
}
