// Admin client for the LMS backend:
// - Session storage and token resolution
// - Credential exchange against the sign-in endpoint
// - Authenticated request dispatch and the response envelope
// - Typed admin endpoints
// - Configuration loading
// - Shared error types

// Export session module - Session record and storage adapters
pub mod session;
pub use session::*;

// Export token module - Bearer token resolution per execution context
pub mod token;
pub use token::*;

// Export envelope module - Uniform response envelope
pub mod envelope;
pub use envelope::*;

// Export dispatcher module - HTTP request pipeline
pub mod dispatcher;
pub use dispatcher::*;

// Export credentials module - Email/password sign-in
pub mod credentials;
pub use credentials::*;

// Export admin module - Admin endpoint bindings
pub mod admin;
pub use admin::*;

// Export types module - Backend records and request payloads
pub mod types;
pub use types::*;

pub mod password;
pub use password::{generate_strong_password, validate_password, PasswordIssue};

// Export config module - Configuration loading
pub mod config;
pub use self::config::*;

// Export errors module - Shared error types
pub mod errors;
pub use errors::*;

#[cfg(test)]
mod test_support;
