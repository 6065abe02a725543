//! Session management for the admin client
//!
//! A `Session` is the client-held record of the signed-in administrator: identity,
//! roles and the access/refresh token pair. Sessions live in a `SessionStore`;
//! the dispatcher never holds one across calls, it reads the current session from
//! a store every time it needs a token.

pub mod adapters;
pub mod store;

pub use adapters::{FileSessionStore, InMemorySessionStore};
pub use store::{ProfileChanges, Session, SessionStore, SessionStoreError, SessionStoreRef};
