//! Credential handling for outgoing fetches.
//!
//! This module provides:
//! - `CredentialSource`: where the sync layer reads the bearer token from
//! - `Session`: in-memory session issued by the auth provider, with expiry
//! - `StaticToken`: a fixed (or absent) token for service use and tests
//!
//! Tokens are never written to disk.

pub mod credentials;
pub mod session;

pub use credentials::{CredentialSource, StaticToken};
pub use session::{Session, SessionData};
