//! REST API client module for the research fund server.
//!
//! This module provides the `ApiClient` for the user endpoints the session
//! layer depends on (login, info, logout, register) and the `AuthApi` trait
//! the session manager calls them through.
//!
//! Every endpoint wraps its result in an `Envelope` of `{code, message, data}`;
//! a `code` of 200 is success. Authentication is by bearer token.

pub mod client;
pub mod envelope;
pub mod error;

pub use client::{ApiClient, AuthApi};
pub use envelope::Envelope;
pub use error::{ApiError, TransportError};
