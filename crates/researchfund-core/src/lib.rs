//! Session core for the research fund management client.
//!
//! The client's pages are plain views over REST endpoints; what it does own
//! is the session lifecycle. This crate provides:
//!
//! - `api`: the HTTP session client and the `{code, message, data}` envelope
//! - `auth`: credential persistence, the forced-expiry timer, and the
//!   `SessionManager` that ties login, logout, and hydration together
//! - `routes`: the route table and the `NavigationGuard`
//! - `config`: on-disk client configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod routes;

pub use api::{ApiClient, ApiError, AuthApi, TransportError};
pub use auth::{CredentialStore, SessionEvent, SessionManager, SessionPhase};
pub use config::{Config, CredentialBackend};
pub use models::SessionInfo;
pub use routes::{Navigation, NavigationGuard, RouteTable};
