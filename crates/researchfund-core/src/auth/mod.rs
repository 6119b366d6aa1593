//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `CredentialStore`: token and remembered-username persistence over a
//!   `KeyValueStore` (JSON file, OS keychain, or memory)
//! - `ExpiryTimer`: the single forced-logout countdown
//! - `SessionManager`: login, logout, hydration, and the 401 rule
//!
//! Sessions are force-expired 10 minutes after login, regardless of activity.

pub mod credentials;
pub mod session;
pub mod timer;

#[cfg(test)]
pub(crate) mod testing;

pub use credentials::{CredentialStore, FileStore, KeyValueStore, KeyringStore, MemoryStore};
pub use session::{SessionEvent, SessionManager, SessionPhase, EXPIRY_NOTICE};
pub use timer::{ExpiryTimer, TOKEN_EXPIRY};
