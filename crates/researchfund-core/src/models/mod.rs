//! Data models for the research fund session layer.
//!
//! This module contains the structures exchanged with the user endpoints
//! and the in-memory identity snapshot derived from them:
//!
//! - `UserProfile`, `Department`: account records as the server returns them
//! - `LoginPayload`, `UserInfoPayload`: `data` bodies of the login and info envelopes
//! - `RegisterRequest`: self-service account creation
//! - `SessionInfo`: the authenticated identity held by the session manager

pub mod session;
pub mod user;

pub use session::{SessionInfo, ADMIN_ROLE, RESEARCHER_ROLE};
pub use user::{Department, LoginPayload, RegisterRequest, UserInfoPayload, UserProfile};
