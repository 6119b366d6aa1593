//! Client routes and the navigation guard.
//!
//! `RouteTable` maps paths to pages and their required roles;
//! `NavigationGuard` decides, for every attempted navigation, whether to
//! proceed or where to redirect.

pub mod guard;
pub mod table;

pub use guard::{Navigation, NavigationGuard, RedirectReason};
pub use table::{normalize_path, Route, RouteDef, RouteTable, DEFAULT_ROUTES};

pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";

/// Where authenticated users land by default.
pub const LANDING_PATH: &str = "/dashboard";

pub const APP_TITLE: &str = "Research Fund Management System";
