use tracing::{debug, warn};

use crate::api::{ApiError, AuthApi};
use crate::auth::{SessionManager, SessionPhase};

use super::table::{normalize_path, Route, RouteTable};
use super::{LANDING_PATH, LOGIN_PATH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    /// Login or register requested while holding a token.
    AlreadyAuthenticated,
    /// Protected page requested without a token, or the session ended
    /// while its user info was loading.
    LoginRequired,
    /// The identity could not be loaded; the token was discarded.
    SessionInvalid,
    /// The page requires a role the user does not hold.
    MissingRole,
}

/// Outcome of one navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Proceed {
        path: String,
        route: Route,
        title: String,
    },
    Redirect {
        to: String,
        reason: RedirectReason,
    },
}

impl Navigation {
    fn redirect(to: &str, reason: RedirectReason) -> Self {
        Navigation::Redirect {
            to: to.to_string(),
            reason,
        }
    }

    /// Path the client ends up on.
    pub fn target(&self) -> &str {
        match self {
            Navigation::Proceed { path, .. } => path,
            Navigation::Redirect { to, .. } => to,
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, Navigation::Redirect { .. })
    }
}

/// Checks authentication and roles before every route change.
///
/// Nothing is cached between calls: the token store is re-read and the
/// route's roles re-checked on every navigation.
pub struct NavigationGuard<A: AuthApi> {
    session: SessionManager<A>,
    routes: RouteTable,
}

impl<A: AuthApi> NavigationGuard<A> {
    pub fn new(session: SessionManager<A>, routes: RouteTable) -> Self {
        Self { session, routes }
    }

    pub fn session(&self) -> &SessionManager<A> {
        &self.session
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub async fn navigate(&self, target: &str) -> Navigation {
        let has_token = self.session.sync_with_store();

        let mut path = normalize_path(target);
        if path == "/" {
            path = if has_token { LANDING_PATH } else { LOGIN_PATH }.to_string();
        }
        let route = self.routes.resolve(&path);

        if route.public && has_token {
            debug!(path = %path, "Already logged in, redirecting to landing page");
            return Navigation::redirect(LANDING_PATH, RedirectReason::AlreadyAuthenticated);
        }
        if !route.public && !has_token {
            debug!(path = %path, "No token, redirecting to login");
            return Navigation::redirect(LOGIN_PATH, RedirectReason::LoginRequired);
        }

        if !route.public {
            if self.session.phase() != SessionPhase::Hydrated {
                match self.session.ensure_hydrated().await {
                    Ok(()) => {}
                    Err(ApiError::Superseded) => {
                        // Logged out or replaced mid-request; the current
                        // session is not ours to discard
                        debug!(path = %path, "Session changed while loading user info");
                        return Navigation::redirect(LOGIN_PATH, RedirectReason::LoginRequired);
                    }
                    Err(e) => {
                        warn!(error = %e, path = %path, "Failed to load user info, discarding session");
                        self.session.discard();
                        return Navigation::redirect(LOGIN_PATH, RedirectReason::SessionInvalid);
                    }
                }
            }

            if !route.permits(&self.session.session_info()) {
                debug!(path = %path, required = ?route.roles, "Missing role, redirecting to landing page");
                return Navigation::redirect(LANDING_PATH, RedirectReason::MissingRole);
            }
        }

        debug!(path = %path, route = %route.name, "Navigation allowed");
        Navigation::Proceed {
            title: route.page_title(),
            route: route.clone(),
            path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, TransportError};
    use crate::auth::testing::{info_payload, login_payload, FakeApi};
    use crate::auth::{CredentialStore, SessionEvent};
    use crate::models::{ADMIN_ROLE, RESEARCHER_ROLE};
    use crate::routes::REGISTER_PATH;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn guard(api: FakeApi) -> (NavigationGuard<FakeApi>, mpsc::Receiver<SessionEvent>) {
        let (session, events) = SessionManager::new(api, CredentialStore::in_memory());
        (NavigationGuard::new(session, RouteTable::default()), events)
    }

    async fn logged_in(roles: &[&str]) -> NavigationGuard<FakeApi> {
        let (guard, _events) = guard(FakeApi::new().with_login(Ok(login_payload(roles))));
        guard.session().login("zhangsan", "pw", false).await.unwrap();
        guard
    }

    #[tokio::test]
    async fn test_no_token_redirects_to_login() {
        let (guard, _events) = guard(FakeApi::new());
        for path in ["/dashboard", "/project/detail/3", "/system/user", "/nowhere"] {
            assert_eq!(
                guard.navigate(path).await,
                Navigation::redirect(LOGIN_PATH, RedirectReason::LoginRequired),
                "{}",
                path
            );
        }
        assert_eq!(guard.session().api().info_calls(), 0);
    }

    #[tokio::test]
    async fn test_public_routes_without_token() {
        let (guard, _events) = guard(FakeApi::new());
        let nav = guard.navigate(LOGIN_PATH).await;
        assert!(!nav.is_redirect());
        assert_eq!(nav.target(), LOGIN_PATH);
        assert_eq!(guard.navigate(REGISTER_PATH).await.target(), REGISTER_PATH);
    }

    #[tokio::test]
    async fn test_token_on_login_redirects_to_landing() {
        let guard = logged_in(&[RESEARCHER_ROLE]).await;
        assert_eq!(
            guard.navigate("/login?redirect=/x").await,
            Navigation::redirect(LANDING_PATH, RedirectReason::AlreadyAuthenticated)
        );
        assert_eq!(
            guard.navigate(REGISTER_PATH).await,
            Navigation::redirect(LANDING_PATH, RedirectReason::AlreadyAuthenticated)
        );
    }

    #[tokio::test]
    async fn test_root_resolves_by_token() {
        let (anonymous, _events) = guard(FakeApi::new());
        let nav = anonymous.navigate("/").await;
        assert!(!nav.is_redirect());
        assert_eq!(nav.target(), LOGIN_PATH);

        let guard = logged_in(&[]).await;
        let nav = guard.navigate("/").await;
        assert!(!nav.is_redirect());
        assert_eq!(nav.target(), LANDING_PATH);
    }

    #[tokio::test]
    async fn test_role_gating() {
        let researcher = logged_in(&[RESEARCHER_ROLE]).await;
        assert_eq!(
            researcher.navigate("/system/user").await,
            Navigation::redirect(LANDING_PATH, RedirectReason::MissingRole)
        );
        assert!(!researcher.navigate("/expense/apply/list").await.is_redirect());

        let admin = logged_in(&[ADMIN_ROLE]).await;
        match admin.navigate("/system/user").await {
            Navigation::Proceed { path, route, title } => {
                assert_eq!(path, "/system/user");
                assert_eq!(route.name, "UserManagement");
                assert_eq!(title, "User Management - Research Fund Management System");
            }
            other => panic!("expected to proceed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_boot_with_token_hydrates_once() {
        let api = FakeApi::new().with_info(Ok(info_payload(Some("Zhang San"), &[ADMIN_ROLE])));
        let (guard, _events) = guard(api);
        guard.session().credentials().set_token("stored").unwrap();

        let nav = guard.navigate("/dashboard").await;

        assert!(!nav.is_redirect());
        assert_eq!(guard.session().session_info().display_name, "Zhang San");
        assert!(guard.session().is_admin());

        assert!(!guard.navigate("/task/list").await.is_redirect());
        assert_eq!(guard.session().api().info_calls(), 1);
    }

    #[tokio::test]
    async fn test_hydration_failure_clears_token() {
        let api = FakeApi::new().with_info(Err(TransportError::Network("down".to_string()).into()));
        let (guard, _events) = guard(api);
        guard.session().credentials().set_token("stored").unwrap();

        assert_eq!(
            guard.navigate("/dashboard").await,
            Navigation::redirect(LOGIN_PATH, RedirectReason::SessionInvalid)
        );
        assert!(!guard.session().has_token());

        let nav = guard.navigate(LOGIN_PATH).await;
        assert!(!nav.is_redirect());
    }

    #[tokio::test]
    async fn test_unauthorized_hydration_emits_event() {
        let api = FakeApi::new().with_info(Err(ApiError::Unauthorized("expired".to_string())));
        let (guard, mut events) = guard(api);
        guard.session().credentials().set_token("stale").unwrap();

        assert_eq!(guard.navigate("/profile").await.target(), LOGIN_PATH);
        assert!(!guard.session().has_token());
        assert!(matches!(events.try_recv(), Ok(SessionEvent::Unauthorized { .. })));
    }

    #[tokio::test]
    async fn test_role_check_after_hydration() {
        let api = FakeApi::new().with_info(Ok(info_payload(None, &[RESEARCHER_ROLE])));
        let (guard, _events) = guard(api);
        guard.session().credentials().set_token("stored").unwrap();

        assert_eq!(
            guard.navigate("/task/list").await,
            Navigation::redirect(LANDING_PATH, RedirectReason::MissingRole)
        );
        assert_eq!(guard.session().session_info().display_name, "zhangsan");
    }

    #[tokio::test]
    async fn test_logout_then_navigate() {
        let guard = logged_in(&[ADMIN_ROLE]).await;
        guard.session().logout().await;
        assert_eq!(
            guard.navigate("/dashboard").await,
            Navigation::redirect(LOGIN_PATH, RedirectReason::LoginRequired)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_hydration_from_old_session_keeps_new_login() {
        let api = FakeApi::new()
            .with_login(Ok(login_payload(&[ADMIN_ROLE])))
            .with_info(Err(TransportError::Network("down".to_string()).into()))
            .with_info_delay(Duration::from_millis(50));
        let (guard, mut events) = guard(api);
        let guard = Arc::new(guard);
        guard.session().credentials().set_token("old").unwrap();

        let navigating = Arc::clone(&guard);
        let pending = tokio::spawn(async move { navigating.navigate("/dashboard").await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        guard.session().logout().await;
        guard.session().login("zhangsan", "pw", false).await.unwrap();

        let nav = pending.await.unwrap();
        assert!(!nav.is_redirect(), "{:?}", nav);
        assert_eq!(nav.target(), LANDING_PATH);
        assert_eq!(guard.session().token().as_deref(), Some("token-1"));
        assert_eq!(guard.session().phase(), SessionPhase::Hydrated);
        assert_eq!(guard.session().session_info().display_name, "Zhang San");
        assert!(guard.session().expires_in().is_some());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_during_hydration_redirects_without_discarding() {
        let api = FakeApi::new()
            .with_info(Ok(info_payload(Some("Zhang San"), &[ADMIN_ROLE])))
            .with_info_delay(Duration::from_millis(50));
        let (guard, _events) = guard(api);
        let guard = Arc::new(guard);
        guard.session().credentials().set_token("old").unwrap();

        let navigating = Arc::clone(&guard);
        let pending = tokio::spawn(async move { navigating.navigate("/dashboard").await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        guard.session().logout().await;

        assert_eq!(
            pending.await.unwrap(),
            Navigation::redirect(LOGIN_PATH, RedirectReason::LoginRequired)
        );
        assert_eq!(guard.session().phase(), SessionPhase::Anonymous);
        assert_eq!(guard.session().session_info().display_name, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_session_lands_on_login() {
        let guard = logged_in(&[ADMIN_ROLE]).await;
        tokio::time::sleep(crate::auth::TOKEN_EXPIRY + Duration::from_millis(1)).await;

        assert_eq!(guard.session().phase(), SessionPhase::Expired);
        assert_eq!(
            guard.navigate("/dashboard").await,
            Navigation::redirect(LOGIN_PATH, RedirectReason::LoginRequired)
        );
        assert!(!guard.navigate(LOGIN_PATH).await.is_redirect());
    }
}
