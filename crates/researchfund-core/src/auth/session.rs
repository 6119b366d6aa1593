use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::{ApiError, AuthApi};
use crate::models::{RegisterRequest, SessionInfo};
use crate::routes::LOGIN_PATH;

use super::credentials::CredentialStore;
use super::timer::{ExpiryTimer, TOKEN_EXPIRY};

/// Buffer size for the session event channel.
/// Events are rare (one per expiry or rejected token), 32 leaves headroom.
const CHANNEL_BUFFER_SIZE: usize = 32;

pub const EXPIRY_NOTICE: &str = "Your session has expired, please log in again";

/// Where the in-memory identity stands relative to the stored token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No identity loaded. A token may still exist (e.g. after a restart).
    Anonymous,
    /// An info request is in flight.
    Hydrating,
    Hydrated,
    /// The expiry timer fired. Cleared by the next login.
    Expired,
}

/// Notifications that require the front end to act immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The expiry timer fired; show `notice` and go to `redirect`.
    Expired { notice: String, redirect: String },
    /// A call was rejected with 401; the token has been discarded.
    Unauthorized { message: String, redirect: String },
}

#[derive(Debug)]
struct SessionState {
    phase: SessionPhase,
    info: SessionInfo,
    authenticated_at: Option<DateTime<Utc>>,
    /// Bumped whenever the identity is replaced or discarded, so responses
    /// started under an older session can be recognised and dropped.
    epoch: u64,
}

impl SessionState {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Anonymous,
            info: SessionInfo::default(),
            authenticated_at: None,
            epoch: 0,
        }
    }

    fn reset(&mut self, phase: SessionPhase) {
        self.phase = phase;
        self.info = SessionInfo::default();
        self.authenticated_at = None;
        self.epoch += 1;
    }
}

struct Inner<A> {
    api: A,
    credentials: CredentialStore,
    state: Mutex<SessionState>,
    /// Serializes hydration so concurrent navigations issue one info call.
    hydration: tokio::sync::Mutex<()>,
    timer: ExpiryTimer,
    events: mpsc::Sender<SessionEvent>,
}

/// Owns the token, the in-memory identity, and the expiry timer.
///
/// Constructed once per process and shared by handle; clones refer to the
/// same session.
pub struct SessionManager<A: AuthApi> {
    inner: Arc<Inner<A>>,
}

impl<A: AuthApi> Clone for SessionManager<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: AuthApi> SessionManager<A> {
    pub fn new(api: A, credentials: CredentialStore) -> (Self, mpsc::Receiver<SessionEvent>) {
        Self::with_expiry(api, credentials, TOKEN_EXPIRY)
    }

    pub fn with_expiry(
        api: A,
        credentials: CredentialStore,
        expiry: Duration,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let inner = Inner {
            api,
            credentials,
            state: Mutex::new(SessionState::new()),
            hydration: tokio::sync::Mutex::new(()),
            timer: ExpiryTimer::new(expiry),
            events: tx,
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn api(&self) -> &A {
        &self.inner.api
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Restart the expiry countdown if a token survived from a previous run.
    /// The countdown is a full duration from now, not from the original login.
    pub fn check_existing_and_start(&self) -> bool {
        if self.inner.credentials.has_token() {
            info!("Found stored token, starting expiry timer");
            self.start_timer();
            true
        } else {
            false
        }
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<(), ApiError> {
        let username = username.trim();

        // Nothing to invalidate yet, so 401/403 here are plain refusals
        let payload = self
            .inner
            .api
            .login(username, password)
            .await
            .map_err(|e| match e {
                ApiError::Unauthorized(message) | ApiError::Forbidden(message) => {
                    ApiError::Rejected(message)
                }
                other => other,
            })
            .inspect_err(|e| warn!(error = %e, "Login failed"))?;

        if payload.token.is_empty() {
            return Err(ApiError::InvalidResponse(
                "Login response did not include a token".to_string(),
            ));
        }

        self.inner
            .credentials
            .set_token(&payload.token)
            .map_err(|e| ApiError::Storage(format!("{:#}", e)))?;

        let info = SessionInfo::from_login(&payload);
        info!(user = %info.display_name, admin = info.is_admin(), "Login successful");
        {
            let mut state = self.state();
            state.reset(SessionPhase::Hydrated);
            state.info = info;
            state.authenticated_at = Some(Utc::now());
        }

        let remembered = if remember_me {
            self.inner.credentials.remember_username(username)
        } else {
            self.inner.credentials.forget_username()
        };
        if let Err(e) = remembered {
            warn!(error = %e, "Failed to update remembered username");
        }

        self.start_timer();
        Ok(())
    }

    /// Load the identity from the info endpoint and make it current.
    ///
    /// Errors leave the identity untouched, except 401 which discards the
    /// session. A response (success or failure) that arrives after the
    /// session was replaced or discarded is dropped and reported as
    /// `ApiError::Superseded`.
    pub async fn fetch_session_info(&self) -> Result<SessionInfo, ApiError> {
        let Some(token) = self.inner.credentials.token() else {
            return Err(ApiError::Unauthorized("No session token".to_string()));
        };
        let epoch = self.state().epoch;

        let result = self.inner.api.user_info(&token).await;

        let mut state = self.state();
        if state.epoch != epoch {
            debug!(ok = result.is_ok(), "Dropping user info response from a superseded session");
            return Err(ApiError::Superseded);
        }

        match result {
            Ok(payload) => {
                let info = SessionInfo::from_user_info(&payload);
                state.info = info.clone();
                state.phase = SessionPhase::Hydrated;
                if state.authenticated_at.is_none() {
                    state.authenticated_at = Some(Utc::now());
                }
                debug!(user = %info.display_name, roles = info.roles.len(), "Session hydrated");
                Ok(info)
            }
            Err(ApiError::Unauthorized(message)) => {
                // Reset under the same lock as the epoch check
                state.reset(SessionPhase::Anonymous);
                drop(state);
                Err(self.reject_token(message))
            }
            Err(e) => Err(e),
        }
    }

    /// Hydrate unless already hydrated. Concurrent callers share one request:
    /// later callers wait for the first and then see its result.
    ///
    /// If the session changes while the request is in flight, a newer
    /// session that is already hydrated counts as success; otherwise the
    /// caller gets `ApiError::Superseded` and nothing is discarded.
    pub async fn ensure_hydrated(&self) -> Result<(), ApiError> {
        let _hydrating = self.inner.hydration.lock().await;

        let epoch = {
            let mut state = self.state();
            if state.phase == SessionPhase::Hydrated {
                return Ok(());
            }
            state.phase = SessionPhase::Hydrating;
            state.epoch
        };

        match self.fetch_session_info().await {
            Ok(_) => Ok(()),
            Err(ApiError::Superseded) if self.phase() == SessionPhase::Hydrated => Ok(()),
            Err(e) => {
                let mut state = self.state();
                if state.epoch == epoch && state.phase == SessionPhase::Hydrating {
                    state.phase = SessionPhase::Anonymous;
                }
                Err(e)
            }
        }
    }

    /// Log out on the server, then locally. The local part always happens.
    pub async fn logout(&self) {
        let token = self.inner.credentials.token();
        if let Err(e) = self.inner.api.logout(token.as_deref()).await {
            warn!(error = %e, "Server logout failed, clearing local session anyway");
        }
        self.clear_local(SessionPhase::Anonymous);
        info!("Logged out");
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<(), ApiError> {
        self.inner.api.register(request).await
    }

    /// Drop the token and identity without contacting the server.
    pub fn discard(&self) {
        self.clear_local(SessionPhase::Anonymous);
    }

    /// The 401 rule: drop the token, stop the countdown, and tell the front
    /// end to go to login. Session state must already be reset.
    fn reject_token(&self, message: String) -> ApiError {
        warn!(%message, "Token rejected, discarding session");
        if let Err(e) = self.inner.credentials.clear_token() {
            warn!(error = %e, "Failed to clear stored token");
        }
        self.inner.timer.cancel();
        self.emit(SessionEvent::Unauthorized {
            message: message.clone(),
            redirect: LOGIN_PATH.to_string(),
        });
        ApiError::Unauthorized(message)
    }

    /// Make the identity agree with the store: a token removed behind our
    /// back (another process, expiry) drops the identity, and a token that
    /// appeared after expiry allows hydration again. Returns token presence.
    pub fn sync_with_store(&self) -> bool {
        let has_token = self.inner.credentials.has_token();
        let mut state = self.state();
        match (has_token, state.phase) {
            (false, SessionPhase::Hydrated | SessionPhase::Hydrating) => {
                debug!("Token disappeared from storage, dropping identity");
                state.reset(SessionPhase::Anonymous);
                drop(state);
                self.inner.timer.cancel();
            }
            (true, SessionPhase::Expired) => {
                state.phase = SessionPhase::Anonymous;
            }
            _ => {}
        }
        has_token
    }

    fn clear_local(&self, phase: SessionPhase) {
        self.state().reset(phase);
        if let Err(e) = self.inner.credentials.clear_token() {
            warn!(error = %e, "Failed to clear stored token");
        }
        self.inner.timer.cancel();
    }

    fn emit(&self, event: SessionEvent) {
        if let Err(e) = self.inner.events.try_send(event) {
            warn!(error = %e, "Dropped session event");
        }
    }

    // ========================================================================
    // Expiry
    // ========================================================================

    fn start_timer(&self) {
        let weak: Weak<Inner<A>> = Arc::downgrade(&self.inner);
        self.inner.timer.start(async move {
            if let Some(inner) = weak.upgrade() {
                SessionManager { inner }.expire();
            }
        });
    }

    fn expire(&self) {
        warn!("Session expired, forcing logout");
        if let Err(e) = self.inner.credentials.clear_token() {
            warn!(error = %e, "Failed to clear stored token on expiry");
        }
        self.state().reset(SessionPhase::Expired);
        self.emit(SessionEvent::Expired {
            notice: EXPIRY_NOTICE.to_string(),
            redirect: LOGIN_PATH.to_string(),
        });
    }

    /// Time left before forced logout, if the countdown is running.
    pub fn expires_in(&self) -> Option<Duration> {
        self.inner.timer.remaining()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn phase(&self) -> SessionPhase {
        self.state().phase
    }

    pub fn session_info(&self) -> SessionInfo {
        self.state().info.clone()
    }

    pub fn authenticated_at(&self) -> Option<DateTime<Utc>> {
        self.state().authenticated_at
    }

    pub fn token(&self) -> Option<String> {
        self.inner.credentials.token()
    }

    pub fn has_token(&self) -> bool {
        self.inner.credentials.has_token()
    }

    pub fn is_admin(&self) -> bool {
        self.state().info.is_admin()
    }

    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        self.state().info.has_any_role(roles)
    }

    pub fn remembered_username(&self) -> Option<String> {
        self.inner.credentials.remembered_username()
    }
}
