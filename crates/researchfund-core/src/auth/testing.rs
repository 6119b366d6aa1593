//! In-memory `AuthApi` for session and guard tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::api::{ApiError, AuthApi};
use crate::models::{Department, LoginPayload, RegisterRequest, UserInfoPayload, UserProfile};

pub fn login_payload(roles: &[&str]) -> LoginPayload {
    LoginPayload {
        token: "token-1".to_string(),
        user: UserProfile {
            id: Some(1),
            username: "zhangsan".to_string(),
            real_name: Some("Zhang San".to_string()),
            ..Default::default()
        },
        roles: Some(roles.iter().map(|r| r.to_string()).collect()),
    }
}

pub fn info_payload(real_name: Option<&str>, roles: &[&str]) -> UserInfoPayload {
    UserInfoPayload {
        user: Some(UserProfile {
            id: Some(1),
            username: "zhangsan".to_string(),
            real_name: real_name.map(String::from),
            ..Default::default()
        }),
        roles: Some(roles.iter().map(|r| r.to_string()).collect()),
        permissions: Some(vec!["expense:apply".to_string()]),
        department: Some(Department {
            id: Some(2),
            name: Some("Physics".to_string()),
            ..Default::default()
        }),
    }
}

pub struct FakeApi {
    login: Mutex<Result<LoginPayload, ApiError>>,
    info: Mutex<Result<UserInfoPayload, ApiError>>,
    logout: Result<(), ApiError>,
    info_delay: Option<Duration>,
    last_login_username: Mutex<Option<String>>,
    info_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            login: Mutex::new(Err(ApiError::Rejected("login not configured".to_string()))),
            info: Mutex::new(Err(ApiError::Rejected("info not configured".to_string()))),
            logout: Ok(()),
            info_delay: None,
            last_login_username: Mutex::new(None),
            info_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_login(self, result: Result<LoginPayload, ApiError>) -> Self {
        self.set_login(result);
        self
    }

    pub fn with_info(self, result: Result<UserInfoPayload, ApiError>) -> Self {
        self.set_info(result);
        self
    }

    pub fn with_logout(mut self, result: Result<(), ApiError>) -> Self {
        self.logout = result;
        self
    }

    pub fn with_info_delay(mut self, delay: Duration) -> Self {
        self.info_delay = Some(delay);
        self
    }

    pub fn set_login(&self, result: Result<LoginPayload, ApiError>) {
        *self.login.lock().unwrap() = result;
    }

    pub fn set_info(&self, result: Result<UserInfoPayload, ApiError>) {
        *self.info.lock().unwrap() = result;
    }

    pub fn last_login_username(&self) -> Option<String> {
        self.last_login_username.lock().unwrap().clone()
    }

    pub fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthApi for FakeApi {
    async fn login(&self, username: &str, _password: &str) -> Result<LoginPayload, ApiError> {
        *self.last_login_username.lock().unwrap() = Some(username.to_string());
        self.login.lock().unwrap().clone()
    }

    async fn user_info(&self, _token: &str) -> Result<UserInfoPayload, ApiError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.info_delay {
            tokio::time::sleep(delay).await;
        }
        self.info.lock().unwrap().clone()
    }

    async fn logout(&self, _token: Option<&str>) -> Result<(), ApiError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.logout.clone()
    }

    async fn register(&self, _request: &RegisterRequest) -> Result<(), ApiError> {
        Ok(())
    }
}
