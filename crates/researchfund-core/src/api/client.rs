//! API client for the research fund REST server.
//!
//! This module provides the `ApiClient` struct, a thin request layer that
//! attaches the bearer token, unwraps the `{code, message, data}` envelope,
//! and classifies transport failures.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::models::{LoginPayload, RegisterRequest, UserInfoPayload};

use super::{ApiError, Envelope};

// ============================================================================
// Constants
// ============================================================================

const LOGIN_PATH: &str = "/api/user/login";
const INFO_PATH: &str = "/api/user/info";
const LOGOUT_PATH: &str = "/api/user/logout";
const REGISTER_PATH: &str = "/api/user/register";

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// The user endpoints the session manager depends on.
#[async_trait]
pub trait AuthApi: Send + Sync + 'static {
    /// `POST /api/user/login`
    async fn login(&self, username: &str, password: &str) -> Result<LoginPayload, ApiError>;

    /// `GET /api/user/info`
    async fn user_info(&self, token: &str) -> Result<UserInfoPayload, ApiError>;

    /// `POST /api/user/logout`
    async fn logout(&self, token: Option<&str>) -> Result<(), ApiError>;

    /// `POST /api/user/register`
    async fn register(&self, request: &RegisterRequest) -> Result<(), ApiError>;
}

/// API client for the research fund server.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client for `base_url` (scheme and host, no trailing path).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(token: Option<&str>) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ApiError::InvalidResponse(format!("Token is not a valid header: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Turn an HTTP response into an envelope, mapping error statuses first.
    /// Error bodies are searched for an envelope `message` before falling back
    /// to the raw text.
    async fn read_envelope<T: DeserializeOwned>(
        url: &str,
        response: reqwest::Response,
    ) -> Result<Envelope<T>, ApiError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::from_reqwest(&e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<Envelope<serde_json::Value>>(&body)
                .ok()
                .and_then(|envelope| envelope.message)
                .unwrap_or(body);
            warn!(url = url, status = status.as_u16(), "Request failed");
            return Err(ApiError::from_status(status, &message));
        }

        serde_json::from_str(&body).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse envelope from {}: {}", url, e))
        })
    }

    async fn send<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&B>,
    ) -> Result<Envelope<T>, ApiError> {
        let url = self.url(path);
        debug!(method = %method, url = %url, authenticated = token.is_some(), "API request");

        let mut request = self
            .client
            .request(method, &url)
            .headers(Self::auth_headers(token)?);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Request did not complete");
            ApiError::from_reqwest(&e)
        })?;

        let envelope = Self::read_envelope(&url, response).await?;
        debug!(url = %url, code = envelope.code, "API response");
        Ok(envelope)
    }

    /// `POST` a JSON body to an endpoint and unwrap its envelope.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<Option<T>, ApiError> {
        self.send(Method::POST, path, token, Some(body))
            .await?
            .into_result()
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn login(&self, username: &str, password: &str) -> Result<LoginPayload, ApiError> {
        let body = json!({ "username": username, "password": password });
        self.send::<LoginPayload, _>(Method::POST, LOGIN_PATH, None, Some(&body))
            .await?
            .into_data()
    }

    async fn user_info(&self, token: &str) -> Result<UserInfoPayload, ApiError> {
        self.send::<UserInfoPayload, ()>(Method::GET, INFO_PATH, Some(token), None)
            .await?
            .into_data()
    }

    async fn logout(&self, token: Option<&str>) -> Result<(), ApiError> {
        self.send::<serde_json::Value, ()>(Method::POST, LOGOUT_PATH, token, None)
            .await?
            .into_result()
            .map(|_| ())
    }

    async fn register(&self, request: &RegisterRequest) -> Result<(), ApiError> {
        self.post::<serde_json::Value, _>(REGISTER_PATH, None, request)
            .await
            .map(|_| ())
    }
}
