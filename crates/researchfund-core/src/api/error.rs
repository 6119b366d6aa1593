use thiserror::Error;

/// Failure of a call that never produced a usable envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The server answered, but with an error status and body.
    #[error("Server responded with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// No response at all (connection refused, DNS, reset).
    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The server explicitly refused the request (bad credentials, business rule).
    #[error("{0}")]
    Rejected(String),

    #[error("Unauthorized - session is invalid or expired: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The credential store could not be written.
    #[error("Credential storage error: {0}")]
    Storage(String),

    /// The session was replaced or ended while the request was in flight.
    /// The response was dropped without touching session state.
    #[error("Session changed while the request was in flight")]
    Superseded,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Map an HTTP error status to the error taxonomy. `message` is the
    /// envelope message when the body carried one, else the raw body.
    pub fn from_status(status: reqwest::StatusCode, message: &str) -> Self {
        let truncated = Self::truncate_body(message);
        match status.as_u16() {
            401 => ApiError::Unauthorized(truncated),
            403 => ApiError::Forbidden(truncated),
            code => TransportError::Status {
                status: code,
                message: truncated,
            }
            .into(),
        }
    }

    /// Map an envelope `code` other than 200.
    pub fn from_code(code: i64, message: Option<String>) -> Self {
        match code {
            401 => ApiError::Unauthorized(message.unwrap_or_else(|| "Unauthorized".to_string())),
            403 => ApiError::Forbidden(message.unwrap_or_else(|| "Permission denied".to_string())),
            _ => ApiError::Rejected(message.unwrap_or_else(|| "Request failed".to_string())),
        }
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string()).into()
        } else if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            TransportError::Network(err.to_string()).into()
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, ApiError::Superseded)
    }

    /// True when the server never produced a response.
    pub fn is_no_response(&self) -> bool {
        matches!(
            self,
            ApiError::Transport(TransportError::Timeout(_) | TransportError::Network(_))
        )
    }
}
