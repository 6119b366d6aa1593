use serde::Deserialize;

use super::ApiError;

/// Envelope `code` for success.
pub const CODE_SUCCESS: i64 = 200;

/// Uniform response wrapper used by every endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        self.code == CODE_SUCCESS
    }

    /// Success yields the (possibly absent) data; any other code becomes an error.
    pub fn into_result(self) -> Result<Option<T>, ApiError> {
        if self.is_success() {
            Ok(self.data)
        } else {
            Err(ApiError::from_code(self.code, self.message))
        }
    }

    /// Like `into_result`, but a success without `data` is an invalid response.
    pub fn into_data(self) -> Result<T, ApiError> {
        self.into_result()?
            .ok_or_else(|| ApiError::InvalidResponse("Envelope is missing data".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let env: Envelope<Vec<i32>> =
            serde_json::from_str(r#"{"code":200,"message":"ok","data":[1,2]}"#)
                .expect("Failed to parse envelope");
        assert!(env.is_success());
        assert_eq!(env.into_data(), Ok(vec![1, 2]));
    }

    #[test]
    fn test_success_without_data() {
        let env: Envelope<serde_json::Value> =
            serde_json::from_str(r#"{"code":200,"message":"ok"}"#).expect("Failed to parse envelope");
        assert_eq!(env.clone().into_result(), Ok(None));
        assert!(matches!(env.into_data(), Err(ApiError::InvalidResponse(_))));
    }

    #[test]
    fn test_error_codes() {
        let env: Envelope<()> = serde_json::from_str(r#"{"code":401,"message":"expired","data":null}"#)
            .expect("Failed to parse envelope");
        assert_eq!(env.into_result(), Err(ApiError::Unauthorized("expired".to_string())));

        let env: Envelope<()> = serde_json::from_str(r#"{"code":403,"message":null}"#)
            .expect("Failed to parse envelope");
        assert!(matches!(env.into_result(), Err(ApiError::Forbidden(_))));

        let env: Envelope<()> = serde_json::from_str(r#"{"code":500,"message":"Wrong username or password"}"#)
            .expect("Failed to parse envelope");
        assert_eq!(
            env.into_result(),
            Err(ApiError::Rejected("Wrong username or password".to_string()))
        );
    }
}
