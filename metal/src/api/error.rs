use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Error reported by the remote procedure, rendered the way the server names it
    #[error("{code}: {message}")]
    Rpc { code: String, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("unauthenticated: the api token was rejected")]
    Unauthenticated,

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("unexpected EOF")]
    UnexpectedEof,
}

impl ApiError {
    pub fn is_unexpected_eof(&self) -> bool {
        matches!(self, ApiError::UnexpectedEof)
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Rpc { code, .. } => Some(code),
            ApiError::Unauthenticated => Some("unauthenticated"),
            _ => None,
        }
    }
}

/// JSON error body returned with non-2xx replies and in end-of-stream messages
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RpcErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl From<RpcErrorBody> for ApiError {
    fn from(body: RpcErrorBody) -> Self {
        if body.code == "unauthenticated" {
            return ApiError::Unauthenticated;
        }
        ApiError::Rpc {
            code: body.code,
            message: body.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_error_renders_code_and_message() {
        let err = ApiError::Rpc {
            code: "not_found".to_string(),
            message: "no entity with uuid:\"abc\" found".to_string(),
        };
        assert_eq!(err.to_string(), "not_found: no entity with uuid:\"abc\" found");
        assert_eq!(err.code(), Some("not_found"));
    }

    #[test]
    fn unauthenticated_body_maps_to_dedicated_variant() {
        let body: RpcErrorBody =
            serde_json::from_str(r#"{"code":"unauthenticated","message":"token expired"}"#).unwrap();
        assert!(matches!(ApiError::from(body), ApiError::Unauthenticated));
    }
}
