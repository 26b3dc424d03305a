//! Claims carried in a metalstack.cloud API token
//!
//! The token is only inspected for defaults. Its signature is checked by the
//! API, never here.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use std::collections::HashMap;

use crate::config::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Claims {
    /// Issuer, the API the token was minted for
    pub iss: Option<String>,
    pub sub: Option<String>,
    pub exp: Option<i64>,
    #[serde(rename = "type")]
    pub token_type: Option<String>,
    /// Subject (`*`, organization or project) to role
    pub roles: HashMap<String, String>,
    /// Subject to permitted methods, e.g. `/api.v1.ClusterService/List`
    pub permissions: HashMap<String, Vec<String>>,
}

impl Claims {
    /// Decode the payload of a JWT without verifying it
    pub fn parse_unverified(token: &str) -> Result<Self, ConfigError> {
        let mut parts = token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ConfigError::InvalidToken(
                "token contains an invalid number of segments".to_string(),
            ));
        };

        let raw = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| ConfigError::InvalidToken(format!("token payload is not base64url: {}", e)))?;

        serde_json::from_slice(&raw)
            .map_err(|e| ConfigError::InvalidToken(format!("token payload is not valid JSON: {}", e)))
    }

    pub fn issuer(&self) -> Option<&str> {
        self.iss.as_deref().filter(|iss| !iss.is_empty())
    }
}

#[cfg(test)]
pub(crate) fn encode_test_token(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"ES512","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.c2lnbmF0dXJl", header, body)
}
