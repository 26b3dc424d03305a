//! Method service: what the current token is allowed to do

use serde::{Deserialize, Serialize};

use super::{ApiError, Client};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TokenScope {
    pub permissions: Vec<MethodPermission>,
    pub roles: Vec<TokenRole>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MethodPermission {
    /// Project, organization or `*`
    pub subject: String,
    pub methods: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TokenRole {
    pub subject: String,
    pub role: String,
}

impl TokenScope {
    /// Role subjects followed by permission subjects, without duplicates
    pub fn subjects(&self) -> Vec<&str> {
        let mut subjects: Vec<&str> = Vec::with_capacity(self.roles.len() + self.permissions.len());
        let all = self
            .roles
            .iter()
            .map(|r| r.subject.as_str())
            .chain(self.permissions.iter().map(|p| p.subject.as_str()));
        for subject in all {
            if !subjects.contains(&subject) {
                subjects.push(subject);
            }
        }
        subjects
    }
}

#[derive(Debug, Serialize)]
struct TokenScopedListRequest {}

const TOKEN_SCOPED_LIST: &str = "api.v1.MethodService/TokenScopedList";

pub struct MethodApi<'a> {
    client: &'a Client,
}

impl<'a> MethodApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn token_scoped_list(&self) -> Result<TokenScope, ApiError> {
        self.client
            .unary(TOKEN_SCOPED_LIST, &TokenScopedListRequest {})
            .await
    }
}
