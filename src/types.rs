use serde::{Deserialize, Serialize};

/// Normalizes a raw token; blank strings and stringified nulls are not tokens.
pub fn normalize_token(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("null")
        || trimmed.eq_ignore_ascii_case("undefined")
    {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn bearer_header(token: &str) -> String {
    format!("Bearer {token}")
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenData {
    #[serde(default)]
    pub token: Option<String>,
}

/// Body returned by the login and refresh endpoints: `{ "data": { "token": ... } }`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenEnvelope {
    #[serde(default)]
    pub data: Option<TokenData>,
}

impl TokenEnvelope {
    pub fn into_token(self) -> Option<String> {
        self.data?.token.as_deref().and_then(normalize_token)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginPayload<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshPayload<'a> {
    pub token: &'a str,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    LoggedIn,
    Refreshed,
    LoggedOut,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    pub kind: SessionEventKind,
    pub at: String,
}
