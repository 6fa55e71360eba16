use serde::{Deserialize, Serialize};

/// Request body for both login endpoints.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Issued access token; `expires_in` is the expiry as a unix timestamp.
#[derive(Debug, Serialize)]
pub struct TokenView {
    pub access_token: String,
    pub expires_in: i64,
}
