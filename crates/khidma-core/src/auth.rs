//! Login, logout and identity claims.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError, RequestOptions};

pub const LOGIN_PATH: &str = "/auth/login";
pub const LOGOUT_PATH: &str = "/auth/logout";

const ADMIN_ROLE: &str = "Admin";

/// Identity carried in the access token payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE) || self.roles.iter().any(|r| r == ADMIN_ROLE)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
}

/// Decode the payload segment of a JWT. The signature is not checked; the backend is the
/// authority on validity.
pub fn decode_claims(token: &str) -> Result<Claims, ApiError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| ApiError::Token("token is not a JWT".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|err| ApiError::Token(err.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|err| ApiError::Token(err.to_string()))
}

/// Authenticate with email and password. The backend sets its session cookies and returns
/// an access token, which is kept for bearer authentication.
pub async fn login(client: &ApiClient, email: &str, password: &str) -> Result<Claims, ApiError> {
    let options = RequestOptions::post().json(&LoginRequest { email, password })?;
    let value = client.request_once(LOGIN_PATH, options).await?;
    let response: LoginResponse = serde_json::from_value(value)?;

    let claims = decode_claims(&response.access_token)?;
    client
        .session()
        .set_access_token(Some(response.access_token));
    info!(user = %claims.sub, "logged in");
    Ok(claims)
}

/// End the session on the backend if possible; local credentials are dropped either way.
pub async fn logout(client: &ApiClient) {
    if let Err(err) = client.request_once(LOGOUT_PATH, RequestOptions::post()).await {
        warn!(error = %err, "logout request failed");
    }
    client.session().clear();
    info!("logged out");
}

/// Claims of the access token currently held, if any.
pub fn current_claims(client: &ApiClient) -> Option<Claims> {
    let token = client.session().access_token()?;
    match decode_claims(&token) {
        Ok(claims) => Some(claims),
        Err(err) => {
            warn!(error = %err, "held access token is unreadable");
            None
        }
    }
}
