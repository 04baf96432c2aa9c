//! Redeeming an authorization code at the token endpoint.

use std::time::Instant;

use reqwest::{
    Client,
    header::{ACCEPT, CONTENT_TYPE},
};
use serde::Deserialize;
use tracing::{info, warn};
use url::{Url, form_urlencoded};

use super::{AuthError, request::AuthorizationRequest};

#[derive(Debug, Clone)]
pub struct TokenExchange {
    http: Client,
    endpoint: Url,
    client_id: Url,
    redirect_uri: Url,
    me: Url,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl TokenExchange {
    pub fn new(http: Client, endpoint: Url, request: &AuthorizationRequest) -> Self {
        Self {
            http,
            endpoint,
            client_id: request.client_id.clone(),
            redirect_uri: request.redirect_uri.clone(),
            me: request.me.clone(),
        }
    }

    pub fn form_body(&self, code: &str) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "authorization_code")
            .append_pair("code", code)
            .append_pair("client_id", self.client_id.as_str())
            .append_pair("redirect_uri", self.redirect_uri.as_str())
            .append_pair("me", self.me.as_str())
            .finish()
    }

    /// Exchange `code` for an access token. Any non-2xx answer is fatal.
    pub async fn redeem(&self, code: &str) -> Result<String, AuthError> {
        let started_at = Instant::now();
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(self.form_body(code))
            .send()
            .await
            .map_err(AuthError::TokenRequest)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(AuthError::TokenRequest)?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            warn!(
                target = "infra::indieauth::token",
                op = "token::redeem",
                result = "error",
                status = status.as_u16(),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "Token endpoint rejected the authorization code"
            );
            return Err(AuthError::TokenExchange { status, body });
        }

        let token = parse_access_token(&bytes).ok_or(AuthError::InvalidTokenResponse)?;
        info!(
            target = "infra::indieauth::token",
            op = "token::redeem",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Access token issued"
        );
        Ok(token)
    }
}

/// JSON first; older token endpoints answer form-encoded regardless of `Accept`.
pub fn parse_access_token(body: &[u8]) -> Option<String> {
    if let Ok(response) = serde_json::from_slice::<TokenResponse>(body) {
        return non_empty(response.access_token);
    }

    form_urlencoded::parse(body)
        .find(|(key, _)| key == "access_token")
        .and_then(|(_, value)| non_empty(value.into_owned()))
}

fn non_empty(token: String) -> Option<String> {
    (!token.trim().is_empty()).then_some(token)
}
