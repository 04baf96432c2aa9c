//! IndieAuth authorization-code handshake.
//!
//! ```text
//! Idle -> AwaitingRedirect -> CallbackReceived -> TokenExchanged -> Done
//!                     \______________\___________________\________-> Failed
//! ```
//!
//! The callback listener is bound before the browser opens, so a busy port fails the
//! command before the user is sent anywhere.

use std::{io, net::SocketAddr, time::Duration, time::Instant};

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
    config::AuthSettings,
    domain::scope::{Scope, join_scopes},
    infra::{
        browser::{Launcher, open_best_effort},
        discovery::{DiscoveryError, discover},
    },
};

pub mod callback;
pub mod request;
pub mod token;

pub use callback::{CallbackListener, CallbackParams};
pub use request::{AuthorizationRequest, generate_state};
pub use token::TokenExchange;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("failed to bind the callback listener on {addr}: {source}")]
    ListenerBind { addr: SocketAddr, source: io::Error },
    #[error("callback listener failed: {0}")]
    Listener(io::Error),
    #[error("no authorization callback received within {}s", .0.as_secs())]
    CallbackTimeout(Duration),
    #[error("callback listener stopped before a callback was handled")]
    CallbackAbandoned,
    #[error("callback `state` does not match the authorization request")]
    StateMismatch,
    #[error("callback is missing the authorization `code`")]
    MissingCode,
    #[error("authorization denied: {0}")]
    Denied(String),
    #[error("token endpoint returned {status}: {body}")]
    TokenExchange { status: StatusCode, body: String },
    #[error("token request failed: {0}")]
    TokenRequest(reqwest::Error),
    #[error("token endpoint response has no `access_token`")]
    InvalidTokenResponse,
}

/// Handshake phases, reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingRedirect,
    CallbackReceived,
    TokenExchanged,
    Done,
    Failed,
}

impl Phase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::AwaitingRedirect => "awaiting_redirect",
            Phase::CallbackReceived => "callback_received",
            Phase::TokenExchanged => "token_exchanged",
            Phase::Done => "done",
            Phase::Failed => "failed",
        }
    }
}

/// What a completed handshake yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub me: Url,
    pub micropub: Url,
    pub access_token: String,
}

pub struct Authorizer<'a> {
    http: &'a Client,
    settings: &'a AuthSettings,
    launcher: &'a dyn Launcher,
}

impl<'a> Authorizer<'a> {
    pub fn new(http: &'a Client, settings: &'a AuthSettings, launcher: &'a dyn Launcher) -> Self {
        Self {
            http,
            settings,
            launcher,
        }
    }

    /// Run the full handshake for `target`, requesting exactly `scopes`.
    pub async fn authorize(&self, target: &Url, scopes: &[Scope]) -> Result<Grant, AuthError> {
        let started_at = Instant::now();
        let discovery = discover(self.http, target).await?;

        let request = AuthorizationRequest::new(discovery.identity.clone(), scopes, self.settings);
        debug!(
            target = "infra::indieauth",
            phase = Phase::Idle.as_str(),
            me = %request.me,
            scope = %join_scopes(scopes),
            "Authorization request prepared"
        );

        let listener = CallbackListener::bind(self.settings.callback_addr).await?;
        let auth_url = request.authorization_url(&discovery.endpoints.authorization);
        debug!(
            target = "infra::indieauth",
            phase = Phase::AwaitingRedirect.as_str(),
            addr = %listener.local_addr(),
            "Waiting for authorization redirect"
        );

        open_best_effort(self.launcher, auth_url.as_str());
        eprintln!("waiting for the IndieAuth callback...");

        let exchange = TokenExchange::new(
            self.http.clone(),
            discovery.endpoints.token.clone(),
            &request,
        );
        let access_token = listener
            .wait(request.state.clone(), exchange, self.settings.callback_timeout)
            .await?;
        eprintln!("success");

        info!(
            target = "infra::indieauth",
            op = "indieauth::authorize",
            result = "ok",
            phase = Phase::Done.as_str(),
            me = %discovery.identity,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Authorization completed"
        );

        Ok(Grant {
            me: discovery.identity,
            micropub: discovery.endpoints.micropub,
            access_token,
        })
    }
}
