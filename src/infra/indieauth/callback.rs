//! One-shot loopback listener that receives the authorization redirect.
//!
//! The listener serves exactly one callback. Its handler validates the returned
//! parameters, redeems the code, answers the browser with a short HTML page and hands
//! the outcome back to the waiting caller through a oneshot channel. Later requests get
//! `410 Gone`. The server is stopped on every exit path, so the port is free again once
//! [`CallbackListener::wait`] returns or its future is dropped.

use std::{
    future::IntoFuture,
    io,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use axum::{
    Router,
    extract::{RawQuery, State},
    http::StatusCode,
    response::Html,
};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tracing::{debug, info, warn};
use url::form_urlencoded;

use super::{AuthError, Phase, token::TokenExchange};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
const DONE_MESSAGE: &str = "Done, you can close this tab now.";

type Outcome = Result<String, AuthError>;

/// Parameters the authorization endpoint appends to the redirect URI.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub me: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    pub fn parse(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let slot = match key.as_ref() {
                "code" => &mut params.code,
                "state" => &mut params.state,
                "me" => &mut params.me,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }

    /// Check the callback against the request that started the flow and return the code.
    pub fn validate(&self, expected_state: &str) -> Result<&str, AuthError> {
        if let Some(error) = self.error.as_deref() {
            let reason = match self.error_description.as_deref() {
                Some(description) => format!("{error}: {description}"),
                None => error.to_string(),
            };
            return Err(AuthError::Denied(reason));
        }
        if self.state.as_deref() != Some(expected_state) {
            return Err(AuthError::StateMismatch);
        }
        self.code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or(AuthError::MissingCode)
    }
}

/// A bound callback port, not yet serving.
#[derive(Debug)]
pub struct CallbackListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl CallbackListener {
    /// Bind the callback port. A port already in use is fatal; there is no retry.
    pub async fn bind(addr: SocketAddr) -> Result<Self, AuthError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| AuthError::ListenerBind { addr, source })?;
        let local_addr = listener.local_addr().map_err(AuthError::Listener)?;
        debug!(
            target = "infra::indieauth::callback",
            addr = %local_addr,
            "Callback listener bound"
        );
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until one callback has been handled, then stop the listener.
    ///
    /// `timeout` bounds the wait; `None` blocks until the callback arrives.
    pub async fn wait(
        self,
        expected_state: String,
        exchange: TokenExchange,
        timeout: Option<Duration>,
    ) -> Result<String, AuthError> {
        let started_at = Instant::now();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let state = CallbackState {
            outcome: Arc::new(Mutex::new(Some(outcome_tx))),
            expected_state: Arc::from(expected_state),
            exchange: Arc::new(exchange),
        };
        let server = RunningServer::start(self.listener, state);

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, outcome_rx).await {
                Ok(received) => received.unwrap_or(Err(AuthError::CallbackAbandoned)),
                Err(_) => Err(AuthError::CallbackTimeout(limit)),
            },
            None => outcome_rx
                .await
                .unwrap_or(Err(AuthError::CallbackAbandoned)),
        };

        server.stop().await;

        match &outcome {
            Ok(_) => info!(
                target = "infra::indieauth::callback",
                op = "callback::wait",
                result = "ok",
                phase = Phase::TokenExchanged.as_str(),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "Authorization callback completed"
            ),
            Err(err) => warn!(
                target = "infra::indieauth::callback",
                op = "callback::wait",
                result = "error",
                phase = Phase::Failed.as_str(),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                error = %err,
                "Authorization callback failed"
            ),
        }

        outcome
    }
}

/// The serving task plus its shutdown trigger. Dropping it aborts the task.
struct RunningServer {
    task: Option<JoinHandle<io::Result<()>>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl RunningServer {
    fn start(listener: TcpListener, state: CallbackState) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let router = Router::new().fallback(handle_callback).with_state(state);
        let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });

        Self {
            task: Some(tokio::spawn(server.into_future())),
            shutdown: Some(shutdown_tx),
        }
    }

    /// Let the in-flight response finish, then make sure the listener is gone.
    async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let Some(mut task) = self.task.take() else {
            return;
        };
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(err))) => warn!(
                target = "infra::indieauth::callback",
                error = %err,
                "Callback server stopped with an error"
            ),
            Ok(Err(join_err)) => warn!(
                target = "infra::indieauth::callback",
                error = %join_err,
                "Callback server task failed"
            ),
            Err(_) => {
                task.abort();
                let _ = task.await;
            }
        }
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[derive(Clone)]
struct CallbackState {
    outcome: Arc<Mutex<Option<oneshot::Sender<Outcome>>>>,
    expected_state: Arc<str>,
    exchange: Arc<TokenExchange>,
}

impl CallbackState {
    fn take_sender(&self) -> Option<oneshot::Sender<Outcome>> {
        self.outcome.lock().ok().and_then(|mut slot| slot.take())
    }

    async fn complete(&self, query: &str) -> Outcome {
        let params = CallbackParams::parse(query);
        debug!(
            target = "infra::indieauth::callback",
            phase = Phase::CallbackReceived.as_str(),
            me = params.me.as_deref().unwrap_or_default(),
            "Authorization callback received"
        );
        let code = params.validate(&self.expected_state)?;
        self.exchange.redeem(code).await
    }
}

async fn handle_callback(
    State(state): State<CallbackState>,
    RawQuery(query): RawQuery,
) -> (StatusCode, Html<String>) {
    let Some(outcome_tx) = state.take_sender() else {
        return (
            StatusCode::GONE,
            Html(page("This authorization callback has already been handled.")),
        );
    };

    let outcome = state.complete(query.as_deref().unwrap_or_default()).await;
    let response = match &outcome {
        Ok(_) => (StatusCode::OK, Html(page(DONE_MESSAGE))),
        Err(err) => (
            status_for(err),
            Html(page(&format!("Authorization failed: {err}"))),
        ),
    };

    if outcome_tx.send(outcome).is_err() {
        warn!(
            target = "infra::indieauth::callback",
            "Callback arrived after the caller stopped waiting"
        );
    }
    response
}

fn status_for(err: &AuthError) -> StatusCode {
    match err {
        AuthError::TokenExchange { .. }
        | AuthError::TokenRequest(_)
        | AuthError::InvalidTokenResponse => StatusCode::BAD_GATEWAY,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn page(message: &str) -> String {
    format!(
        r#"<!doctype html><html><body style="background:#111;color:#ddd"><h1>{}</h1></body></html>"#,
        escape_html(message)
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use httpmock::MockServer;
    use reqwest::Client;
    use url::Url;

    use super::*;
    use crate::{
        config::AuthSettings,
        domain::scope::Scope,
        infra::indieauth::request::AuthorizationRequest,
    };

    fn loopback() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }

    fn exchange(token_endpoint: &str) -> TokenExchange {
        let settings = AuthSettings {
            client_id: Url::parse("https://github.com/tsileo/entries").expect("url"),
            redirect_uri: Url::parse("http://localhost:7881/").expect("url"),
            callback_addr: loopback(),
            callback_timeout: None,
        };
        let request = AuthorizationRequest::with_state(
            Url::parse("https://example.com/").expect("url"),
            &[Scope::Create],
            &settings,
            "expected".into(),
        );
        TokenExchange::new(
            Client::new(),
            Url::parse(token_endpoint).expect("url"),
            &request,
        )
    }

    fn token_server(status: u16, body: &'static str) -> MockServer {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("POST").path("/token");
            then.status(status)
                .header("content-type", "application/json")
                .body(body);
        });
        server
    }

    async fn hit(addr: SocketAddr, query: &str) -> (u16, String) {
        let response = Client::new()
            .get(format!("http://{addr}/?{query}"))
            .send()
            .await
            .expect("callback request");
        let status = response.status().as_u16();
        let body = response.text().await.expect("callback body");
        (status, body)
    }

    #[test]
    fn params_parse_known_keys() {
        let params = CallbackParams::parse("code=abc&state=xyz&me=https%3A%2F%2Fexample.com%2F&x=1");
        assert_eq!(params.code.as_deref(), Some("abc"));
        assert_eq!(params.state.as_deref(), Some("xyz"));
        assert_eq!(params.me.as_deref(), Some("https://example.com/"));
        assert_eq!(params.error, None);
    }

    #[test]
    fn validation_rejects_wrong_state() {
        let params = CallbackParams::parse("code=abc&state=other");
        assert!(matches!(
            params.validate("expected"),
            Err(AuthError::StateMismatch)
        ));

        let params = CallbackParams::parse("code=abc");
        assert!(matches!(
            params.validate("expected"),
            Err(AuthError::StateMismatch)
        ));
    }

    #[test]
    fn validation_requires_code() {
        let params = CallbackParams::parse("state=expected");
        assert!(matches!(
            params.validate("expected"),
            Err(AuthError::MissingCode)
        ));
    }

    #[test]
    fn validation_reports_denial() {
        let params =
            CallbackParams::parse("error=access_denied&error_description=nope&state=expected");
        match params.validate("expected") {
            Err(AuthError::Denied(reason)) => assert_eq!(reason, "access_denied: nope"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn pages_escape_markup() {
        let html = page("<script>alert('x')</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[tokio::test]
    async fn serves_one_callback_and_returns_token() {
        let tokens = token_server(200, r#"{"access_token":"tok123"}"#);
        let listener = CallbackListener::bind(loopback()).await.expect("bind");
        let addr = listener.local_addr();

        let waiter = tokio::spawn(listener.wait(
            "expected".into(),
            exchange(&tokens.url("/token")),
            Some(Duration::from_secs(10)),
        ));
        let (status, body) = hit(addr, "code=abc&state=expected&me=https%3A%2F%2Fexample.com%2F").await;

        assert_eq!(status, 200);
        assert!(body.contains(DONE_MESSAGE));
        let token = waiter.await.expect("join").expect("token");
        assert_eq!(token, "tok123");
    }

    #[tokio::test]
    async fn state_mismatch_fails_without_redeeming() {
        let tokens = MockServer::start();
        let token_mock = tokens.mock(|when, then| {
            when.method("POST").path("/token");
            then.status(200).body(r#"{"access_token":"never"}"#);
        });
        let listener = CallbackListener::bind(loopback()).await.expect("bind");
        let addr = listener.local_addr();

        let waiter = tokio::spawn(listener.wait(
            "expected".into(),
            exchange(&tokens.url("/token")),
            Some(Duration::from_secs(10)),
        ));
        let (status, _) = hit(addr, "code=abc&state=forged").await;

        assert_eq!(status, 400);
        let err = waiter.await.expect("join").expect_err("mismatch");
        assert!(matches!(err, AuthError::StateMismatch));
        assert_eq!(token_mock.hits(), 0);
    }

    #[tokio::test]
    async fn port_is_released_after_token_exchange_failure() {
        let tokens = token_server(500, r#"{"error":"server_error"}"#);
        let listener = CallbackListener::bind(loopback()).await.expect("bind");
        let addr = listener.local_addr();

        let waiter = tokio::spawn(listener.wait(
            "expected".into(),
            exchange(&tokens.url("/token")),
            Some(Duration::from_secs(10)),
        ));
        let (status, _) = hit(addr, "code=abc&state=expected").await;
        assert_eq!(status, 502);

        let err = waiter.await.expect("join").expect_err("exchange failed");
        assert!(matches!(err, AuthError::TokenExchange { .. }));

        let rebound = CallbackListener::bind(addr).await.expect("port released");
        assert_eq!(rebound.local_addr(), addr);
    }

    #[tokio::test]
    async fn port_is_released_after_success() {
        let tokens = token_server(200, r#"{"access_token":"tok"}"#);
        let listener = CallbackListener::bind(loopback()).await.expect("bind");
        let addr = listener.local_addr();

        let waiter = tokio::spawn(listener.wait(
            "expected".into(),
            exchange(&tokens.url("/token")),
            None,
        ));
        hit(addr, "code=abc&state=expected").await;
        waiter.await.expect("join").expect("token");

        CallbackListener::bind(addr).await.expect("port released");
    }

    #[tokio::test]
    async fn times_out_and_releases_port() {
        let listener = CallbackListener::bind(loopback()).await.expect("bind");
        let addr = listener.local_addr();

        let err = listener
            .wait(
                "expected".into(),
                exchange("http://127.0.0.1:9/token"),
                Some(Duration::from_millis(50)),
            )
            .await
            .expect_err("timeout");
        assert!(matches!(err, AuthError::CallbackTimeout(_)));

        CallbackListener::bind(addr).await.expect("port released");
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let first = CallbackListener::bind(loopback()).await.expect("bind");
        let err = CallbackListener::bind(first.local_addr())
            .await
            .expect_err("port in use");
        assert!(matches!(err, AuthError::ListenerBind { .. }));
    }
}
