//! The authorization request sent to the user's authorization endpoint.

use rand::RngCore;
use url::Url;

use crate::{
    config::AuthSettings,
    domain::scope::{Scope, join_scopes},
};

/// Random bytes behind each `state` value; hex-encoded on the wire.
pub const STATE_BYTES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub me: Url,
    pub state: String,
    pub scopes: Vec<Scope>,
    pub redirect_uri: Url,
    pub client_id: Url,
}

impl AuthorizationRequest {
    /// Start a request with a fresh `state` from the thread-local generator.
    pub fn new(me: Url, scopes: &[Scope], settings: &AuthSettings) -> Self {
        Self::with_state(me, scopes, settings, generate_state(&mut rand::rng()))
    }

    pub fn with_state(me: Url, scopes: &[Scope], settings: &AuthSettings, state: String) -> Self {
        Self {
            me,
            state,
            scopes: scopes.to_vec(),
            redirect_uri: settings.redirect_uri.clone(),
            client_id: settings.client_id.clone(),
        }
    }

    /// The endpoint URL with the request appended to whatever query it already carries.
    pub fn authorization_url(&self, endpoint: &Url) -> Url {
        let mut url = endpoint.clone();
        url.query_pairs_mut()
            .append_pair("me", self.me.as_str())
            .append_pair("response_type", "code")
            .append_pair("state", &self.state)
            .append_pair("redirect_uri", self.redirect_uri.as_str())
            .append_pair("scope", &join_scopes(&self.scopes))
            .append_pair("client_id", self.client_id.as_str());
        url
    }
}

pub fn generate_state<R: RngCore + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use std::{
        net::{IpAddr, Ipv4Addr, SocketAddr},
        time::Duration,
    };

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn settings() -> AuthSettings {
        AuthSettings {
            client_id: Url::parse("https://github.com/tsileo/entries").expect("url"),
            redirect_uri: Url::parse("http://localhost:7881/").expect("url"),
            callback_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 7881),
            callback_timeout: Some(Duration::from_secs(5)),
        }
    }

    #[test]
    fn seeded_state_is_url_safe_hex_of_declared_length() {
        let mut rng = StdRng::seed_from_u64(7);
        let state = generate_state(&mut rng);

        assert!(STATE_BYTES >= 6);
        assert_eq!(state.len(), STATE_BYTES * 2);
        assert!(state.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        let again = generate_state(&mut StdRng::seed_from_u64(7));
        assert_eq!(state, again);
    }

    #[test]
    fn fresh_states_differ() {
        let me = Url::parse("https://example.com/").expect("url");
        let first = AuthorizationRequest::new(me.clone(), &[Scope::Create], &settings());
        let second = AuthorizationRequest::new(me, &[Scope::Create], &settings());
        assert_ne!(first.state, second.state);
    }

    #[test]
    fn authorization_url_carries_every_parameter() {
        let me = Url::parse("https://example.com/").expect("url");
        let request = AuthorizationRequest::with_state(
            me,
            &[Scope::Create, Scope::Update],
            &settings(),
            "abc123".to_string(),
        );
        let endpoint = Url::parse("https://auth.example.com/authorize?tenant=1").expect("url");
        let url = request.authorization_url(&endpoint);

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let expected = [
            ("tenant", "1"),
            ("me", "https://example.com/"),
            ("response_type", "code"),
            ("state", "abc123"),
            ("redirect_uri", "http://localhost:7881/"),
            ("scope", "create update"),
            ("client_id", "https://github.com/tsileo/entries"),
        ];
        assert_eq!(pairs.len(), expected.len());
        for ((key, value), (want_key, want_value)) in pairs.iter().zip(expected) {
            assert_eq!(key, want_key);
            assert_eq!(value, want_value);
        }
        assert!(url.as_str().contains("scope=create+update"));
    }
}
