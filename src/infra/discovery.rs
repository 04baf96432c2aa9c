//! Endpoint discovery: find the authorization, token and Micropub endpoints a site advertises.
//!
//! Relations come from two places, in order of precedence:
//! 1. HTTP `Link` headers on the response.
//! 2. `<link rel>` and `<a rel>` elements in the HTML document.
//!
//! Within each source the first URL for a relation wins. Relative URLs resolve against
//! `<base href>` when the document declares one, otherwise against the final response URL.

use std::{cell::RefCell, collections::HashMap, rc::Rc, time::Instant};

use lol_html::{RewriteStrSettings, element, rewrite_str};
use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, LINK},
};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::domain::identity::derive_identity;

pub const AUTHORIZATION_ENDPOINT_REL: &str = "authorization_endpoint";
pub const TOKEN_ENDPOINT_REL: &str = "token_endpoint";
pub const MICROPUB_REL: &str = "micropub";

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to fetch {url}: {source}")]
    Fetch { url: Url, source: reqwest::Error },
    #[error("fetching {url} returned {status}")]
    Status { url: Url, status: StatusCode },
    #[error("failed to parse {url}: {message}")]
    Document { url: Url, message: String },
    #[error("no `{rel}` advertised by {url}")]
    MissingEndpoint { rel: &'static str, url: Url },
}

/// The three endpoints needed to authorize and publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub authorization: Url,
    pub token: Url,
    pub micropub: Url,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub identity: Url,
    pub endpoints: Endpoints,
}

/// Relation name → URLs in document order.
#[derive(Debug, Default, Clone)]
pub struct Relations {
    links: HashMap<String, Vec<Url>>,
}

impl Relations {
    pub fn first(&self, rel: &str) -> Option<&Url> {
        self.links.get(rel).and_then(|urls| urls.first())
    }

    fn push(&mut self, rel: &str, url: Url) {
        self.links
            .entry(rel.to_ascii_lowercase())
            .or_default()
            .push(url);
    }

    /// Append relations from another source; existing entries keep precedence.
    fn merge(&mut self, other: Relations) {
        for (rel, urls) in other.links {
            self.links.entry(rel).or_default().extend(urls);
        }
    }

    /// Parse one `Link` header value, e.g. `<https://a/auth>; rel="authorization_endpoint"`.
    pub fn from_link_header(value: &str, base: &Url) -> Self {
        let mut relations = Self::default();
        for link in split_outside_brackets(value) {
            let link = link.trim();
            let Some(rest) = link.strip_prefix('<') else {
                continue;
            };
            let Some((target, params)) = rest.split_once('>') else {
                continue;
            };
            let Ok(url) = base.join(target.trim()) else {
                continue;
            };

            for param in params.split(';') {
                let Some((key, value)) = param.split_once('=') else {
                    continue;
                };
                if !key.trim().eq_ignore_ascii_case("rel") {
                    continue;
                }
                for rel in value.trim().trim_matches('"').split_whitespace() {
                    relations.push(rel, url.clone());
                }
            }
        }
        relations
    }

    /// Collect `rel` links from an HTML document.
    pub fn from_html(html: &str, document_url: &Url) -> Result<Self, String> {
        let base = Rc::new(RefCell::new(document_url.clone()));
        let found = Rc::new(RefCell::new(Relations::default()));

        rewrite_str(
            html,
            RewriteStrSettings {
                element_content_handlers: vec![
                    element!("base[href]", {
                        let base = Rc::clone(&base);
                        let document_url = document_url.clone();
                        move |el| {
                            if let Some(href) = el.get_attribute("href")
                                && let Ok(resolved) = document_url.join(href.trim())
                            {
                                *base.borrow_mut() = resolved;
                            }
                            Ok(())
                        }
                    }),
                    element!("link[rel][href], a[rel][href]", {
                        let base = Rc::clone(&base);
                        let found = Rc::clone(&found);
                        move |el| {
                            let (Some(rel), Some(href)) =
                                (el.get_attribute("rel"), el.get_attribute("href"))
                            else {
                                return Ok(());
                            };
                            let Ok(url) = base.borrow().join(href.trim()) else {
                                return Ok(());
                            };
                            let mut found = found.borrow_mut();
                            for token in rel.split_whitespace() {
                                found.push(token, url.clone());
                            }
                            Ok(())
                        }
                    }),
                ],
                ..RewriteStrSettings::default()
            },
        )
        .map_err(|err| err.to_string())?;

        Ok(found.take())
    }
}

impl Endpoints {
    pub fn from_relations(relations: &Relations, source: &Url) -> Result<Self, DiscoveryError> {
        let lookup = |rel: &'static str| {
            relations
                .first(rel)
                .cloned()
                .ok_or_else(|| DiscoveryError::MissingEndpoint {
                    rel,
                    url: source.clone(),
                })
        };

        Ok(Self {
            authorization: lookup(AUTHORIZATION_ENDPOINT_REL)?,
            token: lookup(TOKEN_ENDPOINT_REL)?,
            micropub: lookup(MICROPUB_REL)?,
        })
    }
}

/// Fetch `target` and resolve the identity plus the three endpoints it advertises.
pub async fn discover(http: &Client, target: &Url) -> Result<Discovery, DiscoveryError> {
    let started_at = Instant::now();
    let identity = derive_identity(target);

    let response = http
        .get(target.clone())
        .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.1")
        .send()
        .await
        .map_err(|source| DiscoveryError::Fetch {
            url: target.clone(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(DiscoveryError::Status {
            url: target.clone(),
            status,
        });
    }

    let document_url = response.url().clone();
    let mut relations = Relations::default();
    for value in response.headers().get_all(LINK) {
        if let Ok(value) = value.to_str() {
            relations.merge(Relations::from_link_header(value, &document_url));
        }
    }

    let body = response
        .text()
        .await
        .map_err(|source| DiscoveryError::Fetch {
            url: target.clone(),
            source,
        })?;
    let from_html =
        Relations::from_html(&body, &document_url).map_err(|message| DiscoveryError::Document {
            url: document_url.clone(),
            message,
        })?;
    relations.merge(from_html);

    let endpoints = Endpoints::from_relations(&relations, target)?;

    debug!(
        target = "infra::discovery",
        authorization = %endpoints.authorization,
        token = %endpoints.token,
        micropub = %endpoints.micropub,
        "Resolved endpoints"
    );
    info!(
        target = "infra::discovery",
        op = "discovery::discover",
        result = "ok",
        elapsed_ms = started_at.elapsed().as_millis() as u64,
        identity = %identity,
        "Endpoint discovery complete"
    );

    Ok(Discovery {
        identity,
        endpoints,
    })
}

fn split_outside_brackets(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (index, ch) in value.char_indices() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&value[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}
