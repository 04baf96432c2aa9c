//! The user's identity URL ("me") and parsing of command targets.

use url::Url;

use super::error::DomainError;

/// Parse a command-line target into an absolute HTTP(S) URL.
pub fn parse_target(input: &str) -> Result<Url, DomainError> {
    let trimmed = input.trim();
    let url = Url::parse(trimmed).map_err(|err| DomainError::invalid_url(trimmed, err.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(DomainError::invalid_url(
                trimmed,
                format!("unsupported scheme `{other}`"),
            ));
        }
    }
    if url.host_str().is_none() {
        return Err(DomainError::invalid_url(trimmed, "missing host"));
    }
    Ok(url)
}

/// Canonical identity for any URL on the user's site: scheme, host and port with a `/` path.
pub fn derive_identity(url: &Url) -> Url {
    let mut me = url.clone();
    me.set_path("/");
    me.set_query(None);
    me.set_fragment(None);
    // Only fails for cannot-be-a-base URLs, which `parse_target` already rejects.
    let _ = me.set_username("");
    let _ = me.set_password(None);
    me
}
