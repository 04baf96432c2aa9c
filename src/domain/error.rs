use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },
}

impl DomainError {
    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }
}
