use thiserror::Error;

use crate::{
    config::LoadError,
    domain::error::DomainError,
    infra::{
        editor::EditError, error::InfraError, indieauth::AuthError, micropub::PublishError,
    },
};

/// Every way a command can fail. The binary prints it and exits non-zero.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error("editor task failed: {0}")]
    EditorTask(#[from] tokio::task::JoinError),
    #[error("failed to build the http client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}
