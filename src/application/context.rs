use std::sync::Arc;

use reqwest::Client;

use super::error::CliError;
use crate::{
    config::Settings,
    infra::{
        browser::{self, Launcher},
        editor::{EditSession, ExternalEditor},
        indieauth::{Authorizer, Grant},
        micropub::MicropubClient,
    },
};

/// What every command runs with: settings, one HTTP client and the two host collaborators.
#[derive(Clone)]
pub struct Ctx {
    pub settings: Settings,
    pub http: Client,
    pub launcher: Arc<dyn Launcher>,
    pub editor: Arc<dyn EditSession>,
}

impl Ctx {
    pub fn new(settings: Settings) -> Result<Self, CliError> {
        let http = Client::builder().user_agent(Self::user_agent()).build()?;
        let launcher = Arc::from(browser::from_settings(&settings.browser));
        let editor = Arc::new(ExternalEditor::from_settings(&settings.editor));
        Ok(Self::with_collaborators(settings, http, launcher, editor))
    }

    pub fn with_collaborators(
        settings: Settings,
        http: Client,
        launcher: Arc<dyn Launcher>,
        editor: Arc<dyn EditSession>,
    ) -> Self {
        Self {
            settings,
            http,
            launcher,
            editor,
        }
    }

    pub fn user_agent() -> &'static str {
        concat!("entries/", env!("CARGO_PKG_VERSION"))
    }

    pub fn authorizer(&self) -> Authorizer<'_> {
        Authorizer::new(&self.http, &self.settings.auth, self.launcher.as_ref())
    }

    pub fn micropub(&self, grant: &Grant) -> MicropubClient {
        MicropubClient::new(
            self.http.clone(),
            grant.micropub.clone(),
            grant.access_token.clone(),
        )
    }
}
