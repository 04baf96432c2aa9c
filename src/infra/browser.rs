//! Opening URLs in the user's browser.

use std::{
    env, io,
    process::{Command, Stdio},
    thread,
};

use thiserror::Error;
use tracing::{info, warn};

use crate::config::BrowserSettings;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("browser launching is disabled")]
    Disabled,
    #[error("browser command is empty")]
    EmptyCommand,
    #[error("failed to spawn `{program}`: {source}")]
    Spawn { program: String, source: io::Error },
}

/// Something that can show a URL to the user.
pub trait Launcher: Send + Sync {
    fn open(&self, url: &str) -> Result<(), LaunchError>;
}

/// Launches the configured command, or the platform's default opener.
#[derive(Debug, Clone, Default)]
pub struct SystemBrowser {
    command: Option<String>,
}

impl SystemBrowser {
    pub fn new(command: Option<String>) -> Self {
        Self { command }
    }

    fn command_line(&self) -> Vec<String> {
        self.command_line_on(env::consts::OS)
    }

    fn command_line_on(&self, os: &str) -> Vec<String> {
        match self.command.as_deref() {
            Some(command) => command.split_whitespace().map(str::to_string).collect(),
            None => opener_for(os).iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl Launcher for SystemBrowser {
    fn open(&self, url: &str) -> Result<(), LaunchError> {
        let mut parts = self.command_line().into_iter();
        let program = parts.next().ok_or(LaunchError::EmptyCommand)?;

        let mut child = Command::new(&program)
            .args(parts)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: program.clone(),
                source,
            })?;

        // Not awaited; reap the opener in the background.
        thread::spawn(move || {
            let _ = child.wait();
        });

        info!(
            target = "infra::browser",
            op = "browser::open",
            program = %program,
            "Opened URL in browser"
        );
        Ok(())
    }
}

/// Launcher used with `--no-browser`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBrowser;

impl Launcher for NoBrowser {
    fn open(&self, _url: &str) -> Result<(), LaunchError> {
        Err(LaunchError::Disabled)
    }
}

pub fn from_settings(settings: &BrowserSettings) -> Box<dyn Launcher> {
    if settings.enabled {
        Box::new(SystemBrowser::new(settings.command.clone()))
    } else {
        Box::new(NoBrowser)
    }
}

/// Open `url`, falling back to printing it. Never fails the calling command.
pub fn open_best_effort(launcher: &dyn Launcher, url: &str) {
    match launcher.open(url) {
        Ok(()) => {}
        Err(LaunchError::Disabled) => eprintln!("{url}"),
        Err(err) => {
            warn!(
                target = "infra::browser",
                op = "browser::open",
                result = "error",
                error = %err,
                "Failed to open browser"
            );
            eprintln!("could not open a browser, visit: {url}");
        }
    }
}

/// The URL is appended as the final argument and must reach the handler unparsed;
/// `cmd /C start` would split it at every `&`.
fn opener_for(os: &str) -> &'static [&'static str] {
    match os {
        "macos" => &["open"],
        "windows" => &["rundll32", "url.dll,FileProtocolHandler"],
        _ => &["xdg-open"],
    }
}
