use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the `entries` binary.
#[derive(Debug, Parser)]
#[command(name = "entries", version, about = "Micropub client for the terminal")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "ENTRIES_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Authorize with every scope and print the access token.
    GetToken(TargetArgs),
    /// Write a new post in your editor and publish it.
    Create(TargetArgs),
    /// Edit an existing post in your editor.
    Update(TargetArgs),
    /// Print the Micropub source of an existing post.
    Source(TargetArgs),
    /// Delete a post.
    Delete(TargetArgs),
}

impl Command {
    pub fn target(&self) -> &str {
        match self {
            Command::GetToken(args)
            | Command::Create(args)
            | Command::Update(args)
            | Command::Source(args)
            | Command::Delete(args) => &args.url,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct TargetArgs {
    /// Site or post URL; the identity is derived from its scheme and host.
    #[arg(value_name = "URL")]
    pub url: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Never launch a browser; print URLs instead.
    #[arg(long = "no-browser", global = true)]
    pub no_browser: bool,

    /// Command used to open URLs (the URL is appended as the last argument).
    #[arg(long = "browser-command", value_name = "COMMAND", global = true)]
    pub browser_command: Option<String>,

    /// Editor command used for create/update (defaults to $VISUAL, then $EDITOR).
    #[arg(long = "editor", value_name = "COMMAND", global = true)]
    pub editor: Option<String>,

    /// Seconds to wait for the authorization callback; 0 waits forever.
    #[arg(long = "callback-timeout-seconds", value_name = "SECONDS", global = true)]
    pub callback_timeout_seconds: Option<u64>,

    /// Override the IndieAuth client identifier.
    #[arg(long = "client-id", value_name = "URL", global = true)]
    pub client_id: Option<String>,

    /// Override the loopback redirect URI.
    #[arg(long = "redirect-uri", value_name = "URL", global = true)]
    pub redirect_uri: Option<String>,
}
