use std::process;

use entries::{
    application::{commands, context::Ctx, error::CliError},
    config,
    infra::telemetry,
};
use tracing::debug;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        report_error(&err);
        process::exit(1);
    }
}

fn report_error(err: &CliError) {
    eprintln!("error: {err}");
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        debug!(target = "entries", cause = %inner, "caused by");
        source = inner.source();
    }
}

async fn run() -> Result<(), CliError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    debug!(
        target = "entries",
        target_url = cli_args.command.target(),
        "Starting command"
    );

    let ctx = Ctx::new(settings)?;
    commands::handle(&ctx, cli_args.command).await
}
