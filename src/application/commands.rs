//! The five subcommands. Each one authorizes with the narrowest scope it needs,
//! does its work, and prints its result on stdout.

use std::sync::Arc;

use tokio::task;
use tracing::info;
use url::Url;

use super::{
    context::Ctx,
    error::CliError,
    print::{print_json, print_line},
};
use crate::{
    config::Command,
    domain::{entry::SourceRecord, identity::parse_target, scope::Scope},
    infra::{
        browser::open_best_effort,
        editor::{RecoveryFile, buffer},
        indieauth::Grant,
    },
};

pub async fn handle(ctx: &Ctx, command: Command) -> Result<(), CliError> {
    match command {
        Command::GetToken(args) => print_line(&get_token(ctx, &args.url).await?),
        Command::Create(args) => {
            if let Some(location) = create(ctx, &args.url).await? {
                print_line(&location);
            }
        }
        Command::Update(args) => print_line(&update(ctx, &args.url).await?),
        Command::Source(args) => print_json(&source(ctx, &args.url).await?)?,
        Command::Delete(args) => print_line(&delete(ctx, &args.url).await?),
    }
    Ok(())
}

/// Handshake only, with every scope; the token is for the user to reuse by hand.
pub async fn get_token(ctx: &Ctx, url: &str) -> Result<String, CliError> {
    let grant = authorize(ctx, url, &Scope::ALL).await?.1;
    Ok(grant.access_token)
}

/// Write a new post; returns its URL when the server reports one.
pub async fn create(ctx: &Ctx, url: &str) -> Result<Option<String>, CliError> {
    let (_, grant) = authorize(ctx, url, &[Scope::Create]).await?;

    let edited = edit(ctx, buffer::render_template()).await?;
    let recovery = keep_draft(ctx, &edited)?;
    let entry = buffer::parse(&edited)?;

    let location = ctx.micropub(&grant).create(&entry).await?;
    recovery.discard();

    if let Some(location) = location.as_deref() {
        open_best_effort(ctx.launcher.as_ref(), location);
    }
    info!(
        target = "application::commands",
        op = "create",
        result = "ok",
        location = location.as_deref().unwrap_or_default(),
        "Post created"
    );
    Ok(location)
}

/// Edit an existing post in place. Returns the server's `Location`, or the post URL.
pub async fn update(ctx: &Ctx, url: &str) -> Result<String, CliError> {
    let (target, grant) = authorize(ctx, url, &[Scope::Update]).await?;
    let client = ctx.micropub(&grant);

    let record = client.source(target.as_str()).await?;
    let edited = edit(ctx, buffer::render_source(&record)?).await?;
    let recovery = keep_draft(ctx, &edited)?;
    let entry = buffer::parse(&edited)?;

    let location = client
        .update(target.as_str(), &entry)
        .await?
        .unwrap_or_else(|| target.to_string());
    recovery.discard();

    open_best_effort(ctx.launcher.as_ref(), &location);
    info!(
        target = "application::commands",
        op = "update",
        result = "ok",
        location = %location,
        "Post updated"
    );
    Ok(location)
}

/// Read-only, but servers only answer `q=source` for tokens that may update.
pub async fn source(ctx: &Ctx, url: &str) -> Result<SourceRecord, CliError> {
    let (target, grant) = authorize(ctx, url, &[Scope::Update]).await?;
    Ok(ctx.micropub(&grant).source(target.as_str()).await?)
}

pub async fn delete(ctx: &Ctx, url: &str) -> Result<String, CliError> {
    let (target, grant) = authorize(ctx, url, &[Scope::Delete]).await?;
    ctx.micropub(&grant).delete(target.as_str()).await?;

    open_best_effort(ctx.launcher.as_ref(), target.as_str());
    info!(
        target = "application::commands",
        op = "delete",
        result = "ok",
        url = %target,
        "Post deleted"
    );
    Ok(target.to_string())
}

async fn authorize(ctx: &Ctx, url: &str, scopes: &[Scope]) -> Result<(Url, Grant), CliError> {
    let target = parse_target(url)?;
    let grant = ctx.authorizer().authorize(&target, scopes).await?;
    Ok((target, grant))
}

/// The editor blocks until the user quits, so it runs on the blocking pool.
async fn edit(ctx: &Ctx, initial: String) -> Result<String, CliError> {
    let editor = Arc::clone(&ctx.editor);
    let edited = task::spawn_blocking(move || editor.edit(&initial)).await??;
    Ok(edited)
}

fn keep_draft(ctx: &Ctx, edited: &str) -> Result<RecoveryFile, CliError> {
    let recovery = RecoveryFile::persist(&ctx.settings.editor.recovery_dir, edited)?;
    eprintln!(
        "data will be available at {} in case of crash",
        recovery.path().display()
    );
    Ok(recovery)
}
