//! cordsweep - Binary entry point.
//!
//! Wires parsed arguments into the engine: builds the store, discovers
//! the channel tree, resolves scope, and either prints a listing or runs
//! the sweep. Logs go to stderr so `--json` output on stdout stays
//! machine-readable.

mod args;
mod discovery;

use std::env;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cordsweep_core::{CancelFlag, PreserveCache, RunSummary, Sweeper, discover};
use cordsweep_store::{DiscordStore, MessageStore};
use cordsweep_types::UserId;
use tracing_subscriber::EnvFilter;

use crate::args::Args;

const TOKEN_ENV: &str = "DISCORD_TOKEN";
const USER_ID_ENV: &str = "DISCORD_USER_ID";

fn init_tracing(args: &Args) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(args.log_level.directive()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => args::exit_argument_error(err),
    };
    init_tracing(&args);

    if args.wipe_preserve_cache {
        return wipe_cache(&args);
    }

    let token = env::var(TOKEN_ENV).with_context(|| format!("{TOKEN_ENV} is not set"))?;
    let store = DiscordStore::new(token, args.retry_policy())
        .context("could not build the HTTP client")?;

    let tree = discover(&store).await.context("channel discovery failed")?;
    let resolver = args.scope_resolver();

    if args.list_guilds {
        print!("{}", discovery::render_guilds(&tree, args.json));
        if args.json {
            println!();
        }
        return Ok(());
    }
    if args.list_channels {
        print!("{}", discovery::render_channels(&tree, &resolver, args.json));
        if args.json {
            println!();
        }
        return Ok(());
    }

    let channels = resolver.resolve(&tree.channels);
    if channels.is_empty() {
        if resolver.has_includes() {
            tracing::warn!("The include and exclude lists resolve to no channels; nothing to do");
        } else {
            tracing::warn!("No processable channels discovered; nothing to do");
        }
        report(&RunSummary::default(), &args);
        return Ok(());
    }

    let user = resolve_user(&store).await?;
    tracing::info!(%user, channels = channels.len(), dry_run = args.dry_run, "Starting sweep");

    let cache = load_cache(&args)?;
    let cancel = CancelFlag::new();
    spawn_interrupt_handler(cancel.clone());

    let mut sweeper = Sweeper::new(
        &store,
        args.retention_policy(user),
        args.sweep_options(chrono::Utc::now()),
        cache,
    );
    let summary = sweeper.run(&channels, &cancel).await?;
    report(&summary, &args);
    Ok(())
}

/// The user whose messages are swept: an explicit override from the
/// environment, otherwise whoever the token authenticates as.
async fn resolve_user(store: &DiscordStore) -> Result<UserId> {
    if let Ok(raw) = env::var(USER_ID_ENV) {
        return raw
            .parse()
            .with_context(|| format!("{USER_ID_ENV} is not a valid user ID"));
    }
    store
        .resolve_current_user_id()
        .await
        .context("could not resolve the current user from the token")
}

fn cache_path(args: &Args) -> Result<std::path::PathBuf> {
    if let Some(path) = &args.preserve_cache_path {
        return Ok(path.clone());
    }
    match PreserveCache::default_path() {
        Some(path) => Ok(path),
        None => bail!("no data directory available; pass --preserve-cache-path"),
    }
}

fn load_cache(args: &Args) -> Result<Option<PreserveCache>> {
    if !args.cache_enabled() {
        return Ok(None);
    }
    Ok(Some(PreserveCache::load(cache_path(args)?)))
}

fn wipe_cache(args: &Args) -> Result<()> {
    let path = cache_path(args)?;
    let existed =
        PreserveCache::wipe(&path).with_context(|| format!("could not delete {}", path.display()))?;
    if existed {
        println!("Deleted preserve cache at {}", path.display());
    } else {
        println!("No preserve cache at {}", path.display());
    }
    Ok(())
}

fn spawn_interrupt_handler(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received; finishing the current step then stopping");
            cancel.cancel();
        }
    });
}

fn report(summary: &RunSummary, args: &Args) {
    if args.json {
        match serde_json::to_string(summary) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::error!(error = %e, "Could not serialize the run summary"),
        }
        return;
    }
    let deleted_label = if args.dry_run {
        "would delete"
    } else {
        "deleted"
    };
    println!(
        "Channels processed: {}\nMessages classified: {}\nPreserved: {}\nMessages {}: {}\nReactions removed: {}\nReactions preserved: {}\nFailed operations: {}",
        summary.channels,
        summary.processed,
        summary.preserved,
        deleted_label,
        summary.deleted,
        summary.reactions_removed,
        summary.reactions_preserved,
        summary.failed,
    );
}
