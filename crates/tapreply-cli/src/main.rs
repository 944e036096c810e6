use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use tapreply_core::{build_engine, load_config, AppConfig};
use tapreply_memory::{HistoryStore, WeightEntry, WeightStore};
use tapreply_server::state::AppState;

#[derive(Parser)]
#[command(name = "tapreply", version, about = "tap-to-speak reply suggestion service")]
struct Cli {
    #[arg(
        long,
        default_value = "~/.tapreply",
        help = "Root directory (contains config/, data/ and logs/)"
    )]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Load stores and serve the HTTP API")]
    Start {
        #[arg(long, help = "Override the port of the configured bind address")]
        port: Option<u16>,
    },
    #[command(about = "Validate config and print the effective deployment")]
    Validate,
    #[command(subcommand, about = "Inspect learned weights")]
    Weights(WeightCommands),
    #[command(subcommand, about = "Manage conversation history")]
    History(HistoryCommands),
}

#[derive(Subcommand)]
enum WeightCommands {
    #[command(about = "List stored weights, highest first")]
    List {
        #[arg(long, help = "Only show weights for this context")]
        context: Option<String>,
    },
}

#[derive(Subcommand)]
enum HistoryCommands {
    #[command(about = "Clear one session, or every session when none is given")]
    Clear {
        #[arg(long, help = "Session ID")]
        session: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    cli.root = expand_home(&cli.root);

    let log_dir = cli.root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "tapreply.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = load_config(&cli.root.join("config"))?;

    match command {
        Commands::Start { port } => {
            let addr = bind_addr(&config.server.bind, port);
            let engine = build_engine(&cli.root, &config).await?;
            tapreply_server::serve(AppState::new(engine), &addr).await?;
        }
        Commands::Validate => {
            print!("{}", describe_deployment(&config));
        }
        Commands::Weights(WeightCommands::List { context }) => {
            let store = WeightStore::open(config.storage.weights_path(&cli.root)).await;
            let entries = store.entries().await;
            let mut shown = 0;
            for entry in &entries {
                if context.as_deref().is_some_and(|c| c != entry.context) {
                    continue;
                }
                println!("{}", format_entry(entry));
                shown += 1;
            }
            if shown == 0 {
                println!("No weights recorded.");
            }
        }
        Commands::History(HistoryCommands::Clear { session }) => {
            let store = HistoryStore::open(
                config.storage.history_path(&cli.root),
                config.history.max_exchanges_per_session,
            )
            .await;
            match session {
                Some(id) => {
                    let removed = store
                        .clear_session(&id)
                        .await
                        .with_context(|| format!("clearing session {id}"))?;
                    if removed {
                        println!("Cleared session {id}.");
                    } else {
                        println!("No history for session {id}.");
                    }
                }
                None => {
                    let count = store.session_count().await;
                    store.clear_all().await.context("clearing history")?;
                    println!("Cleared {count} session(s).");
                }
            }
        }
    }

    Ok(())
}

fn expand_home(path: &Path) -> PathBuf {
    if !path.starts_with("~") {
        return path.to_path_buf();
    }
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(path.strip_prefix("~").unwrap_or(path)),
        None => path.to_path_buf(),
    }
}

/// Replaces the port of `bind` when `port` is given.
fn bind_addr(bind: &str, port: Option<u16>) -> String {
    let Some(port) = port else {
        return bind.to_string();
    };
    let host = bind.rsplit_once(':').map(|(host, _)| host).unwrap_or(bind);
    format!("{host}:{port}")
}

fn format_entry(entry: &WeightEntry) -> String {
    format!(
        "{:>5}  {:<12} {:<11} {}",
        entry.weight, entry.context, entry.intent, entry.text
    )
}

fn describe_deployment(config: &AppConfig) -> String {
    let suggestions = &config.suggestions;
    let credential = if config.provider.api_key().is_some() {
        "present"
    } else {
        "missing (phrase bank only)"
    };
    format!(
        "Config valid.\n\
         bind: {}\n\
         history-aware: {}\n\
         suggestions per request: {}\n\
         model: {}\n\
         credential ({}): {}\n",
        config.server.bind,
        suggestions.history_aware,
        suggestions.candidate_count(),
        config.provider.model,
        config.provider.api_key_env,
        credential,
    )
}
