use anyhow::{Context as _, Result};
use clap::{CommandFactory, Parser};
use colored::Colorize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use nexora_queue::cli::args::{Cli, Commands};
use nexora_queue::cli::commands::{self, Context};
use nexora_queue::config::{Config, Paths};
use nexora_queue::error::QueueError;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {:#}", "error".red().bold(), e);
        let code = e.downcast_ref::<QueueError>().map_or(1, QueueError::exit_code);
        std::process::exit(code);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    init_logging(&config.logging.level, cli.verbose);

    if let Some(base_url) = cli.base_url {
        config.network.base_url = base_url;
    }

    let db_path = match cli.db {
        Some(path) => path,
        None => {
            let paths = Paths::new()?;
            paths.ensure_dirs()?;
            paths.database
        },
    };

    let ctx = Context {
        format: cli.output.unwrap_or(config.general.default_output),
        config,
        db_path,
    };

    let output = match cli.command {
        Commands::Enqueue {
            queue_type,
            payload,
        } => commands::enqueue(&ctx, &queue_type, &payload)?,
        Commands::Peek { queue_type } => commands::peek(&ctx, &queue_type)?,
        Commands::Status => commands::status(&ctx)?,
        Commands::Drain { queue_type, all } => {
            commands::drain(&ctx, queue_type.as_deref(), all)?
        },
        Commands::Send {
            queue_type,
            payload,
            offline,
        } => commands::send(&ctx, &queue_type, &payload, offline)?,
        Commands::Trigger { tag } => commands::trigger(&ctx, &tag)?,
        Commands::Push { body } => commands::push(&ctx, &body)?,
        Commands::Clear { force } => commands::clear(&ctx, force)?,
        Commands::Worker { no_watch } => commands::worker(&ctx, no_watch)
            .with_context(|| format!("worker on {}", ctx.db_path.display()))?,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "nexora-queue", &mut std::io::stdout());
            String::new()
        },
    };

    if !output.is_empty() {
        println!("{output}");
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise the config level, raised by each `-v`.
fn init_logging(level: &str, verbose: u8) {
    let level = match verbose {
        0 => level,
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
