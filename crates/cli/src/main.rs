mod commands;
mod metrics;
mod render;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plexdl_core::{load_config, validate_config, DownloadService};

use commands::{Command, HELP};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Determine config path
    let config_path = std::env::var("PLEXDL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Download tool: {}", config.download.program);
    for library in &config.libraries {
        info!("Library {} ({}) at {:?}", library.name, library.kind, library.root);
    }

    let service = Arc::new(DownloadService::new(config));
    Lazy::force(&metrics::REGISTRY);

    // Print job events as they happen
    let mut events = service.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => println!("{}", render::render_event(&event)),
                Err(RecvError::Lagged(skipped)) => debug!("Skipped {} job events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    info!("plexdl v{} ready, type 'help' for commands", VERSION);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            line = lines.next_line() => {
                let line = match line.context("Failed to read from stdin")? {
                    Some(line) => line,
                    None => break,
                };
                match commands::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => {
                        if let Err(e) = execute(&service, command).await {
                            println!("Error: {:#}", e);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => println!("Error: {:#}", e),
                }
            }
        }
    }

    // Cancel everything still running or queued
    let counts = service.cancel_all().await;
    if !counts.is_empty() {
        warn!(
            "Cancelled {} running and {} queued downloads on exit",
            counts.running, counts.queued
        );
    }
    printer.abort();

    info!("Shutdown complete");
    Ok(())
}

async fn execute(service: &DownloadService, command: Command) -> Result<()> {
    match command {
        Command::Get(request) => {
            let label = request.label().to_string();
            let (position, task_id) = service
                .submit(request)
                .await
                .context("Could not queue download")?;
            if position > 1 {
                println!("⏳ #{} {} added to queue (position {}).", task_id, label, position);
            } else {
                println!("#{} {} queued.", task_id, label);
            }
        }
        Command::Queue { session, json } => {
            let snapshot = service.queue().snapshot(session.as_ref()).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                println!("{}", render::render_queue(&snapshot));
            }
        }
        Command::Content { session, json } => {
            let snapshot = service.queue().snapshot_by_content(session.as_ref()).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                println!("{}", render::render_content(&snapshot));
            }
        }
        Command::Cancel { session, task_id } => {
            let counts = service.cancel(&session, task_id).await;
            if counts.is_empty() {
                println!("No task #{} for session {}.", task_id, session);
            } else {
                println!(
                    "Cancelled {} running and {} queued task(s).",
                    counts.running, counts.queued
                );
            }
        }
        Command::CancelAll(session) => {
            let counts = service.cancel_session(&session).await;
            println!(
                "Cancelled {} running and {} queued task(s) for {}.",
                counts.running, counts.queued, session
            );
        }
        Command::Metrics => {
            metrics::collect_dynamic_metrics(service.queue()).await;
            print!("{}", metrics::encode_metrics());
        }
        Command::Help => println!("{}", HELP),
        // Handled by the input loop
        Command::Quit => {}
    }
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
