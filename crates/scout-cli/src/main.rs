use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use scout_client::{ApifySource, SupabaseSink, TelegramNotifier};
use scout_core::config::{AppConfig, Secrets};
use scout_core::delivery::{DeliveryMode, DeliveryService};
use scout_core::filter::FilterEngine;
use scout_core::normalize::Normalizer;
use scout_core::pipeline::RunService;
use scout_db::Database;

#[derive(Parser)]
#[command(name = "scout", version, about = "Job-listing pipeline: scrape, filter, notify")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one pipeline run
    Run {
        /// Path to the TOML configuration file
        #[arg(short, long, default_value = "scout.toml")]
        config: PathBuf,

        /// Go through the full pipeline without sending notifications
        /// or syncing remotely
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Show recent run records from the local ledger
    History {
        /// Path to the TOML configuration file
        #[arg(short, long, default_value = "scout.toml")]
        config: PathBuf,

        /// Number of runs to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("scout=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, dry_run } => {
            let config = load_config(&config)?;
            cmd_run(&config, dry_run).await?;
        }
        Commands::History { config, limit } => {
            let config = load_config(&config)?;
            cmd_history(&config, limit).await?;
        }
    }

    Ok(())
}

/// Read and validate the TOML configuration file.
fn load_config(path: &Path) -> Result<AppConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: AppConfig =
        toml::from_str(&raw).with_context(|| format!("Invalid config: {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

async fn cmd_run(config: &AppConfig, dry_run: bool) -> Result<()> {
    let secrets = Secrets::from_env();
    let db = connect_db(config).await?;

    // A missing Apify token still starts the run; each source then
    // fails its fetch and is contained to zero results.
    let source = ApifySource::new(secrets.apify_token.clone().unwrap_or_default())?;

    let mut normalizer = Normalizer::new();
    for source_config in &config.sources {
        if let Some(mapping) = &source_config.mapping {
            normalizer.register(source_config.name.clone(), mapping.clone());
        }
    }

    let filter = FilterEngine::compile(&config.filters)?;

    let mode = if dry_run {
        DeliveryMode::DryRun
    } else if secrets.telegram_bot_token.is_some() && secrets.telegram_chat_id.is_some() {
        DeliveryMode::Live
    } else {
        tracing::warn!("Telegram credentials not set, notifications disabled");
        DeliveryMode::Disabled
    };

    // The notifier is only ever called in Live mode, where both
    // credentials are present.
    let notifier = TelegramNotifier::new(
        secrets.telegram_bot_token.clone().unwrap_or_default(),
        secrets.telegram_chat_id.clone().unwrap_or_default(),
    )?;
    let delivery = DeliveryService::new(notifier, &config.delivery, mode);

    let sink = build_sink(config, &secrets, dry_run)?;

    let summary = match sink {
        Some(sink) => {
            RunService::with_sink(
                source,
                config.sources.clone(),
                normalizer,
                filter,
                delivery,
                db.ledger(),
                sink,
            )
            .execute()
            .await?
        }
        None => {
            RunService::<_, _, _, SupabaseSink>::new(
                source,
                config.sources.clone(),
                normalizer,
                filter,
                delivery,
                db.ledger(),
            )
            .execute()
            .await?
        }
    };

    println!(
        "Run {} complete in {:.1}s: {} found, {} sent, {} filtered",
        summary.run_id,
        summary.elapsed.num_milliseconds() as f64 / 1000.0,
        summary.found,
        summary.sent,
        summary.filtered,
    );

    Ok(())
}

async fn cmd_history(config: &AppConfig, limit: usize) -> Result<()> {
    let db = connect_db(config).await?;
    let runs = db.ledger().recent_runs(limit).await?;

    if runs.is_empty() {
        println!("No runs recorded in {}", config.database.path);
        return Ok(());
    }

    println!("Recent runs ({}):\n", config.database.path);

    for run in &runs {
        let status = if run.error.is_some() {
            "FAILED"
        } else if run.finished_at.is_some() {
            "ok"
        } else {
            "incomplete"
        };

        let duration = match run.finished_at {
            Some(finished) => {
                let elapsed = finished - run.started_at;
                format!("{:.1}s", elapsed.num_milliseconds() as f64 / 1000.0)
            }
            None => "-".to_string(),
        };

        println!(
            "  [{}] {} {} found={} sent={} ({})",
            status,
            run.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            run.id,
            run.found_count,
            run.sent_count,
            duration,
        );
        if let Some(error) = &run.error {
            println!("           {error}");
        }
    }

    println!("\nTotal: {} runs", runs.len());

    Ok(())
}

/// Open the SQLite ledger and apply migrations.
async fn connect_db(config: &AppConfig) -> Result<Database> {
    let db = Database::connect(&config.database)
        .await
        .context("Failed to open database")?;
    db.migrate().await.context("Migration failed")?;
    Ok(db)
}

/// Decide whether this run mirrors to Supabase.
fn build_sink(config: &AppConfig, secrets: &Secrets, dry_run: bool) -> Result<Option<SupabaseSink>> {
    if dry_run || !config.sync.enabled {
        tracing::info!("Remote sync disabled for this run");
        return Ok(None);
    }
    match (&secrets.supabase_url, &secrets.supabase_service_key) {
        (Some(url), Some(key)) => Ok(Some(SupabaseSink::new(
            url,
            key,
            &config.sync.table,
            config.sync.batch_size,
        )?)),
        _ => {
            tracing::warn!("Supabase credentials not set, remote sync skipped");
            Ok(None)
        }
    }
}
