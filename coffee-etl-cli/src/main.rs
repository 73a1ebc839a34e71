//! coffee-etl CLI — runs the coffee survey ETL pipeline once.

use anyhow::Context;
use clap::Parser;
use coffee_etl::config::{CliOverrides, EtlConfig, LoggingConfig, load_config};
use coffee_etl::{EtlPipeline, PipelineReport};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Run ETL pipeline
#[derive(Parser, Debug)]
#[command(name = "coffee-etl", version, about, long_about = None)]
struct Cli {
    /// Output data path (.csv or .parquet) [default: data/processed/cleaned_data.csv]
    #[arg(long)]
    output: Option<PathBuf>,

    /// Optional local file path to load instead of the remote dataset
    #[arg(long)]
    local_file: Option<PathBuf>,
}

/// Human-readable progress on stdout, plus JSON file logging when configured.
fn init_tracing(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stdout)
        .with_filter(console_filter);

    let (json_layer, guard) = match &logging.json_dir {
        Some(dir) if std::fs::create_dir_all(dir).is_ok() => {
            let file_appender = tracing_appender::rolling::daily(dir, "coffee-etl.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new("debug"));
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(json_layer)
        .init();
    guard
}

fn resolve_config(cli: Cli) -> anyhow::Result<EtlConfig> {
    let workspace = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let overrides = CliOverrides::new(cli.output, cli.local_file);
    load_config(&workspace, &overrides).context("Configuration error")
}

/// Run the pipeline once, logging a fatal error before handing it back.
async fn run(config: EtlConfig) -> anyhow::Result<PipelineReport> {
    EtlPipeline::new(config).run().await.map_err(|err| {
        tracing::error!("ETL pipeline failed: {err}");
        anyhow::Error::new(err).context("ETL pipeline failed")
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = resolve_config(cli)?;
    let _guard = init_tracing(&config.logging);

    run(config).await?;
    Ok(())
}
