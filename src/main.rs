use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::{Parser, Subcommand};
use reqwest::Client;
use tlcingest::{
    bq::Warehouse,
    config::Config,
    fetch,
    gcs::Gcs,
    ingest::Ingestor,
    schema::SchemaRegistry,
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(about = "NYC TLC trip data pipeline: release host -> GCS -> BigQuery")]
struct Args {
    /// Pipeline configuration file
    #[arg(long, default_value = "tlcingest.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download monthly archives, convert to parquet, upload to the bucket
    Fetch,
    /// Load bucket objects into the warehouse
    Ingest {
        /// Override the configured cast-before-load behaviour
        #[arg(long)]
        clean: Option<bool>,
    },
    /// Fetch then ingest
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)?;
    info!(bucket = %cfg.bucket, dataset = %cfg.dataset, "startup");

    match args.command {
        Command::Fetch => {
            let client = Client::new();
            let gcs = Arc::new(Gcs::connect().await?);
            fetch::run(&client, &gcs, &cfg).await?;
        }
        Command::Ingest { clean } => {
            if let Some(clean) = clean {
                cfg.clean = clean;
            }
            run_ingest(&cfg).await?;
        }
        Command::Run => {
            let client = Client::new();
            let gcs = Arc::new(Gcs::connect().await?);
            fetch::run(&client, &gcs, &cfg).await?;
            run_ingest(&cfg).await?;
        }
    }

    Ok(())
}

async fn run_ingest(cfg: &Config) -> Result<()> {
    let gcs = Gcs::connect().await?;
    let warehouse = Warehouse::connect().await?;
    let registry = SchemaRegistry::builtin();

    let ingestor = Ingestor {
        gcs: &gcs,
        warehouse: &warehouse,
        registry: &registry,
        cfg,
    };
    let outcomes = ingestor.run().await?;

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} objects failed to ingest", outcomes.len());
    }
    Ok(())
}
