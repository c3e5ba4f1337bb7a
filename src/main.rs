//! Command-line interface for salesrabbit-sync
//!
//! # Usage Examples
//!
//! ```bash
//! # Sync one table from an explicit start date
//! salesrabbit-sync sync --table Leads --start 2021-08-17 \
//!   --access-token $ACCESS_TOKEN \
//!   --warehouse-url postgres://etl@localhost/analytics
//!
//! # Publish a sync trigger for both tables
//! salesrabbit-sync broadcast --kafka-brokers localhost:9092 --topic salesrabbit
//!
//! # Handle a push envelope (inline JSON, or `-` for stdin)
//! salesrabbit-sync handle '{"message":{"data":"eyJ0YWJsZSI6IkxlYWRzIn0="}}'
//! ```
//!
//! Every option can also be set through the environment variable named in
//! `--help`. Results are printed to stdout as JSON.

use anyhow::Context;
use clap::{Parser, Subcommand};
use kafka_producer::KafkaPublisher;
use salesrabbit_source::SalesRabbitClient;
use salesrabbit_sync::{
    broadcast, handle, KafkaOpts, PushEnvelope, SalesRabbitOpts, SyncJob, WarehouseOpts,
};
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use sync_core::EntityType;
use warehouse::PostgresWarehouse;

#[derive(Parser)]
#[command(name = "salesrabbit-sync")]
#[command(about = "Incrementally sync SalesRabbit leads into an analytical store")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync one table
    Sync {
        /// Table to sync (Leads or LeadStatusHistories)
        #[arg(long)]
        table: EntityType,

        /// Start date (YYYY-MM-DD); defaults to the table's latest synced value
        #[arg(long)]
        start: Option<String>,

        #[command(flatten)]
        salesrabbit: SalesRabbitOpts,

        #[command(flatten)]
        warehouse: WarehouseOpts,

        /// Directory with <Table>.json entity configs overriding the built-in ones
        #[arg(long, env = "ENTITY_CONFIG_DIR")]
        config_dir: Option<PathBuf>,
    },

    /// Publish a sync trigger for every table
    Broadcast {
        /// Start date carried by every trigger
        #[arg(long)]
        start: Option<String>,

        #[command(flatten)]
        kafka: KafkaOpts,
    },

    /// Handle a push envelope carrying a base64 trigger
    Handle {
        /// Envelope JSON, or `-` to read it from stdin
        envelope: String,

        #[command(flatten)]
        salesrabbit: SalesRabbitOpts,

        #[command(flatten)]
        warehouse: WarehouseOpts,

        #[command(flatten)]
        kafka: KafkaOpts,

        /// Directory with <Table>.json entity configs overriding the built-in ones
        #[arg(long, env = "ENTITY_CONFIG_DIR")]
        config_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync {
            table,
            start,
            salesrabbit,
            warehouse: warehouse_opts,
            config_dir,
        } => {
            let client = SalesRabbitClient::new((&salesrabbit).into())?;
            let store = PostgresWarehouse::connect(&(&warehouse_opts).into()).await?;
            let job = SyncJob::new(&client, &store).with_config_dir(config_dir.as_deref());

            let result = job
                .run(table, start.as_deref())
                .await
                .with_context(|| format!("Sync of {table} failed"))?;
            print_json(&result)?;
        }
        Commands::Broadcast { start, kafka } => {
            let publisher = KafkaPublisher::new(&(&kafka).into())?;
            let start = start.map(serde_json::Value::String).unwrap_or_default();
            let result = broadcast(&publisher, &start)
                .await
                .context("Broadcast failed")?;
            print_json(&result)?;
        }
        Commands::Handle {
            envelope,
            salesrabbit,
            warehouse: warehouse_opts,
            kafka,
            config_dir,
        } => {
            let envelope = read_envelope(&envelope)?;
            let trigger = PushEnvelope::from_json(&envelope)?.trigger()?;
            tracing::info!("Decoded trigger: {trigger:?}");

            let client = SalesRabbitClient::new((&salesrabbit).into())?;
            let store = PostgresWarehouse::connect(&(&warehouse_opts).into()).await?;
            let publisher = KafkaPublisher::new(&(&kafka).into())?;
            let job = SyncJob::new(&client, &store).with_config_dir(config_dir.as_deref());

            let response = handle(trigger, &job, &publisher)
                .await
                .context("Failed to handle trigger")?;
            print_json(&response)?;
        }
    }

    Ok(())
}

fn read_envelope(arg: &str) -> anyhow::Result<String> {
    if arg != "-" {
        return Ok(arg.to_string());
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read envelope from stdin")?;
    Ok(buf)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
