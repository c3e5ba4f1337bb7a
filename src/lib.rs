//! SalesRabbit sync library
//!
//! Incrementally copies SalesRabbit leads and lead status histories into an
//! analytical store, and fans out sync triggers for both tables.
//!
//! # Flow
//!
//! A sync run for one table:
//! 1. Resolves the watermark (explicit start date, or the table's latest increment value)
//! 2. Fetches every page changed since the watermark
//! 3. Flattens the pages into rows matching the table schema
//! 4. Appends the rows to the table's stage and merges the stage into the table
//!
//! A broadcast run publishes one `{table, start}` trigger per table.
//!
//! # CLI Usage
//!
//! ```bash
//! # Sync leads changed since a date
//! salesrabbit-sync sync --table Leads --start 2021-08-17
//!
//! # Sync status histories from where the last run left off
//! salesrabbit-sync sync --table LeadStatusHistories
//!
//! # Publish a trigger for every table
//! salesrabbit-sync broadcast
//!
//! # Handle a push envelope read from stdin
//! echo '{"message":{"data":"eyJ0YWJsZSI6IkxlYWRzIn0="}}' | salesrabbit-sync handle -
//! ```

use clap::Parser;

pub mod broadcast;
pub mod sync;
pub mod trigger;

pub use broadcast::broadcast;
pub use sync::{SyncJob, SyncState};
pub use trigger::{handle, HandlerResponse, PushEnvelope, RunOutcome, Trigger};

#[derive(Parser, Clone, Debug)]
pub struct SalesRabbitOpts {
    /// SalesRabbit API root URL
    #[arg(
        long,
        default_value = salesrabbit_source::DEFAULT_BASE_URL,
        env = "SALESRABBIT_BASE_URL"
    )]
    pub salesrabbit_base_url: String,

    /// SalesRabbit API access token
    #[arg(long, env = "ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,

    /// Records requested per page
    #[arg(long, default_value_t = salesrabbit_source::DEFAULT_PAGE_SIZE)]
    pub page_size: u32,
}

#[derive(Parser, Clone, Debug)]
pub struct WarehouseOpts {
    /// PostgreSQL connection string of the analytical store
    #[arg(long, env = "WAREHOUSE_URL", hide_env_values = true)]
    pub warehouse_url: String,

    /// Schema holding the stage and permanent tables
    #[arg(long, default_value = warehouse::DEFAULT_DATASET, env = "DATASET")]
    pub dataset: String,
}

#[derive(Parser, Clone, Debug)]
pub struct KafkaOpts {
    /// Kafka bootstrap servers
    #[arg(long, default_value = "localhost:9092", env = "KAFKA_BROKERS")]
    pub kafka_brokers: String,

    /// Topic that broadcast triggers are published to
    #[arg(long, env = "TOPIC_ID")]
    pub topic: String,
}

// CLI type → library type conversions
impl From<&SalesRabbitOpts> for salesrabbit_source::SalesRabbitOpts {
    fn from(opts: &SalesRabbitOpts) -> Self {
        Self {
            base_url: opts.salesrabbit_base_url.clone(),
            access_token: opts.access_token.clone(),
            page_size: opts.page_size,
        }
    }
}

impl From<&WarehouseOpts> for warehouse::WarehouseOpts {
    fn from(opts: &WarehouseOpts) -> Self {
        Self {
            connection_string: opts.warehouse_url.clone(),
            dataset: opts.dataset.clone(),
        }
    }
}

impl From<&KafkaOpts> for kafka_producer::KafkaOpts {
    fn from(opts: &KafkaOpts) -> Self {
        kafka_producer::KafkaOpts::new(opts.kafka_brokers.clone(), opts.topic.clone())
    }
}
