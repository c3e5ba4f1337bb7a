//! PostgreSQL implementation of [`Warehouse`].

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sync_core::{ColumnDefinition, EntityConfig, EntityType, StagedRecord, SyncError};
use tokio::sync::Mutex;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, NoTls};

use crate::{sql, validate_rows, Warehouse};

/// PostgreSQL connection options
#[derive(Clone, Debug)]
pub struct WarehouseOpts {
    pub connection_string: String,
    /// Schema that holds the stage and permanent tables
    pub dataset: String,
}

/// Warehouse backed by a PostgreSQL schema.
pub struct PostgresWarehouse {
    client: Mutex<Client>,
    dataset: String,
}

impl PostgresWarehouse {
    /// Wrap an existing client. The dataset schema must already exist.
    pub fn new(client: Client, dataset: impl Into<String>) -> Self {
        Self {
            client: Mutex::new(client),
            dataset: dataset.into(),
        }
    }

    /// Connect, pin the session to UTC and create the dataset schema if needed.
    pub async fn connect(opts: &WarehouseOpts) -> anyhow::Result<Self> {
        tracing::debug!("Connecting to warehouse (dataset: {})", opts.dataset);

        let (client, connection) = tokio_postgres::connect(&opts.connection_string, NoTls)
            .await
            .context("Failed to connect to the warehouse")?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {e}");
            }
        });

        client
            .batch_execute("SET TIME ZONE 'UTC'")
            .await
            .context("Failed to set warehouse session time zone")?;
        client
            .batch_execute(&sql::create_schema_sql(&opts.dataset))
            .await
            .with_context(|| format!("Failed to create dataset schema '{}'", opts.dataset))?;

        Ok(Self::new(client, opts.dataset.clone()))
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }
}

/// Render a PostgreSQL error with the server's message when there is one.
fn describe(e: &tokio_postgres::Error) -> String {
    match e.as_db_error() {
        Some(db) => format!("{} ({})", db.message(), db.code().code()),
        None => e.to_string(),
    }
}

/// Errors caused by the rows themselves rather than by the store.
fn is_row_error(e: &tokio_postgres::Error) -> bool {
    match e.code() {
        Some(code) => {
            code.code().starts_with("22")
                || *code == SqlState::UNDEFINED_COLUMN
                || *code == SqlState::NOT_NULL_VIOLATION
        }
        None => false,
    }
}

#[async_trait]
impl Warehouse for PostgresWarehouse {
    async fn max_increment(
        &self,
        entity: EntityType,
        incre_key: &str,
    ) -> Result<Option<DateTime<Utc>>, SyncError> {
        let table = entity.table_name();
        let query = sql::max_increment_sql(&self.dataset, table, incre_key);
        tracing::debug!("Executing watermark query: {query}");

        let store_error = |e: tokio_postgres::Error| SyncError::StoreError {
            table: table.to_string(),
            message: describe(&e),
        };

        let client = self.client.lock().await;
        match client.query_one(query.as_str(), &[]).await {
            Ok(row) => row
                .try_get::<_, Option<DateTime<Utc>>>("incre")
                .map_err(store_error),
            Err(e) if e.code() == Some(&SqlState::UNDEFINED_TABLE) => Ok(None),
            Err(e) => Err(store_error(e)),
        }
    }

    async fn append_to_stage(
        &self,
        entity: EntityType,
        schema: &[ColumnDefinition],
        rows: &[StagedRecord],
    ) -> Result<u64, SyncError> {
        validate_rows(entity, schema, rows)?;
        if rows.is_empty() {
            return Ok(0);
        }

        let stage = entity.stage_table_name();
        let store_error = |message: String| SyncError::StoreError {
            table: stage.clone(),
            message,
        };

        let client = self.client.lock().await;
        client
            .batch_execute(&sql::create_table_sql(&self.dataset, &stage, schema, None))
            .await
            .map_err(|e| store_error(describe(&e)))?;

        let payload = Value::Array(rows.iter().cloned().map(Value::Object).collect());
        let load = sql::stage_load_sql(&self.dataset, &stage, schema);
        let written = client
            .execute(load.as_str(), &[&payload])
            .await
            .map_err(|e| {
                if is_row_error(&e) {
                    SyncError::SchemaMismatch {
                        table: stage.clone(),
                        message: describe(&e),
                    }
                } else {
                    store_error(describe(&e))
                }
            })?;

        tracing::debug!("Appended {written} rows to {stage}");
        Ok(written)
    }

    async fn merge_from_stage(
        &self,
        entity: EntityType,
        config: &EntityConfig,
    ) -> Result<u64, SyncError> {
        let table = entity.table_name();
        let stage = entity.stage_table_name();
        let merge_failure = |e: tokio_postgres::Error| SyncError::MergeFailure {
            table: table.to_string(),
            message: describe(&e),
        };

        let mut client = self.client.lock().await;
        let tx = client.transaction().await.map_err(merge_failure)?;

        tx.batch_execute(&sql::create_table_sql(
            &self.dataset,
            &stage,
            &config.schema,
            None,
        ))
        .await
        .map_err(merge_failure)?;
        tx.batch_execute(&sql::create_table_sql(
            &self.dataset,
            table,
            &config.schema,
            Some(&config.keys.p_key),
        ))
        .await
        .map_err(merge_failure)?;

        let merge = sql::merge_sql(&self.dataset, table, &stage, config);
        tracing::debug!("Executing merge: {merge}");
        let merged = tx.execute(merge.as_str(), &[]).await.map_err(merge_failure)?;

        tx.batch_execute(&sql::truncate_sql(&self.dataset, &stage))
            .await
            .map_err(merge_failure)?;
        tx.commit().await.map_err(merge_failure)?;

        tracing::info!("Merged {merged} rows from {stage} into {table}");
        Ok(merged)
    }
}
