//! Analytical table store access for salesrabbit-sync.
//!
//! Rows reach a permanent table in two steps:
//!
//! 1. **Append to stage**: validated rows are appended to `_stage_<Table>`,
//!    which is created on first use and never replaced.
//! 2. **Merge to permanent**: staged rows are upserted into `<Table>` by
//!    primary key, keeping the newest row per key and only overwriting a stored
//!    row whose increment value is older (or NULL). The stage is then
//!    truncated in the same transaction.
//!
//! The permanent table's increment column doubles as the durable watermark:
//! [`Warehouse::max_increment`] reads it back at the start of the next run.
//!
//! ## Implementations
//!
//! - [`PostgresWarehouse`] - tables in a dedicated PostgreSQL schema
//! - [`MemoryWarehouse`] - in-process tables with the same semantics

mod memory;
mod postgres;
pub mod sql;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sync_core::{ColumnDefinition, EntityConfig, EntityType, StagedRecord, SyncError};

pub use memory::MemoryWarehouse;
pub use postgres::{PostgresWarehouse, WarehouseOpts};

/// Default schema (dataset) holding the SalesRabbit tables.
pub const DEFAULT_DATASET: &str = "SalesRabbit";

/// Trait for the stage-and-merge target store.
///
/// Source crates take the store as a generic or trait object so a run can be
/// wired to PostgreSQL in production and to [`MemoryWarehouse`] in tests.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Largest increment value in the entity's permanent table.
    ///
    /// Returns `Ok(None)` when the table is empty or does not exist yet.
    /// Fails with `StoreError` when the store cannot be queried.
    async fn max_increment(
        &self,
        entity: EntityType,
        incre_key: &str,
    ) -> Result<Option<DateTime<Utc>>, SyncError>;

    /// Append rows to the entity's stage table, creating it if absent.
    ///
    /// Every row is checked against `schema` before anything is written; a
    /// single bad row rejects the whole load with `SchemaMismatch`.
    /// Returns the number of rows written.
    async fn append_to_stage(
        &self,
        entity: EntityType,
        schema: &[ColumnDefinition],
        rows: &[StagedRecord],
    ) -> Result<u64, SyncError>;

    /// Merge the stage table into the permanent table and clear the stage.
    ///
    /// Returns the number of permanent rows inserted or updated.
    async fn merge_from_stage(
        &self,
        entity: EntityType,
        config: &EntityConfig,
    ) -> Result<u64, SyncError>;
}

/// Validate every row before a stage load.
pub(crate) fn validate_rows(
    entity: EntityType,
    schema: &[ColumnDefinition],
    rows: &[StagedRecord],
) -> Result<(), SyncError> {
    for (idx, row) in rows.iter().enumerate() {
        sync_core::validate_row(schema, row).map_err(|message| SyncError::SchemaMismatch {
            table: entity.table_name().to_string(),
            message: format!("row {idx}: {message}"),
        })?;
    }
    Ok(())
}
