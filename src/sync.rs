//! Sync run for one table
//!
//! # States
//!
//! ```text
//! Idle → WatermarkResolved → Fetched ─┬─ Transformed → Staged → Merged ─┬→ Done
//!                                     └─ Empty ─────────────────────────┘
//! ```
//!
//! Every transition is logged. Any failing step ends the run with its error;
//! there is no partial `Done`.

use salesrabbit_source::{transform, SalesRabbitClient};
use std::fmt;
use std::path::Path;
use sync_core::{EntityConfig, EntityType, SyncError, SyncResult};
use warehouse::Warehouse;
use watermark::resolve_watermark;

/// Phases of a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    Idle,
    WatermarkResolved,
    Fetched,
    /// Nothing changed since the watermark
    Empty,
    Transformed,
    Staged,
    Merged,
    Done,
}

impl SyncState {
    pub fn as_str(&self) -> &str {
        match self {
            SyncState::Idle => "idle",
            SyncState::WatermarkResolved => "watermark_resolved",
            SyncState::Fetched => "fetched",
            SyncState::Empty => "empty",
            SyncState::Transformed => "transformed",
            SyncState::Staged => "staged",
            SyncState::Merged => "merged",
            SyncState::Done => "done",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs syncs against the handles it was built with.
pub struct SyncJob<'a> {
    client: &'a SalesRabbitClient,
    warehouse: &'a dyn Warehouse,
    config_dir: Option<&'a Path>,
}

impl<'a> SyncJob<'a> {
    pub fn new(client: &'a SalesRabbitClient, warehouse: &'a dyn Warehouse) -> Self {
        Self {
            client,
            warehouse,
            config_dir: None,
        }
    }

    /// Read entity configs from `dir` instead of the built-in copies.
    pub fn with_config_dir(mut self, dir: Option<&'a Path>) -> Self {
        self.config_dir = dir;
        self
    }

    /// Sync `entity` from `start` (`YYYY-MM-DD`), or from the table's latest
    /// increment value when no start is given.
    pub async fn run(&self, entity: EntityType, start: Option<&str>) -> Result<SyncResult, SyncError> {
        enter(entity, SyncState::Idle);
        let config = EntityConfig::load(entity, self.config_dir)?;

        let watermark = resolve_watermark(entity, &config, start, self.warehouse).await?;
        enter(entity, SyncState::WatermarkResolved);

        let pages = self.client.fetch_pages(entity, &watermark).await?;
        enter(entity, SyncState::Fetched);

        if pages.is_empty() {
            enter(entity, SyncState::Empty);
            enter(entity, SyncState::Done);
            return Ok(SyncResult {
                table: entity,
                start: watermark.to_string(),
                num_processed: 0,
                output_rows: None,
            });
        }

        let rows = transform(entity, &pages)?;
        enter(entity, SyncState::Transformed);

        let output_rows = self
            .warehouse
            .append_to_stage(entity, &config.schema, &rows)
            .await?;
        enter(entity, SyncState::Staged);

        self.warehouse.merge_from_stage(entity, &config).await?;
        enter(entity, SyncState::Merged);

        enter(entity, SyncState::Done);
        let result = SyncResult {
            table: entity,
            start: watermark.to_string(),
            num_processed: rows.len(),
            output_rows: Some(output_rows),
        };
        tracing::info!(
            "Synced {} {entity} rows since {} ({output_rows} staged)",
            result.num_processed,
            result.start
        );
        Ok(result)
    }
}

fn enter(entity: EntityType, state: SyncState) {
    tracing::info!("{entity} sync: {state}");
}
