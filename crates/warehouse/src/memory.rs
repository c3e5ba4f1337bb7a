//! In-process implementation of [`Warehouse`].

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use sync_core::{ColumnDefinition, EntityConfig, EntityType, StagedRecord, SyncError};

use crate::{validate_rows, Warehouse};

/// Tables held in memory, keyed by table name.
///
/// Applies the same merge rules as [`crate::PostgresWarehouse`], which makes
/// it suitable for exercising whole sync runs without a database.
#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    tables: Mutex<HashMap<String, Vec<StagedRecord>>>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put rows straight into a table, bypassing the stage.
    pub fn seed(&self, table: &str, rows: Vec<StagedRecord>) {
        self.lock().entry(table.to_string()).or_default().extend(rows);
    }

    /// Snapshot of a table's rows (empty when it does not exist).
    pub fn rows(&self, table: &str) -> Vec<StagedRecord> {
        self.lock().get(table).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<StagedRecord>>> {
        // A poisoned lock only means another test thread panicked mid-update.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Increment value of a row as an instant; DATE values count as midnight UTC.
fn increment_of(row: &StagedRecord, incre_key: &str) -> Option<DateTime<Utc>> {
    let raw = row.get(incre_key)?.as_str()?;
    sync_core::parse_timestamp(raw).or_else(|| {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .map(|d| d.and_time(NaiveTime::MIN).and_utc())
    })
}

fn key_of(row: &StagedRecord, p_key: &[String]) -> Vec<Value> {
    p_key
        .iter()
        .map(|k| row.get(k).cloned().unwrap_or(Value::Null))
        .collect()
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn max_increment(
        &self,
        entity: EntityType,
        incre_key: &str,
    ) -> Result<Option<DateTime<Utc>>, SyncError> {
        Ok(self
            .lock()
            .get(entity.table_name())
            .and_then(|rows| rows.iter().filter_map(|r| increment_of(r, incre_key)).max()))
    }

    async fn append_to_stage(
        &self,
        entity: EntityType,
        schema: &[ColumnDefinition],
        rows: &[StagedRecord],
    ) -> Result<u64, SyncError> {
        validate_rows(entity, schema, rows)?;
        self.lock()
            .entry(entity.stage_table_name())
            .or_default()
            .extend(rows.iter().cloned());
        Ok(rows.len() as u64)
    }

    async fn merge_from_stage(
        &self,
        entity: EntityType,
        config: &EntityConfig,
    ) -> Result<u64, SyncError> {
        let p_key = &config.keys.p_key;
        let incre_key = &config.keys.incre_key;

        let mut tables = self.lock();
        let staged = tables
            .get_mut(&entity.stage_table_name())
            .map(std::mem::take)
            .unwrap_or_default();

        // Newest staged row per key, in first-seen key order.
        let mut newest: Vec<(Vec<Value>, StagedRecord)> = Vec::new();
        for row in staged {
            let key = key_of(&row, p_key);
            match newest.iter_mut().find(|(k, _)| *k == key) {
                Some((_, current)) => {
                    if increment_of(&row, incre_key) > increment_of(current, incre_key) {
                        *current = row;
                    }
                }
                None => newest.push((key, row)),
            }
        }

        let permanent = tables.entry(entity.table_name().to_string()).or_default();
        let mut merged = 0u64;
        for (key, row) in newest {
            match permanent.iter_mut().find(|r| key_of(r, p_key) == key) {
                Some(existing) => {
                    let stored = increment_of(existing, incre_key);
                    if stored.is_none() || increment_of(&row, incre_key) > stored {
                        *existing = row;
                        merged += 1;
                    }
                }
                None => {
                    permanent.push(row);
                    merged += 1;
                }
            }
        }

        tracing::info!(
            "Merged {merged} rows from {} into {}",
            entity.stage_table_name(),
            entity.table_name()
        );
        Ok(merged)
    }
}
