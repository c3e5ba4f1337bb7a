//! Core types for salesrabbit-sync.
//!
//! This crate provides the types shared by every stage of a sync run:
//!
//! - [`EntityType`] - The two SalesRabbit record types (`Leads`, `LeadStatusHistories`)
//! - [`EntityConfig`] - Merge keys and target schema of an entity's tables
//! - [`StagedRecord`] - A flat row ready for the stage table
//! - [`SyncResult`] / [`BroadcastResult`] - What a run reports back
//! - [`SyncError`] - The error taxonomy; every variant is fatal for the run
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── watermark            (resolves the run's starting point)
//!    ├─── salesrabbit-source   (fetches pages, transforms rows)
//!    ├─── warehouse            (stage + merge into the target store)
//!    └─── kafka-producer       (broadcast events)
//! ```

pub mod entity;
pub mod error;
pub mod schema;

use serde::{Deserialize, Serialize};

pub use entity::{EntityConfig, EntityType, TableKeys};
pub use error::SyncError;
pub use schema::{parse_timestamp, validate_row, ColumnDefinition, FieldMode, FieldType};

/// A flat row keyed by column name, matching the target schema.
pub type StagedRecord = serde_json::Map<String, serde_json::Value>;

/// Outcome of one sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub table: EntityType,
    /// Watermark the run started from
    pub start: String,
    pub num_processed: usize,
    /// Rows appended to the stage table; absent when nothing was fetched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_rows: Option<u64>,
}

/// Outcome of a broadcast run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResult {
    pub message_sent: usize,
}
