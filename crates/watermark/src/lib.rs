//! Watermark resolution for salesrabbit-sync
//!
//! A watermark marks the boundary between already-synced and not-yet-synced
//! source records. It is computed once when a run starts and never persisted on
//! its own: the permanent table's increment column is the durable copy, read
//! back here at the start of the next run.
//!
//! # Sources
//!
//! - An explicit `YYYY-MM-DD` start date from the trigger, taken as midnight UTC
//! - Otherwise the largest increment value already in the target table
//!
//! # Format
//!
//! Watermarks render as `YYYY-MM-DDTHH:MM:SS+00:00`, which is also the value
//! sent to the source API as the "changed since" filter.

use chrono::{DateTime, NaiveDate, NaiveTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use sync_core::{EntityConfig, EntityType, SyncError};
use warehouse::Warehouse;

const WATERMARK_FORMAT: &str = "%Y-%m-%dT%H:%M:%S+00:00";

/// A UTC instant with whole-second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Watermark {
    timestamp: DateTime<Utc>,
}

impl Watermark {
    /// Build a watermark from an instant, dropping sub-second precision.
    pub fn from_timestamp(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: timestamp.trunc_subsecs(0),
        }
    }

    /// Parse a `YYYY-MM-DD` start date as midnight UTC.
    pub fn from_start_date(input: &str) -> Result<Self, SyncError> {
        let date = NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| {
            SyncError::InvalidDateFormat {
                input: input.to_string(),
            }
        })?;
        Ok(Self::from_timestamp(date.and_time(NaiveTime::MIN).and_utc()))
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.timestamp.format(WATERMARK_FORMAT))
    }
}

/// Determine where a sync run starts.
///
/// An explicit start date wins; an empty string counts as absent. Without one
/// the target table must already hold data, otherwise the run cannot proceed
/// and fails with `NoPriorData`. An unreachable store fails the same way.
pub async fn resolve_watermark<W: Warehouse + ?Sized>(
    entity: EntityType,
    config: &EntityConfig,
    start: Option<&str>,
    warehouse: &W,
) -> Result<Watermark, SyncError> {
    if let Some(start) = start.filter(|s| !s.is_empty()) {
        let watermark = Watermark::from_start_date(start)?;
        tracing::info!("Using explicit start date for {entity}: {watermark}");
        return Ok(watermark);
    }

    let incre_key = &config.keys.incre_key;
    let max = warehouse
        .max_increment(entity, incre_key)
        .await
        .map_err(|e| match e {
            SyncError::StoreError { table, message } => SyncError::NoPriorData {
                table,
                reason: format!("could not read max({incre_key}): {message}"),
            },
            other => other,
        })?;
    match max {
        Some(max) => {
            let watermark = Watermark::from_timestamp(max);
            tracing::info!("Resolved watermark for {entity} from max({incre_key}): {watermark}");
            Ok(watermark)
        }
        None => Err(SyncError::NoPriorData {
            table: entity.table_name().to_string(),
            reason: format!("no {incre_key} values in the target table"),
        }),
    }
}
