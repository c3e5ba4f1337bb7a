//! Inbound trigger payloads and the handler that dispatches them
//!
//! A trigger is a JSON object naming either one table to sync or a broadcast:
//!
//! ```json
//! {"table": "Leads", "start": "2021-08-17"}
//! {"broadcast": "lead"}
//! ```
//!
//! Push deliveries wrap the trigger as base64 inside
//! `{"message": {"data": "..."}}`.

use base64::{engine::general_purpose, Engine as _};
use kafka_producer::EventPublisher;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sync_core::{BroadcastResult, EntityType, SyncError, SyncResult};

use crate::{broadcast, SyncJob};

/// Name reported in every handler response
pub const PIPELINE_NAME: &str = "SalesRabbit";

/// What a trigger asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Sync {
        entity: EntityType,
        start: Option<String>,
    },
    /// `start` is relayed untouched to every table's trigger; `Null` when absent.
    Broadcast {
        start: Value,
    },
}

impl Trigger {
    /// Interpret a decoded trigger payload.
    ///
    /// A `broadcast` field wins over `table`, and its `start` is kept as-is.
    /// A sync trigger's `start` must be a string or null. A payload that is
    /// not a non-empty object, or carries neither discriminator, is rejected.
    pub fn from_value(value: &Value) -> Result<Self, SyncError> {
        let fields = match value {
            Value::Object(fields) if !fields.is_empty() => fields,
            other => {
                return Err(SyncError::UnknownTrigger(format!(
                    "expected a non-empty object, got {other}"
                )))
            }
        };

        if fields.contains_key("broadcast") {
            let start = fields.get("start").cloned().unwrap_or(Value::Null);
            return Ok(Trigger::Broadcast { start });
        }

        let start = match fields.get("start") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(SyncError::UnknownTrigger(format!(
                    "start must be a YYYY-MM-DD string, got {other}"
                )))
            }
        };

        match fields.get("table") {
            Some(Value::String(table)) => Ok(Trigger::Sync {
                entity: table.parse()?,
                start,
            }),
            Some(other) => Err(SyncError::UnknownTrigger(format!(
                "table must be a string, got {other}"
            ))),
            None => Err(SyncError::UnknownTrigger(format!(
                "payload has neither 'table' nor 'broadcast': {value}"
            ))),
        }
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, SyncError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| SyncError::UnknownTrigger(format!("payload is not JSON: {e}")))?;
        Self::from_value(&value)
    }
}

/// Push delivery wrapping a base64-encoded trigger.
#[derive(Debug, Clone, Deserialize)]
pub struct PushEnvelope {
    pub message: PushMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushMessage {
    pub data: String,
}

impl PushEnvelope {
    pub fn from_json(json: &str) -> Result<Self, SyncError> {
        serde_json::from_str(json)
            .map_err(|e| SyncError::UnknownTrigger(format!("invalid push envelope: {e}")))
    }

    /// Decode the wrapped trigger.
    pub fn trigger(&self) -> Result<Trigger, SyncError> {
        let bytes = general_purpose::STANDARD
            .decode(self.message.data.trim())
            .map_err(|e| SyncError::UnknownTrigger(format!("message data is not base64: {e}")))?;
        Trigger::from_json(&bytes)
    }
}

/// Result of whichever run a trigger started.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RunOutcome {
    Sync(SyncResult),
    Broadcast(BroadcastResult),
}

/// Reply to a handled trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerResponse {
    pub pipelines: &'static str,
    pub results: RunOutcome,
}

/// Run whatever `trigger` asks for.
pub async fn handle(
    trigger: Trigger,
    job: &SyncJob<'_>,
    publisher: &dyn EventPublisher,
) -> Result<HandlerResponse, SyncError> {
    tracing::info!("Handling trigger: {trigger:?}");

    let results = match trigger {
        Trigger::Broadcast { start } => {
            RunOutcome::Broadcast(broadcast(publisher, &start).await?)
        }
        Trigger::Sync { entity, start } => {
            RunOutcome::Sync(job.run(entity, start.as_deref()).await?)
        }
    };

    Ok(HandlerResponse {
        pipelines: PIPELINE_NAME,
        results,
    })
}
