//! Fan-out of sync triggers to every table

use kafka_producer::EventPublisher;
use serde::Serialize;
use serde_json::Value;
use sync_core::{BroadcastResult, EntityType, SyncError};

/// Sync trigger published for one table.
#[derive(Debug, Serialize)]
struct SyncEvent<'a> {
    table: &'a str,
    start: &'a Value,
}

/// Publish one sync trigger per table, in table order, each awaited before
/// the next.
///
/// `start` is forwarded as-is; each table's sync run validates it.
pub async fn broadcast(
    publisher: &dyn EventPublisher,
    start: &Value,
) -> Result<BroadcastResult, SyncError> {
    let mut message_sent = 0;

    for entity in EntityType::ALL {
        let event = SyncEvent {
            table: entity.table_name(),
            start,
        };
        let payload = serde_json::to_vec(&event).map_err(|e| SyncError::PublishFailure {
            message: format!("failed to encode {entity} event: {e}"),
        })?;

        publisher.publish(entity.table_name(), &payload).await?;
        message_sent += 1;
    }

    tracing::info!("Broadcast {message_sent} sync triggers");
    Ok(BroadcastResult { message_sent })
}
