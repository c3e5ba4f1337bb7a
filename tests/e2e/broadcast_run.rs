//! Broadcast fan-out through a recording publisher

use crate::common::RecordingPublisher;
use salesrabbit_sync::broadcast;
use serde_json::{json, Value};
use sync_core::{BroadcastResult, SyncError};

#[tokio::test]
async fn test_broadcast_publishes_one_trigger_per_table() {
    let publisher = RecordingPublisher::new();

    let result = broadcast(&publisher, &Value::Null).await.unwrap();

    assert_eq!(result, BroadcastResult { message_sent: 2 });
    assert_eq!(
        publisher.messages(),
        vec![
            ("Leads".to_string(), json!({"table": "Leads", "start": null})),
            (
                "LeadStatusHistories".to_string(),
                json!({"table": "LeadStatusHistories", "start": null})
            ),
        ]
    );
}

#[tokio::test]
async fn test_broadcast_carries_start_date() {
    let publisher = RecordingPublisher::new();

    broadcast(&publisher, &json!("2021-08-17")).await.unwrap();

    assert!(publisher
        .messages()
        .iter()
        .all(|(_, payload)| payload["start"] == json!("2021-08-17")));
}

#[tokio::test]
async fn test_publish_failure_stops_broadcast() {
    let publisher = RecordingPublisher::failing_from_call(2);

    let err = broadcast(&publisher, &Value::Null).await.unwrap_err();

    assert!(matches!(err, SyncError::PublishFailure { .. }));
    let messages = publisher.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, "Leads");
}

#[tokio::test]
async fn test_broadcast_relays_non_string_start() {
    let publisher = RecordingPublisher::new();

    broadcast(&publisher, &json!(20210817)).await.unwrap();

    assert_eq!(
        publisher.messages()[1].1,
        json!({"table": "LeadStatusHistories", "start": 20210817})
    );
}
