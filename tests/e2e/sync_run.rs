//! Sync runs against the mock API and an in-memory warehouse

use crate::common::{history, lead, page, record, start_mock_api, Reply};
use axum::http::StatusCode;
use salesrabbit_sync::SyncJob;
use serde_json::{json, Value};
use sync_core::{EntityType, SyncError, SyncResult};
use warehouse::MemoryWarehouse;

#[tokio::test]
async fn test_leads_sync_from_explicit_start() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .try_init();

    let api = start_mock_api(
        vec![
            page(
                json!([
                    lead(1, "new", "2021-08-17T10:00:00+00:00"),
                    lead(2, "callback", "2021-08-17T11:30:00+00:00")
                ]),
                true,
                1,
            ),
            page(json!([lead(3, "sold", "2021-08-18T08:15:00+00:00")]), false, 2),
        ],
        vec![],
    )
    .await;
    let client = api.client();
    let wh = MemoryWarehouse::new();

    let result = SyncJob::new(&client, &wh)
        .run(EntityType::Leads, Some("2021-08-17"))
        .await
        .unwrap();

    assert_eq!(
        result,
        SyncResult {
            table: EntityType::Leads,
            start: "2021-08-17T00:00:00+00:00".to_string(),
            num_processed: 3,
            output_rows: Some(3),
        }
    );

    let requests = api.requests();
    assert_eq!(
        requests.iter().map(|r| r.page.as_str()).collect::<Vec<_>>(),
        vec!["1", "2"]
    );
    assert!(requests
        .iter()
        .all(|r| r.if_modified_since.as_deref() == Some("2021-08-17T00:00:00+00:00")));

    let rows = wh.rows("Leads");
    assert_eq!(rows.len(), 3);
    for row in &rows {
        assert!(row["customFields"].is_string());
        assert!(row["integrationData"].is_string());
    }
    let first = rows.iter().find(|r| r["id"] == json!(1)).unwrap();
    let custom: Value = serde_json::from_str(first["customFields"].as_str().unwrap()).unwrap();
    assert_eq!(custom, json!({"roofType": "tile", "stories": 2}));
    assert!(wh.rows("_stage_Leads").is_empty());
}

#[tokio::test]
async fn test_not_modified_reports_nothing_processed() {
    let api = start_mock_api(vec![Reply::NotModified], vec![]).await;
    let client = api.client();
    let wh = MemoryWarehouse::new();

    let result = SyncJob::new(&client, &wh)
        .run(EntityType::Leads, Some("2021-08-17"))
        .await
        .unwrap();

    assert_eq!(result.num_processed, 0);
    assert_eq!(result.output_rows, None);
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({"table": "Leads", "start": "2021-08-17T00:00:00+00:00", "num_processed": 0})
    );
    assert!(wh.rows("Leads").is_empty());
}

#[tokio::test]
async fn test_not_modified_later_page_stages_nothing() {
    let api = start_mock_api(
        vec![
            page(json!([lead(1, "new", "2021-08-17T10:00:00+00:00")]), true, 1),
            Reply::NotModified,
        ],
        vec![],
    )
    .await;
    let client = api.client();
    let wh = MemoryWarehouse::new();

    let result = SyncJob::new(&client, &wh)
        .run(EntityType::Leads, Some("2021-08-17"))
        .await
        .unwrap();

    assert_eq!(result.num_processed, 0);
    assert_eq!(result.output_rows, None);
    assert!(wh.rows("_stage_Leads").is_empty());
    assert!(wh.rows("Leads").is_empty());
}

#[tokio::test]
async fn test_watermark_comes_from_target_table() {
    let api = start_mock_api(
        vec![page(json!([lead(5, "sold", "2021-09-02T00:00:00+00:00")]), false, 1)],
        vec![],
    )
    .await;
    let client = api.client();
    let wh = MemoryWarehouse::new();
    wh.seed(
        "Leads",
        vec![
            record(json!({"id": 4, "dateModified": "2021-09-01T12:34:56+00:00"})),
            record(json!({"id": 3, "dateModified": "2021-08-30T00:00:00+00:00"})),
        ],
    );

    let result = SyncJob::new(&client, &wh)
        .run(EntityType::Leads, None)
        .await
        .unwrap();

    assert_eq!(result.start, "2021-09-01T12:34:56+00:00");
    assert_eq!(
        api.requests()[0].if_modified_since.as_deref(),
        Some("2021-09-01T12:34:56+00:00")
    );
    assert_eq!(wh.rows("Leads").len(), 3);
}

#[tokio::test]
async fn test_no_prior_data_fails_before_fetching() {
    let api = start_mock_api(vec![Reply::NotModified], vec![Reply::NotModified]).await;
    let client = api.client();
    let wh = MemoryWarehouse::new();

    let err = SyncJob::new(&client, &wh)
        .run(EntityType::LeadStatusHistories, None)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::NoPriorData { .. }));
    assert!(api.requests().is_empty());
}

#[tokio::test]
async fn test_invalid_start_fails_before_fetching() {
    let api = start_mock_api(vec![Reply::NotModified], vec![]).await;
    let client = api.client();
    let wh = MemoryWarehouse::new();

    let err = SyncJob::new(&client, &wh)
        .run(EntityType::Leads, Some("17/08/2021"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::InvalidDateFormat { .. }));
    assert!(api.requests().is_empty());
}

#[tokio::test]
async fn test_status_histories_sync() {
    let api = start_mock_api(
        vec![],
        vec![
            page(
                json!({
                    "101": [
                        history(1, "new", "2021-08-17T10:00:00+00:00"),
                        history(4, "sold", "2021-08-18T16:00:00+00:00")
                    ],
                    "202": [history(1, "new", "2021-08-17T12:00:00+00:00")]
                }),
                true,
                1,
            ),
            page(json!([]), false, 2),
        ],
    )
    .await;
    let client = api.client();
    let wh = MemoryWarehouse::new();

    let result = SyncJob::new(&client, &wh)
        .run(EntityType::LeadStatusHistories, Some("2021-08-17"))
        .await
        .unwrap();

    assert_eq!(result.num_processed, 3);
    assert_eq!(result.output_rows, Some(3));

    let rows = wh.rows("LeadStatusHistories");
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows.iter().filter(|r| r["lead_id"] == json!(101)).count(),
        2
    );
    assert_eq!(
        rows.iter().filter(|r| r["lead_id"] == json!(202)).count(),
        1
    );
    assert!(api
        .requests()
        .iter()
        .all(|r| r.endpoint == "leadStatusHistories"));
}

#[tokio::test]
async fn test_rerun_does_not_duplicate_rows() {
    let api = start_mock_api(
        vec![page(
            json!([
                lead(1, "new", "2021-08-17T10:00:00+00:00"),
                lead(2, "new", "2021-08-17T11:00:00+00:00")
            ]),
            false,
            1,
        )],
        vec![],
    )
    .await;
    let client = api.client();
    let wh = MemoryWarehouse::new();
    let job = SyncJob::new(&client, &wh);

    for _ in 0..2 {
        let result = job.run(EntityType::Leads, Some("2021-08-17")).await.unwrap();
        assert_eq!(result.num_processed, 2);
    }

    assert_eq!(wh.rows("Leads").len(), 2);
}

#[tokio::test]
async fn test_transport_error_leaves_store_untouched() {
    let api = start_mock_api(
        vec![
            page(json!([lead(1, "new", "2021-08-17T10:00:00+00:00")]), true, 1),
            Reply::Status(StatusCode::BAD_GATEWAY),
        ],
        vec![],
    )
    .await;
    let client = api.client();
    let wh = MemoryWarehouse::new();

    let err = SyncJob::new(&client, &wh)
        .run(EntityType::Leads, Some("2021-08-17"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SyncError::TransportError {
            status: Some(502),
            ..
        }
    ));
    assert!(wh.rows("_stage_Leads").is_empty());
    assert!(wh.rows("Leads").is_empty());
}

#[tokio::test]
async fn test_unknown_field_is_schema_mismatch() {
    let mut bad = lead(2, "new", "2021-08-17T11:00:00+00:00");
    bad["favoriteColor"] = json!("teal");

    let api = start_mock_api(
        vec![page(
            json!([lead(1, "new", "2021-08-17T10:00:00+00:00"), bad]),
            false,
            1,
        )],
        vec![],
    )
    .await;
    let client = api.client();
    let wh = MemoryWarehouse::new();

    let err = SyncJob::new(&client, &wh)
        .run(EntityType::Leads, Some("2021-08-17"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::SchemaMismatch { .. }));
    assert!(err.to_string().contains("favoriteColor"));
    assert!(wh.rows("_stage_Leads").is_empty());
    assert!(wh.rows("Leads").is_empty());
}

#[tokio::test]
async fn test_missing_config_dir_entry_is_config_error() {
    let api = start_mock_api(vec![Reply::NotModified], vec![]).await;
    let client = api.client();
    let wh = MemoryWarehouse::new();
    let dir = tempfile::tempdir().unwrap();

    let err = SyncJob::new(&client, &wh)
        .with_config_dir(Some(dir.path()))
        .run(EntityType::Leads, Some("2021-08-17"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Config(_)));
    assert!(api.requests().is_empty());
}
