//! Reshaping raw API pages into warehouse rows

use serde_json::Value;
use sync_core::{EntityType, StagedRecord, SyncError};

use crate::RawPage;

/// Nested lead fields the warehouse stores as JSON text.
const SERIALIZED_LEAD_FIELDS: [&str; 2] = ["customFields", "integrationData"];

/// Column injected into each status-history row, holding the parent lead's id.
pub const LEAD_ID_FIELD: &str = "lead_id";

/// Flatten fetched pages into rows for the entity's stage table.
///
/// Row order follows page order; within a page it follows the payload.
pub fn transform(entity: EntityType, pages: &[RawPage]) -> Result<Vec<StagedRecord>, SyncError> {
    let rows = match entity {
        EntityType::Leads => transform_leads(pages)?,
        EntityType::LeadStatusHistories => transform_status_histories(pages)?,
    };
    tracing::debug!("Transformed {} pages of {entity} into {} rows", pages.len(), rows.len());
    Ok(rows)
}

fn unexpected(entity: EntityType, message: String) -> SyncError {
    SyncError::UnexpectedPayload {
        table: entity.table_name().to_string(),
        message,
    }
}

/// Leads arrive as a list of objects. Their nested fields are replaced by the
/// JSON text of their value; a missing field becomes `"null"`.
fn transform_leads(pages: &[RawPage]) -> Result<Vec<StagedRecord>, SyncError> {
    let entity = EntityType::Leads;
    let mut rows = Vec::new();

    for page in pages {
        let records = page.data.as_array().ok_or_else(|| {
            unexpected(
                entity,
                format!("page {}: data is not a list of leads", page.current_page),
            )
        })?;

        for (idx, record) in records.iter().enumerate() {
            let mut row = record.as_object().cloned().ok_or_else(|| {
                unexpected(
                    entity,
                    format!("page {}, record {idx}: lead is not an object", page.current_page),
                )
            })?;

            for field in SERIALIZED_LEAD_FIELDS {
                let value = row.get(field).unwrap_or(&Value::Null);
                let text = serde_json::to_string(value).map_err(|e| {
                    unexpected(entity, format!("failed to serialize {field}: {e}"))
                })?;
                row.insert(field.to_string(), Value::String(text));
            }
            rows.push(row);
        }
    }

    Ok(rows)
}

/// Status histories arrive as an object mapping each lead id (as a string) to
/// that lead's history entries. Each entry becomes one row tagged with the
/// parent's id. An empty list stands for a page with no histories.
fn transform_status_histories(pages: &[RawPage]) -> Result<Vec<StagedRecord>, SyncError> {
    let entity = EntityType::LeadStatusHistories;
    let mut rows = Vec::new();

    for page in pages {
        let groups = match &page.data {
            Value::Object(groups) => groups,
            Value::Array(items) if items.is_empty() => continue,
            other => {
                return Err(unexpected(
                    entity,
                    format!(
                        "page {}: expected an object keyed by lead id, got {other}",
                        page.current_page
                    ),
                ))
            }
        };

        for (parent, entries) in groups {
            let lead_id: i64 = parent.parse().map_err(|_| {
                unexpected(entity, format!("lead id '{parent}' is not an integer"))
            })?;
            let entries = entries.as_array().ok_or_else(|| {
                unexpected(entity, format!("histories for lead {lead_id} are not a list"))
            })?;

            for entry in entries {
                let mut row = entry.as_object().cloned().ok_or_else(|| {
                    unexpected(entity, format!("history entry for lead {lead_id} is not an object"))
                })?;
                row.insert(LEAD_ID_FIELD.to_string(), Value::from(lead_id));
                rows.push(row);
            }
        }
    }

    Ok(rows)
}
