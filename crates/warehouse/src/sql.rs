//! SQL text for the PostgreSQL warehouse.
//!
//! Every identifier is double-quoted: SalesRabbit column names are camelCase
//! and would otherwise be folded to lower case.

use sync_core::{ColumnDefinition, EntityConfig, FieldType};

/// Quote an identifier for PostgreSQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Schema-qualified, quoted table name.
pub fn qualified(dataset: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(dataset), quote_ident(table))
}

fn pg_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::String => "TEXT",
        FieldType::Integer => "BIGINT",
        FieldType::Float => "DOUBLE PRECISION",
        FieldType::Boolean => "BOOLEAN",
        FieldType::Timestamp => "TIMESTAMPTZ",
        FieldType::Date => "DATE",
    }
}

fn column_list(schema: &[ColumnDefinition]) -> String {
    schema
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn create_schema_sql(dataset: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(dataset))
}

/// `CREATE TABLE IF NOT EXISTS` for a stage table (no key) or a permanent
/// table (keyed by `primary_key`).
pub fn create_table_sql(
    dataset: &str,
    table: &str,
    schema: &[ColumnDefinition],
    primary_key: Option<&[String]>,
) -> String {
    let mut defs: Vec<String> = schema
        .iter()
        .map(|c| {
            let not_null = if c.is_required() { " NOT NULL" } else { "" };
            format!("{} {}{}", quote_ident(&c.name), pg_type(c.column_type), not_null)
        })
        .collect();
    if let Some(keys) = primary_key {
        let keys: Vec<String> = keys.iter().map(|k| quote_ident(k)).collect();
        defs.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        qualified(dataset, table),
        defs.join(", ")
    )
}

/// Append a JSON array (bound as `$1`) to the stage table, letting
/// PostgreSQL cast each value to its column type.
pub fn stage_load_sql(dataset: &str, stage_table: &str, schema: &[ColumnDefinition]) -> String {
    let stage = qualified(dataset, stage_table);
    let columns = column_list(schema);
    format!(
        "INSERT INTO {stage} ({columns}) \
         SELECT {columns} FROM jsonb_populate_recordset(NULL::{stage}, $1::jsonb)"
    )
}

/// Upsert staged rows into the permanent table.
///
/// Only the newest staged row per primary key takes part. An existing row is
/// overwritten only when the incoming increment value is strictly greater,
/// or when the stored one is NULL.
pub fn merge_sql(dataset: &str, table: &str, stage_table: &str, config: &EntityConfig) -> String {
    let target = qualified(dataset, table);
    let stage = qualified(dataset, stage_table);
    let columns = column_list(&config.schema);
    let keys: Vec<String> = config.keys.p_key.iter().map(|k| quote_ident(k)).collect();
    let keys = keys.join(", ");
    let incre = quote_ident(&config.keys.incre_key);

    let updates: Vec<String> = config
        .schema
        .iter()
        .filter(|c| !config.keys.p_key.contains(&c.name))
        .map(|c| {
            let col = quote_ident(&c.name);
            format!("{col} = EXCLUDED.{col}")
        })
        .collect();

    let on_conflict = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!(
            "DO UPDATE SET {} WHERE target.{incre} IS NULL OR EXCLUDED.{incre} > target.{incre}",
            updates.join(", ")
        )
    };

    format!(
        "INSERT INTO {target} AS target ({columns}) \
         SELECT {columns} FROM (\
         SELECT DISTINCT ON ({keys}) {columns} FROM {stage} \
         ORDER BY {keys}, {incre} DESC NULLS LAST\
         ) AS staged \
         ON CONFLICT ({keys}) {on_conflict}"
    )
}

pub fn truncate_sql(dataset: &str, stage_table: &str) -> String {
    format!("TRUNCATE {}", qualified(dataset, stage_table))
}

/// Largest increment value as a `timestamptz` (DATE columns are widened).
pub fn max_increment_sql(dataset: &str, table: &str, incre_key: &str) -> String {
    format!(
        "SELECT MAX({})::timestamptz AS incre FROM {}",
        quote_ident(incre_key),
        qualified(dataset, table)
    )
}
