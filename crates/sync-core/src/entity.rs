//! The two SalesRabbit entity types and their table configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::schema::{ColumnDefinition, FieldType};
use crate::SyncError;

const LEADS_CONFIG: &str = include_str!("../configs/Leads.json");
const LEAD_STATUS_HISTORIES_CONFIG: &str = include_str!("../configs/LeadStatusHistories.json");

/// A SalesRabbit record type synced into its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Leads,
    LeadStatusHistories,
}

impl EntityType {
    /// Every entity type, in broadcast order.
    pub const ALL: [EntityType; 2] = [EntityType::Leads, EntityType::LeadStatusHistories];

    /// Target table name (also the trigger payload's `table` value).
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityType::Leads => "Leads",
            EntityType::LeadStatusHistories => "LeadStatusHistories",
        }
    }

    /// API path below the SalesRabbit base URL.
    pub fn endpoint(&self) -> &'static str {
        match self {
            EntityType::Leads => "leads",
            EntityType::LeadStatusHistories => "leadStatusHistories",
        }
    }

    /// Stage table that rows are appended to before the merge.
    pub fn stage_table_name(&self) -> String {
        format!("_stage_{}", self.table_name())
    }

    fn builtin_config(&self) -> &'static str {
        match self {
            EntityType::Leads => LEADS_CONFIG,
            EntityType::LeadStatusHistories => LEAD_STATUS_HISTORIES_CONFIG,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for EntityType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|e| e.table_name() == s)
            .ok_or_else(|| SyncError::UnknownTrigger(format!("unknown table '{s}'")))
    }
}

/// Merge keys of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableKeys {
    /// Columns identifying a permanent row
    pub p_key: Vec<String>,
    /// Column whose maximum is the sync watermark
    pub incre_key: String,
}

/// Keys and schema of one entity's tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    pub keys: TableKeys,
    pub schema: Vec<ColumnDefinition>,
}

impl EntityConfig {
    /// Parse and check a configuration document.
    pub fn from_json(json: &str) -> Result<Self, SyncError> {
        let config: EntityConfig =
            serde_json::from_str(json).map_err(|e| SyncError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SyncError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&content)
    }

    /// The configuration compiled into this crate.
    pub fn builtin(entity: EntityType) -> Result<Self, SyncError> {
        Self::from_json(entity.builtin_config())
    }

    /// Load `<dir>/<Table>.json` when a directory is given, else the built-in copy.
    pub fn load(entity: EntityType, config_dir: Option<&Path>) -> Result<Self, SyncError> {
        match config_dir {
            Some(dir) => Self::from_file(dir.join(format!("{}.json", entity.table_name()))),
            None => Self::builtin(entity),
        }
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.schema.iter().find(|c| c.name == name)
    }

    fn check(&self) -> Result<(), SyncError> {
        if self.keys.p_key.is_empty() {
            return Err(SyncError::Config("p_key must name at least one field".into()));
        }
        for key in &self.keys.p_key {
            if self.column(key).is_none() {
                return Err(SyncError::Config(format!(
                    "primary key field '{key}' is not in the schema"
                )));
            }
        }
        match self.column(&self.keys.incre_key).map(|c| c.column_type) {
            Some(FieldType::Timestamp) | Some(FieldType::Date) => Ok(()),
            Some(other) => Err(SyncError::Config(format!(
                "increment key '{}' must be TIMESTAMP or DATE, not {}",
                self.keys.incre_key,
                other.as_str()
            ))),
            None => Err(SyncError::Config(format!(
                "increment key field '{}' is not in the schema",
                self.keys.incre_key
            ))),
        }
    }
}
