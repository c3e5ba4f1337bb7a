//! Error taxonomy shared by every stage of a sync run.
//!
//! Every variant is fatal for the run that raised it; nothing in the
//! workspace retries or recovers locally.

/// Error type for sync and broadcast runs.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Caller-supplied start date does not match `YYYY-MM-DD`
    #[error("Invalid start date '{input}': expected YYYY-MM-DD")]
    InvalidDateFormat { input: String },

    /// No baseline watermark could be read from the target table
    #[error("No prior data in table '{table}' to derive a watermark from: {reason}")]
    NoPriorData { table: String, reason: String },

    /// Non-success response, network failure or unreadable body from the source API
    #[error("SalesRabbit request failed: {message}")]
    TransportError {
        status: Option<u16>,
        message: String,
    },

    /// A page payload did not have the shape expected for its entity type
    #[error("Unexpected payload for table '{table}': {message}")]
    UnexpectedPayload { table: String, message: String },

    /// Rows rejected by the target schema during the stage load
    #[error("Schema mismatch loading table '{table}': {message}")]
    SchemaMismatch { table: String, message: String },

    /// The stage-to-permanent merge failed
    #[error("Merge into table '{table}' failed: {message}")]
    MergeFailure { table: String, message: String },

    /// The target store failed for a reason unrelated to the rows themselves
    #[error("Target store error on table '{table}': {message}")]
    StoreError { table: String, message: String },

    /// Inbound payload has no usable discriminator
    #[error("Unknown trigger: {0}")]
    UnknownTrigger(String),

    /// The outbound event channel refused a message
    #[error("Failed to publish event: {message}")]
    PublishFailure { message: String },

    /// Entity configuration could not be read or is inconsistent
    #[error("Invalid entity configuration: {0}")]
    Config(String),
}

impl SyncError {
    /// Build a `TransportError` for an HTTP status the fetcher does not accept.
    pub fn transport_status(status: u16, body: impl AsRef<str>) -> Self {
        SyncError::TransportError {
            status: Some(status),
            message: format!("HTTP {status}: {}", body.as_ref()),
        }
    }

    /// Build a `TransportError` with no HTTP status (connect failure, bad body).
    pub fn transport(message: impl Into<String>) -> Self {
        SyncError::TransportError {
            status: None,
            message: message.into(),
        }
    }
}
