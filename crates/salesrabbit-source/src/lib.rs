//! SalesRabbit source for salesrabbit-sync
//!
//! Fetches changed records from the SalesRabbit REST API page by page and
//! reshapes them into rows the warehouse stage tables accept.
//!
//! # Example
//!
//! ```ignore
//! use salesrabbit_source::{transform, SalesRabbitClient, SalesRabbitOpts};
//!
//! let client = SalesRabbitClient::new(SalesRabbitOpts::new(token))?;
//! let pages = client.fetch_pages(EntityType::Leads, &watermark).await?;
//! let rows = transform(EntityType::Leads, &pages)?;
//! ```

mod client;
mod transform;

pub use client::{
    ChangeFilter, IfModifiedSince, RawPage, SalesRabbitClient, SalesRabbitOpts, DEFAULT_BASE_URL,
    DEFAULT_PAGE_SIZE,
};
pub use transform::{transform, LEAD_ID_FIELD};
