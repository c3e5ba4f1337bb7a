//! End-to-end tests for sync, broadcast and trigger handling
//!
//! The SalesRabbit API is a local axum server, the target store is a
//! `MemoryWarehouse` and broadcasts go to a recording publisher, so these
//! tests need no external services.

mod broadcast_run;
mod common;
mod sync_run;
