//! Credential store
//!
//! Provides SQLite-based local storage for the linked device identity:
//! - Load-or-create of the first device on startup
//! - Persisting the identity assigned during pairing

mod models;
mod sqlite;

pub use models::Device;
pub use sqlite::{DeviceStore, StorageError, StorageResult};
