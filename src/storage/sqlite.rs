//! SQLite-based device store implementation

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};

use super::models::Device;

/// Device store error type
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid timestamp in store: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// SQLite-based device store
///
/// Uses a single connection with Mutex (SQLite handles locking internally).
pub struct DeviceStore {
    conn: Mutex<Connection>,
}

impl DeviceStore {
    /// Create or open a device store at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening device store at {:?}", path);

        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// In-memory store, nothing is persisted
    pub fn in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> StorageResult<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS devices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                jid TEXT UNIQUE,
                token TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        debug!("Device store schema initialized");
        Ok(())
    }

    /// Load the first stored device, creating an unpaired one if the store is empty
    pub fn first_device(&self) -> StorageResult<Device> {
        let conn = self.conn.lock();

        let existing = conn
            .query_row(
                "SELECT id, jid, token, created_at, updated_at
                 FROM devices ORDER BY id ASC LIMIT 1",
                [],
                RawDevice::from_row,
            )
            .optional()?;

        if let Some(raw) = existing {
            let device = raw.into_device()?;
            debug!("Loaded device {} (paired: {})", device.id, device.is_paired());
            return Ok(device);
        }

        let mut device = Device::new();
        conn.execute(
            "INSERT INTO devices (jid, token, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                device.jid,
                device.token,
                device.created_at.to_rfc3339(),
                device.updated_at.to_rfc3339(),
            ],
        )?;
        device.id = conn.last_insert_rowid();

        info!("Created new device {}", device.id);
        Ok(device)
    }

    /// Persist changes to an existing device
    pub fn save_device(&self, device: &Device) -> StorageResult<()> {
        let conn = self.conn.lock();

        conn.execute(
            "UPDATE devices SET jid = ?1, token = ?2, updated_at = ?3
             WHERE id = ?4",
            params![
                device.jid,
                device.token,
                device.updated_at.to_rfc3339(),
                device.id,
            ],
        )?;

        debug!("Saved device {}", device.id);
        Ok(())
    }
}

/// Row as stored, before timestamp parsing
struct RawDevice {
    id: i64,
    jid: Option<String>,
    token: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawDevice {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            jid: row.get(1)?,
            token: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    fn into_device(self) -> StorageResult<Device> {
        Ok(Device {
            id: self.id,
            jid: self.jid,
            token: self.token,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}
