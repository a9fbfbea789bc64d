//! Database models for the device identity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Linked device identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// Unique database ID
    pub id: i64,
    /// Address assigned by the network (None until paired)
    pub jid: Option<String>,
    /// Session token issued by the gateway on pairing
    pub token: Option<String>,
    /// When this record was created
    pub created_at: DateTime<Utc>,
    /// When this record was last updated
    pub updated_at: DateTime<Utc>,
}

impl Device {
    /// Create a new, unpaired device
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by database
            jid: None,
            token: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the device has completed pairing
    pub fn is_paired(&self) -> bool {
        self.jid.is_some()
    }

    /// Record the identity assigned during pairing
    pub fn mark_paired(&mut self, jid: String, token: String) {
        self.jid = Some(jid);
        self.token = Some(token);
        self.updated_at = Utc::now();
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::new()
    }
}
