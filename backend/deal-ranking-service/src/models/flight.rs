//! Experiment flight definitions.

use serde::{Deserialize, Serialize};

/// Reserved flight id. Every configuration must define it; bucket gaps and
/// unmatched clients fall back to its newest version.
pub const DEFAULT_FLIGHT_ID: &str = "Default";

/// A named, versioned experiment arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub id: String,
    pub version: u32,
    /// Identifier of the experiment in the external experimentation platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Flight {
    /// Registry key, also the value stored in bucket tables.
    pub fn key(&self) -> String {
        flight_key(&self.id, self.version)
    }

    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_FLIGHT_ID
    }
}

/// Key format shared by everything that references a flight by id + version.
pub fn flight_key(id: &str, version: u32) -> String {
    format!("{}_{}", id, version)
}
