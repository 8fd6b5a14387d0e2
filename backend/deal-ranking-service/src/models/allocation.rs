//! Traffic allocation records: which share of a client's users lands in
//! which flight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::flight::flight_key;

/// Wildcard accepted in the client id and client app fields of allocation
/// and placement records.
pub const WILDCARD: &str = "*";

/// One traffic split entry.
///
/// `client_id` and `client_app` may each be a canonical value or `*`. The
/// percentage is a whole number of buckets out of 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficAllocation {
    pub client_id: String,
    pub client_app: String,
    pub flight_id: String,
    pub flight_version: u32,
    /// Revision counter of this allocation record itself.
    pub allocation_version: u32,
    /// Re-indexing pass this allocation was published under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publishing_version: Option<u64>,
    pub percent: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_until: Option<DateTime<Utc>>,
    /// Bucket reseed period in seconds. Zero or absent means assignments are
    /// sticky for the lifetime of the configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reseed_interval_secs: Option<u64>,
}

impl TrafficAllocation {
    pub fn client_key(&self) -> String {
        format!("{}_{}", self.client_id, self.client_app)
    }

    pub fn flight_key(&self) -> String {
        flight_key(&self.flight_id, self.flight_version)
    }

    /// Whether `now` falls inside the optional active window.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        if let Some(from) = self.active_from {
            if now < from {
                return false;
            }
        }
        if let Some(until) = self.active_until {
            if now > until {
                return false;
            }
        }
        true
    }
}
