//! Flight registry: configured experiment arms keyed by `{id}_{version}`.

use std::collections::HashMap;

use crate::error::{AppError, Result};
use crate::models::flight::{Flight, DEFAULT_FLIGHT_ID};

#[derive(Debug, Clone, Default)]
pub struct FlightRegistry {
    by_key: HashMap<String, Flight>,
    default_key: String,
}

impl FlightRegistry {
    /// Build from the configured flight list.
    ///
    /// Fails when a key repeats or the reserved `Default` flight is missing;
    /// without it the fallback chain would have no terminal.
    pub fn build(flights: &[Flight]) -> Result<Self> {
        let mut by_key = HashMap::new();
        for flight in flights {
            if by_key.insert(flight.key(), flight.clone()).is_some() {
                return Err(AppError::Configuration(format!(
                    "duplicate flight definition '{}'",
                    flight.key()
                )));
            }
        }

        let default_key = flights
            .iter()
            .filter(|flight| flight.is_default())
            .max_by_key(|flight| flight.version)
            .map(|flight| flight.key())
            .ok_or_else(|| {
                AppError::Configuration(format!(
                    "reserved flight id '{}' is not configured",
                    DEFAULT_FLIGHT_ID
                ))
            })?;

        Ok(Self { by_key, default_key })
    }

    pub fn get(&self, key: &str) -> Option<&Flight> {
        self.by_key.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// Key of the newest version of the reserved `Default` flight.
    pub fn default_key(&self) -> &str {
        &self.default_key
    }

    /// Newest configured version of a flight id.
    pub fn latest_version(&self, id: &str) -> Option<&Flight> {
        self.by_key
            .values()
            .filter(|flight| flight.id == id)
            .max_by_key(|flight| flight.version)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
