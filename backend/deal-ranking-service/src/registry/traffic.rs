//! Traffic allocation index: deterministic bucket-based flight assignment.
//!
//! Active allocation records are grouped per client key and laid out as
//! contiguous ranges over 100 buckets. A query hashes its user id into a
//! bucket and takes the flight occupying it; uncovered buckets fall through
//! to the reserved Default flight, so partial rollouts need no explicit
//! filler record.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::allocation::{TrafficAllocation, WILDCARD};
use crate::models::client::Client;
use crate::models::flight::DEFAULT_FLIGHT_ID;
use crate::registry::flights::FlightRegistry;
use crate::utils;

/// Number of traffic buckets; user ids hash into [0, BUCKET_COUNT).
pub const BUCKET_COUNT: usize = 100;

/// Bucket layout for one client key pattern.
#[derive(Debug, Clone)]
struct BucketTable {
    /// Flight key per bucket; `None` marks a gap.
    buckets: Vec<Option<String>>,
    /// Smallest positive reseed interval among the contributing records.
    reseed_interval_secs: Option<u64>,
}

/// Outcome of a flight lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightAssignment {
    pub flight_key: String,
    /// Bucket the user hashed into; `None` when no bucket table matched.
    pub bucket: Option<u8>,
    /// Whether the assignment fell through to the reserved Default flight.
    pub via_default: bool,
}

#[derive(Debug)]
pub struct TrafficAllocationIndex {
    tables: HashMap<String, BucketTable>,
    default_flight_key: String,
    /// Draw source for callers with no user id. Assignments for those are
    /// intentionally not sticky.
    anonymous_rng: Mutex<StdRng>,
}

impl TrafficAllocationIndex {
    /// Build bucket tables from allocation records.
    ///
    /// Records outside their active date window are skipped; records whose
    /// flight is unknown or whose percentages overflow the bucket space fail
    /// the build.
    pub fn build(
        allocations: &[TrafficAllocation],
        flights: &FlightRegistry,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let mut grouped: HashMap<String, Vec<&TrafficAllocation>> = HashMap::new();
        for allocation in allocations {
            if allocation.percent > 100 {
                return Err(AppError::Configuration(format!(
                    "allocation for '{}' requests {}% of traffic",
                    allocation.client_key(),
                    allocation.percent
                )));
            }
            if !flights.contains(&allocation.flight_key()) {
                return Err(AppError::Configuration(format!(
                    "allocation for '{}' references unknown flight '{}'",
                    allocation.client_key(),
                    allocation.flight_key()
                )));
            }
            if !allocation.is_active(now) {
                debug!(
                    client = %allocation.client_key(),
                    flight = %allocation.flight_key(),
                    "Skipping allocation outside its active window"
                );
                continue;
            }
            grouped
                .entry(allocation.client_key())
                .or_default()
                .push(allocation);
        }

        let mut tables = HashMap::new();
        for (client_key, records) in grouped {
            let table = Self::layout(&client_key, &records)?;
            tables.insert(client_key, table);
        }

        Ok(Self {
            tables,
            default_flight_key: flights.default_key().to_string(),
            anonymous_rng: Mutex::new(StdRng::from_entropy()),
        })
    }

    /// Tile one client key's records into contiguous bucket ranges.
    ///
    /// When several records target the same flight id, only the newest
    /// (flight version, allocation version) survives. Surviving records are
    /// laid out in a deterministic order so the same configuration always
    /// produces the same table.
    fn layout(client_key: &str, records: &[&TrafficAllocation]) -> Result<BucketTable> {
        let mut per_flight: HashMap<&str, &TrafficAllocation> = HashMap::new();
        for record in records.iter().copied() {
            per_flight
                .entry(record.flight_id.as_str())
                .and_modify(|current| {
                    let newer = (record.flight_version, record.allocation_version)
                        > (current.flight_version, current.allocation_version);
                    if newer {
                        *current = record;
                    }
                })
                .or_insert(record);
        }

        let mut chosen: Vec<&TrafficAllocation> = per_flight.into_values().collect();
        chosen.sort_by(|a, b| {
            let a_default = a.flight_id == DEFAULT_FLIGHT_ID;
            let b_default = b.flight_id == DEFAULT_FLIGHT_ID;
            // Experiment arms first with newer flights claiming the lower
            // buckets; Default last, names break remaining ties.
            a_default
                .cmp(&b_default)
                .then_with(|| b.flight_version.cmp(&a.flight_version))
                .then_with(|| a.flight_id.cmp(&b.flight_id))
        });

        let mut buckets = vec![None; BUCKET_COUNT];
        let mut next = 0usize;
        for allocation in &chosen {
            let width = allocation.percent as usize;
            if next + width > BUCKET_COUNT {
                return Err(AppError::Configuration(format!(
                    "allocations for '{}' exceed 100% (overflow at flight '{}')",
                    client_key,
                    allocation.flight_key()
                )));
            }
            let flight_key = allocation.flight_key();
            for bucket in buckets.iter_mut().skip(next).take(width) {
                *bucket = Some(flight_key.clone());
            }
            next += width;
        }

        let reseed_interval_secs = chosen
            .iter()
            .filter_map(|allocation| allocation.reseed_interval_secs)
            .filter(|interval| *interval > 0)
            .min();

        Ok(BucketTable {
            buckets,
            reseed_interval_secs,
        })
    }

    /// Resolve the flight for one query.
    ///
    /// Client keys are tried from most to least specific (exact, id + `*`,
    /// `*_*`); the first key with a bucket table decides the outcome. A gap
    /// at the user's bucket assigns the Default flight without consulting
    /// broader keys.
    pub fn resolve_flight(
        &self,
        client: &Client,
        user_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> FlightAssignment {
        let candidate_keys = [
            client.key(),
            format!("{}_{}", client.id.as_str(), WILDCARD),
            format!("{}_{}", WILDCARD, WILDCARD),
        ];

        for key in &candidate_keys {
            let Some(table) = self.tables.get(key) else {
                continue;
            };
            let bucket = self.bucket_for(user_id, table.reseed_interval_secs, now);
            return match &table.buckets[bucket as usize] {
                Some(flight_key) => {
                    debug!(client = %key, bucket, flight = %flight_key, "Assigned flight from bucket table");
                    FlightAssignment {
                        flight_key: flight_key.clone(),
                        bucket: Some(bucket),
                        via_default: false,
                    }
                }
                None => {
                    debug!(client = %key, bucket, "Bucket not covered, assigning Default flight");
                    FlightAssignment {
                        flight_key: self.default_flight_key.clone(),
                        bucket: Some(bucket),
                        via_default: true,
                    }
                }
            };
        }

        FlightAssignment {
            flight_key: self.default_flight_key.clone(),
            bucket: None,
            via_default: true,
        }
    }

    /// Bucket for a user id, rotating with the reseed epoch when the table
    /// configures one. Anonymous callers draw a fresh random bucket.
    fn bucket_for(
        &self,
        user_id: Option<&str>,
        reseed_interval_secs: Option<u64>,
        now: DateTime<Utc>,
    ) -> u8 {
        match user_id {
            Some(user) if !user.is_empty() => {
                let epoch =
                    reseed_interval_secs.map(|interval| now.timestamp() as u64 / interval);
                (utils::stable_hash(&(user, epoch)) % BUCKET_COUNT as u64) as u8
            }
            _ => {
                let mut rng = self
                    .anonymous_rng
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                rng.gen_range(0..BUCKET_COUNT) as u8
            }
        }
    }
}
