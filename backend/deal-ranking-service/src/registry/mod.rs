//! Registry layer: read-mostly configuration state for the query path.
//!
//! A rebuild parses and validates the whole document set into a fresh
//! `RegistrySnapshot`, then publishes it with one atomic pointer swap.
//! Readers load the snapshot once per query and keep a consistent view for
//! the query's lifetime; a failed rebuild leaves the previous snapshot
//! serving.

pub mod clients;
pub mod documents;
pub mod flights;
pub mod groups;
pub mod placements;
pub mod publishing;
pub mod traffic;

pub use clients::ClientRegistry;
pub use documents::RankingConfigDocument;
pub use flights::FlightRegistry;
pub use groups::{CompiledRankingGroup, RankingGroupRegistry};
pub use placements::{PlacementAssignmentIndex, PlacementSet, ResolvedPlacement};
pub use publishing::PublishingVersionRegistry;
pub use traffic::{FlightAssignment, TrafficAllocationIndex, BUCKET_COUNT};

use arc_swap::ArcSwap;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::error::Result;

/// One immutable view of every registry, built from a single document set.
pub struct RegistrySnapshot {
    pub clients: ClientRegistry,
    pub flights: FlightRegistry,
    pub groups: RankingGroupRegistry,
    pub publishing: PublishingVersionRegistry,
    pub traffic: TrafficAllocationIndex,
    pub placements: PlacementAssignmentIndex,
}

impl RegistrySnapshot {
    /// Build every registry bottom-up, failing fast on the first
    /// inconsistency.
    pub fn build(document: &RankingConfigDocument) -> Result<Self> {
        let clients = ClientRegistry::new(&document.clients);
        let flights = FlightRegistry::build(&document.flights)?;
        let groups = RankingGroupRegistry::build(&document.ranking_groups)?;
        let publishing = PublishingVersionRegistry::build(&document.publishing_versions, &groups)?;
        let traffic = TrafficAllocationIndex::build(&document.allocations, &flights, Utc::now())?;
        let placements =
            PlacementAssignmentIndex::build(&document.placements, &flights, &groups)?;

        info!(
            flights = flights.len(),
            ranking_groups = groups.len(),
            publishing_versions = publishing.len(),
            "Built registry snapshot"
        );

        Ok(Self {
            clients,
            flights,
            groups,
            publishing,
            traffic,
            placements,
        })
    }
}

/// Shared handle that publishes registry snapshots to the query path.
#[derive(Clone)]
pub struct SharedRegistry {
    inner: Arc<ArcSwap<RegistrySnapshot>>,
}

impl SharedRegistry {
    pub fn new(snapshot: RegistrySnapshot) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(snapshot)),
        }
    }

    /// Current snapshot. Wait-free; hold the `Arc` for the whole query so
    /// every lookup sees the same configuration.
    pub fn load(&self) -> Arc<RegistrySnapshot> {
        self.inner.load_full()
    }

    /// Publish a freshly built snapshot.
    pub fn publish(&self, snapshot: RegistrySnapshot) {
        self.inner.store(Arc::new(snapshot));
    }

    /// Rebuild from a document and publish only on success.
    pub fn rebuild_from(&self, document: &RankingConfigDocument) -> Result<()> {
        let snapshot = RegistrySnapshot::build(document)?;
        self.publish(snapshot);
        Ok(())
    }
}
