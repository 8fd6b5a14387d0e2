pub mod allocation;
pub mod client;
pub mod deal;
pub mod flight;
pub mod placement;
pub mod publishing;
pub mod ranking_group;

pub use allocation::{TrafficAllocation, WILDCARD};
pub use client::{Client, ClientApp, ClientId, ClientMappings};
pub use deal::{
    Deal, DealBusiness, DealEngagement, DealImage, DealProjection, DealStatus, DealType, GeoPoint,
    LocationType, Rankable, SlotRanks,
};
pub use flight::{flight_key, Flight, DEFAULT_FLIGHT_ID};
pub use placement::{ClientFlightPlacement, PlacementRules, DEFAULT_PLACEMENT};
pub use publishing::{PublishingVersion, RankSlot};
pub use ranking_group::{ImageSize, RankingGroup, RankingGroupRef, RankingRules};
