pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod registry;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{AppError, Result};
pub use models::{Client, Deal, DealProjection, RankSlot, Rankable, SlotRanks};
pub use registry::{RankingConfigDocument, RegistrySnapshot, SharedRegistry};
pub use services::{
    DealRankingService, ExternalRankCache, ExternalRankSource, QueryFilters, QueryRankingContext,
    ScoringEngine,
};
