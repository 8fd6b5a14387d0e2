pub mod context;
pub mod external_ranks;
pub mod resolver;
pub mod scoring;

pub use context::{FeaturePlacement, QueryFilters, QueryRankingContext};
pub use external_ranks::{ExternalRankCache, ExternalRankSource, DEFAULT_EXTERNAL_RANK};
pub use resolver::DealRankingService;
pub use scoring::ScoringEngine;
