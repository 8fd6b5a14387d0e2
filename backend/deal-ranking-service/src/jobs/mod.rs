pub mod rank_sync;
pub mod registry_refresh;

pub use rank_sync::{start_rank_sync, RankSyncConfig};
pub use registry_refresh::{start_registry_refresh, RegistryRefreshConfig};
