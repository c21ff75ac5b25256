//! Client-side state synchronization for schaltwerk sessions: a per-repository
//! commit history cache, the session registry and merge orchestration, all
//! kept current by backend push events.

pub mod domains;
pub mod errors;
pub mod infrastructure;
pub mod services;
pub mod shared;

pub use domains::history::HistoryCacheStore;
pub use domains::merge::MergeOrchestrator;
pub use domains::sessions::SessionRegistry;
pub use errors::SchaltError;
pub use infrastructure::events::{EventBus, SchaltEvent};
pub use infrastructure::logging::init_logging;
pub use services::{ServiceHandles, SyncBackends};
