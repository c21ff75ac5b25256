pub mod backend;
pub mod merge;
pub mod store;
pub mod types;

pub use backend::GitHistoryBackend;
pub use store::HistoryCacheStore;
pub use types::{
    FetchMode, HistoryItem, HistoryItemRef, HistoryProviderSnapshot, HistorySnapshot,
    RepoHistoryEntry,
};
