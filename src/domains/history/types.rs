use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const MAX_CACHED_ITEMS: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItemRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: String,
    #[serde(default)]
    pub full_hash: Option<String>,
    #[serde(default)]
    pub parent_ids: Vec<String>,
    pub subject: String,
    pub author: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub references: Vec<HistoryItemRef>,
}

impl HistoryItem {
    /// Identity used for deduplication: the full hash when known, else the id.
    pub fn key(&self) -> &str {
        self.full_hash.as_deref().unwrap_or(&self.id)
    }
}

/// Response of `get_git_graph_history`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HistoryProviderSnapshot {
    pub items: Vec<HistoryItem>,
    #[serde(default)]
    pub current_ref: Option<String>,
    #[serde(default)]
    pub current_remote_ref: Option<String>,
    #[serde(default)]
    pub current_base_ref: Option<String>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub head_commit: Option<String>,
    /// Set when `since_head` still matches the repository head and no items
    /// were computed.
    #[serde(default)]
    pub unchanged: bool,
}

/// Immutable cached view of a repository's history, newest commit first.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub items: Vec<HistoryItem>,
    pub current_ref: Option<String>,
    pub current_remote_ref: Option<String>,
    pub current_base_ref: Option<String>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
    pub head_commit: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RepoHistoryEntry {
    pub snapshot: Option<Arc<HistorySnapshot>>,
    pub is_loading: bool,
    pub is_loading_more: bool,
    pub error: Option<String>,
    pub load_more_error: Option<String>,
    pub latest_head: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Initial,
    Append,
    Refresh,
}

impl FetchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchMode::Initial => "initial",
            FetchMode::Append => "append",
            FetchMode::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub limit: usize,
    pub cursor: Option<String>,
    pub since_head: Option<String>,
}
