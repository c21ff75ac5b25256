use serde::{Deserialize, Serialize};

use crate::domains::history::types::{DEFAULT_PAGE_SIZE, MAX_CACHED_ITEMS};

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_max_items() -> usize {
    MAX_CACHED_ITEMS
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct SessionPreferences {
    /// Cancel a session automatically once its merge completed.
    #[serde(default)]
    pub auto_cancel_after_merge: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct HistorySettings {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_items: MAX_CACHED_ITEMS,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct SyncSettings {
    #[serde(default)]
    pub session: SessionPreferences,
    #[serde(default)]
    pub history: HistorySettings,
}
