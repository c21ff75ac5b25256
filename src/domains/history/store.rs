use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::watch;

use super::backend::GitHistoryBackend;
use super::merge::merge_history;
use super::types::{FetchMode, HistoryRequest, RepoHistoryEntry};
use crate::domains::settings::HistorySettings;
use crate::infrastructure::events::SchaltEvent;
use crate::shared::singleflight::SingleFlight;

pub type HistoryEntries = HashMap<String, RepoHistoryEntry>;

struct HistoryCacheInner {
    backend: Arc<dyn GitHistoryBackend>,
    settings: HistorySettings,
    entries: watch::Sender<HistoryEntries>,
}

/// Per-repository cache of the paginated commit graph.
///
/// Every fetch for a repository goes through one singleflight key, so at most
/// one request per repository is outstanding at any time.
pub struct HistoryCacheStore {
    inner: Arc<HistoryCacheInner>,
    flights: SingleFlight<()>,
}

impl HistoryCacheStore {
    pub fn new(backend: Arc<dyn GitHistoryBackend>, settings: HistorySettings) -> Self {
        let (entries, _) = watch::channel(HistoryEntries::new());
        Self {
            inner: Arc::new(HistoryCacheInner {
                backend,
                settings,
                entries,
            }),
            flights: SingleFlight::new(),
        }
    }

    pub fn get_state(&self, repo_path: &str) -> RepoHistoryEntry {
        self.inner
            .entries
            .borrow()
            .get(repo_path)
            .cloned()
            .unwrap_or_default()
    }

    pub fn subscribe(&self) -> watch::Receiver<HistoryEntries> {
        self.inner.entries.subscribe()
    }

    pub fn cached_repo_paths(&self) -> Vec<String> {
        self.inner.entries.borrow().keys().cloned().collect()
    }

    pub fn is_fetching(&self, repo_path: &str) -> bool {
        self.flights.is_in_flight(repo_path)
    }

    pub async fn ensure_loaded(&self, repo_path: &str) {
        let has_snapshot = self
            .inner
            .entries
            .borrow()
            .get(repo_path)
            .is_some_and(|entry| entry.snapshot.is_some());
        if has_snapshot {
            return;
        }
        self.fetch(repo_path, FetchMode::Initial, None).await;
    }

    pub async fn load_more(&self, repo_path: &str, cursor: Option<&str>) {
        let Some(cursor) = cursor else {
            debug!("load_more for {repo_path} without cursor ignored");
            return;
        };
        self.fetch(repo_path, FetchMode::Append, Some(cursor.to_string()))
            .await;
    }

    /// Fetches the newest commits using the last known head as delta hint.
    /// Waits for any outstanding fetch for the same repository first so the
    /// hint reflects its result.
    pub async fn refresh(&self, repo_path: &str) {
        self.fetch(repo_path, FetchMode::Refresh, None).await;
    }

    /// Drops the cached entry, e.g. when the project is closed.
    pub fn invalidate(&self, repo_path: &str) {
        let removed = self
            .inner
            .entries
            .send_if_modified(|entries| entries.remove(repo_path).is_some());
        if removed {
            debug!("Invalidated history cache for {repo_path}");
        }
    }

    pub async fn handle_event(&self, event: &SchaltEvent) {
        if let SchaltEvent::GitOperationCompleted(payload) = event {
            let cached = self
                .inner
                .entries
                .borrow()
                .contains_key(&payload.project_path);
            if cached {
                info!(
                    "Refreshing history for {} after {} of '{}'",
                    payload.project_path, payload.operation, payload.session_name
                );
                self.refresh(&payload.project_path).await;
            }
        }
    }

    async fn fetch(&self, repo_path: &str, mode: FetchMode, cursor: Option<String>) {
        let inner = Arc::clone(&self.inner);
        let key = repo_path.to_string();
        let producer = move || async move {
            inner.fetch_and_merge(&key, mode, cursor).await;
            Ok(())
        };
        let _ = match mode {
            FetchMode::Refresh => self.flights.run_after_pending(repo_path, producer).await,
            FetchMode::Initial | FetchMode::Append => self.flights.run(repo_path, producer).await,
        };
    }
}

impl HistoryCacheInner {
    async fn fetch_and_merge(&self, repo_path: &str, mode: FetchMode, cursor: Option<String>) {
        let mut latest_head = None;
        self.entries.send_modify(|entries| {
            let entry = entries.entry(repo_path.to_string()).or_default();
            match mode {
                FetchMode::Append => {
                    entry.is_loading_more = true;
                    entry.load_more_error = None;
                }
                FetchMode::Initial | FetchMode::Refresh => entry.is_loading = true,
            }
            latest_head = entry.latest_head.clone();
        });

        let request = HistoryRequest {
            limit: self.settings.page_size,
            cursor,
            since_head: match mode {
                FetchMode::Refresh => latest_head,
                FetchMode::Initial | FetchMode::Append => None,
            },
        };
        debug!(
            "Fetching {} history for {repo_path} (cursor={:?}, since_head={:?})",
            mode.as_str(),
            request.cursor,
            request.since_head
        );

        let result = self
            .backend
            .get_git_graph_history(
                repo_path,
                request.limit,
                request.cursor.as_deref(),
                request.since_head.as_deref(),
            )
            .await;

        let max_items = self.settings.max_items;
        self.entries.send_modify(|entries| {
            let entry = entries.entry(repo_path.to_string()).or_default();
            match result {
                Ok(response) => {
                    let merged = merge_history(
                        entry.snapshot.as_ref(),
                        entry.latest_head.as_deref(),
                        response,
                        mode,
                        request.cursor.as_deref(),
                        max_items,
                    );
                    entry.snapshot = Some(merged.snapshot);
                    entry.latest_head = merged.resolved_head;
                    match mode {
                        FetchMode::Append => {
                            entry.is_loading_more = false;
                            entry.load_more_error = None;
                        }
                        FetchMode::Initial | FetchMode::Refresh => {
                            entry.is_loading = false;
                            entry.error = None;
                            if merged.diverged {
                                entry.load_more_error = None;
                            }
                        }
                    }
                }
                Err(err) => {
                    warn!(
                        "Failed to load {} history for {repo_path}: {err}",
                        mode.as_str()
                    );
                    match mode {
                        FetchMode::Append => {
                            entry.is_loading_more = false;
                            entry.load_more_error = Some(err.to_string());
                        }
                        FetchMode::Initial | FetchMode::Refresh => {
                            entry.is_loading = false;
                            entry.error = Some(err.to_string());
                        }
                    }
                }
            }
        });
    }
}
