use async_trait::async_trait;

use super::types::HistoryProviderSnapshot;
use crate::errors::SchaltError;

/// Remote side of the commit-graph cache.
#[async_trait]
pub trait GitHistoryBackend: Send + Sync {
    async fn get_git_graph_history(
        &self,
        repo_path: &str,
        limit: usize,
        cursor: Option<&str>,
        since_head: Option<&str>,
    ) -> Result<HistoryProviderSnapshot, SchaltError>;
}
