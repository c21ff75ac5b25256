use async_trait::async_trait;

use super::types::{MergeMode, MergePreview, Toast};
use crate::errors::SchaltError;

#[async_trait]
pub trait MergeBackend: Send + Sync {
    async fn get_merge_preview(&self, session_name: &str) -> Result<MergePreview, SchaltError>;

    /// Starts the merge. Completion is reported through git operation events,
    /// not through this call's result.
    async fn merge_session_to_main(
        &self,
        session_name: &str,
        mode: MergeMode,
        commit_message: Option<String>,
    ) -> Result<(), SchaltError>;
}

/// UI notification surface.
pub trait ToastSink: Send + Sync {
    fn push_toast(&self, toast: Toast);
}
