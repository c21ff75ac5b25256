use async_trait::async_trait;

use super::entity::{EnrichedSession, Session, SessionState};
use crate::errors::SchaltError;

/// Remote authority for the session registry.
#[async_trait]
pub trait SessionsBackend: Send + Sync {
    async fn list_enriched_sessions(&self) -> Result<Vec<EnrichedSession>, SchaltError>;

    async fn list_sessions_by_state(
        &self,
        state: SessionState,
    ) -> Result<Vec<Session>, SchaltError>;

    async fn convert_session_to_spec(&self, name: &str) -> Result<(), SchaltError>;

    async fn mark_session_ready(&self, name: &str) -> Result<(), SchaltError>;

    async fn unmark_session_ready(&self, name: &str) -> Result<(), SchaltError>;

    async fn start_spec_session(&self, name: &str) -> Result<(), SchaltError>;

    async fn create_spec_session(&self, name: &str, content: &str) -> Result<(), SchaltError>;

    async fn cancel_session(&self, name: &str) -> Result<(), SchaltError>;
}

/// Starts the agent process in a session's top terminal.
#[async_trait]
pub trait AgentLauncher: Send + Sync {
    async fn start_session_agent(
        &self,
        session_name: &str,
        terminal_id: &str,
    ) -> Result<(), SchaltError>;
}
