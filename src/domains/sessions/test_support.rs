use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use super::backend::{AgentLauncher, SessionsBackend};
use super::entity::{
    DiffStats, EnrichedSession, Session, SessionInfo, SessionState, SessionStatusType,
};
use crate::errors::SchaltError;
use crate::shared::terminal_id::session_terminals;

pub fn running_session(name: &str) -> EnrichedSession {
    EnrichedSession {
        info: SessionInfo {
            session_id: name.to_string(),
            display_name: None,
            branch: format!("schaltwerk/{name}"),
            worktree_path: format!("/repo/.schaltwerk/worktrees/{name}"),
            base_branch: "main".into(),
            status: SessionStatusType::Active,
            session_state: SessionState::Running,
            created_at: Some(Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()),
            last_modified: None,
            has_uncommitted_changes: Some(false),
            diff_stats: Some(DiffStats {
                files_changed: 1,
                additions: 3,
                deletions: 0,
                insertions: 3,
            }),
            ready_to_merge: false,
            spec_content: None,
            original_agent_type: Some("claude".into()),
            merge_has_conflicts: None,
            merge_is_up_to_date: None,
            merge_conflicting_paths: None,
        },
        terminals: session_terminals(name),
    }
}

pub fn reviewed_session(name: &str) -> EnrichedSession {
    let mut session = running_session(name);
    session.info.session_state = SessionState::Reviewed;
    session.info.ready_to_merge = true;
    session
}

pub fn spec_session(name: &str) -> EnrichedSession {
    let mut session = running_session(name);
    session.info.session_state = SessionState::Spec;
    session.info.status = SessionStatusType::Spec;
    session.info.worktree_path = String::new();
    session.info.diff_stats = None;
    session.info.has_uncommitted_changes = None;
    session.info.spec_content = Some(format!("# {name}"));
    session
}

pub fn raw_spec(name: &str) -> Session {
    let created = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
    Session {
        id: format!("uuid-{name}"),
        name: name.to_string(),
        display_name: None,
        branch: format!("schaltwerk/{name}"),
        parent_branch: "main".into(),
        worktree_path: String::new(),
        created_at: created,
        updated_at: created,
        last_activity: None,
        ready_to_merge: false,
        spec_content: Some(format!("# {name}")),
        session_state: SessionState::Spec,
        original_agent_type: None,
    }
}

#[derive(Default)]
pub struct MockSessionsBackend {
    pub enriched: Mutex<Vec<EnrichedSession>>,
    pub specs: Mutex<Vec<Session>>,
    pub enriched_error: Mutex<Option<SchaltError>>,
    pub cancel_error: Mutex<Option<SchaltError>>,
    pub enriched_calls: AtomicUsize,
    pub spec_calls: AtomicUsize,
    pub commands: Mutex<Vec<String>>,
    pub gate: Option<Arc<Semaphore>>,
}

impl MockSessionsBackend {
    pub fn with_sessions(sessions: Vec<EnrichedSession>) -> Self {
        Self {
            enriched: Mutex::new(sessions),
            ..Default::default()
        }
    }

    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn set_sessions(&self, sessions: Vec<EnrichedSession>) {
        *self.enriched.lock() = sessions;
    }

    pub fn enriched_calls(&self) -> usize {
        self.enriched_calls.load(Ordering::SeqCst)
    }

    pub fn spec_calls(&self) -> usize {
        self.spec_calls.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    fn record(&self, command: String) {
        self.commands.lock().push(command);
    }
}

#[async_trait]
impl SessionsBackend for MockSessionsBackend {
    async fn list_enriched_sessions(&self) -> Result<Vec<EnrichedSession>, SchaltError> {
        self.enriched_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if let Some(error) = self.enriched_error.lock().clone() {
            return Err(error);
        }
        Ok(self.enriched.lock().clone())
    }

    async fn list_sessions_by_state(
        &self,
        state: SessionState,
    ) -> Result<Vec<Session>, SchaltError> {
        self.spec_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .specs
            .lock()
            .iter()
            .filter(|s| s.session_state == state)
            .cloned()
            .collect())
    }

    async fn convert_session_to_spec(&self, name: &str) -> Result<(), SchaltError> {
        self.record(format!("convert_to_spec:{name}"));
        Ok(())
    }

    async fn mark_session_ready(&self, name: &str) -> Result<(), SchaltError> {
        self.record(format!("mark_ready:{name}"));
        Ok(())
    }

    async fn unmark_session_ready(&self, name: &str) -> Result<(), SchaltError> {
        self.record(format!("unmark_ready:{name}"));
        Ok(())
    }

    async fn start_spec_session(&self, name: &str) -> Result<(), SchaltError> {
        self.record(format!("start_spec:{name}"));
        Ok(())
    }

    async fn create_spec_session(&self, name: &str, content: &str) -> Result<(), SchaltError> {
        self.record(format!("create_spec:{name}:{content}"));
        Ok(())
    }

    async fn cancel_session(&self, name: &str) -> Result<(), SchaltError> {
        self.record(format!("cancel:{name}"));
        match self.cancel_error.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct RecordingLauncher {
    pub starts: Mutex<Vec<(String, String)>>,
    pub fail: Mutex<bool>,
}

impl RecordingLauncher {
    pub fn started_sessions(&self) -> Vec<String> {
        self.starts
            .lock()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl AgentLauncher for RecordingLauncher {
    async fn start_session_agent(
        &self,
        session_name: &str,
        terminal_id: &str,
    ) -> Result<(), SchaltError> {
        self.starts
            .lock()
            .push((session_name.to_string(), terminal_id.to_string()));
        if *self.fail.lock() {
            return Err(SchaltError::remote("start_session_agent", "spawn failed"));
        }
        Ok(())
    }
}
