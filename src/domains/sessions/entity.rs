use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::terminal_id::session_terminals;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Spec,
    Running,
    Reviewed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Spec => "spec",
            SessionState::Running => "running",
            SessionState::Reviewed => "reviewed",
        }
    }
}

/// Worktree health as reported by the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatusType {
    Active,
    Dirty,
    Missing,
    Spec,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DiffStats {
    pub files_changed: usize,
    pub additions: usize,
    pub deletions: usize,
    pub insertions: usize,
}

impl DiffStats {
    pub fn is_empty(&self) -> bool {
        self.files_changed == 0
            && self.additions == 0
            && self.deletions == 0
            && self.insertions == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionInfo {
    /// Session name; the stable key across every store.
    pub session_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub branch: String,
    pub worktree_path: String,
    pub base_branch: String,
    pub status: SessionStatusType,
    pub session_state: SessionState,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub has_uncommitted_changes: Option<bool>,
    #[serde(default)]
    pub diff_stats: Option<DiffStats>,
    #[serde(default)]
    pub ready_to_merge: bool,
    #[serde(default)]
    pub spec_content: Option<String>,
    #[serde(default)]
    pub original_agent_type: Option<String>,
    #[serde(default)]
    pub merge_has_conflicts: Option<bool>,
    #[serde(default)]
    pub merge_is_up_to_date: Option<bool>,
    #[serde(default)]
    pub merge_conflicting_paths: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichedSession {
    pub info: SessionInfo,
    #[serde(default)]
    pub terminals: Vec<String>,
}

impl EnrichedSession {
    pub fn id(&self) -> &str {
        &self.info.session_id
    }

    pub fn state(&self) -> SessionState {
        self.info.session_state
    }
}

/// Row returned by `list_sessions_by_state`; spec sessions have no worktree
/// and therefore no git-derived fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub branch: String,
    pub parent_branch: String,
    pub worktree_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ready_to_merge: bool,
    #[serde(default)]
    pub spec_content: Option<String>,
    pub session_state: SessionState,
    #[serde(default)]
    pub original_agent_type: Option<String>,
}

impl From<Session> for EnrichedSession {
    fn from(session: Session) -> Self {
        let is_spec = session.session_state == SessionState::Spec;
        let terminals = session_terminals(&session.name);
        EnrichedSession {
            info: SessionInfo {
                session_id: session.name,
                display_name: session.display_name,
                branch: session.branch,
                worktree_path: session.worktree_path,
                base_branch: session.parent_branch,
                status: if is_spec {
                    SessionStatusType::Spec
                } else {
                    SessionStatusType::Active
                },
                session_state: session.session_state,
                created_at: Some(session.created_at),
                last_modified: session.last_activity.or(Some(session.updated_at)),
                has_uncommitted_changes: None,
                diff_stats: None,
                ready_to_merge: session.ready_to_merge,
                spec_content: session.spec_content,
                original_agent_type: session.original_agent_type,
                merge_has_conflicts: None,
                merge_is_up_to_date: None,
                merge_conflicting_paths: None,
            },
            terminals,
        }
    }
}

/// Requested lifecycle change for `update_session_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatusUpdate {
    /// Convert back to a spec (drops the worktree).
    Spec,
    /// Remove the reviewed mark.
    Running,
    /// Mark reviewed / ready to merge.
    Reviewed,
}
