mod bus;

pub use bus::{EventBus, EventFilter, EventSubscription};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domains::sessions::entity::EnrichedSession;

/// Push notifications delivered by the backend. One variant per event kind,
/// each carrying its typed payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "payload")]
pub enum SchaltEvent {
    SessionsRefreshed(Vec<EnrichedSession>),
    SessionAdded(SessionAddedPayload),
    SessionRemoved(SessionRemovedPayload),
    SessionCancelling(SessionCancellingPayload),
    SessionActivity(SessionActivityUpdated),
    SessionGitStats(SessionGitStatsUpdated),
    GitOperationStarted(GitOperationPayload),
    GitOperationCompleted(GitOperationPayload),
    GitOperationFailed(GitOperationFailedPayload),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchaltEventKind {
    SessionsRefreshed,
    SessionAdded,
    SessionRemoved,
    SessionCancelling,
    SessionActivity,
    SessionGitStats,
    GitOperationStarted,
    GitOperationCompleted,
    GitOperationFailed,
}

impl SchaltEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchaltEventKind::SessionsRefreshed => "schaltwerk:sessions-refreshed",
            SchaltEventKind::SessionAdded => "schaltwerk:session-added",
            SchaltEventKind::SessionRemoved => "schaltwerk:session-removed",
            SchaltEventKind::SessionCancelling => "schaltwerk:session-cancelling",
            SchaltEventKind::SessionActivity => "schaltwerk:session-activity",
            SchaltEventKind::SessionGitStats => "schaltwerk:session-git-stats",
            SchaltEventKind::GitOperationStarted => "schaltwerk:git-operation-started",
            SchaltEventKind::GitOperationCompleted => "schaltwerk:git-operation-completed",
            SchaltEventKind::GitOperationFailed => "schaltwerk:git-operation-failed",
        }
    }
}

impl SchaltEvent {
    pub fn kind(&self) -> SchaltEventKind {
        match self {
            SchaltEvent::SessionsRefreshed(_) => SchaltEventKind::SessionsRefreshed,
            SchaltEvent::SessionAdded(_) => SchaltEventKind::SessionAdded,
            SchaltEvent::SessionRemoved(_) => SchaltEventKind::SessionRemoved,
            SchaltEvent::SessionCancelling(_) => SchaltEventKind::SessionCancelling,
            SchaltEvent::SessionActivity(_) => SchaltEventKind::SessionActivity,
            SchaltEvent::SessionGitStats(_) => SchaltEventKind::SessionGitStats,
            SchaltEvent::GitOperationStarted(_) => SchaltEventKind::GitOperationStarted,
            SchaltEvent::GitOperationCompleted(_) => SchaltEventKind::GitOperationCompleted,
            SchaltEvent::GitOperationFailed(_) => SchaltEventKind::GitOperationFailed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.kind().as_str()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionAddedPayload {
    pub session_name: String,
    pub branch: String,
    pub worktree_path: String,
    pub parent_branch: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRemovedPayload {
    pub session_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionCancellingPayload {
    pub session_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionActivityUpdated {
    pub session_id: String,
    pub session_name: String,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionGitStatsUpdated {
    pub session_id: String,
    pub session_name: String,
    pub files_changed: u32,
    pub lines_added: u32,
    pub lines_removed: u32,
    pub has_uncommitted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_has_conflicts: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_conflicting_paths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_is_up_to_date: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitOperationPayload {
    pub session_name: String,
    pub project_path: String,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitOperationFailedPayload {
    pub session_name: String,
    pub project_path: String,
    pub operation: String,
    pub error: String,
}

pub const MERGE_OPERATION: &str = "merge";
