use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use schaltwerk_sync::domains::history::{
    GitHistoryBackend, HistoryItem, HistoryProviderSnapshot,
};
use schaltwerk_sync::domains::merge::{
    MergeBackend, MergeDialogStatus, MergeMode, MergePreview, MergeStatus, Toast, ToastSink,
    ToastTone,
};
use schaltwerk_sync::domains::sessions::{
    AgentLauncher, EnrichedSession, Session, SessionInfo, SessionState, SessionsBackend,
};
use schaltwerk_sync::domains::sessions::entity::{DiffStats, SessionStatusType};
use schaltwerk_sync::domains::settings::SettingsStore;
use schaltwerk_sync::infrastructure::events::{GitOperationPayload, MERGE_OPERATION};
use schaltwerk_sync::{SchaltError, SchaltEvent, ServiceHandles, SyncBackends};
use tempfile::TempDir;

type HistoryCall = (usize, Option<String>, Option<String>);

struct ScriptedHistory {
    calls: Mutex<Vec<HistoryCall>>,
}

fn commit(hash: &str, subject: &str) -> HistoryItem {
    HistoryItem {
        id: hash.to_string(),
        full_hash: None,
        parent_ids: vec![],
        subject: subject.to_string(),
        author: "dev".to_string(),
        timestamp: 1_700_000_000,
        references: vec![],
    }
}

#[async_trait]
impl GitHistoryBackend for ScriptedHistory {
    async fn get_git_graph_history(
        &self,
        _repo_path: &str,
        limit: usize,
        cursor: Option<&str>,
        since_head: Option<&str>,
    ) -> Result<HistoryProviderSnapshot, SchaltError> {
        self.calls.lock().push((
            limit,
            cursor.map(str::to_string),
            since_head.map(str::to_string),
        ));
        let mut items = vec![commit("c2", "second"), commit("c1", "first")];
        let mut head = "c2";
        if since_head.is_some() {
            items.insert(0, commit("c3", "merge alpha"));
            head = "c3";
        }
        Ok(HistoryProviderSnapshot {
            items,
            current_ref: Some("main".into()),
            head_commit: Some(head.into()),
            ..Default::default()
        })
    }
}

struct OneSession;

#[async_trait]
impl SessionsBackend for OneSession {
    async fn list_enriched_sessions(&self) -> Result<Vec<EnrichedSession>, SchaltError> {
        Ok(vec![EnrichedSession {
            info: SessionInfo {
                session_id: "alpha".into(),
                display_name: None,
                branch: "schaltwerk/alpha".into(),
                worktree_path: "/repo/.schaltwerk/worktrees/alpha".into(),
                base_branch: "main".into(),
                status: SessionStatusType::Active,
                session_state: SessionState::Reviewed,
                created_at: None,
                last_modified: None,
                has_uncommitted_changes: Some(false),
                diff_stats: Some(DiffStats {
                    files_changed: 2,
                    additions: 10,
                    deletions: 1,
                    insertions: 10,
                }),
                ready_to_merge: true,
                spec_content: None,
                original_agent_type: None,
                merge_has_conflicts: None,
                merge_is_up_to_date: None,
                merge_conflicting_paths: None,
            },
            terminals: vec![],
        }])
    }

    async fn list_sessions_by_state(
        &self,
        _state: SessionState,
    ) -> Result<Vec<Session>, SchaltError> {
        Ok(vec![])
    }

    async fn convert_session_to_spec(&self, _name: &str) -> Result<(), SchaltError> {
        Ok(())
    }

    async fn mark_session_ready(&self, _name: &str) -> Result<(), SchaltError> {
        Ok(())
    }

    async fn unmark_session_ready(&self, _name: &str) -> Result<(), SchaltError> {
        Ok(())
    }

    async fn start_spec_session(&self, _name: &str) -> Result<(), SchaltError> {
        Ok(())
    }

    async fn create_spec_session(&self, _name: &str, _content: &str) -> Result<(), SchaltError> {
        Ok(())
    }

    async fn cancel_session(&self, _name: &str) -> Result<(), SchaltError> {
        Ok(())
    }
}

struct NoopLauncher;

#[async_trait]
impl AgentLauncher for NoopLauncher {
    async fn start_session_agent(
        &self,
        _session_name: &str,
        _terminal_id: &str,
    ) -> Result<(), SchaltError> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingMerge {
    merges: Mutex<Vec<(String, MergeMode, Option<String>)>>,
}

#[async_trait]
impl MergeBackend for RecordingMerge {
    async fn get_merge_preview(&self, session_name: &str) -> Result<MergePreview, SchaltError> {
        Ok(MergePreview {
            session_branch: format!("schaltwerk/{session_name}"),
            parent_branch: "main".into(),
            squash_commands: vec![],
            reapply_commands: vec![],
            default_commit_message: format!("Merge {session_name}"),
            has_conflicts: false,
            conflicting_paths: vec![],
            is_up_to_date: false,
        })
    }

    async fn merge_session_to_main(
        &self,
        session_name: &str,
        mode: MergeMode,
        commit_message: Option<String>,
    ) -> Result<(), SchaltError> {
        self.merges
            .lock()
            .push((session_name.to_string(), mode, commit_message));
        Ok(())
    }
}

#[derive(Default)]
struct Toasts(Mutex<Vec<Toast>>);

impl ToastSink for Toasts {
    fn push_toast(&self, toast: Toast) {
        self.0.lock().push(toast);
    }
}

fn merge_payload() -> GitOperationPayload {
    GitOperationPayload {
        session_name: "alpha".into(),
        project_path: "/repo".into(),
        operation: MERGE_OPERATION.into(),
        mode: Some("squash".into()),
        commit: Some("c3".into()),
    }
}

#[tokio::test]
async fn completed_merge_updates_dialog_registry_and_history() {
    let dir = TempDir::new().unwrap();
    let settings = Arc::new(SettingsStore::load(dir.path().join("sync.toml")).unwrap());
    let history = Arc::new(ScriptedHistory {
        calls: Mutex::new(Vec::new()),
    });
    let merge = Arc::new(RecordingMerge::default());
    let toasts = Arc::new(Toasts::default());
    let handles = ServiceHandles::new(
        SyncBackends {
            history: history.clone(),
            sessions: Arc::new(OneSession),
            launcher: Arc::new(NoopLauncher),
            merge: merge.clone(),
            toasts: toasts.clone(),
        },
        settings,
    );
    let pumps = handles.start_event_pumps();

    handles.history.ensure_loaded("/repo").await;
    handles.sessions.reload_sessions().await;
    assert_eq!(handles.sessions.merge_status("alpha"), MergeStatus::Idle);

    handles.merge.open_merge_dialog("alpha").await;
    handles
        .merge
        .confirm_merge(MergeMode::Squash, Some("Merge alpha".into()))
        .await;
    assert_eq!(
        handles.merge.dialog_state().status,
        MergeDialogStatus::Running
    );

    handles
        .events
        .publish(SchaltEvent::GitOperationStarted(merge_payload()));
    handles
        .events
        .publish(SchaltEvent::GitOperationCompleted(merge_payload()));

    for _ in 0..200 {
        let refreshed = handles
            .history
            .get_state("/repo")
            .snapshot
            .is_some_and(|s| s.items.len() == 3);
        if refreshed && handles.merge.dialog_state().status == MergeDialogStatus::Idle {
            break;
        }
        tokio::task::yield_now().await;
    }

    assert_eq!(
        merge.merges.lock().clone(),
        vec![(
            "alpha".to_string(),
            MergeMode::Squash,
            Some("Merge alpha".to_string())
        )]
    );
    assert_eq!(handles.merge.dialog_state().status, MergeDialogStatus::Idle);
    assert_eq!(handles.sessions.merge_status("alpha"), MergeStatus::Merged);
    assert_eq!(toasts.0.lock()[0].tone, ToastTone::Success);

    let entry = handles.history.get_state("/repo");
    let keys: Vec<_> = entry
        .snapshot
        .as_ref()
        .unwrap()
        .items
        .iter()
        .map(|item| item.id.clone())
        .collect();
    assert_eq!(keys, vec!["c3", "c2", "c1"]);
    assert_eq!(entry.latest_head.as_deref(), Some("c3"));
    assert_eq!(
        history.calls.lock().clone(),
        vec![(100, None, None), (100, None, Some("c2".to_string()))]
    );

    for pump in pumps {
        pump.abort();
    }
}
