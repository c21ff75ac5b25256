use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::sync::watch;

use super::backend::{MergeBackend, ToastSink};
use super::types::{
    MergeDialogState, MergeDialogStatus, MergeMode, MergePreview, MergeStatus, Toast, ToastTone,
};
use crate::domains::sessions::registry::SessionRegistry;
use crate::domains::settings::SettingsStore;
use crate::infrastructure::events::{GitOperationPayload, MERGE_OPERATION, SchaltEvent};

/// Drives the merge dialog and folds merge lifecycle events into the session
/// registry.
///
/// The dialog moves `Idle -> Loading -> Ready -> Running` and leaves
/// `Running` only through a git operation event (or a failed dispatch).
pub struct MergeOrchestrator {
    registry: Arc<SessionRegistry>,
    backend: Arc<dyn MergeBackend>,
    toasts: Arc<dyn ToastSink>,
    settings: Arc<SettingsStore>,
    dialog: watch::Sender<MergeDialogState>,
    last_errors: Mutex<HashMap<String, String>>,
}

impl MergeOrchestrator {
    pub fn new(
        registry: Arc<SessionRegistry>,
        backend: Arc<dyn MergeBackend>,
        toasts: Arc<dyn ToastSink>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        let (dialog, _) = watch::channel(MergeDialogState::default());
        Self {
            registry,
            backend,
            toasts,
            settings,
            dialog,
            last_errors: Mutex::new(HashMap::new()),
        }
    }

    pub fn dialog_state(&self) -> MergeDialogState {
        self.dialog.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MergeDialogState> {
        self.dialog.subscribe()
    }

    pub async fn open_merge_dialog(&self, session_id: &str) {
        if self.dialog.borrow().status == MergeDialogStatus::Running {
            debug!("Ignoring merge dialog request for '{session_id}' while a merge runs");
            return;
        }
        self.dialog.send_replace(MergeDialogState {
            status: MergeDialogStatus::Loading,
            session_id: Some(session_id.to_string()),
            preview: None,
            error: None,
        });
        self.registry.invalidate_merge_preview(session_id);

        let (preview, error) = match self.backend.get_merge_preview(session_id).await {
            Ok(preview) => {
                debug!(
                    "Merge preview for '{session_id}': conflicts={}, up_to_date={}",
                    preview.has_conflicts, preview.is_up_to_date
                );
                self.registry
                    .record_merge_preview(session_id, preview.clone());
                (Some(preview), None)
            }
            Err(e) => {
                warn!("Failed to load merge preview for '{session_id}': {e}");
                (None, Some(e.to_string()))
            }
        };

        let shown = self.dialog.send_if_modified(|state| {
            if !state.targets(session_id) || state.status != MergeDialogStatus::Loading {
                return false;
            }
            state.status = MergeDialogStatus::Ready;
            state.preview = preview;
            state.error = error;
            true
        });
        if !shown {
            debug!("Merge preview for '{session_id}' arrived after the dialog moved on");
        }
    }

    /// Returns `false` when the dialog cannot close because a merge is running.
    pub fn close_merge_dialog(&self) -> bool {
        let mut closed = true;
        self.dialog.send_if_modified(|state| match state.status {
            MergeDialogStatus::Running => {
                closed = false;
                false
            }
            MergeDialogStatus::Idle => false,
            _ => {
                *state = MergeDialogState::default();
                true
            }
        });
        closed
    }

    pub async fn confirm_merge(&self, mode: MergeMode, commit_message: Option<String>) {
        let (session_id, preview) = {
            let state = self.dialog.borrow();
            if state.status != MergeDialogStatus::Ready {
                debug!("Merge confirmation ignored in {:?} state", state.status);
                return;
            }
            let Some(session_id) = state.session_id.clone() else {
                return;
            };
            (session_id, state.preview.clone())
        };

        let commit_message = commit_message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        if let Some(reason) = blocked_reason(preview.as_ref(), mode, commit_message.as_deref()) {
            info!("Merge of '{session_id}' blocked: {reason}");
            self.dialog.send_if_modified(|state| {
                if !state.targets(&session_id) {
                    return false;
                }
                state.error = Some(reason);
                true
            });
            return;
        }

        let started = self.dialog.send_if_modified(|state| {
            if !state.targets(&session_id) || state.status != MergeDialogStatus::Ready {
                return false;
            }
            state.status = MergeDialogStatus::Running;
            state.error = None;
            true
        });
        if !started {
            return;
        }

        let commit_message = match mode {
            MergeMode::Squash => commit_message,
            MergeMode::Reapply => None,
        };
        info!("Merging '{session_id}' ({})", mode.as_str());
        if let Err(e) = self
            .backend
            .merge_session_to_main(&session_id, mode, commit_message)
            .await
        {
            self.record_failure(&session_id, &e.to_string());
        }
    }

    pub fn handle_event(&self, event: &SchaltEvent) {
        match event {
            SchaltEvent::GitOperationStarted(payload) if payload.operation == MERGE_OPERATION => {
                debug!("Merge of '{}' started", payload.session_name);
                self.dialog.send_if_modified(|state| {
                    if !state.targets(&payload.session_name)
                        || state.status == MergeDialogStatus::Running
                    {
                        return false;
                    }
                    state.status = MergeDialogStatus::Running;
                    state.error = None;
                    true
                });
            }
            SchaltEvent::GitOperationCompleted(payload) if payload.operation == MERGE_OPERATION => {
                self.complete_merge(payload);
            }
            SchaltEvent::GitOperationFailed(payload) if payload.operation == MERGE_OPERATION => {
                self.record_failure(&payload.session_name, &payload.error);
            }
            _ => {}
        }
    }

    fn complete_merge(&self, payload: &GitOperationPayload) {
        let name = payload.session_name.as_str();
        info!("Merge of '{name}' completed");
        self.last_errors.lock().remove(name);
        self.registry.set_merge_status(name, MergeStatus::Merged);
        self.dialog.send_if_modified(|state| {
            if !state.targets(name) {
                return false;
            }
            *state = MergeDialogState::default();
            true
        });

        let description = payload.commit.as_deref().map(|commit| {
            let short: String = commit.chars().take(7).collect();
            match payload.mode.as_deref() {
                Some(mode) => format!("{mode} merge created {short}"),
                None => format!("Created {short}"),
            }
        });
        self.toasts.push_toast(Toast {
            tone: ToastTone::Success,
            title: format!("Merged {name}"),
            description,
        });

        if self.settings.auto_cancel_after_merge() && !self.registry.is_cancelling(name) {
            self.spawn_auto_cancel(name.to_string());
        }
    }

    fn spawn_auto_cancel(&self, name: String) {
        let registry = Arc::clone(&self.registry);
        let toasts = Arc::clone(&self.toasts);
        tokio::spawn(async move {
            info!("Cancelling '{name}' after merge");
            if let Err(e) = registry.cancel_session(&name).await {
                warn!("Auto-cancel after merge failed for '{name}': {e}");
                toasts.push_toast(Toast {
                    tone: ToastTone::Warning,
                    title: format!("Merged {name}, but cancelling the session failed"),
                    description: Some(e.to_string()),
                });
            }
        });
    }

    fn record_failure(&self, name: &str, message: &str) {
        warn!("Merge of '{name}' failed: {message}");
        self.dialog.send_if_modified(|state| {
            if !state.targets(name) {
                return false;
            }
            state.status = MergeDialogStatus::Ready;
            state.error = Some(message.to_string());
            true
        });

        let repeated = {
            let mut last = self.last_errors.lock();
            if last.get(name).map(String::as_str) == Some(message) {
                true
            } else {
                last.insert(name.to_string(), message.to_string());
                false
            }
        };
        if repeated {
            debug!("Suppressing repeated merge error toast for '{name}'");
            return;
        }
        self.toasts.push_toast(Toast {
            tone: ToastTone::Error,
            title: format!("Merge failed for {name}"),
            description: Some(message.to_string()),
        });
    }
}

fn blocked_reason(
    preview: Option<&MergePreview>,
    mode: MergeMode,
    commit_message: Option<&str>,
) -> Option<String> {
    let Some(preview) = preview else {
        return Some("Merge preview is unavailable. Reopen the merge dialog.".into());
    };
    if preview.has_conflicts {
        return Some(format!(
            "Resolve conflicts between {} and {} before merging.",
            preview.session_branch, preview.parent_branch
        ));
    }
    if preview.is_up_to_date {
        return Some(format!(
            "Nothing to merge: {} is already up to date with {}.",
            preview.session_branch, preview.parent_branch
        ));
    }
    if mode == MergeMode::Squash && commit_message.is_none() {
        return Some("A commit message is required for squash merges.".into());
    }
    None
}
