use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

use super::backend::{AgentLauncher, SessionsBackend};
use super::entity::{
    DiffStats, EnrichedSession, SessionInfo, SessionState, SessionStatusType, SessionStatusUpdate,
};
use super::reconcile::{
    backfill_merge_fields, merge_fields_changed, merge_spec_sessions, retained_after_refresh,
    reuse_if_equal, same_list,
};
use crate::domains::merge::status::derive_merge_status;
use crate::domains::merge::types::{MergePreview, MergeStatus};
use crate::errors::SchaltError;
use crate::infrastructure::events::{
    SchaltEvent, SessionActivityUpdated, SessionAddedPayload, SessionGitStatsUpdated,
};
use crate::shared::coalesce::{ReloadScheduler, ReloadTicket};
use crate::shared::terminal_id::{session_terminals, terminal_id_for_session_top};

pub type SessionList = Vec<Arc<EnrichedSession>>;
pub type MergeStatuses = HashMap<String, MergeStatus>;

/// Local mirror of every session known to the backend.
///
/// The list is published through a watch channel; entries are immutable
/// `Arc`s and an entry that did not change keeps its allocation across
/// updates. Optimistic edits are provisional and are overwritten by the next
/// authoritative snapshot.
pub struct SessionRegistry {
    backend: Arc<dyn SessionsBackend>,
    launcher: Arc<dyn AgentLauncher>,
    sessions: watch::Sender<SessionList>,
    merge_statuses: watch::Sender<MergeStatuses>,
    merge_status_overrides: Mutex<HashMap<String, MergeStatus>>,
    previews: DashMap<String, MergePreview>,
    cancelling: Mutex<HashSet<String>>,
    auto_started: Mutex<HashSet<String>>,
    provisional_specs: Mutex<HashSet<String>>,
    last_error: RwLock<Option<String>>,
    reload: ReloadScheduler,
}

impl SessionRegistry {
    pub fn new(backend: Arc<dyn SessionsBackend>, launcher: Arc<dyn AgentLauncher>) -> Self {
        let (sessions, _) = watch::channel(SessionList::new());
        let (merge_statuses, _) = watch::channel(MergeStatuses::new());
        Self {
            backend,
            launcher,
            sessions,
            merge_statuses,
            merge_status_overrides: Mutex::new(HashMap::new()),
            previews: DashMap::new(),
            cancelling: Mutex::new(HashSet::new()),
            auto_started: Mutex::new(HashSet::new()),
            provisional_specs: Mutex::new(HashSet::new()),
            last_error: RwLock::new(None),
            reload: ReloadScheduler::new(),
        }
    }

    pub fn sessions(&self) -> SessionList {
        self.sessions.borrow().clone()
    }

    pub fn session(&self, session_id: &str) -> Option<Arc<EnrichedSession>> {
        self.sessions
            .borrow()
            .iter()
            .find(|s| s.id() == session_id)
            .cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionList> {
        self.sessions.subscribe()
    }

    pub fn subscribe_merge_statuses(&self) -> watch::Receiver<MergeStatuses> {
        self.merge_statuses.subscribe()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    pub fn is_cancelling(&self, session_id: &str) -> bool {
        self.cancelling.lock().contains(session_id)
    }

    pub fn merge_status(&self, session_id: &str) -> MergeStatus {
        self.merge_statuses
            .borrow()
            .get(session_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn merge_preview(&self, session_id: &str) -> Option<MergePreview> {
        self.previews.get(session_id).map(|p| p.value().clone())
    }

    pub fn record_merge_preview(&self, session_id: &str, preview: MergePreview) {
        self.previews.insert(session_id.to_string(), preview);
        self.recompute_merge_statuses();
    }

    pub fn invalidate_merge_preview(&self, session_id: &str) {
        if self.previews.remove(session_id).is_some() {
            self.recompute_merge_statuses();
        }
    }

    /// Pins a merge status until the session's authoritative merge fields
    /// change or the session goes away.
    pub fn set_merge_status(&self, session_id: &str, status: MergeStatus) {
        self.merge_status_overrides
            .lock()
            .insert(session_id.to_string(), status);
        self.recompute_merge_statuses();
    }

    /// Full resync with the backend. A call that arrives while a reload runs
    /// schedules one replay and resolves once that replay has finished.
    pub async fn reload_sessions(&self) {
        let mut pass = match self.reload.begin() {
            ReloadTicket::Owner(pass) => pass,
            ReloadTicket::Follower(waiter) => {
                debug!("Session reload already running, waiting for replay");
                waiter.finished().await;
                return;
            }
        };
        loop {
            self.reload_once().await;
            if !pass.finish_pass() {
                break;
            }
            debug!("Replaying session reload requested during previous pass");
        }
    }

    async fn reload_once(&self) {
        let enriched = match self.backend.list_enriched_sessions().await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!("Failed to load sessions: {e}");
                *self.last_error.write() = Some(e.to_string());
                return;
            }
        };

        let has_specs = enriched.iter().any(|s| s.state() == SessionState::Spec);
        let sessions = if has_specs {
            enriched
        } else {
            match self.backend.list_sessions_by_state(SessionState::Spec).await {
                Ok(specs) => {
                    let specs = specs.into_iter().map(EnrichedSession::from).collect();
                    merge_spec_sessions(enriched, specs)
                }
                Err(e) => {
                    warn!("Failed to load spec sessions, continuing without them: {e}");
                    enriched
                }
            }
        };

        *self.last_error.write() = None;
        debug!("Reloaded {} sessions", sessions.len());
        let started = self.install_authoritative(sessions, Vec::new());
        self.auto_start_all(started).await;
    }

    pub async fn update_session_status(
        &self,
        session_id: &str,
        status: SessionStatusUpdate,
    ) -> Result<(), SchaltError> {
        match status {
            SessionStatusUpdate::Spec => self.backend.convert_session_to_spec(session_id).await?,
            SessionStatusUpdate::Reviewed => self.backend.mark_session_ready(session_id).await?,
            SessionStatusUpdate::Running => self.backend.unmark_session_ready(session_id).await?,
        }
        info!("Updated session '{session_id}' to {status:?}");
        self.reload_sessions().await;
        Ok(())
    }

    pub async fn create_draft(&self, name: &str, content: &str) -> Result<(), SchaltError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SchaltError::invalid_input("name", "Session name cannot be empty"));
        }
        self.backend.create_spec_session(name, content).await?;
        info!("Created spec session '{name}'");
        self.reload_sessions().await;
        Ok(())
    }

    pub async fn start_spec(&self, session_id: &str) -> Result<(), SchaltError> {
        let known_state = self.session(session_id).map(|s| s.state());
        if let Some(state) = known_state.filter(|state| *state != SessionState::Spec) {
            return Err(SchaltError::InvalidSessionState {
                session_id: session_id.to_string(),
                current_state: state.as_str().to_string(),
                expected_state: SessionState::Spec.as_str().to_string(),
            });
        }
        self.backend.start_spec_session(session_id).await?;
        info!("Started spec session '{session_id}'");
        self.reload_sessions().await;
        Ok(())
    }

    /// Asks the backend to cancel the session. The session stays listed until
    /// the backend reports its removal.
    pub async fn cancel_session(&self, session_id: &str) -> Result<(), SchaltError> {
        self.cancelling.lock().insert(session_id.to_string());
        if let Err(e) = self.backend.cancel_session(session_id).await {
            self.cancelling.lock().remove(session_id);
            return Err(e);
        }
        info!("Cancellation requested for session '{session_id}'");
        Ok(())
    }

    /// Local-only conversion back to a spec, applied before the backend
    /// confirms. Returns `false` for an unknown session.
    pub fn optimistically_convert_session_to_spec(&self, session_id: &str) -> bool {
        self.previews.remove(session_id);
        self.merge_status_overrides.lock().remove(session_id);
        let known = self.session(session_id).is_some();
        if known {
            self.provisional_specs.lock().insert(session_id.to_string());
        }
        self.update_session(session_id, |existing| {
            let mut next = existing.clone();
            let info = &mut next.info;
            info.session_state = SessionState::Spec;
            info.status = SessionStatusType::Spec;
            info.ready_to_merge = false;
            info.has_uncommitted_changes = None;
            info.diff_stats = None;
            info.merge_has_conflicts = None;
            info.merge_is_up_to_date = None;
            info.merge_conflicting_paths = None;
            next
        });
        known
    }

    pub async fn handle_event(&self, event: &SchaltEvent) {
        match event {
            SchaltEvent::SessionsRefreshed(sessions) => {
                if sessions.is_empty() {
                    debug!("Empty SessionsRefreshed payload, reloading");
                    self.reload_sessions().await;
                    return;
                }
                let retained = retained_after_refresh(&self.sessions.borrow(), sessions);
                let started = self.install_authoritative(sessions.clone(), retained);
                self.auto_start_all(started).await;
            }
            SchaltEvent::SessionAdded(payload) => self.insert_added_session(payload),
            SchaltEvent::SessionRemoved(payload) => self.remove_session(&payload.session_name),
            SchaltEvent::SessionCancelling(payload) => {
                self.cancelling.lock().insert(payload.session_name.clone());
            }
            SchaltEvent::SessionActivity(payload) => self.apply_activity(payload),
            SchaltEvent::SessionGitStats(payload) => self.apply_git_stats(payload),
            SchaltEvent::GitOperationStarted(_)
            | SchaltEvent::GitOperationCompleted(_)
            | SchaltEvent::GitOperationFailed(_) => {}
        }
    }

    /// Installs an authoritative snapshot followed by `retained` entries that
    /// the snapshot does not cover. Returns the sessions that just moved into
    /// the running state.
    fn install_authoritative(
        &self,
        incoming: Vec<EnrichedSession>,
        retained: SessionList,
    ) -> Vec<String> {
        let mut started = Vec::new();
        let mut merge_fields_moved = Vec::new();

        self.sessions.send_if_modified(|current| {
            let previous_by_id: HashMap<&str, &Arc<EnrichedSession>> =
                current.iter().map(|s| (s.id(), s)).collect();
            let mut seen = HashSet::new();
            let mut next = SessionList::with_capacity(incoming.len() + retained.len());

            for session in incoming {
                if !seen.insert(session.id().to_string()) {
                    continue;
                }
                let previous = previous_by_id.get(session.id()).copied();
                let session = {
                    let preview = self.previews.get(session.id());
                    backfill_merge_fields(
                        session,
                        previous.map(|p| &**p),
                        preview.as_deref(),
                    )
                };
                let was_provisional = self.provisional_specs.lock().remove(session.id());
                if let Some(previous) = previous {
                    if previous.state() == SessionState::Running
                        && session.state() != SessionState::Running
                    {
                        self.clear_auto_start_marker(session.id());
                    }
                    if previous.state() != SessionState::Running
                        && session.state() == SessionState::Running
                        && !was_provisional
                    {
                        started.push(session.id().to_string());
                    }
                    if merge_fields_changed(previous, &session) {
                        merge_fields_moved.push(session.id().to_string());
                    }
                }
                next.push(reuse_if_equal(previous, session));
            }
            for session in retained {
                if seen.insert(session.id().to_string()) {
                    next.push(session);
                }
            }

            if same_list(current, &next) {
                return false;
            }
            *current = next;
            true
        });

        if !merge_fields_moved.is_empty() {
            let mut overrides = self.merge_status_overrides.lock();
            for id in &merge_fields_moved {
                overrides.remove(id);
            }
        }
        self.recompute_merge_statuses();
        started
    }

    /// Applies `update` to one session, publishing only when the result
    /// differs from the current entry.
    fn update_session<F>(&self, session_id: &str, update: F) -> bool
    where
        F: FnOnce(&EnrichedSession) -> EnrichedSession,
    {
        let mut merge_fields_moved = false;
        let changed = self.sessions.send_if_modified(|current| {
            let Some(index) = current.iter().position(|s| s.id() == session_id) else {
                return false;
            };
            let next = update(&current[index]);
            if *current[index] == next {
                return false;
            }
            if current[index].state() == SessionState::Running
                && next.state() != SessionState::Running
            {
                self.clear_auto_start_marker(session_id);
            }
            merge_fields_moved = merge_fields_changed(&current[index], &next);
            current[index] = Arc::new(next);
            true
        });
        if merge_fields_moved {
            self.merge_status_overrides.lock().remove(session_id);
        }
        if changed {
            self.recompute_merge_statuses();
        }
        changed
    }

    fn insert_added_session(&self, payload: &SessionAddedPayload) {
        let name = payload.session_name.as_str();
        let session = EnrichedSession {
            info: SessionInfo {
                session_id: name.to_string(),
                display_name: payload.display_name.clone(),
                branch: payload.branch.clone(),
                worktree_path: payload.worktree_path.clone(),
                base_branch: payload.parent_branch.clone(),
                status: SessionStatusType::Active,
                session_state: SessionState::Running,
                created_at: Some(payload.created_at),
                last_modified: payload.last_modified.or(Some(payload.created_at)),
                has_uncommitted_changes: Some(false),
                diff_stats: None,
                ready_to_merge: false,
                spec_content: None,
                original_agent_type: None,
                merge_has_conflicts: None,
                merge_is_up_to_date: None,
                merge_conflicting_paths: None,
            },
            terminals: session_terminals(name),
        };
        let inserted = self.sessions.send_if_modified(|current| {
            if current.iter().any(|s| s.id() == name) {
                return false;
            }
            current.push(Arc::new(session));
            true
        });
        if inserted {
            info!("Session '{name}' added");
            self.recompute_merge_statuses();
        }
    }

    fn remove_session(&self, session_id: &str) {
        let removed = self.sessions.send_if_modified(|current| {
            let before = current.len();
            current.retain(|s| s.id() != session_id);
            current.len() != before
        });
        self.previews.remove(session_id);
        self.merge_status_overrides.lock().remove(session_id);
        self.cancelling.lock().remove(session_id);
        self.provisional_specs.lock().remove(session_id);
        self.clear_auto_start_marker(session_id);
        if removed {
            info!("Session '{session_id}' removed");
        }
        self.recompute_merge_statuses();
    }

    fn apply_activity(&self, payload: &SessionActivityUpdated) {
        self.update_session(&payload.session_name, |existing| {
            let mut next = existing.clone();
            next.info.last_modified = Some(payload.last_activity);
            next
        });
    }

    fn apply_git_stats(&self, payload: &SessionGitStatsUpdated) {
        self.update_session(&payload.session_name, |existing| {
            let mut next = existing.clone();
            if next.state() == SessionState::Spec {
                return next;
            }
            let info = &mut next.info;
            info.diff_stats = Some(DiffStats {
                files_changed: payload.files_changed as usize,
                additions: payload.lines_added as usize,
                deletions: payload.lines_removed as usize,
                insertions: payload.lines_added as usize,
            });
            info.has_uncommitted_changes = Some(payload.has_uncommitted);
            if matches!(
                info.status,
                SessionStatusType::Active | SessionStatusType::Dirty
            ) {
                info.status = if payload.has_uncommitted {
                    SessionStatusType::Dirty
                } else {
                    SessionStatusType::Active
                };
            }
            if payload.merge_has_conflicts.is_some() {
                info.merge_has_conflicts = payload.merge_has_conflicts;
                info.merge_conflicting_paths = payload.merge_conflicting_paths.clone();
            }
            if payload.merge_is_up_to_date.is_some() {
                info.merge_is_up_to_date = payload.merge_is_up_to_date;
            }
            next
        });
    }

    fn recompute_merge_statuses(&self) {
        let statuses: MergeStatuses = {
            let sessions = self.sessions.borrow();
            let overrides = self.merge_status_overrides.lock();
            sessions
                .iter()
                .map(|session| {
                    let id = session.id();
                    let status = match overrides.get(id) {
                        Some(status) => *status,
                        None => {
                            let preview = self.previews.get(id);
                            derive_merge_status(&session.info, preview.as_deref())
                        }
                    };
                    (id.to_string(), status)
                })
                .collect()
        };
        self.merge_statuses.send_if_modified(|current| {
            if *current == statuses {
                return false;
            }
            *current = statuses;
            true
        });
    }

    /// Lets the next transition into the running state start the agent again.
    fn clear_auto_start_marker(&self, session_id: &str) {
        self.auto_started
            .lock()
            .remove(&terminal_id_for_session_top(session_id));
    }

    async fn auto_start_all(&self, session_ids: Vec<String>) {
        for session_id in session_ids {
            self.auto_start(&session_id).await;
        }
    }

    /// Starts the agent in the session's top terminal at most once per
    /// transition into the running state.
    async fn auto_start(&self, session_id: &str) {
        let terminal_id = terminal_id_for_session_top(session_id);
        if !self.auto_started.lock().insert(terminal_id.clone()) {
            debug!("Agent for '{session_id}' already started in {terminal_id}");
            return;
        }
        info!("Auto-starting agent for session '{session_id}' in {terminal_id}");
        if let Err(e) = self
            .launcher
            .start_session_agent(session_id, &terminal_id)
            .await
        {
            warn!("Failed to auto-start agent for '{session_id}': {e}");
            self.auto_started.lock().remove(&terminal_id);
        }
    }
}
