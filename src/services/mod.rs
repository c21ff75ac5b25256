use std::sync::Arc;

use log::{debug, info};
use tokio::task::JoinHandle;

use crate::domains::history::{GitHistoryBackend, HistoryCacheStore};
use crate::domains::merge::{MergeBackend, MergeOrchestrator, ToastSink};
use crate::domains::sessions::{AgentLauncher, SessionRegistry, SessionsBackend};
use crate::domains::settings::SettingsStore;
use crate::infrastructure::events::{
    EventBus, EventFilter, EventSubscription, SchaltEvent, SchaltEventKind,
};

/// Remote collaborators the stores are built on.
pub struct SyncBackends {
    pub history: Arc<dyn GitHistoryBackend>,
    pub sessions: Arc<dyn SessionsBackend>,
    pub launcher: Arc<dyn AgentLauncher>,
    pub merge: Arc<dyn MergeBackend>,
    pub toasts: Arc<dyn ToastSink>,
}

pub struct ServiceHandles {
    pub history: Arc<HistoryCacheStore>,
    pub sessions: Arc<SessionRegistry>,
    pub merge: Arc<MergeOrchestrator>,
    pub settings: Arc<SettingsStore>,
    pub events: Arc<EventBus>,
}

impl ServiceHandles {
    pub fn new(backends: SyncBackends, settings: Arc<SettingsStore>) -> Self {
        let history = Arc::new(HistoryCacheStore::new(backends.history, settings.history()));
        let sessions = Arc::new(SessionRegistry::new(backends.sessions, backends.launcher));
        let merge = Arc::new(MergeOrchestrator::new(
            Arc::clone(&sessions),
            backends.merge,
            backends.toasts,
            Arc::clone(&settings),
        ));

        Self {
            history,
            sessions,
            merge,
            settings,
            events: Arc::new(EventBus::new()),
        }
    }

    /// Subscribes every store to the bus and applies its events in delivery
    /// order on a dedicated task. Tasks end once the bus is dropped.
    pub fn start_event_pumps(&self) -> Vec<JoinHandle<()>> {
        let history = Arc::clone(&self.history);
        let history_events = self
            .events
            .subscribe(EventFilter::kinds([SchaltEventKind::GitOperationCompleted]));

        let sessions = Arc::clone(&self.sessions);
        let session_events = self.events.subscribe(EventFilter::kinds([
            SchaltEventKind::SessionsRefreshed,
            SchaltEventKind::SessionAdded,
            SchaltEventKind::SessionRemoved,
            SchaltEventKind::SessionCancelling,
            SchaltEventKind::SessionActivity,
            SchaltEventKind::SessionGitStats,
        ]));

        let merge = Arc::clone(&self.merge);
        let merge_events = self.events.subscribe(EventFilter::kinds([
            SchaltEventKind::GitOperationStarted,
            SchaltEventKind::GitOperationCompleted,
            SchaltEventKind::GitOperationFailed,
        ]));

        info!("Starting event pumps");
        vec![
            tokio::spawn(pump("history", history_events, move |event| {
                let history = Arc::clone(&history);
                async move { history.handle_event(&event).await; }
            })),
            tokio::spawn(pump("sessions", session_events, move |event| {
                let sessions = Arc::clone(&sessions);
                async move { sessions.handle_event(&event).await; }
            })),
            tokio::spawn(pump("merge", merge_events, move |event| {
                let merge = Arc::clone(&merge);
                async move { merge.handle_event(&event); }
            })),
        ]
    }
}

async fn pump<F, Fut>(name: &'static str, mut subscription: EventSubscription, mut handler: F)
where
    F: FnMut(SchaltEvent) -> Fut,
    Fut: Future<Output = ()>,
{
    while let Some(event) = subscription.recv().await {
        debug!("[{name}] applying {}", event.as_str());
        handler(event).await;
    }
    debug!("[{name}] event pump stopped");
}
