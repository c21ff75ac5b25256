use parking_lot::Mutex;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadPhase {
    Idle,
    Running { replay_pending: bool },
}

#[derive(Debug)]
struct SchedulerState {
    phase: ReloadPhase,
    passes_started: u64,
}

/// Two-state scheduler for a re-entrant async job.
///
/// A request that arrives while the job runs only marks a replay; the running
/// caller performs exactly one more pass once it finishes. Requests never
/// queue beyond that single replay. Folded-in callers can wait for the pass
/// that covers their request.
#[derive(Debug)]
pub struct ReloadScheduler {
    state: Mutex<SchedulerState>,
    passes_completed: watch::Sender<u64>,
}

/// Outcome of [`ReloadScheduler::begin`].
pub enum ReloadTicket<'a> {
    Owner(ReloadPass<'a>),
    Follower(ReloadWaiter),
}

/// Ownership of the run loop. Dropping it before the last pass finishes
/// returns the scheduler to idle and releases every waiter.
pub struct ReloadPass<'a> {
    scheduler: &'a ReloadScheduler,
    finished: bool,
}

pub struct ReloadWaiter {
    target: u64,
    passes_completed: watch::Receiver<u64>,
}

impl Default for ReloadScheduler {
    fn default() -> Self {
        let (passes_completed, _) = watch::channel(0);
        Self {
            state: Mutex::new(SchedulerState {
                phase: ReloadPhase::Idle,
                passes_started: 0,
            }),
            passes_completed,
        }
    }
}

impl ReloadScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the run loop when idle; otherwise folds the request into the
    /// replay pass and hands back a waiter for it.
    pub fn begin(&self) -> ReloadTicket<'_> {
        let mut state = self.state.lock();
        match state.phase {
            ReloadPhase::Idle => {
                state.phase = ReloadPhase::Running {
                    replay_pending: false,
                };
                state.passes_started += 1;
                ReloadTicket::Owner(ReloadPass {
                    scheduler: self,
                    finished: false,
                })
            }
            ReloadPhase::Running { .. } => {
                state.phase = ReloadPhase::Running {
                    replay_pending: true,
                };
                ReloadTicket::Follower(ReloadWaiter {
                    target: state.passes_started + 1,
                    passes_completed: self.passes_completed.subscribe(),
                })
            }
        }
    }

    pub fn phase(&self) -> ReloadPhase {
        self.state.lock().phase
    }

    fn complete_pass(&self) -> bool {
        let mut state = self.state.lock();
        self.passes_completed.send_replace(state.passes_started);
        match state.phase {
            ReloadPhase::Running {
                replay_pending: true,
            } => {
                state.phase = ReloadPhase::Running {
                    replay_pending: false,
                };
                state.passes_started += 1;
                true
            }
            _ => {
                state.phase = ReloadPhase::Idle;
                false
            }
        }
    }

    fn abandon(&self) {
        let mut state = self.state.lock();
        state.phase = ReloadPhase::Idle;
        // Nothing will run the pending replay, so nobody may keep waiting on it.
        state.passes_started += 1;
        self.passes_completed.send_replace(state.passes_started);
    }
}

impl ReloadPass<'_> {
    /// Called by the owner after each pass. Returns `true` if another pass is
    /// required.
    pub fn finish_pass(&mut self) -> bool {
        let again = self.scheduler.complete_pass();
        if !again {
            self.finished = true;
        }
        again
    }
}

impl Drop for ReloadPass<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.scheduler.abandon();
        }
    }
}

impl ReloadWaiter {
    /// Resolves once the pass covering this request has completed.
    pub async fn finished(mut self) {
        let target = self.target;
        let _ = self
            .passes_completed
            .wait_for(|completed| *completed >= target)
            .await;
    }
}
