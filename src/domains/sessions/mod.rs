pub mod backend;
pub mod entity;
pub mod reconcile;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_support;

pub use backend::{AgentLauncher, SessionsBackend};
pub use entity::{EnrichedSession, Session, SessionInfo, SessionState, SessionStatusUpdate};
pub use registry::{MergeStatuses, SessionList, SessionRegistry};
