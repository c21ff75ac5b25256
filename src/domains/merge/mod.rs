pub mod backend;
pub mod orchestrator;
pub mod status;
pub mod types;

pub use backend::{MergeBackend, ToastSink};
pub use orchestrator::MergeOrchestrator;
pub use status::derive_merge_status;
pub use types::{
    MergeDialogState, MergeDialogStatus, MergeMode, MergePreview, MergeStatus, Toast, ToastTone,
};
