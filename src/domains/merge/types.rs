use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    Squash,
    Reapply,
}

impl MergeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMode::Squash => "squash",
            MergeMode::Reapply => "reapply",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergePreview {
    pub session_branch: String,
    pub parent_branch: String,
    #[serde(default)]
    pub squash_commands: Vec<String>,
    #[serde(default)]
    pub reapply_commands: Vec<String>,
    pub default_commit_message: String,
    pub has_conflicts: bool,
    #[serde(default)]
    pub conflicting_paths: Vec<String>,
    pub is_up_to_date: bool,
}

/// Merge fields as they appear on a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStateSnapshot {
    pub merge_has_conflicts: Option<bool>,
    pub merge_conflicting_paths: Option<Vec<String>>,
    pub merge_is_up_to_date: Option<bool>,
}

impl MergeStateSnapshot {
    pub fn from_preview(preview: Option<&MergePreview>) -> Self {
        match preview {
            Some(preview) => Self {
                merge_has_conflicts: Some(preview.has_conflicts),
                merge_conflicting_paths: if preview.conflicting_paths.is_empty() {
                    None
                } else {
                    Some(preview.conflicting_paths.clone())
                },
                merge_is_up_to_date: Some(preview.is_up_to_date),
            },
            None => Self::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MergeStatus {
    #[default]
    Idle,
    Merged,
    Conflict,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MergeDialogStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Running,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct MergeDialogState {
    pub status: MergeDialogStatus,
    pub session_id: Option<String>,
    pub preview: Option<MergePreview>,
    pub error: Option<String>,
}

impl MergeDialogState {
    pub fn is_open(&self) -> bool {
        self.status != MergeDialogStatus::Idle
    }

    pub fn targets(&self, session_id: &str) -> bool {
        self.is_open() && self.session_id.as_deref() == Some(session_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastTone {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub tone: ToastTone,
    pub title: String,
    pub description: Option<String>,
}
