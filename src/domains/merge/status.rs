use super::types::{MergePreview, MergeStatus};
use crate::domains::sessions::entity::{SessionInfo, SessionState};

/// Conflicts win over everything, then an up-to-date branch, then a reviewed
/// session with nothing left to merge. Session fields take precedence over a
/// cached preview.
pub fn derive_merge_status(info: &SessionInfo, preview: Option<&MergePreview>) -> MergeStatus {
    if info.session_state == SessionState::Spec {
        return MergeStatus::Idle;
    }

    let has_conflicts = info
        .merge_has_conflicts
        .or_else(|| preview.map(|p| p.has_conflicts))
        .unwrap_or(false);
    if has_conflicts {
        return MergeStatus::Conflict;
    }

    let is_up_to_date = info
        .merge_is_up_to_date
        .or_else(|| preview.map(|p| p.is_up_to_date))
        .unwrap_or(false);
    if is_up_to_date {
        return MergeStatus::Merged;
    }

    if is_zero_diff(info) {
        return MergeStatus::Merged;
    }

    MergeStatus::Idle
}

fn is_zero_diff(info: &SessionInfo) -> bool {
    let reviewed = info.ready_to_merge || info.session_state == SessionState::Reviewed;
    let clean = info.has_uncommitted_changes != Some(true);
    let empty_diff = info.diff_stats.is_some_and(|stats| stats.is_empty());
    reviewed && clean && empty_diff
}
