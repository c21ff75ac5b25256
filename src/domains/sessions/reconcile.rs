use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::entity::{EnrichedSession, SessionState};
use crate::domains::merge::types::{MergePreview, MergeStateSnapshot};

/// Folds worktree-less spec sessions into the enriched listing.
///
/// A spec entry is kept unless the enriched listing reports a non-spec state
/// for the same id, which means the spec has since been started.
pub fn merge_spec_sessions(
    enriched: Vec<EnrichedSession>,
    specs: Vec<EnrichedSession>,
) -> Vec<EnrichedSession> {
    let mut spec_by_id: HashMap<String, EnrichedSession> = specs
        .into_iter()
        .map(|session| (session.info.session_id.clone(), session))
        .collect();
    let mut spec_order: Vec<String> = spec_by_id.keys().cloned().collect();
    spec_order.sort();

    let mut merged = Vec::with_capacity(enriched.len() + spec_by_id.len());
    for session in enriched {
        match spec_by_id.remove(session.id()) {
            Some(spec) if session.state() == SessionState::Spec => merged.push(spec),
            _ => merged.push(session),
        }
    }
    for id in spec_order {
        if let Some(spec) = spec_by_id.remove(&id) {
            merged.push(spec);
        }
    }
    merged
}

/// Fills missing merge fields from the previous copy of the session, then from
/// a cached merge preview. Returns the session untouched when nothing changes.
pub fn backfill_merge_fields(
    mut session: EnrichedSession,
    previous: Option<&EnrichedSession>,
    preview: Option<&MergePreview>,
) -> EnrichedSession {
    if session.state() == SessionState::Spec {
        return session;
    }

    let cached = MergeStateSnapshot::from_preview(preview);
    let info = &session.info;

    let has_conflicts = info
        .merge_has_conflicts
        .or_else(|| previous.and_then(|p| p.info.merge_has_conflicts))
        .or(cached.merge_has_conflicts);
    let is_up_to_date = info
        .merge_is_up_to_date
        .or_else(|| previous.and_then(|p| p.info.merge_is_up_to_date))
        .or(cached.merge_is_up_to_date);
    let conflicting_paths = info
        .merge_conflicting_paths
        .clone()
        .or_else(|| previous.and_then(|p| p.info.merge_conflicting_paths.clone()))
        .or(cached.merge_conflicting_paths);

    let changed = has_conflicts != info.merge_has_conflicts
        || is_up_to_date != info.merge_is_up_to_date
        || conflicting_paths != info.merge_conflicting_paths;
    if changed {
        session.info.merge_has_conflicts = has_conflicts;
        session.info.merge_is_up_to_date = is_up_to_date;
        session.info.merge_conflicting_paths = conflicting_paths;
    }
    session
}

/// Keeps the existing allocation when the incoming session is field-equal.
pub fn reuse_if_equal(
    previous: Option<&Arc<EnrichedSession>>,
    next: EnrichedSession,
) -> Arc<EnrichedSession> {
    match previous {
        Some(existing) if **existing == next => Arc::clone(existing),
        _ => Arc::new(next),
    }
}

pub fn same_list(a: &[Arc<EnrichedSession>], b: &[Arc<EnrichedSession>]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y))
}

/// Which previously known sessions survive a `SessionsRefreshed` payload that
/// does not mention them.
///
/// The enriched listing always covers worktree-backed sessions, so such a
/// payload is a full snapshot for them. Spec sessions come from a separate
/// query; a payload without any spec session says nothing about them and
/// must not delete them.
pub fn retained_after_refresh(
    previous: &[Arc<EnrichedSession>],
    incoming: &[EnrichedSession],
) -> Vec<Arc<EnrichedSession>> {
    let incoming_ids: HashSet<&str> = incoming.iter().map(EnrichedSession::id).collect();
    let covers_specs = incoming.iter().any(|s| s.state() == SessionState::Spec);
    if covers_specs {
        return Vec::new();
    }
    previous
        .iter()
        .filter(|s| !incoming_ids.contains(s.id()) && s.state() == SessionState::Spec)
        .cloned()
        .collect()
}

/// Whether the authoritative merge fields differ between two copies.
pub fn merge_fields_changed(previous: &EnrichedSession, next: &EnrichedSession) -> bool {
    previous.info.merge_has_conflicts != next.info.merge_has_conflicts
        || previous.info.merge_is_up_to_date != next.info.merge_is_up_to_date
}
