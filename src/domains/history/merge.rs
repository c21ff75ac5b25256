use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, info};

use super::types::{FetchMode, HistoryItem, HistoryProviderSnapshot, HistorySnapshot};

#[derive(Debug, Clone)]
pub struct MergedHistory {
    pub snapshot: Arc<HistorySnapshot>,
    /// Head to send as `since_head` on the next refresh.
    pub resolved_head: Option<String>,
    pub diverged: bool,
}

/// Fold a backend response into the cached snapshot for one repository.
///
/// `fallback_head` is the head known before this response (the entry's
/// `latest_head`); `requested_cursor` is the cursor an append fetch was issued
/// with.
pub fn merge_history(
    previous: Option<&Arc<HistorySnapshot>>,
    fallback_head: Option<&str>,
    response: HistoryProviderSnapshot,
    mode: FetchMode,
    requested_cursor: Option<&str>,
    max_items: usize,
) -> MergedHistory {
    if let Some(previous) = previous {
        if response.unchanged {
            let resolved_head = response
                .head_commit
                .or_else(|| previous.head_commit.clone())
                .or_else(|| fallback_head.map(str::to_string));
            return MergedHistory {
                snapshot: Arc::clone(previous),
                resolved_head,
                diverged: false,
            };
        }

        match mode {
            FetchMode::Append => {
                return append_page(previous, response, requested_cursor);
            }
            FetchMode::Refresh if !previous.items.is_empty() => {
                return refresh_snapshot(previous, response, fallback_head, max_items);
            }
            _ => {}
        }
    }

    install(response, fallback_head, false)
}

fn append_page(
    previous: &Arc<HistorySnapshot>,
    response: HistoryProviderSnapshot,
    requested_cursor: Option<&str>,
) -> MergedHistory {
    let mut seen: HashSet<String> = previous
        .items
        .iter()
        .map(|item| item.key().to_string())
        .collect();
    let novel: Vec<HistoryItem> = response
        .items
        .into_iter()
        .filter(|item| seen.insert(item.key().to_string()))
        .collect();

    let (next_cursor, has_more) = if novel.is_empty() && requested_cursor.is_some() {
        debug!("Append page contained no new commits; treating pagination as exhausted");
        (None, false)
    } else {
        (response.next_cursor, response.has_more)
    };

    let mut items = previous.items.clone();
    items.extend(novel);

    let head_commit = previous.head_commit.clone().or(response.head_commit);
    let snapshot = HistorySnapshot {
        items,
        current_ref: response.current_ref.or_else(|| previous.current_ref.clone()),
        current_remote_ref: response
            .current_remote_ref
            .or_else(|| previous.current_remote_ref.clone()),
        current_base_ref: response
            .current_base_ref
            .or_else(|| previous.current_base_ref.clone()),
        next_cursor,
        has_more,
        head_commit: head_commit.clone(),
    };

    MergedHistory {
        snapshot: reuse_if_equal(previous, snapshot),
        resolved_head: head_commit,
        diverged: false,
    }
}

fn refresh_snapshot(
    previous: &Arc<HistorySnapshot>,
    response: HistoryProviderSnapshot,
    fallback_head: Option<&str>,
    max_items: usize,
) -> MergedHistory {
    let incoming_keys: HashSet<&str> = response.items.iter().map(HistoryItem::key).collect();
    let previous_first = previous.items.first().map(HistoryItem::key);
    let anchored = previous_first.is_some_and(|key| incoming_keys.contains(key));

    if !anchored {
        info!(
            "History diverged (previous head {:?} missing from refresh); resetting cache",
            previous.head_commit
        );
        return install(response, fallback_head, true);
    }

    let mut seen: HashSet<String> = HashSet::with_capacity(response.items.len());
    let mut items: Vec<HistoryItem> =
        Vec::with_capacity(response.items.len() + previous.items.len());
    for item in response.items {
        if seen.insert(item.key().to_string()) {
            items.push(item);
        }
    }

    let mut retained_older = false;
    for item in &previous.items {
        if seen.insert(item.key().to_string()) {
            retained_older = true;
            items.push(item.clone());
        }
    }

    let trimmed = items.len() > max_items;
    if trimmed {
        debug!(
            "Trimming refreshed history from {} to {max_items} items",
            items.len()
        );
        items.truncate(max_items);
    }

    let (next_cursor, has_more) = if retained_older || trimmed {
        (
            previous.next_cursor.clone().or(response.next_cursor),
            true,
        )
    } else {
        (response.next_cursor, response.has_more)
    };

    let head_commit = response
        .head_commit
        .or_else(|| items.first().map(|item| item.key().to_string()))
        .or_else(|| previous.head_commit.clone());

    let snapshot = HistorySnapshot {
        items,
        current_ref: response.current_ref.or_else(|| previous.current_ref.clone()),
        current_remote_ref: response
            .current_remote_ref
            .or_else(|| previous.current_remote_ref.clone()),
        current_base_ref: response
            .current_base_ref
            .or_else(|| previous.current_base_ref.clone()),
        next_cursor,
        has_more,
        head_commit: head_commit.clone(),
    };

    MergedHistory {
        snapshot: reuse_if_equal(previous, snapshot),
        resolved_head: head_commit,
        diverged: false,
    }
}

fn install(
    response: HistoryProviderSnapshot,
    fallback_head: Option<&str>,
    diverged: bool,
) -> MergedHistory {
    let mut seen = HashSet::with_capacity(response.items.len());
    let items: Vec<HistoryItem> = response
        .items
        .into_iter()
        .filter(|item| seen.insert(item.key().to_string()))
        .collect();

    let head_commit = response
        .head_commit
        .or_else(|| items.first().map(|item| item.key().to_string()))
        .or_else(|| fallback_head.map(str::to_string));

    let snapshot = HistorySnapshot {
        items,
        current_ref: response.current_ref,
        current_remote_ref: response.current_remote_ref,
        current_base_ref: response.current_base_ref,
        next_cursor: response.next_cursor,
        has_more: response.has_more,
        head_commit: head_commit.clone(),
    };

    MergedHistory {
        snapshot: Arc::new(snapshot),
        resolved_head: head_commit,
        diverged,
    }
}

fn reuse_if_equal(previous: &Arc<HistorySnapshot>, next: HistorySnapshot) -> Arc<HistorySnapshot> {
    if **previous == next {
        Arc::clone(previous)
    } else {
        Arc::new(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::history::types::MAX_CACHED_ITEMS;

    fn item(hash: &str) -> HistoryItem {
        HistoryItem {
            id: hash[..hash.len().min(7)].to_string(),
            full_hash: Some(hash.to_string()),
            parent_ids: vec![],
            subject: format!("commit {hash}"),
            author: "Tester".into(),
            timestamp: 0,
            references: vec![],
        }
    }

    fn page(hashes: &[&str], cursor: Option<&str>, has_more: bool) -> HistoryProviderSnapshot {
        HistoryProviderSnapshot {
            items: hashes.iter().map(|h| item(h)).collect(),
            current_ref: Some("main".into()),
            next_cursor: cursor.map(str::to_string),
            has_more,
            head_commit: hashes.first().map(|h| h.to_string()),
            ..Default::default()
        }
    }

    fn keys(snapshot: &HistorySnapshot) -> Vec<&str> {
        snapshot.items.iter().map(HistoryItem::key).collect()
    }

    fn initial(hashes: &[&str], cursor: Option<&str>, has_more: bool) -> Arc<HistorySnapshot> {
        merge_history(
            None,
            None,
            page(hashes, cursor, has_more),
            FetchMode::Initial,
            None,
            MAX_CACHED_ITEMS,
        )
        .snapshot
    }

    #[test]
    fn initial_install_resolves_head_from_first_item_when_missing() {
        let mut response = page(&["c2", "c1"], None, false);
        response.head_commit = None;
        let merged = merge_history(
            None,
            Some("stale"),
            response,
            FetchMode::Initial,
            None,
            MAX_CACHED_ITEMS,
        );
        assert_eq!(merged.resolved_head.as_deref(), Some("c2"));
        assert_eq!(merged.snapshot.head_commit.as_deref(), Some("c2"));

        let empty = merge_history(
            None,
            Some("stale"),
            HistoryProviderSnapshot::default(),
            FetchMode::Initial,
            None,
            MAX_CACHED_ITEMS,
        );
        assert_eq!(empty.resolved_head.as_deref(), Some("stale"));
    }

    #[test]
    fn unchanged_response_keeps_snapshot_identity() {
        let previous = initial(&["c2", "c1"], Some("cursor-1"), true);
        let response = HistoryProviderSnapshot {
            unchanged: true,
            head_commit: Some("c2".into()),
            ..Default::default()
        };
        let merged = merge_history(
            Some(&previous),
            Some("c2"),
            response,
            FetchMode::Refresh,
            None,
            MAX_CACHED_ITEMS,
        );
        assert!(Arc::ptr_eq(&merged.snapshot, &previous));
        assert_eq!(merged.resolved_head.as_deref(), Some("c2"));
    }

    #[test]
    fn append_skips_duplicates_and_adopts_new_cursor() {
        let previous = initial(&["c4", "c3"], Some("cursor-1"), true);
        let merged = merge_history(
            Some(&previous),
            Some("c4"),
            page(&["c3", "c2", "c1"], None, false),
            FetchMode::Append,
            Some("cursor-1"),
            MAX_CACHED_ITEMS,
        );
        assert_eq!(keys(&merged.snapshot), vec!["c4", "c3", "c2", "c1"]);
        assert_eq!(merged.snapshot.next_cursor, None);
        assert!(!merged.snapshot.has_more);
        assert_eq!(merged.snapshot.head_commit.as_deref(), Some("c4"));
    }

    #[test]
    fn append_without_novel_items_exhausts_pagination() {
        let previous = initial(&["c4", "c3"], Some("cursor-1"), true);
        let merged = merge_history(
            Some(&previous),
            Some("c4"),
            page(&["c4", "c3"], Some("cursor-1"), true),
            FetchMode::Append,
            Some("cursor-1"),
            MAX_CACHED_ITEMS,
        );
        assert_eq!(keys(&merged.snapshot), vec!["c4", "c3"]);
        assert_eq!(merged.snapshot.next_cursor, None);
        assert!(!merged.snapshot.has_more);
    }

    #[test]
    fn refresh_prepends_new_commits_and_keeps_older_pages() {
        let first = initial(&["c4", "c3"], Some("cursor-1"), true);
        let appended = merge_history(
            Some(&first),
            Some("c4"),
            page(&["c2", "c1"], Some("cursor-2"), true),
            FetchMode::Append,
            Some("cursor-1"),
            MAX_CACHED_ITEMS,
        )
        .snapshot;

        let merged = merge_history(
            Some(&appended),
            Some("c4"),
            page(&["c5", "c4"], Some("cursor-x"), true),
            FetchMode::Refresh,
            None,
            MAX_CACHED_ITEMS,
        );
        assert!(!merged.diverged);
        assert_eq!(
            keys(&merged.snapshot),
            vec!["c5", "c4", "c3", "c2", "c1"]
        );
        assert_eq!(merged.snapshot.next_cursor.as_deref(), Some("cursor-2"));
        assert!(merged.snapshot.has_more);
        assert_eq!(merged.resolved_head.as_deref(), Some("c5"));
    }

    #[test]
    fn refresh_covering_everything_adopts_response_pagination() {
        let previous = initial(&["c2", "c1"], None, false);
        let merged = merge_history(
            Some(&previous),
            Some("c2"),
            page(&["c3", "c2", "c1"], None, false),
            FetchMode::Refresh,
            None,
            MAX_CACHED_ITEMS,
        );
        assert_eq!(keys(&merged.snapshot), vec!["c3", "c2", "c1"]);
        assert!(!merged.snapshot.has_more);
        assert_eq!(merged.snapshot.next_cursor, None);
    }

    #[test]
    fn identical_refresh_reuses_previous_snapshot() {
        let previous = initial(&["c2", "c1"], None, false);
        let merged = merge_history(
            Some(&previous),
            Some("c2"),
            page(&["c2", "c1"], None, false),
            FetchMode::Refresh,
            None,
            MAX_CACHED_ITEMS,
        );
        assert!(Arc::ptr_eq(&merged.snapshot, &previous));
    }

    #[test]
    fn refresh_without_previous_head_resets_snapshot() {
        let previous = initial(&["c4", "c3"], Some("cursor-1"), true);
        let merged = merge_history(
            Some(&previous),
            Some("c4"),
            page(&["r2", "r1"], Some("cursor-r"), true),
            FetchMode::Refresh,
            None,
            MAX_CACHED_ITEMS,
        );
        assert!(merged.diverged);
        assert_eq!(keys(&merged.snapshot), vec!["r2", "r1"]);
        assert_eq!(merged.snapshot.next_cursor.as_deref(), Some("cursor-r"));
        assert_eq!(merged.resolved_head.as_deref(), Some("r2"));
    }

    #[test]
    fn refresh_trims_to_ceiling_and_forces_has_more() {
        let old: Vec<String> = (0..8).map(|i| format!("old{i}")).collect();
        let old_refs: Vec<&str> = old.iter().map(String::as_str).collect();
        let previous = initial(&old_refs, None, false);

        let mut fresh: Vec<&str> = vec!["new1", "new0"];
        fresh.push(old_refs[0]);
        let merged = merge_history(
            Some(&previous),
            Some("old0"),
            page(&fresh, None, false),
            FetchMode::Refresh,
            None,
            5,
        );
        assert_eq!(merged.snapshot.items.len(), 5);
        assert!(merged.snapshot.has_more);
        assert_eq!(
            keys(&merged.snapshot),
            vec!["new1", "new0", "old0", "old1", "old2"]
        );
    }

    #[test]
    fn key_falls_back_to_id_without_full_hash() {
        let mut short = item("abcdef123");
        short.full_hash = None;
        assert_eq!(short.key(), "abcdef1");

        let previous = initial(&["abcdef123"], None, false);
        let mut response = HistoryProviderSnapshot::default();
        response.items.push(short);
        let merged = merge_history(
            Some(&previous),
            None,
            response,
            FetchMode::Append,
            Some("c"),
            MAX_CACHED_ITEMS,
        );
        assert_eq!(merged.snapshot.items.len(), 2);
    }
}
