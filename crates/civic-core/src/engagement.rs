//! Like toggling, per-session view counting, and the local engagement
//! cache that holds optimistic like state until the store answers.

use std::collections::{HashMap, HashSet};

use crate::error::{CivicError, Result};
use crate::model::engagement::LikeToggle;
use crate::store::Store;

/// `toggle_like(issue_id, user_id) -> {liked, new_count}`.
///
/// The decision between insert and delete is made by the store inside one
/// transaction; this function never reads the relation first.
///
/// # Errors
///
/// Returns [`CivicError::NotFound`] for an unknown issue, or a store error.
/// On error no relation or count has changed.
pub fn toggle_like(store: &Store, issue_id: &str, user_id: &str) -> Result<LikeToggle> {
    if user_id.trim().is_empty() {
        return Err(CivicError::missing_field("user"));
    }
    store.toggle_like(user_id, issue_id)
}

/// Issues already counted as viewed by one viewing session.
///
/// Membership lives in memory only. A new session starts empty and may
/// count the same issue again.
#[derive(Debug, Clone, Default)]
pub struct ViewTracker {
    viewed: HashSet<String>,
}

impl ViewTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn has_viewed(&self, issue_id: &str) -> bool {
        self.viewed.contains(issue_id)
    }

    /// `record_view(issue_id, viewer_session)`: increment the stored view
    /// count the first time this session sees `issue_id`.
    ///
    /// Returns the new count, or `None` when the view was already counted.
    /// The issue is only marked viewed once the increment succeeded.
    ///
    /// # Errors
    ///
    /// Propagates store errors; a failed increment may be retried.
    pub fn record_view(&mut self, store: &Store, issue_id: &str) -> Result<Option<u64>> {
        if self.viewed.contains(issue_id) {
            return Ok(None);
        }
        let count = store.increment_view_count(issue_id)?;
        self.viewed.insert(issue_id.to_string());
        Ok(Some(count))
    }

    pub fn reset(&mut self) {
        self.viewed.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.viewed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.viewed.is_empty()
    }
}

/// Liked flag plus count for one issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LikeSnapshot {
    pub liked: bool,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct CacheEntry {
    authoritative: LikeSnapshot,
    optimistic: Option<LikeSnapshot>,
}

/// Handle for an in-flight toggle, tied to the epoch it started in.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct PendingToggle {
    issue_id: String,
    epoch: u64,
}

impl PendingToggle {
    #[must_use]
    pub fn issue_id(&self) -> &str {
        &self.issue_id
    }
}

/// Per-issue like state shown to the user.
///
/// Each entry keeps the last value confirmed by the store and an optional
/// optimistic overlay. A store response always replaces both. Responses
/// belonging to an epoch that ended (user switch, reset) are dropped.
#[derive(Debug, Clone, Default)]
pub struct EngagementCache {
    epoch: u64,
    entries: HashMap<String, CacheEntry>,
}

impl EngagementCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Record a value read from the store.
    pub fn seed(&mut self, issue_id: &str, snapshot: LikeSnapshot) {
        self.entries.insert(
            issue_id.to_string(),
            CacheEntry {
                authoritative: snapshot,
                optimistic: None,
            },
        );
    }

    /// Apply the expected effect of a toggle immediately.
    pub fn begin_toggle(&mut self, issue_id: &str) -> PendingToggle {
        let entry = self.entries.entry(issue_id.to_string()).or_default();
        let base = entry.optimistic.unwrap_or(entry.authoritative);
        let flipped = if base.liked {
            LikeSnapshot {
                liked: false,
                count: base.count.saturating_sub(1),
            }
        } else {
            LikeSnapshot {
                liked: true,
                count: base.count + 1,
            }
        };
        entry.optimistic = Some(flipped);
        PendingToggle {
            issue_id: issue_id.to_string(),
            epoch: self.epoch,
        }
    }

    /// Reconcile with the store's answer.
    ///
    /// Success installs the authoritative value; failure drops the overlay.
    /// Returns false when the token is stale and nothing was applied.
    pub fn settle(&mut self, token: PendingToggle, outcome: &Result<LikeToggle>) -> bool {
        if token.epoch != self.epoch {
            tracing::debug!(
                issue_id = %token.issue_id,
                stale_epoch = token.epoch,
                epoch = self.epoch,
                "discarding like response from a previous session"
            );
            return false;
        }
        let entry = self.entries.entry(token.issue_id).or_default();
        match outcome {
            Ok(toggle) => {
                entry.authoritative = LikeSnapshot {
                    liked: toggle.liked,
                    count: toggle.new_count,
                };
                entry.optimistic = None;
            }
            Err(_) => entry.optimistic = None,
        }
        true
    }

    /// Value to display: overlay if present, else the confirmed value.
    #[must_use]
    pub fn current(&self, issue_id: &str) -> Option<LikeSnapshot> {
        self.entries
            .get(issue_id)
            .map(|entry| entry.optimistic.unwrap_or(entry.authoritative))
    }

    /// Start a new epoch and forget every entry.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.entries.clear();
    }
}

/// Optimistic toggle followed by the store call and reconciliation.
///
/// # Errors
///
/// Propagates the store error after clearing the overlay.
pub fn toggle_like_cached(
    store: &Store,
    cache: &mut EngagementCache,
    issue_id: &str,
    user_id: &str,
) -> Result<LikeToggle> {
    let token = cache.begin_toggle(issue_id);
    let outcome = toggle_like(store, issue_id, user_id);
    cache.settle(token, &outcome);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::issue::{Category, GeoPoint};
    use crate::store::IssueDraft;

    fn seeded() -> (Store, String) {
        let store = Store::in_memory().expect("store");
        let author = store.get_or_create_profile("owner").expect("author");
        let issue = store
            .insert_issue(
                &author,
                IssueDraft {
                    title: "Broken bench".into(),
                    description: "Slats missing".into(),
                    category: Category::Parks,
                    location: GeoPoint {
                        latitude: 0.0,
                        longitude: 0.0,
                    },
                    image_url: None,
                    severity: None,
                },
            )
            .expect("issue");
        (store, issue.id)
    }

    #[test]
    fn like_then_unlike() {
        let (store, id) = seeded();
        assert_eq!(
            toggle_like(&store, &id, "a").expect("like"),
            LikeToggle {
                liked: true,
                new_count: 1
            }
        );
        assert_eq!(
            toggle_like(&store, &id, "a").expect("unlike"),
            LikeToggle {
                liked: false,
                new_count: 0
            }
        );
    }

    #[test]
    fn count_tracks_distinct_likers() {
        let (store, id) = seeded();
        toggle_like(&store, &id, "a").expect("a");
        toggle_like(&store, &id, "b").expect("b");
        let last = toggle_like(&store, &id, "c").expect("c");
        assert_eq!(last.new_count, 3);
        let after = toggle_like(&store, &id, "b").expect("b off");
        assert_eq!(after.new_count, 2);
    }

    #[test]
    fn blank_user_is_rejected() {
        let (store, id) = seeded();
        assert!(toggle_like(&store, &id, " ").is_err());
        assert_eq!(store.require_issue(&id).expect("issue").like_count, 0);
    }

    #[test]
    fn repeated_view_in_one_session_counts_once() {
        let (store, id) = seeded();
        let mut views = ViewTracker::new();
        assert_eq!(views.record_view(&store, &id).expect("first"), Some(1));
        assert_eq!(views.record_view(&store, &id).expect("second"), None);
        assert_eq!(store.require_issue(&id).expect("issue").view_count, 1);

        let mut fresh = ViewTracker::new();
        assert_eq!(fresh.record_view(&store, &id).expect("new session"), Some(2));
    }

    #[test]
    fn failed_view_is_not_remembered() {
        let store = Store::in_memory().expect("store");
        let mut views = ViewTracker::new();
        assert!(views.record_view(&store, "iss-gone").is_err());
        assert!(!views.has_viewed("iss-gone"));
    }

    #[test]
    fn optimistic_overlay_is_replaced_by_authoritative_value() {
        let mut cache = EngagementCache::new();
        cache.seed("iss-1", LikeSnapshot { liked: false, count: 4 });

        let token = cache.begin_toggle("iss-1");
        assert_eq!(cache.current("iss-1"), Some(LikeSnapshot { liked: true, count: 5 }));

        // Another user liked concurrently; the store's number wins.
        let applied = cache.settle(
            token,
            &Ok(LikeToggle {
                liked: true,
                new_count: 6,
            }),
        );
        assert!(applied);
        assert_eq!(cache.current("iss-1"), Some(LikeSnapshot { liked: true, count: 6 }));
    }

    #[test]
    fn failure_rolls_back_overlay() {
        let mut cache = EngagementCache::new();
        cache.seed("iss-1", LikeSnapshot { liked: true, count: 2 });
        let token = cache.begin_toggle("iss-1");
        cache.settle(token, &Err(CivicError::issue_not_found("iss-1")));
        assert_eq!(cache.current("iss-1"), Some(LikeSnapshot { liked: true, count: 2 }));
    }

    #[test]
    fn stale_response_after_reset_is_discarded() {
        let mut cache = EngagementCache::new();
        let token = cache.begin_toggle("iss-1");
        cache.reset();

        let applied = cache.settle(
            token,
            &Ok(LikeToggle {
                liked: true,
                new_count: 1,
            }),
        );
        assert!(!applied);
        assert_eq!(cache.current("iss-1"), None);
    }

    #[test]
    fn cached_toggle_ends_on_store_value() {
        let (store, id) = seeded();
        let mut cache = EngagementCache::new();
        toggle_like_cached(&store, &mut cache, &id, "a").expect("like");
        assert_eq!(cache.current(&id), Some(LikeSnapshot { liked: true, count: 1 }));
    }
}
