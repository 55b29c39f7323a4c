//! Notification fan-out.
//!
//! A [`FanOut`] turns pushed ledger insertions into notifications for the
//! issue owner. It needs to know who owns which issue; that index is loaded
//! from the store *before* the push subscription opens, so no insertion can
//! arrive for an issue the index has not seen. Issues created afterwards are
//! added as their own insertion events arrive.

use std::collections::HashMap;

use crate::error::Result;
use crate::feed::{LedgerEvent, Subscription, Table};
use crate::model::notification::{NewNotification, Notification, NotificationKind};
use crate::store::Store;

/// Whose issues a fan-out instance watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every issue in the store. Used by the process that performs writes.
    Everyone,
    /// Only issues authored by one user, as a signed-in viewer would.
    Recipient(String),
}

impl Scope {
    fn author_filter(&self) -> Option<&str> {
        match self {
            Self::Everyone => None,
            Self::Recipient(user) => Some(user),
        }
    }

    fn covers(&self, author_id: &str) -> bool {
        match self {
            Self::Everyone => true,
            Self::Recipient(user) => user == author_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Owner {
    author_id: String,
    title: String,
}

/// `issue_id -> (author, title)` for the issues in scope.
#[derive(Debug, Clone)]
pub struct OwnershipIndex {
    scope: Scope,
    owners: HashMap<String, Owner>,
}

impl OwnershipIndex {
    /// Empty index for `scope`.
    #[must_use]
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            owners: HashMap::new(),
        }
    }

    /// Load every in-scope issue from the store.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn load(store: &Store, scope: Scope) -> Result<Self> {
        let mut index = Self::new(scope);
        for (issue_id, author_id, title) in store.issue_owners(index.scope.author_filter())? {
            index.insert(issue_id, author_id, title);
        }
        tracing::debug!(issues = index.len(), scope = ?index.scope, "ownership index loaded");
        Ok(index)
    }

    #[must_use]
    pub const fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Add an issue if its author is in scope.
    pub fn insert(&mut self, issue_id: String, author_id: String, title: String) {
        if self.scope.covers(&author_id) {
            self.owners.insert(issue_id, Owner { author_id, title });
        }
    }

    /// Extend the index from an issue insertion. Other events are ignored.
    pub fn observe(&mut self, event: &LedgerEvent) {
        if let LedgerEvent::IssueInserted {
            issue_id,
            author_id,
            title,
        } = event
        {
            self.insert(issue_id.clone(), author_id.clone(), title.clone());
        }
    }

    #[must_use]
    pub fn contains(&self, issue_id: &str) -> bool {
        self.owners.contains_key(issue_id)
    }

    #[must_use]
    pub fn author_of(&self, issue_id: &str) -> Option<&str> {
        self.owners.get(issue_id).map(|o| o.author_id.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// Decide whether `event` produces a notification, and build it.
///
/// Likes and comments notify the issue author; status changes notify the
/// author too. Nothing is produced when the actor is the author or the
/// issue is not in the index.
#[must_use]
pub fn synthesize(event: &LedgerEvent, index: &OwnershipIndex) -> Option<NewNotification> {
    let (issue_id, actor_id) = match event {
        LedgerEvent::LikeInserted(like) => (&like.issue_id, &like.user_id),
        LedgerEvent::CommentInserted(comment) => (&comment.issue_id, &comment.author_id),
        LedgerEvent::StatusChanged {
            issue_id, actor_id, ..
        } => (issue_id, actor_id),
        LedgerEvent::IssueInserted { .. } | LedgerEvent::NotificationInserted(_) => return None,
    };

    let owner = index.owners.get(issue_id)?;
    if owner.author_id == *actor_id {
        return None;
    }

    let (kind, message) = match event {
        LedgerEvent::LikeInserted(_) => (
            NotificationKind::Like,
            format!("{actor_id} liked your issue \"{}\"", owner.title),
        ),
        LedgerEvent::CommentInserted(comment) => (
            NotificationKind::Comment,
            format!("{actor_id} commented: \"{}\"", comment.content),
        ),
        LedgerEvent::StatusChanged { to, .. } => (
            NotificationKind::Status,
            format!("Your issue \"{}\" is now {to}", owner.title),
        ),
        LedgerEvent::IssueInserted { .. } | LedgerEvent::NotificationInserted(_) => return None,
    };

    Some(NewNotification {
        recipient_id: owner.author_id.clone(),
        kind,
        message,
        issue_id: Some(issue_id.clone()),
    })
}

/// Ownership index plus the push subscription that feeds it.
#[derive(Debug)]
pub struct FanOut {
    index: OwnershipIndex,
    subscription: Subscription,
}

impl FanOut {
    const TABLES: [Table; 3] = [Table::Issues, Table::Likes, Table::Comments];

    /// Load the index, then subscribe.
    ///
    /// # Errors
    ///
    /// Propagates store errors from the index load; no subscription is
    /// opened in that case.
    pub fn start(store: &Store, scope: Scope) -> Result<Self> {
        let index = OwnershipIndex::load(store, scope)?;
        let subscription = store.subscribe(&Self::TABLES, |_| true);
        Ok(Self {
            index,
            subscription,
        })
    }

    /// Drop the current subscription and index and start over for `scope`.
    ///
    /// # Errors
    ///
    /// Propagates store errors; the previous state is kept in that case.
    pub fn reinitialize(&mut self, store: &Store, scope: Scope) -> Result<()> {
        *self = Self::start(store, scope)?;
        Ok(())
    }

    #[must_use]
    pub const fn index(&self) -> &OwnershipIndex {
        &self.index
    }

    /// Process every queued event and store the resulting notifications.
    ///
    /// Events are all handled even if one insert fails; the first failure
    /// is returned afterwards.
    ///
    /// # Errors
    ///
    /// Returns the first store error encountered.
    pub fn pump(&mut self, store: &Store) -> Result<Vec<Notification>> {
        let mut stored = Vec::new();
        let mut first_error = None;

        for event in self.subscription.drain() {
            self.index.observe(&event);
            if matches!(self.index.scope, Scope::Everyone) {
                self.backfill(store, &event);
            }
            let Some(notification) = synthesize(&event, &self.index) else {
                continue;
            };
            match store.insert_notification(&notification) {
                Ok(row) => {
                    tracing::debug!(
                        recipient = %row.recipient_id,
                        kind = %row.kind,
                        "notification fanned out"
                    );
                    stored.push(row);
                }
                Err(err) => {
                    tracing::warn!(error = %err, recipient = %notification.recipient_id, "notification insert failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(stored),
        }
    }

    /// An unscoped instance may see events for issues it never indexed
    /// (created by another process after the load); look those up.
    fn backfill(&mut self, store: &Store, event: &LedgerEvent) {
        let Some(issue_id) = event.issue_id() else {
            return;
        };
        if self.index.contains(issue_id) {
            return;
        }
        match store.get_issue(issue_id) {
            Ok(Some(issue)) => self.index.insert(issue.id, issue.author_id, issue.title),
            Ok(None) => {}
            Err(err) => tracing::warn!(error = %err, %issue_id, "ownership lookup failed"),
        }
    }
}

/// Subscribe to notifications addressed to `recipient_id`.
#[must_use]
pub fn subscribe_inbox(store: &Store, recipient_id: &str) -> Subscription {
    let recipient = recipient_id.to_string();
    store.subscribe(&[Table::Notifications], move |event| {
        matches!(event, LedgerEvent::NotificationInserted(n) if n.recipient_id == recipient)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::engagement::{Comment, Like};
    use crate::model::issue::Status;

    fn index() -> OwnershipIndex {
        let mut index = OwnershipIndex::new(Scope::Everyone);
        index.insert("iss-1".into(), "bea".into(), "Pothole".into());
        index
    }

    fn like(user: &str) -> LedgerEvent {
        LedgerEvent::LikeInserted(Like {
            user_id: user.into(),
            issue_id: "iss-1".into(),
            created_at_us: 0,
        })
    }

    fn comment(author: &str, content: &str) -> LedgerEvent {
        LedgerEvent::CommentInserted(Comment {
            id: 1,
            issue_id: "iss-1".into(),
            author_id: author.into(),
            content: content.into(),
            created_at_us: 0,
        })
    }

    #[test]
    fn like_by_other_notifies_owner() {
        let n = synthesize(&like("cy"), &index()).expect("notification");
        assert_eq!(n.recipient_id, "bea");
        assert_eq!(n.kind, NotificationKind::Like);
        assert_eq!(n.message, "cy liked your issue \"Pothole\"");
        assert_eq!(n.issue_id.as_deref(), Some("iss-1"));
    }

    #[test]
    fn comment_carries_content() {
        let n = synthesize(&comment("cy", "Still there"), &index()).expect("notification");
        assert_eq!(n.message, "cy commented: \"Still there\"");
    }

    #[test]
    fn self_actions_are_silent() {
        assert!(synthesize(&like("bea"), &index()).is_none());
        assert!(synthesize(&comment("bea", "bump"), &index()).is_none());
    }

    #[test]
    fn status_change_notifies_author_unless_author_acted() {
        let by_admin = LedgerEvent::StatusChanged {
            issue_id: "iss-1".into(),
            actor_id: "root".into(),
            from: Status::Pending,
            to: Status::Resolved,
        };
        let n = synthesize(&by_admin, &index()).expect("notification");
        assert_eq!(n.kind, NotificationKind::Status);
        assert_eq!(n.message, "Your issue \"Pothole\" is now Resolved");

        let by_author = LedgerEvent::StatusChanged {
            issue_id: "iss-1".into(),
            actor_id: "bea".into(),
            from: Status::Pending,
            to: Status::InProgress,
        };
        assert!(synthesize(&by_author, &index()).is_none());
    }

    #[test]
    fn unknown_issue_is_ignored() {
        let event = LedgerEvent::LikeInserted(Like {
            user_id: "cy".into(),
            issue_id: "iss-9".into(),
            created_at_us: 0,
        });
        assert!(synthesize(&event, &index()).is_none());
    }

    #[test]
    fn recipient_scope_ignores_other_authors() {
        let mut index = OwnershipIndex::new(Scope::Recipient("bea".into()));
        index.observe(&LedgerEvent::IssueInserted {
            issue_id: "iss-2".into(),
            author_id: "dan".into(),
            title: "Other".into(),
        });
        index.observe(&LedgerEvent::IssueInserted {
            issue_id: "iss-3".into(),
            author_id: "bea".into(),
            title: "Mine".into(),
        });
        assert!(!index.contains("iss-2"));
        assert_eq!(index.author_of("iss-3"), Some("bea"));
    }
}
