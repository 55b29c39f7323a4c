//! In-process push channel for store insertions.
//!
//! The store publishes a [`LedgerEvent`] after every committed insert (and
//! status change). Subscribers register a table set plus a predicate and
//! receive matching events over an `mpsc` channel. Delivery is out of band:
//! a subscriber drains its queue whenever it chooses, in any order relative
//! to its own in-flight requests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::model::engagement::{Comment, Like};
use crate::model::issue::Status;
use crate::model::notification::Notification;

/// Ledger tables that emit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Issues,
    Likes,
    Comments,
    Notifications,
}

/// A committed change, as pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    IssueInserted {
        issue_id: String,
        author_id: String,
        title: String,
    },
    StatusChanged {
        issue_id: String,
        actor_id: String,
        from: Status,
        to: Status,
    },
    LikeInserted(Like),
    CommentInserted(Comment),
    NotificationInserted(Notification),
}

impl LedgerEvent {
    #[must_use]
    pub const fn table(&self) -> Table {
        match self {
            Self::IssueInserted { .. } | Self::StatusChanged { .. } => Table::Issues,
            Self::LikeInserted(_) => Table::Likes,
            Self::CommentInserted(_) => Table::Comments,
            Self::NotificationInserted(_) => Table::Notifications,
        }
    }

    /// Issue the event concerns, when there is one.
    #[must_use]
    pub fn issue_id(&self) -> Option<&str> {
        match self {
            Self::IssueInserted { issue_id, .. } | Self::StatusChanged { issue_id, .. } => {
                Some(issue_id)
            }
            Self::LikeInserted(like) => Some(&like.issue_id),
            Self::CommentInserted(comment) => Some(&comment.issue_id),
            Self::NotificationInserted(notification) => notification.issue_id.as_deref(),
        }
    }
}

type Predicate = Box<dyn Fn(&LedgerEvent) -> bool + Send>;

struct Subscriber {
    id: u64,
    tables: Vec<Table>,
    predicate: Predicate,
    tx: Sender<LedgerEvent>,
}

/// Fan-in point for published events.
#[derive(Default)]
pub struct PushChannel {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl std::fmt::Debug for PushChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushChannel")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl PushChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `tables`, filtered by `predicate`.
    pub fn subscribe(
        &self,
        tables: &[Table],
        predicate: impl Fn(&LedgerEvent) -> bool + Send + 'static,
    ) -> Subscription {
        let (tx, rx) = mpsc::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push(Subscriber {
            id,
            tables: tables.to_vec(),
            predicate: Box::new(predicate),
            tx,
        });
        tracing::debug!(subscription = id, ?tables, "push subscription opened");
        Subscription { id, rx }
    }

    /// Deliver `event` to every matching subscriber. Subscribers whose
    /// receiving end has been dropped are pruned.
    pub fn publish(&self, event: &LedgerEvent) {
        let table = event.table();
        self.lock().retain(|sub| {
            if !sub.tables.contains(&table) || !(sub.predicate)(event) {
                return true;
            }
            let delivered = sub.tx.send(event.clone()).is_ok();
            if !delivered {
                tracing::debug!(subscription = sub.id, "pruning closed push subscription");
            }
            delivered
        });
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Receiving end of a push subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    rx: Receiver<LedgerEvent>,
}

impl Subscription {
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Take every event queued so far without blocking.
    pub fn drain(&self) -> Vec<LedgerEvent> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn like(user: &str, issue: &str) -> LedgerEvent {
        LedgerEvent::LikeInserted(Like {
            user_id: user.into(),
            issue_id: issue.into(),
            created_at_us: 1,
        })
    }

    #[test]
    fn subscribers_only_see_matching_tables() {
        let channel = PushChannel::new();
        let likes = channel.subscribe(&[Table::Likes], |_| true);
        let comments = channel.subscribe(&[Table::Comments], |_| true);

        channel.publish(&like("u1", "iss-1"));

        assert_eq!(likes.drain().len(), 1);
        assert!(comments.drain().is_empty());
    }

    #[test]
    fn predicate_filters_rows() {
        let channel = PushChannel::new();
        let sub = channel.subscribe(&[Table::Likes], |event| event.issue_id() == Some("iss-2"));

        channel.publish(&like("u1", "iss-1"));
        channel.publish(&like("u1", "iss-2"));

        let events = sub.drain();
        assert_eq!(events, vec![like("u1", "iss-2")]);
    }

    #[test]
    fn dropped_subscription_is_pruned_on_next_publish() {
        let channel = PushChannel::new();
        let sub = channel.subscribe(&[Table::Likes], |_| true);
        assert_eq!(channel.subscriber_count(), 1);

        drop(sub);
        channel.publish(&like("u1", "iss-1"));
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn events_published_before_subscribe_are_not_replayed() {
        let channel = PushChannel::new();
        channel.publish(&like("u1", "iss-1"));
        let sub = channel.subscribe(&[Table::Likes], |_| true);
        assert!(sub.drain().is_empty());
    }
}
