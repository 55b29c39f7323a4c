//! The store collaborator: issue table, engagement ledgers, notification
//! ledger, and the push channel that announces their insertions.
//!
//! Every operation maps `rusqlite` failures into [`CivicError::Store`] and
//! runs multi-statement work inside one transaction so a failure leaves
//! prior state intact. Events are published only after commit.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::debug;

use crate::db::{self, query};
use crate::error::{CivicError, Result};
use crate::feed::{LedgerEvent, PushChannel, Subscription, Table};
use crate::model::engagement::{BugReport, Comment, Like, LikeToggle};
use crate::model::issue::{Category, GeoPoint, Issue, Severity, Status};
use crate::model::notification::{NewNotification, Notification};
use crate::model::now_us;
use crate::model::profile::{Profile, Role};

pub use crate::db::query::{IssueFilter, SortKey};

/// Validated fields for a new issue row.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueDraft {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub location: GeoPoint,
    pub image_url: Option<String>,
    pub severity: Option<Severity>,
}

/// Result of [`Store::update_issue_status`]. `issue` is the row as read
/// before the write.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub issue: Issue,
    pub from: Status,
    pub to: Status,
}

/// SQLite-backed store plus its push channel.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
    push: PushChannel,
}

impl Store {
    /// Open the store database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path, busy_timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self::from_connection(db::open_store_db(path, busy_timeout)?))
    }

    /// Open a private in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if migration fails.
    pub fn in_memory() -> anyhow::Result<Self> {
        Ok(Self::from_connection(db::open_in_memory()?))
    }

    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            push: PushChannel::new(),
        }
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// `onInsert(table, predicate, callback)`: the callback side is the
    /// returned [`Subscription`], drained by the caller.
    pub fn subscribe(
        &self,
        tables: &[Table],
        predicate: impl Fn(&LedgerEvent) -> bool + Send + 'static,
    ) -> Subscription {
        self.push.subscribe(tables, predicate)
    }

    fn immediate(&self, op: &'static str) -> Result<Transaction<'_>> {
        Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .map_err(|e| CivicError::store(op, e))
    }

    // -- issues -------------------------------------------------------------

    /// Insert a new issue in `Pending` state and return the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`CivicError::Store`] if the insert fails.
    pub fn insert_issue(&self, author: &Profile, draft: IssueDraft) -> Result<Issue> {
        let now = now_us();
        let author_name = if author.display_name.trim().is_empty() {
            "Anonymous".to_string()
        } else {
            author.display_name.clone()
        };
        let issue = Issue {
            id: next_issue_id(&author.user_id, &draft.title, now),
            title: draft.title,
            description: draft.description,
            category: draft.category,
            severity: draft.severity,
            status: Status::Pending,
            author_id: author.user_id.clone(),
            author_name,
            location: Some(draft.location),
            image_url: draft.image_url,
            like_count: 0,
            view_count: 0,
            created_at_us: now,
            updated_at_us: now,
        };

        query::insert_issue(&self.conn, &issue).map_err(|e| CivicError::store("insert_issue", e))?;
        debug!(issue_id = %issue.id, category = %issue.category, "issue inserted");

        self.push.publish(&LedgerEvent::IssueInserted {
            issue_id: issue.id.clone(),
            author_id: issue.author_id.clone(),
            title: issue.title.clone(),
        });
        Ok(issue)
    }

    /// # Errors
    ///
    /// Returns [`CivicError::Store`] on query failure.
    pub fn get_issue(&self, issue_id: &str) -> Result<Option<Issue>> {
        query::get_issue(&self.conn, issue_id).map_err(|e| CivicError::store("get_issue", e))
    }

    /// Like [`Store::get_issue`] but a missing issue is an error.
    ///
    /// # Errors
    ///
    /// Returns [`CivicError::NotFound`] or [`CivicError::Store`].
    pub fn require_issue(&self, issue_id: &str) -> Result<Issue> {
        self.get_issue(issue_id)?
            .ok_or_else(|| CivicError::issue_not_found(issue_id))
    }

    /// Resolve a full or partial id to the single matching issue id.
    ///
    /// # Errors
    ///
    /// Returns [`CivicError::NotFound`] when nothing (or more than one
    /// issue) matches.
    pub fn resolve_issue_id(&self, raw: &str) -> Result<String> {
        query::resolve_issue_id(&self.conn, raw)
            .map_err(|e| CivicError::store("resolve_issue_id", e))?
            .ok_or_else(|| CivicError::issue_not_found(raw))
    }

    /// # Errors
    ///
    /// Returns [`CivicError::Store`] on query failure.
    pub fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>> {
        query::list_issues(&self.conn, filter).map_err(|e| CivicError::store("list_issues", e))
    }

    /// Read, check, and move an issue's status inside one IMMEDIATE
    /// transaction.
    ///
    /// `decide` sees the row as locked and returns the target status, or an
    /// error that aborts without writing. `StatusChanged` is published only
    /// when the status actually moved.
    ///
    /// # Errors
    ///
    /// Whatever `decide` returns, [`CivicError::NotFound`] for an unknown
    /// issue, or [`CivicError::Store`].
    pub fn update_issue_status<F>(
        &self,
        issue_id: &str,
        actor_id: &str,
        decide: F,
    ) -> Result<StatusUpdate>
    where
        F: FnOnce(&Issue) -> Result<Status>,
    {
        const OP: &str = "update_issue_status";
        let tx = self.immediate(OP)?;
        let issue = query::get_issue(&tx, issue_id)
            .map_err(|e| CivicError::store(OP, e))?
            .ok_or_else(|| CivicError::issue_not_found(issue_id))?;
        let from = issue.status;
        let to = decide(&issue)?;
        if from == to {
            return Ok(StatusUpdate { issue, from, to });
        }

        let changed = query::update_issue_status(&tx, issue_id, from, to, now_us())
            .map_err(|e| CivicError::store(OP, e))?;
        if changed == 0 {
            return Err(CivicError::issue_not_found(issue_id));
        }
        tx.commit().map_err(|e| CivicError::store(OP, e))?;

        self.push.publish(&LedgerEvent::StatusChanged {
            issue_id: issue_id.to_string(),
            actor_id: actor_id.to_string(),
            from,
            to,
        });
        Ok(StatusUpdate { issue, from, to })
    }

    /// Add one view and return the new count.
    ///
    /// # Errors
    ///
    /// Returns [`CivicError::NotFound`] or [`CivicError::Store`].
    pub fn increment_view_count(&self, issue_id: &str) -> Result<u64> {
        query::increment_view_count(&self.conn, issue_id)
            .map_err(|e| CivicError::store("increment_view_count", e))?
            .ok_or_else(|| CivicError::issue_not_found(issue_id))
    }

    /// `(issue_id, author_id, title)` rows, optionally for one author only.
    ///
    /// # Errors
    ///
    /// Returns [`CivicError::Store`] on query failure.
    pub fn issue_owners(&self, author_id: Option<&str>) -> Result<Vec<(String, String, String)>> {
        query::issue_owners(&self.conn, author_id).map_err(|e| CivicError::store("issue_owners", e))
    }

    // -- likes --------------------------------------------------------------

    /// # Errors
    ///
    /// Returns [`CivicError::Store`] on query failure.
    pub fn has_like(&self, user_id: &str, issue_id: &str) -> Result<bool> {
        query::has_like(&self.conn, user_id, issue_id).map_err(|e| CivicError::store("has_like", e))
    }

    /// # Errors
    ///
    /// Returns [`CivicError::Store`] on query failure.
    pub fn list_likes_by_user(&self, user_id: &str) -> Result<Vec<String>> {
        query::list_likes_by_user(&self.conn, user_id)
            .map_err(|e| CivicError::store("list_likes_by_user", e))
    }

    /// Delete-if-present else insert, evaluated inside one immediate
    /// transaction so concurrent toggles for the same pair serialize on the
    /// write lock. The returned count is read back after the counter
    /// triggers ran, before commit.
    ///
    /// # Errors
    ///
    /// Returns [`CivicError::NotFound`] for an unknown issue or
    /// [`CivicError::Store`]; nothing is changed in either case.
    pub fn toggle_like(&self, user_id: &str, issue_id: &str) -> Result<LikeToggle> {
        const OP: &str = "toggle_like";
        let now = now_us();
        let tx = self.immediate(OP)?;

        let removed =
            query::delete_like(&tx, user_id, issue_id).map_err(|e| CivicError::store(OP, e))?;
        let liked = if removed {
            false
        } else {
            if query::like_count(&tx, issue_id)
                .map_err(|e| CivicError::store(OP, e))?
                .is_none()
            {
                return Err(CivicError::issue_not_found(issue_id));
            }
            query::insert_like(&tx, user_id, issue_id, now).map_err(|e| CivicError::store(OP, e))?
        };

        let new_count = query::like_count(&tx, issue_id)
            .map_err(|e| CivicError::store(OP, e))?
            .ok_or_else(|| CivicError::issue_not_found(issue_id))?;
        tx.commit().map_err(|e| CivicError::store(OP, e))?;

        debug!(%user_id, %issue_id, liked, new_count, "like toggled");
        if liked {
            self.push.publish(&LedgerEvent::LikeInserted(Like {
                user_id: user_id.to_string(),
                issue_id: issue_id.to_string(),
                created_at_us: now,
            }));
        }
        Ok(LikeToggle { liked, new_count })
    }

    // -- comments -----------------------------------------------------------

    /// # Errors
    ///
    /// Returns [`CivicError::NotFound`] for an unknown issue or
    /// [`CivicError::Store`].
    pub fn insert_comment(&self, issue_id: &str, author_id: &str, content: &str) -> Result<Comment> {
        self.require_issue(issue_id)?;
        let comment = query::insert_comment(&self.conn, issue_id, author_id, content, now_us())
            .map_err(|e| CivicError::store("insert_comment", e))?;
        self.push.publish(&LedgerEvent::CommentInserted(comment.clone()));
        Ok(comment)
    }

    /// # Errors
    ///
    /// Returns [`CivicError::Store`] on query failure.
    pub fn list_comments(&self, issue_id: &str) -> Result<Vec<Comment>> {
        query::list_comments(&self.conn, issue_id).map_err(|e| CivicError::store("list_comments", e))
    }

    // -- notifications ------------------------------------------------------

    /// # Errors
    ///
    /// Returns [`CivicError::Store`] on insert failure.
    pub fn insert_notification(&self, notification: &NewNotification) -> Result<Notification> {
        let stored = query::insert_notification(&self.conn, notification, now_us())
            .map_err(|e| CivicError::store("insert_notification", e))?;
        self.push
            .publish(&LedgerEvent::NotificationInserted(stored.clone()));
        Ok(stored)
    }

    /// # Errors
    ///
    /// Returns [`CivicError::Store`] on query failure.
    pub fn list_notifications(&self, recipient_id: &str) -> Result<Vec<Notification>> {
        query::list_notifications(&self.conn, recipient_id)
            .map_err(|e| CivicError::store("list_notifications", e))
    }

    /// List a recipient's notifications and mark every unread one read, in
    /// one transaction. The returned rows carry their pre-open read flags.
    ///
    /// # Errors
    ///
    /// Returns [`CivicError::Store`]; no rows are marked in that case.
    pub fn open_inbox(&self, recipient_id: &str) -> Result<Vec<Notification>> {
        const OP: &str = "open_inbox";
        let tx = self.immediate(OP)?;
        let listed =
            query::list_notifications(&tx, recipient_id).map_err(|e| CivicError::store(OP, e))?;
        let marked = query::mark_all_read(&tx, recipient_id).map_err(|e| CivicError::store(OP, e))?;
        tx.commit().map_err(|e| CivicError::store(OP, e))?;
        debug!(%recipient_id, listed = listed.len(), marked, "inbox opened");
        Ok(listed)
    }

    /// # Errors
    ///
    /// Returns [`CivicError::Store`] on query failure.
    pub fn unread_count(&self, recipient_id: &str) -> Result<u64> {
        query::unread_count(&self.conn, recipient_id)
            .map_err(|e| CivicError::store("unread_count", e))
    }

    // -- profiles -----------------------------------------------------------

    /// Upsert-on-read: create a default profile (display name = user id)
    /// when absent, then return it.
    ///
    /// # Errors
    ///
    /// Returns [`CivicError::Store`] on failure.
    pub fn get_or_create_profile(&self, user_id: &str) -> Result<Profile> {
        const OP: &str = "get_or_create_profile";
        let created = query::insert_profile_if_absent(&self.conn, user_id, user_id, now_us())
            .map_err(|e| CivicError::store(OP, e))?;
        if created {
            debug!(%user_id, "profile created on first access");
        }
        query::get_profile(&self.conn, user_id)
            .map_err(|e| CivicError::store(OP, e))?
            .ok_or_else(|| CivicError::profile_not_found(user_id))
    }

    /// # Errors
    ///
    /// Returns [`CivicError::Store`] on failure.
    pub fn update_profile(
        &self,
        user_id: &str,
        display_name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<Profile> {
        self.get_or_create_profile(user_id)?;
        query::update_profile_details(&self.conn, user_id, display_name, avatar_url, now_us())
            .map_err(|e| CivicError::store("update_profile", e))?;
        self.get_or_create_profile(user_id)
    }

    /// # Errors
    ///
    /// Returns [`CivicError::Store`] on failure.
    pub fn set_gov_category(&self, user_id: &str, category: Option<Category>) -> Result<Profile> {
        self.get_or_create_profile(user_id)?;
        query::set_gov_category(&self.conn, user_id, category, now_us())
            .map_err(|e| CivicError::store("set_gov_category", e))?;
        self.get_or_create_profile(user_id)
    }

    /// # Errors
    ///
    /// Returns [`CivicError::Store`] on failure.
    pub fn set_role(&self, user_id: &str, role: Role) -> Result<Profile> {
        self.get_or_create_profile(user_id)?;
        query::set_role(&self.conn, user_id, role, now_us())
            .map_err(|e| CivicError::store("set_role", e))?;
        self.get_or_create_profile(user_id)
    }

    // -- bug reports --------------------------------------------------------

    /// # Errors
    ///
    /// Returns [`CivicError::Store`] on failure.
    pub fn insert_bug_report(&self, reporter_id: &str, description: &str) -> Result<BugReport> {
        query::insert_bug_report(&self.conn, reporter_id, description, now_us())
            .map_err(|e| CivicError::store("insert_bug_report", e))
    }
}

/// `iss-` followed by ten hex digits of a BLAKE3 digest over the author,
/// title, timestamp, and a process-local sequence number.
fn next_issue_id(author_id: &str, title: &str, now: i64) -> String {
    static SEQUENCE: AtomicU64 = AtomicU64::new(0);
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);

    let mut hasher = blake3::Hasher::new();
    hasher.update(author_id.as_bytes());
    hasher.update(&[0]);
    hasher.update(title.as_bytes());
    hasher.update(&now.to_le_bytes());
    hasher.update(&seq.to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    let hex = hasher.finalize().to_hex();
    format!("iss-{}", &hex.as_str()[..10])
}
