//! `SQLite` query helpers for the civic store.
//!
//! Typed row structs in, typed row structs out: every function takes a
//! shared `&Connection` and returns `rusqlite::Result<T>`. Error mapping
//! into the domain taxonomy happens one layer up in [`crate::store`].

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use std::fmt::{self, Write as _};
use std::str::FromStr;

use crate::model::engagement::{BugReport, Comment};
use crate::model::issue::{Category, GeoPoint, Issue, Severity, Status};
use crate::model::notification::{NewNotification, Notification, NotificationKind};
use crate::model::profile::{Profile, Role};

// ---------------------------------------------------------------------------
// Sorting and filtering
// ---------------------------------------------------------------------------

/// Column the feed is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Creation time.
    #[default]
    Latest,
    /// Denormalized like count.
    Likes,
    /// Denormalized view count.
    Views,
}

impl SortKey {
    const fn column(self) -> &'static str {
        match self {
            Self::Latest => "created_at_us",
            Self::Likes => "like_count",
            Self::Views => "view_count",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Likes => f.write_str("likes"),
            Self::Views => f.write_str("views"),
        }
    }
}

impl FromStr for SortKey {
    type Err = crate::model::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" | "created_at" | "newest" => Ok(Self::Latest),
            "likes" | "like_count" | "most-liked" => Ok(Self::Likes),
            "views" | "view_count" | "most-viewed" => Ok(Self::Views),
            _ => Err(crate::model::ParseEnumError {
                expected: "sort key",
                got: s.to_string(),
            }),
        }
    }
}

/// Filter criteria for issue listings. Set fields combine with AND.
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub category: Option<Category>,
    pub status: Option<Status>,
    pub author_id: Option<String>,
    /// Only issues carrying a geolocation (map view).
    pub located_only: bool,
    pub sort: SortKey,
    /// Ascending order when true; the feed default is descending.
    pub ascending: bool,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

const ISSUE_COLUMNS: &str = "issue_id, title, description, category, severity, status, \
     author_id, author_name, latitude, longitude, image_url, like_count, view_count, \
     created_at_us, updated_at_us";

fn parse_text<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error)))
}

fn parse_opt_text<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| {
        value.parse::<T>().map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error))
        })
    })
    .transpose()
}

fn get_count(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(idx)?;
    u64::try_from(raw)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(error)))
}

fn issue_from_row(row: &Row<'_>) -> rusqlite::Result<Issue> {
    let latitude: Option<f64> = row.get(8)?;
    let longitude: Option<f64> = row.get(9)?;
    let location = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(GeoPoint {
            latitude,
            longitude,
        }),
        _ => None,
    };

    Ok(Issue {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category: parse_text(row, 3)?,
        severity: parse_opt_text::<Severity>(row, 4)?,
        status: parse_text(row, 5)?,
        author_id: row.get(6)?,
        author_name: row.get(7)?,
        location,
        image_url: row.get(10)?,
        like_count: get_count(row, 11)?,
        view_count: get_count(row, 12)?,
        created_at_us: row.get(13)?,
        updated_at_us: row.get(14)?,
    })
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        user_id: row.get(0)?,
        display_name: row.get(1)?,
        avatar_url: row.get(2)?,
        gov_category: parse_opt_text::<Category>(row, 3)?,
        role: parse_text::<Role>(row, 4)?,
        created_at_us: row.get(5)?,
        updated_at_us: row.get(6)?,
    })
}

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        recipient_id: row.get(1)?,
        kind: parse_text::<NotificationKind>(row, 2)?,
        message: row.get(3)?,
        is_read: row.get(4)?,
        issue_id: row.get(5)?,
        created_at_us: row.get(6)?,
    })
}

fn owner_from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        issue_id: row.get(1)?,
        author_id: row.get(2)?,
        content: row.get(3)?,
        created_at_us: row.get(4)?,
    })
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

/// Insert a fully-formed issue row.
pub fn insert_issue(conn: &Connection, issue: &Issue) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO issues (
            issue_id, title, description, category, severity, status,
            author_id, author_name, latitude, longitude, image_url,
            like_count, view_count, created_at_us, updated_at_us
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, 0, ?12, ?13)",
        params![
            issue.id,
            issue.title,
            issue.description,
            issue.category.as_str(),
            issue.severity.map(Severity::as_str),
            issue.status.as_str(),
            issue.author_id,
            issue.author_name,
            issue.location.map(|p| p.latitude),
            issue.location.map(|p| p.longitude),
            issue.image_url,
            issue.created_at_us,
            issue.updated_at_us,
        ],
    )?;
    Ok(())
}

/// Fetch a single issue by exact id.
pub fn get_issue(conn: &Connection, issue_id: &str) -> rusqlite::Result<Option<Issue>> {
    let sql = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE issue_id = ?1");
    conn.query_row(&sql, [issue_id], issue_from_row).optional()
}

/// Resolve a (possibly partial) issue id to the unique matching id.
///
/// Returns `None` when nothing matches or the prefix is ambiguous.
pub fn resolve_issue_id(conn: &Connection, raw: &str) -> rusqlite::Result<Option<String>> {
    let needle = raw.trim();
    let full = if needle.starts_with("iss-") {
        needle.to_string()
    } else {
        format!("iss-{needle}")
    };

    let exact: Option<String> = conn
        .query_row("SELECT issue_id FROM issues WHERE issue_id = ?1", [&full], |row| {
            row.get(0)
        })
        .optional()?;
    if exact.is_some() {
        return Ok(exact);
    }

    // Literal prefix match; user input must not act as a LIKE pattern.
    let mut stmt = conn.prepare(
        "SELECT issue_id FROM issues WHERE substr(issue_id, 1, length(?1)) = ?1 LIMIT 2",
    )?;
    let matches: Vec<String> = stmt
        .query_map([&full], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;
    Ok(if matches.len() == 1 {
        matches.into_iter().next()
    } else {
        None
    })
}

/// List issues with filters, sort order, and pagination.
pub fn list_issues(conn: &Connection, filter: &IssueFilter) -> rusqlite::Result<Vec<Issue>> {
    let mut sql = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE 1 = 1");
    let mut values: Vec<String> = Vec::new();

    if let Some(category) = filter.category {
        values.push(category.as_str().to_string());
        let _ = write!(sql, " AND category = ?{}", values.len());
    }
    if let Some(status) = filter.status {
        values.push(status.as_str().to_string());
        let _ = write!(sql, " AND status = ?{}", values.len());
    }
    if let Some(author) = &filter.author_id {
        values.push(author.clone());
        let _ = write!(sql, " AND author_id = ?{}", values.len());
    }
    if filter.located_only {
        sql.push_str(" AND latitude IS NOT NULL AND longitude IS NOT NULL");
    }

    let direction = if filter.ascending { "ASC" } else { "DESC" };
    let _ = write!(
        sql,
        " ORDER BY {} {direction}, created_at_us DESC, issue_id ASC",
        filter.sort.column()
    );

    if let Some(limit) = filter.limit {
        let _ = write!(sql, " LIMIT {limit}");
        if let Some(offset) = filter.offset {
            let _ = write!(sql, " OFFSET {offset}");
        }
    } else if let Some(offset) = filter.offset {
        let _ = write!(sql, " LIMIT -1 OFFSET {offset}");
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), issue_from_row)?;
    rows.collect()
}

/// Move an issue from `from` to `to`. Returns 0 when the issue is gone or
/// no longer in `from`.
pub fn update_issue_status(
    conn: &Connection,
    issue_id: &str,
    from: Status,
    to: Status,
    now_us: i64,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE issues SET status = ?1, updated_at_us = ?2 WHERE issue_id = ?3 AND status = ?4",
        params![to.as_str(), now_us, issue_id, from.as_str()],
    )
}

/// Add one to `view_count`, returning the new value (or `None` when the
/// issue does not exist).
pub fn increment_view_count(conn: &Connection, issue_id: &str) -> rusqlite::Result<Option<u64>> {
    let changed = conn.execute(
        "UPDATE issues SET view_count = view_count + 1 WHERE issue_id = ?1",
        [issue_id],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    conn.query_row(
        "SELECT view_count FROM issues WHERE issue_id = ?1",
        [issue_id],
        |row| get_count(row, 0),
    )
    .map(Some)
}

/// Current denormalized like count of an issue.
pub fn like_count(conn: &Connection, issue_id: &str) -> rusqlite::Result<Option<u64>> {
    conn.query_row(
        "SELECT like_count FROM issues WHERE issue_id = ?1",
        [issue_id],
        |row| get_count(row, 0),
    )
    .optional()
}

/// `(issue_id, author_id, title)` for every issue, optionally restricted to
/// one author.
pub fn issue_owners(
    conn: &Connection,
    author_id: Option<&str>,
) -> rusqlite::Result<Vec<(String, String, String)>> {
    if let Some(author) = author_id {
        let mut stmt =
            conn.prepare("SELECT issue_id, author_id, title FROM issues WHERE author_id = ?1")?;
        let rows = stmt.query_map([author], owner_from_row)?;
        rows.collect()
    } else {
        let mut stmt = conn.prepare("SELECT issue_id, author_id, title FROM issues")?;
        let rows = stmt.query_map([], owner_from_row)?;
        rows.collect()
    }
}

// ---------------------------------------------------------------------------
// Likes
// ---------------------------------------------------------------------------

pub fn has_like(conn: &Connection, user_id: &str, issue_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM likes WHERE user_id = ?1 AND issue_id = ?2)",
        params![user_id, issue_id],
        |row| row.get(0),
    )
}

/// Insert the pair unless present. Returns true when a row was created.
pub fn insert_like(
    conn: &Connection,
    user_id: &str,
    issue_id: &str,
    now_us: i64,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO likes (user_id, issue_id, created_at_us) VALUES (?1, ?2, ?3)",
        params![user_id, issue_id, now_us],
    )?;
    Ok(changed == 1)
}

/// Delete the pair if present. Returns true when a row was removed.
pub fn delete_like(conn: &Connection, user_id: &str, issue_id: &str) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "DELETE FROM likes WHERE user_id = ?1 AND issue_id = ?2",
        params![user_id, issue_id],
    )?;
    Ok(changed == 1)
}

/// Issue ids liked by `user_id`.
pub fn list_likes_by_user(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT issue_id FROM likes WHERE user_id = ?1 ORDER BY created_at_us DESC")?;
    let rows = stmt.query_map([user_id], |row| row.get(0))?;
    rows.collect()
}

/// Number of like rows referencing `issue_id` (the ground truth behind
/// the denormalized counter).
pub fn count_like_rows(conn: &Connection, issue_id: &str) -> rusqlite::Result<u64> {
    conn.query_row(
        "SELECT COUNT(*) FROM likes WHERE issue_id = ?1",
        [issue_id],
        |row| get_count(row, 0),
    )
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

pub fn insert_comment(
    conn: &Connection,
    issue_id: &str,
    author_id: &str,
    content: &str,
    now_us: i64,
) -> rusqlite::Result<Comment> {
    conn.execute(
        "INSERT INTO comments (issue_id, author_id, content, created_at_us) VALUES (?1, ?2, ?3, ?4)",
        params![issue_id, author_id, content, now_us],
    )?;
    Ok(Comment {
        id: conn.last_insert_rowid(),
        issue_id: issue_id.to_string(),
        author_id: author_id.to_string(),
        content: content.to_string(),
        created_at_us: now_us,
    })
}

/// Comments on an issue, oldest first.
pub fn list_comments(conn: &Connection, issue_id: &str) -> rusqlite::Result<Vec<Comment>> {
    let mut stmt = conn.prepare(
        "SELECT comment_id, issue_id, author_id, content, created_at_us \
         FROM comments WHERE issue_id = ?1 ORDER BY created_at_us ASC, comment_id ASC",
    )?;
    let rows = stmt.query_map([issue_id], comment_from_row)?;
    rows.collect()
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

pub fn insert_notification(
    conn: &Connection,
    notification: &NewNotification,
    now_us: i64,
) -> rusqlite::Result<Notification> {
    conn.execute(
        "INSERT INTO notifications (recipient_id, kind, message, is_read, issue_id, created_at_us) \
         VALUES (?1, ?2, ?3, 0, ?4, ?5)",
        params![
            notification.recipient_id,
            notification.kind.as_str(),
            notification.message,
            notification.issue_id,
            now_us,
        ],
    )?;
    Ok(Notification {
        id: conn.last_insert_rowid(),
        recipient_id: notification.recipient_id.clone(),
        kind: notification.kind,
        message: notification.message.clone(),
        is_read: false,
        issue_id: notification.issue_id.clone(),
        created_at_us: now_us,
    })
}

/// Notifications addressed to `recipient_id`, newest first.
pub fn list_notifications(
    conn: &Connection,
    recipient_id: &str,
) -> rusqlite::Result<Vec<Notification>> {
    let mut stmt = conn.prepare(
        "SELECT notification_id, recipient_id, kind, message, is_read, issue_id, created_at_us \
         FROM notifications WHERE recipient_id = ?1 \
         ORDER BY created_at_us DESC, notification_id DESC",
    )?;
    let rows = stmt.query_map([recipient_id], notification_from_row)?;
    rows.collect()
}

pub fn mark_all_read(conn: &Connection, recipient_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE recipient_id = ?1 AND is_read = 0",
        [recipient_id],
    )
}

pub fn unread_count(conn: &Connection, recipient_id: &str) -> rusqlite::Result<u64> {
    conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND is_read = 0",
        [recipient_id],
        |row| get_count(row, 0),
    )
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

const PROFILE_COLUMNS: &str =
    "user_id, display_name, avatar_url, gov_category, role, created_at_us, updated_at_us";

pub fn get_profile(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<Profile>> {
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ?1");
    conn.query_row(&sql, [user_id], profile_from_row).optional()
}

/// Create a default profile for `user_id` unless one exists.
pub fn insert_profile_if_absent(
    conn: &Connection,
    user_id: &str,
    display_name: &str,
    now_us: i64,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "INSERT INTO profiles (user_id, display_name, avatar_url, gov_category, role, created_at_us, updated_at_us) \
         VALUES (?1, ?2, NULL, NULL, 'citizen', ?3, ?3) \
         ON CONFLICT(user_id) DO NOTHING",
        params![user_id, display_name, now_us],
    )?;
    Ok(changed == 1)
}

pub fn update_profile_details(
    conn: &Connection,
    user_id: &str,
    display_name: Option<&str>,
    avatar_url: Option<&str>,
    now_us: i64,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE profiles SET \
            display_name = COALESCE(?2, display_name), \
            avatar_url = COALESCE(?3, avatar_url), \
            updated_at_us = ?4 \
         WHERE user_id = ?1",
        params![user_id, display_name, avatar_url, now_us],
    )
}

pub fn set_gov_category(
    conn: &Connection,
    user_id: &str,
    category: Option<Category>,
    now_us: i64,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE profiles SET gov_category = ?2, updated_at_us = ?3 WHERE user_id = ?1",
        params![user_id, category.map(Category::as_str), now_us],
    )
}

pub fn set_role(conn: &Connection, user_id: &str, role: Role, now_us: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE profiles SET role = ?2, updated_at_us = ?3 WHERE user_id = ?1",
        params![user_id, role.as_str(), now_us],
    )
}

// ---------------------------------------------------------------------------
// Bug reports
// ---------------------------------------------------------------------------

pub fn insert_bug_report(
    conn: &Connection,
    reporter_id: &str,
    description: &str,
    now_us: i64,
) -> rusqlite::Result<BugReport> {
    conn.execute(
        "INSERT INTO bug_reports (reporter_id, description, created_at_us) VALUES (?1, ?2, ?3)",
        params![reporter_id, description, now_us],
    )?;
    Ok(BugReport {
        id: conn.last_insert_rowid(),
        reporter_id: reporter_id.to_string(),
        description: description.to_string(),
        created_at_us: now_us,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn sample_issue(id: &str, author: &str, category: Category, created: i64) -> Issue {
        Issue {
            id: id.to_string(),
            title: format!("Issue {id}"),
            description: "Something is broken".to_string(),
            category,
            severity: None,
            status: Status::Pending,
            author_id: author.to_string(),
            author_name: author.to_string(),
            location: Some(GeoPoint {
                latitude: 12.97,
                longitude: 77.59,
            }),
            image_url: None,
            like_count: 0,
            view_count: 0,
            created_at_us: created,
            updated_at_us: created,
        }
    }

    fn seeded() -> Connection {
        let conn = db::open_in_memory().expect("open store");
        insert_issue(&conn, &sample_issue("iss-a1", "alice", Category::Roads, 10)).expect("a1");
        insert_issue(&conn, &sample_issue("iss-b2", "bob", Category::Water, 20)).expect("b2");
        let mut unlocated = sample_issue("iss-c3", "alice", Category::Roads, 30);
        unlocated.location = None;
        insert_issue(&conn, &unlocated).expect("c3");
        conn
    }

    #[test]
    fn list_defaults_to_newest_first() {
        let conn = seeded();
        let ids: Vec<String> = list_issues(&conn, &IssueFilter::default())
            .expect("list")
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["iss-c3", "iss-b2", "iss-a1"]);
    }

    #[test]
    fn list_filters_combine_with_and() {
        let conn = seeded();
        let filter = IssueFilter {
            category: Some(Category::Roads),
            author_id: Some("alice".into()),
            located_only: true,
            ..IssueFilter::default()
        };
        let issues = list_issues(&conn, &filter).expect("list");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].id, "iss-a1");
    }

    #[test]
    fn list_sorts_by_likes_with_pagination() {
        let conn = seeded();
        insert_like(&conn, "u1", "iss-a1", 1).expect("like");
        insert_like(&conn, "u2", "iss-a1", 2).expect("like");
        insert_like(&conn, "u1", "iss-b2", 3).expect("like");

        let filter = IssueFilter {
            sort: SortKey::Likes,
            limit: Some(2),
            ..IssueFilter::default()
        };
        let issues = list_issues(&conn, &filter).expect("list");
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].id, "iss-a1");
        assert_eq!(issues[0].like_count, 2);
        assert_eq!(issues[1].id, "iss-b2");
    }

    #[test]
    fn like_triggers_keep_counter_in_step() {
        let conn = seeded();
        assert!(insert_like(&conn, "u1", "iss-a1", 1).expect("insert"));
        assert!(!insert_like(&conn, "u1", "iss-a1", 2).expect("duplicate ignored"));
        assert_eq!(like_count(&conn, "iss-a1").expect("count"), Some(1));
        assert!(delete_like(&conn, "u1", "iss-a1").expect("delete"));
        assert!(!delete_like(&conn, "u1", "iss-a1").expect("second delete"));
        assert_eq!(like_count(&conn, "iss-a1").expect("count"), Some(0));
        assert_eq!(count_like_rows(&conn, "iss-a1").expect("rows"), 0);
    }

    #[test]
    fn view_count_cannot_decrease() {
        let conn = seeded();
        assert_eq!(increment_view_count(&conn, "iss-a1").expect("inc"), Some(1));
        assert_eq!(increment_view_count(&conn, "iss-missing").expect("inc"), None);
        let result = conn.execute(
            "UPDATE issues SET view_count = 0 WHERE issue_id = 'iss-a1'",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn resolve_issue_id_accepts_unique_prefix() {
        let conn = seeded();
        assert_eq!(
            resolve_issue_id(&conn, "a").expect("resolve"),
            Some("iss-a1".to_string())
        );
        assert_eq!(
            resolve_issue_id(&conn, "iss-b2").expect("resolve"),
            Some("iss-b2".to_string())
        );
        assert_eq!(resolve_issue_id(&conn, "zz").expect("resolve"), None);
    }

    #[test]
    fn resolve_issue_id_treats_wildcards_literally() {
        let conn = seeded();
        for raw in ["%", "_1", "iss-a_", "iss-%2"] {
            assert_eq!(resolve_issue_id(&conn, raw).expect("resolve"), None, "{raw}");
        }
        assert_eq!(
            resolve_issue_id(&conn, "c").expect("resolve"),
            Some("iss-c3".to_string())
        );
    }

    #[test]
    fn mark_all_read_only_flips_unread_rows() {
        let conn = seeded();
        let n = NewNotification {
            recipient_id: "alice".into(),
            kind: NotificationKind::Like,
            message: "bob liked your issue".into(),
            issue_id: Some("iss-a1".into()),
        };
        insert_notification(&conn, &n, 1).expect("insert");
        let second = insert_notification(&conn, &n, 2).expect("insert");

        assert_eq!(unread_count(&conn, "alice").expect("unread"), 2);
        assert_eq!(mark_all_read(&conn, "alice").expect("mark all"), 2);
        assert_eq!(mark_all_read(&conn, "alice").expect("mark again"), 0);
        assert_eq!(unread_count(&conn, "alice").expect("unread"), 0);

        let listed = list_notifications(&conn, "alice").expect("list");
        assert_eq!(listed[0].id, second.id);
        assert!(listed.iter().all(|n| n.is_read));
    }

    #[test]
    fn profile_insert_is_idempotent() {
        let conn = db::open_in_memory().expect("open store");
        assert!(insert_profile_if_absent(&conn, "alice", "alice", 1).expect("insert"));
        assert!(!insert_profile_if_absent(&conn, "alice", "other", 2).expect("insert"));
        let profile = get_profile(&conn, "alice").expect("get").expect("exists");
        assert_eq!(profile.display_name, "alice");
        assert_eq!(profile.role, Role::Citizen);

        set_gov_category(&conn, "alice", Some(Category::Water), 3).expect("set");
        let profile = get_profile(&conn, "alice").expect("get").expect("exists");
        assert_eq!(profile.gov_category, Some(Category::Water));
    }

    #[test]
    fn comments_listed_oldest_first() {
        let conn = seeded();
        insert_comment(&conn, "iss-a1", "bob", "second", 5).expect("comment");
        insert_comment(&conn, "iss-a1", "carol", "first", 4).expect("comment");
        let comments = list_comments(&conn, "iss-a1").expect("list");
        let bodies: Vec<&str> = comments.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second"]);
    }
}
