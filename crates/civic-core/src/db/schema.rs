//! Canonical SQLite schema for the civic store.
//!
//! - `issues` keeps each report with its denormalized engagement counters
//! - `likes` is the (user, issue) endorsement relation; its primary key is
//!   the pair, and triggers keep `issues.like_count` equal to the row count
//! - `comments`, `notifications`, `bug_reports` are append-mostly ledgers
//! - `profiles` holds per-user display data and triage capabilities
//! - `store_meta` mirrors the schema version for diagnostics

/// Migration v1: core tables, counter triggers, and store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS issues (
    issue_id TEXT PRIMARY KEY,
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    description TEXT NOT NULL,
    category TEXT NOT NULL CHECK (category IN (
        'Roads & Potholes',
        'Waste Management',
        'Water & Sewage',
        'Electricity & Lights',
        'Public Parks',
        'Other'
    )),
    severity TEXT CHECK (severity IS NULL OR severity IN ('low', 'medium', 'high')),
    status TEXT NOT NULL DEFAULT 'Pending'
        CHECK (status IN ('Pending', 'In Progress', 'Resolved')),
    author_id TEXT NOT NULL,
    author_name TEXT NOT NULL,
    latitude REAL,
    longitude REAL,
    image_url TEXT,
    like_count INTEGER NOT NULL DEFAULT 0 CHECK (like_count >= 0),
    view_count INTEGER NOT NULL DEFAULT 0 CHECK (view_count >= 0),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK (issue_id LIKE 'iss-%'),
    CHECK ((latitude IS NULL) = (longitude IS NULL))
);

CREATE TABLE IF NOT EXISTS profiles (
    user_id TEXT PRIMARY KEY CHECK (length(trim(user_id)) > 0),
    display_name TEXT NOT NULL,
    avatar_url TEXT,
    gov_category TEXT,
    role TEXT NOT NULL DEFAULT 'citizen' CHECK (role IN ('citizen', 'admin')),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS likes (
    user_id TEXT NOT NULL,
    issue_id TEXT NOT NULL REFERENCES issues(issue_id) ON DELETE CASCADE,
    created_at_us INTEGER NOT NULL,
    PRIMARY KEY (user_id, issue_id)
);

CREATE TABLE IF NOT EXISTS comments (
    comment_id INTEGER PRIMARY KEY AUTOINCREMENT,
    issue_id TEXT NOT NULL REFERENCES issues(issue_id) ON DELETE CASCADE,
    author_id TEXT NOT NULL,
    content TEXT NOT NULL CHECK (length(trim(content)) > 0),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    notification_id INTEGER PRIMARY KEY AUTOINCREMENT,
    recipient_id TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('like', 'comment', 'status')),
    message TEXT NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0 CHECK (is_read IN (0, 1)),
    issue_id TEXT REFERENCES issues(issue_id) ON DELETE SET NULL,
    created_at_us INTEGER NOT NULL
);

CREATE TRIGGER IF NOT EXISTS likes_ai
AFTER INSERT ON likes
BEGIN
    UPDATE issues SET like_count = like_count + 1 WHERE issue_id = new.issue_id;
END;

CREATE TRIGGER IF NOT EXISTS likes_ad
AFTER DELETE ON likes
BEGIN
    UPDATE issues SET like_count = like_count - 1 WHERE issue_id = old.issue_id;
END;

CREATE TRIGGER IF NOT EXISTS issues_view_count_monotonic
BEFORE UPDATE OF view_count ON issues
WHEN new.view_count < old.view_count
BEGIN
    SELECT RAISE(ABORT, 'view_count must not decrease');
END;

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    created_at_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO store_meta (id, schema_version, created_at_us) VALUES (1, 1, 0);
";

/// Migration v2: feed/inbox indexes and the bug report ledger.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_issues_created
    ON issues(created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_issues_category_created
    ON issues(category, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_issues_author
    ON issues(author_id, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_issues_like_count
    ON issues(like_count DESC);

CREATE INDEX IF NOT EXISTS idx_issues_view_count
    ON issues(view_count DESC);

CREATE INDEX IF NOT EXISTS idx_likes_issue
    ON likes(issue_id);

CREATE INDEX IF NOT EXISTS idx_comments_issue_created
    ON comments(issue_id, created_at_us);

CREATE INDEX IF NOT EXISTS idx_notifications_recipient_read
    ON notifications(recipient_id, is_read, created_at_us DESC);

CREATE TABLE IF NOT EXISTS bug_reports (
    bug_report_id INTEGER PRIMARY KEY AUTOINCREMENT,
    reporter_id TEXT NOT NULL,
    description TEXT NOT NULL CHECK (length(trim(description)) > 0),
    created_at_us INTEGER NOT NULL
);

UPDATE store_meta
SET schema_version = 2
WHERE id = 1;
";

/// Indexes expected by feed, dashboard, and inbox query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_issues_created",
    "idx_issues_category_created",
    "idx_issues_author",
    "idx_issues_like_count",
    "idx_issues_view_count",
    "idx_likes_issue",
    "idx_comments_issue_created",
    "idx_notifications_recipient_read",
];
