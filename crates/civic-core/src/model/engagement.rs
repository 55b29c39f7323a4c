use serde::{Deserialize, Serialize};

/// A (user, issue) endorsement. At most one exists per pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Like {
    pub user_id: String,
    pub issue_id: String,
    pub created_at_us: i64,
}

/// Outcome of a like toggle, as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeToggle {
    pub liked: bool,
    pub new_count: u64,
}

/// An append-only comment on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub issue_id: String,
    pub author_id: String,
    pub content: String,
    pub created_at_us: i64,
}

/// A free-text problem report about the application itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugReport {
    pub id: i64,
    pub reporter_id: String,
    pub description: String,
    pub created_at_us: i64,
}
