//! Application facade: one store, one session, one fan-out.
//!
//! Each mutating call runs the owning engine and then pumps the fan-out so
//! the notifications it implies are written before the call returns.

use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::classify::{DisabledClassifier, HttpClassifier, SeverityClassifier, assess_severity};
use crate::config::{self, ProjectConfig};
use crate::engagement::{self, LikeSnapshot};
use crate::error::{CivicError, ErrorCode, Result};
use crate::fanout::{FanOut, Scope};
use crate::lifecycle::{self, Transition};
use crate::model::engagement::{BugReport, Comment, LikeToggle};
use crate::model::issue::{Category, Issue, NewIssue};
use crate::model::notification::Notification;
use crate::model::profile::{Profile, Role};
use crate::session::Session;
use crate::store::{IssueFilter, Store};
use crate::validate;

/// Issue detail as shown on its own page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueDetail {
    pub issue: Issue,
    pub comments: Vec<Comment>,
    /// Whether the session user currently likes the issue.
    pub liked: bool,
    /// True when this call counted a new view.
    pub view_counted: bool,
}

pub struct Civic {
    store: Store,
    config: ProjectConfig,
    classifier: Box<dyn SeverityClassifier>,
    fanout: FanOut,
    session: Session,
}

impl std::fmt::Debug for Civic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Civic")
            .field("store", &self.store)
            .field("session", &self.session.id())
            .field("user", &self.session.user_id())
            .finish_non_exhaustive()
    }
}

/// Classifier selected by `[classifier]`.
#[must_use]
pub fn classifier_from_config(config: &ProjectConfig) -> Box<dyn SeverityClassifier> {
    if config.classifier.enabled {
        Box::new(HttpClassifier::new(
            &config.classifier.base_url,
            config.classifier.timeout(),
        ))
    } else {
        Box::new(DisabledClassifier)
    }
}

impl Civic {
    /// Open the project under `project_root` acting as `user_id`.
    ///
    /// # Errors
    ///
    /// Fails if the project was never initialized, the config is invalid,
    /// or the store cannot be opened.
    pub fn open(project_root: &Path, user_id: &str) -> anyhow::Result<Self> {
        let db_path = config::db_path(project_root);
        if !db_path.exists() {
            return Err(CivicError::validation(
                ErrorCode::NotInitialized,
                format!("no civic store at {}", db_path.display()),
            )
            .into());
        }
        let project = config::load_project_config(project_root)?;
        let store = Store::open(&db_path, project.store.busy_timeout())
            .with_context(|| format!("open {}", db_path.display()))?;
        let classifier = classifier_from_config(&project);
        Ok(Self::with_parts(store, project, classifier, user_id)?)
    }

    /// Assemble from explicit parts.
    ///
    /// The fan-out index is loaded before its subscription opens.
    ///
    /// # Errors
    ///
    /// Propagates store errors from the index load or profile upsert.
    pub fn with_parts(
        store: Store,
        config: ProjectConfig,
        classifier: Box<dyn SeverityClassifier>,
        user_id: &str,
    ) -> Result<Self> {
        if user_id.trim().is_empty() {
            return Err(CivicError::missing_field("user"));
        }
        let fanout = FanOut::start(&store, Scope::Everyone)?;
        let session = Session::begin(&store, user_id)?;
        Ok(Self {
            store,
            config,
            classifier,
            fanout,
            session,
        })
    }

    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &ProjectConfig {
        &self.config
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub const fn profile(&self) -> &Profile {
        self.session.profile()
    }

    /// Switch the acting user: new session, reloaded fan-out.
    ///
    /// # Errors
    ///
    /// Propagates store errors; on failure the old user stays active.
    pub fn switch_user(&mut self, user_id: &str) -> Result<()> {
        self.session.switch_user(&self.store, user_id)?;
        self.fanout.reinitialize(&self.store, Scope::Everyone)?;
        Ok(())
    }

    /// Resolve a full or abbreviated issue id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the id matches no single issue.
    pub fn resolve_issue_id(&self, raw: &str) -> Result<String> {
        self.store.resolve_issue_id(raw)
    }

    fn pump(&mut self) {
        if let Err(err) = self.fanout.pump(&self.store) {
            tracing::warn!(error = %err, "notification fan-out incomplete");
        }
    }

    // -- issues -------------------------------------------------------------

    /// Validate, classify (best effort), and store a new report.
    ///
    /// # Errors
    ///
    /// Validation errors before any store call; store errors on insert.
    pub fn report_issue(&mut self, input: NewIssue) -> Result<Issue> {
        let mut draft = validate::validate_new_issue(input)?;
        let text = format!("{}. {}", draft.title, draft.description);
        draft.severity = Some(assess_severity(
            self.classifier.as_ref(),
            &text,
            draft.image_url.as_deref(),
        ));
        let issue = self.store.insert_issue(self.session.profile(), draft)?;
        tracing::info!(
            issue_id = %issue.id,
            category = %issue.category,
            severity = ?issue.severity,
            "issue reported"
        );
        self.pump();
        Ok(issue)
    }

    /// Sorted, filtered issue list. A missing limit uses `feed.page_size`.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn feed(&self, filter: &IssueFilter) -> Result<Vec<Issue>> {
        let mut filter = filter.clone();
        if filter.limit.is_none() {
            filter.limit = Some(self.config.feed.page_size);
        }
        self.store.list_issues(&filter)
    }

    /// The session user's own reports, newest first.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn my_issues(&self) -> Result<Vec<Issue>> {
        self.store.list_issues(&IssueFilter {
            author_id: Some(self.session.user_id().to_string()),
            ..IssueFilter::default()
        })
    }

    /// Issue detail with comments; counts a view once per session.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or a store error.
    pub fn view_issue(&mut self, issue_id: &str) -> Result<IssueDetail> {
        let counted = self
            .session
            .views_mut()
            .record_view(&self.store, issue_id)?;
        let issue = self.store.require_issue(issue_id)?;
        let comments = self.store.list_comments(issue_id)?;
        let liked = self.store.has_like(self.session.user_id(), issue_id)?;
        self.session.likes_mut().seed(
            issue_id,
            LikeSnapshot {
                liked,
                count: issue.like_count,
            },
        );
        Ok(IssueDetail {
            issue,
            comments,
            liked,
            view_counted: counted.is_some(),
        })
    }

    // -- lifecycle ----------------------------------------------------------

    /// # Errors
    ///
    /// See [`lifecycle::transition_status`].
    pub fn transition_status(&mut self, issue_id: &str, requested: &str) -> Result<Transition> {
        let transition = lifecycle::transition_status(
            &self.store,
            issue_id,
            requested,
            self.session.profile(),
            self.config.lifecycle.policy(),
        )?;
        self.pump();
        Ok(transition)
    }

    // -- engagement ---------------------------------------------------------

    /// # Errors
    ///
    /// Returns `NotFound` or a store error; nothing changes on failure.
    pub fn toggle_like(&mut self, issue_id: &str) -> Result<LikeToggle> {
        let user = self.session.user_id().to_string();
        let outcome =
            engagement::toggle_like_cached(&self.store, self.session.likes_mut(), issue_id, &user)?;
        self.pump();
        Ok(outcome)
    }

    /// # Errors
    ///
    /// Validation errors before any store call; `NotFound` or store errors.
    pub fn comment(&mut self, issue_id: &str, content: &str) -> Result<Comment> {
        validate::validate_comment(content)?;
        let comment = self
            .store
            .insert_comment(issue_id, self.session.user_id(), content)?;
        self.pump();
        Ok(comment)
    }

    /// # Errors
    ///
    /// Returns `NotFound` or a store error.
    pub fn comments(&self, issue_id: &str) -> Result<Vec<Comment>> {
        self.store.require_issue(issue_id)?;
        self.store.list_comments(issue_id)
    }

    // -- notifications ------------------------------------------------------

    /// Open the inbox: list, then mark everything read.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn open_inbox(&mut self) -> Result<Vec<Notification>> {
        let listed = self.store.open_inbox(self.session.user_id())?;
        // Everything pushed so far is in `listed`.
        let superseded = self.session.drain_inbox().len();
        tracing::debug!(superseded, "cleared pushed notifications");
        Ok(listed)
    }

    /// Notifications pushed to the acting user since the last call, oldest
    /// first. Only rows written through this process's store arrive here;
    /// [`Civic::open_inbox`] is the full listing.
    #[must_use]
    pub fn take_pushed(&self) -> Vec<Notification> {
        self.session.drain_inbox()
    }

    /// # Errors
    ///
    /// Propagates store errors.
    pub fn unread_count(&self) -> Result<u64> {
        self.store.unread_count(self.session.user_id())
    }

    // -- profiles -----------------------------------------------------------

    /// # Errors
    ///
    /// Validation errors for a bad name; store errors.
    pub fn update_profile(&mut self, display_name: Option<&str>, avatar_url: Option<&str>) -> Result<Profile> {
        if let Some(name) = display_name {
            validate::validate_display_name(name)?;
        }
        let updated = self
            .store
            .update_profile(self.session.user_id(), display_name, avatar_url)?;
        self.session.set_profile(updated.clone());
        Ok(updated)
    }

    fn require_admin(&self, action: &str) -> Result<()> {
        if self.session.profile().is_admin() {
            Ok(())
        } else {
            Err(CivicError::Authorization {
                user: self.session.user_id().to_string(),
                action: action.to_string(),
            })
        }
    }

    /// Admin only.
    ///
    /// # Errors
    ///
    /// `Authorization` for non-admins; store errors.
    pub fn grant_role(&mut self, user_id: &str, role: Role) -> Result<Profile> {
        self.require_admin("change roles")?;
        let profile = self.store.set_role(user_id, role)?;
        tracing::info!(target_user = %user_id, %role, by = %self.session.user_id(), "role changed");
        self.session.set_profile(profile.clone());
        Ok(profile)
    }

    /// Admin only. `None` clears the assignment.
    ///
    /// # Errors
    ///
    /// `Authorization` for non-admins; store errors.
    pub fn set_gov_category(&mut self, user_id: &str, category: Option<Category>) -> Result<Profile> {
        self.require_admin("assign government categories")?;
        let profile = self.store.set_gov_category(user_id, category)?;
        tracing::info!(
            target_user = %user_id,
            category = category.map_or("none", Category::as_str),
            by = %self.session.user_id(),
            "government category changed"
        );
        self.session.set_profile(profile.clone());
        Ok(profile)
    }

    // -- bug reports --------------------------------------------------------

    /// # Errors
    ///
    /// Validation or store errors.
    pub fn report_bug(&self, description: &str) -> Result<BugReport> {
        validate::validate_bug_report(description)?;
        self.store
            .insert_bug_report(self.session.user_id(), description.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::issue::{GeoPoint, Severity, Status};
    use crate::model::notification::{NewNotification, NotificationKind};

    fn civic(user: &str) -> Civic {
        let store = Store::in_memory().expect("store");
        Civic::with_parts(store, ProjectConfig::default(), Box::new(DisabledClassifier), user)
            .expect("civic")
    }

    fn report(title: &str) -> NewIssue {
        NewIssue {
            title: title.into(),
            description: "Needs attention".into(),
            category: Some(Category::Roads),
            location: Some(GeoPoint {
                latitude: 18.52,
                longitude: 73.85,
            }),
            image_url: None,
        }
    }

    #[test]
    fn report_without_classifier_gets_low_severity() {
        let mut app = civic("asha");
        let issue = app.report_issue(report("Crater")).expect("report");
        assert_eq!(issue.severity, Some(Severity::Low));
        assert_eq!(issue.status, Status::Pending);
    }

    #[test]
    fn blank_user_is_rejected() {
        let store = Store::in_memory().expect("store");
        let err = Civic::with_parts(store, ProjectConfig::default(), Box::new(DisabledClassifier), " ")
            .expect_err("blank user");
        assert_eq!(err.code(), ErrorCode::MissingField);
    }

    #[test]
    fn like_from_another_user_reaches_owner_inbox() {
        let mut app = civic("asha");
        let issue = app.report_issue(report("Crater")).expect("report");

        app.switch_user("ravi").expect("switch");
        app.toggle_like(&issue.id).expect("like");

        app.switch_user("asha").expect("switch back");
        assert_eq!(app.unread_count().expect("unread"), 1);
        let inbox = app.open_inbox().expect("inbox");
        assert_eq!(inbox[0].message, "ravi liked your issue \"Crater\"");
        assert_eq!(app.unread_count().expect("unread"), 0);
    }

    #[test]
    fn pushed_notifications_reach_only_the_acting_user() {
        let app = civic("asha");
        for recipient in ["asha", "ravi"] {
            app.store()
                .insert_notification(&NewNotification {
                    recipient_id: recipient.into(),
                    kind: NotificationKind::Comment,
                    message: format!("note for {recipient}"),
                    issue_id: None,
                })
                .expect("notify");
        }

        let pushed = app.take_pushed();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].message, "note for asha");
        assert!(app.take_pushed().is_empty());
    }

    #[test]
    fn opening_the_inbox_clears_pending_pushes() {
        let mut app = civic("asha");
        let issue = app.report_issue(report("Crater")).expect("report");
        app.switch_user("ravi").expect("switch");
        app.comment(&issue.id, "Still there").expect("comment");
        app.switch_user("asha").expect("switch back");

        app.store()
            .insert_notification(&NewNotification {
                recipient_id: "asha".into(),
                kind: NotificationKind::Status,
                message: "Your issue \"Crater\" is now In Progress".into(),
                issue_id: Some(issue.id.clone()),
            })
            .expect("notify");
        assert_eq!(app.open_inbox().expect("inbox").len(), 2);
        assert!(app.take_pushed().is_empty());
    }

    #[test]
    fn view_counts_once_per_session() {
        let mut app = civic("asha");
        let issue = app.report_issue(report("Crater")).expect("report");
        assert!(app.view_issue(&issue.id).expect("view").view_counted);
        let second = app.view_issue(&issue.id).expect("view again");
        assert!(!second.view_counted);
        assert_eq!(second.issue.view_count, 1);
    }

    #[test]
    fn non_admin_cannot_assign_categories() {
        let mut app = civic("asha");
        let err = app
            .set_gov_category("ravi", Some(Category::Water))
            .expect_err("not admin");
        assert_eq!(err.code(), ErrorCode::NotAuthorized);
    }

    #[test]
    fn admin_assigns_official_who_then_triages() {
        let mut app = civic("root");
        app.store().set_role("root", Role::Admin).expect("bootstrap");
        app.switch_user("root").expect("refresh");
        app.set_gov_category("pwd", Some(Category::Roads)).expect("assign");

        app.switch_user("asha").expect("citizen");
        let issue = app.report_issue(report("Crater")).expect("report");

        app.switch_user("pwd").expect("official");
        let t = app.transition_status(&issue.id, "in-progress").expect("triage");
        assert!(t.changed);

        app.switch_user("asha").expect("author");
        let inbox = app.open_inbox().expect("inbox");
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].message, "Your issue \"Crater\" is now In Progress");
    }

    #[test]
    fn bug_reports_are_stored_trimmed() {
        let app = civic("asha");
        let bug = app.report_bug("  map does not load \n").expect("bug");
        assert_eq!(bug.description, "map does not load");
        assert!(app.report_bug("   ").is_err());
    }
}
