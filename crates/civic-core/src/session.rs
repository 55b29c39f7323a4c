//! Per-user session context.
//!
//! Everything that only makes sense for one signed-in user lives here:
//! the profile, the viewed-issue set, the like cache, and the inbox push
//! subscription. Switching users builds a fresh session; nothing carries
//! over, and late like responses for the old user are ignored.

use crate::engagement::{EngagementCache, ViewTracker};
use crate::error::Result;
use crate::fanout::subscribe_inbox;
use crate::feed::{LedgerEvent, Subscription};
use crate::model::notification::Notification;
use crate::model::now_us;
use crate::model::profile::Profile;
use crate::store::Store;

#[derive(Debug)]
pub struct Session {
    id: String,
    profile: Profile,
    views: ViewTracker,
    likes: EngagementCache,
    inbox: Subscription,
}

impl Session {
    /// Open a session for `user_id`, creating the profile on first use.
    ///
    /// # Errors
    ///
    /// Propagates store errors from the profile upsert.
    pub fn begin(store: &Store, user_id: &str) -> Result<Self> {
        let profile = store.get_or_create_profile(user_id)?;
        let id = session_id(user_id);
        tracing::debug!(session = %id, user = %user_id, "session started");
        Ok(Self {
            id,
            inbox: subscribe_inbox(store, user_id),
            profile,
            views: ViewTracker::new(),
            likes: EngagementCache::new(),
        })
    }

    /// Replace this session with one for `user_id`.
    ///
    /// The like cache keeps counting epochs so tokens issued before the
    /// switch are recognised as stale.
    ///
    /// # Errors
    ///
    /// Propagates store errors; the current session is kept in that case.
    pub fn switch_user(&mut self, store: &Store, user_id: &str) -> Result<()> {
        let mut next = Self::begin(store, user_id)?;
        let mut likes = std::mem::take(&mut self.likes);
        likes.reset();
        next.likes = likes;
        *self = next;
        Ok(())
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn profile(&self) -> &Profile {
        &self.profile
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.profile.user_id
    }

    pub fn set_profile(&mut self, profile: Profile) {
        if profile.user_id == self.profile.user_id {
            self.profile = profile;
        }
    }

    pub const fn views_mut(&mut self) -> &mut ViewTracker {
        &mut self.views
    }

    #[must_use]
    pub const fn views(&self) -> &ViewTracker {
        &self.views
    }

    pub const fn likes_mut(&mut self) -> &mut EngagementCache {
        &mut self.likes
    }

    #[must_use]
    pub const fn likes(&self) -> &EngagementCache {
        &self.likes
    }

    /// Notifications pushed to this user since the last call.
    pub fn drain_inbox(&self) -> Vec<Notification> {
        self.inbox
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                LedgerEvent::NotificationInserted(n) => Some(n),
                _ => None,
            })
            .collect()
    }
}

fn session_id(user_id: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(user_id.as_bytes());
    hasher.update(&now_us().to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    format!("ses-{}", &hasher.finalize().to_hex().as_str()[..12])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::notification::{NewNotification, NotificationKind};

    fn note(recipient: &str) -> NewNotification {
        NewNotification {
            recipient_id: recipient.into(),
            kind: NotificationKind::Like,
            message: "someone liked your issue".into(),
            issue_id: None,
        }
    }

    #[test]
    fn begin_creates_profile() {
        let store = Store::in_memory().expect("store");
        let session = Session::begin(&store, "nia").expect("session");
        assert_eq!(session.user_id(), "nia");
        assert!(session.id().starts_with("ses-"));
        assert!(session.views().is_empty());
    }

    #[test]
    fn inbox_only_sees_own_notifications() {
        let store = Store::in_memory().expect("store");
        let session = Session::begin(&store, "nia").expect("session");
        store.insert_notification(&note("nia")).expect("mine");
        store.insert_notification(&note("omar")).expect("theirs");

        let pushed = session.drain_inbox();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].recipient_id, "nia");
    }

    #[test]
    fn switching_user_drops_state_and_resubscribes() {
        let store = Store::in_memory().expect("store");
        let mut session = Session::begin(&store, "nia").expect("session");
        let token = session.likes_mut().begin_toggle("iss-1");

        session.switch_user(&store, "omar").expect("switch");
        assert_eq!(session.user_id(), "omar");
        assert!(session.likes().current("iss-1").is_none());
        assert!(!session.likes_mut().settle(
            token,
            &Ok(crate::model::engagement::LikeToggle {
                liked: true,
                new_count: 1
            })
        ));

        store.insert_notification(&note("nia")).expect("old user");
        store.insert_notification(&note("omar")).expect("new user");
        let pushed = session.drain_inbox();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].recipient_id, "omar");
    }
}
