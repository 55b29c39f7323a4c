use std::collections::BTreeSet;

use civic_core::db::query;
use civic_core::engagement::{ViewTracker, toggle_like};
use civic_core::model::engagement::LikeToggle;
use civic_core::model::issue::Category;
use proptest::prelude::*;

mod common;

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(64))]

    /// A relation exists iff its pair was toggled an odd number of times,
    /// and every reported count equals the number of current likers.
    #[test]
    fn toggle_parity_and_count(users in prop::collection::vec(0u8..5, 1..40)) {
        let store = common::store();
        let issue = common::seed_issue(&store, "owner", "Dim streetlight", Category::Electricity);
        let mut likers = BTreeSet::new();

        for user in users {
            let user_id = format!("user-{user}");
            let expected_liked = if likers.contains(&user_id) {
                likers.remove(&user_id);
                false
            } else {
                likers.insert(user_id.clone());
                true
            };
            let toggle = toggle_like(&store, &issue.id, &user_id).expect("toggle");
            prop_assert_eq!(toggle.liked, expected_liked);
            prop_assert_eq!(toggle.new_count, likers.len() as u64);
        }

        let stored = store.require_issue(&issue.id).expect("issue");
        prop_assert_eq!(stored.like_count, likers.len() as u64);
        let rows = query::count_like_rows(store.connection(), &issue.id).expect("rows");
        prop_assert_eq!(rows, likers.len() as u64);
        for user in 0u8..5 {
            let user_id = format!("user-{user}");
            prop_assert_eq!(
                store.has_like(&user_id, &issue.id).expect("has_like"),
                likers.contains(&user_id)
            );
        }
    }
}

#[test]
fn like_twice_returns_to_zero() {
    let store = common::store();
    let issue = common::seed_issue(&store, "owner", "Broken swing", Category::Parks);

    assert_eq!(
        toggle_like(&store, &issue.id, "a").expect("like"),
        LikeToggle { liked: true, new_count: 1 }
    );
    assert_eq!(
        toggle_like(&store, &issue.id, "a").expect("unlike"),
        LikeToggle { liked: false, new_count: 0 }
    );
}

#[test]
fn concurrent_toggles_on_one_file_serialize() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join(".civic").join("civic.db");
    let issue_id = {
        let store = civic_core::Store::open(&path, std::time::Duration::from_secs(5)).expect("open");
        common::seed_issue(&store, "owner", "Leak", Category::Water).id
    };

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let path = path.clone();
            let issue_id = issue_id.clone();
            std::thread::spawn(move || {
                let store = civic_core::Store::open(&path, std::time::Duration::from_secs(5))
                    .expect("open");
                for _ in 0..3 {
                    toggle_like(&store, &issue_id, &format!("user-{n}")).expect("toggle");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread");
    }

    // Three toggles each: every user ends liked.
    let store = civic_core::Store::open(&path, std::time::Duration::from_secs(5)).expect("open");
    let issue = store.require_issue(&issue_id).expect("issue");
    assert_eq!(issue.like_count, 4);
    assert_eq!(
        query::count_like_rows(store.connection(), &issue_id).expect("rows"),
        4
    );
}

#[test]
fn views_count_once_per_session_and_never_decrease() {
    let store = common::store();
    let issue = common::seed_issue(&store, "owner", "Pothole", Category::Roads);

    let mut first = ViewTracker::new();
    first.record_view(&store, &issue.id).expect("view");
    first.record_view(&store, &issue.id).expect("repeat");
    assert_eq!(store.require_issue(&issue.id).expect("issue").view_count, 1);

    let mut second = ViewTracker::new();
    second.record_view(&store, &issue.id).expect("other session");
    assert_eq!(store.require_issue(&issue.id).expect("issue").view_count, 2);

    let lowered = store.connection().execute(
        "UPDATE issues SET view_count = 0 WHERE issue_id = ?1",
        [&issue.id],
    );
    assert!(lowered.is_err(), "view_count must not decrease");
}
