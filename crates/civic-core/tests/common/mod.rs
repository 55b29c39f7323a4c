//! Shared fixtures for integration tests.
#![allow(dead_code)]

use civic_core::Store;
use civic_core::model::issue::{Category, GeoPoint, Issue};
use civic_core::store::IssueDraft;

pub fn store() -> Store {
    Store::in_memory().expect("in-memory store")
}

pub fn draft(title: &str, category: Category) -> IssueDraft {
    IssueDraft {
        title: title.to_string(),
        description: format!("{title} reported near the bus stop"),
        category,
        location: GeoPoint {
            latitude: 22.57,
            longitude: 88.36,
        },
        image_url: None,
        severity: None,
    }
}

pub fn seed_issue(store: &Store, author: &str, title: &str, category: Category) -> Issue {
    let profile = store.get_or_create_profile(author).expect("author profile");
    store
        .insert_issue(&profile, draft(title, category))
        .expect("insert issue")
}
