//! civic-core library.
//!
//! Issue lifecycle, like/view reconciliation, and notification fan-out
//! over an embedded `SQLite` store.
//!
//! # Conventions
//!
//! - **Errors**: engine operations return [`error::Result`]; loading and
//!   opening use `anyhow::Result`.
//! - **Logging**: `tracing` macros only; the binary installs the subscriber.

pub mod classify;
pub mod config;
pub mod db;
pub mod engagement;
pub mod error;
pub mod fanout;
pub mod feed;
pub mod lifecycle;
pub mod model;
pub mod service;
pub mod session;
pub mod store;
pub mod validate;

pub use error::{CivicError, ErrorCode};
pub use service::Civic;
pub use store::Store;
