//! Browsing state and cache manager for a remote audio catalog.
//!
//! `StoreHandle` is the surface a front-end talks to: command functions that
//! move through album search results and album play lists, and query
//! functions that read the current view.  Behind it, `StoreCore` owns the
//! navigation state and serialises every change; the catalog client and the
//! response cache are shared with the fetch tasks it spawns.

pub mod action;
pub mod app;
pub mod cache;
pub mod client;
pub mod core;
pub mod download_manager;
pub mod error;
pub mod handle;
pub mod state;

pub use crate::client::{CatalogApi, HttpCatalogClient};
pub use crate::core::NavOutcome;
pub use crate::download_manager::{DownloadOutcome, DownloadStatus};
pub use crate::error::{StoreError, StoreResult};
pub use crate::handle::StoreHandle;

/// What StoreCore broadcasts after committing a change.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreBroadcast {
    /// The navigation state changed; readers should re-query.
    StateUpdated,
    /// A download started or finished.
    DownloadUpdated { track_id: i64 },
}
