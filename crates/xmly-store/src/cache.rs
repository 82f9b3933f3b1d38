//! Response cache: one uniform map from `(scope, page)` to a fetched page.
//!
//! Cells are written at most once and never evicted; they live for the
//! process lifetime.  The lock is never held across a fetch, so two callers
//! missing the same cell may both fetch; the first insert wins and the later
//! one is dropped.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use xmly_proto::protocol::{QueryPlayListResult, SearchAlbumResult};
use xmly_proto::state::PageRef;

use crate::error::StoreResult;

#[derive(Debug, Clone)]
pub enum CachedPage {
    Albums(Arc<SearchAlbumResult>),
    Tracks(Arc<QueryPlayListResult>),
}

/// A page type that can live in a cache cell.
pub trait PageData: Sized {
    fn into_cell(page: Arc<Self>) -> CachedPage;
    fn from_cell(cell: &CachedPage) -> Option<Arc<Self>>;
}

impl PageData for SearchAlbumResult {
    fn into_cell(page: Arc<Self>) -> CachedPage {
        CachedPage::Albums(page)
    }

    fn from_cell(cell: &CachedPage) -> Option<Arc<Self>> {
        match cell {
            CachedPage::Albums(page) => Some(Arc::clone(page)),
            CachedPage::Tracks(_) => None,
        }
    }
}

impl PageData for QueryPlayListResult {
    fn into_cell(page: Arc<Self>) -> CachedPage {
        CachedPage::Tracks(page)
    }

    fn from_cell(cell: &CachedPage) -> Option<Arc<Self>> {
        match cell {
            CachedPage::Tracks(page) => Some(Arc::clone(page)),
            CachedPage::Albums(_) => None,
        }
    }
}

#[derive(Default)]
pub struct ResponseCache {
    cells: RwLock<HashMap<PageRef, CachedPage>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn album_page(&self, keyword: &str, page: u32) -> Option<Arc<SearchAlbumResult>> {
        self.lookup(&PageRef::albums(keyword, page)).await
    }

    pub async fn track_page(&self, album_id: i64, page: u32) -> Option<Arc<QueryPlayListResult>> {
        self.lookup(&PageRef::tracks(album_id, page)).await
    }

    async fn lookup<T: PageData>(&self, key: &PageRef) -> Option<Arc<T>> {
        self.cells.read().await.get(key).and_then(T::from_cell)
    }

    pub async fn len(&self) -> usize {
        self.cells.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Cached album page for `(keyword, page)`, fetching it on a miss.
    /// A failed fetch caches nothing.
    pub async fn get_or_fetch_album_page<F, Fut>(
        &self,
        keyword: &str,
        page: u32,
        fetch: F,
    ) -> StoreResult<Arc<SearchAlbumResult>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StoreResult<SearchAlbumResult>>,
    {
        if let Some(hit) = self.album_page(keyword, page).await {
            debug!("cache hit: albums {:?} page {}", keyword, page);
            return Ok(hit);
        }
        debug!("cache miss: albums {:?} page {}", keyword, page);

        let fetched = Arc::new(fetch().await?);
        Ok(self.insert(PageRef::albums(keyword, page), fetched).await)
    }

    /// Cached play-list page for `(album_id, page)`, fetching it on a miss.
    pub async fn get_or_fetch_track_page<F, Fut>(
        &self,
        album_id: i64,
        page: u32,
        fetch: F,
    ) -> StoreResult<Arc<QueryPlayListResult>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StoreResult<QueryPlayListResult>>,
    {
        if let Some(hit) = self.track_page(album_id, page).await {
            debug!("cache hit: album {} page {}", album_id, page);
            return Ok(hit);
        }
        debug!("cache miss: album {} page {}", album_id, page);

        let fetched = Arc::new(fetch().await?);
        Ok(self.insert(PageRef::tracks(album_id, page), fetched).await)
    }

    /// Insert-if-absent; returns whatever the cell holds afterwards.  The
    /// key's scope fixes the cell type, so `page` is only handed back if the
    /// cell somehow holds the other kind.
    async fn insert<T: PageData>(&self, key: PageRef, page: Arc<T>) -> Arc<T> {
        let mut cells = self.cells.write().await;
        let cell = cells
            .entry(key)
            .or_insert_with(|| T::into_cell(Arc::clone(&page)));
        T::from_cell(cell).unwrap_or(page)
    }
}
