//! StoreHandle — the interface exposed to the rendering layer.
//!
//! Commands are forwarded to the StoreCore loop and resolve once their
//! effect is committed (or rejected).  Their return values only report what
//! happened; the new view is read back through the query functions.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};

use xmly_proto::config::PagingConfig;
use xmly_proto::protocol::{AlbumInfo, TrackInfo};
use xmly_proto::state::{NavigationState, Navigator, PageMove, PageRef, Scope, ViewMode};

use crate::cache::ResponseCache;
use crate::client::CatalogApi;
use crate::core::{NavOutcome, Reply, StoreCommand, StoreCore, StoreEvent};
use crate::download_manager::{DownloadOutcome, DownloadStatus};
use crate::error::{StoreError, StoreResult};
use crate::state::StateManager;
use crate::StoreBroadcast;

#[derive(Clone)]
pub struct StoreHandle {
    event_tx: mpsc::Sender<StoreEvent>,
    broadcast_tx: broadcast::Sender<StoreBroadcast>,
    state_manager: Arc<StateManager>,
    cache: Arc<ResponseCache>,
}

impl StoreHandle {
    /// Build a StoreCore around `api` and spawn its event loop on the
    /// current tokio runtime.
    pub fn spawn(api: Arc<dyn CatalogApi>, paging: PagingConfig, downloads_dir: PathBuf) -> Self {
        let (broadcast_tx, _) = broadcast::channel(256);
        let (event_tx, event_rx) = mpsc::channel(256);
        let cache = Arc::new(ResponseCache::new());

        let core = StoreCore::new(
            api,
            Arc::clone(&cache),
            paging,
            downloads_dir,
            broadcast_tx.clone(),
            event_tx.clone(),
        );
        let state_manager = core.state_manager();
        tokio::spawn(core.run(event_rx));

        Self {
            event_tx,
            broadcast_tx,
            state_manager,
            cache,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreBroadcast> {
        self.broadcast_tx.subscribe()
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    /// Show page `page` of the albums matching `keyword`.  An empty keyword
    /// is ignored.
    pub async fn search(&self, keyword: &str, page: u32) -> StoreResult<NavOutcome> {
        self.command(StoreCommand::Search {
            keyword: keyword.to_string(),
            page,
        })
        .await
    }

    /// Show page `page` of the play list of album `album_index` on the
    /// current album page.
    pub async fn open_album(&self, album_index: usize, page: u32) -> StoreResult<NavOutcome> {
        self.command(StoreCommand::OpenAlbum { album_index, page })
            .await
    }

    pub async fn goto_first(&self) -> StoreResult<NavOutcome> {
        self.command(StoreCommand::Goto(PageMove::First)).await
    }

    pub async fn goto_prev(&self) -> StoreResult<NavOutcome> {
        self.command(StoreCommand::Goto(PageMove::Prev)).await
    }

    pub async fn goto_jump(&self, page: u32) -> StoreResult<NavOutcome> {
        self.command(StoreCommand::Goto(PageMove::Jump(page))).await
    }

    pub async fn goto_next(&self) -> StoreResult<NavOutcome> {
        self.command(StoreCommand::Goto(PageMove::Next)).await
    }

    pub async fn goto_last(&self) -> StoreResult<NavOutcome> {
        self.command(StoreCommand::Goto(PageMove::Last)).await
    }

    /// Download track `track_index` of the cached `(album_id, page)` cell.
    pub async fn download_track(
        &self,
        album_id: i64,
        page: u32,
        track_index: usize,
    ) -> StoreResult<DownloadOutcome> {
        self.request(|reply| StoreEvent::Download {
            album_id,
            page,
            track_index,
            reply,
        })
        .await
    }

    /// Download track `track_index` of the play-list page on display.
    pub async fn download_displayed(&self, track_index: usize) -> StoreResult<DownloadOutcome> {
        let state = self.snapshot().await;
        match (state.mode, state.track_page) {
            (
                ViewMode::Tracks,
                Some(PageRef {
                    scope: Scope::Tracks { album_id },
                    page,
                }),
            ) => self.download_track(album_id, page, track_index).await,
            _ => Err(StoreError::StaleSelection(
                "no play list is displayed".to_string(),
            )),
        }
    }

    /// Stop the event loop.  Later commands fail with `StoreError::Closed`.
    pub async fn shutdown(&self) {
        let _ = self.event_tx.send(StoreEvent::Shutdown).await;
    }

    async fn command(&self, cmd: StoreCommand) -> StoreResult<NavOutcome> {
        self.request(|reply| StoreEvent::Command { cmd, reply }).await
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> StoreEvent) -> StoreResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.event_tx
            .send(make(reply_tx))
            .await
            .map_err(|_| StoreError::Closed)?;
        reply_rx.await.map_err(|_| StoreError::Closed)?
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    pub async fn snapshot(&self) -> NavigationState {
        self.state_manager.get_state().await
    }

    pub async fn mode(&self) -> ViewMode {
        self.snapshot().await.mode
    }

    /// `(current page, total pages)`.
    pub async fn page_info(&self) -> (u32, u32) {
        let state = self.snapshot().await;
        (state.page_num, state.total_page)
    }

    pub async fn navigator(&self) -> Navigator {
        self.snapshot().await.navigator()
    }

    /// Albums on display; empty unless the album list is showing.
    pub async fn albums(&self) -> Vec<AlbumInfo> {
        let state = self.snapshot().await;
        if state.mode != ViewMode::Albums {
            return Vec::new();
        }
        self.album_page(&state).await.unwrap_or_default()
    }

    /// Tracks on display; empty unless a play list is showing.
    pub async fn tracks(&self) -> Vec<TrackInfo> {
        let state = self.snapshot().await;
        let Some(PageRef {
            scope: Scope::Tracks { album_id },
            page,
        }) = state.track_page
        else {
            return Vec::new();
        };
        if state.mode != ViewMode::Tracks {
            return Vec::new();
        }
        self.cache
            .track_page(album_id, page)
            .await
            .map(|result| result.tracks.clone())
            .unwrap_or_default()
    }

    /// The album whose play list is on display.
    pub async fn current_album(&self) -> Option<AlbumInfo> {
        let state = self.snapshot().await;
        if state.mode != ViewMode::Tracks {
            return None;
        }
        self.album_page(&state)
            .await
            .and_then(|albums| albums.into_iter().nth(state.album_index))
    }

    pub async fn download_status(&self, track_id: i64) -> DownloadStatus {
        self.state_manager.get_download_status(track_id).await
    }

    async fn album_page(&self, state: &NavigationState) -> Option<Vec<AlbumInfo>> {
        match &state.album_page {
            Some(PageRef {
                scope: Scope::Albums { keyword },
                page,
            }) => self
                .cache
                .album_page(keyword, *page)
                .await
                .map(|result| result.albums.clone()),
            _ => None,
        }
    }
}
