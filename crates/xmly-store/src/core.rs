/// StoreCore — single-owner event loop for the browsing state.
///
/// Every navigation command, every fetch completion and every download
/// completion arrives as a `StoreEvent` on one channel.  StoreCore owns the
/// `NavigationState` exclusively; nothing else mutates it.  Slow work
/// (catalog fetches, downloads) runs in spawned tasks that post their
/// results back into the loop.
///
/// Each issued navigation fetch carries the state revision it was issued
/// against.  A completion is committed only if nothing was committed since
/// and no newer fetch is still in flight; otherwise the user has moved on and
/// the result is dropped.  A fetch that fails releases its claim, so an older
/// one still in flight can land.  Cache population is not affected by any of
/// this, so a superseded fetch still warms the cache.
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use xmly_proto::config::PagingConfig;
use xmly_proto::protocol::{AlbumInfo, QueryPlayListResult, SearchAlbumResult, TrackInfo};
use xmly_proto::state::{total_pages, NavigationState, PageMove, PageRef, Scope, ViewMode};

use crate::cache::ResponseCache;
use crate::client::CatalogApi;
use crate::download_manager::{self, DownloadManager, DownloadOutcome};
use crate::error::{StoreError, StoreResult};
use crate::state::StateManager;
use crate::StoreBroadcast;

pub type Reply<T> = oneshot::Sender<StoreResult<T>>;

// ── Commands ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum StoreCommand {
    Search { keyword: String, page: u32 },
    OpenAlbum { album_index: usize, page: u32 },
    Goto(PageMove),
}

/// What happened to a navigation command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    /// The result is now on display.
    Applied,
    /// A newer command was issued before this one completed; nothing changed.
    Superseded,
    /// Nothing to do (empty keyword).
    Ignored,
}

// ── StoreEvent ────────────────────────────────────────────────────────────────

/// All inputs into the StoreCore loop.
#[derive(Debug)]
pub enum StoreEvent {
    /// A navigation command from the front-end.
    Command {
        cmd: StoreCommand,
        reply: Reply<NavOutcome>,
    },
    /// A page fetch (or cache hit) finished.
    PageLoaded {
        ticket: Ticket,
        result: StoreResult<Loaded>,
        reply: Reply<NavOutcome>,
    },
    /// Download track `track_index` of the cached `(album_id, page)` cell.
    Download {
        album_id: i64,
        page: u32,
        track_index: usize,
        reply: Reply<DownloadOutcome>,
    },
    DownloadFinished {
        track_id: i64,
        result: StoreResult<DownloadOutcome>,
        reply: Reply<DownloadOutcome>,
    },
    Shutdown,
}

/// Context a fetch was issued under.
#[derive(Debug, Clone)]
pub struct Ticket {
    generation: u64,
    /// `NavigationState::rev` when the fetch was issued.
    rev: u64,
    key: PageRef,
}

/// A fetched page plus what is needed to put it on display.
#[derive(Debug)]
pub enum Loaded {
    Albums {
        keyword: String,
        result: Arc<SearchAlbumResult>,
    },
    Tracks {
        album_index: usize,
        tracks_count: u32,
        result: Arc<QueryPlayListResult>,
    },
}

// ── StoreCore ─────────────────────────────────────────────────────────────────

pub struct StoreCore {
    api: Arc<dyn CatalogApi>,
    cache: Arc<ResponseCache>,
    state_manager: Arc<StateManager>,
    downloads: DownloadManager,
    paging: PagingConfig,
    nav: NavigationState,
    /// Generation of the most recently issued navigation fetch.
    generation: u64,
    /// Generations issued but not yet completed.
    in_flight: BTreeSet<u64>,
    event_tx: mpsc::Sender<StoreEvent>,
    broadcast_tx: broadcast::Sender<StoreBroadcast>,
}

impl StoreCore {
    pub fn new(
        api: Arc<dyn CatalogApi>,
        cache: Arc<ResponseCache>,
        paging: PagingConfig,
        downloads_dir: PathBuf,
        broadcast_tx: broadcast::Sender<StoreBroadcast>,
        event_tx: mpsc::Sender<StoreEvent>,
    ) -> Self {
        Self {
            api,
            cache,
            state_manager: Arc::new(StateManager::new()),
            downloads: DownloadManager::new(downloads_dir),
            paging,
            nav: NavigationState::default(),
            generation: 0,
            in_flight: BTreeSet::new(),
            event_tx,
            broadcast_tx,
        }
    }

    pub fn state_manager(&self) -> Arc<StateManager> {
        Arc::clone(&self.state_manager)
    }

    /// Run the event loop until `Shutdown` or until every sender is gone.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<StoreEvent>) {
        info!("StoreCore: starting event loop");

        while let Some(evt) = event_rx.recv().await {
            match evt {
                StoreEvent::Shutdown => {
                    info!("StoreCore: shutdown requested");
                    break;
                }

                StoreEvent::Command { cmd, reply } => {
                    info!("StoreCore: command {:?}", cmd);
                    if let Err(e) = self.handle_command(cmd, reply).await {
                        warn!("StoreCore: command rejected: {}", e);
                    }
                }

                StoreEvent::PageLoaded {
                    ticket,
                    result,
                    reply,
                } => {
                    self.handle_page_loaded(ticket, result, reply).await;
                }

                StoreEvent::Download {
                    album_id,
                    page,
                    track_index,
                    reply,
                } => {
                    self.handle_download(album_id, page, track_index, reply).await;
                }

                StoreEvent::DownloadFinished {
                    track_id,
                    result,
                    reply,
                } => {
                    self.downloads.finish(track_id, &result);
                    self.state_manager
                        .publish_downloads(self.downloads.statuses())
                        .await;
                    let _ = self
                        .broadcast_tx
                        .send(StoreBroadcast::DownloadUpdated { track_id });
                    let _ = reply.send(result);
                }
            }
        }

        info!("StoreCore: event loop stopped");
    }

    // ── Navigation ────────────────────────────────────────────────────────────

    /// Validate a command and issue its fetch.  Rejections are answered on
    /// `reply` and also returned for logging.
    async fn handle_command(
        &mut self,
        cmd: StoreCommand,
        reply: Reply<NavOutcome>,
    ) -> Result<(), String> {
        let issued = match cmd {
            StoreCommand::Search { keyword, page } => self.search(keyword, page),
            StoreCommand::OpenAlbum { album_index, page } => {
                self.open_album(album_index, page).await
            }
            StoreCommand::Goto(mv) => self.goto(mv).await,
        };

        match issued {
            Ok(Some((ticket, fetch))) => {
                self.spawn_fetch(ticket, fetch, reply);
                Ok(())
            }
            Ok(None) => {
                let _ = reply.send(Ok(NavOutcome::Ignored));
                Ok(())
            }
            Err(e) => {
                let msg = e.to_string();
                let _ = reply.send(Err(e));
                Err(msg)
            }
        }
    }

    fn search(&mut self, keyword: String, page: u32) -> StoreResult<Option<(Ticket, Fetch)>> {
        if keyword.is_empty() {
            return Ok(None);
        }
        if page == 0 {
            return Err(StoreError::InvalidPage {
                page,
                total: self.nav.total_page,
            });
        }

        let ticket = self.next_ticket(PageRef::albums(keyword.clone(), page));
        Ok(Some((ticket, Fetch::Albums { keyword, page })))
    }

    async fn open_album(
        &mut self,
        album_index: usize,
        page: u32,
    ) -> StoreResult<Option<(Ticket, Fetch)>> {
        let album = self.displayed_album(album_index).await?;
        let total = total_pages(album.tracks_count, self.paging.track_page_size);
        if page == 0 || (total > 0 && page > total) {
            return Err(StoreError::InvalidPage { page, total });
        }

        let ticket = self.next_ticket(PageRef::tracks(album.id, page));
        Ok(Some((
            ticket,
            Fetch::Tracks {
                album_index,
                album,
                page,
            },
        )))
    }

    async fn goto(&mut self, mv: PageMove) -> StoreResult<Option<(Ticket, Fetch)>> {
        let page = self.nav.target_page(mv);
        if !self.nav.page_in_range(page) {
            return Err(StoreError::InvalidPage {
                page,
                total: self.nav.total_page,
            });
        }

        match self.nav.mode {
            ViewMode::Albums => self.search(self.nav.keyword.clone(), page),
            ViewMode::Tracks => self.open_album(self.nav.album_index, page).await,
            ViewMode::Empty => Err(StoreError::InvalidPage { page, total: 0 }),
        }
    }

    fn next_ticket(&mut self, key: PageRef) -> Ticket {
        self.generation += 1;
        self.in_flight.insert(self.generation);
        Ticket {
            generation: self.generation,
            rev: self.nav.rev,
            key,
        }
    }

    /// True if the state moved on since `ticket` was issued, or a newer
    /// fetch is still outstanding and will decide what is shown.
    fn is_stale(&self, ticket: &Ticket) -> bool {
        ticket.rev != self.nav.rev
            || self
                .in_flight
                .range(ticket.generation + 1..)
                .next()
                .is_some()
    }

    fn spawn_fetch(&self, ticket: Ticket, fetch: Fetch, reply: Reply<NavOutcome>) {
        let api = Arc::clone(&self.api);
        let cache = Arc::clone(&self.cache);
        let paging = self.paging;
        let event_tx = self.event_tx.clone();

        debug!("StoreCore: issuing {:?} (gen {})", ticket.key, ticket.generation);
        tokio::spawn(async move {
            let result = fetch.run(api.as_ref(), &cache, paging).await;
            let evt = StoreEvent::PageLoaded {
                ticket,
                result,
                reply,
            };
            if event_tx.send(evt).await.is_err() {
                debug!("StoreCore gone before fetch completed");
            }
        });
    }

    async fn handle_page_loaded(
        &mut self,
        ticket: Ticket,
        result: StoreResult<Loaded>,
        reply: Reply<NavOutcome>,
    ) {
        self.in_flight.remove(&ticket.generation);

        let loaded = match result {
            Ok(loaded) => loaded,
            Err(e) => {
                error!("StoreCore: fetch of {:?} failed: {}", ticket.key, e);
                let _ = reply.send(Err(e));
                return;
            }
        };

        if self.is_stale(&ticket) {
            info!(
                "StoreCore: discarding stale {:?} (gen {}, rev {}, current rev {})",
                ticket.key, ticket.generation, ticket.rev, self.nav.rev
            );
            let _ = reply.send(Ok(NavOutcome::Superseded));
            return;
        }

        match loaded {
            Loaded::Albums { keyword, result } => {
                self.nav
                    .commit_albums(keyword, ticket.key, result.page_num, result.total_page);
            }
            Loaded::Tracks {
                album_index,
                tracks_count,
                result,
            } => {
                let total = total_pages(tracks_count, self.paging.track_page_size);
                self.nav
                    .commit_tracks(album_index, ticket.key, result.page_num, total);
            }
        }

        self.state_manager.publish(&self.nav).await;
        let _ = self.broadcast_tx.send(StoreBroadcast::StateUpdated);
        let _ = reply.send(Ok(NavOutcome::Applied));
    }

    /// Album `index` of the album page currently referenced by the state.
    async fn displayed_album(&self, index: usize) -> StoreResult<AlbumInfo> {
        let Some(PageRef {
            scope: Scope::Albums { keyword },
            page,
        }) = &self.nav.album_page
        else {
            return Err(StoreError::StaleSelection(
                "no album list is displayed".to_string(),
            ));
        };

        let albums = self
            .cache
            .album_page(keyword, *page)
            .await
            .ok_or_else(|| StoreError::StaleSelection(format!("album page {} is gone", page)))?;

        albums.albums.get(index).cloned().ok_or_else(|| {
            StoreError::StaleSelection(format!(
                "album index {} is not on the current page ({} albums)",
                index,
                albums.albums.len()
            ))
        })
    }

    // ── Downloads ─────────────────────────────────────────────────────────────

    async fn handle_download(
        &mut self,
        album_id: i64,
        page: u32,
        track_index: usize,
        reply: Reply<DownloadOutcome>,
    ) {
        let (album, track) = match self.resolve_selection(album_id, page, track_index).await {
            Ok(found) => found,
            Err(e) => {
                warn!("StoreCore: download rejected: {}", e);
                let _ = reply.send(Err(e));
                return;
            }
        };

        self.downloads.mark_downloading(track.id);
        self.state_manager
            .publish_downloads(self.downloads.statuses())
            .await;
        let _ = self
            .broadcast_tx
            .send(StoreBroadcast::DownloadUpdated { track_id: track.id });

        let api = Arc::clone(&self.api);
        let root = self.downloads.download_dir().to_path_buf();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result =
                download_manager::download_track(api.as_ref(), &root, &album.title, &track).await;
            if let Err(e) = &result {
                error!("Download of track {} failed: {}", track.id, e);
            }
            let evt = StoreEvent::DownloadFinished {
                track_id: track.id,
                result,
                reply,
            };
            let _ = event_tx.send(evt).await;
        });
    }

    /// Resolve the album and track a download refers to from the cache and
    /// the displayed album page.
    async fn resolve_selection(
        &self,
        album_id: i64,
        page: u32,
        track_index: usize,
    ) -> StoreResult<(AlbumInfo, TrackInfo)> {
        let tracks = self.cache.track_page(album_id, page).await.ok_or_else(|| {
            StoreError::StaleSelection(format!("album {} page {} is not loaded", album_id, page))
        })?;
        let track = tracks.tracks.get(track_index).cloned().ok_or_else(|| {
            StoreError::StaleSelection(format!(
                "track index {} is not on album {} page {}",
                track_index, album_id, page
            ))
        })?;

        let album = match &self.nav.album_page {
            Some(PageRef {
                scope: Scope::Albums { keyword },
                page,
            }) => self
                .cache
                .album_page(keyword, *page)
                .await
                .and_then(|albums| albums.albums.iter().find(|a| a.id == album_id).cloned()),
            _ => None,
        };
        let album = album.ok_or_else(|| {
            StoreError::StaleSelection(format!("album {} is no longer displayed", album_id))
        })?;

        Ok((album, track))
    }
}

// ── Fetch ─────────────────────────────────────────────────────────────────────

/// A page fetch, run off the event loop.
enum Fetch {
    Albums {
        keyword: String,
        page: u32,
    },
    Tracks {
        album_index: usize,
        album: AlbumInfo,
        page: u32,
    },
}

impl Fetch {
    async fn run(
        self,
        api: &dyn CatalogApi,
        cache: &ResponseCache,
        paging: PagingConfig,
    ) -> StoreResult<Loaded> {
        match self {
            Fetch::Albums { keyword, page } => {
                let result = cache
                    .get_or_fetch_album_page(&keyword, page, || {
                        api.search_albums(&keyword, page, paging.album_page_size)
                    })
                    .await?;
                Ok(Loaded::Albums { keyword, result })
            }
            Fetch::Tracks {
                album_index,
                album,
                page,
            } => {
                let result = cache
                    .get_or_fetch_track_page(album.id, page, || {
                        api.list_tracks(album.id, page, paging.track_page_size)
                    })
                    .await?;
                Ok(Loaded::Tracks {
                    album_index,
                    tracks_count: album.tracks_count,
                    result,
                })
            }
        }
    }
}
