//! In-memory catalog used by the store tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::sync::oneshot;

use xmly_proto::protocol::{
    AlbumInfo, QueryPlayListResult, SearchAlbumResult, TrackAddressResult, TrackInfo,
};
use xmly_store::client::ByteStream;
use xmly_store::{CatalogApi, StoreError, StoreResult};

/// Holds a `list_tracks` call until the test releases it.
pub struct Gate {
    pub started: oneshot::Sender<()>,
    pub release: oneshot::Receiver<()>,
}

/// Pair of ends a test keeps to drive a [`Gate`].
pub struct GateControl {
    pub started: oneshot::Receiver<()>,
    pub release: oneshot::Sender<()>,
}

pub fn gate() -> (Gate, GateControl) {
    let (started_tx, started_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    (
        Gate {
            started: started_tx,
            release: release_rx,
        },
        GateControl {
            started: started_rx,
            release: release_tx,
        },
    )
}

#[derive(Default)]
pub struct FakeCatalog {
    albums: Mutex<HashMap<(String, u32), SearchAlbumResult>>,
    tracks: Mutex<HashMap<(i64, u32), QueryPlayListResult>>,
    addresses: Mutex<HashMap<i64, StoreResult<TrackAddressResult>>>,
    files: Mutex<HashMap<String, Vec<Vec<u8>>>>,
    broken_files: Mutex<HashMap<String, Vec<u8>>>,
    track_gate: Mutex<Option<Gate>>,
    pub search_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub resolve_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_albums(&self, keyword: &str, page: u32, total_page: u32, albums: Vec<AlbumInfo>) {
        self.albums.lock().unwrap().insert(
            (keyword.to_string(), page),
            SearchAlbumResult {
                albums,
                page_num: page,
                total_page,
            },
        );
    }

    /// Register `count` tracks named `"<album_id>-<page>-<i>"`.
    pub fn add_tracks(&self, album_id: i64, page: u32, count: usize) {
        let tracks = (0..count)
            .map(|i| TrackInfo {
                id: album_id * 10_000 + i64::from(page) * 100 + i as i64,
                name: format!("{}-{}-{}", album_id, page, i),
            })
            .collect();
        self.tracks.lock().unwrap().insert(
            (album_id, page),
            QueryPlayListResult {
                tracks,
                page_num: page,
            },
        );
    }

    pub fn add_file(&self, track_id: i64, kind: &str, chunks: Vec<&[u8]>) {
        let address = format!("mem://{}", track_id);
        self.addresses.lock().unwrap().insert(
            track_id,
            Ok(TrackAddressResult {
                address: address.clone(),
                kind: kind.to_string(),
            }),
        );
        self.files
            .lock()
            .unwrap()
            .insert(address, chunks.into_iter().map(|c| c.to_vec()).collect());
    }

    /// Address that yields `head` and then fails.
    pub fn add_broken_file(&self, track_id: i64, kind: &str, head: &[u8]) {
        let address = format!("mem://broken/{}", track_id);
        self.addresses.lock().unwrap().insert(
            track_id,
            Ok(TrackAddressResult {
                address: address.clone(),
                kind: kind.to_string(),
            }),
        );
        self.broken_files
            .lock()
            .unwrap()
            .insert(address, head.to_vec());
    }

    pub fn fail_address(&self, track_id: i64, message: &str) {
        self.addresses.lock().unwrap().insert(
            track_id,
            Err(StoreError::Service {
                message: message.to_string(),
            }),
        );
    }

    pub fn hold_next_track_fetch(&self, gate: Gate) {
        *self.track_gate.lock().unwrap() = Some(gate);
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub fn album(id: i64, title: &str, tracks_count: u32) -> AlbumInfo {
    AlbumInfo {
        id,
        title: title.to_string(),
        tracks_count,
    }
}

fn clone_err(e: &StoreError) -> StoreError {
    match e {
        StoreError::Service { message } => StoreError::Service {
            message: message.clone(),
        },
        other => StoreError::Transport(other.to_string()),
    }
}

#[async_trait]
impl CatalogApi for FakeCatalog {
    async fn hello(&self) -> StoreResult<String> {
        Ok("hello".to_string())
    }

    async fn search_albums(
        &self,
        keyword: &str,
        page: u32,
        _page_size: u32,
    ) -> StoreResult<SearchAlbumResult> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.albums
            .lock()
            .unwrap()
            .get(&(keyword.to_string(), page))
            .cloned()
            .ok_or_else(|| StoreError::Service {
                message: format!("no albums for {} page {}", keyword, page),
            })
    }

    async fn list_tracks(
        &self,
        album_id: i64,
        page: u32,
        _page_size: u32,
    ) -> StoreResult<QueryPlayListResult> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.track_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.started.send(());
            let _ = gate.release.await;
        }
        self.tracks
            .lock()
            .unwrap()
            .get(&(album_id, page))
            .cloned()
            .ok_or_else(|| StoreError::Service {
                message: format!("no tracks for album {} page {}", album_id, page),
            })
    }

    async fn resolve_track_address(&self, track_id: i64) -> StoreResult<TrackAddressResult> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        match self.addresses.lock().unwrap().get(&track_id) {
            Some(Ok(address)) => Ok(address.clone()),
            Some(Err(e)) => Err(clone_err(e)),
            None => Err(StoreError::Service {
                message: format!("no address for track {}", track_id),
            }),
        }
    }

    async fn fetch(&self, address: &str) -> StoreResult<ByteStream> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(head) = self.broken_files.lock().unwrap().get(address).cloned() {
            let items: Vec<StoreResult<Vec<u8>>> = vec![
                Ok(head),
                Err(StoreError::Transport("connection reset".to_string())),
            ];
            return Ok(stream::iter(items).boxed());
        }
        let chunks = self
            .files
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .ok_or_else(|| StoreError::Transport(format!("404 for {}", address)))?;
        Ok(stream::iter(chunks.into_iter().map(Ok)).boxed())
    }
}
