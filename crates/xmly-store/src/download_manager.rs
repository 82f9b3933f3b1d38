//! Download manager for catalog tracks
//!
//! Resolves a track's address, then streams it into
//! `<downloads_dir>/<album title>/<track name>.<type>`.  A destination that
//! already exists counts as done, so repeating a download is a no-op.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use xmly_proto::protocol::TrackInfo;

use crate::client::CatalogApi;
use crate::error::{StoreError, StoreResult};

/// Download status for a track
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadStatus {
    NotDownloaded,
    Downloading,
    /// Downloaded (or found already present) at path
    Downloaded(PathBuf),
    /// Download failed with error message
    Failed(String),
}

/// Where a finished download ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOutcome {
    pub path: PathBuf,
    /// False when the destination already existed and nothing was fetched.
    pub fetched: bool,
}

/// Tracks per-track download state; the downloads themselves run as
/// independent tasks.
pub struct DownloadManager {
    statuses: HashMap<i64, DownloadStatus>,
    download_dir: PathBuf,
}

impl DownloadManager {
    pub fn new(download_dir: PathBuf) -> Self {
        Self {
            statuses: HashMap::new(),
            download_dir,
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn mark_downloading(&mut self, track_id: i64) {
        self.statuses.insert(track_id, DownloadStatus::Downloading);
    }

    pub fn finish(&mut self, track_id: i64, result: &StoreResult<DownloadOutcome>) {
        let status = match result {
            Ok(outcome) => DownloadStatus::Downloaded(outcome.path.clone()),
            Err(e) => DownloadStatus::Failed(e.to_string()),
        };
        self.statuses.insert(track_id, status);
    }

    pub fn statuses(&self) -> &HashMap<i64, DownloadStatus> {
        &self.statuses
    }
}

/// Download one track of the album titled `album_title` under `root`.
pub async fn download_track(
    api: &dyn CatalogApi,
    root: &Path,
    album_title: &str,
    track: &TrackInfo,
) -> StoreResult<DownloadOutcome> {
    let address = api.resolve_track_address(track.id).await?;

    let album_dir = root.join(safe_filename(album_title));
    tokio::fs::create_dir_all(&album_dir)
        .await
        .map_err(|e| StoreError::fs(&album_dir, e))?;

    let dest = album_dir.join(track_file_name(&track.name, &address.kind));
    if tokio::fs::try_exists(&dest)
        .await
        .map_err(|e| StoreError::fs(&dest, e))?
    {
        info!("Already downloaded: {}", dest.display());
        return Ok(DownloadOutcome {
            path: dest,
            fetched: false,
        });
    }

    info!("Starting download of track {} to {}", track.id, dest.display());
    let mut body = api.fetch(&address.address).await?;

    // The partial file lives beside the destination and is removed on drop
    // unless persisted, so an interrupted download never looks finished.
    let partial = tempfile::Builder::new()
        .prefix(".xmly-")
        .suffix(".part")
        .tempfile_in(&album_dir)
        .map_err(|e| StoreError::fs(&album_dir, e))?;
    let (std_file, partial_path) = partial.into_parts();
    let mut file = tokio::fs::File::from_std(std_file);

    let mut written = 0usize;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| StoreError::fs(&*partial_path, e))?;
        written += chunk.len();
    }
    file.sync_all()
        .await
        .map_err(|e| StoreError::fs(&*partial_path, e))?;
    drop(file);

    match partial_path.persist_noclobber(&dest) {
        Ok(()) => {}
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
            // A concurrent download of the same track got there first.
            debug!("{} appeared during download, keeping it", dest.display());
        }
        Err(e) => return Err(StoreError::fs(&dest, e.error)),
    }

    info!("Download complete: {} ({} bytes)", dest.display(), written);
    Ok(DownloadOutcome {
        path: dest,
        fetched: true,
    })
}

/// Make a catalog title usable as a single path component.
pub fn safe_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_end_matches('.').trim_end();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "_".to_string()
    } else {
        cleaned.to_string()
    }
}

fn track_file_name(name: &str, kind: &str) -> String {
    let kind = safe_filename(kind);
    if kind == "_" {
        safe_filename(name)
    } else {
        format!("{}.{}", safe_filename(name), kind)
    }
}
