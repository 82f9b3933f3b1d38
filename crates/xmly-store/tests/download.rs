//! Download orchestration tests: idempotence, stale selections, partial files.

mod common;

use std::path::Path;
use std::sync::Arc;

use common::{album, FakeCatalog};
use tempfile::TempDir;
use xmly_proto::config::PagingConfig;
use xmly_store::{DownloadStatus, StoreError, StoreHandle};

/// Album 1 "水浒传" with three tracks on page 1; track ids 10100..=10102.
async fn browsing(catalog: &Arc<FakeCatalog>, root: &Path) -> StoreHandle {
    catalog.add_albums("水浒传", 1, 1, vec![album(1, "水浒传", 3)]);
    catalog.add_tracks(1, 1, 3);
    let store = StoreHandle::spawn(catalog.clone(), PagingConfig::default(), root.to_path_buf());
    store.search("水浒传", 1).await.unwrap();
    store.open_album(0, 1).await.unwrap();
    store
}

fn leftover_partials(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .flatten()
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".part"))
        .collect()
}

#[tokio::test]
async fn test_download_writes_album_directory() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = Arc::new(FakeCatalog::new());
    let store = browsing(&catalog, temp_dir.path()).await;
    catalog.add_file(10100, "m4a", vec![b"abc", b"def"]);

    let outcome = store.download_track(1, 1, 0).await.unwrap();
    let expected = temp_dir.path().join("水浒传").join("1-1-0.m4a");
    assert_eq!(outcome.path, expected);
    assert!(outcome.fetched);
    assert_eq!(std::fs::read(&expected).unwrap(), b"abcdef");
    assert!(leftover_partials(&temp_dir.path().join("水浒传")).is_empty());

    assert_eq!(
        store.download_status(10100).await,
        DownloadStatus::Downloaded(expected)
    );
}

#[tokio::test]
async fn test_second_download_does_not_fetch_again() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = Arc::new(FakeCatalog::new());
    let store = browsing(&catalog, temp_dir.path()).await;
    catalog.add_file(10101, "mp3", vec![b"audio"]);

    let first = store.download_track(1, 1, 1).await.unwrap();
    let second = store.download_track(1, 1, 1).await.unwrap();

    assert!(first.fetched);
    assert!(!second.fetched);
    assert_eq!(first.path, second.path);
    assert_eq!(FakeCatalog::calls(&catalog.fetch_calls), 1);
}

#[tokio::test]
async fn test_concurrent_downloads_of_one_track() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = Arc::new(FakeCatalog::new());
    let store = browsing(&catalog, temp_dir.path()).await;
    catalog.add_file(10102, "m4a", vec![b"same bytes"]);

    let (a, b) = tokio::join!(store.download_track(1, 1, 2), store.download_track(1, 1, 2));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.path, b.path);
    assert_eq!(std::fs::read(&a.path).unwrap(), b"same bytes");
    assert!(leftover_partials(&temp_dir.path().join("水浒传")).is_empty());
}

#[tokio::test]
async fn test_download_displayed_track() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = Arc::new(FakeCatalog::new());
    let store = browsing(&catalog, temp_dir.path()).await;
    catalog.add_file(10100, "m4a", vec![b"x"]);

    let outcome = store.download_displayed(0).await.unwrap();
    assert!(outcome.path.ends_with("水浒传/1-1-0.m4a"));
}

#[tokio::test]
async fn test_unresolvable_selection_is_stale() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = Arc::new(FakeCatalog::new());
    let store = browsing(&catalog, temp_dir.path()).await;

    // Page 2 was never loaded, index 3 is past the end, album 2 is unknown.
    for (album_id, page, index) in [(1, 2, 0), (1, 1, 3), (2, 1, 0)] {
        let err = store.download_track(album_id, page, index).await.unwrap_err();
        assert!(matches!(err, StoreError::StaleSelection(_)), "{:?}", err);
    }
    assert_eq!(FakeCatalog::calls(&catalog.resolve_calls), 0);
}

#[tokio::test]
async fn test_download_after_new_search_is_stale() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = Arc::new(FakeCatalog::new());
    let store = browsing(&catalog, temp_dir.path()).await;
    catalog.add_albums("other", 1, 1, vec![album(9, "Other", 1)]);
    store.search("other", 1).await.unwrap();

    assert!(matches!(
        store.download_displayed(0).await,
        Err(StoreError::StaleSelection(_))
    ));
    assert!(matches!(
        store.download_track(1, 1, 0).await,
        Err(StoreError::StaleSelection(_))
    ));
}

#[tokio::test]
async fn test_address_failure_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = Arc::new(FakeCatalog::new());
    let store = browsing(&catalog, temp_dir.path()).await;
    catalog.fail_address(10100, "track is paid content");

    let err = store.download_track(1, 1, 0).await.unwrap_err();
    assert!(matches!(err, StoreError::Service { ref message } if message == "track is paid content"));
    assert!(matches!(
        store.download_status(10100).await,
        DownloadStatus::Failed(_)
    ));
    assert_eq!(FakeCatalog::calls(&catalog.fetch_calls), 0);
    assert!(!temp_dir.path().join("水浒传").exists());
}

#[tokio::test]
async fn test_interrupted_download_leaves_no_file() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = Arc::new(FakeCatalog::new());
    let store = browsing(&catalog, temp_dir.path()).await;
    catalog.add_broken_file(10100, "m4a", b"half of the");

    let err = store.download_track(1, 1, 0).await.unwrap_err();
    assert!(matches!(err, StoreError::Transport(_)));

    let album_dir = temp_dir.path().join("水浒传");
    assert!(!album_dir.join("1-1-0.m4a").exists());
    assert!(leftover_partials(&album_dir).is_empty());

    // A retry with a healthy source goes through.
    catalog.add_file(10100, "m4a", vec![b"whole"]);
    let outcome = store.download_track(1, 1, 0).await.unwrap();
    assert!(outcome.fetched);
    assert_eq!(std::fs::read(outcome.path).unwrap(), b"whole");
}

#[tokio::test]
async fn test_album_title_is_sanitised() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = Arc::new(FakeCatalog::new());
    catalog.add_albums("acdc", 1, 1, vec![album(3, "AC/DC: Live", 1)]);
    catalog.add_tracks(3, 1, 1);
    catalog.add_file(30100, "mp3", vec![b"riff"]);
    let store = StoreHandle::spawn(
        catalog.clone(),
        PagingConfig::default(),
        temp_dir.path().to_path_buf(),
    );
    store.search("acdc", 1).await.unwrap();
    store.open_album(0, 1).await.unwrap();

    let outcome = store.download_displayed(0).await.unwrap();
    assert_eq!(outcome.path, temp_dir.path().join("AC-DC- Live").join("3-1-0.mp3"));
}
