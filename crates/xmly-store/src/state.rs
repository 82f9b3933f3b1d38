use std::collections::HashMap;

use tokio::sync::RwLock;

use xmly_proto::state::NavigationState;

use crate::download_manager::DownloadStatus;

/// Read side of the store.  `StoreCore` publishes a copy here after every
/// change it commits; renderers read it without going through the event loop.
#[derive(Default)]
pub struct StateManager {
    nav: RwLock<NavigationState>,
    downloads: RwLock<HashMap<i64, DownloadStatus>>,
}

impl StateManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_state(&self) -> NavigationState {
        self.nav.read().await.clone()
    }

    pub async fn get_download_status(&self, track_id: i64) -> DownloadStatus {
        self.downloads
            .read()
            .await
            .get(&track_id)
            .cloned()
            .unwrap_or(DownloadStatus::NotDownloaded)
    }

    pub(crate) async fn publish(&self, nav: &NavigationState) {
        let mut state = self.nav.write().await;
        if state.rev != nav.rev {
            *state = nav.clone();
        }
    }

    pub(crate) async fn publish_downloads(&self, statuses: &HashMap<i64, DownloadStatus>) {
        *self.downloads.write().await = statuses.clone();
    }
}
