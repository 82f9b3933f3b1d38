//! Catalog service client.
//!
//! A thin request/response mapper: one GET per call, no retries, no state
//! beyond the base URL and the connection pool.  Safe to share across tasks.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use xmly_proto::protocol::{
    Envelope, QueryPlayListResult, SearchAlbumResult, TrackAddressResult, HELLO_PATH, PLAY_PATH,
    SEARCH_PATH, TRACK_PATH,
};

use crate::error::{StoreError, StoreResult};

/// Body of a downloaded track, chunk by chunk.
pub type ByteStream = BoxStream<'static, StoreResult<Vec<u8>>>;

/// Everything the store needs from the catalog service.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Liveness probe; returns the service's greeting message.
    async fn hello(&self) -> StoreResult<String>;

    async fn search_albums(
        &self,
        keyword: &str,
        page: u32,
        page_size: u32,
    ) -> StoreResult<SearchAlbumResult>;

    async fn list_tracks(
        &self,
        album_id: i64,
        page: u32,
        page_size: u32,
    ) -> StoreResult<QueryPlayListResult>;

    async fn resolve_track_address(&self, track_id: i64) -> StoreResult<TrackAddressResult>;

    /// Open the resolved address for reading.
    async fn fetch(&self, address: &str) -> StoreResult<ByteStream>;
}

pub struct HttpCatalogClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpCatalogClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> StoreResult<Envelope<T>> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .query(query)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        decode_envelope(status, &body)
    }
}

/// Decode an envelope; a non-empty `err` wins over the HTTP status.
fn decode_envelope<T: DeserializeOwned>(status: StatusCode, body: &str) -> StoreResult<Envelope<T>> {
    match serde_json::from_str::<Envelope<T>>(body) {
        Ok(envelope) => match envelope.failure() {
            Some(err) => Err(StoreError::Service {
                message: err.to_string(),
            }),
            None => Ok(envelope),
        },
        Err(_) if !status.is_success() => Err(StoreError::Transport(format!(
            "catalog service returned status {}",
            status
        ))),
        Err(e) => Err(StoreError::Decode(e.to_string())),
    }
}

fn into_data<T>(envelope: Envelope<T>, endpoint: &str) -> StoreResult<T> {
    envelope
        .data
        .ok_or_else(|| StoreError::Decode(format!("{} response carries no data", endpoint)))
}

#[async_trait]
impl CatalogApi for HttpCatalogClient {
    async fn hello(&self) -> StoreResult<String> {
        let envelope: Envelope<serde_json::Value> = self.get(HELLO_PATH, &[]).await?;
        Ok(envelope.message)
    }

    async fn search_albums(
        &self,
        keyword: &str,
        page: u32,
        page_size: u32,
    ) -> StoreResult<SearchAlbumResult> {
        let query = [
            ("kw", keyword.to_string()),
            ("pageNum", page.to_string()),
            ("pageSize", page_size.to_string()),
        ];
        into_data(self.get(SEARCH_PATH, &query).await?, SEARCH_PATH)
    }

    async fn list_tracks(
        &self,
        album_id: i64,
        page: u32,
        page_size: u32,
    ) -> StoreResult<QueryPlayListResult> {
        let query = [
            ("id", album_id.to_string()),
            ("pageNum", page.to_string()),
            ("pageSize", page_size.to_string()),
        ];
        into_data(self.get(PLAY_PATH, &query).await?, PLAY_PATH)
    }

    async fn resolve_track_address(&self, track_id: i64) -> StoreResult<TrackAddressResult> {
        let query = [("id", track_id.to_string())];
        into_data(self.get(TRACK_PATH, &query).await?, TRACK_PATH)
    }

    async fn fetch(&self, address: &str) -> StoreResult<ByteStream> {
        debug!("GET {}", address);
        let response = self
            .client
            .get(address)
            .send()
            .await?
            .error_for_status()?;

        Ok(response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| StoreError::Transport(e.to_string()))
            })
            .boxed())
    }
}
