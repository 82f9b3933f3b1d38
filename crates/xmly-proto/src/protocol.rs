//! Wire types of the catalog service.
//!
//! Every endpoint answers with the same envelope `{err, message, data}`.
//! A non-empty `err` marks an application-level failure whatever the HTTP
//! status was.

use serde::{Deserialize, Serialize};

/// Albums per search page when the configuration does not say otherwise.
pub const DEFAULT_ALBUM_PAGE_SIZE: u32 = 10;
/// Tracks per play-list page when the configuration does not say otherwise.
pub const DEFAULT_TRACK_PAGE_SIZE: u32 = 30;

/// Endpoint paths, relative to the service base URL.
pub const HELLO_PATH: &str = "/hello";
pub const SEARCH_PATH: &str = "/search";
pub const PLAY_PATH: &str = "/play";
pub const TRACK_PATH: &str = "/track";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumInfo {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub tracks_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub id: i64,
    pub name: String,
}

/// One page of albums matching a keyword.  The service is authoritative for
/// `page_num` and `total_page`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchAlbumResult {
    #[serde(default)]
    pub albums: Vec<AlbumInfo>,
    #[serde(default)]
    pub page_num: u32,
    #[serde(default)]
    pub total_page: u32,
}

/// One page of an album's play list.  The service does not report a page
/// count here; it is derived from the album's `tracks_count`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlayListResult {
    #[serde(default)]
    pub tracks: Vec<TrackInfo>,
    #[serde(default)]
    pub page_num: u32,
}

/// Where a track can be fetched from, and the file extension to store it under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackAddressResult {
    pub address: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Response envelope shared by all endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub err: String,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// The service-reported failure, if any.
    pub fn failure(&self) -> Option<&str> {
        if self.err.is_empty() {
            None
        } else {
            Some(&self.err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_search_envelope() {
        let body = r#"{
            "err": "",
            "message": "ok",
            "data": {
                "albums": [{"id": 1, "title": "水浒传", "tracksCount": 61}],
                "pageNum": 1,
                "totalPage": 4
            }
        }"#;
        let env: Envelope<SearchAlbumResult> = serde_json::from_str(body).unwrap();
        assert!(env.failure().is_none());
        let data = env.data.unwrap();
        assert_eq!(data.albums[0].title, "水浒传");
        assert_eq!(data.albums[0].tracks_count, 61);
        assert_eq!(data.total_page, 4);
    }

    #[test]
    fn test_decode_error_envelope_without_data() {
        let body = r#"{"err": "album not found", "message": ""}"#;
        let env: Envelope<QueryPlayListResult> = serde_json::from_str(body).unwrap();
        assert_eq!(env.failure(), Some("album not found"));
        assert!(env.data.is_none());
    }

    #[test]
    fn test_track_address_type_field() {
        let body = r#"{"address": "http://cdn/1.m4a", "type": "m4a"}"#;
        let addr: TrackAddressResult = serde_json::from_str(body).unwrap();
        assert_eq!(addr.kind, "m4a");
    }
}
