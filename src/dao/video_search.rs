//! Client for the external video catalog used to import songs.

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const YOUTUBE_SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";

/// Result alias for video search operations.
pub type SearchResult<T> = Result<T, SearchError>;

/// Failures raised while querying the video catalog.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("failed to build video search client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to send video search request")]
    RequestSend {
        #[source]
        source: reqwest::Error,
    },
    #[error("video search returned status {status}")]
    RequestStatus { status: StatusCode },
    #[error("failed to decode video search response")]
    DecodeResponse {
        #[source]
        source: reqwest::Error,
    },
    /// The API answered with an error document.
    #[error("video search API error: {message}")]
    Api { message: String },
}

/// A single video returned by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoEntity {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
    pub channel_title: String,
}

/// Text search over the external video catalog.
pub trait VideoSearch: Send + Sync {
    fn search(&self, query: &str) -> BoxFuture<'static, SearchResult<Vec<VideoEntity>>>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: ItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemId {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    channel_title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    #[serde(default)]
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl SearchResponse {
    fn into_videos(self) -> SearchResult<Vec<VideoEntity>> {
        if let Some(error) = self.error {
            return Err(SearchError::Api {
                message: error.message,
            });
        }

        Ok(self
            .items
            .into_iter()
            .filter_map(|item| {
                let id = item.id.video_id?;
                Some(VideoEntity {
                    id,
                    title: item.snippet.title,
                    thumbnail: item
                        .snippet
                        .thumbnails
                        .default
                        .map(|thumb| thumb.url)
                        .unwrap_or_default(),
                    channel_title: item.snippet.channel_title,
                })
            })
            .collect())
    }
}

/// YouTube Data API v3 search client.
#[derive(Clone)]
pub struct YoutubeClient {
    client: Client,
    api_key: Arc<str>,
    endpoint: Arc<str>,
    max_results: u8,
}

impl YoutubeClient {
    pub fn new(api_key: impl Into<String>, max_results: u8) -> SearchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| SearchError::ClientBuilder { source })?;
        Ok(Self {
            client,
            api_key: Arc::from(api_key.into()),
            endpoint: Arc::from(YOUTUBE_SEARCH_URL),
            max_results,
        })
    }

    /// Point the client at another endpoint (e.g. a local stub).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Arc::from(endpoint.into());
        self
    }
}

impl VideoSearch for YoutubeClient {
    fn search(&self, query: &str) -> BoxFuture<'static, SearchResult<Vec<VideoEntity>>> {
        let this = self.clone();
        let query = query.to_string();
        Box::pin(async move {
            let params = [
                ("part", "snippet".to_string()),
                ("type", "video".to_string()),
                ("maxResults", this.max_results.to_string()),
                ("q", query),
                ("key", this.api_key.to_string()),
            ];

            let response = this
                .client
                .get(this.endpoint.as_ref())
                .query(&params)
                .send()
                .await
                .map_err(|source| SearchError::RequestSend { source })?;

            let status = response.status();
            // The API reports quota and key problems as JSON error documents.
            if !status.is_success() && status != StatusCode::FORBIDDEN {
                return Err(SearchError::RequestStatus { status });
            }

            let payload = response
                .json::<SearchResponse>()
                .await
                .map_err(|source| SearchError::DecodeResponse { source })?;

            payload.into_videos()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_payload_maps_to_videos() {
        let raw = serde_json::json!({
            "items": [
                {
                    "id": { "kind": "youtube#video", "videoId": "fJ9rUzIMcZQ" },
                    "snippet": {
                        "title": "Queen – Bohemian Rhapsody (Official Video Remastered)",
                        "channelTitle": "Queen Official",
                        "thumbnails": { "default": { "url": "https://i.ytimg.com/vi/fJ9rUzIMcZQ/default.jpg" } }
                    }
                },
                {
                    "id": { "kind": "youtube#channel", "channelId": "UCiMhD4jzUqG-IgPzUmmytRQ" },
                    "snippet": { "title": "Queen Official", "channelTitle": "Queen Official" }
                }
            ]
        });

        let response: SearchResponse = serde_json::from_value(raw).unwrap();
        let videos = response.into_videos().unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].id, "fJ9rUzIMcZQ");
        assert_eq!(videos[0].channel_title, "Queen Official");
        assert!(videos[0].thumbnail.ends_with("default.jpg"));
    }

    #[test]
    fn api_error_document_is_surfaced() {
        let raw = serde_json::json!({
            "error": { "code": 403, "message": "quotaExceeded" }
        });
        let response: SearchResponse = serde_json::from_value(raw).unwrap();
        assert!(matches!(
            response.into_videos(),
            Err(SearchError::Api { message }) if message == "quotaExceeded"
        ));
    }
}
