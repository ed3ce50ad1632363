use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eyre::{Result, WrapErr, bail, eyre};
use log::debug;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::VideoRecord;

pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Platform limit on `maxResults` and on IDs per `videos.list` call
pub const MAX_PAGE_SIZE: usize = 50;

/// One page of a channel's date-ordered video listing
#[derive(Debug, Clone, Default)]
pub struct VideoPage {
    pub videos: Vec<VideoRecord>,
    pub next_page_token: Option<String>,
}

/// The remote calls the pipeline needs from the video platform
#[async_trait]
pub trait VideoPlatform: Send + Sync {
    async fn channel_id_for_handle(&self, handle: &str) -> Result<Option<String>>;

    async fn channel_id_for_username(&self, username: &str) -> Result<Option<String>>;

    /// Top channel-type search result for a free-text query
    async fn search_channel(&self, query: &str) -> Result<Option<String>>;

    async fn list_videos_page(
        &self,
        channel_id: &str,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<VideoPage>;

    /// View counts for at most `MAX_PAGE_SIZE` IDs; IDs the platform omits are absent from the map
    async fn view_counts(&self, video_ids: &[String]) -> Result<HashMap<String, u64>>;
}

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Option<SearchSnippet>,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchSnippet {
    #[serde(default)]
    title: String,
    #[serde(rename = "publishedAt")]
    published_at: Option<DateTime<Utc>>,
    #[serde(rename = "channelId")]
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoStatsItem>,
}

#[derive(Debug, Deserialize)]
struct VideoStatsItem {
    id: String,
    statistics: Option<Statistics>,
}

#[derive(Debug, Deserialize)]
struct Statistics {
    #[serde(rename = "viewCount")]
    view_count: Option<String>,
}

/// YouTube Data API v3 client authenticated with a static API key
#[derive(Debug, Clone)]
pub struct DataApiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl DataApiClient {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}/{endpoint}", self.base_url);
        debug!("GET {url} {params:?}");

        let resp = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .wrap_err_with(|| format!("request to {endpoint} failed"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("YouTube API {endpoint} returned {status}: {body}");
        }

        resp.json::<T>()
            .await
            .wrap_err_with(|| format!("unexpected {endpoint} response"))
    }

    async fn first_channel(&self, params: &[(&str, &str)]) -> Result<Option<String>> {
        let resp: ChannelListResponse = self.get("channels", params).await?;
        Ok(resp.items.into_iter().next().map(|c| c.id))
    }
}

#[async_trait]
impl VideoPlatform for DataApiClient {
    async fn channel_id_for_handle(&self, handle: &str) -> Result<Option<String>> {
        self.first_channel(&[("part", "id"), ("forHandle", handle)]).await
    }

    async fn channel_id_for_username(&self, username: &str) -> Result<Option<String>> {
        self.first_channel(&[("part", "id"), ("forUsername", username)]).await
    }

    async fn search_channel(&self, query: &str) -> Result<Option<String>> {
        let resp: SearchResponse = self
            .get(
                "search",
                &[("part", "snippet"), ("q", query), ("type", "channel"), ("maxResults", "1")],
            )
            .await?;

        Ok(resp
            .items
            .into_iter()
            .next()
            .and_then(|item| item.snippet)
            .and_then(|snippet| snippet.channel_id))
    }

    async fn list_videos_page(
        &self,
        channel_id: &str,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<VideoPage> {
        let max_results = max_results.to_string();
        let mut params = vec![
            ("part", "snippet"),
            ("channelId", channel_id),
            ("maxResults", max_results.as_str()),
            ("order", "date"),
            ("type", "video"),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let resp: SearchResponse = self.get("search", &params).await?;

        let videos = resp
            .items
            .into_iter()
            .map(|item| {
                let video_id = item
                    .id
                    .video_id
                    .ok_or_else(|| eyre!("search item without id.videoId"))?;
                let snippet = item
                    .snippet
                    .ok_or_else(|| eyre!("search item {video_id} without snippet"))?;
                let published_at = snippet
                    .published_at
                    .ok_or_else(|| eyre!("search item {video_id} without snippet.publishedAt"))?;
                let title = html_escape::decode_html_entities(&snippet.title).to_string();
                Ok(VideoRecord::new(video_id, title, published_at))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(VideoPage {
            videos,
            next_page_token: resp.next_page_token,
        })
    }

    async fn view_counts(&self, video_ids: &[String]) -> Result<HashMap<String, u64>> {
        if video_ids.len() > MAX_PAGE_SIZE {
            bail!("at most {MAX_PAGE_SIZE} video IDs per statistics call, got {}", video_ids.len());
        }

        let ids = video_ids.join(",");
        let resp: VideoListResponse = self.get("videos", &[("part", "statistics"), ("id", ids.as_str())]).await?;

        Ok(resp
            .items
            .into_iter()
            .map(|item| {
                let views = item
                    .statistics
                    .and_then(|s| s.view_count)
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(0);
                (item.id, views)
            })
            .collect())
    }
}
