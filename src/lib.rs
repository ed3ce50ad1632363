pub mod captions;
pub mod channel;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod shell;
pub mod youtube;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use error::{ScrapeError, TranscriptError};

/// Language every transcript is requested in
pub const TRANSCRIPT_LANGUAGE: &str = "en";

/// A single captioned segment. Only `text` is exported; the timing is logged for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

/// A video from the channel listing, enriched with views and rank as the run progresses
#[derive(Debug, Clone, PartialEq)]
pub struct VideoRecord {
    pub video_id: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub views: u64,
    /// 1-based; zero until ranking has run
    pub rank_by_views: usize,
}

impl VideoRecord {
    pub fn new(video_id: impl Into<String>, title: impl Into<String>, published_at: DateTime<Utc>) -> Self {
        Self {
            video_id: video_id.into(),
            title: title.into(),
            published_at,
            views: 0,
            rank_by_views: 0,
        }
    }
}

/// One exported CSV row; field order is the column order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptRow {
    pub rank_by_views: usize,
    pub title: String,
    pub video_id: String,
    #[serde(serialize_with = "output::serialize_timestamp")]
    pub published_at: DateTime<Utc>,
    pub views: u64,
    pub transcript: String,
}

impl TranscriptRow {
    pub fn new(video: &VideoRecord, transcript: String) -> Self {
        Self {
            rank_by_views: video.rank_by_views,
            title: video.title.clone(),
            video_id: video.video_id.clone(),
            published_at: video.published_at,
            views: video.views,
            transcript,
        }
    }
}

/// Join caption segments into a single space-separated transcript
pub fn join_segments(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
