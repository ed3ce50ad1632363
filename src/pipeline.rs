//! The scrape pipeline: resolve channel, list videos, fetch view counts, rank,
//! fetch transcripts, export.
//!
//! Every remote call is issued one at a time. Failures before transcript
//! fetching end the run; a failed transcript only drops that video.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;

use chrono::Local;
use eyre::Result;
use log::{debug, info, warn};

use crate::captions::{CaptionClient, TranscriptProvider};
use crate::channel::{ChannelIdentifier, resolve_channel_id};
use crate::error::report_chain;
use crate::youtube::{DataApiClient, MAX_PAGE_SIZE, VideoPlatform};
use crate::{ScrapeError, Segment, TRANSCRIPT_LANGUAGE, TranscriptRow, VideoRecord, join_segments, output};

/// Receives human-readable progress lines; has no influence on control flow
pub trait ProgressSink: Send + Sync {
    fn line(&self, line: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn line(&self, line: &str) {
        self(line)
    }
}

/// What to scrape and where to put it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub channel_url: String,
    pub max_videos: usize,
    pub output_dir: PathBuf,
}

/// How a run that did not fail ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// At least one transcript was collected and written here
    Saved(PathBuf),
    /// Every transcript was unavailable; no file was written
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolveChannel,
    ListVideos,
    FetchStatistics,
    RankVideos,
    FetchTranscripts,
    Export,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ResolveChannel => "resolve-channel",
            Stage::ListVideos => "list-videos",
            Stage::FetchStatistics => "fetch-statistics",
            Stage::RankVideos => "rank-videos",
            Stage::FetchTranscripts => "fetch-transcripts",
            Stage::Export => "export",
            Stage::Done => "done",
        };
        write!(f, "{name}")
    }
}

pub struct Pipeline<P, T> {
    platform: P,
    transcripts: T,
}

impl Pipeline<DataApiClient, CaptionClient> {
    /// Pipeline backed by the YouTube Data API and YouTube's caption tracks
    pub fn youtube(api_key: &str, api_base_url: Option<&str>) -> Self {
        let client = reqwest::Client::new();
        let mut platform = DataApiClient::new(client.clone(), api_key);
        if let Some(base_url) = api_base_url {
            platform = platform.with_base_url(base_url);
        }
        Pipeline::new(platform, CaptionClient::new(client))
    }
}

impl<P, T> Pipeline<P, T>
where
    P: VideoPlatform,
    T: TranscriptProvider,
{
    pub fn new(platform: P, transcripts: T) -> Self {
        Self { platform, transcripts }
    }

    pub async fn run(&self, job: &Job, sink: &dyn ProgressSink) -> Result<RunOutcome, ScrapeError> {
        enter(Stage::ResolveChannel);
        emit(sink, "Resolving channel...");
        let identifier = ChannelIdentifier::parse(&job.channel_url)?;
        let channel_id = resolve_channel_id(&self.platform, &identifier).await?;
        emit(sink, &format!("Channel ID: {channel_id}"));

        enter(Stage::ListVideos);
        emit(sink, "Fetching videos...");
        let mut videos = list_videos(&self.platform, &channel_id, job.max_videos)
            .await
            .map_err(|e| ScrapeError::ListingFailure(report_chain(&e)))?;
        emit(sink, &format!("Found {} videos.", videos.len()));

        enter(Stage::FetchStatistics);
        emit(sink, "Fetching video statistics...");
        let ids: Vec<String> = videos.iter().map(|v| v.video_id.clone()).collect();
        let counts = fetch_view_counts(&self.platform, &ids)
            .await
            .map_err(|e| ScrapeError::StatisticsFailure(report_chain(&e)))?;
        apply_view_counts(&mut videos, &counts);

        enter(Stage::RankVideos);
        rank_by_views(&mut videos);

        enter(Stage::FetchTranscripts);
        emit(sink, "Fetching transcripts...");
        let rows = collect_transcripts(&self.transcripts, &videos, TRANSCRIPT_LANGUAGE, sink).await;

        if rows.is_empty() {
            emit(sink, "No transcripts collected.");
            enter(Stage::Done);
            return Ok(RunOutcome::Empty);
        }

        enter(Stage::Export);
        let path = output::export(&job.output_dir, &rows, Local::now())?;
        emit(sink, &format!("Saved to {}", path.display()));

        enter(Stage::Done);
        Ok(RunOutcome::Saved(path))
    }
}

fn enter(stage: Stage) {
    debug!("Pipeline stage: {stage}");
}

fn emit(sink: &dyn ProgressSink, line: &str) {
    info!("{line}");
    sink.line(line);
}

/// Up to `max_videos` of the channel's most recent videos, newest first
pub async fn list_videos<P>(platform: &P, channel_id: &str, max_videos: usize) -> Result<Vec<VideoRecord>>
where
    P: VideoPlatform + ?Sized,
{
    let mut videos: Vec<VideoRecord> = Vec::new();
    let mut page_token: Option<String> = None;
    let mut seen_tokens: HashSet<String> = HashSet::new();

    while videos.len() < max_videos {
        let wanted = (max_videos - videos.len()).min(MAX_PAGE_SIZE);
        let page = platform
            .list_videos_page(channel_id, wanted, page_token.as_deref())
            .await?;
        debug!("Listed {} videos (asked for {wanted})", page.videos.len());

        videos.extend(page.videos);

        // Short and even empty pages can still carry a token; a repeated one would loop forever
        match page.next_page_token {
            Some(token) if seen_tokens.insert(token.clone()) => page_token = Some(token),
            Some(token) => {
                warn!("Listing returned page token {token} twice, stopping");
                break;
            }
            None => break,
        }
    }

    videos.truncate(max_videos);
    Ok(videos)
}

/// View counts keyed by video ID, one platform call per batch of at most 50 IDs
pub async fn fetch_view_counts<P>(platform: &P, video_ids: &[String]) -> Result<HashMap<String, u64>>
where
    P: VideoPlatform + ?Sized,
{
    let mut counts = HashMap::with_capacity(video_ids.len());
    for batch in video_ids.chunks(MAX_PAGE_SIZE) {
        counts.extend(platform.view_counts(batch).await?);
    }
    Ok(counts)
}

/// Videos the platform reported no statistics for get zero views
pub fn apply_view_counts(videos: &mut [VideoRecord], counts: &HashMap<String, u64>) {
    for video in videos.iter_mut() {
        video.views = counts.get(&video.video_id).copied().unwrap_or(0);
    }
}

/// Assign 1-based ranks by views descending without reordering `videos`.
/// Equal view counts keep their listing order.
pub fn rank_by_views(videos: &mut [VideoRecord]) {
    let mut order: Vec<usize> = (0..videos.len()).collect();
    order.sort_by(|&a, &b| videos[b].views.cmp(&videos[a].views));
    for (position, index) in order.into_iter().enumerate() {
        videos[index].rank_by_views = position + 1;
    }
}

/// Seconds from the first cue's start to the last cue's end
fn caption_span(segments: &[Segment]) -> f64 {
    match (segments.first(), segments.last()) {
        (Some(first), Some(last)) => (last.start + last.duration - first.start).max(0.0),
        _ => 0.0,
    }
}

/// One row per video whose transcript could be fetched, in listing order.
/// Any transcript failure skips that video and the batch carries on.
pub async fn collect_transcripts<T>(
    transcripts: &T,
    videos: &[VideoRecord],
    lang: &str,
    sink: &dyn ProgressSink,
) -> Vec<TranscriptRow>
where
    T: TranscriptProvider + ?Sized,
{
    let total = videos.len();
    let mut rows = Vec::new();

    for (idx, video) in videos.iter().enumerate() {
        emit(sink, &format!("[{}/{total}] Fetching {}", idx + 1, video.video_id));

        match transcripts.fetch(&video.video_id, lang).await {
            Ok(segments) if !segments.is_empty() => {
                debug!(
                    "Transcript for {}: {} segments, {:.1}s",
                    video.video_id,
                    segments.len(),
                    caption_span(&segments)
                );
                rows.push(TranscriptRow::new(video, join_segments(&segments)));
            }
            Ok(_) => {
                warn!("Empty transcript for {}", video.video_id);
                emit(sink, &format!("Transcript unavailable: {}", video.video_id));
            }
            Err(e) => {
                warn!("Transcript unavailable for {}: {e}", video.video_id);
                emit(sink, &format!("Transcript unavailable: {}", video.video_id));
            }
        }
    }

    rows
}
