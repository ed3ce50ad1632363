use async_trait::async_trait;
use eyre::{Result, WrapErr, bail};
use log::debug;
use regex::Regex;
use serde::Deserialize;

use crate::{Segment, TranscriptError};

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

pub const DEFAULT_BASE_URL: &str = "https://www.youtube.com";

/// Source of timed transcript segments for a single video
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    async fn fetch(&self, video_id: &str, lang: &str) -> Result<Vec<Segment>, TranscriptError>;
}

#[derive(Debug, Deserialize)]
struct InnerTubePlayerResponse {
    captions: Option<CaptionsData>,
}

#[derive(Debug, Deserialize)]
struct CaptionsData {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    player_captions_tracklist_renderer: Option<CaptionTracklistRenderer>,
}

#[derive(Debug, Deserialize)]
struct CaptionTracklistRenderer {
    #[serde(rename = "captionTracks")]
    caption_tracks: Option<Vec<CaptionTrack>>,
}

#[derive(Debug, Clone, Deserialize)]
struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode")]
    language_code: String,
    /// "asr" for auto-generated tracks
    kind: Option<String>,
}

/// Caption tracks published on YouTube's watch page, fetched through the InnerTube player endpoint
#[derive(Debug, Clone)]
pub struct CaptionClient {
    client: reqwest::Client,
    base_url: String,
}

impl CaptionClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Serve the watch page and player endpoint from somewhere other than youtube.com
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn innertube_api_key(&self, video_id: &str) -> Result<String> {
        debug!("Fetching watch page for {video_id}");

        let page_html = self
            .client
            .get(format!("{}/watch", self.base_url))
            .query(&[("v", video_id)])
            .header("User-Agent", USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        extract_api_key(&page_html)
    }

    async fn caption_tracks(&self, video_id: &str, lang: &str) -> Result<Option<Vec<CaptionTrack>>> {
        let api_key = self.innertube_api_key(video_id).await?;

        let body = serde_json::json!({
            "context": {
                "client": {
                    "hl": lang,
                    "gl": "US",
                    "clientName": "WEB",
                    "clientVersion": "2.20241126.01.00"
                }
            },
            "videoId": video_id
        });

        let resp: InnerTubePlayerResponse = self
            .client
            .post(format!("{}/youtubei/v1/player", self.base_url))
            .query(&[("key", api_key.as_str()), ("prettyPrint", "false")])
            .header("User-Agent", USER_AGENT)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .wrap_err("unexpected InnerTube player response")?;

        Ok(resp
            .captions
            .and_then(|c| c.player_captions_tracklist_renderer)
            .and_then(|r| r.caption_tracks))
    }

    async fn download_track(&self, track: &CaptionTrack) -> Result<Vec<Segment>> {
        let caption_xml = self
            .client
            .get(&track.base_url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_caption_xml(&caption_xml)
    }
}

#[async_trait]
impl TranscriptProvider for CaptionClient {
    async fn fetch(&self, video_id: &str, lang: &str) -> Result<Vec<Segment>, TranscriptError> {
        let tracks = self
            .caption_tracks(video_id, lang)
            .await?
            .filter(|tracks| !tracks.is_empty())
            .ok_or_else(|| TranscriptError::Disabled(video_id.to_string()))?;

        let track = select_track(&tracks, lang).ok_or_else(|| TranscriptError::NotFound {
            video_id: video_id.to_string(),
            lang: lang.to_string(),
        })?;
        debug!(
            "Using caption track for {video_id}: lang={} kind={:?}",
            track.language_code, track.kind
        );

        Ok(self.download_track(track).await?)
    }
}

/// Pick the track in exactly `lang`, preferring a manually created one over auto-generated
fn select_track<'a>(tracks: &'a [CaptionTrack], lang: &str) -> Option<&'a CaptionTrack> {
    let mut matching = tracks.iter().filter(|t| t.language_code == lang);
    let first = matching.next()?;
    if first.kind.as_deref() != Some("asr") {
        return Some(first);
    }
    matching.find(|t| t.kind.as_deref() != Some("asr")).or(Some(first))
}

fn extract_api_key(html: &str) -> Result<String> {
    let re = Regex::new(r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#)?;
    if let Some(caps) = re.captures(html) {
        return Ok(caps[1].to_string());
    }

    let re2 = Regex::new(r#"innertubeApiKey\s*[=:]\s*"([^"]+)""#)?;
    if let Some(caps) = re2.captures(html) {
        return Ok(caps[1].to_string());
    }

    bail!("could not extract InnerTube API key from watch page");
}

fn parse_caption_xml(xml: &str) -> Result<Vec<Segment>> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(xml);
    let mut segments = Vec::new();
    let mut timing: Option<(f64, f64)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"text" => {
                let mut start = None;
                let mut dur = None;
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).parse::<f64>().ok();
                    match attr.key.as_ref() {
                        b"start" => start = value,
                        b"dur" => dur = value,
                        _ => {}
                    }
                }
                // Some tracks omit dur on the final cue
                timing = start.map(|s| (s, dur.unwrap_or(0.0)));
            }
            Ok(Event::Text(ref e)) => {
                if let Some((start, duration)) = timing.take() {
                    let raw_text = e.unescape().unwrap_or_default();
                    let text = html_escape::decode_html_entities(&raw_text).trim().to_string();
                    if !text.is_empty() {
                        segments.push(Segment { text, start, duration });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => bail!("error parsing caption XML: {e}"),
            _ => {}
        }
    }

    Ok(segments)
}
