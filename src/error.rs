use thiserror::Error;

/// Failures that end a run (or, for `InvalidInput`, prevent one from starting)
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("invalid or unsupported YouTube channel URL: {0}")]
    InvalidChannelUrl(String),

    #[error("channel could not be resolved: {0}")]
    ChannelNotFound(String),

    #[error("channel lookup failed: {0}")]
    ResolutionFailure(String),

    #[error("failed to list videos: {0}")]
    ListingFailure(String),

    #[error("failed to fetch video statistics: {0}")]
    StatisticsFailure(String),

    #[error("failed to write {path}: {message}")]
    ExportFailure { path: String, message: String },
}

/// Per-video transcript failures; none of these abort a run
#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("transcripts are disabled for video {0}")]
    Disabled(String),

    #[error("no transcript in language '{lang}' for video {video_id}")]
    NotFound { video_id: String, lang: String },

    #[error("{0}")]
    Other(String),
}

impl From<eyre::Report> for TranscriptError {
    fn from(err: eyre::Report) -> Self {
        TranscriptError::Other(report_chain(&err))
    }
}

/// Render an eyre report and all of its causes on one line
pub fn report_chain(err: &eyre::Report) -> String {
    err.chain().map(|e| e.to_string()).collect::<Vec<_>>().join(": ")
}
