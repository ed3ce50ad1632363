//! Interactive front end for a single scrape.
//!
//! The shell owns every piece of presentation state. The pipeline runs on one
//! background task and only talks back through `ShellEvent` messages, which the
//! foreground drains and applies on its own turn.

use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use log::{debug, error, info};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

use crate::ScrapeError;
use crate::captions::TranscriptProvider;
use crate::pipeline::{Job, Pipeline, RunOutcome};
use crate::youtube::VideoPlatform;

pub const DEFAULT_MAX_VIDEOS: usize = 5;

/// Raw operator input, exactly as typed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    pub api_key: String,
    pub channel_url: String,
    pub max_videos: String,
    pub output_dir: String,
}

/// A form that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub api_key: String,
    pub job: Job,
}

impl Form {
    pub fn validate(&self) -> Result<RunRequest, ScrapeError> {
        let api_key = self.api_key.trim();
        let channel_url = self.channel_url.trim();
        let max_videos = self.max_videos.trim();
        let output_dir = self.output_dir.trim();

        if api_key.is_empty() || channel_url.is_empty() || max_videos.is_empty() || output_dir.is_empty() {
            return Err(ScrapeError::InvalidInput("All fields are required.".to_string()));
        }

        let max_videos: usize = max_videos
            .parse()
            .map_err(|_| ScrapeError::InvalidInput("Max Videos must be a number.".to_string()))?;
        if max_videos == 0 {
            return Err(ScrapeError::InvalidInput("Max Videos must be at least 1.".to_string()));
        }

        let output_dir = PathBuf::from(output_dir);
        if !output_dir.is_dir() {
            return Err(ScrapeError::InvalidInput(format!(
                "Save folder is not a directory: {}",
                output_dir.display()
            )));
        }

        Ok(RunRequest {
            api_key: api_key.to_string(),
            job: Job {
                channel_url: channel_url.to_string(),
                max_videos,
                output_dir,
            },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ready,
    Running,
    Completed,
    NoTranscripts,
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Status::Ready => "Ready",
            Status::Running => "Scraping in progress...",
            Status::Completed => "Completed successfully.",
            Status::NoTranscripts => "No transcripts found.",
            Status::Failed => "Error occurred.",
        };
        write!(f, "{text}")
    }
}

/// Messages from the worker to the foreground
#[derive(Debug)]
pub enum ShellEvent {
    Log(String),
    Finished(Result<RunOutcome, ScrapeError>),
}

/// The blocking notification shown when a run ends (or is refused)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(PathBuf),
    Finished,
    Error(String),
}

impl Notice {
    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Success(_) => write!(f, "Success: Scraping completed successfully."),
            Notice::Finished => write!(f, "Finished: No transcripts collected."),
            Notice::Error(message) => write!(f, "Error: {message}"),
        }
    }
}

#[derive(Debug)]
pub struct Shell {
    status: Status,
    log: Vec<String>,
    running: bool,
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

impl Shell {
    pub fn new() -> Self {
        Self {
            status: Status::Ready,
            log: Vec::new(),
            running: false,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    /// False while a run is in flight
    pub fn trigger_enabled(&self) -> bool {
        !self.running
    }

    /// Record a validation failure in the log without starting anything; status stays `Ready`
    pub fn reject(&mut self, err: &ScrapeError) -> Notice {
        debug!("Rejected form: {err}");
        let notice = Notice::Error(err.to_string());
        self.log.push(notice.to_string());
        notice
    }

    /// Launch `pipeline` on a background task. Only one run may be in flight.
    pub fn start<P, T>(&mut self, pipeline: Pipeline<P, T>, job: Job) -> Result<UnboundedReceiver<ShellEvent>, ScrapeError>
    where
        P: VideoPlatform + 'static,
        T: TranscriptProvider + 'static,
    {
        if self.running {
            return Err(ScrapeError::InvalidInput("A scrape is already in progress.".to_string()));
        }

        self.running = true;
        self.status = Status::Running;
        self.log.clear();
        info!("Starting scrape of {} (max {} videos)", job.channel_url, job.max_videos);

        let (tx, rx) = unbounded_channel();
        tokio::spawn(async move {
            let log_tx = tx.clone();
            let sink = move |line: &str| {
                let _ = log_tx.send(ShellEvent::Log(line.to_string()));
            };
            let result = pipeline.run(&job, &sink).await;
            let _ = tx.send(ShellEvent::Finished(result));
        });

        Ok(rx)
    }

    /// Fold one worker message into the shell state. Returns the notice once the run ends.
    pub fn apply(&mut self, event: ShellEvent) -> Option<Notice> {
        match event {
            ShellEvent::Log(line) => {
                self.log.push(line);
                None
            }
            ShellEvent::Finished(result) => {
                self.running = false;
                let notice = match result {
                    Ok(RunOutcome::Saved(path)) => {
                        self.status = Status::Completed;
                        Notice::Success(path)
                    }
                    Ok(RunOutcome::Empty) => {
                        self.status = Status::NoTranscripts;
                        Notice::Finished
                    }
                    Err(e) => {
                        error!("Scrape failed: {e}");
                        self.status = Status::Failed;
                        Notice::Error(e.to_string())
                    }
                };
                Some(notice)
            }
        }
    }

    /// Drain worker messages until the run ends, handing each new log line to `on_line`
    pub async fn wait(&mut self, mut rx: UnboundedReceiver<ShellEvent>, mut on_line: impl FnMut(&str)) -> Notice {
        while let Some(event) = rx.recv().await {
            if let ShellEvent::Log(ref line) = event {
                on_line(line);
            }
            if let Some(notice) = self.apply(event) {
                return notice;
            }
        }

        error!("Worker exited without reporting an outcome");
        self.running = false;
        self.status = Status::Failed;
        Notice::Error("the scrape stopped unexpectedly".to_string())
    }
}

/// Ask for each field on `output`, reading answers from `input`. A blank answer keeps the prefilled value.
pub fn prompt_form<R: BufRead, W: Write>(prefilled: &Form, input: &mut R, output: &mut W) -> io::Result<Form> {
    Ok(Form {
        api_key: prompt(input, output, "YouTube API Key", &prefilled.api_key, &mask(&prefilled.api_key))?,
        channel_url: prompt(input, output, "Channel URL", &prefilled.channel_url, &prefilled.channel_url)?,
        max_videos: prompt(input, output, "Max Videos", &prefilled.max_videos, &prefilled.max_videos)?,
        output_dir: prompt(input, output, "Save Folder", &prefilled.output_dir, &prefilled.output_dir)?,
    })
}

fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W, label: &str, default: &str, shown: &str) -> io::Result<String> {
    if shown.is_empty() {
        write!(output, "{label}: ")?;
    } else {
        write!(output, "{label} [{shown}]: ")?;
    }
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let answer = line.trim();
    Ok(if answer.is_empty() { default.to_string() } else { answer.to_string() })
}

/// Show only the last four characters of a secret
fn mask(secret: &str) -> String {
    let count = secret.chars().count();
    if count == 0 {
        return String::new();
    }
    let visible: String = secret.chars().skip(count.saturating_sub(4)).collect();
    format!("{}{visible}", "*".repeat(count.saturating_sub(4).min(8)))
}

/// Prefill the form from whatever the command line and config file supplied
pub fn prefill(api_key: Option<&str>, channel_url: Option<&str>, max_videos: Option<usize>, output_dir: Option<&Path>) -> Form {
    Form {
        api_key: api_key.unwrap_or_default().to_string(),
        channel_url: channel_url.unwrap_or_default().to_string(),
        max_videos: max_videos.unwrap_or(DEFAULT_MAX_VIDEOS).to_string(),
        output_dir: output_dir.map(|p| p.display().to_string()).unwrap_or_default(),
    }
}
