use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ytscrape",
    about = "Rank a YouTube channel's recent videos by views and export their transcripts to CSV",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Channel URL (@handle, /channel/ID, /user/NAME or /c/NAME)
    pub channel_url: Option<String>,

    /// YouTube Data API key
    #[arg(short = 'k', long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Maximum number of recent videos to fetch
    #[arg(short = 'n', long)]
    pub max_videos: Option<usize>,

    /// Folder the CSV file is written to
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Submit the prefilled values without prompting
    #[arg(short = 'y', long)]
    pub yes: bool,
}
