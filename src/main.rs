use std::io;
use std::path::PathBuf;

use eyre::Result;
use log::{info, warn};

mod cli;

use cli::Cli;
use ytscrape::config::Config;
use ytscrape::pipeline::Pipeline;
use ytscrape::shell::{self, Shell};

fn setup_logging() -> Result<()> {
    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("ytscrape.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ytscrape")
        .join("logs")
}

fn build_after_help() -> String {
    format!(
        "\nConfig is read from: {}\nLogs are written to: {}",
        ytscrape::config::config_path().display(),
        log_dir().join("ytscrape.log").display()
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    let after_help = build_after_help();
    let cmd = <Cli as clap::CommandFactory>::command().after_help(after_help);
    let matches = cmd.get_matches();
    let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&matches)?;

    // Load config file (non-fatal if missing/invalid)
    let config = Config::load().unwrap_or_else(|e| {
        warn!("Ignoring config file {}: {e}", ytscrape::config::config_path().display());
        Config::default()
    });

    // CLI flags take priority over config
    let prefilled = shell::prefill(
        cli.api_key.as_deref().or(config.api_key.as_deref()),
        cli.channel_url.as_deref(),
        cli.max_videos.or(config.max_videos),
        cli.output_dir.as_deref().or(config.output_dir.as_deref()),
    );

    let form = if cli.yes {
        prefilled
    } else {
        let stdin = io::stdin();
        shell::prompt_form(&prefilled, &mut stdin.lock(), &mut io::stderr())?
    };

    let mut shell = Shell::new();
    eprintln!("Status: {}", shell.status());

    let request = match form.validate() {
        Ok(request) => request,
        Err(e) => {
            eprintln!("{}", shell.reject(&e));
            std::process::exit(1);
        }
    };

    let pipeline = Pipeline::youtube(&request.api_key, config.api_base_url.as_deref());
    let rx = shell.start(pipeline, request.job)?;
    eprintln!("Status: {}", shell.status());

    let notice = shell.wait(rx, |line| println!("{line}")).await;
    eprintln!("Status: {}", shell.status());
    eprintln!("{notice}");

    if notice.is_error() {
        std::process::exit(1);
    }
    Ok(())
}
