use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, SecondsFormat, Utc};
use eyre::Result;
use log::{debug, warn};
use serde::Serializer;

use crate::{ScrapeError, TranscriptRow};

/// `transcripts_<YYYYMMDD_HHMMSS>.csv` for the given capture time
pub fn output_filename(captured_at: DateTime<Local>) -> String {
    format!("transcripts_{}.csv", captured_at.format("%Y%m%d_%H%M%S"))
}

/// Render timestamps the way the Data API reports them, e.g. `2024-01-31T12:00:00Z`
pub fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Write a header row followed by one row per transcript. Refuses to overwrite an existing file.
pub fn write_csv(path: &Path, rows: &[TranscriptRow]) -> Result<()> {
    let file = OpenOptions::new().write(true).create_new(true).open(path)?;
    let mut writer = csv::Writer::from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write `rows` to a freshly named file under `dir`. A failed write leaves nothing behind.
pub fn export(dir: &Path, rows: &[TranscriptRow], captured_at: DateTime<Local>) -> Result<PathBuf, ScrapeError> {
    let path = dir.join(output_filename(captured_at));
    debug!("Writing {} rows to {}", rows.len(), path.display());

    if let Err(e) = write_csv(&path, rows) {
        let already_existed = e
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::AlreadyExists);
        if !already_existed && path.exists() {
            if let Err(rm) = std::fs::remove_file(&path) {
                warn!("Could not remove partial file {}: {rm}", path.display());
            }
        }
        return Err(ScrapeError::ExportFailure {
            path: path.display().to_string(),
            message: e.to_string(),
        });
    }

    Ok(path)
}
