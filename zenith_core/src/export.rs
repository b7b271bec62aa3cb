//! CSV export of the fasting history.

use crate::{FastingSession, Result};
use std::path::Path;

/// Column names, written even when there are no rows
const HEADER: [&str; 5] = ["id", "start_time", "end_time", "target_hours", "actual_hours"];

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    start_time: String,
    end_time: String,
    target_hours: f64,
    actual_hours: f64,
}

impl From<&FastingSession> for CsvRow {
    fn from(session: &FastingSession) -> Self {
        CsvRow {
            id: session.id.to_string(),
            start_time: session.start_time.to_rfc3339(),
            end_time: session.end_time.to_rfc3339(),
            target_hours: session.target_hours,
            actual_hours: session.actual_hours,
        }
    }
}

/// Write the history to `csv_path`, replacing any existing file
///
/// Rows keep history order (most recent first). The file is synced before
/// returning. Returns the number of rows written.
pub fn export_history_csv(history: &[FastingSession], csv_path: &Path) -> Result<usize> {
    if let Some(parent) = csv_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = std::fs::File::create(csv_path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    writer.write_record(HEADER)?;

    for session in history {
        writer.serialize(CsvRow::from(session))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Exported {} sessions to {:?}", history.len(), csv_path);
    Ok(history.len())
}
