//! Persisted record storage with file locking.
//!
//! The whole client state lives in one JSON file under a fixed name. Reads
//! take a shared lock, writes go through a locked temp file that is renamed
//! over the original.

use crate::{AppState, Error, Result};
use fs2::FileExt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Fixed storage key of the persisted record
pub const STORAGE_KEY: &str = "biorhythm-storage";

/// Location of the persisted record inside a data directory
pub fn state_path(data_dir: &Path) -> PathBuf {
    data_dir.join(format!("{}.json", STORAGE_KEY))
}

/// Read the whole file under a shared lock
fn read_shared(path: &Path) -> std::io::Result<String> {
    let file = File::open(path)?;
    file.lock_shared()?;
    let mut contents = String::new();
    let read = (&file).read_to_string(&mut contents);
    let unlocked = file.unlock();
    read?;
    unlocked?;
    Ok(contents)
}

impl AppState {
    /// Load the record, or the default record when there is nothing usable
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_or(path, Self::default())
    }

    /// Load the record, using `fallback` when there is nothing usable on disk
    ///
    /// Unreadable or unparseable files log a warning and yield `fallback`.
    /// Whatever loads is passed through [`AppState::sanitize`].
    pub fn load_or(path: &Path, fallback: AppState) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No record at {:?} yet, starting fresh", path);
            return Ok(fallback);
        }

        let contents = match read_shared(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!("Cannot read record {:?} ({}), starting fresh", path, e);
                return Ok(fallback);
            }
        };

        let mut state = match serde_json::from_str::<AppState>(&contents) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("Record {:?} is not valid ({}), starting fresh", path, e);
                return Ok(fallback);
            }
        };
        state.sanitize();
        tracing::debug!(
            "Loaded record from {:?} ({} archived fasts)",
            path,
            state.history.len()
        );
        Ok(state)
    }

    /// Replace the record on disk
    ///
    /// The JSON goes to a locked temp file in the same directory, is synced,
    /// then renamed over `path`. A non-finite target is refused and the file
    /// on disk is left as it was.
    pub fn save(&self, path: &Path) -> Result<()> {
        if !self.target_hours.is_finite() {
            return Err(Error::State(format!(
                "refusing to save target of {} hours",
                self.target_hours
            )));
        }

        let parent = path
            .parent()
            .ok_or_else(|| Error::State(format!("state path {:?} has no parent", path)))?;
        std::fs::create_dir_all(parent)?;

        let contents = serde_json::to_string(self)?;
        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved record to {:?}", path);
        Ok(())
    }
}
