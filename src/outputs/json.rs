//! The JSON post log.
//!
//! Every publish attempt is appended to a single JSON array on disk:
//!
//! ```text
//! [
//!   {"timestamp": "2024-06-10T09:30:00+05:30", "title": "...", "link": "...",
//!    "tweet": "...", "success": true}
//! ]
//! ```
//!
//! The whole array is read, extended and rewritten for each record. A missing
//! or unparseable file reads as an empty log.

use crate::models::PostRecord;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone)]
pub struct PostLog {
    path: PathBuf,
}

impl PostLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records in the log, oldest first.
    pub async fn read_all(&self) -> Vec<PostRecord> {
        if !self.path.exists() {
            return Vec::new();
        }
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not read post log");
                return Vec::new();
            }
        };
        match serde_json::from_str(&text) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Post log is not valid JSON; starting fresh");
                Vec::new()
            }
        }
    }

    /// Append one record and rewrite the file.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display(), link = %record.link))]
    pub async fn append(&self, record: PostRecord) -> Result<(), Box<dyn Error>> {
        let mut records = self.read_all().await;
        records.push(record);
        let json = serde_json::to_string_pretty(&records)?;
        fs::write(&self.path, json).await?;
        debug!(records = records.len(), "Wrote post log");
        Ok(())
    }
}
