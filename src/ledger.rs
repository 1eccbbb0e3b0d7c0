//! The "already posted" ledger.
//!
//! An append-only text file with one `YYYY-MM-DD|link` record per line.
//! Only records dated today take part in duplicate filtering; older ones are
//! kept but never match. The file is scanned in full on every run.
//!
//! Links are appended at selection time, before anything is published. A
//! crash between the append and the publish therefore skips that link for
//! the rest of the day instead of posting it twice.

use chrono::NaiveDate;
use std::collections::HashSet;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

const DELIMITER: char = '|';
const DATE_FORMAT: &str = "%Y-%m-%d";

/// File-backed record of links scheduled for posting, keyed by date.
#[derive(Debug, Clone)]
pub struct DedupLedger {
    path: PathBuf,
}

/// Links recorded under `date` in ledger text. Malformed lines are skipped.
pub fn links_for_date(contents: &str, date: NaiveDate) -> HashSet<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| line.split_once(DELIMITER))
        .filter(|(d, link)| {
            !link.is_empty()
                && NaiveDate::parse_from_str(d, DATE_FORMAT).is_ok_and(|parsed| parsed == date)
        })
        .map(|(_, link)| link.to_string())
        .collect()
}

fn render_records(links: &[String], date: NaiveDate) -> String {
    let date = date.format(DATE_FORMAT);
    links
        .iter()
        .map(|link| format!("{date}{DELIMITER}{link}\n"))
        .collect()
}

impl DedupLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Links already recorded for `date`.
    ///
    /// A missing file is an empty ledger. A file that exists but cannot be
    /// read is reported and also treated as empty.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), %date))]
    pub async fn load_today(&self, date: NaiveDate) -> HashSet<String> {
        if !self.path.exists() {
            return HashSet::new();
        }
        match fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let posted = links_for_date(&contents, date);
                info!(count = posted.len(), "Loaded posted links for today");
                posted
            }
            Err(e) => {
                warn!(error = %e, "Error loading posted links; treating ledger as empty");
                HashSet::new()
            }
        }
    }

    /// Append one record per link, in order. Existing records are untouched.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), %date, count = links.len()))]
    pub async fn append(&self, links: &[String], date: NaiveDate) -> Result<(), Box<dyn Error>> {
        if links.is_empty() {
            return Ok(());
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(render_records(links, date).as_bytes()).await?;
        file.flush().await?;
        info!("Saved new links to ledger");
        Ok(())
    }

    /// Number of non-blank records across all dates.
    pub async fn total_records(&self) -> usize {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => contents.lines().filter(|l| !l.trim().is_empty()).count(),
            Err(_) => 0,
        }
    }
}
