//! Run statistics over the post log and ledger, printed by `--stats`.

use crate::models::PostRecord;
use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct BotStats {
    pub total_posts: usize,
    pub today_posts: usize,
    pub successful_posts: usize,
    pub failed_posts: usize,
    pub total_posted_links: usize,
    /// Percentage, 0.0 when nothing has been posted.
    pub success_rate: f64,
}

impl BotStats {
    /// `today` is matched against the date prefix of each record's timestamp.
    pub fn collect(records: &[PostRecord], total_posted_links: usize, today: NaiveDate) -> Self {
        let today = today.format("%Y-%m-%d").to_string();
        let total_posts = records.len();
        let successful_posts = records.iter().filter(|r| r.success).count();
        let success_rate = if total_posts > 0 {
            successful_posts as f64 / total_posts as f64 * 100.0
        } else {
            0.0
        };
        Self {
            total_posts,
            today_posts: records.iter().filter(|r| r.timestamp.starts_with(&today)).count(),
            successful_posts,
            failed_posts: total_posts - successful_posts,
            total_posted_links,
            success_rate,
        }
    }
}

impl fmt::Display for BotStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total posts:       {}", self.total_posts)?;
        writeln!(f, "Posts today:       {}", self.today_posts)?;
        writeln!(f, "Successful:        {}", self.successful_posts)?;
        writeln!(f, "Failed:            {}", self.failed_posts)?;
        writeln!(f, "Ledger entries:    {}", self.total_posted_links)?;
        write!(f, "Success rate:      {:.1}%", self.success_rate)
    }
}
