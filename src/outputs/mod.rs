//! Files the bot writes besides the ledger.
//!
//! - [`json`]: the post log, one record per publish attempt
//! - [`stats`]: summary numbers over the post log and ledger
//!
//! ```text
//! ./
//! ├── bot_config.json    # run configuration
//! ├── posted_links.txt   # ledger (see crate::ledger)
//! └── tweet_log.json     # post log
//! ```

pub mod json;
pub mod stats;
