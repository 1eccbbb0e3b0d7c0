//! Small text and date helpers used throughout the application.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

/// Used when an entry carries no summary at all.
pub const NO_SUMMARY_PLACEHOLDER: &str = "More details in the article.";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Current time in the bot's fixed time zone.
pub fn now_in(tz: FixedOffset) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&tz)
}

/// Today's calendar date in the bot's fixed time zone.
pub fn today_in(tz: FixedOffset) -> NaiveDate {
    now_in(tz).date_naive()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` bytes (backed off to a char boundary) with
/// an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Keep at most `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Capitalize the first character of a string.
///
/// ```ignore
/// assert_eq!(upcase("hello"), "Hello");
/// assert_eq!(upcase(""), "");
/// ```
pub fn upcase(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
    }
}

/// Reduce a feed summary to plain single-line text.
///
/// Summaries often carry HTML markup; the text nodes are kept and all runs
/// of whitespace (newlines included) collapse to one space.
pub fn plain_text(summary: &str) -> String {
    let text = if summary.contains('<') {
        let fragment = Html::parse_fragment(summary);
        fragment.root_element().text().collect::<Vec<_>>().join(" ")
    } else {
        summary.to_string()
    };
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// First one or two sentences of a plain-text summary.
///
/// Splits on `". "`, keeps the first two fragments, and always ends with a
/// period. An empty summary yields [`NO_SUMMARY_PLACEHOLDER`].
pub fn excerpt(summary: &str) -> String {
    if summary.is_empty() {
        return NO_SUMMARY_PLACEHOLDER.to_string();
    }
    let head = summary.split(". ").take(2).collect::<Vec<_>>().join(". ");
    format!("{head}.")
}
