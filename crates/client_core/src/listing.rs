//! Local browsing over the reported-item collection.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use shared::{category::DEFAULT_CATEGORY, protocol::LostItem};

use crate::{api::LostFoundApi, error::Result};

pub const ALL: &str = "All";

/// Recency window relative to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeRange {
    #[default]
    All,
    Last24Hours,
    Last7Days,
    Last30Days,
}

impl TimeRange {
    pub fn window(self) -> Option<Duration> {
        match self {
            Self::All => None,
            Self::Last24Hours => Some(Duration::hours(24)),
            Self::Last7Days => Some(Duration::days(7)),
            Self::Last30Days => Some(Duration::days(30)),
        }
    }

    /// Bounds are inclusive: an item exactly one window old still matches.
    pub fn contains(self, added_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.window() {
            None => true,
            Some(window) => now - added_at <= window,
        }
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "24h" => Ok(Self::Last24Hours),
            "7d" => Ok(Self::Last7Days),
            "30d" => Ok(Self::Last30Days),
            other => Err(format!(
                "unknown time range '{other}' (expected all, 24h, 7d or 30d)"
            )),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::All => "All",
            Self::Last24Hours => "24h",
            Self::Last7Days => "7d",
            Self::Last30Days => "30d",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl CategoryFilter {
    /// `"All"` (any case) selects everything; anything else is an exact match.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case(ALL) {
            Self::All
        } else {
            Self::Only(raw.to_string())
        }
    }

    pub fn matches(&self, item: &LostItem) -> bool {
        match self {
            Self::All => true,
            Self::Only(category) => item.category == *category,
        }
    }
}

/// Items passing both filters, in their original order.
pub fn filter_items<'a>(
    items: &'a [LostItem],
    category: &CategoryFilter,
    range: TimeRange,
    now: DateTime<Utc>,
) -> Vec<&'a LostItem> {
    items
        .iter()
        .filter(|item| category.matches(item) && range.contains(item.added_at, now))
        .collect()
}

/// Filter choices: `"All"`, then each category in first-seen order.
pub fn categories(items: &[LostItem]) -> Vec<String> {
    let mut out = vec![ALL.to_string()];
    for item in items {
        let category = if item.category.is_empty() {
            DEFAULT_CATEGORY
        } else {
            item.category.as_str()
        };
        if !out.iter().any(|seen| seen == category) {
            out.push(category.to_string());
        }
    }
    out
}

/// Compact age label: `42s`, `5m`, `3h`, or the calendar date past a day.
pub fn format_relative(added_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - added_at).num_seconds();
    if secs < 60 {
        format!("{}s", secs.max(0))
    } else if secs < 3_600 {
        format!("{}m", secs / 60)
    } else if secs < 86_400 {
        format!("{}h", secs / 3_600)
    } else {
        added_at.format("%Y-%m-%d").to_string()
    }
}

pub async fn load_listing(api: &dyn LostFoundApi) -> Result<Vec<LostItem>> {
    let items = api.list_items().await?;
    tracing::debug!(count = items.len(), "listing: loaded reported items");
    Ok(items)
}

#[cfg(test)]
#[path = "tests/listing_tests.rs"]
mod tests;
