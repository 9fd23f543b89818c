use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub link: String,
    /// Publication date as sent by the parse API.
    pub pub_date: Option<String>,
    pub summary: String,
    pub feed_id: String,
    pub feed_title: String,
    /// Position of the item in its source feed.
    pub feed_order: usize,
}

impl Article {
    pub fn article_id(subscription_id: &str, link: &str) -> String {
        format!("{subscription_id}-{link}")
    }

    /// Parsed publication instant, if the date is present and readable.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.pub_date.as_deref().and_then(parse_pub_date)
    }
}

pub(crate) fn parse_pub_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_rfc2822(value))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedError {
    pub url: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl FeedError {
    pub fn new(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
