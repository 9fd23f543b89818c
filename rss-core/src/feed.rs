use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::TitleError;

pub const MAX_CUSTOM_TITLE_LENGTH: usize = 200;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    #[default]
    Active,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub custom_title: Option<String>,
    pub subscribed_at: DateTime<Utc>,
    #[serde(default)]
    pub last_fetched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: SubscriptionStatus,
}

impl Subscription {
    pub fn new(url: impl Into<String>, title: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            url: url.into(),
            title,
            custom_title: None,
            subscribed_at: Utc::now(),
            last_fetched_at: None,
            status: SubscriptionStatus::Active,
        }
    }

    /// Custom title first, then the feed's own title, then the URL.
    pub fn display_title(&self) -> &str {
        if let Some(custom) = self.custom_title.as_deref().filter(|t| !t.trim().is_empty()) {
            return custom;
        }
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.url)
    }

    pub fn has_custom_title(&self) -> bool {
        self.custom_title
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Returns the trimmed title when it is acceptable as a custom feed name.
pub fn validate_custom_title(input: &str) -> Result<String, TitleError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TitleError::EmptyTitle);
    }
    if trimmed.chars().count() > MAX_CUSTOM_TITLE_LENGTH {
        return Err(TitleError::TitleTooLong {
            max: MAX_CUSTOM_TITLE_LENGTH,
        });
    }
    Ok(trimmed.to_owned())
}

pub type SharedSubscriptions = Arc<RwLock<Vec<Subscription>>>;

pub fn shared_subscriptions(initial: Vec<Subscription>) -> SharedSubscriptions {
    Arc::new(RwLock::new(initial))
}

pub async fn add_subscription(store: &SharedSubscriptions, subscription: Subscription) {
    let mut subs = store.write().await;
    subs.retain(|existing| existing.id != subscription.id);
    subs.push(subscription);
}

pub async fn remove_subscription(store: &SharedSubscriptions, id: &str) -> Option<Subscription> {
    let mut subs = store.write().await;
    let index = subs.iter().position(|existing| existing.id == id)?;
    Some(subs.remove(index))
}

/// Replaces the entry carrying the same id; returns false when there is none.
pub async fn update_subscription(store: &SharedSubscriptions, subscription: Subscription) -> bool {
    let mut subs = store.write().await;
    match subs.iter_mut().find(|existing| existing.id == subscription.id) {
        Some(slot) => {
            *slot = subscription;
            true
        }
        None => false,
    }
}

pub async fn list_subscriptions(store: &SharedSubscriptions) -> Vec<Subscription> {
    store.read().await.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(title: Option<&str>, custom: Option<&str>) -> Subscription {
        Subscription {
            custom_title: custom.map(str::to_owned),
            ..Subscription::new("https://example.com/feed", title.map(str::to_owned))
        }
    }

    #[test]
    fn display_title_prefers_custom_then_title_then_url() {
        assert_eq!(sub(Some("Blog"), Some("Mine")).display_title(), "Mine");
        assert_eq!(sub(Some("Blog"), None).display_title(), "Blog");
        assert_eq!(sub(None, None).display_title(), "https://example.com/feed");
        assert_eq!(sub(Some("Blog"), Some("")).display_title(), "Blog");
        assert_eq!(sub(Some("Blog"), Some("   ")).display_title(), "Blog");
    }

    #[test]
    fn blank_feed_title_falls_back_to_url() {
        assert_eq!(sub(Some(""), None).display_title(), "https://example.com/feed");
        assert_eq!(sub(Some("  "), Some("")).display_title(), "https://example.com/feed");
    }

    #[test]
    fn has_custom_title_ignores_blank_values() {
        assert!(sub(None, Some("Mine")).has_custom_title());
        assert!(!sub(None, None).has_custom_title());
        assert!(!sub(None, Some("  ")).has_custom_title());
    }

    #[test]
    fn custom_title_validation() {
        assert_eq!(validate_custom_title("  Valid Title  ").unwrap(), "Valid Title");
        assert_eq!(validate_custom_title("   "), Err(TitleError::EmptyTitle));
        assert!(validate_custom_title(&"A".repeat(200)).is_ok());
        assert_eq!(
            validate_custom_title(&"A".repeat(201)),
            Err(TitleError::TitleTooLong { max: 200 })
        );
    }

    #[test]
    fn subscription_uses_camel_case_on_disk() {
        let json = serde_json::to_value(sub(Some("Blog"), None)).unwrap();
        assert!(json.get("customTitle").is_some());
        assert!(json.get("subscribedAt").is_some());
        assert_eq!(json["status"], "active");
    }

    #[tokio::test]
    async fn shared_list_add_update_remove() {
        let store = shared_subscriptions(Vec::new());
        let mut first = sub(None, None);
        add_subscription(&store, first.clone()).await;
        assert_eq!(list_subscriptions(&store).await.len(), 1);

        first.title = Some("Renamed".into());
        assert!(update_subscription(&store, first.clone()).await);
        assert_eq!(list_subscriptions(&store).await[0].title.as_deref(), Some("Renamed"));

        assert!(remove_subscription(&store, &first.id).await.is_some());
        assert!(remove_subscription(&store, &first.id).await.is_none());
        assert!(list_subscriptions(&store).await.is_empty());
    }
}
