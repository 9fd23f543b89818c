use std::collections::HashSet;

use chrono::{DateTime, Utc};
use html2text::render::text_renderer::TrivialDecorator;
use tracing::{debug, warn};

use crate::api::{ParseResponse, RemoteFeed};
use crate::feed::{Subscription, SubscriptionStatus};
use crate::matcher::find_matching_feed;
use crate::models::{Article, FeedError};
use crate::normalize::normalize_url;
use crate::sort::sort_articles_by_date;

pub const DEFAULT_SUMMARY_LENGTH: usize = 300;
pub const DEFAULT_MAX_TITLE_LENGTH: usize = 100;

const ELLIPSIS: &str = "...";

/// Cuts `text` to `max_chars` characters and appends `...` when shortened.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_owned(),
        Some((cut, _)) => format!("{}{ELLIPSIS}", &text[..cut]),
    }
}

pub fn truncate_title(title: &str, max_chars: usize) -> String {
    truncate(title, max_chars)
}

/// Plain-text feed title: tags removed, entities decoded, whitespace collapsed.
pub fn sanitize_feed_title(title: &str) -> String {
    if title.trim().is_empty() {
        return String::new();
    }
    let text = html2text::from_read_with_decorator(title.as_bytes(), 4096, TrivialDecorator::new());
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Local articles for one matched feed.
pub fn articles_from_feed(
    subscription: &Subscription,
    feed: &RemoteFeed,
    max_summary: usize,
) -> Vec<Article> {
    let feed_title = match sanitize_feed_title(&feed.title) {
        title if title.is_empty() => subscription.display_title().to_owned(),
        title => title,
    };

    feed.articles
        .iter()
        .enumerate()
        .map(|(index, remote)| Article {
            id: Article::article_id(&subscription.id, &remote.link),
            title: remote.title.clone(),
            link: remote.link.clone(),
            pub_date: remote
                .pub_date
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_owned),
            summary: truncate(&remote.summary, max_summary),
            feed_id: subscription.id.clone(),
            feed_title: feed_title.clone(),
            feed_order: index,
        })
        .collect()
}

/// Result of reconciling one API batch with the local subscriptions.
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    /// Every article of every matched feed, date-sorted.
    pub articles: Vec<Article>,
    /// Subscriptions in their original order, with refreshed titles and status.
    pub subscriptions: Vec<Subscription>,
    pub errors: Vec<FeedError>,
    pub unmatched: Vec<String>,
}

pub fn reconcile(
    subscriptions: &[Subscription],
    response: &ParseResponse,
    now: DateTime<Utc>,
    max_summary: usize,
) -> SyncOutcome {
    let failed: HashSet<String> = response
        .errors
        .iter()
        .map(|e| normalize_url(&e.url))
        .collect();

    let mut outcome = SyncOutcome::default();
    let mut articles = Vec::new();

    for subscription in subscriptions {
        let mut updated = subscription.clone();
        match find_matching_feed(subscription, &response.feeds) {
            Some(feed) => {
                let title = sanitize_feed_title(&feed.title);
                if !title.is_empty() {
                    updated.title = Some(title);
                }
                updated.last_fetched_at = Some(now);
                updated.status = SubscriptionStatus::Active;
                let items = articles_from_feed(&updated, feed, max_summary);
                debug!(subscription = %subscription.id, count = items.len(), "feed matched");
                articles.extend(items);
            }
            None if failed.contains(&normalize_url(&subscription.url)) => {
                updated.status = SubscriptionStatus::Error;
            }
            None => outcome.unmatched.push(subscription.id.clone()),
        }
        outcome.subscriptions.push(updated);
    }

    outcome.errors = response
        .errors
        .iter()
        .map(|err| {
            warn!(url = %err.url, message = %err.message, "feed failed to parse");
            FeedError {
                url: err.url.clone(),
                message: err.message.clone(),
                timestamp: now,
            }
        })
        .collect();

    outcome.articles = dedup_by_id(sort_articles_by_date(&articles));
    outcome
}

// The same subscription can appear twice in a response; keep the first copy.
fn dedup_by_id(articles: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|a| seen.insert(a.id.clone()))
        .collect()
}
