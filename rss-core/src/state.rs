use crate::merge::{find_new_articles, merge_articles};
use crate::models::{Article, FeedError};

/// Article collection plus the view over it (search, feed filter, pending).
#[derive(Debug, Clone, Default)]
pub struct ArticleState {
    articles: Vec<Article>,
    displayed: Vec<Article>,
    search_query: String,
    selected_feed_id: Option<String>,
    errors: Vec<FeedError>,
    pending: Vec<Article>,
    last_polled_at: Option<i64>,
}

fn filter_articles(articles: &[Article], query: &str, feed_id: Option<&str>) -> Vec<Article> {
    let needle = query.to_lowercase();
    articles
        .iter()
        .filter(|a| feed_id.map_or(true, |id| a.feed_id == id))
        .filter(|a| {
            needle.is_empty()
                || a.title.to_lowercase().contains(&needle)
                || a.summary.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

impl ArticleState {
    fn refilter(&mut self) {
        self.displayed = filter_articles(
            &self.articles,
            &self.search_query,
            self.selected_feed_id.as_deref(),
        );
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    pub fn displayed(&self) -> &[Article] {
        &self.displayed
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn selected_feed_id(&self) -> Option<&str> {
        self.selected_feed_id.as_deref()
    }

    pub fn errors(&self) -> &[FeedError] {
        &self.errors
    }

    pub fn pending(&self) -> &[Article] {
        &self.pending
    }

    pub fn has_new_articles(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn new_articles_count(&self) -> usize {
        self.pending.len()
    }

    pub fn last_polled_at(&self) -> Option<i64> {
        self.last_polled_at
    }

    /// Full replacement, as after a manual fetch.
    pub fn set_articles(&mut self, articles: Vec<Article>) {
        self.articles = articles;
        self.refilter();
    }

    pub fn add_error(&mut self, error: FeedError) {
        self.errors.push(error);
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
        self.refilter();
    }

    pub fn select_feed(&mut self, feed_id: Option<String>) {
        self.selected_feed_id = feed_id;
        self.refilter();
    }

    pub fn set_pending(&mut self, pending: Vec<Article>) {
        self.pending = pending;
    }

    pub fn set_last_polled_at(&mut self, at: Option<i64>) {
        self.last_polled_at = at;
    }

    /// Merges pending articles in and clears them; returns how many were added.
    pub fn apply_pending(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending);
        // A manual fetch may have landed since the poll that found them.
        let fresh = find_new_articles(&pending, &self.articles);
        let added = fresh.len();
        self.articles = merge_articles(&self.articles, &fresh);
        self.refilter();
        added
    }

    /// Drops articles and pending items belonging to `feed_id`.
    pub fn remove_feed(&mut self, feed_id: &str) {
        self.articles.retain(|a| a.feed_id != feed_id);
        self.pending.retain(|a| a.feed_id != feed_id);
        if self.selected_feed_id.as_deref() == Some(feed_id) {
            self.selected_feed_id = None;
        }
        self.refilter();
    }
}
