use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use reqwest::Client;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::api::{FeedApiClient, ParseResponse};
use crate::config::AppConfig;
use crate::coordinator::RequestCoordinator;
use crate::error::{FeedApiError, ImportError, SubscriptionError};
use crate::feed::{
    add_subscription, list_subscriptions, remove_subscription, shared_subscriptions,
    update_subscription, validate_custom_title, SharedSubscriptions, Subscription,
};
use crate::import_export::{
    export_subscriptions, merge_subscriptions, parse_import, read_import_file, ImportSummary,
};
use crate::matcher::find_matching_feed;
use crate::merge::find_new_articles;
use crate::models::{Article, FeedError};
use crate::network::NetworkMonitor;
use crate::normalize::{is_valid_feed_url, normalize_url};
use crate::poller::{poll_callback, Poller, PollerHandle, PollingConfig};
use crate::state::ArticleState;
use crate::storage::LocalStore;
use crate::transform::{reconcile, sanitize_feed_title, truncate_title, SyncOutcome};

pub const TITLE_FETCH_FAILED: &str =
    "could not fetch the feed title; the URL will be used as its name";

/// Change notifications for whoever renders the reader.
#[derive(Debug, Clone, PartialEq)]
pub enum ReaderEvent {
    SubscriptionsChanged,
    ArticlesReplaced(usize),
    NewArticles(usize),
    PendingApplied(usize),
    FeedErrors(Vec<FeedError>),
    Advisory(String),
    PollingToggled(bool),
}

#[derive(Debug, Clone)]
pub struct AddOutcome {
    pub subscription: Subscription,
    /// Set when the title lookup failed and the URL stands in for it.
    pub advisory: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub articles: usize,
    pub new_articles: usize,
    pub errors: usize,
    /// A newer fetch started before this one finished; nothing was committed.
    pub superseded: bool,
}

struct ReaderInner {
    config: AppConfig,
    api: FeedApiClient,
    store: LocalStore,
    subscriptions: SharedSubscriptions,
    articles: RwLock<ArticleState>,
    polling: RwLock<PollingConfig>,
    fetches: RequestCoordinator,
    refreshing: AtomicUsize,
    events: broadcast::Sender<ReaderEvent>,
}

// Counts a manual refresh as in flight until dropped, whichever way it ends.
struct RefreshGuard<'a>(&'a AtomicUsize);

impl<'a> RefreshGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Application state shared by the front end and the poller.
#[derive(Clone)]
pub struct FeedReader {
    inner: Arc<ReaderInner>,
}

impl FeedReader {
    /// Loads persisted subscriptions and polling settings from `store`.
    pub async fn open(config: AppConfig, client: Client, store: LocalStore) -> Self {
        let api = FeedApiClient::new(client, config.api.base_url.clone())
            .with_timeout(config.api.request_timeout());
        let subscriptions = store.load_subscriptions().await;
        let polling = store
            .stored_polling_config()
            .await
            .unwrap_or(PollingConfig {
                polling_interval: config.polling.interval_ms,
                ..PollingConfig::default()
            });
        info!(count = subscriptions.len(), "loaded subscriptions");

        let mut articles = ArticleState::default();
        articles.set_last_polled_at(polling.last_polled_at);
        let (events, _) = broadcast::channel(64);

        Self {
            inner: Arc::new(ReaderInner {
                config,
                api,
                store,
                subscriptions: shared_subscriptions(subscriptions),
                articles: RwLock::new(articles),
                polling: RwLock::new(polling),
                fetches: RequestCoordinator::new(),
                refreshing: AtomicUsize::new(0),
                events,
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn api(&self) -> &FeedApiClient {
        &self.inner.api
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ReaderEvent> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: ReaderEvent) {
        let _ = self.inner.events.send(event);
    }

    pub async fn subscriptions(&self) -> Vec<Subscription> {
        list_subscriptions(&self.inner.subscriptions).await
    }

    pub async fn subscription_count(&self) -> usize {
        self.inner.subscriptions.read().await.len()
    }

    /// Articles after the search query and feed filter.
    pub async fn articles(&self) -> Vec<Article> {
        self.inner.articles.read().await.displayed().to_vec()
    }

    pub async fn all_articles(&self) -> Vec<Article> {
        self.inner.articles.read().await.articles().to_vec()
    }

    pub async fn errors(&self) -> Vec<FeedError> {
        self.inner.articles.read().await.errors().to_vec()
    }

    /// True while at least one manual refresh is in flight.
    pub fn is_loading(&self) -> bool {
        self.inner.refreshing.load(Ordering::SeqCst) > 0
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.articles.read().await.new_articles_count()
    }

    pub async fn polling_config(&self) -> PollingConfig {
        *self.inner.polling.read().await
    }

    async fn persist_subscriptions(&self) {
        let subs = self.subscriptions().await;
        self.inner.store.save_subscriptions(&subs).await;
    }

    pub async fn add_subscription(&self, url: &str) -> Result<AddOutcome, SubscriptionError> {
        let url = url.trim();
        if !is_valid_feed_url(url) {
            return Err(SubscriptionError::InvalidUrl(url.to_owned()));
        }

        {
            let subs = self.inner.subscriptions.read().await;
            let wanted = normalize_url(url);
            if subs.iter().any(|s| normalize_url(&s.url) == wanted) {
                return Err(SubscriptionError::Duplicate(url.to_owned()));
            }
            let limit = self.inner.config.feeds.max_subscriptions;
            if subs.len() >= limit {
                return Err(SubscriptionError::LimitReached(limit));
            }
        }

        let candidate = Subscription::new(url, None);
        let (title, advisory) = match self.inner.api.parse_feeds(&[url.to_owned()], None).await {
            Ok(response) => match find_matching_feed(&candidate, &response.feeds)
                .map(|feed| sanitize_feed_title(&feed.title))
                .filter(|title| !title.is_empty())
            {
                Some(title) => (
                    Some(truncate_title(&title, self.inner.config.feeds.max_title_length)),
                    None,
                ),
                None => (None, Some(TITLE_FETCH_FAILED.to_owned())),
            },
            Err(err) => {
                warn!(%url, error = %err, "title lookup failed, falling back to URL");
                (None, Some(TITLE_FETCH_FAILED.to_owned()))
            }
        };

        let subscription = Subscription { title, ..candidate };
        add_subscription(&self.inner.subscriptions, subscription.clone()).await;
        self.persist_subscriptions().await;
        info!(id = %subscription.id, url = %subscription.url, "subscribed");

        self.emit(ReaderEvent::SubscriptionsChanged);
        if let Some(message) = &advisory {
            self.emit(ReaderEvent::Advisory(message.clone()));
        }
        Ok(AddOutcome {
            subscription,
            advisory,
        })
    }

    pub async fn remove_subscription(&self, id: &str) -> Result<Subscription, SubscriptionError> {
        let removed = remove_subscription(&self.inner.subscriptions, id)
            .await
            .ok_or_else(|| SubscriptionError::NotFound(id.to_owned()))?;
        self.persist_subscriptions().await;
        self.inner.articles.write().await.remove_feed(id);
        info!(%id, "unsubscribed");
        self.emit(ReaderEvent::SubscriptionsChanged);
        Ok(removed)
    }

    pub async fn rename_subscription(
        &self,
        id: &str,
        custom_title: &str,
    ) -> Result<Subscription, SubscriptionError> {
        let custom_title = validate_custom_title(custom_title)?;
        let mut subscription = self
            .subscriptions()
            .await
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| SubscriptionError::NotFound(id.to_owned()))?;
        subscription.custom_title = Some(custom_title);
        if !update_subscription(&self.inner.subscriptions, subscription.clone()).await {
            return Err(SubscriptionError::NotFound(id.to_owned()));
        }
        self.persist_subscriptions().await;
        self.emit(ReaderEvent::SubscriptionsChanged);
        Ok(subscription)
    }

    async fn fetch_batch(
        &self,
        subscriptions: &[Subscription],
    ) -> Result<Option<SyncOutcome>, FeedApiError> {
        let token = self.inner.fetches.begin();
        let urls: Vec<String> = subscriptions.iter().map(|s| s.url.clone()).collect();
        let response: ParseResponse = match self.inner.api.parse_feeds(&urls, Some(&token)).await {
            Ok(response) => response,
            Err(err) if err.is_aborted() => return Ok(None),
            Err(err) => return Err(err),
        };
        if !token.is_current() {
            debug!("discarding superseded feed fetch");
            return Ok(None);
        }
        Ok(Some(reconcile(
            subscriptions,
            &response,
            Utc::now(),
            self.inner.config.feeds.max_summary_length,
        )))
    }

    // Refreshed titles and status are written back by id; a custom title or a
    // removal made while the request was in flight wins.
    async fn apply_refreshed(&self, refreshed: &[Subscription]) {
        {
            let mut subs = self.inner.subscriptions.write().await;
            for current in subs.iter_mut() {
                if let Some(fresh) = refreshed.iter().find(|r| r.id == current.id) {
                    current.title = fresh.title.clone();
                    current.last_fetched_at = fresh.last_fetched_at;
                    current.status = fresh.status;
                }
            }
        }
        self.persist_subscriptions().await;
        self.emit(ReaderEvent::SubscriptionsChanged);
    }

    // Articles of subscriptions removed while the request was in flight are
    // dropped. Callers hold the article lock, so a removal still racing
    // with this will clear its feed right after the commit.
    async fn retain_subscribed(&self, mut articles: Vec<Article>) -> Vec<Article> {
        let subs = self.inner.subscriptions.read().await;
        let live: HashSet<&str> = subs.iter().map(|s| s.id.as_str()).collect();
        articles.retain(|a| live.contains(a.feed_id.as_str()));
        articles
    }

    async fn record_failure(&self, err: &FeedApiError) {
        let error = FeedError::new("", err.to_string());
        let mut state = self.inner.articles.write().await;
        state.clear_errors();
        state.add_error(error.clone());
        drop(state);
        self.emit(ReaderEvent::FeedErrors(vec![error]));
    }

    /// Manual fetch: the article list is replaced by the API's current view.
    pub async fn refresh(&self) -> Result<SyncReport, FeedApiError> {
        let subscriptions = self.subscriptions().await;
        if subscriptions.is_empty() {
            let mut state = self.inner.articles.write().await;
            state.set_articles(Vec::new());
            state.clear_errors();
            return Ok(SyncReport::default());
        }

        let _refreshing = RefreshGuard::enter(&self.inner.refreshing);
        self.inner.articles.write().await.clear_errors();

        let outcome = match self.fetch_batch(&subscriptions).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                return Ok(SyncReport {
                    superseded: true,
                    ..SyncReport::default()
                })
            }
            Err(err) => {
                self.record_failure(&err).await;
                return Err(err);
            }
        };

        self.apply_refreshed(&outcome.subscriptions).await;
        let committed = {
            let mut state = self.inner.articles.write().await;
            let articles = self.retain_subscribed(outcome.articles).await;
            let count = articles.len();
            state.set_articles(articles);
            for error in &outcome.errors {
                state.add_error(error.clone());
            }
            count
        };
        let report = SyncReport {
            articles: committed,
            new_articles: 0,
            errors: outcome.errors.len(),
            superseded: false,
        };
        info!(articles = report.articles, errors = report.errors, "feeds refreshed");
        self.emit(ReaderEvent::ArticlesReplaced(report.articles));
        if !outcome.errors.is_empty() {
            self.emit(ReaderEvent::FeedErrors(outcome.errors));
        }
        Ok(report)
    }

    /// Background fetch: unseen articles are held as pending, not shown yet.
    pub async fn poll(&self) -> Result<SyncReport, FeedApiError> {
        let subscriptions = self.subscriptions().await;
        if subscriptions.is_empty() {
            return Ok(SyncReport::default());
        }

        let outcome = match self.fetch_batch(&subscriptions).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                return Ok(SyncReport {
                    superseded: true,
                    ..SyncReport::default()
                })
            }
            Err(err) => {
                self.record_failure(&err).await;
                return Err(err);
            }
        };

        self.apply_refreshed(&outcome.subscriptions).await;
        let polled_at = Utc::now().timestamp_millis();
        let (fetched, new_count) = {
            let mut state = self.inner.articles.write().await;
            let latest = self.retain_subscribed(outcome.articles).await;
            let fresh = find_new_articles(&latest, state.articles());
            let count = fresh.len();
            state.set_pending(fresh);
            state.set_last_polled_at(Some(polled_at));
            state.clear_errors();
            for error in &outcome.errors {
                state.add_error(error.clone());
            }
            (latest.len(), count)
        };

        let polling = {
            let mut polling = self.inner.polling.write().await;
            polling.last_polled_at = Some(polled_at);
            *polling
        };
        self.inner.store.save_polling_config(&polling).await;

        info!(new = new_count, "poll finished");
        if new_count > 0 {
            self.emit(ReaderEvent::NewArticles(new_count));
        }
        if !outcome.errors.is_empty() {
            self.emit(ReaderEvent::FeedErrors(outcome.errors.clone()));
        }
        Ok(SyncReport {
            articles: fetched,
            new_articles: new_count,
            errors: outcome.errors.len(),
            superseded: false,
        })
    }

    pub async fn apply_pending(&self) -> usize {
        let added = self.inner.articles.write().await.apply_pending();
        if added > 0 {
            self.emit(ReaderEvent::PendingApplied(added));
        }
        added
    }

    pub async fn set_search_query(&self, query: &str) {
        self.inner.articles.write().await.set_search_query(query);
    }

    pub async fn select_feed(&self, feed_id: Option<String>) {
        self.inner.articles.write().await.select_feed(feed_id);
    }

    pub async fn set_polling_enabled(&self, enabled: bool) {
        let polling = {
            let mut polling = self.inner.polling.write().await;
            polling.enabled = enabled;
            *polling
        };
        self.inner.store.save_polling_config(&polling).await;
        info!(enabled, "polling preference changed");
        self.emit(ReaderEvent::PollingToggled(enabled));
    }

    pub async fn export_json(&self) -> Result<String, serde_json::Error> {
        export_subscriptions(&self.subscriptions().await, Utc::now())
    }

    pub async fn import_from(&self, path: &Path) -> Result<ImportSummary, ImportError> {
        let text = read_import_file(path).await?;
        let imported = parse_import(&text)?;

        let summary = {
            let mut subs = self.inner.subscriptions.write().await;
            let merged = merge_subscriptions(&subs, &imported);
            let room = self
                .inner
                .config
                .feeds
                .max_subscriptions
                .saturating_sub(subs.len());
            let accepted = merged.added.len().min(room);
            let over_limit = merged.added.len() - accepted;
            if over_limit > 0 {
                warn!(over_limit, "subscription limit reached during import");
            }
            subs.extend(merged.added.into_iter().take(accepted));
            ImportSummary {
                added_count: accepted,
                skipped_count: merged.skipped + over_limit,
            }
        };

        self.persist_subscriptions().await;
        if summary.added_count > 0 {
            self.emit(ReaderEvent::SubscriptionsChanged);
        }
        Ok(summary)
    }

    /// Keeps a [`Poller`] in step with connectivity and the subscription list.
    ///
    /// Each tick runs [`FeedReader::poll`]. Stopping or dropping the returned
    /// handle tears the timer down.
    pub fn start_polling(&self, network: &NetworkMonitor) -> PollerHandle {
        let reader = self.clone();
        let mut network_rx = network.subscribe();
        let mut events = self.subscribe_events();
        let (cancel_tx, mut cancel_rx) = broadcast::channel(1);

        let join = tokio::spawn(async move {
            let config = reader.polling_config().await;
            let ticker = reader.clone();
            let mut poller = Poller::from_config(
                &config,
                poll_callback(move || {
                    let reader = ticker.clone();
                    async move {
                        if let Err(err) = reader.poll().await {
                            warn!(error = %err, "scheduled poll failed");
                        }
                    }
                }),
            );

            loop {
                let is_online = network_rx.borrow_and_update().is_online;
                let count = reader.subscription_count().await;
                poller.set_enabled(reader.polling_config().await.enabled);
                poller.update(is_online, count);

                tokio::select! {
                    _ = cancel_rx.recv() => break,
                    changed = network_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    event = events.recv() => match event {
                        Ok(_) | Err(RecvError::Lagged(_)) => {}
                        Err(RecvError::Closed) => break,
                    },
                }
            }

            if let Err(err) = poller.stop().await {
                warn!(error = %err, "poller did not stop cleanly");
            }
        });

        PollerHandle::from_parts(cancel_tx, join)
    }
}
