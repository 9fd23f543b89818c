use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use crate::api::FeedApiClient;
use crate::coordinator::{RequestCoordinator, RequestToken};
use crate::transform::sanitize_feed_title;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);
pub const FETCH_FAILED: &str = "failed to fetch the feed";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewState {
    pub title: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Debounced title lookup for a URL that is still being typed.
///
/// Each call supersedes the previous one: a pending debounce is dropped and
/// an in-flight request is cancelled, so only the newest URL ever commits.
pub struct FeedPreview {
    api: FeedApiClient,
    debounce: Duration,
    coordinator: RequestCoordinator,
    state: Arc<watch::Sender<PreviewState>>,
}

impl FeedPreview {
    pub fn new(api: FeedApiClient, debounce: Duration) -> Self {
        let (state, _) = watch::channel(PreviewState::default());
        Self {
            api,
            debounce,
            coordinator: RequestCoordinator::new(),
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> PreviewState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PreviewState> {
        self.state.subscribe()
    }

    pub fn clear(&self) {
        self.coordinator.cancel_all();
        self.state.send_replace(PreviewState::default());
    }

    pub fn fetch_preview(&self, url: &str) {
        let url = url.trim();
        if url.is_empty() {
            self.clear();
            return;
        }

        let token = self.coordinator.begin();
        let api = self.api.clone();
        let state = self.state.clone();
        let debounce = self.debounce;
        let url = url.to_owned();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(debounce) => {}
            }
            run_preview(api, state, token, url).await;
        });
    }
}

impl Drop for FeedPreview {
    fn drop(&mut self) {
        self.coordinator.cancel_all();
    }
}

async fn run_preview(
    api: FeedApiClient,
    state: Arc<watch::Sender<PreviewState>>,
    token: RequestToken,
    url: String,
) {
    state.send_modify(|s| {
        s.loading = true;
        s.error = None;
    });

    let result = api.parse_feeds(&[url.clone()], Some(&token)).await;
    if !token.is_current() {
        debug!(%url, "discarding superseded preview");
        return;
    }

    let next = match result {
        Err(err) if err.is_aborted() => return,
        Err(err) => PreviewState {
            title: None,
            loading: false,
            error: Some(err.to_string()),
        },
        Ok(response) => {
            if let Some(first) = response.errors.first() {
                PreviewState {
                    title: None,
                    loading: false,
                    error: Some(first.message.clone()),
                }
            } else if let Some(feed) = response.feeds.first() {
                PreviewState {
                    title: Some(sanitize_feed_title(&feed.title)),
                    loading: false,
                    error: None,
                }
            } else {
                PreviewState {
                    title: None,
                    loading: false,
                    error: Some(FETCH_FAILED.to_owned()),
                }
            }
        }
    };
    state.send_if_modified(|current| {
        if !token.is_current() {
            return false;
        }
        *current = next;
        true
    });
}
