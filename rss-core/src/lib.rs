pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod feed;
pub mod import_export;
pub mod matcher;
pub mod merge;
pub mod models;
pub mod network;
pub mod normalize;
pub mod poller;
pub mod preview;
pub mod reader;
pub mod sort;
pub mod state;
pub mod storage;
pub mod transform;

pub use api::{FeedApiClient, ParseResponse, RemoteArticle, RemoteError, RemoteFeed};
pub use config::AppConfig;
pub use coordinator::{RequestCoordinator, RequestToken};
pub use error::{FeedApiError, ImportError, ImportErrorCode, PollError, SubscriptionError, TitleError};
pub use feed::{Subscription, SubscriptionStatus};
pub use import_export::{export_filename, ExportData, ImportSummary};
pub use matcher::find_matching_feed;
pub use merge::{find_new_articles, merge_articles};
pub use models::{Article, FeedError};
pub use network::{NetworkMonitor, NetworkStatus};
pub use normalize::normalize_url;
pub use poller::{poll_callback, spawn_poller, PollState, Poller, PollerHandle, PollingConfig};
pub use preview::{FeedPreview, PreviewState};
pub use reader::{AddOutcome, FeedReader, ReaderEvent, SyncReport};
pub use sort::sort_articles_by_date;
pub use state::ArticleState;
pub use storage::LocalStore;
