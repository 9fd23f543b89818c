use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::{redirect, ClientBuilder};
use rss_core::config::CONFIG_FILE;
use rss_core::{
    export_filename, AppConfig, Article, FeedApiClient, FeedPreview, FeedReader, LocalStore,
    NetworkMonitor, ReaderEvent,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rss-cli", version, about = "Subscribe to feeds and read them from the terminal")]
struct Cli {
    /// Directory holding config.json, subscriptions.json and polling_config.json
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List subscriptions
    List,
    /// Subscribe to a feed URL
    Add { url: String },
    /// Unsubscribe by id
    Remove { id: String },
    /// Give a subscription a custom name
    Rename { id: String, title: String },
    /// Fetch every feed and print the articles
    Fetch {
        /// Case-insensitive filter on title and summary
        #[arg(long)]
        search: Option<String>,
        /// Only show articles of this subscription id
        #[arg(long)]
        feed: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Fetch once, then keep polling in the background until Ctrl-C
    Watch,
    /// Look up a feed's title without subscribing
    Preview { url: String },
    /// Write subscriptions to a JSON file
    Export {
        /// Defaults to subscriptions_YYYY-MM-DD.json in the current directory
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Add subscriptions from a JSON export
    Import { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let data_dir = cli.data_dir.unwrap_or_else(AppConfig::config_dir);
    let config = AppConfig::load_from(data_dir.join(CONFIG_FILE));
    let client = ClientBuilder::new()
        .redirect(redirect::Policy::limited(5))
        .user_agent(concat!("rss-cli/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    let store = LocalStore::open(&data_dir).await;
    let reader = FeedReader::open(config, client, store).await;

    match cli.command {
        Command::List => list(&reader).await,
        Command::Add { url } => {
            let outcome = reader.add_subscription(&url).await?;
            if let Some(advisory) = outcome.advisory {
                warn!("{advisory}");
            }
            println!(
                "{}  {}",
                outcome.subscription.id,
                outcome.subscription.display_title()
            );
        }
        Command::Remove { id } => {
            let removed = reader.remove_subscription(&id).await?;
            println!("removed {}", removed.display_title());
        }
        Command::Rename { id, title } => {
            let renamed = reader.rename_subscription(&id, &title).await?;
            println!("{}  {}", renamed.id, renamed.display_title());
        }
        Command::Fetch {
            search,
            feed,
            limit,
        } => {
            let report = reader.refresh().await?;
            if let Some(query) = search {
                reader.set_search_query(&query).await;
            }
            reader.select_feed(feed).await;
            print_articles(&reader.articles().await, limit);
            print_errors(&reader).await;
            info!(articles = report.articles, errors = report.errors, "fetch complete");
        }
        Command::Watch => watch(reader).await?,
        Command::Export { output } => {
            let path = output.unwrap_or_else(|| PathBuf::from(export_filename(chrono::Local::now())));
            let json = reader.export_json().await?;
            tokio::fs::write(&path, json)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("exported to {}", path.display());
        }
        Command::Import { path } => {
            let summary = reader.import_from(&path).await?;
            println!("{}", summary.message());
        }
        Command::Preview { url } => {
            let debounce = reader.config().preview.debounce();
            preview(reader.api().clone(), debounce, &url).await?;
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn list(reader: &FeedReader) {
    let subscriptions = reader.subscriptions().await;
    if subscriptions.is_empty() {
        println!("no subscriptions");
        return;
    }
    for sub in subscriptions {
        let fetched = sub
            .last_fetched_at
            .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".into());
        println!(
            "{}  {:<40}  {:?}  fetched {}  {}",
            sub.id,
            sub.display_title(),
            sub.status,
            fetched,
            sub.url
        );
    }
}

fn print_articles(articles: &[Article], limit: usize) {
    for article in articles.iter().take(limit) {
        let date = article
            .published_at()
            .map(|d| d.with_timezone(&chrono::Local).format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "----------".into());
        println!("{date}  [{}] {}", article.feed_title, article.title);
        println!("            {}", article.link);
    }
    if articles.len() > limit {
        println!("... {} more", articles.len() - limit);
    }
}

async fn print_errors(reader: &FeedReader) {
    for error in reader.errors().await {
        eprintln!("failed: {} ({})", error.url, error.message);
    }
}

async fn watch(reader: FeedReader) -> Result<()> {
    if reader.subscription_count().await == 0 {
        bail!("nothing to watch: add a subscription first");
    }
    reader.refresh().await?;
    print_articles(&reader.articles().await, 20);

    let network = NetworkMonitor::new(true);
    let mut events = reader.subscribe_events();
    let poller = reader.start_polling(&network);
    info!(
        interval_ms = reader.polling_config().await.polling_interval,
        "watching for new articles, Ctrl-C to stop"
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(ReaderEvent::NewArticles(count)) => {
                    let before = reader.all_articles().await;
                    reader.apply_pending().await;
                    let fresh: Vec<Article> = reader
                        .articles()
                        .await
                        .into_iter()
                        .filter(|a| !before.iter().any(|b| b.id == a.id))
                        .collect();
                    println!("-- {count} new --");
                    print_articles(&fresh, fresh.len());
                }
                Ok(ReaderEvent::FeedErrors(errors)) => {
                    for error in errors {
                        warn!(url = %error.url, "{}", error.message);
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed reader events");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    poller.stop().await?;
    Ok(())
}

async fn preview(api: FeedApiClient, debounce: Duration, url: &str) -> Result<()> {
    let preview = FeedPreview::new(api, debounce);
    let mut rx = preview.subscribe();
    preview.fetch_preview(url);
    let state = rx
        .wait_for(|s| !s.loading && (s.title.is_some() || s.error.is_some()))
        .await
        .context("preview was dropped")?
        .clone();
    match (state.title, state.error) {
        (Some(title), _) => println!("{title}"),
        (None, Some(error)) => bail!("{error}"),
        (None, None) => bail!("no title"),
    }
    Ok(())
}
