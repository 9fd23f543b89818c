use tracing::warn;

use crate::api::RemoteFeed;
use crate::feed::Subscription;
use crate::normalize::normalize_url;

/// Finds the API result for `subscription` by comparing normalized feed URLs.
///
/// There is deliberately no positional fallback: the API may reorder or drop
/// results, and pairing by index attaches articles to the wrong feed.
pub fn find_matching_feed<'a>(
    subscription: &Subscription,
    feeds: &'a [RemoteFeed],
) -> Option<&'a RemoteFeed> {
    let wanted = normalize_url(&subscription.url);
    let found = feeds
        .iter()
        .find(|feed| normalize_url(&feed.feed_url) == wanted);

    if found.is_none() {
        let returned: Vec<String> = feeds.iter().map(|f| normalize_url(&f.feed_url)).collect();
        warn!(
            subscription = %subscription.id,
            url = %wanted,
            ?returned,
            "no feed in API response matches subscription"
        );
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(feed_url: &str, title: &str) -> RemoteFeed {
        RemoteFeed {
            title: title.into(),
            link: "https://example.com".into(),
            feed_url: feed_url.into(),
            articles: Vec::new(),
        }
    }

    #[test]
    fn matches_despite_scheme_and_trailing_slash() {
        let sub = Subscription::new("http://example.com/feed/", None);
        let feeds = vec![
            remote("https://other.org/rss", "Other"),
            remote("https://example.com/feed", "Example"),
        ];
        assert_eq!(find_matching_feed(&sub, &feeds).unwrap().title, "Example");
    }

    #[test]
    fn matching_is_independent_of_response_order() {
        let sub = Subscription::new("https://b.example/feed", None);
        let forward = vec![remote("https://a.example/feed", "A"), remote("https://b.example/feed", "B")];
        let mut reversed = forward.clone();
        reversed.reverse();
        assert_eq!(find_matching_feed(&sub, &forward).unwrap().title, "B");
        assert_eq!(find_matching_feed(&sub, &reversed).unwrap().title, "B");
    }

    #[test]
    fn site_link_is_not_used_for_matching() {
        let sub = Subscription::new("https://example.com", None);
        let feeds = vec![remote("https://example.com/feed.xml", "Example")];
        assert!(find_matching_feed(&sub, &feeds).is_none());
    }

    #[test]
    fn no_positional_fallback() {
        let sub = Subscription::new("https://missing.example/feed", None);
        let feeds = vec![remote("https://example.com/feed", "Example")];
        assert!(find_matching_feed(&sub, &feeds).is_none());
    }
}
