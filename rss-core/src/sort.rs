use chrono::{DateTime, Utc};

use crate::models::Article;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    // Reverse chronological: the newest instant has the smallest key.
    Dated(std::cmp::Reverse<DateTime<Utc>>),
    Unreadable(usize),
    Undated(usize),
}

fn sort_key(article: &Article) -> SortKey {
    match article.pub_date.as_deref().filter(|d| !d.trim().is_empty()) {
        None => SortKey::Undated(article.feed_order),
        Some(_) => match article.published_at() {
            Some(instant) => SortKey::Dated(std::cmp::Reverse(instant)),
            None => SortKey::Unreadable(article.feed_order),
        },
    }
}

/// Newest first, undated articles last in their feed order.
///
/// Returns a sorted copy; the sort is stable, so sorting twice changes nothing.
pub fn sort_articles_by_date(articles: &[Article]) -> Vec<Article> {
    let mut keyed: Vec<(SortKey, &Article)> = articles.iter().map(|a| (sort_key(a), a)).collect();
    keyed.sort_by(|(left, _), (right, _)| left.cmp(right));
    keyed.into_iter().map(|(_, article)| article.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(id: &str, pub_date: Option<&str>, feed_order: usize) -> Article {
        Article {
            id: id.into(),
            title: id.into(),
            link: format!("https://example.com/{id}"),
            pub_date: pub_date.map(str::to_owned),
            summary: String::new(),
            feed_id: "feed".into(),
            feed_title: "Feed".into(),
            feed_order,
        }
    }

    fn ids(articles: &[Article]) -> Vec<&str> {
        articles.iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn dated_before_undated_newest_first() {
        let input = vec![
            article("undated-2", None, 2),
            article("old", Some("2025-01-01T00:00:00Z"), 0),
            article("undated-1", None, 1),
            article("new", Some("2025-01-03T00:00:00Z"), 1),
            article("mid", Some("Thu, 02 Jan 2025 00:00:00 GMT"), 2),
        ];
        let sorted = sort_articles_by_date(&input);
        assert_eq!(ids(&sorted), ["new", "mid", "old", "undated-1", "undated-2"]);
    }

    #[test]
    fn input_is_not_mutated() {
        let input = vec![article("a", None, 1), article("b", Some("2025-01-01T00:00:00Z"), 0)];
        let before = input.clone();
        let _ = sort_articles_by_date(&input);
        assert_eq!(input, before);
    }

    #[test]
    fn sorting_is_idempotent() {
        let input = vec![
            article("a", Some("2025-01-01T00:00:00Z"), 0),
            article("b", Some("2025-01-01T00:00:00Z"), 1),
            article("c", None, 3),
            article("d", None, 0),
            article("e", Some("garbage"), 5),
        ];
        let once = sort_articles_by_date(&input);
        let twice = sort_articles_by_date(&once);
        assert_eq!(once, twice);
        assert_eq!(ids(&once), ["a", "b", "e", "d", "c"]);
    }

    #[test]
    fn empty_date_counts_as_undated() {
        let input = vec![article("blank", Some(""), 0), article("dated", Some("2025-01-01T00:00:00Z"), 1)];
        assert_eq!(ids(&sort_articles_by_date(&input)), ["dated", "blank"]);
    }
}
