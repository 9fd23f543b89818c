use std::collections::HashSet;

use crate::models::Article;
use crate::sort::sort_articles_by_date;

/// Articles from `latest` whose id is not in `current`, in `latest` order.
pub fn find_new_articles(latest: &[Article], current: &[Article]) -> Vec<Article> {
    if latest.is_empty() {
        return Vec::new();
    }
    if current.is_empty() {
        return latest.to_vec();
    }

    let known: HashSet<&str> = current.iter().map(|a| a.id.as_str()).collect();
    latest
        .iter()
        .filter(|article| !known.contains(article.id.as_str()))
        .cloned()
        .collect()
}

/// Puts `new` ahead of `current` and re-sorts by date.
pub fn merge_articles(current: &[Article], new: &[Article]) -> Vec<Article> {
    let mut merged = Vec::with_capacity(current.len() + new.len());
    merged.extend_from_slice(new);
    merged.extend_from_slice(current);
    sort_articles_by_date(&merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(id: &str, pub_date: Option<&str>) -> Article {
        Article {
            id: id.into(),
            title: format!("Title {id}"),
            link: format!("https://example.com/{id}"),
            pub_date: pub_date.map(str::to_owned),
            summary: String::new(),
            feed_id: "feed".into(),
            feed_title: "Feed".into(),
            feed_order: 0,
        }
    }

    fn ids(articles: &[Article]) -> Vec<&str> {
        articles.iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn finds_only_unseen_ids() {
        let current = vec![article("1", None)];
        let latest = vec![article("1", None), article("2", None)];
        assert_eq!(ids(&find_new_articles(&latest, &current)), ["2"]);
    }

    #[test]
    fn preserves_latest_order() {
        let current = vec![article("2", None)];
        let latest = vec![article("4", None), article("2", None), article("1", None), article("3", None)];
        assert_eq!(ids(&find_new_articles(&latest, &current)), ["4", "1", "3"]);
    }

    #[test]
    fn empty_edges() {
        let some = vec![article("1", None), article("2", None)];
        assert!(find_new_articles(&[], &some).is_empty());
        assert_eq!(ids(&find_new_articles(&some, &[])), ["1", "2"]);
    }

    #[test]
    fn result_is_subset_of_latest_and_disjoint_from_current() {
        let current = vec![article("a", None), article("b", None), article("c", None)];
        let latest = vec![article("c", None), article("d", None), article("a", None), article("e", None)];
        let found = find_new_articles(&latest, &current);
        for item in &found {
            assert!(latest.iter().any(|l| l.id == item.id));
            assert!(current.iter().all(|c| c.id != item.id));
        }
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn merge_sorts_new_into_current() {
        let current = vec![
            article("1", Some("2025-01-01T00:00:00Z")),
            article("2", Some("2025-01-02T00:00:00Z")),
        ];
        let new = vec![article("3", Some("2025-01-03T00:00:00Z"))];
        let merged = merge_articles(&current, &new);
        assert_eq!(ids(&merged), ["3", "2", "1"]);
        assert_eq!(merged.len(), current.len() + new.len());
    }

    #[test]
    fn merge_with_an_empty_side() {
        let items = vec![article("old", Some("2025-01-01T00:00:00Z")), article("new", Some("2025-02-01T00:00:00Z"))];
        assert_eq!(ids(&merge_articles(&items, &[])), ["new", "old"]);
        assert_eq!(ids(&merge_articles(&[], &items)), ["new", "old"]);
        assert!(merge_articles(&[], &[]).is_empty());
    }

    #[test]
    fn merge_is_stable_under_resorting() {
        let current = vec![article("x", None), article("y", Some("2024-05-01T00:00:00Z"))];
        let new = vec![article("z", Some("2024-06-01T00:00:00Z"))];
        let merged = merge_articles(&current, &new);
        assert_eq!(sort_articles_by_date(&merged), merged);
    }
}
