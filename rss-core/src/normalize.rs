use tracing::warn;
use url::Url;

/// Canonical form of a feed URL, for equality checks only.
///
/// The scheme is forced to `https`, a leading `www.` is dropped from the host
/// and a single trailing slash is removed from non-root paths. Input that does
/// not parse is returned unchanged.
pub fn normalize_url(raw: &str) -> String {
    let mut url = match Url::parse(raw) {
        Ok(url) => url,
        Err(err) => {
            warn!(url = raw, error = %err, "failed to normalize URL");
            return raw.to_owned();
        }
    };

    // Only special schemes may switch to https; others stay as they are.
    let _ = url.set_scheme("https");

    if let Some(host) = url.host_str() {
        if let Some(stripped) = host.strip_prefix("www.") {
            let stripped = stripped.to_owned();
            let _ = url.set_host(Some(&stripped));
        }
    }

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path[..path.len() - 1].to_owned();
        url.set_path(&trimmed);
    }

    url.to_string()
}

/// Only http and https addresses are accepted as feed URLs.
pub fn is_valid_feed_url(raw: &str) -> bool {
    match Url::parse(raw.trim()) {
        Ok(url) => matches!(url.scheme(), "http" | "https"),
        Err(_) => false,
    }
}
